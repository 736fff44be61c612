use thiserror::Error;

pub const GCS_SCHEME: &str = "gs://";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocationError {
    #[error("Expected a valid 'gs://' path but was given '{0}'")]
    NotGcs(String),
    #[error("Error constructing default value for gcpTempLocation: tempLocation is not set")]
    TempLocationUnset,
    #[error("Error constructing default value for gcpTempLocation: tempLocation is not a valid GCS path")]
    TempLocationNotGcs(#[source] Box<LocationError>),
    #[error("Error constructing default value for stagingLocation: failed to retrieve gcpTempLocation.")]
    StagingFromGcpTemp(#[source] Box<LocationError>),
    #[error("Error constructing default value for stagingLocation: gcpTempLocation is not a valid GCS path")]
    StagingGcpTempNotGcs(#[source] Box<LocationError>),
}

pub fn verify_gcs_path(path: &str) -> Result<(), LocationError> {
    if path.len() > GCS_SCHEME.len() && path.starts_with(GCS_SCHEME) {
        Ok(())
    } else {
        Err(LocationError::NotGcs(path.to_string()))
    }
}

/// Treats `path` as a directory and appends `child`.
pub fn resolve_dir(path: &str, child: &str) -> String {
    if path.ends_with('/') {
        format!("{path}{child}")
    } else {
        format!("{path}/{child}")
    }
}

/// Explicit value, else `temp_location` when it is a GCS path.
pub fn gcp_temp_location(
    explicit: Option<&str>,
    temp_location: Option<&str>,
) -> Result<String, LocationError> {
    if let Some(v) = explicit {
        return Ok(v.to_string());
    }
    let temp = temp_location.ok_or(LocationError::TempLocationUnset)?;
    verify_gcs_path(temp).map_err(|e| LocationError::TempLocationNotGcs(Box::new(e)))?;
    Ok(temp.to_string())
}

/// Explicit value, else `<gcpTempLocation>/staging/`.
pub fn staging_location(
    explicit: Option<&str>,
    gcp_temp: Result<String, LocationError>,
) -> Result<String, LocationError> {
    if let Some(v) = explicit {
        return Ok(v.to_string());
    }
    let gcp_temp = gcp_temp.map_err(|e| LocationError::StagingFromGcpTemp(Box::new(e)))?;
    verify_gcs_path(&gcp_temp).map_err(|e| LocationError::StagingGcpTempNotGcs(Box::new(e)))?;
    Ok(resolve_dir(&gcp_temp, "staging/"))
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn explicit_locations_are_kept() {
        let gcp = gcp_temp_location(None, Some("gs://temp_location")).unwrap();
        assert_eq!(gcp, "gs://temp_location");
        assert_eq!(
            staging_location(Some("gs://staging_location"), Ok(gcp)).unwrap(),
            "gs://staging_location"
        );
    }

    #[test]
    fn staging_defaults_under_temp_location() {
        let gcp = gcp_temp_location(None, Some("gs://temp_location/"));
        assert_eq!(
            staging_location(None, gcp).unwrap(),
            "gs://temp_location/staging/"
        );
    }

    #[test]
    fn staging_prefers_gcp_temp_location() {
        let gcp = gcp_temp_location(Some("gs://gcp_temp_location"), Some("gs://temp_location/"));
        assert_eq!(
            staging_location(None, gcp).unwrap(),
            "gs://gcp_temp_location/staging/"
        );
    }

    #[test]
    fn non_gcs_temp_location_fails_with_cause() {
        let gcp = gcp_temp_location(None, Some("file://temp_location"));
        let err = staging_location(None, gcp).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error constructing default value for stagingLocation: failed to retrieve gcpTempLocation."
        );
        let cause = err.source().unwrap().to_string();
        assert!(cause.contains("Error constructing default value for gcpTempLocation"));
    }

    #[test]
    fn non_gcs_gcp_temp_location_fails() {
        let gcp = gcp_temp_location(Some("file://temp_location"), None);
        let err = staging_location(None, gcp).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error constructing default value for stagingLocation: gcpTempLocation is not a valid GCS path"
        );
        assert!(err
            .source()
            .unwrap()
            .to_string()
            .contains("Expected a valid 'gs://' path"));
    }

    #[test]
    fn unset_temp_location_fails() {
        let err = staging_location(None, gcp_temp_location(None, None)).unwrap_err();
        assert!(matches!(err, LocationError::StagingFromGcpTemp(_)));
    }
}
