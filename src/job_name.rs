use chrono::{DateTime, Utc};
use rand::Rng;

use crate::sanitize::sanitize;

/// Letter written over a leading digit of the app token.
pub const LEADING_LETTER: char = 'a';

/// Number of `-`-separated segments in every generated job name.
pub const SEGMENTS: usize = 4;

/// Builds `<app>-<user>-<MMddHHmmss>-<hex>`.
///
/// Both names are passed through [`sanitize`], so neither can introduce
/// an extra `-`. A leading digit in the app token is overwritten with
/// [`LEADING_LETTER`] because job names must start with a letter.
///
/// Nothing is truncated. Short inputs give names of at most 40 chars, long
/// ones are passed through as-is and callers that need a hard cap must
/// trim the inputs first.
pub fn generate<R: Rng + ?Sized>(
    app_name: &str,
    user_name: &str,
    now: DateTime<Utc>,
    rng: &mut R,
) -> String {
    let app = app_token(app_name);
    let user = sanitize(user_name);
    let ts = format_timestamp(now);
    let suffix = rng.random::<u64>();
    format!("{app}-{user}-{ts}-{suffix:x}")
}

/// `MMddHHmmss` in UTC. The year is deliberately dropped.
pub fn format_timestamp(now: DateTime<Utc>) -> String {
    now.format("%m%d%H%M%S").to_string()
}

fn app_token(app_name: &str) -> String {
    let token = sanitize(app_name);
    match token.chars().next() {
        Some(first) if first.is_ascii_digit() => {
            let mut out = String::with_capacity(token.len());
            out.push(LEADING_LETTER);
            out.push_str(&token[first.len_utf8()..]);
            out
        }
        _ => token,
    }
}

/// Splits a job name on `-`. Generated names always give [`SEGMENTS`] parts.
pub fn segments(job_name: &str) -> Vec<&str> {
    job_name.split('-').collect()
}
