#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
pub fn write_executable(dir: &Path, name: &str, script: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, script).unwrap();
    let mut perms = fs::metadata(&path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).unwrap();
    path
}

pub fn prepend_path(stub_bin: &Path) -> String {
    let old = std::env::var("PATH").unwrap_or_default();
    format!("{}:{}", stub_bin.display(), old)
}

/// A `flowopts` invocation isolated from the caller's config and region.
pub fn flowopts(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("flowopts"));
    cmd.env("FLOWOPTS_HOME", home)
        .env_remove("CLOUDSDK_COMPUTE_REGION")
        .env_remove("FLOWOPTS_LOG");
    cmd
}
