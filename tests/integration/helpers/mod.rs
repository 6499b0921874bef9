//! Shared helpers for integration tests

use std::fs;
use std::path::Path;

/// Write one device directory with pre and post capture files.
pub fn write_device(root: &Path, hostname: &str, pre: &str, post: &str) {
    let dir = root.join(hostname);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(format!("{}_pre_check.log", hostname)), pre).unwrap();
    fs::write(dir.join(format!("{}_post_check.log", hostname)), post).unwrap();
}
