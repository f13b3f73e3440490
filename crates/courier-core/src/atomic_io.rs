use std::io::Write;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::time_utils::current_unix_timestamp_ms;

/// Writes UTF-8 text through [`write_bytes_atomic`].
pub fn write_text_atomic(path: &Path, content: &str) -> Result<()> {
    write_bytes_atomic(path, content.as_bytes())
}

/// Replaces `path` with `content` so readers see either the old file or the new one.
///
/// The bytes land in a hidden sibling (`.<name>.tmp-<pid>-<ms>`), are synced,
/// and are then renamed over the destination. The sibling is removed when any
/// step fails.
pub fn write_bytes_atomic(path: &Path, content: &[u8]) -> Result<()> {
    let Some(file_name) = path.file_name().and_then(|name| name.to_str()) else {
        bail!("destination path '{}' has no file name", path.display());
    };
    if path.is_dir() {
        bail!("destination path '{}' is a directory", path.display());
    }
    let directory = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(directory)
        .with_context(|| format!("failed to create {}", directory.display()))?;

    let staging = directory.join(format!(
        ".{file_name}.tmp-{}-{}",
        std::process::id(),
        current_unix_timestamp_ms()
    ));
    let result = stage_and_rename(&staging, path, content);
    if result.is_err() {
        let _ = std::fs::remove_file(&staging);
    }
    result
}

fn stage_and_rename(staging: &Path, destination: &Path, content: &[u8]) -> Result<()> {
    let mut file = std::fs::File::create(staging)
        .with_context(|| format!("failed to create {}", staging.display()))?;
    file.write_all(content)
        .with_context(|| format!("failed to write {}", staging.display()))?;
    file.sync_all()
        .with_context(|| format!("failed to sync {}", staging.display()))?;
    drop(file);
    std::fs::rename(staging, destination).with_context(|| {
        format!(
            "failed to move {} into place at {}",
            staging.display(),
            destination.display()
        )
    })
}
