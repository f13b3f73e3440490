//! Upload of finished artifacts and cleanup of downloaded attachments.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::{ArchiveChannel, ArchiveError, ArchivePlatform};

pub const UPLOAD_FAILURE_NOTICE: &str =
    "An error occurred while uploading the archive to this channel. The CSV and PDF were saved locally; ask an administrator to retrieve them.";

/// Files produced by one archive job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveArtifacts {
    pub directory: PathBuf,
    pub csv_path: PathBuf,
    pub pdf_path: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeliveryOptions {
    pub post_to_channel: bool,
    pub keep_images: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeliveryOutcome {
    /// Filenames uploaded to the channel, in upload order.
    pub uploaded: Vec<String>,
    pub removed_image_dirs: usize,
}

/// Uploads the CSV and PDF when requested, then applies the keep-images policy.
///
/// Any error raised here is an [`ArchiveError::UploadFailure`]: the CSV and PDF
/// are complete before delivery starts and are never removed here. Image
/// cleanup problems are logged and do not fail the job.
pub async fn deliver<P>(
    platform: &P,
    channel: &ArchiveChannel,
    artifacts: &ArchiveArtifacts,
    options: DeliveryOptions,
    image_dirs: &[PathBuf],
) -> Result<DeliveryOutcome, ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    let mut outcome = DeliveryOutcome::default();
    let upload_result = if options.post_to_channel {
        upload_artifacts(platform, channel, artifacts, &mut outcome.uploaded).await
    } else {
        Ok(())
    };

    if !options.keep_images {
        outcome.removed_image_dirs = remove_image_dirs(image_dirs);
    }

    if let Err(error) = upload_result {
        warn!(
            channel_id = channel.id.as_str(),
            error_kind = error.kind(),
            error = %error,
            "archive upload failed; local artifacts preserved"
        );
        if let Err(notice_error) = platform.post_notice(&channel.id, UPLOAD_FAILURE_NOTICE).await {
            warn!(error = %notice_error, "failed to post upload failure notice");
        }
        return Err(error);
    }
    Ok(outcome)
}

fn as_upload_failure(filename: &str, error: ArchiveError) -> ArchiveError {
    match error {
        ArchiveError::UploadFailure { .. } => error,
        other => ArchiveError::UploadFailure {
            filename: filename.to_string(),
            reason: other.to_string(),
        },
    }
}

async fn upload_artifacts<P>(
    platform: &P,
    channel: &ArchiveChannel,
    artifacts: &ArchiveArtifacts,
    uploaded: &mut Vec<String>,
) -> Result<(), ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    for (path, format) in [(&artifacts.csv_path, "csv"), (&artifacts.pdf_path, "pdf")] {
        let filename = file_name(path);
        let bytes = tokio::fs::read(path).await.map_err(|source| {
            as_upload_failure(
                &filename,
                ArchiveError::io(format!("failed to read {}", path.display()), source),
            )
        })?;
        let title = format!("{} {format}", channel.name);
        platform
            .upload_file(&channel.id, &filename, &title, &bytes)
            .await
            .map_err(|error| as_upload_failure(&filename, error))?;
        info!(
            channel_id = channel.id.as_str(),
            filename = filename.as_str(),
            bytes = bytes.len(),
            "uploaded archive artifact"
        );
        uploaded.push(filename);
    }
    Ok(())
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Removes the `message_<n>` attachment directories; returns how many were removed.
pub fn remove_image_dirs(image_dirs: &[PathBuf]) -> usize {
    let mut removed = 0;
    for directory in image_dirs {
        if !directory.exists() {
            continue;
        }
        match std::fs::remove_dir_all(directory) {
            Ok(()) => removed += 1,
            Err(error) => warn!(
                directory = %directory.display(),
                error = %error,
                "failed to remove downloaded attachment directory"
            ),
        }
    }
    if removed > 0 {
        info!(removed, "removed downloaded attachment directories");
    }
    removed
}
