use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use courier_core::{sanitize_for_path, unique_filename};
use lopdf::Stream;
use tracing::{debug, warn};

use crate::{ArchiveError, ArchivePlatform, NormalizedRecord};

/// A row-local degradation recorded while rendering; never aborts the job.
#[derive(Debug)]
pub struct RenderWarning {
    pub sequence: usize,
    pub filename: String,
    pub error: ArchiveError,
}

#[derive(Debug)]
pub struct EmbeddedImage {
    /// XObject resource name, e.g. `Im3`.
    pub resource_name: String,
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
    pub(crate) stream: Stream,
}

/// What the layout should draw for one attachment.
#[derive(Debug, Clone, Copy)]
pub enum ImageSlot<'a> {
    Embedded(&'a EmbeddedImage),
    Unavailable,
    /// Not an image, or embedding was disabled: draw a link.
    NotEmbedded,
}

/// Downloaded and decoded image attachments for one archive.
#[derive(Debug, Default)]
pub struct ImageSet {
    embedded: HashMap<(usize, String), EmbeddedImage>,
    unavailable: HashSet<(usize, String)>,
    warnings: Vec<RenderWarning>,
    directories: Vec<PathBuf>,
}

impl ImageSet {
    pub fn slot(&self, sequence: usize, filename: &str) -> ImageSlot<'_> {
        let key = (sequence, filename.to_string());
        if let Some(image) = self.embedded.get(&key) {
            return ImageSlot::Embedded(image);
        }
        if self.unavailable.contains(&key) {
            return ImageSlot::Unavailable;
        }
        ImageSlot::NotEmbedded
    }

    /// Embedded images in resource-name order.
    pub fn embedded(&self) -> Vec<&EmbeddedImage> {
        let mut images = self.embedded.values().collect::<Vec<_>>();
        images.sort_by_key(|image| {
            image
                .resource_name
                .trim_start_matches("Im")
                .parse::<usize>()
                .unwrap_or(usize::MAX)
        });
        images
    }

    pub fn warnings(&self) -> &[RenderWarning] {
        &self.warnings
    }

    pub fn into_warnings(self) -> Vec<RenderWarning> {
        self.warnings
    }

    /// `message_<n>` directories created for downloaded files.
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    fn mark_unavailable(&mut self, sequence: usize, filename: &str, error: ArchiveError) {
        warn!(
            sequence,
            filename,
            error = %error,
            "image attachment unavailable; rendering placeholder"
        );
        self.unavailable.insert((sequence, filename.to_string()));
        self.warnings.push(RenderWarning {
            sequence,
            filename: filename.to_string(),
            error,
        });
    }
}

/// Directory holding the downloaded attachments of record `sequence`.
pub fn message_directory(archive_dir: &Path, sequence: usize) -> PathBuf {
    archive_dir.join(format!("message_{sequence}"))
}

/// Downloads every image attachment into `archive_dir` and decodes it for embedding.
///
/// Download and decode failures degrade to placeholders with a warning. Only a
/// failure to write into the archive directory is fatal.
pub async fn collect_images<P>(
    platform: &P,
    records: &[NormalizedRecord],
    archive_dir: &Path,
) -> Result<ImageSet, ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    let mut images = ImageSet::default();
    for record in records {
        // Distinct attachment names can sanitize to the same file name.
        let mut disk_names: Vec<String> = Vec::new();
        for attachment in record.attachments.iter().filter(|attachment| attachment.is_image) {
            let failure = |reason: String| ArchiveError::AttachmentDownloadFailure {
                filename: attachment.filename.clone(),
                reason,
            };
            let Some(url) = attachment.download_url.as_deref() else {
                images.mark_unavailable(
                    record.sequence,
                    &attachment.filename,
                    failure("slack did not provide a download url".to_string()),
                );
                continue;
            };
            let bytes = match platform.download_attachment(url).await {
                Ok(bytes) if bytes.is_empty() => {
                    images.mark_unavailable(
                        record.sequence,
                        &attachment.filename,
                        failure("downloaded file is empty".to_string()),
                    );
                    continue;
                }
                Ok(bytes) => bytes,
                Err(error) => {
                    images.mark_unavailable(
                        record.sequence,
                        &attachment.filename,
                        failure(error.to_string()),
                    );
                    continue;
                }
            };

            let directory = message_directory(archive_dir, record.sequence);
            std::fs::create_dir_all(&directory).map_err(|source| {
                ArchiveError::io(format!("failed to create {}", directory.display()), source)
            })?;
            if !images.directories.contains(&directory) {
                images.directories.push(directory.clone());
            }
            let disk_name = unique_filename(&sanitize_for_path(&attachment.filename), &disk_names);
            let path = directory.join(&disk_name);
            disk_names.push(disk_name);
            std::fs::write(&path, &bytes).map_err(|source| {
                ArchiveError::io(format!("failed to write {}", path.display()), source)
            })?;

            match decode_image(bytes) {
                Ok((stream, width_px, height_px)) => {
                    let resource_name = format!("Im{}", images.embedded.len() + 1);
                    debug!(
                        sequence = record.sequence,
                        filename = attachment.filename.as_str(),
                        width_px,
                        height_px,
                        "decoded image attachment"
                    );
                    images.embedded.insert(
                        (record.sequence, attachment.filename.clone()),
                        EmbeddedImage {
                            resource_name,
                            path,
                            width_px,
                            height_px,
                            stream,
                        },
                    );
                }
                Err(reason) => images.mark_unavailable(
                    record.sequence,
                    &attachment.filename,
                    failure(format!("could not decode image: {reason}")),
                ),
            }
        }
    }
    Ok(images)
}

fn decode_image(bytes: Vec<u8>) -> Result<(Stream, u32, u32), String> {
    let stream = lopdf::xobject::image_from(bytes).map_err(|error| error.to_string())?;
    let dimension = |key: &[u8]| {
        stream
            .dict
            .get(key)
            .and_then(|value| value.as_i64())
            .ok()
            .and_then(|value| u32::try_from(value).ok())
            .filter(|value| *value > 0)
    };
    match (dimension(b"Width"), dimension(b"Height")) {
        (Some(width), Some(height)) => Ok((stream, width, height)),
        _ => Err("image has no usable dimensions".to_string()),
    }
}
