//! The archive pipeline shared by the CLI and the event listener.

use std::path::{Path, PathBuf};

use courier_core::{current_unix_timestamp_ms, sanitize_for_path, title_case};
use tracing::{info, warn};

use crate::delivery::{deliver, ArchiveArtifacts, DeliveryOptions, DeliveryOutcome};
use crate::document::{collect_images, write_document, DocumentHeader, ImageSet, RenderWarning, RenderedDocument};
use crate::history::fetch_history;
use crate::ledger::{JobLedger, JobLedgerEntry, LedgerArtifact, JOB_LEDGER_SCHEMA_VERSION};
use crate::normalize::{RecordNormalizer, DISPLAY_TIMESTAMP_FORMAT};
use crate::{
    csv_export::{write_csv, CsvOptions},
    ArchiveChannel, ArchiveConfig, ArchiveError, ArchiveJob, ArchivePlatform, Requester,
};

/// Linear job lifecycle; any failure jumps straight to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveStage {
    Fetching,
    Normalizing,
    Exporting,
    Rendering,
    Delivering,
    Done,
    Failed,
}

impl ArchiveStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Normalizing => "normalizing",
            Self::Exporting => "exporting",
            Self::Rendering => "rendering",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

#[derive(Debug)]
pub struct ArchiveReport {
    pub channel: ArchiveChannel,
    pub artifacts: ArchiveArtifacts,
    pub record_count: usize,
    pub csv_bytes: u64,
    pub document: RenderedDocument,
    pub warnings: Vec<RenderWarning>,
    pub delivery: DeliveryOutcome,
    /// Stages passed through, ending in `Done`.
    pub stages: Vec<ArchiveStage>,
}

struct StageTracker {
    channel: String,
    stages: Vec<ArchiveStage>,
}

impl StageTracker {
    fn new(channel: String) -> Self {
        Self {
            channel,
            stages: Vec::new(),
        }
    }

    fn current(&self) -> Option<ArchiveStage> {
        self.stages.last().copied()
    }

    fn advance(&mut self, next: ArchiveStage) {
        info!(
            channel = self.channel.as_str(),
            from = self.current().map(|stage| stage.as_str()).unwrap_or("start"),
            to = next.as_str(),
            "archive job stage"
        );
        self.stages.push(next);
    }

    fn reached(&self, stage: ArchiveStage) -> bool {
        self.stages.contains(&stage)
    }

    fn fail(&mut self, error: &ArchiveError) {
        warn!(
            channel = self.channel.as_str(),
            from = self.current().map(|stage| stage.as_str()).unwrap_or("start"),
            error_kind = error.kind(),
            error = %error,
            "archive job failed"
        );
        self.stages.push(ArchiveStage::Failed);
    }
}

/// Directory name for a channel's archive: `<Title Case name> Archive`.
pub fn archive_directory_name(channel_name: &str) -> String {
    format!("{} Archive", title_case(&sanitize_for_path(channel_name)))
}

pub fn archive_directory(output_dir: &Path, channel_name: &str) -> PathBuf {
    output_dir.join(archive_directory_name(channel_name))
}

/// Runs one job against Slack and, when configured, appends it to the job ledger.
pub async fn run_archive_job(
    config: &ArchiveConfig,
    job: &ArchiveJob,
) -> Result<ArchiveReport, ArchiveError> {
    config.credentials.require_bot_token()?;
    let client = config.slack_client()?;
    let result = run_archive_job_with_platform(&client, job).await;
    if let Some(path) = config.ledger_path.as_ref() {
        match JobLedger::open(path.clone()) {
            Ok(ledger) => record_job_outcome(&ledger, job, &result),
            Err(error) => warn!("failed to open job ledger: {error:#}"),
        }
    }
    result
}

/// Local output written by the current run, removed again if the run fails
/// before delivery.
#[derive(Debug, Default)]
struct PartialOutput {
    /// Set when this run created the archive directory.
    created_directory: Option<PathBuf>,
    /// Files and directories this run wrote into a pre-existing archive directory.
    written: Vec<PathBuf>,
}

impl PartialOutput {
    fn record(&mut self, path: &Path) {
        if self.created_directory.is_none() {
            self.written.push(path.to_path_buf());
        }
    }

    fn remove(self, directory_hint: Option<&Path>) {
        if let Some(directory) = self.created_directory {
            remove_partial_archive(&directory);
            return;
        }
        for path in &self.written {
            let removed = if path.is_dir() {
                std::fs::remove_dir_all(path)
            } else {
                std::fs::remove_file(path)
            };
            match removed {
                Ok(()) => {}
                Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
                Err(error) => warn!(
                    path = %path.display(),
                    error = %error,
                    "failed to remove partial archive output"
                ),
            }
        }
        if let Some(directory) = directory_hint.filter(|directory| directory.exists()) {
            warn!(
                directory = %directory.display(),
                removed = self.written.len(),
                "archive directory predates this run; earlier artifacts were left in place"
            );
        }
    }
}

/// Runs the full pipeline for `job` against any [`ArchivePlatform`].
///
/// A failure before delivery removes what this run wrote: the whole archive
/// directory if this run created it, otherwise only this run's files. Once
/// delivery starts the CSV and PDF are complete and are always kept.
pub async fn run_archive_job_with_platform<P>(
    platform: &P,
    job: &ArchiveJob,
) -> Result<ArchiveReport, ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    let mut tracker = StageTracker::new(job.channel.to_string());
    let mut partial = PartialOutput::default();
    let mut directory = None;
    match execute(platform, job, &mut tracker, &mut partial, &mut directory).await {
        Ok(mut report) => {
            tracker.advance(ArchiveStage::Done);
            report.stages = tracker.stages;
            info!(
                channel = report.channel.name.as_str(),
                records = report.record_count,
                warnings = report.warnings.len(),
                directory = %report.artifacts.directory.display(),
                "archive job finished"
            );
            Ok(report)
        }
        Err(error) => {
            let delivering = tracker.reached(ArchiveStage::Delivering);
            tracker.fail(&error);
            if !delivering && !error.preserves_local_artifacts() {
                partial.remove(directory.as_deref());
            }
            Err(error)
        }
    }
}

async fn execute<P>(
    platform: &P,
    job: &ArchiveJob,
    tracker: &mut StageTracker,
    partial: &mut PartialOutput,
    archive_dir: &mut Option<PathBuf>,
) -> Result<ArchiveReport, ArchiveError>
where
    P: ArchivePlatform + ?Sized,
{
    tracker.advance(ArchiveStage::Fetching);
    let channel = platform.resolve_channel(&job.channel).await?;
    if !channel.is_member {
        return Err(ArchiveError::NotAMember(channel.name.clone()));
    }
    let messages = fetch_history(platform, &channel.id).await?;

    tracker.advance(ArchiveStage::Normalizing);
    let mut normalizer = RecordNormalizer::new(platform);
    let records = normalizer.normalize_all(&messages).await?;
    let requested_by = match job.requested_by.as_ref() {
        Some(Requester::SlackUser(user_id)) => Some(normalizer.resolve_user(user_id).await?),
        Some(Requester::Local(name)) => Some(name.clone()),
        None => None,
    };

    tracker.advance(ArchiveStage::Exporting);
    let directory = archive_directory(&job.output_dir, &channel.name);
    if directory.exists() {
        info!(
            directory = %directory.display(),
            "archive directory already exists; overwriting its artifacts"
        );
    } else {
        std::fs::create_dir_all(&directory).map_err(|source| {
            ArchiveError::io(format!("failed to create {}", directory.display()), source)
        })?;
        partial.created_directory = Some(directory.clone());
    }
    *archive_dir = Some(directory.clone());
    let file_stem = sanitize_for_path(&channel.name);
    let artifacts = ArchiveArtifacts {
        csv_path: directory.join(format!("{file_stem}.csv")),
        pdf_path: directory.join(format!("{file_stem}.pdf")),
        directory,
    };
    partial.record(&artifacts.csv_path);
    let csv_bytes = write_csv(&artifacts.csv_path, &records, CsvOptions::default())?;

    tracker.advance(ArchiveStage::Rendering);
    let images = if job.embed_images {
        collect_images(platform, &records, &artifacts.directory).await?
    } else {
        ImageSet::default()
    };
    for image_dir in images.directories() {
        partial.record(image_dir);
    }
    let header = DocumentHeader {
        channel_name: channel.name.clone(),
        exported_on: job.requested_at.format(DISPLAY_TIMESTAMP_FORMAT).to_string(),
        requested_by,
    };
    partial.record(&artifacts.pdf_path);
    let document = write_document(&artifacts.pdf_path, &header, &records, &images)?;

    tracker.advance(ArchiveStage::Delivering);
    let image_dirs = images.directories().to_vec();
    let delivery = deliver(
        platform,
        &channel,
        &artifacts,
        DeliveryOptions {
            post_to_channel: job.post_to_channel,
            keep_images: job.keep_images,
        },
        &image_dirs,
    )
    .await?;

    Ok(ArchiveReport {
        channel,
        artifacts,
        record_count: records.len(),
        csv_bytes,
        document,
        warnings: images.into_warnings(),
        delivery,
        stages: Vec::new(),
    })
}

fn remove_partial_archive(directory: &Path) {
    match std::fs::remove_dir_all(directory) {
        Ok(()) => info!(directory = %directory.display(), "removed partial archive directory"),
        Err(error) if error.kind() == std::io::ErrorKind::NotFound => {}
        Err(error) => warn!(
            directory = %directory.display(),
            error = %error,
            "failed to remove partial archive directory"
        ),
    }
}

/// Appends the outcome of `job` to `ledger`; ledger problems are logged, never fatal.
pub fn record_job_outcome(
    ledger: &JobLedger,
    job: &ArchiveJob,
    result: &Result<ArchiveReport, ArchiveError>,
) {
    let mut entry = JobLedgerEntry {
        schema_version: JOB_LEDGER_SCHEMA_VERSION,
        recorded_unix_ms: current_unix_timestamp_ms(),
        channel: job.channel.to_string(),
        channel_id: None,
        requested_by: job.requested_by.as_ref().map(|requester| requester.label().to_string()),
        status: "succeeded".to_string(),
        error_kind: None,
        error: None,
        records: 0,
        warnings: 0,
        artifacts: Vec::new(),
    };
    match result {
        Ok(report) => {
            entry.channel_id = Some(report.channel.id.clone());
            entry.records = report.record_count;
            entry.warnings = report.warnings.len();
            for path in [&report.artifacts.csv_path, &report.artifacts.pdf_path] {
                match LedgerArtifact::from_file(path) {
                    Ok(artifact) => entry.artifacts.push(artifact),
                    Err(error) => warn!("failed to checksum archive artifact: {error:#}"),
                }
            }
        }
        Err(error) => {
            entry.status = "failed".to_string();
            entry.error_kind = Some(error.kind().to_string());
            entry.error = Some(error.to_string());
        }
    }
    if let Err(error) = ledger.append(&entry) {
        warn!("failed to append job ledger entry: {error:#}");
    }
}
