use anyhow::{Context, Result};
use courier_archive::{run_archive_job, run_listener, ArchiveConfig, ArchiveError, ArchiveReport};
use courier_cli::{ArchiveArgs, Cli, CliCommand, SlackArgs};
use tracing::info;

pub(crate) async fn run_cli(cli: Cli) -> Result<()> {
    match &cli.command {
        CliCommand::Archive(args) => run_archive_command(&cli.slack, args).await,
        CliCommand::Listen(args) => {
            let config = args.listener_config(&cli.slack);
            run_listener(&config).await
        }
    }
}

async fn verify_bot_token(config: &ArchiveConfig) -> Result<()> {
    config.credentials.require_bot_token()?;
    let identity = config
        .slack_client()?
        .auth_test()
        .await
        .map_err(|error| ArchiveError::from_slack(error, "auth.test"))
        .context("failed to verify slack bot token")?;
    info!(bot_user_id = identity.user_id.as_str(), "slack bot authenticated");
    Ok(())
}

async fn run_archive_command(slack: &SlackArgs, args: &ArchiveArgs) -> Result<()> {
    let config = slack.archive_config(args.job_ledger.clone());
    verify_bot_token(&config).await?;
    let job = args.to_job();
    let report = run_archive_job(&config, &job)
        .await
        .with_context(|| format!("failed to archive {}", job.channel))?;
    for line in archive_summary_lines(&report) {
        println!("{line}");
    }
    Ok(())
}

pub(crate) fn archive_summary_lines(report: &ArchiveReport) -> Vec<String> {
    let mut lines = vec![
        format!(
            "archived #{} ({} records, {} pages)",
            report.channel.name, report.record_count, report.document.page_count
        ),
        format!("csv: {}", report.artifacts.csv_path.display()),
        format!("pdf: {}", report.artifacts.pdf_path.display()),
    ];
    if !report.delivery.uploaded.is_empty() {
        lines.push(format!("uploaded: {}", report.delivery.uploaded.join(", ")));
    }
    for warning in &report.warnings {
        lines.push(format!(
            "warning: record {} attachment {}: {}",
            warning.sequence, warning.filename, warning.error
        ));
    }
    lines
}
