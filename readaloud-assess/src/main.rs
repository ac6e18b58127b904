//! readaloud-assess - read-aloud pronunciation assessment
//!
//! Runs one assessment from the command line and prints the result as JSON:
//!
//! ```text
//! readaloud-assess --audio recording.webm --text "I have a red van"
//! ```
//!
//! Exit status: 0 on success, 2 when the recording should simply be retried,
//! 1 for any other failure.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;
use readaloud_assess::models::AssessmentResult;
use readaloud_assess::{AppContext, AssessConfig, AssessError};
use readaloud_common::logging::init_tracing;
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "readaloud-assess", version, about = "Assess a child's read-aloud recording")]
struct Cli {
    /// Recorded audio file (any common container/codec)
    #[arg(long)]
    audio: PathBuf,

    /// Sentence the child was asked to read
    #[arg(long)]
    text: String,

    /// TOML config file (overrides READALOUD_CONFIG)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Data folder for narration assets and cache (overrides READALOUD_DATA_DIR)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Skip narration
    #[arg(long)]
    no_narration: bool,

    /// Also write the narration WAV to this file
    #[arg(long)]
    narration_out: Option<PathBuf>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Report {
    #[serde(flatten)]
    result: AssessmentResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    narration_audio_base64: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            let retryable = is_user_retryable(&e);

            error!("{:#}", e);
            eprintln!("Error: {:#}", e);

            if let Some(assess_error) = e.downcast_ref::<AssessError>() {
                eprintln!("{}", assess_error.user_message());
            }

            if retryable {
                ExitCode::from(2)
            } else {
                ExitCode::from(1)
            }
        }
    }
}

/// Whether the failure is one the child can fix by recording again
fn is_user_retryable(e: &anyhow::Error) -> bool {
    e.downcast_ref::<AssessError>()
        .is_some_and(AssessError::is_user_retryable)
}

async fn run(cli: Cli) -> Result<()> {
    let config = AssessConfig::load(cli.config.as_deref(), cli.data_dir.as_deref())?;
    init_tracing(&config.logging)?;

    info!("Starting readaloud-assess");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));
    info!("Data folder: {}", config.data_dir.display());

    let audio = tokio::fs::read(&cli.audio)
        .await
        .with_context(|| format!("Failed to read {}", cli.audio.display()))?;

    let context = AppContext::new(config);
    let orchestrator = context.orchestrator().await?;

    let result = orchestrator.assess(&audio, &cli.text).await?;

    let narration = if cli.no_narration {
        None
    } else {
        orchestrator
            .spawn_narration(result.clone())
            .await
            .context("Narration task panicked")?
    };

    if let (Some(path), Some(wav)) = (&cli.narration_out, &narration) {
        tokio::fs::write(path, wav)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        info!("Narration written to {}", path.display());
    }

    let report = Report {
        result,
        narration_audio_base64: narration.map(|wav| BASE64.encode(wav)),
    };
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}
