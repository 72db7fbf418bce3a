/// # evidence-collector CLI interface
///
/// Command parsing and the user-visible flow around a collection run. All pipeline logic
/// (queries, documents, uploads) lives in [`evidence-collector-core`]; this module only loads
/// the config, builds the real clients, and reports the outcome.
///
/// ## How To Use
/// - From the shell: `evidence-collector github --config collector.yaml` or
///   `evidence-collector jira --config collector.yaml`. Pass `--yes` to skip the ENTER prompts.
/// - Programmatically: call [`run`] with a constructed [`Cli`], or [`run_with_io`] to supply
///   your own input and output streams.
///
/// [`evidence-collector-core`]: ../../evidence-collector-core/
use crate::load_config::{load_config, Pipeline};
use crate::prompt::{acknowledge, CONTINUE_PROMPT, EXIT_PROMPT};
use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use evidence_collector_core::collect::{
    collect_github, collect_jira, CollectionOutcome, UploadedEvidence,
};
use evidence_collector_core::config::CollectorConfig;
use evidence_collector_core::error::CollectError;
use evidence_collector_core::github::GithubClient;
use evidence_collector_core::jira::JiraClient;
use evidence_collector_core::uploader::TugboatClient;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Collect GitHub Enterprise Server or Jira Server evidence and upload it to Tugboat Logic.
#[derive(Parser)]
#[clap(
    name = "evidence-collector",
    version,
    about = "Collect GitHub Enterprise Server and Jira Server evidence for Tugboat Logic"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upload one CSV per merged pull request found by the GitHub search query
    Github {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Do not wait for ENTER before and after the run
        #[clap(long)]
        yes: bool,
    },
    /// Upload one workbook with every issue found by the JQL query
    Jira {
        /// Path to the YAML config file
        #[clap(long)]
        config: PathBuf,
        /// Do not wait for ENTER before and after the run
        #[clap(long)]
        yes: bool,
    },
}

impl Pipeline {
    fn banner(self) -> &'static str {
        match self {
            Pipeline::Github => "Starting custom Evidence Collector sample for GitHub Server",
            Pipeline::Jira => "Starting custom Evidence Collector sample for Jira Server",
        }
    }

    fn no_results(self) -> &'static str {
        match self {
            Pipeline::Github => "No results from GitHub server",
            Pipeline::Jira => "No results from Jira server",
        }
    }

    fn generated(self) -> &'static str {
        match self {
            Pipeline::Github => "CSV output file generated",
            Pipeline::Jira => "Excel output file generated",
        }
    }
}

/// Entrypoint used by `main`: prompts on stdin, reports on stdout.
pub async fn run(cli: Cli) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    run_with_io(cli, &mut input, &mut output).await
}

pub async fn run_with_io<R: BufRead, W: Write>(
    cli: Cli,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    // Emit a top-level 'trace_initialised' event at the very start
    tracing::info!("trace_initialised");

    let (pipeline, config_path, yes) = match cli.command {
        Commands::Github { config, yes } => (Pipeline::Github, config, yes),
        Commands::Jira { config, yes } => (Pipeline::Jira, config, yes),
    };
    tracing::info!(?pipeline, config = ?config_path, yes, "Starting evidence collection");

    writeln!(output, "{}", pipeline.banner())?;
    if !yes {
        acknowledge(input, output, CONTINUE_PROMPT)?;
    }

    let config = load_config(&config_path, pipeline)?;
    match collect(pipeline, &config).await {
        Ok(outcome) => write_outcome(output, pipeline, &outcome)?,
        Err(e) => {
            tracing::error!(?pipeline, error = %e, "Evidence collection failed");
            write_partial_uploads(output, pipeline, &e)?;
            return Err(e);
        }
    }

    if !yes {
        acknowledge(input, output, EXIT_PROMPT)?;
    }
    Ok(())
}

fn write_outcome<W: Write>(
    output: &mut W,
    pipeline: Pipeline,
    outcome: &CollectionOutcome,
) -> io::Result<()> {
    match outcome {
        CollectionOutcome::NoResults => writeln!(output, "{}", pipeline.no_results()),
        CollectionOutcome::Uploaded(report) => {
            tracing::info!(?pipeline, ?report, "Evidence collection complete");
            writeln!(output, "{}", pipeline.generated())?;
            write_uploads(output, &report.uploads)
        }
    }
}

/// An upload failure still reports the documents that were generated and the ids already
/// assigned before it.
fn write_partial_uploads<W: Write>(
    output: &mut W,
    pipeline: Pipeline,
    error: &anyhow::Error,
) -> io::Result<()> {
    if let Some(CollectError::Upload { uploaded, .. }) = error.downcast_ref::<CollectError>() {
        writeln!(output, "{}", pipeline.generated())?;
        write_uploads(output, uploaded)?;
    }
    Ok(())
}

fn write_uploads<W: Write>(output: &mut W, uploads: &[UploadedEvidence]) -> io::Result<()> {
    for upload in uploads {
        writeln!(
            output,
            "Evidence uploaded to Tugboat Logic, result Id {}",
            upload.evidence_id
        )?;
    }
    Ok(())
}

async fn collect(pipeline: Pipeline, config: &CollectorConfig) -> Result<CollectionOutcome> {
    let uploader = TugboatClient::new(&config.tugboat)?;
    let outcome = match pipeline {
        Pipeline::Github => {
            let settings = config
                .github
                .as_ref()
                .ok_or_else(|| anyhow!("config file has no `github` section"))?;
            let client = GithubClient::new(settings)?;
            collect_github(&client, &uploader, settings, &config.output).await?
        }
        Pipeline::Jira => {
            let settings = config
                .jira
                .as_ref()
                .ok_or_else(|| anyhow!("config file has no `jira` section"))?;
            let client = JiraClient::new(settings)?;
            collect_jira(&client, &uploader, settings, &config.output).await?
        }
    };
    Ok(outcome)
}
