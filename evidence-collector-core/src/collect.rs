//! # collect: the two evidence pipelines
//!
//! Top-level orchestration for one collection run. Each pipeline is strictly
//! sequential:
//!
//! 1. query the source system (through [`PullRequestSource`] or [`IssueSource`])
//! 2. return [`CollectionOutcome::NoResults`] when nothing matched
//! 3. turn the records into evidence documents
//! 4. upload each document, one after another, through [`EvidenceUploader`]
//! 5. discard every temporary file, whether the uploads succeeded or not
//!
//! The first error at any stage ends the run. Nothing is retried.
//!
//! # Navigation
//! - Entrypoints: [`collect_github`], [`collect_jira`]
//! - Result types: [`CollectionOutcome`], [`CollectionReport`]

use chrono::Local;
use tracing::{error, info, warn};

use crate::config::{GithubSettings, JiraSettings, OutputSettings};
use crate::contract::{EvidenceUploader, IssueSource, PullRequestSource};
use crate::csv_document::generate_csv_documents;
use crate::document::EvidenceDocument;
use crate::error::{CollectError, DocumentGenerationError};
use crate::github::{fetch_pull_requests, render_query, DateWindow};
use crate::jira::{fetch_issues, IssueRecord};
use crate::workbook::generate_workbook_document;

/// What a run ended with, when it did not fail.
#[derive(Debug, PartialEq, Eq)]
pub enum CollectionOutcome {
    /// The search matched nothing; no document was produced or uploaded.
    NoResults,
    Uploaded(CollectionReport),
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct CollectionReport {
    pub uploads: Vec<UploadedEvidence>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedEvidence {
    pub name: String,
    pub file_name: String,
    pub evidence_id: i64,
    pub sha256: String,
}

/// Collect merged pull requests from GitHub Enterprise Server, one CSV each.
pub async fn collect_github<S, U>(
    source: &S,
    uploader: &U,
    settings: &GithubSettings,
    output: &OutputSettings,
) -> Result<CollectionOutcome, CollectError>
where
    S: PullRequestSource + ?Sized,
    U: EvidenceUploader + ?Sized,
{
    let window = DateWindow::ending_today(Local::now().date_naive(), settings.filter_date_range)
        .map_err(|e| {
            error!(error = %e, "Cannot build GitHub search window");
            e
        })?;
    let query = render_query(&settings.query, window);
    info!(
        query = %query,
        start = %window.start,
        end = %window.end,
        "Starting GitHub evidence collection"
    );

    let records = fetch_pull_requests(source, &query).await.map_err(|e| {
        error!(error = %e, "GitHub query failed");
        e
    })?;
    if records.is_empty() {
        info!("No pull requests matched the query");
        return Ok(CollectionOutcome::NoResults);
    }

    let documents = generate_csv_documents(&records, output)?;
    upload_all(uploader, documents).await
}

/// Collect resolved Jira issues into a single two-sheet workbook.
pub async fn collect_jira<S, U>(
    source: &S,
    uploader: &U,
    settings: &JiraSettings,
    output: &OutputSettings,
) -> Result<CollectionOutcome, CollectError>
where
    S: IssueSource + ?Sized,
    U: EvidenceUploader + ?Sized,
{
    info!(jql = %settings.query, "Starting Jira evidence collection");

    let issues = match fetch_issues(source, &settings.query).await {
        Ok(Some(issues)) if !issues.is_empty() => issues,
        Ok(_) => {
            info!("No issues matched the query");
            return Ok(CollectionOutcome::NoResults);
        }
        Err(e) => {
            error!(error = %e, "Jira query failed");
            return Err(e.into());
        }
    };

    let records = issues
        .into_iter()
        .map(IssueRecord::try_from)
        .collect::<Result<Vec<_>, DocumentGenerationError>>()
        .map_err(|e| {
            error!(error = %e, "Jira issue cannot be written to the workbook");
            e
        })?;

    let document = generate_workbook_document(
        &records,
        &settings.query,
        settings.report_window_days,
        output,
        Local::now().naive_local(),
    )?;
    upload_all(uploader, vec![document]).await
}

/// Upload in order, stopping at the first failure, then discard every document.
async fn upload_all<U>(
    uploader: &U,
    documents: Vec<EvidenceDocument>,
) -> Result<CollectionOutcome, CollectError>
where
    U: EvidenceUploader + ?Sized,
{
    let mut report = CollectionReport::default();
    let mut failure = None;

    for document in &documents {
        match uploader.upload(document).await {
            Ok(receipt) => report.uploads.push(UploadedEvidence {
                name: document.name().to_string(),
                file_name: document.file_name(),
                evidence_id: receipt.id,
                sha256: document.sha256().to_string(),
            }),
            Err(e) => {
                error!(error = %e, file_name = %document.file_name(), "Upload failed, aborting run");
                failure = Some(e);
                break;
            }
        }
    }

    for document in documents {
        let file_name = document.file_name();
        if let Err(e) = document.discard() {
            warn!(error = %e, file_name = %file_name, "Could not remove temporary evidence file");
        }
    }

    match failure {
        Some(source) => Err(CollectError::Upload {
            source,
            uploaded: report.uploads,
        }),
        None => {
            info!(uploads = report.uploads.len(), "Evidence collection finished");
            Ok(CollectionOutcome::Uploaded(report))
        }
    }
}
