//! CSV evidence for GitHub pull requests, one document per pull request.

use tracing::{error, info};

use crate::config::OutputSettings;
use crate::document::{EvidenceDocument, EvidenceFormat};
use crate::error::DocumentGenerationError;
use crate::github::{Comment, PullRequestRecord, Review, User};

const SECTION_RULE: &str = "------------------------------------";
const ENTRY_SEPARATOR: &str = "\n";
/// Shown instead of a submission time for reviews that are not submitted yet.
const PENDING_REVIEW: &str = "pending";

/// Document name for a pull request, without extension.
pub fn document_name(record: &PullRequestRecord) -> String {
    format!("pull_request-{}", record.pull_request.node_id)
}

/// Render every record and persist each as its own document.
///
/// Fails on the first record that cannot be rendered; nothing has been uploaded
/// at that point.
pub fn generate_csv_documents(
    records: &[PullRequestRecord],
    output: &OutputSettings,
) -> Result<Vec<EvidenceDocument>, DocumentGenerationError> {
    let mut documents = Vec::with_capacity(records.len());
    for record in records {
        let name = document_name(record);
        let contents = render_pull_request(record).map_err(|e| {
            error!(document = %name, error = %e, "Failed to render pull request CSV");
            e
        })?;
        documents.push(EvidenceDocument::persist(
            name,
            EvidenceFormat::Csv,
            &contents,
            output,
        )?);
    }
    info!(count = documents.len(), "CSV evidence documents generated");
    Ok(documents)
}

/// The fixed key/value layout for one pull request.
pub fn pull_request_rows(
    record: &PullRequestRecord,
) -> Result<Vec<Vec<String>>, DocumentGenerationError> {
    let pr = &record.pull_request;
    let missing = |field| DocumentGenerationError::MissingField {
        record: pr.node_id.clone(),
        field,
    };
    let head_repo = pr.head.repo.as_ref().ok_or_else(|| missing("head.repo"))?;
    let base_repo = pr.base.repo.as_ref().ok_or_else(|| missing("base.repo"))?;
    let merged_by = pr.merged_by.as_ref().ok_or_else(|| missing("merged_by"))?;
    let merged_at = pr.merged_at.as_deref().ok_or_else(|| missing("merged_at"))?;

    let pair = |label: &str, value: &str| vec![label.to_string(), value.to_string()];
    let single = |text: &str| vec![text.to_string()];

    Ok(vec![
        single("Pull Request Details"),
        single(SECTION_RULE),
        pair("Pull Request ID", &pr.node_id),
        pair("Pull Request URL", &pr.html_url),
        pair("Pull Request Description", pr.body.as_deref().unwrap_or_default()),
        pair("Pull Request Created At", &pr.created_at),
        single(""),
        pair("Author Name", &pr.user.login),
        pair("Author Profile", &pr.user.html_url),
        single(""),
        pair("Incoming (Head) Repository", &head_repo.full_name),
        pair("Incoming Ref Name", &pr.head.ref_name),
        pair("Incoming Commit", &pr.head.sha),
        single(""),
        single("Code Review Outcome"),
        single(SECTION_RULE),
        pair("Merged By", &merged_by.login),
        pair("Merged By Profile", &merged_by.html_url),
        pair("Merged At", merged_at),
        single(""),
        pair("Target (Base) Repository", &base_repo.full_name),
        pair("Target Ref Name", &pr.base.ref_name),
        pair("Target Commit", &pr.base.sha),
        single(""),
        pair("Latest Reviews", &format_reviews(&record.reviews)),
        pair("Latest Comments", &format_comments(&record.comments)),
    ])
}

fn render_pull_request(record: &PullRequestRecord) -> Result<Vec<u8>, DocumentGenerationError> {
    let mut writer = csv::WriterBuilder::new()
        .flexible(true)
        .terminator(csv::Terminator::CRLF)
        .from_writer(Vec::new());
    for row in pull_request_rows(record)? {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    writer.into_inner().map_err(|e| {
        DocumentGenerationError::Io(std::io::Error::new(e.error().kind(), e.error().to_string()))
    })
}

fn author(user: &User) -> String {
    format!("{} ({})", user.login, user.html_url)
}

/// Reviews, most recent first.
pub fn format_reviews(reviews: &[Review]) -> String {
    reviews
        .iter()
        .rev()
        .map(|review| {
            format!(
                "{} by {} {} on {}:\n\n{}\n",
                review.state,
                review.author_association,
                author(&review.user),
                review.submitted_at.as_deref().unwrap_or(PENDING_REVIEW),
                review.body.as_deref().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}

/// Comments, most recent first.
pub fn format_comments(comments: &[Comment]) -> String {
    comments
        .iter()
        .rev()
        .map(|comment| {
            format!(
                "By {} {} on {}:\n\n{}\n",
                comment.author_association,
                author(&comment.user),
                comment.created_at,
                comment.body.as_deref().unwrap_or_default(),
            )
        })
        .collect::<Vec<_>>()
        .join(ENTRY_SEPARATOR)
}
