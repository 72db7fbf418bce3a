//! Error types for the evidence pipelines.
//!
//! One enum per failing stage: querying the source system, turning records into
//! a document, and uploading the document. [`CollectError`] wraps all three and is
//! what the orchestrator in [`crate::collect`] returns. None of these are retried.

use thiserror::Error;

use crate::collect::UploadedEvidence;

/// Failure while talking to the GitHub or Jira search APIs.
#[derive(Debug, Error)]
pub enum SourceQueryError {
    #[error("invalid endpoint {url}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("filter date range of {days} days is outside the supported calendar")]
    DateRange { days: u32 },

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: u16,
        body: String,
    },

    #[error("could not decode response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Failure while building an evidence document from fetched records.
#[derive(Debug, Error)]
pub enum DocumentGenerationError {
    #[error("record {record} is missing field `{field}`")]
    MissingField { record: String, field: &'static str },

    #[error("record {record} has an invalid `{field}` timestamp {value:?}: {source}")]
    InvalidTimestamp {
        record: String,
        field: &'static str,
        value: String,
        #[source]
        source: chrono::ParseError,
    },

    #[error("report window of {days} days is outside the supported calendar")]
    DateRange { days: u32 },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("workbook error: {0}")]
    Workbook(#[from] rust_xlsxwriter::XlsxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Failure while posting a document to the evidence collection endpoint.
#[derive(Debug, Error)]
pub enum UploadError {
    #[error("could not read evidence file: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("evidence endpoint returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("could not decode evidence endpoint response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Any fatal failure of a collection run.
#[derive(Debug, Error)]
pub enum CollectError {
    #[error("source query failed: {0}")]
    SourceQuery(#[from] SourceQueryError),

    #[error("document generation failed: {0}")]
    DocumentGeneration(#[from] DocumentGenerationError),

    /// An upload failed. `uploaded` holds the documents that were accepted
    /// before it, in upload order; that evidence already exists remotely.
    #[error("upload failed after {} successful upload(s): {source}", .uploaded.len())]
    Upload {
        #[source]
        source: UploadError,
        uploaded: Vec<UploadedEvidence>,
    },
}
