//! # contract: seams between the pipeline stages
//!
//! The orchestrator in [`crate::collect`] only talks to the outside world through
//! the traits defined here:
//!
//! - [`PullRequestSource`]: GitHub Enterprise Server search plus the detail calls
//!   used to enrich each hit.
//! - [`IssueSource`]: Jira Server JQL search.
//! - [`EvidenceUploader`]: the Tugboat Logic evidence collection endpoint.
//!
//! The real implementations live in [`crate::github`], [`crate::jira`] and
//! [`crate::uploader`]. All traits are annotated for `mockall` so orchestrator
//! tests can run without a network.

use async_trait::async_trait;
use mockall::automock;
use serde::Deserialize;

use crate::document::EvidenceDocument;
use crate::error::{SourceQueryError, UploadError};
use crate::github::{Comment, PullRequest, Review, SearchResponse};
use crate::jira::JiraSearchResponse;

/// Acknowledgement returned by the evidence collection endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct UploadReceipt {
    pub id: i64,
}

/// Read access to a GitHub Enterprise Server instance.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait PullRequestSource: Send + Sync {
    /// Run an issue search with an already rendered query.
    async fn search(&self, query: &str) -> Result<SearchResponse, SourceQueryError>;

    /// Fetch a pull request by its API URL.
    async fn pull_request(&self, url: &str) -> Result<PullRequest, SourceQueryError>;

    /// Fetch the issue comments behind a pull request's `_links.comments.href`.
    async fn comments(&self, url: &str) -> Result<Vec<Comment>, SourceQueryError>;

    /// Fetch the reviews of the pull request at `pull_request_url`.
    async fn reviews(&self, pull_request_url: &str) -> Result<Vec<Review>, SourceQueryError>;
}

/// Read access to a Jira Server instance.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait IssueSource: Send + Sync {
    /// Run a JQL search and return the single result page.
    async fn search(&self, jql: &str) -> Result<JiraSearchResponse, SourceQueryError>;
}

/// Destination for generated evidence documents.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait EvidenceUploader: Send + Sync {
    /// Upload one document and return the endpoint's receipt.
    async fn upload(&self, document: &EvidenceDocument) -> Result<UploadReceipt, UploadError>;
}
