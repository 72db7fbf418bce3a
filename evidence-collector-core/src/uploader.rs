//! # Tugboat Logic evidence upload
//!
//! [`TugboatClient`] implements [`EvidenceUploader`] against the evidence
//! collection endpoint configured as `tugboat.collector_url`. Each document is
//! sent as a two-part multipart body:
//!
//! - `collected`: the collection date, `YYYY-MM-DD` in local time
//! - `file`: the document bytes, under the document's file name and MIME type
//!
//! Authentication is HTTP Basic plus an `X-API-KEY` header. Requests carry the
//! same fixed `User-Agent` as the source clients. A failed upload is returned
//! as [`UploadError`] and never retried.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Request, StatusCode};
use tracing::{error, info};

use crate::config::{Secret, TugboatSettings};
use crate::contract::{EvidenceUploader, UploadReceipt};
use crate::document::EvidenceDocument;
use crate::error::UploadError;
use crate::http;

pub use crate::http::basic_auth_header;

/// Header carrying the Tugboat Logic API key.
pub const API_KEY_HEADER: &str = "X-API-KEY";

/// Layout of the `collected` form field.
pub const COLLECTED_FORMAT: &str = "%Y-%m-%d";

pub struct TugboatClient {
    client: Client,
    collector_url: String,
    username: String,
    password: Secret,
    api_key: Secret,
}

impl TugboatClient {
    pub fn new(settings: &TugboatSettings) -> Result<Self, UploadError> {
        info!(
            collector_url = %settings.collector_url,
            username = %settings.username,
            api_key_len = settings.api_key.len(),
            "Initialised Tugboat Logic client"
        );
        Ok(Self {
            client: Client::builder().build()?,
            collector_url: settings.collector_url.clone(),
            username: settings.username.clone(),
            password: settings.password.clone(),
            api_key: settings.api_key.clone(),
        })
    }

    /// Build the multipart upload request for `document`, collected on `collected`.
    pub fn request(
        &self,
        document: &EvidenceDocument,
        collected: NaiveDate,
    ) -> Result<Request, UploadError> {
        let bytes = document.read()?;
        let file = Part::bytes(bytes)
            .file_name(document.file_name())
            .mime_str(document.format().mime_type())?;
        let form = Form::new()
            .text("collected", collected.format(COLLECTED_FORMAT).to_string())
            .part("file", file);

        Ok(self
            .client
            .post(&self.collector_url)
            .header(
                AUTHORIZATION,
                basic_auth_header(&self.username, self.password.expose()),
            )
            .header(API_KEY_HEADER, self.api_key.expose())
            .header(USER_AGENT, http::USER_AGENT)
            .multipart(form)
            .build()?)
    }
}

#[async_trait]
impl EvidenceUploader for TugboatClient {
    async fn upload(&self, document: &EvidenceDocument) -> Result<UploadReceipt, UploadError> {
        info!(
            file_name = %document.file_name(),
            sha256 = %document.sha256(),
            collector_url = %self.collector_url,
            "Uploading evidence"
        );
        let request = self.request(document, Local::now().date_naive())?;

        let response = self.client.execute(request).await.map_err(|e| {
            error!(error = ?e, file_name = %document.file_name(), "Evidence upload failed");
            UploadError::Http(e)
        })?;
        let status = response.status();
        let body = response.text().await?;

        let receipt = receipt_from_response(status, &body)?;
        info!(
            evidence_id = receipt.id,
            file_name = %document.file_name(),
            "Evidence uploaded"
        );
        Ok(receipt)
    }
}

/// Map the endpoint's answer onto a receipt or an [`UploadError`].
pub fn receipt_from_response(
    status: StatusCode,
    body: &str,
) -> Result<UploadReceipt, UploadError> {
    if !status.is_success() {
        error!(status = %status, body = %body, "Evidence endpoint rejected upload");
        return Err(UploadError::Status {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    serde_json::from_str(body).map_err(|e| {
        error!(error = %e, body = %body, "Evidence endpoint response was not a receipt");
        UploadError::Decode(e)
    })
}
