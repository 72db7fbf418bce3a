use std::fmt;
use std::path::PathBuf;
use tracing::info;

/// Default look-back, in days, reported on the Jira "Report Details" sheet.
pub const DEFAULT_REPORT_WINDOW_DAYS: u32 = 90;

/// A credential value. Never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Secret(***)")
    }
}

/// Everything a collection run needs, loaded once at startup.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub github: Option<GithubSettings>,
    pub jira: Option<JiraSettings>,
    pub tugboat: TugboatSettings,
    pub output: OutputSettings,
}

impl CollectorConfig {
    pub fn trace_loaded(&self) {
        info!(
            github = self.github.is_some(),
            jira = self.jira.is_some(),
            collector_url = %self.tugboat.collector_url,
            local_output_path = ?self.output.local_output_path,
            "Loaded collector config"
        );
    }
}

/// GitHub Enterprise Server search settings.
#[derive(Debug, Clone)]
pub struct GithubSettings {
    /// Base URL of the instance, e.g. `https://github.example.com/`.
    pub rest_endpoint: String,
    pub access_token: Secret,
    /// Number of days before today included in the search window.
    pub filter_date_range: u32,
    /// Search query template, see [`crate::github::render_query`].
    pub query: String,
    /// Skip TLS certificate verification (self-signed instances).
    pub accept_invalid_certs: bool,
}

/// Jira Server JQL search settings.
#[derive(Debug, Clone)]
pub struct JiraSettings {
    pub rest_endpoint: String,
    pub username: String,
    pub password: Secret,
    pub query: String,
    pub report_window_days: u32,
}

/// Tugboat Logic evidence collection endpoint settings.
#[derive(Debug, Clone)]
pub struct TugboatSettings {
    pub collector_url: String,
    pub username: String,
    pub password: Secret,
    pub api_key: Secret,
}

/// Where, besides the temporary upload file, generated documents are kept.
#[derive(Debug, Clone, Default)]
pub struct OutputSettings {
    pub local_output_path: Option<PathBuf>,
}
