/// `load_config` module: reads the YAML config file and fills in secrets from the environment.
///
/// This is the only place where the user-supplied YAML is parsed. It is mapped onto the
/// strongly-typed [`CollectorConfig`] from the core crate, which is then passed explicitly
/// to whichever pipeline runs.
///
/// # Secrets
/// Every credential may live in the YAML file or in the environment (a `.env` file is loaded
/// by `main`). A value in the file wins. A credential missing from both is an error.
///
/// | YAML key            | Environment fallback  |
/// |---------------------|-----------------------|
/// | `github.access_token` | `GITHUB_ACCESS_TOKEN` |
/// | `jira.username`     | `JIRA_USERNAME`       |
/// | `jira.password`     | `JIRA_PASSWORD`       |
/// | `tugboat.username`  | `TUGBOAT_USERNAME`    |
/// | `tugboat.password`  | `TUGBOAT_PASSWORD`    |
/// | `tugboat.api_key`   | `TUGBOAT_API_KEY`     |
///
/// Only the section of the requested [`Pipeline`] is resolved. The other source section may
/// be present and incomplete; it is parsed and then dropped.
///
/// # Errors
/// All errors use `anyhow::Error` and are surfaced at the CLI boundary.
use anyhow::{anyhow, Context, Result};
use evidence_collector_core::config::{
    CollectorConfig, GithubSettings, JiraSettings, OutputSettings, Secret, TugboatSettings,
    DEFAULT_REPORT_WINDOW_DAYS,
};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const GITHUB_ACCESS_TOKEN: &str = "GITHUB_ACCESS_TOKEN";
pub const JIRA_USERNAME: &str = "JIRA_USERNAME";
pub const JIRA_PASSWORD: &str = "JIRA_PASSWORD";
pub const TUGBOAT_USERNAME: &str = "TUGBOAT_USERNAME";
pub const TUGBOAT_PASSWORD: &str = "TUGBOAT_PASSWORD";
pub const TUGBOAT_API_KEY: &str = "TUGBOAT_API_KEY";

/// Which source system a run collects from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pipeline {
    Github,
    Jira,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    github: Option<RawGithub>,
    jira: Option<RawJira>,
    tugboat: RawTugboat,
    local_output_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawGithub {
    rest_endpoint: String,
    access_token: Option<String>,
    filter_date_range: u32,
    query: String,
    #[serde(default)]
    accept_invalid_certs: bool,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawJira {
    rest_endpoint: String,
    username: Option<String>,
    password: Option<String>,
    query: String,
    report_window_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawTugboat {
    collector_url: String,
    username: Option<String>,
    password: Option<String>,
    api_key: Option<String>,
}

/// Take the file value if present, otherwise the environment variable.
fn value_or_env(from_file: Option<String>, key: &str, var: &str) -> Result<String> {
    if let Some(value) = from_file.filter(|v| !v.is_empty()) {
        return Ok(value);
    }
    match env::var(var) {
        Ok(value) if !value.is_empty() => {
            info!(key, env_var = var, "Secret taken from environment");
            Ok(value)
        }
        _ => {
            error!(key, env_var = var, "Required value missing from config and environment");
            Err(anyhow!(
                "`{key}` is not set in the config file and {var} is not set in the environment"
            ))
        }
    }
}

fn secret_or_env(from_file: Option<String>, key: &str, var: &str) -> Result<Secret> {
    let secret = Secret::new(value_or_env(from_file, key, var)?);
    info!(key, secret_len = secret.len(), "Secret resolved");
    Ok(secret)
}

fn github_settings(g: RawGithub) -> Result<GithubSettings> {
    Ok(GithubSettings {
        access_token: secret_or_env(g.access_token, "github.access_token", GITHUB_ACCESS_TOKEN)?,
        rest_endpoint: g.rest_endpoint,
        filter_date_range: g.filter_date_range,
        query: g.query,
        accept_invalid_certs: g.accept_invalid_certs,
    })
}

fn jira_settings(j: RawJira) -> Result<JiraSettings> {
    Ok(JiraSettings {
        username: value_or_env(j.username, "jira.username", JIRA_USERNAME)?,
        password: secret_or_env(j.password, "jira.password", JIRA_PASSWORD)?,
        rest_endpoint: j.rest_endpoint,
        query: j.query,
        report_window_days: j.report_window_days.unwrap_or(DEFAULT_REPORT_WINDOW_DAYS),
    })
}

/// Loads the YAML config file and resolves the secrets `pipeline` and the uploader need.
pub fn load_config<P: AsRef<Path>>(path: P, pipeline: Pipeline) -> Result<CollectorConfig> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, ?pipeline, "Loading configuration from file");

    let config_content = fs::read_to_string(path_ref).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
        anyhow!("Failed to read config file {:?}: {}", path_ref, e)
    })?;

    let raw: RawConfig = serde_yaml::from_str(&config_content).map_err(|e| {
        error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
        anyhow!("Failed to parse config YAML: {e}")
    })?;

    let (github, jira) = match pipeline {
        Pipeline::Github => {
            let g = raw
                .github
                .ok_or_else(|| anyhow!("config file has no `github` section"))?;
            (Some(github_settings(g).context("Invalid github section")?), None)
        }
        Pipeline::Jira => {
            let j = raw
                .jira
                .ok_or_else(|| anyhow!("config file has no `jira` section"))?;
            (None, Some(jira_settings(j).context("Invalid jira section")?))
        }
    };

    let t = raw.tugboat;
    let tugboat = TugboatSettings {
        username: value_or_env(t.username, "tugboat.username", TUGBOAT_USERNAME)?,
        password: secret_or_env(t.password, "tugboat.password", TUGBOAT_PASSWORD)?,
        api_key: secret_or_env(t.api_key, "tugboat.api_key", TUGBOAT_API_KEY)?,
        collector_url: t.collector_url,
    };

    let config = CollectorConfig {
        github,
        jira,
        tugboat,
        output: OutputSettings {
            local_output_path: raw.local_output_path,
        },
    };
    config.trace_loaded();
    Ok(config)
}
