use evidence_collector::load_config::{
    load_config, Pipeline, GITHUB_ACCESS_TOKEN, JIRA_PASSWORD, JIRA_USERNAME, TUGBOAT_API_KEY,
    TUGBOAT_PASSWORD, TUGBOAT_USERNAME,
};
use serial_test::serial;
use std::env;
use std::fs::write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

fn config_file(yaml: &str) -> NamedTempFile {
    let file = NamedTempFile::new().expect("temp file");
    write(file.path(), yaml).unwrap();
    file
}

fn clear_secret_env() {
    for var in [
        GITHUB_ACCESS_TOKEN,
        JIRA_USERNAME,
        JIRA_PASSWORD,
        TUGBOAT_USERNAME,
        TUGBOAT_PASSWORD,
        TUGBOAT_API_KEY,
    ] {
        env::remove_var(var);
    }
}

const FULL_CONFIG: &str = r#"
github:
  rest_endpoint: "https://github.example.com/"
  access_token: "file-token"
  filter_date_range: 30
  query: "is:pr is:merged merged:{start}..{end}"
jira:
  rest_endpoint: "https://jira.example.com"
  username: "jira-user"
  password: "jira-pass"
  query: "project = OPS"
local_output_path: ./tmp/evidence
tugboat:
  collector_url: "https://tugboat.example.com/api/v0/evidence/collector/1/"
  username: "tb-user"
  password: "tb-pass"
  api_key: "tb-key"
"#;

#[test]
#[serial]
fn loads_github_run_from_file() {
    clear_secret_env();
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path(), Pipeline::Github).expect("Config should load");

    let github = config.github.expect("github section");
    assert_eq!(github.rest_endpoint, "https://github.example.com/");
    assert_eq!(github.access_token.expose(), "file-token");
    assert_eq!(github.filter_date_range, 30);
    assert!(!github.accept_invalid_certs);
    assert!(config.jira.is_none());

    assert_eq!(config.tugboat.username, "tb-user");
    assert_eq!(config.tugboat.api_key.expose(), "tb-key");
    assert_eq!(
        config.output.local_output_path,
        Some(PathBuf::from("./tmp/evidence"))
    );
}

#[test]
#[serial]
fn loads_jira_run_from_file() {
    clear_secret_env();
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path(), Pipeline::Jira).expect("Config should load");

    let jira = config.jira.expect("jira section");
    assert_eq!(jira.username, "jira-user");
    assert_eq!(jira.password.expose(), "jira-pass");
    assert_eq!(jira.report_window_days, 90);
    assert!(config.github.is_none());
    assert_eq!(config.tugboat.password.expose(), "tb-pass");
}

#[test]
#[serial]
fn file_values_win_over_environment() {
    clear_secret_env();
    env::set_var(TUGBOAT_API_KEY, "env-key");
    env::set_var(GITHUB_ACCESS_TOKEN, "env-token");
    let file = config_file(FULL_CONFIG);

    let config = load_config(file.path(), Pipeline::Github).unwrap();

    assert_eq!(config.tugboat.api_key.expose(), "tb-key");
    assert_eq!(config.github.unwrap().access_token.expose(), "file-token");
    clear_secret_env();
}

#[test]
#[serial]
fn secrets_fall_back_to_environment() {
    clear_secret_env();
    env::set_var(JIRA_USERNAME, "env-jira-user");
    env::set_var(JIRA_PASSWORD, "env-jira-pass");
    env::set_var(TUGBOAT_USERNAME, "env-tb-user");
    env::set_var(TUGBOAT_PASSWORD, "env-tb-pass");
    env::set_var(TUGBOAT_API_KEY, "env-tb-key");
    let file = config_file(
        r#"
jira:
  rest_endpoint: "https://jira.example.com"
  query: "project = OPS"
  report_window_days: 30
tugboat:
  collector_url: "https://tugboat.example.com/collector/"
"#,
    );

    let config =
        load_config(file.path(), Pipeline::Jira).expect("Config should load from env secrets");

    assert!(config.github.is_none());
    let jira = config.jira.unwrap();
    assert_eq!(jira.username, "env-jira-user");
    assert_eq!(jira.password.expose(), "env-jira-pass");
    assert_eq!(jira.report_window_days, 30);
    assert_eq!(config.tugboat.username, "env-tb-user");
    assert_eq!(config.tugboat.password.expose(), "env-tb-pass");
    assert_eq!(config.tugboat.api_key.expose(), "env-tb-key");
    assert_eq!(config.output.local_output_path, None);
    clear_secret_env();
}

#[test]
#[serial]
fn missing_secret_is_an_error() {
    clear_secret_env();
    let file = config_file(
        r#"
jira:
  rest_endpoint: "https://jira.example.com"
  username: "u"
  password: "p"
  query: "project = OPS"
tugboat:
  collector_url: "https://tugboat.example.com/collector/"
  username: "tb-user"
  password: "tb-pass"
"#,
    );

    let err = load_config(file.path(), Pipeline::Jira).unwrap_err();

    assert!(
        err.to_string().contains(TUGBOAT_API_KEY),
        "unexpected error: {err}"
    );
}

#[test]
#[serial]
fn missing_tugboat_section_is_an_error() {
    clear_secret_env();
    let file = config_file(
        r#"
jira:
  rest_endpoint: "https://jira.example.com"
  username: "u"
  password: "p"
  query: "project = OPS"
"#,
    );

    assert!(load_config(file.path(), Pipeline::Jira).is_err());
}

const GITHUB_WITHOUT_TOKEN: &str = r#"
github:
  rest_endpoint: "https://github.example.com/"
  filter_date_range: 30
  query: "is:pr is:merged merged:{start}..{end}"
jira:
  rest_endpoint: "https://jira.example.com"
  username: "jira-user"
  password: "jira-pass"
  query: "project = OPS"
tugboat:
  collector_url: "https://tugboat.example.com/collector/"
  username: "tb-user"
  password: "tb-pass"
  api_key: "tb-key"
"#;

#[test]
#[serial]
fn jira_run_ignores_incomplete_github_section() {
    clear_secret_env();
    let file = config_file(GITHUB_WITHOUT_TOKEN);

    let config = load_config(file.path(), Pipeline::Jira).expect("jira run needs no github token");

    assert!(config.github.is_none());
    assert_eq!(config.jira.unwrap().username, "jira-user");
}

#[test]
#[serial]
fn github_run_requires_github_token() {
    clear_secret_env();
    let file = config_file(GITHUB_WITHOUT_TOKEN);

    let err = load_config(file.path(), Pipeline::Github).unwrap_err();

    let message = format!("{err:#}");
    assert!(message.contains("Invalid github section"), "unexpected error: {message}");
    assert!(message.contains(GITHUB_ACCESS_TOKEN), "unexpected error: {message}");
}

#[test]
#[serial]
fn requested_section_must_exist() {
    clear_secret_env();
    let file = config_file(
        r#"
tugboat:
  collector_url: "https://tugboat.example.com/collector/"
  username: "tb-user"
  password: "tb-pass"
  api_key: "tb-key"
"#,
    );

    let err = load_config(file.path(), Pipeline::Github).unwrap_err();

    assert!(err.to_string().contains("no `github` section"), "unexpected error: {err}");
}

#[test]
#[serial]
fn unreadable_file_is_an_error() {
    let err = load_config("/definitely/not/here.yaml", Pipeline::Github).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}
