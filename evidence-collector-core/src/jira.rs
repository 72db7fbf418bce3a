//! Jira Server JQL search and the mapping from raw issues to [`IssueRecord`]s.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Request, Url};
use serde::Deserialize;
use tracing::{info, warn};

use crate::config::{JiraSettings, Secret};
use crate::contract::IssueSource;
use crate::error::{DocumentGenerationError, SourceQueryError};
use crate::http;

/// Fields requested from the search endpoint.
pub const REQUESTED_FIELDS: &str =
    "issuetype,project,summary,assignee,reporter,status,created,resolutiondate";

/// Size of the single result page.
pub const MAX_RESULTS: u32 = 1000;

/// Canonical timestamp layout used in the workbook.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Body of `GET /rest/api/2/search`.
#[derive(Debug, Clone, Deserialize)]
pub struct JiraSearchResponse {
    #[serde(default)]
    pub total: u64,
    pub issues: Option<Vec<JiraIssue>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JiraIssue {
    pub key: String,
    #[serde(rename = "self")]
    pub self_url: String,
    pub fields: IssueFields,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Named {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Person {
    #[serde(rename = "displayName")]
    pub display_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IssueFields {
    pub summary: String,
    pub issuetype: Named,
    pub project: Named,
    pub assignee: Option<Person>,
    pub reporter: Option<Person>,
    pub status: Named,
    pub created: String,
    pub resolutiondate: Option<String>,
}

/// A fully mapped Jira issue, one workbook row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub key: String,
    pub issue_type: String,
    pub project: String,
    pub summary: String,
    pub assignee: String,
    pub reporter: String,
    pub status: String,
    pub created: DateTime<FixedOffset>,
    pub resolved: DateTime<FixedOffset>,
    pub url: String,
}

/// Parse a Jira timestamp such as `2024-01-05T10:20:30.000+0000`.
pub fn parse_timestamp(raw: &str) -> Result<DateTime<FixedOffset>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(raw)
        .or_else(|_| DateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f%z"))
}

/// Render a timestamp in its own offset as `YYYY-MM-DD HH:MM:SS`.
pub fn format_timestamp(value: &DateTime<FixedOffset>) -> String {
    value.format(TIMESTAMP_FORMAT).to_string()
}

fn timestamp_field(
    key: &str,
    field: &'static str,
    raw: &str,
) -> Result<DateTime<FixedOffset>, DocumentGenerationError> {
    parse_timestamp(raw).map_err(|source| DocumentGenerationError::InvalidTimestamp {
        record: key.to_string(),
        field,
        value: raw.to_string(),
        source,
    })
}

impl TryFrom<JiraIssue> for IssueRecord {
    type Error = DocumentGenerationError;

    fn try_from(issue: JiraIssue) -> Result<Self, Self::Error> {
        let key = issue.key;
        let fields = issue.fields;
        let missing = |field| DocumentGenerationError::MissingField {
            record: key.clone(),
            field,
        };

        let assignee = fields.assignee.ok_or_else(|| missing("assignee"))?;
        let reporter = fields.reporter.ok_or_else(|| missing("reporter"))?;
        let resolutiondate = fields
            .resolutiondate
            .ok_or_else(|| missing("resolutiondate"))?;
        let created = timestamp_field(&key, "created", &fields.created)?;
        let resolved = timestamp_field(&key, "resolutiondate", &resolutiondate)?;

        Ok(IssueRecord {
            key,
            issue_type: fields.issuetype.name,
            project: fields.project.name,
            summary: fields.summary,
            assignee: assignee.display_name,
            reporter: reporter.display_name,
            status: fields.status.name,
            created,
            resolved,
            url: issue.self_url,
        })
    }
}

/// Run the JQL search. `None` means the response carried no `issues` list.
pub async fn fetch_issues<S>(
    source: &S,
    jql: &str,
) -> Result<Option<Vec<JiraIssue>>, SourceQueryError>
where
    S: IssueSource + ?Sized,
{
    let response = source.search(jql).await?;
    let returned = response.issues.as_ref().map_or(0, Vec::len);
    info!(total = response.total, returned, "Jira search returned");
    if response.total > returned as u64 {
        warn!(
            total = response.total,
            returned,
            max_results = MAX_RESULTS,
            "Jira search matched more issues than fit in one page; extra issues are not collected"
        );
    }
    Ok(response.issues)
}

/// HTTP client for a Jira Server instance.
pub struct JiraClient {
    client: Client,
    base_url: String,
    username: String,
    password: Secret,
}

impl JiraClient {
    pub fn new(settings: &JiraSettings) -> Result<Self, SourceQueryError> {
        info!(
            endpoint = %settings.rest_endpoint,
            username = %settings.username,
            "Initialised Jira client"
        );
        Ok(Self {
            client: Client::builder().build()?,
            base_url: settings.rest_endpoint.trim_end_matches('/').to_string(),
            username: settings.username.clone(),
            password: settings.password.clone(),
        })
    }

    pub fn search_url(&self, jql: &str) -> Result<Url, SourceQueryError> {
        let max_results = MAX_RESULTS.to_string();
        http::parse_url_with_params(
            &format!("{}/rest/api/2/search", self.base_url),
            &[
                ("jql", jql),
                ("fields", REQUESTED_FIELDS),
                ("maxResults", max_results.as_str()),
            ],
        )
    }

    pub fn request(&self, url: Url) -> Result<Request, SourceQueryError> {
        Ok(self
            .client
            .get(url)
            .header(
                AUTHORIZATION,
                http::basic_auth_header(&self.username, self.password.expose()),
            )
            .header(USER_AGENT, http::USER_AGENT)
            .build()?)
    }
}

#[async_trait]
impl IssueSource for JiraClient {
    async fn search(&self, jql: &str) -> Result<JiraSearchResponse, SourceQueryError> {
        let request = self.request(self.search_url(jql)?)?;
        http::fetch_json(&self.client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;

    fn client() -> JiraClient {
        JiraClient::new(&JiraSettings {
            rest_endpoint: "https://jira.example.com/".to_string(),
            username: "alice".to_string(),
            password: Secret::new("secret"),
            query: "project = OPS".to_string(),
            report_window_days: 90,
        })
        .unwrap()
    }

    fn issue_json(assignee: &str, resolution: &str) -> String {
        format!(
            r#"{{
                "key": "OPS-1",
                "self": "https://jira.example.com/rest/api/2/issue/10001",
                "fields": {{
                    "summary": "Rotate keys",
                    "issuetype": {{"name": "Task"}},
                    "project": {{"name": "Operations"}},
                    "assignee": {assignee},
                    "reporter": {{"displayName": "Bob"}},
                    "status": {{"name": "Done"}},
                    "created": "2024-01-05T10:20:30.000+0000",
                    "resolutiondate": {resolution}
                }}
            }}"#
        )
    }

    #[test]
    fn search_url_has_jql_fields_and_page_size() {
        let url = client().search_url("project = OPS AND resolved >= -90d").unwrap();
        assert_eq!(
            url.as_str(),
            "https://jira.example.com/rest/api/2/search?jql=project+%3D+OPS+AND+resolved+%3E%3D+-90d\
             &fields=issuetype%2Cproject%2Csummary%2Cassignee%2Creporter%2Cstatus%2Ccreated%2Cresolutiondate\
             &maxResults=1000"
        );
    }

    #[test]
    fn requests_carry_basic_auth_and_agent() {
        let c = client();
        let request = c.request(c.search_url("x").unwrap()).unwrap();
        assert_eq!(request.headers()[AUTHORIZATION], "Basic YWxpY2U6c2VjcmV0");
        assert_eq!(request.headers()[USER_AGENT], http::USER_AGENT);
    }

    #[test]
    fn timestamps_round_trip_to_the_second() {
        for raw in [
            "2024-01-05T10:20:30.000+0000",
            "2023-11-30T23:59:59.999-0500",
            "2024-02-29T00:00:01+02:00",
        ] {
            let original = parse_timestamp(raw).unwrap();
            let canonical = format_timestamp(&original);
            let reparsed = NaiveDateTime::parse_from_str(&canonical, TIMESTAMP_FORMAT).unwrap();
            assert_eq!(
                reparsed.and_utc().timestamp() - i64::from(original.offset().local_minus_utc()),
                original.timestamp(),
                "{raw} -> {canonical}"
            );
        }
    }

    #[test]
    fn maps_complete_issue() {
        let issue: JiraIssue = serde_json::from_str(&issue_json(
            r#"{"displayName": "Alice"}"#,
            r#""2024-01-06T08:00:00.000+0000""#,
        ))
        .unwrap();
        let record = IssueRecord::try_from(issue).unwrap();
        assert_eq!(record.key, "OPS-1");
        assert_eq!(record.assignee, "Alice");
        assert_eq!(record.reporter, "Bob");
        assert_eq!(format_timestamp(&record.created), "2024-01-05 10:20:30");
        assert_eq!(format_timestamp(&record.resolved), "2024-01-06 08:00:00");
        assert_eq!(record.url, "https://jira.example.com/rest/api/2/issue/10001");
    }

    #[test]
    fn unassigned_issue_is_rejected() {
        let issue: JiraIssue =
            serde_json::from_str(&issue_json("null", r#""2024-01-06T08:00:00.000+0000""#))
                .unwrap();
        let err = IssueRecord::try_from(issue).unwrap_err();
        assert!(matches!(
            err,
            DocumentGenerationError::MissingField { field: "assignee", .. }
        ));
    }

    #[test]
    fn unresolved_issue_is_rejected() {
        let issue: JiraIssue =
            serde_json::from_str(&issue_json(r#"{"displayName": "Alice"}"#, "null")).unwrap();
        let err = IssueRecord::try_from(issue).unwrap_err();
        assert!(matches!(
            err,
            DocumentGenerationError::MissingField { field: "resolutiondate", .. }
        ));
    }

    #[test]
    fn garbage_timestamp_is_rejected() {
        let issue: JiraIssue = serde_json::from_str(&issue_json(
            r#"{"displayName": "Alice"}"#,
            r#""yesterday""#,
        ))
        .unwrap();
        let err = IssueRecord::try_from(issue).unwrap_err();
        assert!(matches!(
            err,
            DocumentGenerationError::InvalidTimestamp { field: "resolutiondate", .. }
        ));
    }

    #[test]
    fn response_without_issues_decodes_to_none() {
        let response: JiraSearchResponse =
            serde_json::from_str(r#"{"errorMessages": ["boom"]}"#).unwrap();
        assert!(response.issues.is_none());
        assert_eq!(response.total, 0);
    }
}
