//! GitHub Enterprise Server: search, pull request enrichment and the typed records
//! the CSV formatter consumes.

use async_trait::async_trait;
use chrono::{Days, NaiveDate};
use reqwest::header::{AUTHORIZATION, USER_AGENT};
use reqwest::{Client, Request, Url};
use serde::Deserialize;
use tracing::{debug, info};

use crate::config::{GithubSettings, Secret};
use crate::contract::PullRequestSource;
use crate::error::SourceQueryError;
use crate::http;

/// Body of `GET /api/v3/search/issues`.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total_count: u64,
    pub items: Vec<SearchItem>,
}

/// One search hit. Plain issues carry no `pull_request` link.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchItem {
    pub number: Option<u64>,
    pub pull_request: Option<PullRequestLink>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestLink {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct User {
    pub login: String,
    pub html_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

/// Head or base side of a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Branch {
    #[serde(rename = "ref")]
    pub ref_name: String,
    pub sha: String,
    /// `null` once the fork behind it is deleted.
    pub repo: Option<Repository>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Href {
    pub href: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequestLinks {
    pub comments: Href,
}

/// Body of `GET /repos/{owner}/{repo}/pulls/{number}`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PullRequest {
    pub node_id: String,
    pub url: String,
    pub html_url: String,
    pub body: Option<String>,
    pub created_at: String,
    pub user: User,
    pub head: Branch,
    pub base: Branch,
    pub merged_by: Option<User>,
    pub merged_at: Option<String>,
    #[serde(rename = "_links")]
    pub links: PullRequestLinks,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Comment {
    pub author_association: String,
    pub user: User,
    pub created_at: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Review {
    pub state: String,
    pub author_association: String,
    pub user: User,
    /// Absent while a review is still pending.
    pub submitted_at: Option<String>,
    pub body: Option<String>,
}

/// A pull request with its comments and reviews, ready for formatting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    pub pull_request: PullRequest,
    pub comments: Vec<Comment>,
    pub reviews: Vec<Review>,
}

/// Inclusive search window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// `today - days` up to tomorrow, so records updated today are included.
    ///
    /// Fails when either end falls outside the representable calendar.
    pub fn ending_today(today: NaiveDate, days: u32) -> Result<Self, SourceQueryError> {
        let out_of_range = || SourceQueryError::DateRange { days };
        Ok(Self {
            start: today
                .checked_sub_days(Days::new(u64::from(days)))
                .ok_or_else(out_of_range)?,
            end: today.checked_add_days(Days::new(1)).ok_or_else(out_of_range)?,
        })
    }
}

/// Substitute the date window into a search query template.
///
/// `{start}` and `{end}` are replaced by name. Templates without them fall back
/// to positional `%s` placeholders: the first gets the start date, the second the
/// end date.
pub fn render_query(template: &str, window: DateWindow) -> String {
    let start = window.start.format("%Y-%m-%d").to_string();
    let end = window.end.format("%Y-%m-%d").to_string();

    if template.contains("{start}") || template.contains("{end}") {
        return template.replace("{start}", &start).replace("{end}", &end);
    }

    let mut rendered = String::with_capacity(template.len() + 20);
    let mut values = [start.as_str(), end.as_str()].into_iter();
    let mut pieces = template.split("%s").peekable();
    while let Some(piece) = pieces.next() {
        rendered.push_str(piece);
        if pieces.peek().is_some() {
            rendered.push_str(values.next().unwrap_or("%s"));
        }
    }
    rendered
}

/// Run the search and enrich every pull request hit with its details, comments
/// and reviews. The first failing call aborts the whole fetch.
pub async fn fetch_pull_requests<S>(
    source: &S,
    query: &str,
) -> Result<Vec<PullRequestRecord>, SourceQueryError>
where
    S: PullRequestSource + ?Sized,
{
    let search = source.search(query).await?;
    info!(
        total_count = search.total_count,
        items = search.items.len(),
        "GitHub search returned"
    );

    let mut records = Vec::with_capacity(search.items.len());
    for item in search.items {
        let Some(link) = item.pull_request else {
            debug!(number = ?item.number, "Search hit is not a pull request, skipping");
            continue;
        };
        let pull_request = source.pull_request(&link.url).await?;
        let comments = source.comments(&pull_request.links.comments.href).await?;
        let reviews = source.reviews(&pull_request.url).await?;
        debug!(
            node_id = %pull_request.node_id,
            comments = comments.len(),
            reviews = reviews.len(),
            "Enriched pull request"
        );
        records.push(PullRequestRecord {
            pull_request,
            comments,
            reviews,
        });
    }
    Ok(records)
}

/// HTTP client for a GitHub Enterprise Server instance.
pub struct GithubClient {
    client: Client,
    base_url: String,
    token: Secret,
}

impl GithubClient {
    pub fn new(settings: &GithubSettings) -> Result<Self, SourceQueryError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(settings.accept_invalid_certs)
            .build()?;
        info!(
            endpoint = %settings.rest_endpoint,
            token_len = settings.access_token.len(),
            accept_invalid_certs = settings.accept_invalid_certs,
            "Initialised GitHub client"
        );
        Ok(Self {
            client,
            base_url: settings.rest_endpoint.trim_end_matches('/').to_string(),
            token: settings.access_token.clone(),
        })
    }

    pub fn search_url(&self, query: &str) -> Result<Url, SourceQueryError> {
        http::parse_url_with_params(
            &format!("{}/api/v3/search/issues", self.base_url),
            &[("q", query)],
        )
    }

    /// Authenticated GET for `url`.
    pub fn request(&self, url: Url) -> Result<Request, SourceQueryError> {
        Ok(self
            .client
            .get(url)
            .header(AUTHORIZATION, format!("token {}", self.token.expose()))
            .header(USER_AGENT, http::USER_AGENT)
            .build()?)
    }
}

#[async_trait]
impl PullRequestSource for GithubClient {
    async fn search(&self, query: &str) -> Result<SearchResponse, SourceQueryError> {
        let request = self.request(self.search_url(query)?)?;
        http::fetch_json(&self.client, request).await
    }

    async fn pull_request(&self, url: &str) -> Result<PullRequest, SourceQueryError> {
        let request = self.request(http::parse_url(url)?)?;
        http::fetch_json(&self.client, request).await
    }

    async fn comments(&self, url: &str) -> Result<Vec<Comment>, SourceQueryError> {
        let request = self.request(http::parse_url(url)?)?;
        http::fetch_json(&self.client, request).await
    }

    async fn reviews(&self, pull_request_url: &str) -> Result<Vec<Review>, SourceQueryError> {
        let url = format!("{}/reviews", pull_request_url.trim_end_matches('/'));
        let request = self.request(http::parse_url(&url)?)?;
        http::fetch_json(&self.client, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(endpoint: &str) -> GithubSettings {
        GithubSettings {
            rest_endpoint: endpoint.to_string(),
            access_token: Secret::new("ghp_token"),
            filter_date_range: 7,
            query: "is:pr merged:%s..%s".to_string(),
            accept_invalid_certs: false,
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn window_runs_from_n_days_ago_to_tomorrow() {
        let window = DateWindow::ending_today(date(2024, 3, 1), 30).unwrap();
        assert_eq!(window.start, date(2024, 1, 31));
        assert_eq!(window.end, date(2024, 3, 2));
    }

    #[test]
    fn absurd_date_range_is_rejected() {
        let err = DateWindow::ending_today(date(2024, 3, 1), u32::MAX).unwrap_err();
        assert!(matches!(err, SourceQueryError::DateRange { days: u32::MAX }));
    }

    #[test]
    fn window_ending_at_calendar_limit_is_rejected() {
        assert!(DateWindow::ending_today(NaiveDate::MAX, 1).is_err());
    }

    #[test]
    fn renders_positional_placeholders() {
        let window = DateWindow::ending_today(date(2024, 1, 10), 7).unwrap();
        assert_eq!(
            render_query("is:pr is:merged merged:%s..%s", window),
            "is:pr is:merged merged:2024-01-03..2024-01-11"
        );
    }

    #[test]
    fn renders_named_placeholders() {
        let window = DateWindow::ending_today(date(2024, 1, 10), 7).unwrap();
        assert_eq!(
            render_query("closed:{start}..{end} repo:org/app", window),
            "closed:2024-01-03..2024-01-11 repo:org/app"
        );
    }

    #[test]
    fn query_without_placeholders_is_unchanged() {
        let window = DateWindow::ending_today(date(2024, 1, 10), 7).unwrap();
        assert_eq!(render_query("is:pr is:merged", window), "is:pr is:merged");
    }

    #[test]
    fn search_url_is_form_encoded_and_tolerates_trailing_slash() {
        let client = GithubClient::new(&settings("https://ghe.example.com/")).unwrap();
        let url = client.search_url("is:pr merged:2024-01-03..2024-01-11").unwrap();
        assert_eq!(
            url.as_str(),
            "https://ghe.example.com/api/v3/search/issues?q=is%3Apr+merged%3A2024-01-03..2024-01-11"
        );
    }

    #[test]
    fn requests_carry_token_auth() {
        let client = GithubClient::new(&settings("https://ghe.example.com")).unwrap();
        let request = client
            .request(Url::parse("https://ghe.example.com/api/v3/repos/o/r/pulls/1").unwrap())
            .unwrap();
        assert_eq!(request.method(), reqwest::Method::GET);
        assert_eq!(request.headers()[AUTHORIZATION], "token ghp_token");
        assert_eq!(request.headers()[USER_AGENT], http::USER_AGENT);
    }

    #[test]
    fn decodes_pull_request_detail() {
        let json = r#"{
            "node_id": "PR_kwDOA",
            "url": "https://ghe.example.com/api/v3/repos/org/app/pulls/7",
            "html_url": "https://ghe.example.com/org/app/pull/7",
            "body": null,
            "created_at": "2024-01-05T10:00:00Z",
            "user": {"login": "alice", "html_url": "https://ghe.example.com/alice"},
            "head": {"ref": "feature", "sha": "abc123", "repo": {"full_name": "alice/app"}},
            "base": {"ref": "main", "sha": "def456", "repo": {"full_name": "org/app"}},
            "merged_by": {"login": "bob", "html_url": "https://ghe.example.com/bob"},
            "merged_at": "2024-01-06T09:00:00Z",
            "_links": {"comments": {"href": "https://ghe.example.com/api/v3/repos/org/app/issues/7/comments"}}
        }"#;
        let pr: PullRequest = serde_json::from_str(json).unwrap();
        assert_eq!(pr.head.ref_name, "feature");
        assert_eq!(pr.base.repo.as_ref().unwrap().full_name, "org/app");
        assert!(pr.body.is_none());
        assert!(pr.links.comments.href.ends_with("/issues/7/comments"));
    }

    #[test]
    fn missing_required_field_is_a_decode_error() {
        let json = r#"{"node_id": "PR_1"}"#;
        assert!(serde_json::from_str::<PullRequest>(json).is_err());
    }

    #[test]
    fn search_items_without_pull_request_link_decode() {
        let json = r#"{"total_count": 2, "items": [
            {"number": 1},
            {"number": 2, "pull_request": {"url": "https://ghe/api/v3/repos/o/r/pulls/2"}}
        ]}"#;
        let search: SearchResponse = serde_json::from_str(json).unwrap();
        assert!(search.items[0].pull_request.is_none());
        assert!(search.items[1].pull_request.is_some());
    }
}
