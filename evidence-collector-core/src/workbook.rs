//! Two-sheet `.xlsx` evidence for Jira issues.

use chrono::{Days, NaiveDateTime};
use rust_xlsxwriter::{Format, FormatAlign, FormatPattern, Workbook};
use tracing::info;

use crate::config::OutputSettings;
use crate::document::{EvidenceDocument, EvidenceFormat};
use crate::error::DocumentGenerationError;
use crate::jira::{format_timestamp, IssueRecord, TIMESTAMP_FORMAT};

pub const ISSUES_SHEET: &str = "Jira issues";
pub const DETAILS_SHEET: &str = "Report Details";

pub const ISSUE_HEADERS: [&str; 10] = [
    "Issue number",
    "Issue type",
    "Project",
    "Summary",
    "Assignee",
    "Reporter",
    "Status",
    "Created (create date)",
    "Resolved (resolution date)",
    "Issue URL",
];

pub const GENERATED_BY: &str = "Tugboat Logic® Jira Server Custom Evidence Collector";
pub const FIELDS_REQUESTED: &str =
    "issuetype, project, summary, assignee, reporter, status, created, resolutiondate";

const ISSUES_COLUMN_WIDTH: u32 = 30;
const ISSUES_ROW_HEIGHT: u32 = 50;
const DETAILS_LABEL_WIDTH: u32 = 30;
const DETAILS_VALUE_WIDTH: u32 = 100;
const DETAILS_ROW_HEIGHT: u32 = 30;

/// Cell values of one issue row, in [`ISSUE_HEADERS`] order.
pub fn issue_row(record: &IssueRecord) -> [String; 10] {
    [
        record.key.clone(),
        record.issue_type.clone(),
        record.project.clone(),
        record.summary.clone(),
        record.assignee.clone(),
        record.reporter.clone(),
        record.status.clone(),
        format_timestamp(&record.created),
        format_timestamp(&record.resolved),
        record.url.clone(),
    ]
}

/// Label/value rows of the "Report Details" sheet.
pub fn report_details(
    jql: &str,
    generated_on: NaiveDateTime,
    window_days: u32,
) -> Result<Vec<(&'static str, String)>, DocumentGenerationError> {
    let stamp = |value: NaiveDateTime| value.format(TIMESTAMP_FORMAT).to_string();
    let range_start = generated_on
        .checked_sub_days(Days::new(u64::from(window_days)))
        .ok_or(DocumentGenerationError::DateRange { days: window_days })?;
    Ok(vec![
        ("Generated by", GENERATED_BY.to_string()),
        ("Generated on", stamp(generated_on)),
        ("Date range start", stamp(range_start)),
        ("Date range end", stamp(generated_on)),
        ("JQL", jql.to_string()),
        ("Fields requested", FIELDS_REQUESTED.to_string()),
    ])
}

/// Serialise the workbook to `.xlsx` bytes.
pub fn build_workbook(
    records: &[IssueRecord],
    details: &[(&'static str, String)],
) -> Result<Vec<u8>, DocumentGenerationError> {
    let base = Format::new()
        .set_text_wrap()
        .set_align(FormatAlign::Bottom);
    let label = base.clone().set_pattern(FormatPattern::Gray125);
    let header = label.clone().set_bold();

    let mut workbook = Workbook::new();

    let issues = workbook.add_worksheet();
    issues.set_name(ISSUES_SHEET)?;
    for col in 0..ISSUE_HEADERS.len() as u16 {
        issues.set_column_width(col, ISSUES_COLUMN_WIDTH)?;
    }
    for row in 0..=records.len() as u32 {
        issues.set_row_height(row, ISSUES_ROW_HEIGHT)?;
    }
    for (col, title) in ISSUE_HEADERS.iter().enumerate() {
        issues.write_string_with_format(0, col as u16, *title, &header)?;
    }
    for (index, record) in records.iter().enumerate() {
        let row = index as u32 + 1;
        for (col, value) in issue_row(record).iter().enumerate() {
            issues.write_string_with_format(row, col as u16, value, &base)?;
        }
    }

    let report = workbook.add_worksheet();
    report.set_name(DETAILS_SHEET)?;
    report.set_column_width(0, DETAILS_LABEL_WIDTH)?;
    report.set_column_width(1, DETAILS_VALUE_WIDTH)?;
    for (index, (name, value)) in details.iter().enumerate() {
        let row = index as u32;
        report.set_row_height(row, DETAILS_ROW_HEIGHT)?;
        report.write_string_with_format(row, 0, *name, &label)?;
        report.write_string_with_format(row, 1, value, &base)?;
    }

    Ok(workbook.save_to_buffer()?)
}

/// Build the Jira workbook and persist it as `JiraServerEvidence_<timestamp>.xlsx`.
pub fn generate_workbook_document(
    records: &[IssueRecord],
    jql: &str,
    report_window_days: u32,
    output: &OutputSettings,
    now: NaiveDateTime,
) -> Result<EvidenceDocument, DocumentGenerationError> {
    let details = report_details(jql, now, report_window_days)?;
    let bytes = build_workbook(records, &details)?;
    let name = format!("JiraServerEvidence_{}", now.format("%Y%m%d%H%M%S"));
    info!(
        document = %name,
        issues = records.len(),
        size = bytes.len(),
        "Jira workbook generated"
    );
    EvidenceDocument::persist(name, EvidenceFormat::Xlsx, &bytes, output)
}
