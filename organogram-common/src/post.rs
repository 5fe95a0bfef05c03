//! Canonical post model
//!
//! A `Post` is one senior position in one organisation for one reporting
//! period. Junior posts are aggregated counts of staff reporting to a senior
//! post and carry no reference of their own.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// `reports_to_ref` value meaning "reports to no one within the organisation"
pub const ROOT_SENTINEL: &str = "XX";

/// True if the reference is the root sentinel (case-insensitive, as uploads
/// use both "XX" and "xx")
pub fn is_root_ref(reference: &str) -> bool {
    reference.trim().eq_ignore_ascii_case(ROOT_SENTINEL)
}

// ============================================================================
// Field Types
// ============================================================================

/// Numeric field that tolerates the published textual sentinels
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Amount {
    /// A number (pay in pounds, or full-time-equivalent)
    Value(f64),
    /// "N/A" - not applicable
    NotApplicable,
    /// "N/D" - not disclosed
    NotDisclosed,
    /// Cell left empty
    #[default]
    Blank,
}

impl Amount {
    /// Parse a cell value.
    ///
    /// Accepts plain numbers, numbers with a leading `£` or thousands
    /// separators, "N/A" and "N/D". Anything else is returned as `Err` with
    /// the offending text so the caller can record an ingestion error.
    pub fn parse(text: &str) -> std::result::Result<Amount, String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(Amount::Blank);
        }
        if trimmed.eq_ignore_ascii_case("N/A") {
            return Ok(Amount::NotApplicable);
        }
        if trimmed.eq_ignore_ascii_case("N/D") {
            return Ok(Amount::NotDisclosed);
        }

        let cleaned: String = trimmed
            .trim_start_matches('£')
            .chars()
            .filter(|c| *c != ',')
            .collect();
        cleaned
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|v| v.is_finite())
            .map(Amount::Value)
            .ok_or_else(|| trimmed.to_string())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Amount::Value(v) if v.fract() == 0.0 => write!(f, "{:.0}", v),
            Amount::Value(v) => write!(f, "{}", v),
            Amount::NotApplicable => f.write_str("N/A"),
            Amount::NotDisclosed => f.write_str("N/D"),
            Amount::Blank => Ok(()),
        }
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl TryFrom<String> for Amount {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Amount::parse(&value).map_err(|text| format!("not a numeric value: {:?}", text))
    }
}

/// Lifecycle status of a post
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PostStatus {
    #[default]
    Current,
    Vacant,
    /// Retired from the org chart but still referenced as a boss
    Eliminated,
    /// Any other status label published by the source (lowercased)
    Other(String),
}

impl PostStatus {
    pub fn from_label(label: &str) -> Self {
        let label = label.trim().to_lowercase();
        match label.as_str() {
            "" | "current" | "active" => PostStatus::Current,
            "vacant" => PostStatus::Vacant,
            "eliminated" => PostStatus::Eliminated,
            _ => PostStatus::Other(label),
        }
    }

    pub fn label(&self) -> &str {
        match self {
            PostStatus::Current => "current",
            PostStatus::Vacant => "vacant",
            PostStatus::Eliminated => "eliminated",
            PostStatus::Other(label) => label,
        }
    }
}

impl From<PostStatus> for String {
    fn from(status: PostStatus) -> Self {
        status.label().to_string()
    }
}

impl From<String> for PostStatus {
    fn from(label: String) -> Self {
        PostStatus::from_label(&label)
    }
}

/// Origin of a record. One source is chosen per organisation-period
/// before records reach the normalizer; the two are never merged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    /// Spreadsheet upload
    Upload,
    /// Linked-data query service
    LinkedData,
}

/// Reporting period (the date the organogram describes)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct Period(pub NaiveDate);

impl Period {
    /// Parse "2016-09-30" or the upload portal's "30/09/2016"
    pub fn parse(text: &str) -> crate::Result<Self> {
        let text = text.trim();
        NaiveDate::parse_from_str(text, "%Y-%m-%d")
            .or_else(|_| NaiveDate::parse_from_str(text, "%d/%m/%Y"))
            .map(Period)
            .map_err(|e| crate::Error::Config(format!("Invalid period '{}': {}", text, e)))
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl From<Period> for String {
    fn from(period: Period) -> Self {
        period.to_string()
    }
}

impl TryFrom<String> for Period {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        Period::parse(&value).map_err(|e| e.to_string())
    }
}

// ============================================================================
// Posts
// ============================================================================

/// Senior post
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Post {
    /// Unique within an organisation-period, except across a job-share
    pub post_ref: String,
    pub name: String,
    pub grade: String,
    pub title: String,
    pub job_function: String,
    pub parent_department: String,
    pub organisation: String,
    pub unit: String,
    pub contact_phone: String,
    pub contact_email: String,
    /// Another post's `post_ref`, "XX", or unresolved text
    pub reports_to_ref: String,
    pub salary_cost_of_reports: Amount,
    pub fte: Amount,
    pub salary_floor: Amount,
    pub salary_ceiling: Amount,
    /// Free text at ingestion, canonical after profession resolution
    pub profession: String,
    pub notes: String,
    pub status: PostStatus,
    pub source: DataSource,
    /// Linked-data URI of the post (linked-data source only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
}

/// The fields that must agree across every holder of a job-shared post.
///
/// Name, pay, contact details, notes and FTE are excluded. Status is too:
/// spreadsheets carry it in the name column, so one holder of a job-share
/// may read "Vacant".
#[derive(Debug, PartialEq)]
pub struct JobShareKey<'a> {
    pub post_ref: &'a str,
    pub grade: &'a str,
    pub title: &'a str,
    pub job_function: &'a str,
    pub parent_department: &'a str,
    pub organisation: &'a str,
    pub unit: &'a str,
    pub reports_to_ref: &'a str,
    pub salary_cost_of_reports: &'a Amount,
    pub profession: &'a str,
    pub source: DataSource,
}

impl Post {
    /// Post with every descriptive field blank
    pub fn new(
        post_ref: impl Into<String>,
        reports_to_ref: impl Into<String>,
        source: DataSource,
    ) -> Self {
        Self {
            post_ref: post_ref.into(),
            name: String::new(),
            grade: String::new(),
            title: String::new(),
            job_function: String::new(),
            parent_department: String::new(),
            organisation: String::new(),
            unit: String::new(),
            contact_phone: String::new(),
            contact_email: String::new(),
            reports_to_ref: reports_to_ref.into(),
            salary_cost_of_reports: Amount::Blank,
            fte: Amount::Blank,
            salary_floor: Amount::Blank,
            salary_ceiling: Amount::Blank,
            profession: String::new(),
            notes: String::new(),
            status: PostStatus::Current,
            source,
            uri: None,
        }
    }

    pub fn is_root(&self) -> bool {
        is_root_ref(&self.reports_to_ref)
    }

    pub fn is_eliminated(&self) -> bool {
        self.status == PostStatus::Eliminated
    }

    pub fn job_share_key(&self) -> JobShareKey<'_> {
        JobShareKey {
            post_ref: &self.post_ref,
            grade: &self.grade,
            title: &self.title,
            job_function: &self.job_function,
            parent_department: &self.parent_department,
            organisation: &self.organisation,
            unit: &self.unit,
            reports_to_ref: &self.reports_to_ref,
            salary_cost_of_reports: &self.salary_cost_of_reports,
            profession: &self.profession,
            source: self.source,
        }
    }
}

/// Junior post (aggregate of staff reporting to one senior post)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JuniorPost {
    pub parent_department: String,
    pub organisation: String,
    pub unit: String,
    /// Must resolve to a known senior `post_ref`
    pub reports_to_ref: String,
    pub grade: String,
    pub payscale_min: Amount,
    pub payscale_max: Amount,
    pub title: String,
    /// Number of posts in FTE
    pub fte: Amount,
    pub profession: String,
    pub source: DataSource,
}

impl JuniorPost {
    pub fn new(reports_to_ref: impl Into<String>, source: DataSource) -> Self {
        Self {
            parent_department: String::new(),
            organisation: String::new(),
            unit: String::new(),
            reports_to_ref: reports_to_ref.into(),
            grade: String::new(),
            payscale_min: Amount::Blank,
            payscale_max: Amount::Blank,
            title: String::new(),
            fte: Amount::Blank,
            profession: String::new(),
            source,
        }
    }
}
