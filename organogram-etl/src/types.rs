//! Shared Types and Data Contracts
//!
//! Raw input shapes consumed by the normalizer, and the validation report
//! produced by the validator, resolvers and output assembler.

use organogram_common::{DataSource, JuniorPost, Period, Post};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Spreadsheet Rows
// ============================================================================

/// Column titles of the published spreadsheet layout
pub mod columns {
    pub const POST_REF: &str = "Post Unique Reference";
    pub const NAME: &str = "Name";
    pub const GRADE: &str = "Grade (or equivalent)";
    pub const GRADE_SHORT: &str = "Grade";
    pub const JOB_TITLE: &str = "Job Title";
    pub const JOB_FUNCTION: &str = "Job/Team Function";
    pub const PARENT_DEPARTMENT: &str = "Parent Department";
    pub const ORGANISATION: &str = "Organisation";
    pub const UNIT: &str = "Unit";
    pub const CONTACT_PHONE: &str = "Contact Phone";
    pub const CONTACT_EMAIL: &str = "Contact E-mail";
    pub const REPORTS_TO: &str = "Reports to Senior Post";
    pub const SALARY_COST_OF_REPORTS: &str = "Salary Cost of Reports (£)";
    pub const FTE: &str = "FTE";
    pub const PAY_FLOOR: &str = "Actual Pay Floor (£)";
    pub const PAY_CEILING: &str = "Actual Pay Ceiling (£)";
    pub const PROFESSION: &str = "Professional/Occupational Group";
    pub const NOTES: &str = "Notes";

    pub const JUNIOR_REPORTS_TO: &str = "Reporting Senior Post";
    pub const PAYSCALE_MIN: &str = "Payscale Minimum (£)";
    pub const PAYSCALE_MAX: &str = "Payscale Maximum (£)";
    pub const GENERIC_JOB_TITLE: &str = "Generic Job Title";
    pub const JUNIOR_FTE: &str = "Number of Posts in FTE";
}

/// One spreadsheet row keyed by column title
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRow {
    /// 1-based row number in the sheet (for error messages)
    pub row_number: usize,
    pub cells: BTreeMap<String, String>,
}

impl RawRow {
    pub fn new(row_number: usize) -> Self {
        Self {
            row_number,
            cells: BTreeMap::new(),
        }
    }

    /// Builder-style cell setter
    pub fn with(mut self, column: &str, value: impl Into<String>) -> Self {
        self.cells.insert(column.to_string(), value.into());
        self
    }

    /// Cell value, `None` if the column is absent from the sheet
    pub fn get(&self, column: &str) -> Option<&str> {
        self.cells.get(column).map(|s| s.as_str())
    }

    /// True if every cell is blank
    pub fn is_blank(&self) -> bool {
        self.cells.values().all(|v| v.trim().is_empty())
    }
}

// ============================================================================
// Linked-Data Items
// ============================================================================

/// Scalar leaf of a linked-data value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Text(String),
    Number(f64),
    Flag(bool),
}

impl Scalar {
    pub fn as_text(&self) -> String {
        match self {
            Scalar::Text(s) => s.clone(),
            Scalar::Number(n) if n.fract() == 0.0 => format!("{:.0}", n),
            Scalar::Number(n) => n.to_string(),
            Scalar::Flag(b) => b.to_string(),
        }
    }
}

/// A field of a linked-data item: a scalar, a list, or a keyed object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LinkedValue {
    Null,
    Scalar(Scalar),
    List(Vec<LinkedValue>),
    Keyed(BTreeMap<String, LinkedValue>),
}

/// Failure to reduce a linked-data value to one piece of text
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ValueError {
    #[error("ambiguous value, {} distinct candidates: {}", .0.len(), .0.join("; "))]
    Ambiguous(Vec<String>),
}

impl LinkedValue {
    /// Reduce to a single text value.
    ///
    /// Keyed objects are entered through `key` only; lists contribute every
    /// element. Blank leaves are ignored and duplicates collapse. More than
    /// one distinct leaf is `ValueError::Ambiguous`.
    pub fn resolve(&self, key: &str) -> Result<Option<String>, ValueError> {
        let mut found: Vec<String> = Vec::new();
        let mut stack: Vec<&LinkedValue> = vec![self];

        while let Some(value) = stack.pop() {
            match value {
                LinkedValue::Null => {}
                LinkedValue::Scalar(scalar) => {
                    let text = scalar.as_text();
                    let text = text.trim();
                    if !text.is_empty() && !found.iter().any(|f| f == text) {
                        found.push(text.to_string());
                    }
                }
                LinkedValue::List(items) => stack.extend(items.iter().rev()),
                LinkedValue::Keyed(map) => {
                    if let Some(inner) = map.get(key) {
                        stack.push(inner);
                    }
                }
            }
        }

        match found.len() {
            0 => Ok(None),
            1 => Ok(found.pop()),
            _ => Err(ValueError::Ambiguous(found)),
        }
    }

    /// Entries of a multi-valued field (a single value is one entry)
    pub fn entries(&self) -> Vec<&LinkedValue> {
        match self {
            LinkedValue::Null => Vec::new(),
            LinkedValue::List(items) => items
                .iter()
                .filter(|v| !matches!(v, LinkedValue::Null))
                .collect(),
            other => vec![other],
        }
    }

    /// Value under `key` if this is a keyed object
    pub fn field(&self, key: &str) -> Option<&LinkedValue> {
        match self {
            LinkedValue::Keyed(map) => map.get(key),
            _ => None,
        }
    }
}

/// One post item as returned by the linked-data item API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LinkedDataItem {
    /// Post URI; the post reference is its last path segment
    #[serde(rename = "_about")]
    pub about: String,
    #[serde(default)]
    pub label: Option<LinkedValue>,
    #[serde(default)]
    pub comment: Option<LinkedValue>,
    #[serde(default)]
    pub grade: Option<LinkedValue>,
    #[serde(default, rename = "heldBy")]
    pub held_by: Option<LinkedValue>,
    #[serde(default, rename = "reportsTo")]
    pub reports_to: Option<LinkedValue>,
    #[serde(default, rename = "salaryRange")]
    pub salary_range: Option<LinkedValue>,
    #[serde(default, rename = "postStatus")]
    pub post_status: Option<LinkedValue>,
    #[serde(default)]
    pub unit: Option<LinkedValue>,
    #[serde(default)]
    pub profession: Option<LinkedValue>,
}

/// Any raw record the normalizer accepts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawRecord {
    SeniorRow(RawRow),
    JuniorRow(RawRow),
    LinkedItem(LinkedDataItem),
}

/// Everything one organisation-period run needs as input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganogramBatch {
    pub organisation: String,
    #[serde(default)]
    pub parent_department: String,
    pub period: Period,
    pub source: DataSource,
    pub records: Vec<RawRecord>,
}

// ============================================================================
// Validation Report
// ============================================================================

/// Category of a non-fatal structural problem
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Reference shared by posts that are not a legitimate job-share
    DuplicateRef,
    /// Senior post reports to a reference that does not exist
    UnknownBoss,
    /// Post reports to itself
    SelfReport,
    /// Reporting chain revisits a post
    Loop,
    /// No root within the step limit
    TooDeep,
    /// Junior post reports to an unknown senior post
    JuniorUnknownBoss,
    /// Eliminated-post repair did not converge
    EliminationChain,
}

impl ErrorCategory {
    pub const ALL: [ErrorCategory; 7] = [
        ErrorCategory::DuplicateRef,
        ErrorCategory::UnknownBoss,
        ErrorCategory::SelfReport,
        ErrorCategory::Loop,
        ErrorCategory::TooDeep,
        ErrorCategory::JuniorUnknownBoss,
        ErrorCategory::EliminationChain,
    ];
}

/// Non-fatal validation error naming the offending reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub post_ref: String,
    pub category: ErrorCategory,
    pub message: String,
}

impl ValidationMessage {
    pub fn new(post_ref: impl Into<String>, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            post_ref: post_ref.into(),
            category,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Kind of resolution warning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarningKind {
    /// Profession text not in the canonical taxonomy
    Profession,
    /// Missing boss could not be spliced out
    EliminatedPost,
    /// Linked-data field had several distinct values
    AmbiguousField,
}

/// Warning surfaced for operator visibility; never blocks output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolutionWarning {
    pub post_ref: Option<String>,
    pub kind: WarningKind,
    pub message: String,
}

impl ResolutionWarning {
    pub fn new(post_ref: Option<&str>, kind: WarningKind, message: impl Into<String>) -> Self {
        Self {
            post_ref: post_ref.map(str::to_string),
            kind,
            message: message.into(),
        }
    }
}

/// Structured error/warning report for one organisation-period
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub tier: crate::validator::StrictnessTier,
    pub errors: Vec<ValidationMessage>,
    pub warnings: Vec<ResolutionWarning>,
    pub fatal: Option<String>,
    pub will_display: bool,
}

/// Canonical output of one organisation-period run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrganogramOutput {
    /// Organisation name(s) for display, e.g. "Ministry of Defence - Army"
    pub name: String,
    /// Canonical department title stamped from the registry, if known
    pub department: Option<String>,
    pub period: Period,
    pub source: DataSource,
    pub senior: Vec<Post>,
    pub junior: Vec<JuniorPost>,
    pub report: ValidationReport,
}
