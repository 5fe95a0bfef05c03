//! Post Normalizer
//!
//! Converts raw records (spreadsheet rows or linked-data items) into
//! canonical posts. Pure transformation: ingestion errors are appended to the
//! caller's list and never raised, so one pass reports every problem in a
//! batch.

use crate::types::{
    columns, LinkedDataItem, LinkedValue, RawRecord, RawRow, ResolutionWarning, WarningKind,
};
use organogram_common::{Amount, DataSource, JuniorPost, Post, PostStatus, ROOT_SENTINEL};
use tracing::debug;

/// Name used when a post has no disclosed holder
pub const NOT_DISCLOSED: &str = "N/D";

// Keys inside a linked-data `heldBy` entry
const HOLDER_NAME: &str = "name";
const HOLDER_EMAIL: &str = "email";
const HOLDER_PHONE: &str = "phone";
const HOLDER_FTE: &str = "workingTime";
const HOLDER_SALARY: &str = "salaryRange";

/// Organisation-level values stamped on every normalized post
#[derive(Debug, Clone)]
pub struct NormalizeContext {
    pub organisation: String,
    pub parent_department: String,
    pub source: DataSource,
}

/// Output of normalizing one or more raw records
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Normalized {
    pub senior: Vec<Post>,
    pub junior: Vec<JuniorPost>,
}

impl Normalized {
    pub fn extend(&mut self, other: Normalized) {
        self.senior.extend(other.senior);
        self.junior.extend(other.junior);
    }
}

pub struct PostNormalizer {
    ctx: NormalizeContext,
}

impl PostNormalizer {
    pub fn new(ctx: NormalizeContext) -> Self {
        Self { ctx }
    }

    /// Normalize a whole batch of records
    pub fn normalize_all(
        &self,
        records: &[RawRecord],
        errors: &mut Vec<String>,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Normalized {
        let mut out = Normalized::default();
        for record in records {
            out.extend(self.normalize(record, errors, warnings));
        }
        debug!(
            senior = out.senior.len(),
            junior = out.junior.len(),
            errors = errors.len(),
            "Normalized batch"
        );
        out
    }

    /// Normalize one record into zero or more posts
    pub fn normalize(
        &self,
        record: &RawRecord,
        errors: &mut Vec<String>,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Normalized {
        let mut out = Normalized::default();
        match record {
            RawRecord::SeniorRow(row) => out.senior.extend(self.normalize_senior_row(row, errors)),
            RawRecord::JuniorRow(row) => out.junior.extend(self.normalize_junior_row(row, errors)),
            RawRecord::LinkedItem(item) => {
                out.senior = self.normalize_linked_item(item, errors, warnings)
            }
        }
        out
    }

    // ========================================================================
    // Spreadsheet rows
    // ========================================================================

    /// Senior sheet row. A job-share appears in a sheet as several rows with
    /// the same reference, so one row is always at most one post.
    pub fn normalize_senior_row(&self, row: &RawRow, errors: &mut Vec<String>) -> Option<Post> {
        if row.is_blank() {
            return None;
        }
        let mut cells = RowReader::new(row, "senior", errors);

        let post_ref = normalize_ref(&cells.required(columns::POST_REF));
        if post_ref.is_empty() {
            cells.error(format!("\"{}\" is blank", columns::POST_REF));
            return None;
        }

        let grade = match row.get(columns::GRADE) {
            Some(grade) => grade.trim().to_string(),
            None => cells.required(columns::GRADE_SHORT),
        };

        let mut post = Post::new(post_ref, normalize_ref(&cells.required(columns::REPORTS_TO)), self.ctx.source);
        let name = cells.required(columns::NAME);
        post.status = status_from_name(&name);
        post.name = if name.is_empty() { NOT_DISCLOSED.to_string() } else { name };
        post.grade = grade;
        post.title = cells.required(columns::JOB_TITLE);
        post.job_function = cells.optional(columns::JOB_FUNCTION);
        post.parent_department = cells.optional_or(columns::PARENT_DEPARTMENT, &self.ctx.parent_department);
        post.organisation = cells.optional_or(columns::ORGANISATION, &self.ctx.organisation);
        post.unit = cells.optional(columns::UNIT);
        post.contact_phone = cells.optional(columns::CONTACT_PHONE);
        post.contact_email = cells.optional(columns::CONTACT_EMAIL);
        post.salary_cost_of_reports = cells.amount(columns::SALARY_COST_OF_REPORTS, false);
        post.fte = cells.amount(columns::FTE, true);
        post.salary_floor = cells.amount(columns::PAY_FLOOR, true);
        post.salary_ceiling = cells.amount(columns::PAY_CEILING, true);
        post.profession = cells.optional(columns::PROFESSION);
        post.notes = cells.optional(columns::NOTES);
        Some(post)
    }

    /// Junior sheet row
    pub fn normalize_junior_row(&self, row: &RawRow, errors: &mut Vec<String>) -> Option<JuniorPost> {
        if row.is_blank() {
            return None;
        }
        let mut cells = RowReader::new(row, "junior", errors);

        let mut post = JuniorPost::new(
            normalize_ref(&cells.required(columns::JUNIOR_REPORTS_TO)),
            self.ctx.source,
        );
        post.parent_department = cells.optional_or(columns::PARENT_DEPARTMENT, &self.ctx.parent_department);
        post.organisation = cells.optional_or(columns::ORGANISATION, &self.ctx.organisation);
        post.unit = cells.optional(columns::UNIT);
        post.grade = cells.required(columns::GRADE_SHORT);
        post.payscale_min = cells.amount(columns::PAYSCALE_MIN, true);
        post.payscale_max = cells.amount(columns::PAYSCALE_MAX, true);
        post.title = cells.required(columns::GENERIC_JOB_TITLE);
        post.fte = cells.amount(columns::JUNIOR_FTE, true);
        post.profession = cells.optional(columns::PROFESSION);
        Some(post)
    }

    // ========================================================================
    // Linked-data items
    // ========================================================================

    /// Linked-data post item. One post per holder; a vacant post (no
    /// holders) still yields exactly one post so its reference exists.
    pub fn normalize_linked_item(
        &self,
        item: &LinkedDataItem,
        errors: &mut Vec<String>,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Vec<Post> {
        let post_ref = ref_from_uri(&item.about);
        if post_ref.is_empty() {
            errors.push(format!("Linked-data item has no post URI: {:?}", item.about));
            return Vec::new();
        }
        let mut fields = ItemReader {
            post_ref: &post_ref,
            warnings,
        };

        let grade = fields.text(&item.grade, "label", "grade").unwrap_or_default();
        let reports_to_ref = match &item.reports_to {
            None => ROOT_SENTINEL.to_string(),
            Some(value) => match fields.text(&item.reports_to, "_about", "reportsTo") {
                Some(uri) => ref_from_uri(&uri),
                None if matches!(value, LinkedValue::Null) => ROOT_SENTINEL.to_string(),
                None => String::new(),
            },
        };

        let mut shared = Post::new(post_ref.clone(), reports_to_ref, self.ctx.source);
        shared.grade = grade;
        shared.title = fields.text(&item.label, "label", "label").unwrap_or_default();
        shared.job_function = fields.text(&item.comment, "label", "comment").unwrap_or_default();
        shared.parent_department = self.ctx.parent_department.clone();
        shared.organisation = self.ctx.organisation.clone();
        shared.unit = fields.text(&item.unit, "label", "unit").unwrap_or_default();
        shared.profession = fields.text(&item.profession, "label", "profession").unwrap_or_default();
        shared.status = fields
            .text(&item.post_status, "label", "postStatus")
            .map(|s| PostStatus::from_label(&s))
            .unwrap_or_default();
        shared.uri = Some(item.about.clone());

        let post_salary = fields.text(&item.salary_range, "label", "salaryRange");
        let (floor, ceiling) = salary_range(post_salary.as_deref(), &shared.grade, &post_ref, errors);
        shared.salary_floor = floor;
        shared.salary_ceiling = ceiling;
        shared.fte = Amount::Value(1.0);
        shared.name = NOT_DISCLOSED.to_string();
        shared.contact_phone = NOT_DISCLOSED.to_string();
        shared.contact_email = NOT_DISCLOSED.to_string();

        let holders = item.held_by.as_ref().map(|h| h.entries()).unwrap_or_default();
        if holders.is_empty() {
            return vec![shared];
        }

        holders
            .into_iter()
            .map(|holder| {
                let mut post = shared.clone();
                if let Some(name) = fields.holder_text(holder, HOLDER_NAME) {
                    post.name = name;
                }
                if let Some(email) = fields.holder_text(holder, HOLDER_EMAIL) {
                    post.contact_email = email.trim_start_matches("mailto:").to_string();
                }
                if let Some(phone) = fields.holder_text(holder, HOLDER_PHONE) {
                    post.contact_phone = phone.trim_start_matches("tel:").to_string();
                }
                if let Some(fte) = fields.holder_text(holder, HOLDER_FTE) {
                    post.fte = parse_amount(&fte, HOLDER_FTE, &post_ref, errors);
                }
                if let Some(range) = fields.holder_text(holder, HOLDER_SALARY) {
                    let (floor, ceiling) = salary_range(Some(&range), &post.grade, &post_ref, errors);
                    post.salary_floor = floor;
                    post.salary_ceiling = ceiling;
                }
                post
            })
            .collect()
    }
}

/// Reads cells from one row, recording missing columns and bad numbers
struct RowReader<'a> {
    row: &'a RawRow,
    sheet: &'static str,
    errors: &'a mut Vec<String>,
}

impl<'a> RowReader<'a> {
    fn new(row: &'a RawRow, sheet: &'static str, errors: &'a mut Vec<String>) -> Self {
        Self { row, sheet, errors }
    }

    fn error(&mut self, message: String) {
        self.errors.push(format!(
            "Sheet {} row {}: {}",
            self.sheet, self.row.row_number, message
        ));
    }

    fn required(&mut self, column: &str) -> String {
        match self.row.get(column) {
            Some(value) => value.trim().to_string(),
            None => {
                self.error(format!("missing column \"{}\"", column));
                String::new()
            }
        }
    }

    fn optional(&self, column: &str) -> String {
        self.row.get(column).map(|v| v.trim().to_string()).unwrap_or_default()
    }

    fn optional_or(&self, column: &str, fallback: &str) -> String {
        let value = self.optional(column);
        if value.is_empty() {
            fallback.to_string()
        } else {
            value
        }
    }

    fn amount(&mut self, column: &str, required: bool) -> Amount {
        let text = if required {
            self.required(column)
        } else {
            self.optional(column)
        };
        match Amount::parse(&text) {
            Ok(amount) => amount,
            Err(bad) => {
                self.error(format!(
                    "expected a numeric value in column \"{}\", but got text \"{}\"",
                    column, bad
                ));
                Amount::Blank
            }
        }
    }
}

/// Reads linked-data fields, turning ambiguous values into warnings
struct ItemReader<'a, 'w> {
    post_ref: &'a str,
    warnings: &'w mut Vec<ResolutionWarning>,
}

impl ItemReader<'_, '_> {
    fn resolve(&mut self, value: &LinkedValue, key: &str, field: &str) -> Option<String> {
        match value.resolve(key) {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(post_ref = %self.post_ref, field, "Ambiguous linked-data field: {}", err);
                self.warnings.push(ResolutionWarning::new(
                    Some(self.post_ref),
                    WarningKind::AmbiguousField,
                    format!("Post \"{}\" field \"{}\": {}", self.post_ref, field, err),
                ));
                None
            }
        }
    }

    fn text(&mut self, value: &Option<LinkedValue>, key: &str, field: &str) -> Option<String> {
        value.as_ref().and_then(|v| self.resolve(v, key, field))
    }

    fn holder_text(&mut self, holder: &LinkedValue, field: &str) -> Option<String> {
        let value = holder.field(field)?;
        match self.resolve(value, "label", field) {
            Some(text) => Some(text),
            None => self.resolve(value, "_about", field),
        }
    }
}

/// Spreadsheet cells sometimes carry numeric references as "12.0"
pub fn normalize_ref(text: &str) -> String {
    let text = text.trim();
    if let Some((whole, fraction)) = text.split_once('.') {
        if !whole.is_empty()
            && whole.chars().all(|c| c.is_ascii_digit())
            && !fraction.is_empty()
            && fraction.chars().all(|c| c == '0')
        {
            return whole.to_string();
        }
    }
    text.to_string()
}

/// Last path segment of a post URI
pub fn ref_from_uri(uri: &str) -> String {
    uri.trim()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}

fn status_from_name(name: &str) -> PostStatus {
    match name.trim().to_lowercase().as_str() {
        "eliminated" => PostStatus::Eliminated,
        "vacant" => PostStatus::Vacant,
        _ => PostStatus::Current,
    }
}

fn parse_amount(text: &str, field: &str, post_ref: &str, errors: &mut Vec<String>) -> Amount {
    Amount::parse(text).unwrap_or_else(|bad| {
        errors.push(format!(
            "Post \"{}\": expected a numeric value in \"{}\", but got text \"{}\"",
            post_ref, field, bad
        ));
        Amount::Blank
    })
}

/// Split "£A - £B" into floor and ceiling. With no range published, senior
/// civil service grades are "not disclosed" and other grades "not applicable".
fn salary_range(
    range: Option<&str>,
    grade: &str,
    post_ref: &str,
    errors: &mut Vec<String>,
) -> (Amount, Amount) {
    let Some(range) = range.map(str::trim).filter(|r| !r.is_empty()) else {
        return if grade.trim().to_uppercase().starts_with("SCS") {
            (Amount::NotDisclosed, Amount::NotDisclosed)
        } else {
            (Amount::NotApplicable, Amount::NotApplicable)
        };
    };

    match range.split_once(" - ") {
        Some((floor, ceiling)) => (
            parse_amount(floor, HOLDER_SALARY, post_ref, errors),
            parse_amount(ceiling, HOLDER_SALARY, post_ref, errors),
        ),
        None => {
            let single = parse_amount(range, HOLDER_SALARY, post_ref, errors);
            (single.clone(), single)
        }
    }
}
