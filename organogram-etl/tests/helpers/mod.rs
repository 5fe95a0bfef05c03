//! Test Helper Utilities
//!
//! Fixture builders and in-memory collaborators shared by the integration
//! tests.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use organogram_common::{DataSource, Error, Period, Post, PostStatus, Result};
use organogram_etl::eliminated::PostDetailSource;
use organogram_etl::types::{columns, LinkedDataItem, RawRecord, RawRow};
use organogram_etl::OrganogramBatch;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const ORGANISATION: &str = "Department for Culture, Media and Sport";

pub fn period(y: i32, m: u32, d: u32) -> Period {
    Period(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

/// A period validated at the strictest tier
pub fn strict_period() -> Period {
    period(2017, 3, 31)
}

pub fn senior_row(row_number: usize, post_ref: &str, reports_to: &str, title: &str) -> RawRecord {
    RawRecord::SeniorRow(
        RawRow::new(row_number)
            .with(columns::POST_REF, post_ref)
            .with(columns::NAME, format!("Holder of {}", post_ref))
            .with(columns::GRADE, "SCS1")
            .with(columns::JOB_TITLE, title)
            .with(columns::JOB_FUNCTION, "Leads the team")
            .with(columns::UNIT, "Strategy")
            .with(columns::CONTACT_PHONE, "0300 123 4567")
            .with(columns::CONTACT_EMAIL, "contact@example.gov.uk")
            .with(columns::REPORTS_TO, reports_to)
            .with(columns::FTE, "1.00")
            .with(columns::PAY_FLOOR, "70000")
            .with(columns::PAY_CEILING, "74999")
            .with(columns::PROFESSION, "Policy"),
    )
}

pub fn junior_row(row_number: usize, reports_to: &str, grade: &str) -> RawRecord {
    RawRecord::JuniorRow(
        RawRow::new(row_number)
            .with(columns::JUNIOR_REPORTS_TO, reports_to)
            .with(columns::GRADE_SHORT, grade)
            .with(columns::PAYSCALE_MIN, "25000")
            .with(columns::PAYSCALE_MAX, "30000")
            .with(columns::GENERIC_JOB_TITLE, "Policy Officer")
            .with(columns::JUNIOR_FTE, "3.5")
            .with(columns::PROFESSION, "Statistics Adviser"),
    )
}

pub fn upload_batch(period: Period, records: Vec<RawRecord>) -> OrganogramBatch {
    OrganogramBatch {
        organisation: ORGANISATION.to_string(),
        parent_department: ORGANISATION.to_string(),
        period,
        source: DataSource::Upload,
        records,
    }
}

/// Five senior posts (root, two direct reports, two grandchildren) and two
/// junior posts under the direct reports
pub fn five_post_records() -> Vec<RawRecord> {
    vec![
        senior_row(2, "1", "XX", "Permanent Secretary"),
        senior_row(3, "2", "1", "Director General, Policy"),
        senior_row(4, "3", "1", "Director General, Operations"),
        senior_row(5, "4", "2", "Director, Strategy"),
        senior_row(6, "5", "3", "Director, Delivery"),
        junior_row(2, "2", "Grade 7"),
        junior_row(3, "3", "SEO"),
    ]
}

pub fn linked_item(post_ref: &str, reports_to: Option<&str>, status: Option<&str>) -> RawRecord {
    RawRecord::LinkedItem(linked_data_item(post_ref, reports_to, status))
}

pub fn linked_data_item(post_ref: &str, reports_to: Option<&str>, status: Option<&str>) -> LinkedDataItem {
    let mut value = serde_json::json!({
        "_about": format!("http://reference.data.gov.uk/id/department/dcms/post/{}", post_ref),
        "label": [format!("Post {}", post_ref)],
        "grade": {"label": "SCS1"},
        "heldBy": [{"name": format!("Holder of {}", post_ref)}],
    });
    if let Some(boss) = reports_to {
        value["reportsTo"] = serde_json::json!({
            "_about": format!("http://reference.data.gov.uk/id/department/dcms/post/{}", boss)
        });
    }
    if let Some(status) = status {
        value["postStatus"] = serde_json::json!({"label": status});
    }
    serde_json::from_value(value).unwrap()
}

pub fn linked_batch(period: Period, records: Vec<RawRecord>) -> OrganogramBatch {
    OrganogramBatch {
        source: DataSource::LinkedData,
        ..upload_batch(period, records)
    }
}

/// Post detail source backed by a map, counting fetches
#[derive(Default)]
pub struct MockDetailSource {
    posts: HashMap<String, Post>,
    fail: bool,
    pub calls: AtomicUsize,
}

impl MockDetailSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn with_eliminated(mut self, post_ref: &str, reports_to: &str) -> Self {
        let mut post = Post::new(post_ref, reports_to, DataSource::LinkedData);
        post.title = format!("Former post {}", post_ref);
        post.status = PostStatus::Eliminated;
        self.posts.insert(post_ref.to_string(), post);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PostDetailSource for MockDetailSource {
    async fn fetch_post(&self, post_ref: &str) -> Result<Option<Post>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(Error::Fetch("service unavailable".to_string()));
        }
        Ok(self.posts.get(post_ref).cloned())
    }
}
