//! Output Assembler
//!
//! Final shaping of a validated post set: the self-reporting root
//! convention, exact-duplicate removal, stable numeric-aware ordering,
//! department stamping and the display name.

use crate::registry::DepartmentRegistry;
use crate::types::{OrganogramOutput, ValidationReport};
use organogram_common::{DataSource, JuniorPost, Period, Post, ROOT_SENTINEL};
use std::cmp::Ordering;
use tracing::{debug, info};

const MOD_ORGANISATION: &str = "Ministry of Defence";

/// Re-point the top post of a self-reporting organisation at the root
/// sentinel. Returns how many posts were changed. Idempotent.
pub fn apply_root_convention(posts: &mut [Post], self_reporting_orgs: &[String]) -> usize {
    let mut changed = 0;
    for post in posts.iter_mut() {
        let self_reporting = self_reporting_orgs
            .iter()
            .any(|org| org.trim().eq_ignore_ascii_case(post.organisation.trim()));
        if self_reporting && post.reports_to_ref == post.post_ref {
            debug!(post_ref = %post.post_ref, organisation = %post.organisation, "Self-reporting top post mapped to root");
            post.reports_to_ref = ROOT_SENTINEL.to_string();
            changed += 1;
        }
    }
    changed
}

/// Compare references, ordering runs of digits by value ("2" < "10").
/// Ties such as "02" and "2" fall back to plain text order.
pub fn compare_refs(a: &str, b: &str) -> Ordering {
    natural_cmp(a, b).then_with(|| a.cmp(b))
}

fn natural_cmp(mut a: &str, mut b: &str) -> Ordering {
    loop {
        match (a.is_empty(), b.is_empty()) {
            (true, true) => return Ordering::Equal,
            (true, false) => return Ordering::Less,
            (false, true) => return Ordering::Greater,
            _ => {}
        }

        let a_digits = a.len() - a.trim_start_matches(|c: char| c.is_ascii_digit()).len();
        let b_digits = b.len() - b.trim_start_matches(|c: char| c.is_ascii_digit()).len();

        let ord = if a_digits > 0 && b_digits > 0 {
            let (na, nb) = (a[..a_digits].trim_start_matches('0'), b[..b_digits].trim_start_matches('0'));
            let ord = na.len().cmp(&nb.len()).then_with(|| na.cmp(nb));
            a = &a[a_digits..];
            b = &b[b_digits..];
            ord
        } else {
            let (ca, cb) = (a.chars().next(), b.chars().next());
            let ord = ca.cmp(&cb);
            a = &a[ca.map_or(0, char::len_utf8)..];
            b = &b[cb.map_or(0, char::len_utf8)..];
            ord
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
}

/// Display name: distinct organisation names joined with " & ". For the
/// Ministry of Defence the distinct unit names follow after " - ".
pub fn organogram_name(posts: &[Post], fallback: &str) -> String {
    let mut orgs: Vec<&str> = Vec::new();
    for post in posts {
        let org = post.organisation.trim();
        if !org.is_empty() && !orgs.contains(&org) {
            orgs.push(org);
        }
    }
    if orgs.is_empty() {
        orgs.push(fallback);
    }
    let mut name = orgs.join(" & ");

    if orgs.contains(&MOD_ORGANISATION) {
        let mut units: Vec<&str> = Vec::new();
        for post in posts {
            let unit = post.unit.trim();
            if !unit.is_empty() && !units.contains(&unit) {
                units.push(unit);
            }
        }
        if !units.is_empty() {
            name = format!("{} - {}", name, units.join(" & "));
        }
    }
    name
}

/// Builds the canonical output for one organisation-period
pub struct OutputAssembler<'a> {
    registry: Option<&'a dyn DepartmentRegistry>,
}

impl<'a> OutputAssembler<'a> {
    pub fn new(registry: Option<&'a dyn DepartmentRegistry>) -> Self {
        Self { registry }
    }

    pub fn assemble(
        &self,
        organisation: &str,
        period: Period,
        source: DataSource,
        senior: Vec<Post>,
        mut junior: Vec<JuniorPost>,
        report: ValidationReport,
    ) -> OrganogramOutput {
        let before = senior.len();
        let mut senior = dedup_exact(senior);
        senior.sort_by(|a, b| compare_refs(&a.post_ref, &b.post_ref).then_with(|| a.name.cmp(&b.name)));
        junior.sort_by(|a, b| {
            compare_refs(&a.reports_to_ref, &b.reports_to_ref)
                .then_with(|| a.grade.cmp(&b.grade))
                .then_with(|| a.title.cmp(&b.title))
        });

        let department = self.registry.and_then(|r| r.canonical_title(organisation));
        let name = organogram_name(&senior, organisation);

        info!(
            organisation,
            senior = senior.len(),
            duplicates_removed = before - senior.len(),
            junior = junior.len(),
            will_display = report.will_display,
            "Assembled organogram"
        );

        OrganogramOutput {
            name,
            department,
            period,
            source,
            senior,
            junior,
            report,
        }
    }
}

/// Drop posts identical in every field, keeping first occurrences. Job-share
/// members differ in name or pay and are kept.
fn dedup_exact(posts: Vec<Post>) -> Vec<Post> {
    let mut kept: Vec<Post> = Vec::with_capacity(posts.len());
    for post in posts {
        if !kept.iter().any(|k| *k == post) {
            kept.push(post);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::StaticRegistry;
    use crate::validator::StrictnessTier;
    use chrono::NaiveDate;

    fn post(post_ref: &str, name: &str) -> Post {
        let mut p = Post::new(post_ref, "XX", DataSource::Upload);
        p.name = name.to_string();
        p.organisation = "Cabinet Office".to_string();
        p
    }

    fn report() -> ValidationReport {
        ValidationReport {
            tier: StrictnessTier::LoadDisplayAndBeValid,
            errors: Vec::new(),
            warnings: Vec::new(),
            fatal: None,
            will_display: true,
        }
    }

    fn period() -> Period {
        Period(NaiveDate::from_ymd_opt(2017, 3, 31).unwrap())
    }

    #[test]
    fn test_numeric_aware_ordering() {
        let mut refs = vec!["10", "2", "1", "A2", "A10", "B", "02"];
        refs.sort_by(|a, b| compare_refs(a, b));
        assert_eq!(refs, vec!["1", "02", "2", "10", "A2", "A10", "B"]);
    }

    #[test]
    fn test_assemble_orders_and_dedups() {
        let posts = vec![post("10", "Ann"), post("2", "Cat"), post("2", "Bob"), post("10", "Ann")];
        let output = OutputAssembler::new(None).assemble(
            "Cabinet Office",
            period(),
            DataSource::Upload,
            posts,
            Vec::new(),
            report(),
        );

        let order: Vec<_> = output
            .senior
            .iter()
            .map(|p| (p.post_ref.as_str(), p.name.as_str()))
            .collect();
        assert_eq!(order, vec![("2", "Bob"), ("2", "Cat"), ("10", "Ann")]);
        assert_eq!(output.name, "Cabinet Office");
        assert!(output.department.is_none());
    }

    #[test]
    fn test_department_stamped_from_registry() {
        let mut registry = StaticRegistry::new();
        registry.insert("Cabinet Office", "Cabinet Office (CO)");
        let output = OutputAssembler::new(Some(&registry)).assemble(
            "cabinet office",
            period(),
            DataSource::Upload,
            vec![post("1", "Ann")],
            Vec::new(),
            report(),
        );
        assert_eq!(output.department.as_deref(), Some("Cabinet Office (CO)"));
    }

    #[test]
    fn test_juniors_sorted_by_boss() {
        let juniors = vec![
            JuniorPost::new("10", DataSource::Upload),
            JuniorPost::new("3", DataSource::Upload),
        ];
        let output = OutputAssembler::new(None).assemble(
            "Cabinet Office",
            period(),
            DataSource::Upload,
            Vec::new(),
            juniors,
            report(),
        );
        assert_eq!(output.junior[0].reports_to_ref, "3");
    }

    #[test]
    fn test_root_convention_is_idempotent() {
        let mut posts = vec![post("1", "Ann"), post("2", "Bob")];
        posts[0].reports_to_ref = "1".to_string();
        posts[1].reports_to_ref = "1".to_string();
        let orgs = vec!["cabinet office".to_string()];

        assert_eq!(apply_root_convention(&mut posts, &orgs), 1);
        assert_eq!(posts[0].reports_to_ref, ROOT_SENTINEL);
        assert_eq!(posts[1].reports_to_ref, "1");
        assert_eq!(apply_root_convention(&mut posts, &orgs), 0);
    }

    #[test]
    fn test_root_convention_only_for_listed_orgs() {
        let mut posts = vec![post("1", "Ann")];
        posts[0].reports_to_ref = "1".to_string();
        assert_eq!(apply_root_convention(&mut posts, &[]), 0);
    }

    #[test]
    fn test_organogram_name() {
        let mut a = post("1", "Ann");
        a.organisation = "Ministry of Defence".to_string();
        a.unit = "Army".to_string();
        let mut b = a.clone();
        b.unit = "Navy".to_string();
        assert_eq!(organogram_name(&[a, b], "x"), "Ministry of Defence - Army & Navy");

        let c = post("1", "Ann");
        let mut d = post("2", "Bob");
        d.organisation = "Government Digital Service".to_string();
        assert_eq!(
            organogram_name(&[c, d], "x"),
            "Cabinet Office & Government Digital Service"
        );
        assert_eq!(organogram_name(&[], "Fallback Org"), "Fallback Org");
    }
}
