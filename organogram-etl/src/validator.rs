//! Structural Validator
//!
//! Walks every senior post up its reports-to chain to a root, collecting
//! non-fatal structural errors. Zero roots is the one fatal condition and is
//! returned as `Error::NoRoot`.
//!
//! The walk is iterative and carries the visited path explicitly. Each post's
//! distance to its root is memoized per call only; references are unique
//! within one organisation-period, so nothing is reused across post sets.
//! Eliminated posts are not part of the hierarchy: they are never walked
//! from, and reporting to one is reporting to an unknown boss.

use crate::graph::HierarchyGraph;
use crate::types::{ErrorCategory, ValidationMessage};
use organogram_common::config::ValidationConfig;
use organogram_common::{Error, JuniorPost, Period, Result, ROOT_SENTINEL};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::fmt;
use tracing::{debug, error, warn};

// ============================================================================
// Strictness Tiers
// ============================================================================

/// Enforcement level, chosen by the vintage of the data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrictnessTier {
    /// Oldest data: every structural error is tolerated
    Load,
    /// Every non-fatal structural error is tolerated; zero roots is not
    LoadAndDisplay,
    /// Every structural error blocks display
    LoadDisplayAndBeValid,
}

impl StrictnessTier {
    pub fn for_period(period: Period, config: &ValidationConfig) -> Self {
        let date = period.date();
        if date <= config.load_tier_until {
            StrictnessTier::Load
        } else if date <= config.display_tier_until {
            StrictnessTier::LoadAndDisplay
        } else {
            StrictnessTier::LoadDisplayAndBeValid
        }
    }

    /// Whether an error of this category stops the organogram being displayed
    pub fn blocks_display(self, _category: ErrorCategory) -> bool {
        matches!(self, StrictnessTier::LoadDisplayAndBeValid)
    }

    /// Whether posts are still emitted when there is no root
    pub fn emits_posts_without_root(self) -> bool {
        matches!(self, StrictnessTier::Load)
    }
}

impl fmt::Display for StrictnessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrictnessTier::Load => "load",
            StrictnessTier::LoadAndDisplay => "load and display",
            StrictnessTier::LoadDisplayAndBeValid => "load, display and be valid",
        })
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Result of one validation pass
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationOutcome {
    pub errors: Vec<ValidationMessage>,
    /// Boss references that exist nowhere in the post set
    pub unknown_refs: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum WalkState {
    /// Chain ends at `root`, `depth` steps up
    Reaches { root: String, depth: usize },
    /// Chain is broken; the break has already been reported
    Broken,
}

impl WalkState {
    /// State of the post `steps` below a post in this state
    fn below(&self, steps: usize) -> WalkState {
        match self {
            WalkState::Reaches { root, depth } => WalkState::Reaches {
                root: root.clone(),
                depth: depth + steps,
            },
            WalkState::Broken => WalkState::Broken,
        }
    }
}

pub struct StructuralValidator {
    max_depth: usize,
}

impl StructuralValidator {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    pub fn from_config(config: &ValidationConfig) -> Self {
        Self::new(config.max_walk_depth)
    }

    /// Validate the senior hierarchy and junior attachments.
    ///
    /// Returns `Error::NoRoot` when no post reports to the root sentinel.
    pub fn validate(&self, graph: &HierarchyGraph, juniors: &[JuniorPost]) -> Result<ValidationOutcome> {
        if graph.roots().next().is_none() {
            let message = format!(
                "There should be at least one senior post with \"Reports to Senior Post\" value of \"{}\", but none was found among {} senior post(s)",
                ROOT_SENTINEL,
                graph.len()
            );
            error!("{}", message);
            return Err(Error::NoRoot(message));
        }

        let mut outcome = ValidationOutcome::default();
        let mut memo: HashMap<&str, WalkState> = HashMap::new();

        for start in graph.refs() {
            if graph.is_eliminated(start) || memo.contains_key(start) {
                continue;
            }
            let (path, end) = self.walk(graph, start, &memo, &mut outcome);
            debug!(post_ref = %start, steps = path.len() - 1, ?end, "Walked to top");

            let last = path.len() - 1;
            for (i, r) in path.into_iter().enumerate() {
                if memo.contains_key(r) {
                    continue;
                }
                let state = end.below(last - i);
                if let WalkState::Reaches { depth, .. } = &state {
                    if *depth > self.max_depth {
                        report(
                            &mut outcome,
                            r,
                            ErrorCategory::TooDeep,
                            format!(
                                "Senior post \"{}\" is {} steps below its top post, more than the limit of {}",
                                r, depth, self.max_depth
                            ),
                        );
                    }
                }
                memo.insert(r, state);
            }
        }

        self.check_juniors(graph, juniors, &mut outcome);
        Ok(outcome)
    }

    /// Follow reports-to links from `start` until a root, a memoized post or
    /// a break. Returns the visited path and the state of its last post.
    fn walk<'g>(
        &self,
        graph: &'g HierarchyGraph,
        start: &'g str,
        memo: &HashMap<&str, WalkState>,
        outcome: &mut ValidationOutcome,
    ) -> (Vec<&'g str>, WalkState) {
        let mut path: Vec<&'g str> = vec![start];

        let state = loop {
            let current = path[path.len() - 1];
            if graph.is_root(current) {
                break WalkState::Reaches {
                    root: current.to_string(),
                    depth: 0,
                };
            }
            if let Some(known) = memo.get(current) {
                break known.clone();
            }

            let Some(boss) = graph.boss_of(current) else {
                break WalkState::Broken;
            };
            if boss == current {
                report(
                    outcome,
                    current,
                    ErrorCategory::SelfReport,
                    format!("Senior post \"{}\" reports to itself", current),
                );
                break WalkState::Broken;
            }
            if !graph.contains(boss) || graph.is_eliminated(boss) {
                report(
                    outcome,
                    current,
                    ErrorCategory::UnknownBoss,
                    format!(
                        "Senior post \"{}\" reports to unknown senior post \"{}\"",
                        current, boss
                    ),
                );
                if !graph.contains(boss) {
                    outcome.unknown_refs.insert(boss.to_string());
                }
                break WalkState::Broken;
            }
            if let Some(pos) = path.iter().position(|r| *r == boss) {
                let mut cycle: Vec<&str> = path[pos..].to_vec();
                cycle.push(boss);
                report(
                    outcome,
                    boss,
                    ErrorCategory::Loop,
                    format!("Reporting loop between senior posts: {}", cycle.join(" -> ")),
                );
                break WalkState::Broken;
            }

            path.push(boss);
        };

        (path, state)
    }

    /// Each unknown reference named by junior posts is reported once
    fn check_juniors(&self, graph: &HierarchyGraph, juniors: &[JuniorPost], outcome: &mut ValidationOutcome) {
        let mut reported: BTreeSet<&str> = BTreeSet::new();
        for junior in juniors {
            let boss = junior.reports_to_ref.as_str();
            if !graph.contains(boss) && reported.insert(boss) {
                report(
                    outcome,
                    boss,
                    ErrorCategory::JuniorUnknownBoss,
                    format!("Junior post(s) report to unknown senior post \"{}\"", boss),
                );
            }
        }
    }
}

fn report(outcome: &mut ValidationOutcome, post_ref: &str, category: ErrorCategory, message: String) {
    warn!(post_ref = %post_ref, ?category, "{}", message);
    outcome
        .errors
        .push(ValidationMessage::new(post_ref, category, message));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use organogram_common::{DataSource, Post, PostStatus};

    fn post(post_ref: &str, boss: &str) -> Post {
        Post::new(post_ref, boss, DataSource::Upload)
    }

    fn validate(posts: &[Post]) -> Result<ValidationOutcome> {
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(posts, &mut errors);
        StructuralValidator::new(100).validate(&graph, &[])
    }

    fn period(y: i32, m: u32, d: u32) -> Period {
        Period(NaiveDate::from_ymd_opt(y, m, d).unwrap())
    }

    #[test]
    fn test_valid_tree_has_no_errors() {
        let posts = vec![post("1", "XX"), post("2", "1"), post("3", "1"), post("4", "2"), post("5", "3")];
        let outcome = validate(&posts).unwrap();
        assert!(outcome.errors.is_empty());
        assert!(outcome.unknown_refs.is_empty());
    }

    #[test]
    fn test_no_root_is_fatal() {
        let posts = vec![post("1", "2"), post("2", "1")];
        assert!(matches!(validate(&posts), Err(Error::NoRoot(_))));
        assert!(matches!(validate(&[]), Err(Error::NoRoot(_))));
    }

    #[test]
    fn test_three_cycle_reported_once() {
        let posts = vec![post("1", "XX"), post("A", "B"), post("B", "C"), post("C", "A")];
        let outcome = validate(&posts).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        let err = &outcome.errors[0];
        assert_eq!(err.category, ErrorCategory::Loop);
        for r in ["A", "B", "C"] {
            assert!(err.message.contains(r), "{}", err.message);
        }
    }

    #[test]
    fn test_posts_below_a_loop_are_not_reported_again() {
        let posts = vec![post("1", "XX"), post("A", "B"), post("B", "A"), post("D", "A")];
        let outcome = validate(&posts).unwrap();
        assert_eq!(outcome.errors.len(), 1);
    }

    #[test]
    fn test_self_report_does_not_hide_other_errors() {
        let posts = vec![post("1", "XX"), post("2", "2"), post("3", "99")];
        let outcome = validate(&posts).unwrap();

        let categories: Vec<_> = outcome.errors.iter().map(|e| e.category).collect();
        assert_eq!(categories, vec![ErrorCategory::SelfReport, ErrorCategory::UnknownBoss]);
        assert_eq!(outcome.errors[0].post_ref, "2");
        assert!(outcome.unknown_refs.contains("99"));
    }

    #[test]
    fn test_too_deep() {
        let mut posts = vec![post("0", "XX")];
        for i in 1..=10 {
            posts.push(post(&i.to_string(), &(i - 1).to_string()));
        }
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&posts, &mut errors);

        let outcome = StructuralValidator::new(5).validate(&graph, &[]).unwrap();
        assert!(outcome
            .errors
            .iter()
            .all(|e| e.category == ErrorCategory::TooDeep));
        let refs: BTreeSet<_> = outcome.errors.iter().map(|e| e.post_ref.as_str()).collect();
        assert_eq!(refs, BTreeSet::from(["6", "7", "8", "9", "10"]));

        let outcome = StructuralValidator::new(100).validate(&graph, &[]).unwrap();
        assert!(outcome.errors.is_empty());
    }

    /// Chain of `len + 1` posts, each reporting to the one named before it
    fn chain(names: impl Fn(usize) -> String, len: usize) -> Vec<Post> {
        let mut posts = vec![post(&names(0), "XX")];
        for i in 1..=len {
            posts.push(post(&names(i), &names(i - 1)));
        }
        posts
    }

    fn too_deep_refs(posts: &[Post]) -> BTreeSet<String> {
        let outcome = validate(posts).unwrap();
        assert!(outcome
            .errors
            .iter()
            .all(|e| e.category == ErrorCategory::TooDeep));
        outcome.errors.into_iter().map(|e| e.post_ref).collect()
    }

    #[test]
    fn test_long_chain_walked_from_the_top_down() {
        // "p000" is the root, so the top of the chain is memoized first
        let posts = chain(|i| format!("p{:03}", i), 150);

        let refs = too_deep_refs(&posts);

        assert_eq!(refs.len(), 50);
        assert!(refs.contains("p101"));
        assert!(refs.contains("p150"));
        assert!(!refs.contains("p100"));
    }

    #[test]
    fn test_long_chain_walked_from_the_bottom_up() {
        // "q000" is the deepest post, so it is walked first
        let posts = chain(|i| format!("q{:03}", 150 - i), 150);

        let refs = too_deep_refs(&posts);

        assert_eq!(refs.len(), 50);
        assert!(refs.contains("q049"));
        assert!(refs.contains("q000"));
        assert!(!refs.contains("q050"));
    }

    #[test]
    fn test_eliminated_post_is_not_a_root() {
        let mut top = post("1", "XX");
        top.status = PostStatus::Eliminated;
        let posts = vec![top, post("2", "1")];

        assert!(matches!(validate(&posts), Err(Error::NoRoot(_))));
    }

    #[test]
    fn test_reporting_to_eliminated_post_is_unknown_boss() {
        let mut gone = post("E", "1");
        gone.status = PostStatus::Eliminated;
        let outcome = validate(&[post("1", "XX"), gone, post("P", "E")]).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].category, ErrorCategory::UnknownBoss);
        assert_eq!(outcome.errors[0].post_ref, "P");
        assert!(outcome.unknown_refs.is_empty());
    }

    #[test]
    fn test_eliminated_posts_are_not_walked() {
        let mut gone = post("5", "77");
        gone.status = PostStatus::Eliminated;
        let outcome = validate(&[post("1", "XX"), gone]).unwrap();
        assert!(outcome.errors.is_empty());
    }

    #[test]
    fn test_junior_unknown_boss_reported_once_per_ref() {
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&[post("1", "XX")], &mut errors);
        let juniors = vec![
            JuniorPost::new("1", DataSource::Upload),
            JuniorPost::new("8", DataSource::Upload),
            JuniorPost::new("8", DataSource::Upload),
        ];
        let outcome = StructuralValidator::new(100).validate(&graph, &juniors).unwrap();

        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].category, ErrorCategory::JuniorUnknownBoss);
        assert_eq!(outcome.errors[0].post_ref, "8");
    }

    #[test]
    fn test_tier_by_period() {
        let config = ValidationConfig::default();
        assert_eq!(StrictnessTier::for_period(period(2011, 3, 31), &config), StrictnessTier::Load);
        assert_eq!(
            StrictnessTier::for_period(period(2016, 9, 30), &config),
            StrictnessTier::LoadAndDisplay
        );
        assert_eq!(
            StrictnessTier::for_period(period(2017, 3, 31), &config),
            StrictnessTier::LoadDisplayAndBeValid
        );
    }

    #[test]
    fn test_only_strict_tier_blocks_display() {
        for category in ErrorCategory::ALL {
            assert!(!StrictnessTier::Load.blocks_display(category));
            assert!(!StrictnessTier::LoadAndDisplay.blocks_display(category));
            assert!(StrictnessTier::LoadDisplayAndBeValid.blocks_display(category));
        }
    }
}
