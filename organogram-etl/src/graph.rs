//! Hierarchy Graph
//!
//! Directed reports-to graph over senior post references. Built once per
//! validation pass from the normalized posts; job-share members collapse
//! onto one node.

use crate::types::{ErrorCategory, ValidationMessage};
use organogram_common::post::is_root_ref;
use organogram_common::Post;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct HierarchyGraph {
    /// post_ref -> reports_to_ref (first post seen for a reference)
    reports_to: BTreeMap<String, String>,
    /// boss ref -> direct report refs
    children: BTreeMap<String, Vec<String>>,
    /// refs reporting to the root sentinel, eliminated posts excluded
    roots: BTreeSet<String>,
    /// refs whose post is marked eliminated
    eliminated: BTreeSet<String>,
}

impl HierarchyGraph {
    /// Build the graph. Posts sharing a reference must agree on every
    /// job-share field; each reference that does not is reported once.
    pub fn build(posts: &[Post], errors: &mut Vec<ValidationMessage>) -> Self {
        let mut graph = HierarchyGraph::default();
        let mut first_seen: BTreeMap<&str, &Post> = BTreeMap::new();
        let mut reported: BTreeSet<&str> = BTreeSet::new();

        for post in posts {
            match first_seen.get(post.post_ref.as_str()) {
                Some(first) => {
                    if first.job_share_key() != post.job_share_key()
                        && reported.insert(post.post_ref.as_str())
                    {
                        warn!(post_ref = %post.post_ref, "Duplicate post reference");
                        errors.push(ValidationMessage::new(
                            &post.post_ref,
                            ErrorCategory::DuplicateRef,
                            format!(
                                "Senior post reference \"{}\" is used more than once, and the posts differ in more than name, pay and contact details, so they are not a job-share",
                                post.post_ref
                            ),
                        ));
                    }
                }
                None => {
                    first_seen.insert(&post.post_ref, post);
                    graph
                        .reports_to
                        .insert(post.post_ref.clone(), post.reports_to_ref.clone());
                    if post.is_eliminated() {
                        graph.eliminated.insert(post.post_ref.clone());
                    }
                }
            }
        }

        for (post_ref, boss) in &graph.reports_to {
            if is_root_ref(boss) {
                if !graph.eliminated.contains(post_ref) {
                    graph.roots.insert(post_ref.clone());
                }
            } else {
                graph
                    .children
                    .entry(boss.clone())
                    .or_default()
                    .push(post_ref.clone());
            }
        }

        debug!(
            nodes = graph.reports_to.len(),
            roots = graph.roots.len(),
            "Built hierarchy graph"
        );
        graph
    }

    pub fn len(&self) -> usize {
        self.reports_to.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reports_to.is_empty()
    }

    pub fn contains(&self, post_ref: &str) -> bool {
        self.reports_to.contains_key(post_ref)
    }

    pub fn boss_of(&self, post_ref: &str) -> Option<&str> {
        self.reports_to.get(post_ref).map(|s| s.as_str())
    }

    /// Direct reports, sorted by reference
    pub fn children_of(&self, post_ref: &str) -> &[String] {
        self.children.get(post_ref).map(|c| c.as_slice()).unwrap_or(&[])
    }

    pub fn is_root(&self, post_ref: &str) -> bool {
        self.roots.contains(post_ref)
    }

    pub fn roots(&self) -> impl Iterator<Item = &str> {
        self.roots.iter().map(|s| s.as_str())
    }

    pub fn is_eliminated(&self, post_ref: &str) -> bool {
        self.eliminated.contains(post_ref)
    }

    /// All references in sorted order
    pub fn refs(&self) -> impl Iterator<Item = &str> {
        self.reports_to.keys().map(|s| s.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use organogram_common::{Amount, DataSource, PostStatus};

    fn post(post_ref: &str, boss: &str) -> Post {
        let mut p = Post::new(post_ref, boss, DataSource::Upload);
        p.title = format!("Post {}", post_ref);
        p
    }

    #[test]
    fn test_build_simple_tree() {
        let posts = vec![post("1", "XX"), post("2", "1"), post("3", "1"), post("4", "2")];
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&posts, &mut errors);

        assert!(errors.is_empty());
        assert_eq!(graph.len(), 4);
        assert_eq!(graph.roots().collect::<Vec<_>>(), vec!["1"]);
        assert_eq!(graph.children_of("1"), &["2".to_string(), "3".to_string()]);
        assert_eq!(graph.boss_of("4"), Some("2"));
        assert!(graph.children_of("4").is_empty());
    }

    #[test]
    fn test_lowercase_sentinel_is_root() {
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&[post("1", "xx")], &mut errors);
        assert!(graph.is_root("1"));
    }

    #[test]
    fn test_job_share_collapses_to_one_node() {
        let mut a = post("7", "1");
        a.name = "Ann".to_string();
        a.fte = Amount::Value(0.5);
        let mut b = a.clone();
        b.name = "Bob".to_string();

        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&[post("1", "XX"), a, b], &mut errors);

        assert!(errors.is_empty());
        assert_eq!(graph.len(), 2);
    }

    #[test]
    fn test_conflicting_duplicate_reported_once() {
        let a = post("7", "1");
        let mut b = a.clone();
        b.grade = "SCS3".to_string();
        let mut c = a.clone();
        c.unit = "Legal".to_string();

        let mut errors = Vec::new();
        HierarchyGraph::build(&[post("1", "XX"), a, b, c], &mut errors);

        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].category, ErrorCategory::DuplicateRef);
        assert_eq!(errors[0].post_ref, "7");
    }

    #[test]
    fn test_eliminated_refs_tracked() {
        let mut gone = post("5", "1");
        gone.status = PostStatus::Eliminated;
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&[post("1", "XX"), gone], &mut errors);

        assert!(graph.is_eliminated("5"));
        assert!(!graph.is_eliminated("1"));
    }

    #[test]
    fn test_eliminated_top_post_is_not_a_root() {
        let mut gone = post("1", "XX");
        gone.status = PostStatus::Eliminated;
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(&[gone, post("2", "XX")], &mut errors);

        assert_eq!(graph.roots().collect::<Vec<_>>(), vec!["2"]);
        assert!(!graph.is_root("1"));
    }
}
