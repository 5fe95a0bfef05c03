//! Eliminated-Post Resolver
//!
//! Linked-data sources drop retired ("eliminated") posts while posts that
//! used to report to them still name them as boss. For every boss reference
//! missing from the set, the post is fetched from the detail source; if it is
//! eliminated it joins the set and its reports are re-pointed at its own boss.
//! Repeats until nothing is missing or the round cap is hit.

use crate::retry::with_retries;
use crate::types::{ErrorCategory, ResolutionWarning, ValidationMessage, WarningKind};
use async_trait::async_trait;
use organogram_common::config::{LinkedDataConfig, ValidationConfig};
use organogram_common::post::is_root_ref;
use organogram_common::{Post, PostStatus, Result};
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Source of single-post details
#[async_trait]
pub trait PostDetailSource: Send + Sync {
    /// Fetch one post by reference. `Ok(None)` means the source has no such
    /// post; `Err` means the fetch itself failed.
    async fn fetch_post(&self, post_ref: &str) -> Result<Option<Post>>;
}

/// What one resolution pass did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EliminationSummary {
    /// Missing bosses that were spliced out, in the order found
    pub spliced: Vec<String>,
    /// Missing bosses left dangling
    pub unresolved: Vec<String>,
    pub rounds: usize,
}

pub struct EliminatedPostResolver {
    max_rounds: usize,
    fetch_attempts: u32,
    /// Lowercased status labels accepted besides "eliminated"
    exceptions: Vec<String>,
}

impl EliminatedPostResolver {
    pub fn new(max_rounds: usize, fetch_attempts: u32, exceptions: &[String]) -> Self {
        Self {
            max_rounds,
            fetch_attempts,
            exceptions: exceptions.iter().map(|s| s.trim().to_lowercase()).collect(),
        }
    }

    pub fn from_config(validation: &ValidationConfig, linked_data: &LinkedDataConfig) -> Self {
        Self::new(
            validation.max_elimination_rounds,
            linked_data.fetch_attempts,
            &validation.eliminated_status_exceptions,
        )
    }

    /// True if a post with this status may be spliced out of the hierarchy
    pub fn accepts(&self, status: &PostStatus) -> bool {
        match status {
            PostStatus::Eliminated => true,
            other => self.exceptions.iter().any(|e| e == other.label()),
        }
    }

    /// Repair dangling boss references in `posts`.
    ///
    /// Failed fetches (after retries) abort with `Error::Fetch`. Every other
    /// problem is a warning or a validation error appended to the caller's
    /// lists.
    pub async fn resolve(
        &self,
        posts: &mut Vec<Post>,
        source: &dyn PostDetailSource,
        errors: &mut Vec<ValidationMessage>,
        warnings: &mut Vec<ResolutionWarning>,
    ) -> Result<EliminationSummary> {
        let mut summary = EliminationSummary::default();
        let mut dangling: BTreeSet<String> = BTreeSet::new();

        while summary.rounds < self.max_rounds {
            let missing = missing_bosses(posts, &dangling);
            if missing.is_empty() {
                summary.unresolved = dangling.into_iter().collect();
                return Ok(summary);
            }
            summary.rounds += 1;

            for missing_ref in missing {
                let operation = format!("fetch post {}", missing_ref);
                let fetched =
                    with_retries(&operation, self.fetch_attempts, || source.fetch_post(&missing_ref)).await?;

                match fetched {
                    None => {
                        warn!(post_ref = %missing_ref, "Missing boss not found at source");
                        warnings.push(ResolutionWarning::new(
                            Some(&missing_ref),
                            WarningKind::EliminatedPost,
                            format!(
                                "Post \"{}\" is named as a boss but does not exist at the source",
                                missing_ref
                            ),
                        ));
                        dangling.insert(missing_ref);
                    }
                    Some(post) if !self.accepts(&post.status) => {
                        warn!(post_ref = %missing_ref, status = %post.status.label(), "Missing boss is not eliminated");
                        warnings.push(ResolutionWarning::new(
                            Some(&missing_ref),
                            WarningKind::EliminatedPost,
                            format!(
                                "Post \"{}\" is named as a boss but has status \"{}\", not \"eliminated\"",
                                missing_ref,
                                post.status.label()
                            ),
                        ));
                        dangling.insert(missing_ref);
                    }
                    Some(post) if post.reports_to_ref == missing_ref => {
                        warnings.push(ResolutionWarning::new(
                            Some(&missing_ref),
                            WarningKind::EliminatedPost,
                            format!("Eliminated post \"{}\" reports to itself", missing_ref),
                        ));
                        dangling.insert(missing_ref);
                    }
                    Some(mut post) => {
                        post.post_ref = missing_ref.clone();
                        let new_boss = post.reports_to_ref.clone();
                        let mut rewired = 0;
                        for p in posts.iter_mut().filter(|p| p.reports_to_ref == missing_ref) {
                            p.reports_to_ref = new_boss.clone();
                            rewired += 1;
                        }
                        info!(
                            post_ref = %missing_ref,
                            new_boss = %new_boss,
                            rewired,
                            "Spliced out eliminated post"
                        );
                        posts.push(post);
                        summary.spliced.push(missing_ref);
                    }
                }
            }
        }

        let remaining = missing_bosses(posts, &dangling);
        for missing_ref in &remaining {
            warn!(post_ref = %missing_ref, rounds = self.max_rounds, "Eliminated-post repair did not converge");
            errors.push(ValidationMessage::new(
                missing_ref,
                ErrorCategory::EliminationChain,
                format!(
                    "Gave up resolving missing boss \"{}\" after {} rounds of eliminated-post repair. Is there a loop of eliminated posts?",
                    missing_ref, self.max_rounds
                ),
            ));
        }
        summary.unresolved = dangling.into_iter().chain(remaining).collect();
        Ok(summary)
    }
}

/// Boss references that name no post in the set, excluding ones already
/// known to be dangling
fn missing_bosses(posts: &[Post], dangling: &BTreeSet<String>) -> BTreeSet<String> {
    let known: BTreeSet<&str> = posts.iter().map(|p| p.post_ref.as_str()).collect();
    posts
        .iter()
        .map(|p| p.reports_to_ref.trim())
        .filter(|r| !r.is_empty() && !is_root_ref(r))
        .filter(|r| !known.contains(r) && !dangling.contains(*r))
        .map(str::to_string)
        .collect()
}
