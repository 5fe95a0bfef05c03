//! Profession Resolver
//!
//! Maps free-text occupational labels onto the closed set of canonical
//! professions. Each step runs over every input value before the next,
//! looser step is tried.

use std::collections::HashMap;
use tracing::debug;

/// Canonical profession names
pub const CANONICAL_PROFESSIONS: &[&str] = &[
    "Communications",
    "Corporate Finance",
    "Economics",
    "Finance",
    "Human Resources",
    "Information Technology",
    "Internal Audit",
    "Knowledge and Information Management (KIM)",
    "Law",
    "Medicine",
    "Operational Delivery",
    "Operational Research",
    "Planning",
    "Policy",
    "Procurement and Contract Management",
    "Programme and Project Management (PPM)",
    "Property Asset Management",
    "Psychology",
    "Science and Engineering",
    "Social Research",
    "Statisticians",
    "Tax Professionals",
    "Veterinarian",
    "Other",
];

/// Hand-authored substring fallbacks, tried in order
const SUBSTRING_FALLBACKS: &[(&str, &str)] = &[
    ("scientist", "Science and Engineering"),
    ("scientific", "Science and Engineering"),
    ("engineer", "Science and Engineering"),
    ("statistic", "Statisticians"),
    ("legal", "Law"),
    ("lawyer", "Law"),
    ("solicitor", "Law"),
    ("economist", "Economics"),
    ("accountan", "Finance"),
    ("audit", "Internal Audit"),
    ("procurement", "Procurement and Contract Management"),
    ("commercial", "Procurement and Contract Management"),
    ("programme", "Programme and Project Management (PPM)"),
    ("project", "Programme and Project Management (PPM)"),
    ("communication", "Communications"),
    ("press office", "Communications"),
    ("digital", "Information Technology"),
    ("human resource", "Human Resources"),
    ("estates", "Property Asset Management"),
    ("medical", "Medicine"),
    ("veterinar", "Veterinarian"),
    ("psycholog", "Psychology"),
    ("social research", "Social Research"),
    ("tax", "Tax Professionals"),
];

/// Resolver with a per-run cache of earlier resolutions.
///
/// Construct one per organisation-period; resolutions never depend on the
/// cache contents, so a fresh resolver gives identical answers.
#[derive(Debug, Clone, Default)]
pub struct ProfessionResolver {
    cache: HashMap<Vec<String>, Option<&'static str>>,
}

impl ProfessionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve one or more raw labels. `None` when nothing matches, or when
    /// every value is blank.
    pub fn resolve<S: AsRef<str>>(&mut self, raw_values: &[S]) -> Option<String> {
        let values: Vec<String> = raw_values
            .iter()
            .map(|v| v.as_ref().trim().to_string())
            .filter(|v| !v.is_empty())
            .collect();
        if values.is_empty() {
            return None;
        }

        if let Some(hit) = self.cache.get(&values) {
            return hit.map(str::to_string);
        }
        let resolved = resolve_uncached(&values);
        debug!(?values, ?resolved, "Resolved profession");
        self.cache.insert(values, resolved);
        resolved.map(str::to_string)
    }
}

fn resolve_uncached(values: &[String]) -> Option<&'static str> {
    // 1. exact
    for value in values {
        if let Some(hit) = CANONICAL_PROFESSIONS.iter().find(|c| **c == value.as_str()) {
            return Some(*hit);
        }
    }

    // 2. case-insensitive, with the synonym swap and parentheticals dropped
    for value in values {
        let wanted = normalize(value);
        if let Some(hit) = CANONICAL_PROFESSIONS
            .iter()
            .find(|c| normalize(c) == wanted || normalize(strip_parenthetical(c)) == wanted)
        {
            return Some(*hit);
        }
    }

    // 3. first word
    for value in values {
        let Some(word) = first_word(value) else { continue };
        if let Some(hit) = CANONICAL_PROFESSIONS
            .iter()
            .find(|c| first_word(c).as_deref() == Some(word.as_str()))
        {
            return Some(*hit);
        }
    }

    // 4. substring fallbacks
    for value in values {
        let lower = value.to_lowercase();
        if let Some((_, hit)) = SUBSTRING_FALLBACKS
            .iter()
            .find(|(needle, _)| lower.contains(needle))
        {
            return Some(*hit);
        }
    }

    None
}

fn normalize(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .replace("project and programme", "programme and project")
}

fn strip_parenthetical(text: &str) -> &str {
    match text.find(" (") {
        Some(idx) => &text[..idx],
        None => text,
    }
}

fn first_word(text: &str) -> Option<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty())
        .map(str::to_lowercase)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(values: &[&str]) -> Option<String> {
        ProfessionResolver::new().resolve(values)
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(resolve(&["Policy"]), Some("Policy".to_string()));
    }

    #[test]
    fn test_case_insensitive_and_synonym() {
        assert_eq!(resolve(&["human resources"]), Some("Human Resources".to_string()));
        assert_eq!(
            resolve(&["Project and Programme Management"]),
            Some("Programme and Project Management (PPM)".to_string())
        );
        assert_eq!(
            resolve(&["knowledge and information management"]),
            Some("Knowledge and Information Management (KIM)".to_string())
        );
    }

    #[test]
    fn test_first_word() {
        assert_eq!(resolve(&["Finance Business Partner"]), Some("Finance".to_string()));
        assert_eq!(resolve(&["Policy Adviser"]), Some("Policy".to_string()));
    }

    #[test]
    fn test_substring_fallbacks() {
        assert_eq!(
            resolve(&["Scientific Officer"]),
            Some("Science and Engineering".to_string())
        );
        assert_eq!(resolve(&["Statistics Adviser"]), Some("Statisticians".to_string()));
        assert_eq!(resolve(&["Senior Legal Adviser"]), Some("Law".to_string()));
    }

    #[test]
    fn test_blank_and_missing_resolve_to_none() {
        let empty: [&str; 0] = [];
        assert_eq!(resolve(&empty), None);
        assert_eq!(resolve(&["  "]), None);
    }

    #[test]
    fn test_unknown_is_none() {
        assert_eq!(resolve(&["Beekeeping"]), None);
    }

    #[test]
    fn test_earlier_step_wins_across_values() {
        // exact match on the second value beats a fallback on the first
        assert_eq!(
            resolve(&["Chief Scientist", "Economics"]),
            Some("Economics".to_string())
        );
    }

    #[test]
    fn test_cache_does_not_change_answers() {
        let mut resolver = ProfessionResolver::new();
        let first = resolver.resolve(&["Scientific Officer"]);
        let second = resolver.resolve(&["Scientific Officer"]);
        assert_eq!(first, second);
        assert_eq!(resolver.cache.len(), 1);
    }
}
