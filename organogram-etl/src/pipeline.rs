//! Organogram pipeline
//!
//! Runs one organisation-period through the whole flow:
//! normalize → root convention → graph → validate → (linked data only)
//! eliminated-post repair and re-validation → professions → output.
//!
//! Every cache and memo lives inside a single `run` call.

use crate::eliminated::{EliminatedPostResolver, PostDetailSource};
use crate::graph::HierarchyGraph;
use crate::normalizer::{NormalizeContext, PostNormalizer};
use crate::output::{apply_root_convention, OutputAssembler};
use crate::profession::ProfessionResolver;
use crate::registry::DepartmentRegistry;
use crate::types::{
    OrganogramBatch, OrganogramOutput, ResolutionWarning, ValidationMessage, ValidationReport,
    WarningKind,
};
use crate::validator::{StrictnessTier, StructuralValidator};
use organogram_common::config::TomlConfig;
use organogram_common::{DataSource, Error, JuniorPost, Post, Result};
use std::collections::BTreeSet;
use tracing::{error, info, warn};

/// Structural check result with the no-root condition folded in
struct StructureCheck {
    errors: Vec<ValidationMessage>,
    unknown_refs: BTreeSet<String>,
    fatal: Option<String>,
}

pub struct Pipeline<'a> {
    config: &'a TomlConfig,
    registry: Option<&'a dyn DepartmentRegistry>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a TomlConfig) -> Self {
        Self {
            config,
            registry: None,
        }
    }

    pub fn with_registry(mut self, registry: &'a dyn DepartmentRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Process one batch.
    ///
    /// `Err` only for ingestion errors and fetches that failed after all
    /// retries; structural problems, including a missing root, are reported
    /// in the output's validation report.
    pub async fn run(
        &self,
        batch: &OrganogramBatch,
        detail_source: Option<&dyn PostDetailSource>,
    ) -> Result<OrganogramOutput> {
        let tier = StrictnessTier::for_period(batch.period, &self.config.validation);
        info!(
            organisation = %batch.organisation,
            period = %batch.period,
            source = ?batch.source,
            records = batch.records.len(),
            %tier,
            "Processing organogram"
        );

        // Normalize
        let normalizer = PostNormalizer::new(NormalizeContext {
            organisation: batch.organisation.clone(),
            parent_department: batch.parent_department.clone(),
            source: batch.source,
        });
        let mut ingestion_errors = Vec::new();
        let mut warnings: Vec<ResolutionWarning> = Vec::new();
        let normalized = normalizer.normalize_all(&batch.records, &mut ingestion_errors, &mut warnings);
        if !ingestion_errors.is_empty() {
            let ingestion_errors = dedup(ingestion_errors);
            error!(
                organisation = %batch.organisation,
                count = ingestion_errors.len(),
                "Ingestion failed"
            );
            return Err(Error::Ingestion(ingestion_errors));
        }
        let mut senior = normalized.senior;
        let mut junior = normalized.junior;

        apply_root_convention(&mut senior, &self.config.validation.self_reporting_orgs);

        // Validate, repairing eliminated bosses for linked data
        let mut check = self.check_structure(&senior, &junior)?;
        let mut repair_errors = Vec::new();
        if check.fatal.is_none() && !check.unknown_refs.is_empty() && batch.source == DataSource::LinkedData {
            match detail_source {
                Some(source) => {
                    let resolver =
                        EliminatedPostResolver::from_config(&self.config.validation, &self.config.linked_data);
                    let summary = resolver
                        .resolve(&mut senior, source, &mut repair_errors, &mut warnings)
                        .await?;
                    info!(
                        spliced = summary.spliced.len(),
                        unresolved = summary.unresolved.len(),
                        rounds = summary.rounds,
                        "Eliminated-post repair complete"
                    );
                    if !summary.spliced.is_empty() {
                        check = self.check_structure(&senior, &junior)?;
                    }
                }
                None => warn!(
                    unknown = check.unknown_refs.len(),
                    "Unknown bosses found but no post detail source is available"
                ),
            }
        }

        let mut errors = check.errors;
        errors.extend(repair_errors);
        let errors = dedup(errors);

        if let Some(fatal) = &check.fatal {
            if !tier.emits_posts_without_root() {
                senior.clear();
                junior.clear();
            }
            error!(organisation = %batch.organisation, %tier, "{}", fatal);
        }

        // Professions
        let mut professions = ProfessionResolver::new();
        let mut unresolved: BTreeSet<String> = BTreeSet::new();
        for post in senior.iter_mut() {
            resolve_profession(
                &mut professions,
                &mut post.profession,
                Some(post.post_ref.as_str()),
                &mut unresolved,
                &mut warnings,
            );
        }
        for post in junior.iter_mut() {
            resolve_profession(&mut professions, &mut post.profession, None, &mut unresolved, &mut warnings);
        }

        let will_display = check.fatal.is_none() && !errors.iter().any(|e| tier.blocks_display(e.category));
        let report = ValidationReport {
            tier,
            errors,
            warnings: dedup(warnings),
            fatal: check.fatal,
            will_display,
        };

        Ok(OutputAssembler::new(self.registry).assemble(
            &batch.organisation,
            batch.period,
            batch.source,
            senior,
            junior,
            report,
        ))
    }

    fn check_structure(&self, senior: &[Post], junior: &[JuniorPost]) -> Result<StructureCheck> {
        let mut errors = Vec::new();
        let graph = HierarchyGraph::build(senior, &mut errors);
        match StructuralValidator::from_config(&self.config.validation).validate(&graph, junior) {
            Ok(outcome) => {
                errors.extend(outcome.errors);
                Ok(StructureCheck {
                    errors,
                    unknown_refs: outcome.unknown_refs,
                    fatal: None,
                })
            }
            Err(Error::NoRoot(message)) => Ok(StructureCheck {
                errors,
                unknown_refs: BTreeSet::new(),
                fatal: Some(message),
            }),
            Err(other) => Err(other),
        }
    }
}

/// Replace free text with the canonical profession when one matches.
/// Unmatched text is kept and warned about once per distinct value.
fn resolve_profession(
    resolver: &mut ProfessionResolver,
    profession: &mut String,
    post_ref: Option<&str>,
    unresolved: &mut BTreeSet<String>,
    warnings: &mut Vec<ResolutionWarning>,
) {
    if profession.trim().is_empty() {
        return;
    }
    match resolver.resolve(&[profession.as_str()]) {
        Some(canonical) => *profession = canonical,
        None => {
            if unresolved.insert(profession.clone()) {
                warn!(post_ref = ?post_ref, profession = %profession, "Unknown profession");
                warnings.push(ResolutionWarning::new(
                    post_ref,
                    WarningKind::Profession,
                    format!("Profession \"{}\" is not in the list of professions", profession),
                ));
            }
        }
    }
}

/// Drop repeated identical messages, keeping first occurrences
fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut kept: Vec<T> = Vec::with_capacity(items.len());
    for item in items {
        if !kept.contains(&item) {
            kept.push(item);
        }
    }
    kept
}
