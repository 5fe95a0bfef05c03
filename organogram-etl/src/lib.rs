//! organogram-etl library interface
//!
//! Hierarchy validation and reconciliation for published organograms:
//! normalize raw senior/junior post records, validate the reports-to
//! hierarchy, repair eliminated bosses and job-shares, resolve professions
//! and assemble the canonical output.

pub mod eliminated;
pub mod graph;
pub mod linked_data;
pub mod normalizer;
pub mod output;
pub mod pipeline;
pub mod profession;
pub mod registry;
pub mod retry;
pub mod types;
pub mod validator;

pub use crate::pipeline::Pipeline;
pub use crate::types::{OrganogramBatch, OrganogramOutput, ValidationReport};
pub use crate::validator::StrictnessTier;
