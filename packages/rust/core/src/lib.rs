//! Curation pipeline for the paper curator.
//!
//! Raw search output flows through extraction (decode, score defaults, trust
//! normalization), is merged into the persisted collection by the
//! [`PaperRepository`], and is read back as a date-grouped timeline. Runs are
//! coordinated per topic by the [`PipelineRegistry`].

pub mod extraction;
pub mod merge;
pub mod pipeline;
pub mod prompts;
pub mod repository;
pub mod scheduler;
pub mod timeline;

#[cfg(test)]
pub(crate) mod testing;

pub use extraction::{Candidate, DecodeError, curate, decode_candidates};
pub use merge::{MergeStats, merge, merge_stats};
pub use pipeline::{PipelineRegistry, RunOutcome};
pub use repository::PaperRepository;
pub use scheduler::run_periodic;
pub use timeline::{project, project_all};
