//! skillcheck-core: assessment, recommendation and quiz engines.
//!
//! This crate holds the data model, the text-generation gateway and the
//! engines built on top of it. Concrete model backends live in
//! `skillcheck-providers`.

pub mod batch;
pub mod error;
pub mod gateway;
pub mod grading;
pub mod model;
pub mod prompts;
pub mod quiz;
pub mod recommend;
pub mod retry;
pub mod rubric;
pub mod settings;
pub mod traits;

#[cfg(test)]
mod testing;

pub use error::{AssessError, ProviderError};
pub use gateway::{DegradedReason, Gateway, GenerationOutcome, GenerationPayload};
pub use settings::EngineSettings;
pub use traits::TextGenerator;
