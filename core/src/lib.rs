//! Pure stages of the Careline advisory pipeline.
//!
//! Request flow: [`context::ClinicalContext::assemble`] →
//! [`prompt::build_prompt`] → (backend call, owned by the API crate) →
//! [`pipeline::finalize`], or [`pipeline::degrade`] when the call fails.

pub mod advisory;
pub mod clinical;
pub mod coerce;
pub mod context;
pub mod error;
pub mod fallback;
pub mod pipeline;
pub mod prompt;
pub mod risk;
pub mod validate;
