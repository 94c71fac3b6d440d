// homebites/src/lib.rs

//! HomeBites agent: answers natural-language questions about the HomeBites
//! food-delivery platform.
//!
//! A question is either answered from a fixed platform description, or
//! translated into a MongoDB shell query by an oracle, checked by the
//! [`SafetyGate`], and run read-only through a [`DocumentStore`].
//!
//! The control flow is a small async step pipeline:
//!  - Named steps with before/on/after handlers.
//!  - Shared per-run state in [`ContextData`].
//!  - Early stopping via [`PipelineControl::Stop`] and per-step `skip_if`.

pub mod core;
pub mod error;
pub mod pipeline;

pub mod agent;
pub mod executor;
pub mod gate;
pub mod oracle;
pub mod query;
pub mod responder;
pub mod router;
pub mod schema;
pub mod tools;
pub mod translator;

// --- Re-exports for the Public API ---

pub use crate::core::context::Handler;
pub use crate::core::context_data::ContextData;
pub use crate::core::control::{PipelineControl, PipelineResult};
pub use crate::core::step::{SkipCondition, StepDef};
pub use crate::pipeline::definition::Pipeline;

pub use crate::error::{AgentError, PipelineError, OUT_OF_SCOPE_MESSAGE};

pub use crate::agent::{Agent, AgentServices, AnswerCtxData};
pub use crate::executor::{DocumentStore, ExecutionError, Executor, QueryOutput};
pub use crate::gate::{ApprovedQuery, Rejection, RejectionKind, SafetyGate};
pub use crate::oracle::{Oracle, OracleError};
pub use crate::query::{CursorOptions, ParsedQuery, ReadOperation};
pub use crate::responder::DescriptionResponder;
pub use crate::router::{classify, Topic};
pub use crate::schema::SchemaRegistry;
pub use crate::tools::ToolKit;
pub use crate::translator::QueryTranslator;
