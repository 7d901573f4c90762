//! Hook system: lifecycle phases, handler registry, and the dispatch pipeline.

pub mod definitions;
pub mod dispatcher;
pub mod registry;

pub use definitions::{Directive, HookAction, HookContext, HookPayload, HookPhase};
pub use dispatcher::HookPipeline;
pub use registry::{HookHandler, HookRegistry};
