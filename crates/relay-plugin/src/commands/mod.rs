//! Command processor: content-prefixed commands dispatched to the first
//! handler that claims them.

pub mod handler;
pub mod processor;

pub use handler::{CommandHandler, CommandInvocation, matches_command};
pub use processor::{CommandOutcome, CommandProcessor, CommandSummary};
