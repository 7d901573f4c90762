//! Hook pipeline — runs a phase's handlers as a sequential chain.
//!
//! - Handlers run in registration order; each sees the context produced
//!   by the one before it.
//! - `Replace` substitutes the payload and continues.
//! - `ShortCircuit` stops the chain; the caller proceeds with the payload.
//! - `Veto` stops the chain and marks the context vetoed, in phases that
//!   accept vetoes. Elsewhere it is logged and ignored.
//! - An error, panic, timeout, or illegal substitution is a fault: it is
//!   recorded against the plugin and the chain continues with the last
//!   good context. Suspended plugins are skipped.
//!
//! Handlers are snapshotted before the chain starts, so no registry lock
//! is held while plugin code runs.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::faults::{FaultTracker, PluginFault};

use super::definitions::{Directive, HookAction, HookContext, HookPayload, HookPhase};
use super::registry::{HookEntry, HookHandler, HookRegistry};

/// Dispatches lifecycle events through registered hook handlers.
#[derive(Debug)]
pub struct HookPipeline {
    registry: Arc<HookRegistry>,
    faults: Arc<FaultTracker>,
    timeout: Duration,
}

impl HookPipeline {
    /// Creates a pipeline over a registry with a per-handler time limit.
    pub fn new(registry: Arc<HookRegistry>, faults: Arc<FaultTracker>, timeout: Duration) -> Self {
        Self {
            registry,
            faults,
            timeout,
        }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<HookRegistry> {
        &self.registry
    }

    /// The shared fault tracker.
    pub fn faults(&self) -> &Arc<FaultTracker> {
        &self.faults
    }

    /// Appends a handler to a phase on behalf of `plugin`.
    pub async fn register_hook(&self, phase: HookPhase, plugin: &str, handler: Arc<dyn HookHandler>) {
        self.registry.register(phase, plugin, handler).await;
    }

    /// Runs every active handler of the context's phase and returns the
    /// resulting context.
    pub async fn dispatch(&self, ctx: HookContext) -> HookContext {
        let phase = ctx.phase();
        let entries = self.registry.snapshot(phase).await;
        if entries.is_empty() {
            return ctx;
        }

        debug!(phase = %phase, handler_count = entries.len(), "Dispatching hook");

        let mut ctx = ctx;
        for entry in &entries {
            if self.faults.is_suspended(&entry.plugin) {
                continue;
            }

            let action = match self.invoke(entry, &ctx).await {
                Ok(action) => action,
                Err(fault) => {
                    self.faults.record(&entry.plugin, &fault);
                    continue;
                }
            };

            match action {
                HookAction::Continue => {}
                HookAction::Replace(payload) => match check_substitution(&ctx, &payload) {
                    Ok(()) => ctx = ctx.with_payload(payload),
                    Err(fault) => {
                        self.faults.record(&entry.plugin, &fault);
                    }
                },
                HookAction::ShortCircuit(payload) => {
                    if let Some(payload) = payload {
                        if let Err(fault) = check_substitution(&ctx, &payload) {
                            self.faults.record(&entry.plugin, &fault);
                            continue;
                        }
                        ctx = ctx.with_payload(payload);
                    }
                    debug!(phase = %phase, plugin = %entry.plugin, "Hook chain short-circuited");
                    return ctx.with_directive(Directive::ShortCircuit, Some(&entry.plugin));
                }
                HookAction::Veto { reason } => {
                    if phase.accepts_veto() {
                        info!(
                            phase = %phase,
                            plugin = %entry.plugin,
                            reason = %reason,
                            "Hook vetoed event"
                        );
                        return ctx.with_directive(Directive::Veto { reason }, Some(&entry.plugin));
                    }
                    warn!(
                        phase = %phase,
                        plugin = %entry.plugin,
                        "Veto returned in a phase that cannot be vetoed, ignoring"
                    );
                }
            }
        }

        ctx
    }

    async fn invoke(&self, entry: &HookEntry, ctx: &HookContext) -> Result<HookAction, PluginFault> {
        let call = AssertUnwindSafe(entry.handler.handle(ctx)).catch_unwind();
        match tokio::time::timeout(self.timeout, call).await {
            Err(_) => Err(PluginFault::Timeout),
            Ok(Err(panic)) => Err(PluginFault::from_panic(panic)),
            Ok(Ok(Err(e))) => Err(PluginFault::Error(e.to_string())),
            Ok(Ok(Ok(action))) => Ok(action),
        }
    }
}

/// Only messages may be substituted, and only by a message of the same
/// kind from the same sender.
fn check_substitution(current: &HookContext, replacement: &HookPayload) -> Result<(), PluginFault> {
    match (current.payload(), replacement) {
        (HookPayload::Message(old), HookPayload::Message(new)) => {
            if old.sender() != new.sender() {
                return Err(PluginFault::InvalidSubstitution(format!(
                    "sender changed from '{}' to '{}'",
                    old.sender(),
                    new.sender()
                )));
            }
            if old.kind() != new.kind() {
                return Err(PluginFault::InvalidSubstitution(format!(
                    "type changed from {} to {}",
                    old.kind(),
                    new.kind()
                )));
            }
            Ok(())
        }
        (HookPayload::Message(_), other) => Err(PluginFault::InvalidSubstitution(format!(
            "expected a message, got a {}",
            other.kind()
        ))),
        (current, _) => Err(PluginFault::InvalidSubstitution(format!(
            "{} payloads are read-only",
            current.kind()
        ))),
    }
}
