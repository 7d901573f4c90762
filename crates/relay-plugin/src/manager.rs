//! Plugin manager — activation, dependency ordering, and teardown.

use std::collections::HashSet;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::api::context::PluginContext;
use crate::commands::{CommandHandler, CommandProcessor};
use crate::error::PluginError;
use crate::faults::PluginFault;
use crate::hooks::definitions::HookPhase;
use crate::hooks::dispatcher::HookPipeline;
use crate::hooks::registry::HookHandler;
use crate::registry::{Plugin, PluginInfo, PluginRegistry, PluginState, activation_order};

/// Registration handle given to a plugin during activation.
///
/// Everything registered through it is tagged with the plugin's name, so
/// a plugin cannot register on behalf of another.
pub struct PluginRegistrar<'a> {
    plugin: String,
    hooks: &'a HookPipeline,
    commands: &'a CommandProcessor,
    hook_count: usize,
    command_count: usize,
}

impl<'a> PluginRegistrar<'a> {
    fn new(plugin: &str, hooks: &'a HookPipeline, commands: &'a CommandProcessor) -> Self {
        Self {
            plugin: plugin.to_string(),
            hooks,
            commands,
            hook_count: 0,
            command_count: 0,
        }
    }

    /// Name of the plugin being activated.
    pub fn plugin_name(&self) -> &str {
        &self.plugin
    }

    /// Appends a hook handler to a phase.
    pub async fn hook(&mut self, phase: HookPhase, handler: Arc<dyn HookHandler>) {
        self.hooks.register_hook(phase, &self.plugin, handler).await;
        self.hook_count += 1;
    }

    /// Appends a command handler.
    pub async fn command(&mut self, handler: Arc<dyn CommandHandler>) {
        self.commands.register_command(&self.plugin, handler).await;
        self.command_count += 1;
    }
}

/// Outcome of loading a batch of plugins.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Plugins activated, in activation order.
    pub loaded: Vec<String>,
    /// Plugins that could not be activated.
    pub failed: Vec<(String, PluginError)>,
}

/// Manages the full lifecycle of plugins.
///
/// Load and unload operations are serialized; hook and command dispatch
/// never waits on them beyond a registry read lock.
#[derive(Debug)]
pub struct PluginManager {
    registry: PluginRegistry,
    hooks: Arc<HookPipeline>,
    commands: Arc<CommandProcessor>,
    context: PluginContext,
    lifecycle: Mutex<()>,
}

impl PluginManager {
    /// Creates a manager that registers into the given pipeline and processor.
    pub fn new(
        hooks: Arc<HookPipeline>,
        commands: Arc<CommandProcessor>,
        context: PluginContext,
    ) -> Self {
        Self {
            registry: PluginRegistry::new(),
            hooks,
            commands,
            context,
            lifecycle: Mutex::new(()),
        }
    }

    /// Activates one plugin. Its dependencies must already be active.
    pub async fn load(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let _guard = self.lifecycle.lock().await;
        self.load_locked(plugin).await
    }

    /// Activates a batch of plugins in dependency order.
    ///
    /// A plugin that fails to activate is reported and skipped; plugins
    /// depending on it then fail with `MissingDependency`. A dependency
    /// cycle inside the batch rejects the whole batch.
    pub async fn load_all(&self, plugins: Vec<Arc<dyn Plugin>>) -> Result<LoadReport, PluginError> {
        let _guard = self.lifecycle.lock().await;

        let descriptors: Vec<_> = plugins.iter().map(|p| p.descriptor()).collect();
        let active: HashSet<String> = self.registry.names().await.into_iter().collect();
        let order = activation_order(&descriptors, &active)?;

        let mut report = LoadReport::default();
        for idx in order {
            let name = descriptors[idx].name.clone();
            match self.load_locked(plugins[idx].clone()).await {
                Ok(()) => report.loaded.push(name),
                Err(e) => {
                    error!(plugin = %name, error = %e, "Plugin failed to load");
                    report.failed.push((name, e));
                }
            }
        }
        Ok(report)
    }

    async fn load_locked(&self, plugin: Arc<dyn Plugin>) -> Result<(), PluginError> {
        let descriptor = plugin.descriptor();
        let name = descriptor.name.clone();

        if self.registry.contains(&name).await {
            return Err(PluginError::AlreadyLoaded(name));
        }
        for dependency in &descriptor.dependencies {
            if !self.registry.contains(dependency).await {
                return Err(PluginError::MissingDependency {
                    plugin: name,
                    dependency: dependency.clone(),
                });
            }
        }

        let mut registrar = PluginRegistrar::new(&name, &self.hooks, &self.commands);
        let activation = AssertUnwindSafe(plugin.activate(&self.context, &mut registrar))
            .catch_unwind()
            .await;
        let (hook_count, command_count) = (registrar.hook_count, registrar.command_count);

        let failure = match activation {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(panic) => Some(PluginFault::from_panic(panic).to_string()),
        };
        if let Some(reason) = failure {
            self.remove_registrations(&name).await;
            return Err(PluginError::ActivationFailed {
                plugin: name,
                reason,
            });
        }

        self.hooks.faults().reset(&name);
        self.registry.insert(plugin, descriptor.clone()).await;

        info!(
            plugin = %name,
            version = %descriptor.version,
            hooks = hook_count,
            commands = command_count,
            "Plugin activated"
        );
        Ok(())
    }

    /// Deactivates a plugin. Refused while other active plugins depend on it.
    pub async fn unload(&self, name: &str) -> Result<(), PluginError> {
        let _guard = self.lifecycle.lock().await;
        self.unload_locked(name).await
    }

    async fn unload_locked(&self, name: &str) -> Result<(), PluginError> {
        if !self.registry.contains(name).await {
            return Err(PluginError::NotFound(name.to_string()));
        }

        let dependents = self.registry.dependents_of(name).await;
        if !dependents.is_empty() {
            return Err(PluginError::HasDependents {
                plugin: name.to_string(),
                dependents,
            });
        }

        self.remove_registrations(name).await;
        let Some(loaded) = self.registry.remove(name).await else {
            return Err(PluginError::NotFound(name.to_string()));
        };

        match AssertUnwindSafe(loaded.plugin.shutdown()).catch_unwind().await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!(plugin = %name, error = %e, "Plugin shutdown returned error"),
            Err(panic) => warn!(
                plugin = %name,
                fault = %PluginFault::from_panic(panic),
                "Plugin shutdown panicked"
            ),
        }

        self.hooks.faults().reset(name);
        info!(plugin = %name, "Plugin unloaded");
        Ok(())
    }

    /// Unloads every plugin in reverse activation order.
    pub async fn shutdown_all(&self) {
        let _guard = self.lifecycle.lock().await;
        let names = self.registry.names().await;

        for name in names.iter().rev() {
            if let Err(e) = self.unload_locked(name).await {
                error!(plugin = %name, error = %e, "Error unloading plugin");
            }
        }

        info!(count = names.len(), "All plugins unloaded");
    }

    /// Lifts a fault suspension.
    pub async fn resume(&self, name: &str) -> Result<(), PluginError> {
        if !self.registry.contains(name).await {
            return Err(PluginError::NotFound(name.to_string()));
        }
        self.hooks.faults().reset(name);
        Ok(())
    }

    /// Status of every active plugin, in activation order.
    pub async fn list(&self) -> Vec<PluginInfo> {
        let faults = self.hooks.faults();
        let mut infos = Vec::new();

        for loaded in self.registry.snapshot().await {
            let name = loaded.descriptor.name.clone();
            infos.push(PluginInfo {
                state: if faults.is_suspended(&name) {
                    PluginState::Suspended
                } else {
                    PluginState::Active
                },
                hooks: self.hooks.registry().plugin_handler_count(&name).await,
                commands: self.commands.plugin_command_count(&name).await,
                faults: faults.fault_count(&name),
                loaded_at: loaded.loaded_at,
                descriptor: loaded.descriptor,
            });
        }
        infos
    }

    /// The plugin registry.
    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    async fn remove_registrations(&self, name: &str) {
        self.hooks.registry().unregister_plugin(name).await;
        self.commands.unregister_plugin(name).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;
    use std::time::Duration;

    use async_trait::async_trait;

    use relay_core::types::{SessionInfo, UserId};

    use super::*;
    use crate::api::context::SessionControl;
    use crate::commands::{CommandInvocation, matches_command};
    use crate::error::CommandError;
    use crate::faults::FaultTracker;
    use crate::hooks::definitions::HookAction;
    use crate::hooks::registry::HookRegistry;
    use crate::registry::PluginDescriptor;
    use crate::traits::FnHook;

    struct NoSessions;

    #[async_trait]
    impl SessionControl for NoSessions {
        async fn force_disconnect(&self, _user_id: &UserId, _reason: &str) -> usize {
            0
        }

        async fn list_online(&self) -> Vec<SessionInfo> {
            Vec::new()
        }

        async fn notify(&self, _user_id: &UserId, _content: &str) -> usize {
            0
        }
    }

    #[derive(Debug)]
    struct Ping;

    #[async_trait]
    impl CommandHandler for Ping {
        fn name(&self) -> &str {
            "/ping"
        }

        fn claims(&self, content: &str) -> bool {
            matches_command(content, &["/ping"])
        }

        async fn execute(&self, _inv: &CommandInvocation) -> Result<Option<String>, CommandError> {
            Ok(Some("pong".to_string()))
        }
    }

    #[derive(Debug)]
    struct TestPlugin {
        descriptor: PluginDescriptor,
        fail_activation: bool,
        shutdowns: Arc<StdMutex<Vec<String>>>,
    }

    impl TestPlugin {
        fn new(name: &str, deps: &[&str], shutdowns: Arc<StdMutex<Vec<String>>>) -> Arc<Self> {
            let mut descriptor = PluginDescriptor::new(name, "1.0.0");
            for dep in deps {
                descriptor = descriptor.depends_on(*dep);
            }
            Arc::new(Self {
                descriptor,
                fail_activation: false,
                shutdowns,
            })
        }
    }

    #[async_trait]
    impl Plugin for TestPlugin {
        fn descriptor(&self) -> PluginDescriptor {
            self.descriptor.clone()
        }

        async fn activate(
            &self,
            _ctx: &PluginContext,
            registrar: &mut PluginRegistrar<'_>,
        ) -> Result<(), PluginError> {
            registrar
                .hook(
                    HookPhase::PreMessage,
                    FnHook::arc("noop", |_ctx| async { Ok(HookAction::Continue) }),
                )
                .await;
            registrar.command(Arc::new(Ping)).await;
            if self.fail_activation {
                return Err(PluginError::ActivationFailed {
                    plugin: self.descriptor.name.clone(),
                    reason: "config missing".to_string(),
                });
            }
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), PluginError> {
            if let Ok(mut log) = self.shutdowns.lock() {
                log.push(self.descriptor.name.clone());
            }
            Ok(())
        }
    }

    fn manager() -> PluginManager {
        let faults = Arc::new(FaultTracker::new(2));
        let hooks = Arc::new(HookPipeline::new(
            Arc::new(HookRegistry::new()),
            faults.clone(),
            Duration::from_secs(1),
        ));
        let commands = Arc::new(CommandProcessor::new("/", faults, Duration::from_secs(1)));
        let context = PluginContext {
            sessions: Arc::new(NoSessions),
            commands: commands.clone(),
        };
        PluginManager::new(hooks, commands, context)
    }

    #[tokio::test]
    async fn test_load_and_unload_cleans_registrations() {
        let manager = manager();
        let log = Arc::new(StdMutex::new(Vec::new()));
        manager.load(TestPlugin::new("alpha", &[], log.clone())).await.unwrap();

        let infos = manager.list().await;
        assert_eq!(infos.len(), 1);
        assert_eq!(infos[0].hooks, 1);
        assert_eq!(infos[0].commands, 1);
        assert_eq!(infos[0].state, PluginState::Active);

        assert_eq!(
            manager.load(TestPlugin::new("alpha", &[], log.clone())).await,
            Err(PluginError::AlreadyLoaded("alpha".to_string()))
        );

        manager.unload("alpha").await.unwrap();
        assert!(manager.list().await.is_empty());
        assert_eq!(manager.hooks.registry().handler_count(HookPhase::PreMessage).await, 0);
        assert!(manager.commands.list_commands().await.is_empty());
        assert_eq!(*log.lock().unwrap(), vec!["alpha".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_dependency_rejected() {
        let manager = manager();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let err = manager
            .load(TestPlugin::new("audit", &["core"], log))
            .await
            .unwrap_err();
        assert!(matches!(err, PluginError::MissingDependency { .. }));
    }

    #[tokio::test]
    async fn test_batch_order_and_reverse_shutdown() {
        let manager = manager();
        let log = Arc::new(StdMutex::new(Vec::new()));
        let report = manager
            .load_all(vec![
                TestPlugin::new("audit", &["core"], log.clone()),
                TestPlugin::new("core", &[], log.clone()),
            ])
            .await
            .unwrap();
        assert_eq!(report.loaded, vec!["core".to_string(), "audit".to_string()]);

        assert!(matches!(
            manager.unload("core").await,
            Err(PluginError::HasDependents { .. })
        ));

        manager.shutdown_all().await;
        assert_eq!(
            *log.lock().unwrap(),
            vec!["audit".to_string(), "core".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_activation_rolls_back() {
        let manager = manager();
        let plugin = Arc::new(TestPlugin {
            descriptor: PluginDescriptor::new("flaky", "0.1.0"),
            fail_activation: true,
            shutdowns: Arc::new(StdMutex::new(Vec::new())),
        });

        let err = manager.load(plugin).await.unwrap_err();
        assert!(matches!(err, PluginError::ActivationFailed { .. }));
        assert_eq!(manager.hooks.registry().handler_count(HookPhase::PreMessage).await, 0);
        assert!(manager.commands.list_commands().await.is_empty());
        assert!(!manager.registry().contains("flaky").await);
    }

    #[tokio::test]
    async fn test_suspended_state_and_resume() {
        let manager = manager();
        let log = Arc::new(StdMutex::new(Vec::new()));
        manager.load(TestPlugin::new("alpha", &[], log)).await.unwrap();

        let faults = manager.hooks.faults().clone();
        faults.record("alpha", &PluginFault::Timeout);
        faults.record("alpha", &PluginFault::Timeout);
        assert_eq!(manager.list().await[0].state, PluginState::Suspended);

        manager.resume("alpha").await.unwrap();
        assert_eq!(manager.list().await[0].state, PluginState::Active);
    }
}
