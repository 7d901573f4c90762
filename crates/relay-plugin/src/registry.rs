//! Plugin registry — stores active plugin instances and metadata.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

use crate::api::context::PluginContext;
use crate::error::PluginError;
use crate::manager::PluginRegistrar;

/// Static metadata about a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    /// Unique plugin name; tags every registration the plugin makes.
    pub name: String,
    /// Plugin version string.
    pub version: String,
    /// Plugin description.
    pub description: String,
    /// Author or maintainer.
    pub author: String,
    /// Plugins that must be active before this one activates.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl PluginDescriptor {
    /// Creates a descriptor with no dependencies.
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            description: String::new(),
            author: String::new(),
            dependencies: Vec::new(),
        }
    }

    /// Sets the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the author.
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = author.into();
        self
    }

    /// Adds a dependency.
    pub fn depends_on(mut self, plugin: impl Into<String>) -> Self {
        self.dependencies.push(plugin.into());
        self
    }
}

/// Runtime state of an active plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginState {
    /// Registrations are live.
    Active,
    /// Registrations are skipped after repeated faults.
    Suspended,
}

/// Status report for one plugin.
#[derive(Debug, Clone, Serialize)]
pub struct PluginInfo {
    /// Descriptor as declared by the plugin.
    #[serde(flatten)]
    pub descriptor: PluginDescriptor,
    /// Current state.
    pub state: PluginState,
    /// Registered hook handlers.
    pub hooks: usize,
    /// Registered command handlers.
    pub commands: usize,
    /// Faults since the last reset.
    pub faults: u32,
    /// Activation time.
    pub loaded_at: DateTime<Utc>,
}

/// Trait that all plugins must implement.
#[async_trait::async_trait]
pub trait Plugin: Send + Sync + std::fmt::Debug {
    /// Returns plugin metadata.
    fn descriptor(&self) -> PluginDescriptor;

    /// Registers hooks and commands. Anything registered before an error is
    /// returned is rolled back.
    async fn activate(
        &self,
        ctx: &PluginContext,
        registrar: &mut PluginRegistrar<'_>,
    ) -> Result<(), PluginError>;

    /// Called after the plugin's registrations have been removed.
    async fn shutdown(&self) -> Result<(), PluginError> {
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct LoadedPlugin {
    pub(crate) plugin: Arc<dyn Plugin>,
    pub(crate) descriptor: PluginDescriptor,
    pub(crate) loaded_at: DateTime<Utc>,
}

/// Active plugins in activation order.
#[derive(Debug, Default)]
pub struct PluginRegistry {
    plugins: RwLock<Vec<LoadedPlugin>>,
}

impl PluginRegistry {
    /// Creates a new empty plugin registry.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) async fn insert(&self, plugin: Arc<dyn Plugin>, descriptor: PluginDescriptor) {
        self.plugins.write().await.push(LoadedPlugin {
            plugin,
            descriptor,
            loaded_at: Utc::now(),
        });
    }

    pub(crate) async fn remove(&self, name: &str) -> Option<LoadedPlugin> {
        let mut plugins = self.plugins.write().await;
        let idx = plugins.iter().position(|p| p.descriptor.name == name)?;
        Some(plugins.remove(idx))
    }

    pub(crate) async fn snapshot(&self) -> Vec<LoadedPlugin> {
        self.plugins.read().await.clone()
    }

    /// Returns `true` if a plugin with this name is active.
    pub async fn contains(&self, name: &str) -> bool {
        self.plugins
            .read()
            .await
            .iter()
            .any(|p| p.descriptor.name == name)
    }

    /// Names of active plugins in activation order.
    pub async fn names(&self) -> Vec<String> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|p| p.descriptor.name.clone())
            .collect()
    }

    /// Active plugins that declare `name` as a dependency.
    pub async fn dependents_of(&self, name: &str) -> Vec<String> {
        self.plugins
            .read()
            .await
            .iter()
            .filter(|p| p.descriptor.dependencies.iter().any(|d| d == name))
            .map(|p| p.descriptor.name.clone())
            .collect()
    }
}

/// Orders descriptors so every plugin follows its dependencies.
///
/// The result is stable: among plugins that are ready at the same time,
/// input order is kept. Dependencies outside the batch are assumed to be
/// satisfied by `already_active`; if they are not, loading reports the
/// missing dependency.
pub fn activation_order(
    descriptors: &[PluginDescriptor],
    already_active: &HashSet<String>,
) -> Result<Vec<usize>, PluginError> {
    let in_batch: HashSet<&str> = descriptors.iter().map(|d| d.name.as_str()).collect();
    let mut placed: HashSet<&str> = HashSet::new();
    let mut order = Vec::with_capacity(descriptors.len());

    while order.len() < descriptors.len() {
        let ready = descriptors.iter().enumerate().find(|(idx, d)| {
            !order.contains(idx)
                && d.dependencies.iter().all(|dep| {
                    placed.contains(dep.as_str())
                        || already_active.contains(dep)
                        || !in_batch.contains(dep.as_str())
                })
        });

        match ready {
            Some((idx, d)) => {
                placed.insert(d.name.as_str());
                order.push(idx);
            }
            None => {
                let stuck = descriptors
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| !order.contains(idx))
                    .map(|(_, d)| d.name.clone())
                    .collect();
                return Err(PluginError::DependencyCycle(stuck));
            }
        }
    }

    Ok(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependencies_come_first() {
        let descriptors = vec![
            PluginDescriptor::new("audit", "1.0").depends_on("core"),
            PluginDescriptor::new("core", "1.0"),
            PluginDescriptor::new("extra", "1.0"),
        ];
        let order = activation_order(&descriptors, &HashSet::new()).unwrap();
        assert_eq!(order, vec![1, 0, 2]);
    }

    #[test]
    fn test_cycle_detected() {
        let descriptors = vec![
            PluginDescriptor::new("a", "1").depends_on("b"),
            PluginDescriptor::new("b", "1").depends_on("a"),
            PluginDescriptor::new("c", "1"),
        ];
        let err = activation_order(&descriptors, &HashSet::new()).unwrap_err();
        assert_eq!(
            err,
            PluginError::DependencyCycle(vec!["a".to_string(), "b".to_string()])
        );
    }

    #[test]
    fn test_external_dependency_left_to_loader() {
        let descriptors = vec![PluginDescriptor::new("a", "1").depends_on("elsewhere")];
        assert_eq!(activation_order(&descriptors, &HashSet::new()).unwrap(), vec![0]);
    }
}
