use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, RwLock};

use tracing::{Level, event};

use crate::config::BehaviorConfig;
use crate::core::Result;
use crate::mapping::Entity;

/// Source of behavior configuration for mapped classes.
pub trait ConfigurationProvider: Send + Sync {
    /// Provider name for diagnostics
    fn name(&self) -> &'static str;

    /// Configuration declared directly on `class` for `behavior`.
    ///
    /// Inherited configuration is merged by the caller.
    fn load(&self, behavior: &str, class: &str) -> Result<Option<BehaviorConfig>>;
}

type MappingKey = (String, String);

fn key(behavior: &str, class: &str) -> MappingKey {
    (behavior.to_string(), class.to_string())
}

/// Configuration registered in code.
#[derive(Debug, Default)]
pub struct StaticConfigurationProvider {
    mappings: HashMap<MappingKey, BehaviorConfig>,
}

impl StaticConfigurationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(
        mut self,
        behavior: &str,
        class: &str,
        config: BehaviorConfig,
    ) -> Self {
        self.insert(behavior, class, config);
        self
    }

    pub fn insert(&mut self, behavior: &str, class: &str, config: BehaviorConfig) {
        self.mappings.insert(key(behavior, class), config);
    }
}

impl ConfigurationProvider for StaticConfigurationProvider {
    fn name(&self) -> &'static str {
        "static"
    }

    fn load(&self, behavior: &str, class: &str) -> Result<Option<BehaviorConfig>> {
        Ok(self.mappings.get(&key(behavior, class)).cloned())
    }
}

/// Configuration read from a JSON mapping document:
///
/// ```json
/// {
///   "Article": {
///     "timestampable": {
///       "create": ["created"],
///       "update": ["updated"],
///       "change": [{ "field": "published", "trackedField": "status", "value": "Published" }]
///     }
///   }
/// }
/// ```
#[derive(Debug, Default)]
pub struct JsonConfigurationProvider {
    classes: HashMap<String, HashMap<String, BehaviorConfig>>,
}

impl JsonConfigurationProvider {
    pub fn from_json(document: &str) -> Result<Self> {
        let classes = serde_json::from_str(document)?;
        Ok(Self { classes })
    }

    pub fn from_value(document: serde_json::Value) -> Result<Self> {
        let classes = serde_json::from_value(document)?;
        Ok(Self { classes })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let document = std::fs::read_to_string(path)?;
        let provider = Self::from_json(&document)?;
        event!(
            Level::DEBUG,
            path = %path.display(),
            classes = provider.classes.len(),
            "mapping document loaded"
        );
        Ok(provider)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.classes.keys().map(String::as_str)
    }
}

impl ConfigurationProvider for JsonConfigurationProvider {
    fn name(&self) -> &'static str {
        "json"
    }

    fn load(&self, behavior: &str, class: &str) -> Result<Option<BehaviorConfig>> {
        Ok(self
            .classes
            .get(class)
            .and_then(|behaviors| behaviors.get(behavior))
            .cloned())
    }
}

/// Configuration declared on `Entity` types through `#[tracked(...)]` attributes.
#[derive(Debug, Default)]
pub struct EntityConfigurationProvider {
    mappings: RwLock<HashMap<MappingKey, BehaviorConfig>>,
}

impl EntityConfigurationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity<T: Entity>(self) -> Result<Self> {
        self.register::<T>()?;
        Ok(self)
    }

    pub fn register<T: Entity>(&self) -> Result<()> {
        let mut mappings = self.mappings.write()?;
        for (behavior, config) in T::behavior_mappings() {
            mappings.insert(key(behavior, T::entity_class()), config);
        }
        Ok(())
    }
}

impl ConfigurationProvider for EntityConfigurationProvider {
    fn name(&self) -> &'static str {
        "entity"
    }

    fn load(&self, behavior: &str, class: &str) -> Result<Option<BehaviorConfig>> {
        let mappings = self.mappings.read()?;
        Ok(mappings.get(&key(behavior, class)).cloned())
    }
}

/// Asks each provider in order; the first one with a configuration wins.
#[derive(Default)]
pub struct ChainConfigurationProvider {
    providers: Vec<Arc<dyn ConfigurationProvider>>,
}

impl ChainConfigurationProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Arc<dyn ConfigurationProvider>) -> Self {
        self.providers.push(provider);
        self
    }
}

impl ConfigurationProvider for ChainConfigurationProvider {
    fn name(&self) -> &'static str {
        "chain"
    }

    fn load(&self, behavior: &str, class: &str) -> Result<Option<BehaviorConfig>> {
        for provider in &self.providers {
            if let Some(config) = provider.load(behavior, class)? {
                event!(
                    Level::TRACE,
                    provider = provider.name(),
                    behavior,
                    class,
                    "configuration found"
                );
                return Ok(Some(config));
            }
        }
        Ok(None)
    }
}
