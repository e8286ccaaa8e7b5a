use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use lazy_static::lazy_static;

use crate::config::BehaviorConfig;
use crate::core::Result;

lazy_static! {
    static ref GLOBAL_CACHE: Arc<ConfigurationCache> = Arc::new(ConfigurationCache::new());
}

type CacheKey = (String, String);

/// Loaded behavior configurations keyed by (behavior, class).
///
/// An entry is written once and never replaced. Classes without
/// configuration are cached as `None`.
#[derive(Debug, Default)]
pub struct ConfigurationCache {
    entries: RwLock<HashMap<CacheKey, Option<Arc<BehaviorConfig>>>>,
}

impl ConfigurationCache {
    /// Get the process-wide cache instance
    pub fn global() -> &'static Arc<ConfigurationCache> {
        &GLOBAL_CACHE
    }

    pub fn new() -> Self {
        Self::default()
    }

    /// `None` when the class was never loaded, `Some(None)` when it was
    /// loaded and has no configuration.
    pub fn get(&self, behavior: &str, class: &str) -> Result<Option<Option<Arc<BehaviorConfig>>>> {
        let entries = self.entries.read()?;
        Ok(entries
            .get(&(behavior.to_string(), class.to_string()))
            .cloned())
    }

    /// Returns the cached entry, loading it with `load` on first use.
    ///
    /// `load` runs without the cache lock held; if two callers race, the
    /// first stored entry wins.
    pub fn get_or_load<F>(
        &self,
        behavior: &str,
        class: &str,
        load: F,
    ) -> Result<Option<Arc<BehaviorConfig>>>
    where
        F: FnOnce() -> Result<Option<BehaviorConfig>>,
    {
        if let Some(cached) = self.get(behavior, class)? {
            return Ok(cached);
        }

        let loaded = load()?.filter(|config| !config.is_empty()).map(Arc::new);

        let mut entries = self.entries.write()?;
        let entry = entries
            .entry((behavior.to_string(), class.to_string()))
            .or_insert(loaded);
        Ok(entry.clone())
    }

    pub fn contains(&self, behavior: &str, class: &str) -> Result<bool> {
        Ok(self.get(behavior, class)?.is_some())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.entries.read()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
