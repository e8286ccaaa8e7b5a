//! The tracking listener: seeds fields on insertion and recomputes them on
//! flush from `create`, `update` and `change` rules.

mod change_rules;
mod write;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{Level, event, info_span};

use crate::adapter::{EventAdapter, ObjectManager};
use crate::config::{BehaviorConfig, ConfigurationCache, ConfigurationProvider, validation};
use crate::core::{ObjectRef, Result};
use crate::events::{LifecycleEvent, LifecycleSubscriber};
use crate::mapping::ClassMetadata;
use crate::resolver::FieldValueResolver;

const SUBSCRIBED_EVENTS: &[LifecycleEvent] = &[
    LifecycleEvent::LoadClassMetadata,
    LifecycleEvent::PrePersist,
    LifecycleEvent::OnFlush,
];

/// Lifecycle listener maintaining tracked fields for one behavior.
///
/// The behavior (timestamps, blame, IP, ...) is the injected
/// [`FieldValueResolver`]; its name selects the configuration section.
pub struct TrackingListener {
    resolver: Arc<dyn FieldValueResolver>,
    provider: Arc<dyn ConfigurationProvider>,
    cache: Arc<ConfigurationCache>,
}

impl TrackingListener {
    pub fn new(
        resolver: Arc<dyn FieldValueResolver>,
        provider: Arc<dyn ConfigurationProvider>,
    ) -> Self {
        Self::with_cache(resolver, provider, Arc::new(ConfigurationCache::new()))
    }

    /// Shares a configuration cache, e.g. [`ConfigurationCache::global`].
    pub fn with_cache(
        resolver: Arc<dyn FieldValueResolver>,
        provider: Arc<dyn ConfigurationProvider>,
        cache: Arc<ConfigurationCache>,
    ) -> Self {
        Self {
            resolver,
            provider,
            cache,
        }
    }

    pub fn behavior(&self) -> &'static str {
        self.resolver.name()
    }

    pub fn cache(&self) -> &Arc<ConfigurationCache> {
        &self.cache
    }

    /// Loads, validates and caches the configuration of `class`.
    ///
    /// Configuration of mapped ancestors is merged first.
    pub fn configuration(
        &self,
        om: &dyn ObjectManager,
        class: &str,
    ) -> Result<Option<Arc<BehaviorConfig>>> {
        let behavior = self.behavior();
        self.cache.get_or_load(behavior, class, || {
            let meta = om.class_metadata(class)?;
            let mut merged = BehaviorConfig::new();
            for name in meta.parent_classes.iter().map(String::as_str).chain([class]) {
                if let Some(config) = self.provider.load(behavior, name)? {
                    merged.merge(&config);
                }
            }

            if merged.is_empty() {
                return Ok(None);
            }

            validation::validate(&merged, &meta, self.resolver.as_ref())?;
            event!(
                Level::DEBUG,
                behavior,
                class,
                create = merged.create().len(),
                update = merged.update().len(),
                change = merged.change().len(),
                "behavior configuration loaded"
            );
            Ok(Some(merged))
        })
    }

    /// Class metadata was loaded: prime the configuration cache.
    pub fn on_metadata_load(&self, om: &dyn ObjectManager, meta: &ClassMetadata) -> Result<()> {
        self.configuration(om, &meta.name)?;
        Ok(())
    }

    /// An object is about to be inserted: populate configured fields still null.
    ///
    /// `update` fields are handled before `create` fields.
    pub fn on_insert(&self, ea: &dyn EventAdapter) -> Result<()> {
        let Some(object) = ea.object() else {
            return Ok(());
        };
        let om = ea.object_manager();
        let class = object.class_name()?;
        let Some(config) = self.configuration(om, &class)? else {
            return Ok(());
        };
        let meta = om.class_metadata(&class)?;

        for field in config.update().iter().chain(config.create()) {
            if object.get(field)?.is_null() {
                self.update_field(&object, ea, &meta, field)?;
                event!(Level::DEBUG, behavior = self.behavior(), class = %class, field = %field, "field seeded on insert");
            }
        }
        Ok(())
    }

    /// The unit of work is flushing: recompute tracked fields of every
    /// scheduled insertion and update.
    pub fn on_flush(&self, ea: &dyn EventAdapter) -> Result<()> {
        let span = info_span!("tracking_flush", behavior = self.behavior());
        let _guard = span.enter();

        let insertions = ea.scheduled_object_insertions()?;
        let updates = ea.scheduled_object_updates()?;

        let mut seen = HashSet::new();
        let scheduled = insertions
            .iter()
            .map(|object| (object, true))
            .chain(updates.iter().map(|object| (object, false)))
            .filter(|(object, _)| seen.insert(object.id()));

        for (object, inserting) in scheduled {
            self.process_scheduled(ea, object, inserting)?;
        }
        Ok(())
    }

    fn process_scheduled(
        &self,
        ea: &dyn EventAdapter,
        object: &ObjectRef,
        inserting: bool,
    ) -> Result<()> {
        let om = ea.object_manager();
        let class = object.class_name()?;
        let Some(config) = self.configuration(om, &class)? else {
            return Ok(());
        };
        let meta = om.class_metadata(&class)?;
        let change_set = ea.object_change_set(object)?;
        let mut needs_recompute = false;

        if inserting {
            for field in config.create() {
                if !change_set.has_new_value(field) {
                    self.update_field(object, ea, &meta, field)?;
                    needs_recompute = true;
                }
            }
        }

        for field in config.update() {
            let inserted_as_null =
                inserting && change_set.new_value(field).is_some_and(|value| value.is_null());
            if !change_set.contains(field) || inserted_as_null {
                self.update_field(object, ea, &meta, field)?;
                needs_recompute = true;
            }
        }

        if !inserting {
            for rule in config.change() {
                // value was set manually, possibly to null
                if change_set.contains(&rule.field) {
                    continue;
                }
                if change_rules::fires(rule, &meta, &change_set)? {
                    event!(
                        Level::DEBUG,
                        behavior = self.behavior(),
                        class = %class,
                        field = %rule.field,
                        "change rule fired"
                    );
                    self.update_field(object, ea, &meta, &rule.field)?;
                    needs_recompute = true;
                }
            }
        }

        if needs_recompute {
            ea.recompute_single_object_change_set(&meta, object)?;
        }
        Ok(())
    }
}

impl LifecycleSubscriber for TrackingListener {
    fn name(&self) -> &'static str {
        self.behavior()
    }

    fn subscribed_events(&self) -> &'static [LifecycleEvent] {
        SUBSCRIBED_EVENTS
    }

    fn load_class_metadata(&self, om: &dyn ObjectManager, meta: &ClassMetadata) -> Result<()> {
        self.on_metadata_load(om, meta)
    }

    fn pre_persist(&self, ea: &dyn EventAdapter) -> Result<()> {
        self.on_insert(ea)
    }

    fn on_flush(&self, ea: &dyn EventAdapter) -> Result<()> {
        TrackingListener::on_flush(self, ea)
    }
}
