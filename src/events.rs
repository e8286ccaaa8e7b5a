//! Lifecycle event dispatch between an object manager and its listeners.

use std::sync::{Arc, RwLock};

use tracing::{Level, event};

use crate::adapter::{EventAdapter, ObjectManager};
use crate::core::Result;
use crate::mapping::ClassMetadata;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    LoadClassMetadata,
    PrePersist,
    OnFlush,
}

/// Listener for object manager lifecycle events.
pub trait LifecycleSubscriber: Send + Sync {
    fn name(&self) -> &'static str;

    fn subscribed_events(&self) -> &'static [LifecycleEvent];

    fn load_class_metadata(&self, _om: &dyn ObjectManager, _meta: &ClassMetadata) -> Result<()> {
        Ok(())
    }

    fn pre_persist(&self, _ea: &dyn EventAdapter) -> Result<()> {
        Ok(())
    }

    fn on_flush(&self, _ea: &dyn EventAdapter) -> Result<()> {
        Ok(())
    }
}

/// Registry of subscribers, dispatched in registration order.
///
/// The first failing subscriber aborts the dispatch.
#[derive(Default)]
pub struct EventManager {
    subscribers: RwLock<Vec<Arc<dyn LifecycleSubscriber>>>,
}

impl EventManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_subscriber(&self, subscriber: Arc<dyn LifecycleSubscriber>) -> Result<()> {
        event!(
            Level::DEBUG,
            subscriber = subscriber.name(),
            "registered lifecycle subscriber"
        );
        self.subscribers.write()?.push(subscriber);
        Ok(())
    }

    /// Snapshot of the subscribers of one event; the registry lock is not
    /// held while subscribers run.
    fn subscribers_for(
        &self,
        lifecycle_event: LifecycleEvent,
    ) -> Result<Vec<Arc<dyn LifecycleSubscriber>>> {
        let subscribers = self.subscribers.read()?;
        Ok(subscribers
            .iter()
            .filter(|subscriber| subscriber.subscribed_events().contains(&lifecycle_event))
            .cloned()
            .collect())
    }

    pub fn dispatch_load_class_metadata(
        &self,
        om: &dyn ObjectManager,
        meta: &ClassMetadata,
    ) -> Result<()> {
        for subscriber in self.subscribers_for(LifecycleEvent::LoadClassMetadata)? {
            subscriber.load_class_metadata(om, meta)?;
        }
        Ok(())
    }

    pub fn dispatch_pre_persist(&self, ea: &dyn EventAdapter) -> Result<()> {
        for subscriber in self.subscribers_for(LifecycleEvent::PrePersist)? {
            subscriber.pre_persist(ea)?;
        }
        Ok(())
    }

    pub fn dispatch_on_flush(&self, ea: &dyn EventAdapter) -> Result<()> {
        for subscriber in self.subscribers_for(LifecycleEvent::OnFlush)? {
            subscriber.on_flush(ea)?;
        }
        Ok(())
    }
}
