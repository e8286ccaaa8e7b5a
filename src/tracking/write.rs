use tracing::{Level, event};

use super::TrackingListener;
use crate::adapter::{BackendKind, EventAdapter, ObjectState};
use crate::core::{ChangeTrackingPolicy, ObjectRef, Result, Value};
use crate::mapping::ClassMetadata;

impl TrackingListener {
    /// Resolves and assigns `field`, cascading persistence of a new
    /// association target and notifying `Notify` objects.
    pub(super) fn update_field(
        &self,
        object: &ObjectRef,
        ea: &dyn EventAdapter,
        meta: &ClassMetadata,
        field: &str,
    ) -> Result<()> {
        let old = object.get(field)?;
        let new = self.resolver.resolve(meta, field, ea)?;

        if meta.has_association(field) {
            if let Value::Object(target) = &new {
                cascade_persist(ea, target)?;
            }
        }

        object.set(field, new.clone())?;

        if object.change_tracking_policy()? == ChangeTrackingPolicy::Notify {
            ea.property_changed(object, field, old, new)?;
        }
        Ok(())
    }
}

fn cascade_persist(ea: &dyn EventAdapter, target: &ObjectRef) -> Result<()> {
    let om = ea.object_manager();
    if om.contains(target)? {
        return Ok(());
    }

    let persist = match om.backend() {
        BackendKind::Document => true,
        BackendKind::Relational => om.object_state(target)? != ObjectState::Managed,
    };
    if persist {
        event!(Level::DEBUG, object = %target.id(), "persisting new association target");
        om.persist(target)?;
    }
    Ok(())
}
