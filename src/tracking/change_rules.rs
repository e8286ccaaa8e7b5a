use crate::config::ChangeRule;
use crate::core::{BehaviorError, ChangeSet, Result, Value};
use crate::mapping::ClassMetadata;

/// Splits `association.child`, unless the whole entry is itself a changed field.
fn split_tracked<'a>(entry: &'a str, change_set: &ChangeSet) -> (&'a str, Option<&'a str>) {
    if change_set.contains(entry) {
        return (entry, None);
    }
    match entry.split_once('.') {
        Some((tracked, child)) => (tracked, Some(child)),
        None => (entry, None),
    }
}

/// Evaluates a `change` rule against an object's change set.
///
/// Stops at the first tracked entry that fires, so a rule fires at most once.
pub(super) fn fires(rule: &ChangeRule, meta: &ClassMetadata, change_set: &ChangeSet) -> Result<bool> {
    let single_field = rule.tracked.is_single();

    for entry in rule.tracked.entries() {
        let (tracked, child) = split_tracked(entry, change_set);
        let Some(change) = change_set.get(tracked) else {
            continue;
        };

        let value = match child {
            Some(child) => match &change.new {
                Value::Object(changing) => changing.get(child)?,
                other => {
                    return Err(BehaviorError::UnexpectedValue(format!(
                        "Field - [{}] is expected to be object in class - {}, got {}",
                        tracked,
                        meta.name,
                        other.type_name()
                    )));
                }
            },
            None => change.new.clone(),
        };

        if rule.value.matches(single_field, &value) {
            return Ok(true);
        }
    }

    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TrackedField;
    use crate::core::ObjectRef;
    use crate::memory::Record;

    fn meta() -> ClassMetadata {
        ClassMetadata::new("Article")
    }

    #[test]
    fn any_value_fires_on_presence() {
        let rule = ChangeRule::new("contentChanged", "title");
        let changed = ChangeSet::new().with("title", "a", Value::Null);

        assert!(fires(&rule, &meta(), &changed).unwrap());
        assert!(!fires(&rule, &meta(), &ChangeSet::new().with("body", "a", "b")).unwrap());
    }

    #[test]
    fn accepted_values_are_matched() {
        let rule = ChangeRule::new("status", "quantity").when([0i64]);

        assert!(fires(&rule, &meta(), &ChangeSet::new().with("quantity", 5i64, 0i64)).unwrap());
        assert!(!fires(&rule, &meta(), &ChangeSet::new().with("quantity", 5i64, 1i64)).unwrap());
    }

    #[test]
    fn list_of_tracked_fields_ignores_accepted_values() {
        let any = ChangeRule::new("touched", TrackedField::many(["title", "body"]));
        let valued = any.clone().when(["x"]);
        let change_set = ChangeSet::new().with("body", "a", "x");

        assert!(fires(&any, &meta(), &change_set).unwrap());
        assert!(!fires(&valued, &meta(), &change_set).unwrap());
    }

    #[test]
    fn dereferences_association_child() {
        let published = ObjectRef::new(Record::new("Type").with("title", "Published"));
        let rule = ChangeRule::new("published", "type.title").when(["Published"]);
        let change_set = ChangeSet::new().with("type", Value::Null, published);

        assert!(fires(&rule, &meta(), &change_set).unwrap());
    }

    #[test]
    fn dotted_field_present_in_change_set_is_not_split() {
        let rule = ChangeRule::new("moved", "address.city").when(["Paris"]);
        let change_set = ChangeSet::new().with("address.city", "Lyon", "Paris");

        assert!(fires(&rule, &meta(), &change_set).unwrap());
    }

    #[test]
    fn non_object_parent_is_unexpected() {
        let rule = ChangeRule::new("published", "type.title");
        let change_set = ChangeSet::new().with("type", Value::Null, "Published");

        assert!(matches!(
            fires(&rule, &meta(), &change_set),
            Err(BehaviorError::UnexpectedValue(_))
        ));
    }
}
