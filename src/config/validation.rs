use regex::Regex;
use tracing::{Level, event};

use crate::config::{AcceptedValues, BehaviorConfig, ChangeRule};
use crate::core::{BehaviorError, Result};
use crate::mapping::ClassMetadata;
use crate::resolver::FieldValueResolver;

lazy_static::lazy_static! {
    static ref TRACKED_FIELD_PATTERN: Regex =
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?$").unwrap();
}

/// Checks a loaded configuration against the class mapping and the resolver
/// that will compute its fields.
pub fn validate(
    config: &BehaviorConfig,
    meta: &ClassMetadata,
    resolver: &dyn FieldValueResolver,
) -> Result<()> {
    let targets = config
        .create()
        .iter()
        .chain(config.update())
        .chain(config.change().iter().map(|rule| &rule.field));

    for field in targets {
        validate_target(field, meta, resolver)?;
    }

    for rule in config.change() {
        validate_change_rule(rule, meta, resolver.name())?;
    }

    Ok(())
}

fn validate_target(
    field: &str,
    meta: &ClassMetadata,
    resolver: &dyn FieldValueResolver,
) -> Result<()> {
    let mapping = meta.field(field).ok_or_else(|| {
        BehaviorError::Configuration(format!(
            "Unable to find field - [{}] as mapped property in class - {}",
            field, meta.name
        ))
    })?;

    if !resolver.supports_field(mapping) {
        return Err(BehaviorError::Configuration(format!(
            "Field - [{}] is not a valid {} field in class - {}",
            field,
            resolver.name(),
            meta.name
        )));
    }

    Ok(())
}

fn validate_change_rule(rule: &ChangeRule, meta: &ClassMetadata, behavior: &str) -> Result<()> {
    let entries = rule.tracked.entries();
    if entries.is_empty() {
        return Err(BehaviorError::Configuration(format!(
            "Change rule for field - [{}] in class - {} does not track any field",
            rule.field, meta.name
        )));
    }

    for entry in entries {
        // A mapped field whose name contains the separator is taken as-is.
        if meta.has_field(entry) {
            continue;
        }

        if !TRACKED_FIELD_PATTERN.is_match(entry) {
            return Err(BehaviorError::Configuration(format!(
                "Tracked field - [{}] of [{}] in class - {} must be 'field' or 'association.field'",
                entry, rule.field, meta.name
            )));
        }

        let (tracked, child) = match entry.split_once('.') {
            Some((tracked, child)) => (tracked, Some(child)),
            None => (entry.as_str(), None),
        };

        let mapping = meta.field(tracked).ok_or_else(|| {
            BehaviorError::Configuration(format!(
                "Tracked field - [{}] of [{}] is not mapped in class - {}",
                tracked, rule.field, meta.name
            ))
        })?;

        if child.is_some() && !mapping.is_association() {
            return Err(BehaviorError::Configuration(format!(
                "Tracked field - [{}] must be an association to track [{}] in class - {}",
                tracked, entry, meta.name
            )));
        }
    }

    if !rule.tracked.is_single() && matches!(rule.value, AcceptedValues::OneOf(_)) {
        event!(
            Level::WARN,
            behavior,
            class = %meta.name,
            field = %rule.field,
            "change rule with several tracked fields and explicit values never fires"
        );
    }

    Ok(())
}
