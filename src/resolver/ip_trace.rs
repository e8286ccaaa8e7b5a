use std::net::IpAddr;
use std::sync::RwLock;

use super::FieldValueResolver;
use crate::adapter::EventAdapter;
use crate::core::{BehaviorError, FieldType, Result, Value};
use crate::mapping::{ClassMetadata, FieldMapping};

/// Writes the client IP address into text fields.
#[derive(Debug, Default)]
pub struct IpTraceResolver {
    ip: RwLock<Option<IpAddr>>,
}

impl IpTraceResolver {
    pub const NAME: &'static str = "ip_traceable";

    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_ip(&self, ip: &str) -> Result<()> {
        let parsed = ip.trim().parse::<IpAddr>().map_err(|_| {
            BehaviorError::InvalidArgument(format!("ip address is not valid: {}", ip))
        })?;
        *self.ip.write()? = Some(parsed);
        Ok(())
    }

    pub fn clear_ip(&self) -> Result<()> {
        *self.ip.write()? = None;
        Ok(())
    }
}

impl FieldValueResolver for IpTraceResolver {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn supports_field(&self, mapping: &FieldMapping) -> bool {
        mapping.field_type() == Some(FieldType::Text)
    }

    fn resolve(
        &self,
        _meta: &ClassMetadata,
        _field: &str,
        _adapter: &dyn EventAdapter,
    ) -> Result<Value> {
        Ok(match *self.ip.read()? {
            Some(ip) => Value::Text(ip.to_string()),
            None => Value::Null,
        })
    }
}
