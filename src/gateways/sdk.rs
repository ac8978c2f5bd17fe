//! Boundary to the vendor client libraries behind the SDK-backed adapters.
//!
//! The gateway shapes the vendor payload and interprets the vendor answer; the
//! client behind [`SdkClient`] owns transport, request signing and certificates.

use crate::config::ProviderConfig;
use crate::domain::error::{GatewayError, Result};
use serde_json::Value;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SdkOperation {
    CreateQr,
    Query,
    Refund,
    Close,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SdkRequest {
    pub operation: SdkOperation,
    pub payload: Value,
}

#[async_trait::async_trait]
pub trait SdkClient: Send + Sync {
    /// `Ok(None)` means the vendor answered with no content.
    async fn execute(&self, request: SdkRequest) -> Result<Option<Value>>;
}

/// Builds a vendor client for a validated configuration.
pub trait SdkConnector: Send + Sync {
    fn connect(&self, config: &ProviderConfig) -> Result<Arc<dyn SdkClient>>;
}

/// Used when the embedding application registers no vendor clients.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoSdkConnector;

impl SdkConnector for NoSdkConnector {
    fn connect(&self, config: &ProviderConfig) -> Result<Arc<dyn SdkClient>> {
        Err(GatewayError::Config(format!(
            "no client library registered for {}",
            config.provider()
        )))
    }
}

pub(crate) fn str_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str).filter(|v| !v.is_empty())
}

pub(crate) fn as_raw(value: Option<Value>) -> serde_json::Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        Some(other) => {
            let mut map = serde_json::Map::new();
            map.insert("response".to_string(), other);
            map
        }
        None => serde_json::Map::new(),
    }
}
