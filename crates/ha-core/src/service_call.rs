//! Service call type for invoking registered services

use crate::Context;
use serde::{Deserialize, Serialize};

/// A call to a registered service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceCall {
    /// The domain the service belongs to (e.g. "kia_uvo")
    pub domain: String,

    /// The service name (e.g. "force_update")
    pub service: String,

    /// Data passed to the service
    pub service_data: serde_json::Value,

    /// Context tracking who initiated this call
    pub context: Context,
}

impl ServiceCall {
    pub fn new(
        domain: impl Into<String>,
        service: impl Into<String>,
        service_data: serde_json::Value,
        context: Context,
    ) -> Self {
        Self {
            domain: domain.into(),
            service: service.into(),
            service_data,
            context,
        }
    }

    /// Get the full service identifier (domain.service)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain, self.service)
    }

    /// Get a typed value from service_data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Whether a service supports returning a response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SupportsResponse {
    /// Service never returns a response
    #[default]
    None,
    /// Service may optionally return a response
    Optional,
    /// Service always returns a response
    Only,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_service_id() {
        let call = ServiceCall::new("kia_uvo", "force_update", json!({}), Context::new());

        assert_eq!(call.service_id(), "kia_uvo.force_update");
        assert!(call.service_data.as_object().unwrap().is_empty());
    }

    #[test]
    fn test_get_service_data() {
        let call = ServiceCall::new(
            "kia_uvo",
            "start_climate",
            json!({"temperature": 21.5}),
            Context::new(),
        );

        assert_eq!(call.get::<f64>("temperature"), Some(21.5));
        assert_eq!(call.get::<String>("missing"), None);
    }
}
