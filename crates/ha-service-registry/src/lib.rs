//! Service registry with async handlers
//!
//! Integrations register named services under their domain; the host's
//! automation layer invokes them by `domain.service`.

use dashmap::DashMap;
use ha_core::{Context, ServiceCall, SupportsResponse};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Result type for service calls
pub type ServiceResult = Result<Option<serde_json::Value>, ServiceError>;

/// Future type for async service handlers
pub type ServiceFuture = Pin<Box<dyn Future<Output = ServiceResult> + Send>>;

/// Service handler function type
pub type ServiceHandler = Arc<dyn Fn(ServiceCall) -> ServiceFuture + Send + Sync>;

/// Errors that can occur when working with services
#[derive(Debug, Clone, Error)]
pub enum ServiceError {
    #[error("service not found: {domain}.{service}")]
    NotFound { domain: String, service: String },

    #[error("service call failed: {0}")]
    CallFailed(String),

    #[error("invalid service data: {0}")]
    InvalidData(String),

    #[error("service does not support responses")]
    ResponseNotSupported,
}

/// Information about a registered service
#[derive(Debug, Clone)]
pub struct ServiceDescription {
    pub domain: String,
    pub service: String,
    /// Whether this service supports returning a response
    pub supports_response: SupportsResponse,
}

struct RegisteredService {
    handler: ServiceHandler,
    description: ServiceDescription,
}

/// Registry of all services, keyed by `domain.service`
pub struct ServiceRegistry {
    services: DashMap<String, RegisteredService>,
}

fn service_key(domain: &str, service: &str) -> String {
    format!("{}.{}", domain, service)
}

impl ServiceRegistry {
    pub fn new() -> Self {
        Self {
            services: DashMap::new(),
        }
    }

    /// Register a service, replacing any existing handler under the same name
    #[instrument(skip(self, domain, service, handler))]
    pub fn register<F, Fut>(
        &self,
        domain: impl Into<String>,
        service: impl Into<String>,
        handler: F,
        supports_response: SupportsResponse,
    ) where
        F: Fn(ServiceCall) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ServiceResult> + Send + 'static,
    {
        let domain = domain.into();
        let service = service.into();

        debug!(domain = %domain, service = %service, "Registering service");

        let handler: ServiceHandler =
            Arc::new(move |call| Box::pin(handler(call)) as ServiceFuture);

        self.services.insert(
            service_key(&domain, &service),
            RegisteredService {
                handler,
                description: ServiceDescription {
                    domain,
                    service,
                    supports_response,
                },
            },
        );
    }

    /// Call a service
    ///
    /// The handler runs after the registry entry is released, so handlers may
    /// themselves register or unregister services.
    #[instrument(skip(self, service_data, context))]
    pub async fn call(
        &self,
        domain: &str,
        service: &str,
        service_data: serde_json::Value,
        context: Context,
        return_response: bool,
    ) -> ServiceResult {
        let handler = {
            let registered = self
                .services
                .get(&service_key(domain, service))
                .ok_or_else(|| {
                    warn!(domain = %domain, service = %service, "Service not found");
                    ServiceError::NotFound {
                        domain: domain.to_string(),
                        service: service.to_string(),
                    }
                })?;

            if return_response
                && registered.description.supports_response == SupportsResponse::None
            {
                return Err(ServiceError::ResponseNotSupported);
            }
            registered.handler.clone()
        };

        debug!(domain = %domain, service = %service, "Calling service");
        let result = handler(ServiceCall::new(domain, service, service_data, context)).await?;

        Ok(if return_response { result } else { None })
    }

    pub fn has_service(&self, domain: &str, service: &str) -> bool {
        self.services.contains_key(&service_key(domain, service))
    }

    /// Get all services for a domain, sorted by name
    pub fn domain_services(&self, domain: &str) -> Vec<ServiceDescription> {
        let mut services: Vec<_> = self
            .services
            .iter()
            .filter(|s| s.description.domain == domain)
            .map(|s| s.description.clone())
            .collect();
        services.sort_by(|a, b| a.service.cmp(&b.service));
        services
    }

    /// Unregister a service, returning whether it existed
    #[instrument(skip(self))]
    pub fn unregister(&self, domain: &str, service: &str) -> bool {
        let removed = self.services.remove(&service_key(domain, service)).is_some();
        if removed {
            debug!(domain = %domain, service = %service, "Unregistered service");
        }
        removed
    }

    /// Unregister all services for a domain
    #[instrument(skip(self))]
    pub fn unregister_domain(&self, domain: &str) -> usize {
        let before = self.services.len();
        self.services.retain(|_, s| s.description.domain != domain);
        let count = before - self.services.len();

        debug!(domain = %domain, count = count, "Unregistered domain services");
        count
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for ServiceRegistry
pub type SharedServiceRegistry = Arc<ServiceRegistry>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn noop(registry: &ServiceRegistry, domain: &str, service: &str) {
        registry.register(
            domain.to_string(),
            service.to_string(),
            |_: ServiceCall| async { Ok(None) },
            SupportsResponse::None,
        );
    }

    #[tokio::test]
    async fn test_register_and_call_with_response() {
        let registry = ServiceRegistry::new();

        registry.register(
            "kia_uvo",
            "update",
            |call: ServiceCall| async move { Ok(Some(json!({"service": call.service}))) },
            SupportsResponse::Optional,
        );

        let result = registry
            .call("kia_uvo", "update", json!({}), Context::new(), true)
            .await
            .unwrap();
        assert_eq!(result, Some(json!({"service": "update"})));

        // Response is dropped unless requested
        let result = registry
            .call("kia_uvo", "update", json!({}), Context::new(), false)
            .await
            .unwrap();
        assert_eq!(result, None);
    }

    #[tokio::test]
    async fn test_handler_invoked_once_per_call() {
        let registry = ServiceRegistry::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = calls.clone();
        registry.register(
            "kia_uvo",
            "force_update",
            move |_: ServiceCall| {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }
            },
            SupportsResponse::None,
        );

        for _ in 0..3 {
            registry
                .call("kia_uvo", "force_update", json!({}), Context::new(), false)
                .await
                .unwrap();
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_service_not_found() {
        let registry = ServiceRegistry::new();

        let result = registry
            .call("kia_uvo", "honk", json!({}), Context::new(), false)
            .await;

        assert!(matches!(result, Err(ServiceError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_response_not_supported() {
        let registry = ServiceRegistry::new();
        noop(&registry, "kia_uvo", "stop_climate");

        let result = registry
            .call("kia_uvo", "stop_climate", json!({}), Context::new(), true)
            .await;
        assert!(matches!(result, Err(ServiceError::ResponseNotSupported)));
    }

    #[tokio::test]
    async fn test_handler_error_propagates() {
        let registry = ServiceRegistry::new();
        registry.register(
            "kia_uvo",
            "start_climate",
            |_: ServiceCall| async move { Err(ServiceError::CallFailed("no vehicle".to_string())) },
            SupportsResponse::None,
        );

        let result = registry
            .call("kia_uvo", "start_climate", json!({}), Context::new(), false)
            .await;
        assert!(matches!(result, Err(ServiceError::CallFailed(_))));
    }

    #[test]
    fn test_domain_services_sorted() {
        let registry = ServiceRegistry::new();
        noop(&registry, "kia_uvo", "update");
        noop(&registry, "kia_uvo", "force_update");
        noop(&registry, "other", "update");

        let names: Vec<_> = registry
            .domain_services("kia_uvo")
            .into_iter()
            .map(|s| s.service)
            .collect();
        assert_eq!(names, vec!["force_update", "update"]);
    }

    #[test]
    fn test_unregister() {
        let registry = ServiceRegistry::new();
        noop(&registry, "kia_uvo", "update");

        assert!(registry.unregister("kia_uvo", "update"));
        assert!(!registry.has_service("kia_uvo", "update"));
        assert!(!registry.unregister("kia_uvo", "update"));
    }

    #[test]
    fn test_unregister_domain() {
        let registry = ServiceRegistry::new();
        noop(&registry, "kia_uvo", "update");
        noop(&registry, "kia_uvo", "force_update");
        noop(&registry, "other", "update");

        assert_eq!(registry.unregister_domain("kia_uvo"), 2);
        assert!(registry.has_service("other", "update"));
        assert_eq!(registry.service_count(), 1);
    }
}
