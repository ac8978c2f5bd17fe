use crate::domain::error::ErrorCode;
use crate::domain::order::{OrderData, RefundData};
use crate::domain::result::{GatewayResponse, PaymentResult};
use crate::gateways::{PaymentProvider, Provider};
use crate::service::factory::GatewayFactory;
use futures::FutureExt;
use serde_json::{json, Map, Value};
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

/// Shown to callers when an adapter fails in a way it was not built to report.
pub const SAFE_FAILURE_MESSAGE: &str = "payment service is temporarily unavailable";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Create,
    Query,
    Refund,
    Close,
}

impl Operation {
    fn label(self) -> &'static str {
        match self {
            Operation::Create => "create payment",
            Operation::Query => "query payment",
            Operation::Refund => "refund",
            Operation::Close => "close order",
        }
    }
}

/// Entry point for calling code: resolves the adapter, runs the operation and
/// turns every outcome into a [`GatewayResponse`].
#[derive(Clone)]
pub struct GatewayService {
    factory: Arc<GatewayFactory>,
}

impl GatewayService {
    pub fn new(factory: Arc<GatewayFactory>) -> Self {
        Self { factory }
    }

    pub fn factory(&self) -> &GatewayFactory {
        &self.factory
    }

    pub async fn create_qr_payment(&self, provider: &str, order: &OrderData) -> GatewayResponse {
        let order_no = order.resolved_order_no().unwrap_or_default();
        self.run(Operation::Create, provider, order_no, move |adapter| async move {
            adapter.create_qr_payment(order).await
        })
        .await
    }

    pub async fn query_payment(&self, provider: &str, order_no: &str) -> GatewayResponse {
        self.run(Operation::Query, provider, order_no, move |adapter| async move {
            adapter.query_order(order_no).await
        })
        .await
    }

    pub async fn refund_payment(&self, provider: &str, refund: &RefundData) -> GatewayResponse {
        let order_no = refund
            .order_no
            .as_deref()
            .or(refund.out_trade_no.as_deref())
            .unwrap_or_default();
        tracing::debug!(
            provider,
            order_no,
            refund_no = refund.refund_no.as_deref().unwrap_or_default(),
            "refund requested"
        );
        self.run(Operation::Refund, provider, order_no, move |adapter| async move {
            adapter.refund(refund).await
        })
        .await
    }

    pub async fn close_payment(&self, provider: &str, order_no: &str) -> GatewayResponse {
        self.run(Operation::Close, provider, order_no, move |adapter| async move {
            adapter.close_order(order_no).await
        })
        .await
    }

    pub async fn close_order(&self, provider: &str, order_no: &str) -> GatewayResponse {
        self.close_payment(provider, order_no).await
    }

    pub fn get_supported_payments(&self) -> GatewayResponse {
        let providers: Vec<Value> = self
            .factory
            .available_providers()
            .into_iter()
            .map(|p| json!({ "code": p.as_str(), "name": p.display_name() }))
            .collect();
        let mut data = Map::new();
        data.insert("providers".to_string(), Value::Array(providers));
        PaymentResult::success("supported payments", data).to_response()
    }

    /// Creates the payment with the preferred provider when it is usable, else
    /// with the first usable one.
    pub async fn unified_order(
        &self,
        order: &OrderData,
        preferred: Option<&str>,
    ) -> GatewayResponse {
        let available = self.factory.available_providers();
        let preferred = preferred.and_then(|p| p.parse::<Provider>().ok());
        let chosen = preferred
            .filter(|p| available.contains(p))
            .or_else(|| available.first().copied());

        let Some(provider) = chosen else {
            tracing::error!("unified order requested but no payment provider is available");
            return GatewayResponse::failure(
                ErrorCode::ConfigError,
                "no payment provider is available",
            );
        };
        if preferred.is_some() && preferred != Some(provider) {
            tracing::warn!(fallback = %provider, "preferred provider unavailable, falling back");
        }

        let mut response = self.create_qr_payment(provider.as_str(), order).await;
        if let Value::Object(data) = &mut response.data {
            data.insert(
                "provider".to_string(),
                Value::String(provider.as_str().to_string()),
            );
        }
        response
    }

    async fn run<F, Fut>(
        &self,
        operation: Operation,
        provider: &str,
        order_no: &str,
        call: F,
    ) -> GatewayResponse
    where
        F: FnOnce(Arc<dyn PaymentProvider>) -> Fut,
        Fut: Future<Output = PaymentResult>,
    {
        let adapter = match self.factory.resolve(provider, None).await {
            Ok(adapter) => adapter,
            Err(e) => {
                tracing::error!(
                    provider,
                    order_no,
                    operation = operation.label(),
                    error_code = e.code().as_u16(),
                    error = %e,
                    "payment provider unavailable"
                );
                return GatewayResponse::from_error(&e);
            }
        };

        match AssertUnwindSafe(call(adapter)).catch_unwind().await {
            Ok(result) if result.is_success() => {
                match operation {
                    Operation::Query => tracing::debug!(
                        provider,
                        order_no,
                        status = result.status().map(|s| s.as_str()).unwrap_or("unknown"),
                        "payment queried"
                    ),
                    _ => tracing::info!(
                        provider,
                        order_no,
                        trade_no = result.processor_trade_id().unwrap_or_default(),
                        "{} succeeded",
                        operation.label()
                    ),
                }
                result.to_response()
            }
            Ok(result) => {
                let code = result.error_code().unwrap_or(ErrorCode::BusinessError);
                tracing::warn!(
                    provider,
                    order_no,
                    error_code = code.as_u16(),
                    reason = result.message(),
                    "{} failed",
                    operation.label()
                );
                let mut response = result.to_response();
                response.message = format!("{} failed: {}", operation.label(), result.message());
                response
            }
            Err(panic) => {
                let detail = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_default();
                tracing::error!(
                    provider,
                    order_no,
                    operation = operation.label(),
                    detail = %detail,
                    "payment adapter failed unexpectedly"
                );
                GatewayResponse::failure(ErrorCode::BusinessError, SAFE_FAILURE_MESSAGE)
            }
        }
    }
}
