use crate::domain::error::{GatewayError, Result as GatewayResult};
use crate::domain::order::{OrderData, RefundData};
use crate::domain::result::PaymentResult;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod alipay;
pub mod sdk;
pub mod wechat;
pub mod wechat_v2;

/// Fixed per-request transport timeout. There are no retries.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Logical payment-provider names understood by the factory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Alipay,
    Wechat,
    WechatV2,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::Alipay, Provider::Wechat, Provider::WechatV2];

    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Alipay => "alipay",
            Provider::Wechat => "wechat",
            Provider::WechatV2 => "wechat_v2",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Provider::Alipay => "Alipay",
            Provider::Wechat => "WeChat Pay",
            Provider::WechatV2 => "WeChat Pay (legacy)",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "alipay" => Ok(Provider::Alipay),
            "wechat" | "wechat_v3" => Ok(Provider::Wechat),
            "wechat_v2" => Ok(Provider::WechatV2),
            other => Err(GatewayError::Validation(format!(
                "unsupported payment provider: {other}"
            ))),
        }
    }
}

/// Capability contract shared by every adapter.
///
/// Operations never fail past this boundary: processor, transport and input
/// problems come back as a failed [`PaymentResult`] carrying their category.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync {
    fn provider(&self) -> Provider;

    async fn create_qr_payment(&self, order: &OrderData) -> PaymentResult;

    async fn query_order(&self, order_no: &str) -> PaymentResult;

    async fn refund(&self, refund: &RefundData) -> PaymentResult;

    async fn close_order(&self, order_no: &str) -> PaymentResult;
}

const CST_OFFSET_SECS: i32 = 8 * 3600;

/// Expiry instants go on the wire in China Standard Time and must lie ahead.
pub(crate) fn china_time(expire: DateTime<Utc>) -> GatewayResult<DateTime<FixedOffset>> {
    if expire <= Utc::now() {
        return Err(GatewayError::Validation(
            "expire_time must be in the future".to_string(),
        ));
    }
    let cst = FixedOffset::east_opt(CST_OFFSET_SECS)
        .ok_or_else(|| GatewayError::Validation("invalid timezone offset".to_string()))?;
    Ok(expire.with_timezone(&cst))
}

pub(crate) fn require_order_no(order_no: &str) -> GatewayResult<&str> {
    let order_no = order_no.trim();
    if order_no.is_empty() {
        return Err(GatewayError::Validation("order_no is required".to_string()));
    }
    Ok(order_no)
}

/// Folds an adapter's internal error into a failed result of the same category.
pub(crate) fn settle(outcome: GatewayResult<PaymentResult>) -> PaymentResult {
    match outcome {
        Ok(result) => result,
        Err(e) => PaymentResult::from_error(&e),
    }
}
