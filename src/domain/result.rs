use crate::domain::error::{ErrorCode, GatewayError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Paid,
    Closed,
    Refunded,
    Cancelled,
    Paying,
    Failed,
    Finished,
    Processing,
    Unknown,
}

impl TradeStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Paid => "paid",
            TradeStatus::Closed => "closed",
            TradeStatus::Refunded => "refunded",
            TradeStatus::Cancelled => "cancelled",
            TradeStatus::Paying => "paying",
            TradeStatus::Failed => "failed",
            TradeStatus::Finished => "finished",
            TradeStatus::Processing => "processing",
            TradeStatus::Unknown => "unknown",
        }
    }
}

/// Normalized outcome of one adapter operation.
///
/// Built once through [`PaymentResult::success`] or [`PaymentResult::fail`] and
/// never mutated afterwards. When `success` is false the qr code, trade id,
/// amount and status are diagnostic at best.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentResult {
    success: bool,
    message: String,
    raw_data: Map<String, Value>,
    qr_code: Option<String>,
    merchant_order_id: Option<String>,
    processor_trade_id: Option<String>,
    amount_major_units: Option<Decimal>,
    status: Option<TradeStatus>,
    error_code: Option<ErrorCode>,
}

impl PaymentResult {
    pub fn success(message: impl Into<String>, raw_data: Map<String, Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            raw_data,
            qr_code: None,
            merchant_order_id: None,
            processor_trade_id: None,
            amount_major_units: None,
            status: None,
            error_code: None,
        }
    }

    pub fn fail(message: impl Into<String>, raw_data: Map<String, Value>) -> Self {
        Self::fail_with_code(ErrorCode::BusinessError, message, raw_data)
    }

    pub fn fail_with_code(
        code: ErrorCode,
        message: impl Into<String>,
        raw_data: Map<String, Value>,
    ) -> Self {
        Self {
            success: false,
            message: message.into(),
            raw_data,
            qr_code: None,
            merchant_order_id: None,
            processor_trade_id: None,
            amount_major_units: None,
            status: None,
            error_code: Some(code),
        }
    }

    pub fn from_error(error: &GatewayError) -> Self {
        Self::fail_with_code(error.code(), error.detail(), Map::new())
    }

    pub fn with_qr_code(mut self, qr_code: impl Into<String>) -> Self {
        self.qr_code = Some(qr_code.into());
        self
    }

    pub fn with_merchant_order_id(mut self, order_no: impl Into<String>) -> Self {
        self.merchant_order_id = Some(order_no.into());
        self
    }

    pub fn with_processor_trade_id(mut self, trade_no: Option<String>) -> Self {
        self.processor_trade_id = trade_no.filter(|t| !t.is_empty());
        self
    }

    /// Amounts travel in minor units; the result holds major units.
    pub fn with_amount_minor(mut self, amount_minor: i64) -> Self {
        self.amount_major_units = Some(Decimal::new(amount_minor, 2));
        self
    }

    pub fn with_amount_major(mut self, amount: Decimal) -> Self {
        self.amount_major_units = Some(amount);
        self
    }

    pub fn with_status(mut self, status: TradeStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn raw_data(&self) -> &Map<String, Value> {
        &self.raw_data
    }

    pub fn qr_code(&self) -> Option<&str> {
        self.qr_code.as_deref()
    }

    pub fn merchant_order_id(&self) -> Option<&str> {
        self.merchant_order_id.as_deref()
    }

    pub fn processor_trade_id(&self) -> Option<&str> {
        self.processor_trade_id.as_deref()
    }

    pub fn amount_major_units(&self) -> Option<Decimal> {
        self.amount_major_units
    }

    pub fn status(&self) -> Option<TradeStatus> {
        self.status
    }

    /// Category of a failed result. Successful results have none.
    pub fn error_code(&self) -> Option<ErrorCode> {
        if self.success {
            None
        } else {
            Some(self.error_code.unwrap_or(ErrorCode::BusinessError))
        }
    }

    pub fn to_response(&self) -> GatewayResponse {
        GatewayResponse {
            success: self.success,
            message: self.message.clone(),
            data: Value::Object(self.raw_data.clone()),
            qr_code: self.qr_code.clone(),
            order_no: self.merchant_order_id.clone(),
            trade_no: self.processor_trade_id.clone(),
            amount: self.amount_major_units,
            status: self.status,
            error_code: self.error_code(),
        }
    }
}

/// Caller-facing mapping of a [`PaymentResult`].
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct GatewayResponse {
    pub success: bool,
    pub message: String,
    pub data: Value,
    pub qr_code: Option<String>,
    pub order_no: Option<String>,
    pub trade_no: Option<String>,
    pub amount: Option<Decimal>,
    pub status: Option<TradeStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<ErrorCode>,
}

impl GatewayResponse {
    pub fn failure(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            data: Value::Object(Map::new()),
            qr_code: None,
            order_no: None,
            trade_no: None,
            amount: None,
            status: None,
            error_code: Some(code),
        }
    }

    pub fn from_error(error: &GatewayError) -> Self {
        Self::failure(error.code(), error.detail())
    }
}
