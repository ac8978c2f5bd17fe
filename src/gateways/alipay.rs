use crate::config::AlipayConfig;
use crate::domain::error::{GatewayError, Result};
use crate::domain::order::{OrderData, RefundData};
use crate::domain::result::{PaymentResult, TradeStatus};
use crate::gateways::sdk::{as_raw, str_field, SdkClient, SdkOperation, SdkRequest};
use crate::gateways::{china_time, require_order_no, settle, PaymentProvider, Provider};
use crate::validator;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::str::FromStr;
use std::sync::Arc;

const SUCCESS_CODE: &str = "10000";
const BUSINESS_FAILED_CODE: &str = "40004";

pub fn map_trade_status(status: &str) -> TradeStatus {
    match status {
        "WAIT_BUYER_PAY" => TradeStatus::Pending,
        "TRADE_SUCCESS" => TradeStatus::Paid,
        "TRADE_FINISHED" => TradeStatus::Finished,
        "TRADE_CLOSED" => TradeStatus::Closed,
        _ => TradeStatus::Unknown,
    }
}

pub struct AlipayGateway {
    config: AlipayConfig,
    client: Arc<dyn SdkClient>,
}

impl AlipayGateway {
    pub fn new(config: AlipayConfig, client: Arc<dyn SdkClient>) -> Result<Self> {
        validator::validate_alipay(&config)?;
        Ok(Self { config, client })
    }

    async fn execute(&self, operation: SdkOperation, payload: Value) -> Result<Option<Value>> {
        let reply = self.client.execute(SdkRequest { operation, payload }).await?;
        if let Some(body) = &reply {
            check_code(body)?;
        }
        Ok(reply)
    }

    async fn try_create(&self, order: &OrderData) -> Result<PaymentResult> {
        let order = order.validate()?;
        let mut payload = json!({
            "out_trade_no": order.order_no,
            "total_amount": major(order.amount_minor),
            "subject": order.subject,
            "notify_url": self.config.notify_url,
        });
        if let Some(expire) = order.expire_time {
            payload["time_expire"] =
                Value::String(china_time(expire)?.format("%Y-%m-%d %H:%M:%S").to_string());
        }

        let reply = self.execute(SdkOperation::CreateQr, payload).await?;
        let qr_code = reply
            .as_ref()
            .and_then(|r| str_field(r, "qr_code"))
            .ok_or_else(|| GatewayError::Api("response carries no qr_code".to_string()))?
            .to_string();

        Ok(PaymentResult::success("QR payment created", as_raw(reply))
            .with_qr_code(qr_code)
            .with_merchant_order_id(order.order_no)
            .with_amount_minor(order.amount_minor)
            .with_status(TradeStatus::Pending))
    }

    async fn try_query(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        let reply = self
            .execute(SdkOperation::Query, json!({ "out_trade_no": order_no }))
            .await?
            .ok_or_else(|| GatewayError::Api("empty query response".to_string()))?;

        let status = map_trade_status(str_field(&reply, "trade_status").unwrap_or_default());
        let trade_no = str_field(&reply, "trade_no").map(str::to_string);
        let amount = str_field(&reply, "total_amount").and_then(|a| Decimal::from_str(a).ok());

        let mut result = PaymentResult::success("order queried", as_raw(Some(reply)))
            .with_merchant_order_id(order_no)
            .with_processor_trade_id(trade_no)
            .with_status(status);
        if let Some(amount) = amount {
            result = result.with_amount_major(amount);
        }
        Ok(result)
    }

    async fn try_refund(&self, refund: &RefundData) -> Result<PaymentResult> {
        let refund = refund.validate()?;
        let mut payload = json!({
            "out_trade_no": refund.order_no,
            "refund_amount": major(refund.refund_amount),
            "out_request_no": refund.refund_no,
        });
        if let Some(reason) = &refund.reason {
            payload["refund_reason"] = Value::String(reason.clone());
        }

        let reply = self
            .execute(SdkOperation::Refund, payload)
            .await?
            .ok_or_else(|| GatewayError::Api("empty response".to_string()))?;
        let settled = str_field(&reply, "fund_change") == Some("Y");
        let trade_no = str_field(&reply, "trade_no").map(str::to_string);

        Ok(PaymentResult::success("refund accepted", as_raw(Some(reply)))
            .with_merchant_order_id(refund.order_no)
            .with_processor_trade_id(trade_no)
            .with_amount_minor(refund.refund_amount)
            .with_status(if settled {
                TradeStatus::Refunded
            } else {
                TradeStatus::Processing
            }))
    }

    async fn try_close(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        let reply = self
            .execute(SdkOperation::Close, json!({ "out_trade_no": order_no }))
            .await?;
        Ok(PaymentResult::success("order closed", as_raw(reply))
            .with_merchant_order_id(order_no)
            .with_status(TradeStatus::Closed))
    }
}

#[async_trait::async_trait]
impl PaymentProvider for AlipayGateway {
    fn provider(&self) -> Provider {
        Provider::Alipay
    }

    async fn create_qr_payment(&self, order: &OrderData) -> PaymentResult {
        settle(self.try_create(order).await)
    }

    async fn query_order(&self, order_no: &str) -> PaymentResult {
        settle(self.try_query(order_no).await)
    }

    async fn refund(&self, refund: &RefundData) -> PaymentResult {
        settle(self.try_refund(refund).await)
    }

    async fn close_order(&self, order_no: &str) -> PaymentResult {
        settle(self.try_close(order_no).await)
    }
}

/// Alipay amounts are decimal strings in yuan.
fn major(amount_minor: i64) -> String {
    Decimal::new(amount_minor, 2).to_string()
}

/// `40004` is a business refusal, any other non-`10000` code a rejected call.
fn check_code(body: &Value) -> Result<()> {
    let code = str_field(body, "code").unwrap_or(SUCCESS_CODE);
    if code == SUCCESS_CODE {
        return Ok(());
    }
    let detail = str_field(body, "sub_msg")
        .or_else(|| str_field(body, "msg"))
        .unwrap_or("processor reported a failed result")
        .to_string();
    if code == BUSINESS_FAILED_CODE {
        Err(GatewayError::Business(detail))
    } else {
        Err(GatewayError::Api(format!("{code}: {detail}")))
    }
}
