use crate::config::WechatConfig;
use crate::domain::error::{GatewayError, Result};
use crate::domain::order::{OrderData, RefundData};
use crate::domain::result::{PaymentResult, TradeStatus};
use crate::gateways::sdk::{as_raw, str_field, SdkClient, SdkOperation, SdkRequest};
use crate::gateways::wechat_v2::map_trade_state;
use crate::gateways::{china_time, require_order_no, settle, PaymentProvider, Provider};
use crate::validator;
use serde_json::{json, Value};
use std::sync::Arc;

const CURRENCY: &str = "CNY";

pub fn map_refund_status(status: &str) -> TradeStatus {
    match status {
        "SUCCESS" => TradeStatus::Refunded,
        "PROCESSING" => TradeStatus::Processing,
        "CLOSED" => TradeStatus::Closed,
        "ABNORMAL" => TradeStatus::Failed,
        _ => TradeStatus::Unknown,
    }
}

pub struct WechatGateway {
    config: WechatConfig,
    client: Arc<dyn SdkClient>,
}

impl WechatGateway {
    pub fn new(config: WechatConfig, client: Arc<dyn SdkClient>) -> Result<Self> {
        validator::validate_wechat(&config)?;
        Ok(Self { config, client })
    }

    async fn execute(&self, operation: SdkOperation, payload: Value) -> Result<Option<Value>> {
        let reply = self.client.execute(SdkRequest { operation, payload }).await?;
        if let Some(body) = &reply {
            check_error(body)?;
        }
        Ok(reply)
    }

    async fn try_create(&self, order: &OrderData) -> Result<PaymentResult> {
        let order = order.validate()?;
        let mut payload = json!({
            "appid": self.config.app_id,
            "mchid": self.config.mch_id,
            "description": order.subject,
            "out_trade_no": order.order_no,
            "notify_url": self.config.notify_url,
            "amount": { "total": order.amount_minor, "currency": CURRENCY },
        });
        if let Some(expire) = order.expire_time {
            payload["time_expire"] = Value::String(china_time(expire)?.to_rfc3339());
        }

        let reply = self.execute(SdkOperation::CreateQr, payload).await?;
        let code_url = reply
            .as_ref()
            .and_then(|r| str_field(r, "code_url"))
            .ok_or_else(|| GatewayError::Api("response carries no code_url".to_string()))?
            .to_string();

        Ok(PaymentResult::success("QR payment created", as_raw(reply))
            .with_qr_code(code_url)
            .with_merchant_order_id(order.order_no)
            .with_amount_minor(order.amount_minor)
            .with_status(TradeStatus::Pending))
    }

    async fn try_query(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        let reply = self
            .execute(
                SdkOperation::Query,
                json!({ "out_trade_no": order_no, "mchid": self.config.mch_id }),
            )
            .await?
            .ok_or_else(|| GatewayError::Api("empty query response".to_string()))?;

        let status = map_trade_state(str_field(&reply, "trade_state").unwrap_or_default());
        let message = str_field(&reply, "trade_state_desc")
            .unwrap_or("order queried")
            .to_string();
        let trade_no = str_field(&reply, "transaction_id").map(str::to_string);
        let total = reply.pointer("/amount/total").and_then(Value::as_i64);

        let mut result = PaymentResult::success(message, as_raw(Some(reply)))
            .with_merchant_order_id(order_no)
            .with_processor_trade_id(trade_no)
            .with_status(status);
        if let Some(total) = total {
            result = result.with_amount_minor(total);
        }
        Ok(result)
    }

    async fn try_refund(&self, refund: &RefundData) -> Result<PaymentResult> {
        let refund = refund.validate()?;
        let mut payload = json!({
            "out_trade_no": refund.order_no,
            "out_refund_no": refund.refund_no,
            "notify_url": self.config.notify_url,
            "amount": {
                "refund": refund.refund_amount,
                "total": refund.total_amount,
                "currency": CURRENCY,
            },
        });
        if let Some(reason) = &refund.reason {
            payload["reason"] = Value::String(reason.clone());
        }

        let reply = self
            .execute(SdkOperation::Refund, payload)
            .await?
            .ok_or_else(|| GatewayError::Api("empty response".to_string()))?;
        let status = str_field(&reply, "status")
            .map(map_refund_status)
            .unwrap_or(TradeStatus::Processing);
        let refund_id = str_field(&reply, "refund_id").map(str::to_string);

        Ok(PaymentResult::success("refund accepted", as_raw(Some(reply)))
            .with_merchant_order_id(refund.order_no)
            .with_processor_trade_id(refund_id)
            .with_amount_minor(refund.refund_amount)
            .with_status(status))
    }

    async fn try_close(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        // answered with 204 and no body on success
        let reply = self
            .execute(
                SdkOperation::Close,
                json!({ "out_trade_no": order_no, "mchid": self.config.mch_id }),
            )
            .await?;
        Ok(PaymentResult::success("order closed", as_raw(reply))
            .with_merchant_order_id(order_no)
            .with_status(TradeStatus::Closed))
    }
}

#[async_trait::async_trait]
impl PaymentProvider for WechatGateway {
    fn provider(&self) -> Provider {
        Provider::Wechat
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

/// Error bodies carry `code` and `message`; successful ones never have `code`.
fn check_error(body: &Value) -> Result<()> {
    let Some(code) = str_field(body, "code") else {
        return Ok(());
    };
    let message = str_field(body, "message").unwrap_or(code).to_string();
    match code {
        "ORDERNOTEXIST" | "ORDER_CLOSED" | "ORDERPAID" | "NOT_ENOUGH" | "USERPAYING"
        | "TRADE_ERROR" | "FREQUENCY_LIMITED" => Err(GatewayError::Business(message)),
        _ => Err(GatewayError::Api(format!("{code}: {message}"))),
    }
}
