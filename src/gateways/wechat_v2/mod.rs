//! Hand-built client for the legacy WeChat Pay XML protocol (API v2).
//!
//! Every call assembles a field map, signs it with the shared secret, ships it
//! as flat XML and maps the reply back onto [`PaymentResult`].

use crate::config::{SignType, WechatV2Config};
use crate::domain::error::{GatewayError, Result};
use crate::domain::order::{OrderData, RefundData};
use crate::domain::result::{PaymentResult, TradeStatus};
use crate::gateways::{
    china_time, require_order_no, settle, PaymentProvider, Provider, REQUEST_TIMEOUT,
};
use crate::validator;
use chrono::{DateTime, Utc};
use rand::distributions::{Alphanumeric, DistString};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub mod sign;
pub mod trade_state;
pub mod xml;

pub use trade_state::map_trade_state;

pub const DEFAULT_BASE_URL: &str = "https://api.mch.weixin.qq.com";
pub const SANDBOX_PREFIX: &str = "/sandboxnew";
pub const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
pub const NONCE_LEN: usize = 32;

const UNIFIED_ORDER_PATH: &str = "/pay/unifiedorder";
const ORDER_QUERY_PATH: &str = "/pay/orderquery";
const REFUND_PATH: &str = "/secapi/pay/refund";
const CLOSE_ORDER_PATH: &str = "/pay/closeorder";

const SUCCESS: &str = "SUCCESS";
const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// How a single processor exchange is carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Exchange {
    Plain,
    /// Sent through the client holding the merchant certificate.
    WithCert,
    /// A 2xx answer without a body counts as success.
    EmptyOk,
}

pub struct WechatV2Gateway {
    config: WechatV2Config,
    base_url: String,
    client: reqwest::Client,
    /// Carries the merchant client certificate when one is configured.
    refund_client: reqwest::Client,
    client_cert: bool,
}

impl WechatV2Gateway {
    /// Validates the config and builds the HTTP clients. Nothing is kept on failure.
    pub fn new(config: WechatV2Config) -> Result<Self> {
        validator::validate_wechat_v2(&config)?;

        let client = build_client(None)?;
        let identity = match (present(&config.cert_path), present(&config.key_path)) {
            (Some(cert), Some(key)) => Some(load_identity(cert, key)?),
            _ => None,
        };
        let client_cert = identity.is_some();
        let refund_client = match identity {
            Some(identity) => build_client(Some(identity))?,
            None => client.clone(),
        };
        if !client_cert {
            tracing::debug!(
                provider = "wechat_v2",
                "no client certificate configured, refunds go out without one"
            );
        }

        let host = present(&config.base_url)
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        let base_url = if config.sandbox {
            format!("{host}{SANDBOX_PREFIX}")
        } else {
            host.to_string()
        };

        Ok(Self {
            config,
            base_url,
            client,
            refund_client,
            client_cert,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether refunds are sent with the merchant client certificate.
    pub fn has_client_certificate(&self) -> bool {
        self.client_cert
    }

    fn base_fields(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        fields.insert("appid".to_string(), self.config.app_id.clone());
        fields.insert("mch_id".to_string(), self.config.mch_id.clone());
        fields.insert("nonce_str".to_string(), nonce());
        if self.config.sign_type != SignType::Md5 {
            fields.insert(
                "sign_type".to_string(),
                self.config.sign_type.wire_name().to_string(),
            );
        }
        fields
    }

    async fn call(
        &self,
        path: &str,
        mut fields: BTreeMap<String, String>,
        exchange: Exchange,
    ) -> Result<BTreeMap<String, String>> {
        sign::attach(&mut fields, &self.config.key, self.config.sign_type);
        let body = xml::encode(&fields)?;
        let url = format!("{}{}", self.base_url, path);
        let client = if exchange == Exchange::WithCert {
            &self.refund_client
        } else {
            &self.client
        };

        tracing::debug!(provider = "wechat_v2", %url, "calling processor");
        let resp = client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, XML_CONTENT_TYPE)
            .body(body)
            .send()
            .await
            .map_err(|e| transport_error(path, e))?;

        let status = resp.status();
        let text = resp.text().await.map_err(|e| transport_error(path, e))?;

        if text.trim().is_empty() {
            if status.is_success() && exchange == Exchange::EmptyOk {
                return Ok(BTreeMap::new());
            }
            tracing::warn!(provider = "wechat_v2", path, status = status.as_u16(), "empty reply");
            return Err(if status.is_success() {
                GatewayError::Api("empty response".to_string())
            } else {
                GatewayError::Network(format!("processor answered HTTP {}", status.as_u16()))
            });
        }

        let reply = match xml::decode(&text) {
            Ok(reply) if reply.contains_key("return_code") => reply,
            _ if !status.is_success() => {
                return Err(GatewayError::Network(format!(
                    "processor answered HTTP {}",
                    status.as_u16()
                )))
            }
            Ok(_) => {
                return Err(GatewayError::Api(
                    "response carries no return_code".to_string(),
                ))
            }
            Err(e) => return Err(e),
        };

        self.check_reply(reply)
    }

    fn check_reply(&self, reply: BTreeMap<String, String>) -> Result<BTreeMap<String, String>> {
        if field(&reply, "return_code") != Some(SUCCESS) {
            return Err(GatewayError::Api(
                field(&reply, "return_msg")
                    .unwrap_or("processor rejected the request")
                    .to_string(),
            ));
        }

        if sign::verify(&reply, &self.config.key, self.config.sign_type) == Some(false) {
            return Err(GatewayError::Api("response signature mismatch".to_string()));
        }

        if field(&reply, "result_code") != Some(SUCCESS) {
            let detail = field(&reply, "err_code_des")
                .or_else(|| field(&reply, "err_code"))
                .unwrap_or("processor reported a failed result");
            return Err(GatewayError::Business(detail.to_string()));
        }

        Ok(reply)
    }

    async fn try_create(&self, order: &OrderData) -> Result<PaymentResult> {
        let order = order.validate()?;

        let mut fields = self.base_fields();
        fields.insert("body".to_string(), order.subject.clone());
        fields.insert("out_trade_no".to_string(), order.order_no.clone());
        fields.insert("total_fee".to_string(), order.amount_minor.to_string());
        fields.insert(
            "spbill_create_ip".to_string(),
            order
                .client_ip
                .clone()
                .unwrap_or_else(|| DEFAULT_CLIENT_IP.to_string()),
        );
        fields.insert("notify_url".to_string(), self.config.notify_url.clone());
        fields.insert("trade_type".to_string(), "NATIVE".to_string());
        fields.insert("product_id".to_string(), order.order_no.clone());
        if let Some(expire) = order.expire_time {
            fields.insert("time_expire".to_string(), format_expire_time(expire)?);
        }

        let reply = self.call(UNIFIED_ORDER_PATH, fields, Exchange::Plain).await?;
        let code_url = field(&reply, "code_url")
            .ok_or_else(|| GatewayError::Api("response carries no code_url".to_string()))?
            .to_string();

        Ok(PaymentResult::success("QR payment created", raw_map(&reply))
            .with_qr_code(code_url)
            .with_merchant_order_id(order.order_no)
            .with_processor_trade_id(field(&reply, "prepay_id").map(str::to_string))
            .with_amount_minor(order.amount_minor)
            .with_status(TradeStatus::Pending))
    }

    async fn try_query(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        let mut fields = self.base_fields();
        fields.insert("out_trade_no".to_string(), order_no.to_string());

        let reply = self.call(ORDER_QUERY_PATH, fields, Exchange::Plain).await?;
        let status = map_trade_state(field(&reply, "trade_state").unwrap_or_default());
        let message = field(&reply, "trade_state_desc")
            .unwrap_or("order queried")
            .to_string();

        let mut result = PaymentResult::success(message, raw_map(&reply))
            .with_merchant_order_id(field(&reply, "out_trade_no").unwrap_or(order_no))
            .with_processor_trade_id(field(&reply, "transaction_id").map(str::to_string))
            .with_status(status);
        if let Some(total_fee) = field(&reply, "total_fee").and_then(|f| f.parse::<i64>().ok()) {
            result = result.with_amount_minor(total_fee);
        }
        Ok(result)
    }

    async fn try_refund(&self, refund: &RefundData) -> Result<PaymentResult> {
        let refund = refund.validate()?;

        let mut fields = self.base_fields();
        fields.insert("out_trade_no".to_string(), refund.order_no.clone());
        fields.insert("out_refund_no".to_string(), refund.refund_no.clone());
        fields.insert("total_fee".to_string(), refund.total_amount.to_string());
        fields.insert("refund_fee".to_string(), refund.refund_amount.to_string());
        if let Some(reason) = &refund.reason {
            fields.insert("refund_desc".to_string(), reason.clone());
        }

        let reply = self.call(REFUND_PATH, fields, Exchange::WithCert).await?;
        let refunded = field(&reply, "refund_fee")
            .and_then(|f| f.parse::<i64>().ok())
            .unwrap_or(refund.refund_amount);

        Ok(PaymentResult::success("refund accepted", raw_map(&reply))
            .with_merchant_order_id(refund.order_no)
            .with_processor_trade_id(field(&reply, "refund_id").map(str::to_string))
            .with_amount_minor(refunded)
            .with_status(TradeStatus::Processing))
    }

    async fn try_close(&self, order_no: &str) -> Result<PaymentResult> {
        let order_no = require_order_no(order_no)?;
        let mut fields = self.base_fields();
        fields.insert("out_trade_no".to_string(), order_no.to_string());

        let reply = self.call(CLOSE_ORDER_PATH, fields, Exchange::EmptyOk).await?;
        Ok(PaymentResult::success("order closed", raw_map(&reply))
            .with_merchant_order_id(order_no)
            .with_status(TradeStatus::Closed))
    }
}

#[async_trait::async_trait]
impl PaymentProvider for WechatV2Gateway {
    fn provider(&self) -> Provider {
        Provider::WechatV2
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

/// Fresh for every request.
pub fn nonce() -> String {
    Alphanumeric.sample_string(&mut rand::rngs::OsRng, NONCE_LEN)
}

/// `yyyyMMddHHmmss` in China Standard Time.
pub fn format_expire_time(expire: DateTime<Utc>) -> Result<String> {
    Ok(china_time(expire)?.format("%Y%m%d%H%M%S").to_string())
}

/// Full transport detail goes to the log only; callers see the category text.
fn transport_error(path: &str, e: reqwest::Error) -> GatewayError {
    tracing::error!(provider = "wechat_v2", path, error = %e, "processor call failed");
    GatewayError::from(e)
}

fn build_client(identity: Option<reqwest::Identity>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().timeout(REQUEST_TIMEOUT);
    if let Some(identity) = identity {
        builder = builder.identity(identity);
    }
    builder
        .build()
        .map_err(|e| GatewayError::Config(format!("failed to build http client: {e}")))
}

/// rustls wants the certificate and its key in one PEM bundle.
fn load_identity(cert_path: &str, key_path: &str) -> Result<reqwest::Identity> {
    let mut pem = std::fs::read(cert_path)
        .map_err(|e| GatewayError::Config(format!("cannot read cert_path: {e}")))?;
    pem.push(b'\n');
    pem.extend(
        std::fs::read(key_path)
            .map_err(|e| GatewayError::Config(format!("cannot read key_path: {e}")))?,
    );
    reqwest::Identity::from_pem(&pem)
        .map_err(|e| GatewayError::Config(format!("invalid client certificate: {e}")))
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

fn field<'a>(reply: &'a BTreeMap<String, String>, name: &str) -> Option<&'a str> {
    reply.get(name).map(String::as_str).filter(|v| !v.is_empty())
}

fn raw_map(reply: &BTreeMap<String, String>) -> Map<String, Value> {
    reply
        .iter()
        .filter(|(k, _)| k.as_str() != sign::SIGN_FIELD)
        .map(|(k, v)| (k.clone(), Value::String(v.clone())))
        .collect()
}
