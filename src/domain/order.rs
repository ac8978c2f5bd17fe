use crate::domain::error::{GatewayError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Order data as supplied by the caller. Several keys are accepted for the same
/// value so that payloads shaped for different processors can be passed through.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderData {
    #[serde(default)]
    pub order_no: Option<String>,
    #[serde(default)]
    pub out_trade_no: Option<String>,
    /// Minor currency units.
    #[serde(default)]
    pub amount: Option<i64>,
    #[serde(default)]
    pub total_fee: Option<i64>,
    #[serde(default)]
    pub total_amount: Option<i64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub body: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub expire_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub client_ip: Option<String>,
}

/// A QR order whose required fields are known to be present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrOrder {
    pub order_no: String,
    pub amount_minor: i64,
    pub subject: String,
    pub expire_time: Option<DateTime<Utc>>,
    pub client_ip: Option<String>,
}

impl OrderData {
    pub fn new(order_no: impl Into<String>, amount_minor: i64, subject: impl Into<String>) -> Self {
        Self {
            order_no: Some(order_no.into()),
            amount: Some(amount_minor),
            subject: Some(subject.into()),
            ..Self::default()
        }
    }

    pub fn with_expire_time(mut self, expire_time: DateTime<Utc>) -> Self {
        self.expire_time = Some(expire_time);
        self
    }

    pub fn resolved_order_no(&self) -> Option<&str> {
        first_non_empty(&[&self.order_no, &self.out_trade_no])
    }

    pub fn resolved_amount(&self) -> Option<i64> {
        self.amount.or(self.total_fee).or(self.total_amount)
    }

    pub fn resolved_subject(&self) -> Option<&str> {
        first_non_empty(&[&self.subject, &self.body, &self.description])
    }

    /// Checks every required field and reports all of the missing ones at once.
    pub fn validate(&self) -> Result<QrOrder> {
        let mut missing = Vec::new();
        let order_no = self.resolved_order_no();
        if order_no.is_none() {
            missing.push("order_no");
        }
        let amount = self.resolved_amount().filter(|a| *a > 0);
        if amount.is_none() {
            missing.push("amount");
        }
        let subject = self.resolved_subject();
        if subject.is_none() {
            missing.push("subject");
        }

        match (order_no, amount, subject) {
            (Some(order_no), Some(amount_minor), Some(subject)) => Ok(QrOrder {
                order_no: order_no.to_string(),
                amount_minor,
                subject: subject.to_string(),
                expire_time: self.expire_time,
                client_ip: self.client_ip.clone().filter(|ip| !ip.trim().is_empty()),
            }),
            _ => Err(GatewayError::Validation(format!(
                "missing or invalid order fields: {}",
                missing.join(", ")
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundData {
    #[serde(default)]
    pub order_no: Option<String>,
    #[serde(default)]
    pub out_trade_no: Option<String>,
    #[serde(default)]
    pub refund_no: Option<String>,
    /// Minor currency units.
    #[serde(default)]
    pub refund_amount: Option<i64>,
    /// Minor currency units. Defaults to `refund_amount` (a full refund).
    #[serde(default)]
    pub total_amount: Option<i64>,
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefundOrder {
    pub order_no: String,
    pub refund_no: String,
    pub refund_amount: i64,
    pub total_amount: i64,
    pub reason: Option<String>,
}

impl RefundOrder {
    pub fn is_partial(&self) -> bool {
        self.refund_amount < self.total_amount
    }
}

impl RefundData {
    pub fn new(order_no: impl Into<String>, refund_amount: i64, total_amount: i64) -> Self {
        Self {
            order_no: Some(order_no.into()),
            refund_amount: Some(refund_amount),
            total_amount: Some(total_amount),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<RefundOrder> {
        let mut missing = Vec::new();
        let order_no = first_non_empty(&[&self.order_no, &self.out_trade_no]);
        if order_no.is_none() {
            missing.push("order_no");
        }
        let refund_amount = self.refund_amount.filter(|a| *a > 0);
        if refund_amount.is_none() {
            missing.push("refund_amount");
        }
        let (Some(order_no), Some(refund_amount)) = (order_no, refund_amount) else {
            return Err(GatewayError::Validation(format!(
                "missing or invalid refund fields: {}",
                missing.join(", ")
            )));
        };

        let total_amount = self.total_amount.unwrap_or(refund_amount);
        if total_amount <= 0 {
            return Err(GatewayError::Validation("total_amount must be > 0".to_string()));
        }
        if refund_amount > total_amount {
            return Err(GatewayError::Validation(format!(
                "refund_amount {} exceeds total_amount {}",
                refund_amount, total_amount
            )));
        }

        let refund_no = first_non_empty(&[&self.refund_no])
            .map(str::to_string)
            .unwrap_or_else(|| generate_refund_no(order_no));

        Ok(RefundOrder {
            order_no: order_no.to_string(),
            refund_no,
            refund_amount,
            total_amount,
            reason: self.reason.clone().filter(|r| !r.trim().is_empty()),
        })
    }
}

fn first_non_empty<'a>(candidates: &[&'a Option<String>]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|c| c.as_deref())
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn generate_refund_no(order_no: &str) -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    let refund_no = format!("RF{}{}", order_no, &suffix[..8]);
    // processors cap out_refund_no at 64 chars
    refund_no.chars().take(64).collect()
}
