use crate::domain::result::TradeStatus;

/// Total mapping of the processor's `trade_state` vocabulary.
pub fn map_trade_state(state: &str) -> TradeStatus {
    match state {
        "SUCCESS" => TradeStatus::Paid,
        "REFUND" => TradeStatus::Refunded,
        "NOTPAY" => TradeStatus::Pending,
        "CLOSED" => TradeStatus::Closed,
        "REVOKED" => TradeStatus::Cancelled,
        "USERPAYING" => TradeStatus::Paying,
        "PAYERROR" => TradeStatus::Failed,
        _ => TradeStatus::Unknown,
    }
}
