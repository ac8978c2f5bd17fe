mod common;

use common::{v2_reply, wechat_v2_config, V2_KEY};
use rust_decimal::Decimal;
use scanpay_gateway::config::SignType;
use scanpay_gateway::gateways::wechat_v2::{sign, xml, WechatV2Gateway};
use scanpay_gateway::{ErrorCode, OrderData, PaymentProvider, RefundData, TradeStatus};
use std::collections::BTreeMap;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn gateway(server: &MockServer) -> WechatV2Gateway {
    WechatV2Gateway::new(wechat_v2_config(&server.uri())).unwrap()
}

async fn sent_fields(server: &MockServer) -> BTreeMap<String, String> {
    let requests = server.received_requests().await.unwrap();
    let body = String::from_utf8(requests.last().unwrap().body.clone()).unwrap();
    xml::decode(&body).unwrap()
}

#[tokio::test]
async fn create_qr_payment_returns_pending_code_url() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay/unifiedorder"))
        .and(header("content-type", "application/xml; charset=utf-8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("return_msg", "OK"),
                ("result_code", "SUCCESS"),
                ("appid", "wx8888888888888888"),
                ("mch_id", "1900000109"),
                ("nonce_str", "5K8264ILTKCH16CQ"),
                ("trade_type", "NATIVE"),
                ("prepay_id", "wx201410272009395522657a690389285100"),
                ("code_url", "weixin://wxpay/bizpayurl?pr=abc123"),
            ],
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let gw = gateway(&server).await;
    let order = OrderData::new("PAY20240101000001", 100, "test item");
    let result = gw.create_qr_payment(&order).await;

    assert!(result.is_success(), "{}", result.message());
    assert_eq!(result.status(), Some(TradeStatus::Pending));
    assert_eq!(result.amount_major_units(), Some(Decimal::new(100, 2)));
    assert_eq!(result.qr_code(), Some("weixin://wxpay/bizpayurl?pr=abc123"));
    assert_eq!(result.merchant_order_id(), Some("PAY20240101000001"));

    let sent = sent_fields(&server).await;
    assert_eq!(sent.get("total_fee").map(String::as_str), Some("100"));
    assert_eq!(sent.get("trade_type").map(String::as_str), Some("NATIVE"));
    assert_eq!(sent.get("out_trade_no").map(String::as_str), Some("PAY20240101000001"));
    assert_eq!(sent.get("nonce_str").map(String::len), Some(32));
    assert!(!sent.contains_key("time_expire"));
    assert_eq!(sign::verify(&sent, V2_KEY, SignType::Md5), Some(true));
}

#[tokio::test]
async fn expiry_is_sent_when_given() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay/unifiedorder"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("result_code", "SUCCESS"),
                ("code_url", "weixin://wxpay/bizpayurl?pr=x"),
            ],
            false,
        )))
        .mount(&server)
        .await;

    let expire = chrono::Utc::now() + chrono::Duration::minutes(30);
    let order = OrderData::new("PAY2", 1, "x").with_expire_time(expire);
    assert!(gateway(&server).await.create_qr_payment(&order).await.is_success());

    let sent = sent_fields(&server).await;
    let time_expire = sent.get("time_expire").unwrap();
    assert_eq!(time_expire.len(), 14);
    assert!(time_expire.bytes().all(|b| b.is_ascii_digit()));
}

#[tokio::test]
async fn missing_order_fields_never_reach_the_processor() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = gateway(&server)
        .await
        .create_qr_payment(&OrderData::default())
        .await;

    assert!(!result.is_success());
    assert_eq!(result.error_code(), Some(ErrorCode::ValidationError));
    for field in ["order_no", "amount", "subject"] {
        assert!(result.message().contains(field), "{}", result.message());
    }
}

#[tokio::test]
async fn business_failure_surfaces_processor_description() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay/unifiedorder"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("result_code", "FAIL"),
                ("err_code", "ORDERPAID"),
                ("err_code_des", "order already paid"),
            ],
            true,
        )))
        .mount(&server)
        .await;

    let result = gateway(&server)
        .await
        .create_qr_payment(&OrderData::new("PAY3", 100, "x"))
        .await;

    assert!(!result.is_success());
    assert_eq!(result.error_code(), Some(ErrorCode::BusinessError));
    assert_eq!(result.message(), "order already paid");
    assert_eq!(result.qr_code(), None);
}

#[tokio::test]
async fn envelope_failure_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[("return_code", "FAIL"), ("return_msg", "invalid signature")],
            false,
        )))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY4").await;
    assert_eq!(result.error_code(), Some(ErrorCode::ApiError));
    assert_eq!(result.message(), "invalid signature");
}

#[tokio::test]
async fn forged_response_signature_is_rejected() {
    let server = MockServer::start().await;
    let mut reply: BTreeMap<String, String> = [
        ("return_code", "SUCCESS"),
        ("result_code", "SUCCESS"),
        ("trade_state", "SUCCESS"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    sign::attach(&mut reply, "not-the-merchant-key", SignType::Md5);
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(xml::encode(&reply).unwrap()))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY5").await;
    assert_eq!(result.error_code(), Some(ErrorCode::ApiError));
    assert!(result.message().contains("signature"));
}

#[tokio::test]
async fn http_error_without_envelope_is_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY6").await;
    assert_eq!(result.error_code(), Some(ErrorCode::NetworkError));
    assert_eq!(result.message(), "processor answered HTTP 502");
}

#[tokio::test]
async fn garbled_reply_hides_parser_detail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<xml><return_code>SUC"))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY6").await;
    assert_eq!(result.error_code(), Some(ErrorCode::ApiError));
    assert_eq!(result.message(), xml::MALFORMED_MESSAGE);
}

#[tokio::test]
async fn unreachable_processor_is_network_error() {
    let gw = WechatV2Gateway::new(wechat_v2_config("http://127.0.0.1:9")).unwrap();
    let result = gw.query_order("PAY7").await;
    assert!(!result.is_success());
    assert_eq!(result.error_code(), Some(ErrorCode::NetworkError));
    assert_eq!(result.message(), "processor unreachable");
    assert!(!result.message().contains("127.0.0.1"));
}

#[tokio::test]
async fn query_maps_trade_state_and_amount() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay/orderquery"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("result_code", "SUCCESS"),
                ("out_trade_no", "PAY8"),
                ("transaction_id", "4200000000202401010000000001"),
                ("trade_state", "SUCCESS"),
                ("trade_state_desc", "payment succeeded"),
                ("total_fee", "2550"),
            ],
            true,
        )))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY8").await;
    assert!(result.is_success());
    assert_eq!(result.status(), Some(TradeStatus::Paid));
    assert_eq!(result.amount_major_units(), Some(Decimal::new(2550, 2)));
    assert_eq!(result.processor_trade_id(), Some("4200000000202401010000000001"));
    assert_eq!(result.raw_data()["trade_state"], "SUCCESS");
    assert!(result.raw_data().get("sign").is_none());
}

#[tokio::test]
async fn unknown_trade_state_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("result_code", "SUCCESS"),
                ("trade_state", "ACCEPT"),
            ],
            true,
        )))
        .mount(&server)
        .await;

    let result = gateway(&server).await.query_order("PAY9").await;
    assert!(result.is_success());
    assert_eq!(result.status(), Some(TradeStatus::Unknown));
}

#[tokio::test]
async fn partial_refund_is_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secapi/pay/refund"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[
                ("return_code", "SUCCESS"),
                ("result_code", "SUCCESS"),
                ("out_trade_no", "PAY10"),
                ("out_refund_no", "RF-PAY10-1"),
                ("refund_id", "50000000382019052709732678859"),
                ("refund_fee", "50"),
                ("total_fee", "100"),
            ],
            true,
        )))
        .expect(1)
        .mount(&server)
        .await;

    let refund = RefundData {
        refund_no: Some("RF-PAY10-1".to_string()),
        reason: Some("customer request".to_string()),
        ..RefundData::new("PAY10", 50, 100)
    };
    let result = gateway(&server).await.refund(&refund).await;

    assert!(result.is_success(), "{}", result.message());
    assert!(matches!(
        result.status(),
        Some(TradeStatus::Processing | TradeStatus::Refunded)
    ));
    assert_eq!(result.amount_major_units(), Some(Decimal::new(50, 2)));

    let sent = sent_fields(&server).await;
    assert_eq!(sent.get("refund_fee").map(String::as_str), Some("50"));
    assert_eq!(sent.get("total_fee").map(String::as_str), Some("100"));
    assert_eq!(sent.get("refund_desc").map(String::as_str), Some("customer request"));
}

#[tokio::test]
async fn refund_above_total_is_rejected_locally() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = gateway(&server)
        .await
        .refund(&RefundData::new("PAY11", 150, 100))
        .await;
    assert!(!result.is_success());
    assert_eq!(result.error_code(), Some(ErrorCode::ValidationError));
}

#[tokio::test]
async fn close_tolerates_empty_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/pay/closeorder"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let result = gateway(&server).await.close_order("PAY12").await;
    assert!(result.is_success(), "{}", result.message());
    assert_eq!(result.status(), Some(TradeStatus::Closed));
}

#[tokio::test]
async fn refund_with_empty_body_is_not_accepted() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/secapi/pay/refund"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let result = gateway(&server)
        .await
        .refund(&RefundData::new("PAY1", 50, 100))
        .await;
    assert!(!result.is_success());
    assert_eq!(result.error_code(), Some(ErrorCode::ApiError));
    assert_eq!(result.status(), None);
    assert_eq!(result.message(), "empty response");
}

#[tokio::test]
async fn query_and_create_with_empty_body_fail() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    let gw = gateway(&server).await;

    let query = gw.query_order("PAY1").await;
    assert!(!query.is_success());
    assert_eq!(query.error_code(), Some(ErrorCode::ApiError));

    let create = gw
        .create_qr_payment(&OrderData::new("PAY1", 100, "test item"))
        .await;
    assert!(!create.is_success());
    assert_eq!(create.error_code(), Some(ErrorCode::ApiError));
}

#[tokio::test]
async fn every_request_gets_a_new_nonce() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_string(v2_reply(
            &[("return_code", "SUCCESS"), ("result_code", "SUCCESS")],
            true,
        )))
        .mount(&server)
        .await;

    let gw = gateway(&server).await;
    gw.close_order("PAY13").await;
    gw.close_order("PAY13").await;

    let requests = server.received_requests().await.unwrap();
    let nonces: Vec<String> = requests
        .iter()
        .map(|r| {
            let fields = xml::decode(std::str::from_utf8(&r.body).unwrap()).unwrap();
            fields["nonce_str"].clone()
        })
        .collect();
    assert_eq!(nonces.len(), 2);
    assert_ne!(nonces[0], nonces[1]);
}
