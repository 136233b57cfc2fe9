use actix_web::test::TestRequest;
use actix_web::{test, web, App};

use promptkat_payments::api::ipn::{sign_hmac_sha512_hex, sorted_payload};
use promptkat_payments::api::webhooks::nowpayments_ipn;

mod support;

async fn call_ipn(body: &'static [u8], signature: Option<String>) -> (u16, serde_json::Value) {
    let state = web::Data::new(support::build_state(support::lazy_pool(), "http://127.0.0.1:1"));
    let app = test::init_service(App::new().app_data(state).service(nowpayments_ipn)).await;

    let mut req = TestRequest::post()
        .uri("/api/payments/ipn")
        .insert_header(("content-type", "application/json"))
        .set_payload(body);
    if let Some(sig) = signature {
        req = req.insert_header(("x-nowpayments-sig", sig));
    }

    let resp = test::call_service(&app, req.to_request()).await;
    let status = resp.status().as_u16();
    let body = test::read_body(resp).await;
    let json = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, json)
}

fn sign(body: &[u8]) -> String {
    sign_hmac_sha512_hex(support::IPN_SECRET, &sorted_payload(body).unwrap())
}

#[actix_web::test]
async fn ipn_without_signature_is_unauthorized() {
    let (status, json) = call_ipn(br#"{"payment_id":1,"payment_status":"finished"}"#, None).await;
    assert_eq!(status, 401);
    assert_eq!(json["error"], "missing signature");
}

#[actix_web::test]
async fn ipn_with_wrong_signature_is_unauthorized() {
    let body: &[u8] = br#"{"payment_id":1,"payment_status":"finished"}"#;
    let bad = sign_hmac_sha512_hex("someone-else", &sorted_payload(body).unwrap());
    let (status, json) = call_ipn(br#"{"payment_id":1,"payment_status":"finished"}"#, Some(bad)).await;
    assert_eq!(status, 401);
    assert_eq!(json["error"], "invalid signature");
}

#[actix_web::test]
async fn ipn_with_invalid_json_is_bad_request() {
    let (status, _) = call_ipn(b"payment_id=1", Some("00".into())).await;
    assert_eq!(status, 400);
}

#[actix_web::test]
async fn ipn_with_unknown_status_is_acknowledged_and_ignored() {
    let body: &'static [u8] = br#"{"payment_id":1,"payment_status":"on_hold"}"#;
    let (status, json) = call_ipn(body, Some(sign(body))).await;
    assert_eq!(status, 200);
    assert_eq!(json["ignored"], true);
    assert_eq!(json["reason"], "unknown status");
}

#[actix_web::test]
async fn ipn_without_payment_id_is_acknowledged_and_ignored() {
    let body: &'static [u8] = br#"{"payment_status":"finished"}"#;
    let (status, json) = call_ipn(body, Some(sign(body))).await;
    assert_eq!(status, 200);
    assert_eq!(json["reason"], "missing payment_id");
}
