use httpmock::Method::GET;
use httpmock::MockServer;
use serde_json::json;
use sqlx::{PgPool, Row};

use promptkat_payments::api::nowpayments_client::NowPaymentsClient;
use promptkat_payments::db::list_pollable_payments;
use promptkat_payments::queue::handle_check_message;
use promptkat_payments::reconcile::Outcome;
use promptkat_payments::status::PaymentStatus;

mod support;

async fn age_payment(pool: &PgPool, payment_id: &str, created_hours_ago: i32, updated_minutes_ago: i32) {
    sqlx::query(
        r#"UPDATE payments
           SET created_at = NOW() - make_interval(hours => $2),
               updated_at = NOW() - make_interval(mins => $3)
           WHERE payment_id = $1"#,
    )
    .bind(payment_id)
    .bind(created_hours_ago)
    .bind(updated_minutes_ago)
    .execute(pool)
    .await
    .expect("age payment");
}

#[actix_web::test]
async fn pollable_payments_skip_terminal_and_stale_oldest_update_first() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;

    support::insert_payment(pool, "fresh-waiting", "waiting").await;
    support::insert_payment(pool, "fresh-confirming", "confirming").await;
    support::insert_payment(pool, "partial", "partially_paid").await;
    support::insert_payment(pool, "done", "finished").await;
    support::insert_payment(pool, "gone", "expired").await;
    support::insert_payment(pool, "old-waiting", "waiting").await;

    age_payment(pool, "fresh-waiting", 1, 5).await;
    age_payment(pool, "fresh-confirming", 2, 30).await;
    age_payment(pool, "partial", 3, 20).await;
    age_payment(pool, "done", 1, 60).await;
    age_payment(pool, "gone", 1, 90).await;
    age_payment(pool, "old-waiting", 48, 120).await;

    let ids = list_pollable_payments(pool, 50, 24).await.expect("list");
    assert_eq!(ids, vec!["fresh-confirming", "partial", "fresh-waiting"]);

    let first = list_pollable_payments(pool, 2, 24).await.expect("list");
    assert_eq!(first, vec!["fresh-confirming", "partial"]);

    let wider = list_pollable_payments(pool, 50, 72).await.expect("list");
    assert_eq!(wider.first().map(String::as_str), Some("old-waiting"));
    assert_eq!(wider.len(), 4);
}

#[actix_web::test]
async fn check_message_polls_provider_and_completes_purchase() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;

    let buyer = support::insert_user(pool, "poll@promptkat.dev").await;
    let prompt = support::insert_prompt(pool, "Poster prompt", "19.99", None).await;
    let payment_row = support::insert_payment(pool, "6001", "confirming").await;
    let purchase = support::insert_purchase(pool, buyer, prompt, payment_row).await;

    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/payment/6001")
                .header("x-api-key", "test-api-key");
            then.status(200).json_body(json!({
                "payment_id": 6001,
                "payment_status": "finished",
                "pay_address": "addr",
                "pay_amount": 0.0004,
                "actually_paid": 0.0004,
                "pay_currency": "btc"
            }));
        })
        .await;

    let client = NowPaymentsClient::new("test-api-key", &server.url(""));
    let outcome = handle_check_message(pool, &client, br#"{"payment_id":"6001"}"#)
        .await
        .expect("check message");
    mock.assert_async().await;

    match outcome {
        Some(Outcome::Applied { previous, current, purchases, .. }) => {
            assert_eq!(previous, Some(PaymentStatus::Confirming));
            assert_eq!(current, PaymentStatus::Finished);
            assert_eq!(purchases, 1);
        }
        other => panic!("unexpected outcome: {other:?}"),
    }

    let row = sqlx::query("SELECT status, completed_at IS NOT NULL AS done FROM purchases WHERE id = $1")
        .bind(purchase)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("status"), "completed");
    assert!(row.get::<bool, _>("done"));

    let row = sqlx::query("SELECT payment_status, actually_paid::text AS paid FROM payments WHERE id = $1")
        .bind(payment_row)
        .fetch_one(pool)
        .await
        .unwrap();
    assert_eq!(row.get::<String, _>("payment_status"), "finished");
    assert_eq!(row.get::<Option<String>, _>("paid").as_deref(), Some("0.0004"));
}

#[actix_web::test]
async fn check_message_skips_unknown_provider_status() {
    let Some(test_db) = support::init_test_db().await else { return };
    let pool = &test_db.pool;

    support::insert_payment(pool, "6002", "waiting").await;

    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/payment/6002");
            then.status(200).json_body(json!({
                "payment_id": 6002,
                "payment_status": "on_hold"
            }));
        })
        .await;

    let client = NowPaymentsClient::new("test-api-key", &server.url(""));
    let outcome = handle_check_message(pool, &client, br#"{"payment_id":"6002"}"#)
        .await
        .expect("check message");
    assert!(outcome.is_none());

    let status: String = sqlx::query("SELECT payment_status FROM payments WHERE payment_id = '6002'")
        .fetch_one(pool)
        .await
        .unwrap()
        .get("payment_status");
    assert_eq!(status, "waiting");
}

#[actix_web::test]
async fn check_message_rejects_malformed_payload() {
    let client = NowPaymentsClient::new("test-api-key", "http://127.0.0.1:1");
    let result = handle_check_message(&support::lazy_pool(), &client, b"not json").await;
    assert!(result.is_err());
}
