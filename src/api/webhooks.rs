// src/api/webhooks.rs

use actix_web::{post, web, HttpRequest, HttpResponse};
use serde_json::json;

use crate::api::ipn::{normalize_ipn, verify_signature, SIGNATURE_HEADER};
use crate::reconcile::{self, StatusUpdate, UpdateSource};
use crate::status::PaymentStatus;
use crate::AppState;

pub fn extract_signature(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// IPN от NOWPayments.
///
/// Подпись проверяем по сырому телу, поэтому принимаем `web::Bytes`, а не `web::Json`.
/// На всё, что не является ошибкой БД, отвечаем 200, чтобы NOWPayments не ретраил бесконечно.
#[utoipa::path(
    post,
    path = "/api/payments/ipn",
    tag = "webhooks",
    request_body(content = String, description = "NOWPayments IPN payload (JSON)", content_type = "application/json"),
    params(("x-nowpayments-sig" = String, Header, description = "HMAC-SHA512 of the key-sorted payload")),
    responses(
        (status = 200, description = "Notification processed or ignored"),
        (status = 400, description = "Payload is not valid JSON"),
        (status = 401, description = "Missing or invalid signature"),
        (status = 500, description = "Database error, provider will retry")
    )
)]
#[post("/api/payments/ipn")]
pub async fn nowpayments_ipn(
    req: HttpRequest,
    body: web::Bytes,
    state: web::Data<AppState>,
) -> HttpResponse {
    let Some(signature) = extract_signature(&req) else {
        log::warn!("ipn without {SIGNATURE_HEADER} header");
        return HttpResponse::Unauthorized().json(json!({"error": "missing signature"}));
    };

    let raw: serde_json::Value = match serde_json::from_slice(&body) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("ipn body parse error: {e}");
            return HttpResponse::BadRequest().json(json!({"error": "invalid payload"}));
        }
    };

    if !verify_signature(&state.ipn_secret, &body, &signature) {
        log::warn!("ipn signature mismatch payment_id={:?}", raw.get("payment_id"));
        return HttpResponse::Unauthorized().json(json!({"error": "invalid signature"}));
    }

    let ipn = normalize_ipn(&raw);

    let Some(payment_id) = ipn.payment_id else {
        return HttpResponse::Ok().json(json!({"ok": true, "ignored": true, "reason": "missing payment_id"}));
    };

    let status = match ipn.payment_status.as_deref().map(str::parse::<PaymentStatus>) {
        Some(Ok(s)) => s,
        Some(Err(e)) => {
            log::warn!("ipn payment_id={payment_id}: {e}");
            return HttpResponse::Ok().json(json!({"ok": true, "ignored": true, "reason": "unknown status"}));
        }
        None => {
            return HttpResponse::Ok().json(json!({"ok": true, "ignored": true, "reason": "missing status"}));
        }
    };

    let update = StatusUpdate {
        payment_id: payment_id.clone(),
        status,
        actually_paid: ipn.actually_paid,
        pay_amount: ipn.pay_amount,
        source: UpdateSource::Ipn,
    };

    match reconcile::apply_status_update(&state.pool, &update).await {
        Ok(outcome) => HttpResponse::Ok().json(json!({"ok": true, "outcome": outcome})),
        Err(e) => {
            log::error!("ipn reconcile error payment_id={payment_id}: {e}");
            HttpResponse::InternalServerError().json(json!({"error": "database error"}))
        }
    }
}
