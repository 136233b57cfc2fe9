// src/api/health.rs

use actix_web::{get, web, HttpResponse, Responder};
use serde_json::json;

use crate::{db, AppState};

#[get("/")]
pub async fn index() -> impl Responder {
    HttpResponse::Ok().body("Service ready!")
}

#[get("/health")]
pub async fn health(state: web::Data<AppState>) -> impl Responder {
    let database = match db::ping(&state.pool).await {
        Ok(()) => "ok".to_string(),
        Err(e) => {
            log::error!("health db ping error: {e}");
            "unavailable".to_string()
        }
    };

    let nowpayments = match state.nowpayments.api_status().await {
        Ok(message) => message,
        Err(e) => {
            log::warn!("health nowpayments status error: {e}");
            "unavailable".to_string()
        }
    };

    let body = json!({ "database": database, "nowpayments": nowpayments });
    if database == "ok" {
        HttpResponse::Ok().json(body)
    } else {
        HttpResponse::ServiceUnavailable().json(body)
    }
}
