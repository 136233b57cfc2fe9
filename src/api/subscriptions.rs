// src/api/subscriptions.rs

use actix_web::{get, post, web, HttpResponse};

use crate::error::AppError;
use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/subscriptions",
    tag = "subscriptions",
    responses(
        (status = 200, description = "Subscriptions of the current user", body = [crate::models::Subscription]),
        (status = 500, description = "Database error")
    )
)]
#[get("/subscriptions")]
pub async fn list_subscriptions(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> Result<HttpResponse, AppError> {
    let subs = db::list_user_subscriptions(&state.pool, *user_id).await?;
    Ok(HttpResponse::Ok().json(subs))
}

// Отмена не возвращает деньги: подписка просто помечается cancelled.
#[utoipa::path(
    post,
    path = "/api/subscriptions/{id}/cancel",
    tag = "subscriptions",
    params(("id" = i32, Path, description = "Subscription id")),
    responses(
        (status = 200, description = "Subscription cancelled", body = crate::models::Subscription),
        (status = 404, description = "Subscription not found or belongs to another user")
    )
)]
#[post("/subscriptions/{id}/cancel")]
pub async fn cancel_subscription(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    path: web::Path<i32>,
) -> Result<HttpResponse, AppError> {
    let subscription_id = path.into_inner();

    let sub = db::cancel_user_subscription(&state.pool, *user_id, subscription_id)
        .await?
        .ok_or_else(|| AppError::NotFound("subscription not found".into()))?;

    log::info!("subscription id={} cancelled by user_id={}", sub.id, sub.user_id);
    Ok(HttpResponse::Ok().json(sub))
}
