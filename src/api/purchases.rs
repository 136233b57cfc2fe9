// src/api/purchases.rs

use actix_web::{get, web, HttpResponse};

use crate::error::AppError;
use crate::{db, AppState};

#[utoipa::path(
    get,
    path = "/api/purchases",
    tag = "purchases",
    responses(
        (status = 200, description = "Purchases of the current user, newest first", body = [crate::models::Purchase]),
        (status = 500, description = "Database error")
    )
)]
#[get("/purchases")]
pub async fn list_purchases(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
) -> Result<HttpResponse, AppError> {
    let purchases = db::list_user_purchases(&state.pool, *user_id).await?;
    Ok(HttpResponse::Ok().json(purchases))
}
