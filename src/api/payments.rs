// src/api/payments.rs

use actix_web::{get, post, web, HttpResponse};
use serde::{Deserialize, Serialize};
use serde_json::json;
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;

use crate::api::nowpayments_client::{CreatePaymentRequest, EstimateResponse, MinAmountResponse};
use crate::error::AppError;
use crate::models::Payment;
use crate::reconcile::{self, Outcome, StatusUpdate, UpdateSource};
use crate::status::{PaymentStatus, SubscriptionPlan};
use crate::{db, AppState};

const PRICE_CURRENCY: &str = "usd";

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePaymentBody {
    /// Покупка промпта. Взаимоисключающе с `plan`.
    pub prompt_id: Option<i32>,

    /// Оформление подписки (monthly/yearly).
    pub plan: Option<SubscriptionPlan>,

    /// Криптовалюта оплаты в терминах NOWPayments (btc, eth, usdttrc20, ...).
    pub pay_currency: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatePaymentResponse {
    pub payment_id: String,
    pub payment_status: String,
    pub pay_address: Option<String>,
    pub pay_amount: Option<String>,
    pub pay_currency: String,
    pub price_amount: String,
    pub price_currency: String,
    pub order_id: String,
    pub purchase_id: Option<i32>,
    pub subscription_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub payment: Payment,
    pub outcome: Option<Outcome>,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct EstimateQuery {
    pub amount: f64,
    pub currency_from: String,
    pub currency_to: String,
}

#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct MinAmountQuery {
    pub currency_from: String,
    pub currency_to: String,
}

#[derive(Clone, Copy)]
enum Order {
    Prompt { prompt_id: i32 },
    Subscription { plan: SubscriptionPlan },
}

fn plan_price(state: &AppState, plan: SubscriptionPlan) -> f64 {
    match plan {
        SubscriptionPlan::Monthly => state.monthly_plan_price,
        SubscriptionPlan::Yearly => state.yearly_plan_price,
    }
}

/// Создаёт платёж в NOWPayments (POST /payment) и сохраняет его вместе с
/// pending-покупкой или pending-подпиской.
#[utoipa::path(
    post,
    path = "/api/payments",
    tag = "payments",
    request_body = CreatePaymentBody,
    responses(
        (status = 201, description = "Payment created", body = CreatePaymentResponse),
        (status = 400, description = "Invalid request or prompt already purchased"),
        (status = 404, description = "Prompt not found"),
        (status = 502, description = "NOWPayments request failed")
    )
)]
#[post("/payments")]
pub async fn create_payment(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    payload: web::Json<CreatePaymentBody>,
) -> Result<HttpResponse, AppError> {
    let user_id = *user_id;
    let payload = payload.into_inner();

    let pay_currency = payload.pay_currency.trim().to_lowercase();
    if pay_currency.is_empty() {
        return Err(AppError::BadRequest("pay_currency is required".into()));
    }

    // 1) что оплачиваем и за сколько
    let (order, price_amount, description) = match (payload.prompt_id, payload.plan) {
        (Some(prompt_id), None) => {
            let prompt = db::get_prompt_for_sale(&state.pool, prompt_id)
                .await?
                .ok_or_else(|| AppError::NotFound("prompt not found".into()))?;

            if prompt.seller_id == Some(user_id) {
                return Err(AppError::BadRequest("cannot buy your own prompt".into()));
            }
            if db::has_completed_purchase(&state.pool, user_id, prompt_id).await? {
                return Err(AppError::BadRequest("prompt already purchased".into()));
            }

            let price = prompt
                .price
                .parse::<f64>()
                .map_err(|e| AppError::Internal(format!("prompt {prompt_id} price {:?}: {e}", prompt.price)))?;

            (Order::Prompt { prompt_id }, price, format!("Prompt: {}", prompt.title))
        }
        (None, Some(plan)) => (
            Order::Subscription { plan },
            plan_price(&state, plan),
            format!("PromptKat {} subscription", plan.as_str()),
        ),
        _ => {
            return Err(AppError::BadRequest(
                "exactly one of prompt_id or plan is required".into(),
            ))
        }
    };

    if price_amount <= 0.0 {
        return Err(AppError::BadRequest("nothing to pay for".into()));
    }

    let order_id = match order {
        Order::Prompt { prompt_id } => format!("prompt-{prompt_id}-{}", Uuid::new_v4()),
        Order::Subscription { plan } => format!("sub-{}-{}", plan.as_str(), Uuid::new_v4()),
    };
    let price_amount_str = format!("{price_amount:.2}");

    // 2) платёж в NOWPayments
    log::info!(
        "nowpayments create payment user_id={} order_id={} amount={} {} pay_currency={}",
        user_id,
        order_id,
        price_amount_str,
        PRICE_CURRENCY,
        pay_currency
    );
    let remote = state
        .nowpayments
        .create_payment(&CreatePaymentRequest {
            price_amount,
            price_currency: PRICE_CURRENCY.to_string(),
            pay_currency: pay_currency.clone(),
            order_id: order_id.clone(),
            order_description: Some(description.clone()),
            ipn_callback_url: Some(format!(
                "{}/api/payments/ipn",
                state.callback_base_url.trim_end_matches('/')
            )),
        })
        .await
        .map_err(|e| {
            log::error!("nowpayments create_payment error: {e} user_id={user_id} order_id={order_id}");
            AppError::Provider(e)
        })?;

    // 3) payment + покупка/подписка одной транзакцией
    let mut tx = state.pool.begin().await?;

    let payment_row_id = db::insert_payment(
        &mut tx,
        &remote,
        &price_amount_str,
        PRICE_CURRENCY,
        &pay_currency,
        &order_id,
        Some(&description),
    )
    .await?;

    let (purchase_id, subscription_id) = match order {
        Order::Prompt { prompt_id } => {
            let id = db::insert_pending_purchase(&mut tx, user_id, prompt_id, payment_row_id, &price_amount_str).await?;
            (Some(id), None)
        }
        Order::Subscription { plan } => {
            let id = db::insert_pending_subscription(&mut tx, user_id, plan, payment_row_id).await?;
            (None, Some(id))
        }
    };

    tx.commit().await?;

    Ok(HttpResponse::Created().json(CreatePaymentResponse {
        payment_id: remote.payment_id,
        payment_status: remote.payment_status,
        pay_address: remote.pay_address,
        pay_amount: remote.pay_amount,
        pay_currency: remote.pay_currency.unwrap_or(pay_currency),
        price_amount: price_amount_str,
        price_currency: PRICE_CURRENCY.to_string(),
        order_id,
        purchase_id,
        subscription_id,
    }))
}

/// Опрос статуса: спрашиваем NOWPayments и сводим результат с покупкой/подпиской.
#[utoipa::path(
    get,
    path = "/api/payments/{payment_id}",
    tag = "payments",
    params(("payment_id" = String, Path, description = "NOWPayments payment id")),
    responses(
        (status = 200, description = "Current payment state", body = PaymentStatusResponse),
        (status = 404, description = "Payment not found"),
        (status = 502, description = "NOWPayments request failed")
    )
)]
#[get("/payments/{payment_id}")]
pub async fn payment_status(
    state: web::Data<AppState>,
    user_id: web::ReqData<i32>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let payment_id = path.into_inner();

    if !db::payment_belongs_to(&state.pool, &payment_id, *user_id).await? {
        return Err(AppError::NotFound("payment not found".into()));
    }

    let remote = state.nowpayments.get_payment_status(&payment_id).await?;

    let outcome = match remote.payment_status.parse::<PaymentStatus>() {
        Ok(status) => {
            let update = StatusUpdate {
                payment_id: payment_id.clone(),
                status,
                actually_paid: remote.actually_paid,
                pay_amount: remote.pay_amount,
                source: UpdateSource::Poll,
            };
            Some(reconcile::apply_status_update(&state.pool, &update).await?)
        }
        Err(e) => {
            log::warn!("payment_id={payment_id}: {e}");
            None
        }
    };

    let payment = db::get_payment(&state.pool, &payment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("payment not found".into()))?;

    Ok(HttpResponse::Ok().json(PaymentStatusResponse { payment, outcome }))
}

#[utoipa::path(
    get,
    path = "/api/payments/currencies",
    tag = "payments",
    responses(
        (status = 200, description = "Currencies available for payment"),
        (status = 502, description = "NOWPayments request failed")
    )
)]
#[get("/payments/currencies")]
pub async fn currencies(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let currencies = state.nowpayments.get_currencies().await?;
    Ok(HttpResponse::Ok().json(json!({ "currencies": currencies })))
}

#[utoipa::path(
    get,
    path = "/api/payments/estimate",
    tag = "payments",
    params(EstimateQuery),
    responses(
        (status = 200, description = "Estimated amount in the target currency", body = EstimateResponse),
        (status = 400, description = "Amount must be positive"),
        (status = 502, description = "NOWPayments request failed")
    )
)]
#[get("/payments/estimate")]
pub async fn estimate(
    state: web::Data<AppState>,
    query: web::Query<EstimateQuery>,
) -> Result<HttpResponse, AppError> {
    if query.amount.is_nan() || query.amount <= 0.0 {
        return Err(AppError::BadRequest("amount must be positive".into()));
    }

    let estimate = state
        .nowpayments
        .get_estimate(query.amount, &query.currency_from, &query.currency_to)
        .await?;
    Ok(HttpResponse::Ok().json(estimate))
}

#[utoipa::path(
    get,
    path = "/api/payments/min-amount",
    tag = "payments",
    params(MinAmountQuery),
    responses(
        (status = 200, description = "Minimal payment amount for the pair", body = MinAmountResponse),
        (status = 502, description = "NOWPayments request failed")
    )
)]
#[get("/payments/min-amount")]
pub async fn min_amount(
    state: web::Data<AppState>,
    query: web::Query<MinAmountQuery>,
) -> Result<HttpResponse, AppError> {
    let min = state
        .nowpayments
        .get_min_amount(&query.currency_from, &query.currency_to)
        .await?;
    Ok(HttpResponse::Ok().json(min))
}
