// src/models.rs

use chrono::{DateTime, Utc};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Serialize)]
pub struct Prompt {
    pub id: i32,
    pub title: String,
    pub price: String,
    pub seller_id: Option<i32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Payment {
    pub id: i32,
    pub payment_id: String, // id в NOWPayments
    pub payment_status: String,
    pub pay_address: Option<String>,
    pub pay_amount: Option<String>,
    pub pay_currency: String,
    pub price_amount: String,
    pub price_currency: String,
    pub actually_paid: Option<String>,
    pub order_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Purchase {
    pub id: i32,
    pub user_id: i32,
    pub prompt_id: i32,
    pub payment_id: Option<i32>,
    pub amount: String,
    pub status: String, // pending | completed | failed
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Subscription {
    pub id: i32,
    pub user_id: i32,
    pub plan: String,   // monthly | yearly
    pub status: String, // pending | active | cancelled
    pub payment_id: Option<i32>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub cancelled_at: Option<DateTime<Utc>>,
}
