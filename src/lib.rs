pub mod api;
pub mod config;
pub mod db;
pub mod docs;
pub mod error;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod status;

use api::nowpayments_client::NowPaymentsClient;
use sqlx::PgPool;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub nowpayments: NowPaymentsClient,
    pub ipn_secret: String,
    pub callback_base_url: String,
    pub monthly_plan_price: f64,
    pub yearly_plan_price: f64,
}
