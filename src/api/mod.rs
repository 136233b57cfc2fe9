pub mod auth;
pub mod health;
pub mod ipn;
pub mod nowpayments_client;
pub mod payments;
pub mod purchases;
pub mod subscriptions;
pub mod webhooks;
