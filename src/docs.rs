use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::payments::create_payment,
        crate::api::payments::payment_status,
        crate::api::payments::currencies,
        crate::api::payments::estimate,
        crate::api::payments::min_amount,
        crate::api::purchases::list_purchases,
        crate::api::subscriptions::list_subscriptions,
        crate::api::subscriptions::cancel_subscription,
        crate::api::webhooks::nowpayments_ipn
    ),
    components(
        schemas(
            crate::api::payments::CreatePaymentBody,
            crate::api::payments::CreatePaymentResponse,
            crate::api::payments::PaymentStatusResponse,
            crate::api::nowpayments_client::PaymentResponse,
            crate::api::nowpayments_client::EstimateResponse,
            crate::api::nowpayments_client::MinAmountResponse,
            crate::models::Payment,
            crate::models::Purchase,
            crate::models::Subscription,
            crate::reconcile::Outcome,
            crate::status::PaymentStatus,
            crate::status::SubscriptionPlan
        )
    ),
    tags(
        (name = "payments", description = "Crypto payments via NOWPayments"),
        (name = "purchases", description = "Prompt purchases of the current user"),
        (name = "subscriptions", description = "PromptKat subscriptions"),
        (name = "webhooks", description = "IPN callbacks from NOWPayments")
    )
)]
pub struct ApiDoc;
