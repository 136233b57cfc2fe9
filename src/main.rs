// src/main.rs
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use dotenvy::dotenv;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::EnvFilter;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use promptkat_payments::api::nowpayments_client::NowPaymentsClient;
use promptkat_payments::config::Config;
use promptkat_payments::{api, docs, queue, AppState};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    // log::* из хендлеров попадает сюда через мост tracing-log
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("promptkat_payments=info,actix_web=info")),
        )
        .init();

    let config = Config::from_env().map_err(|e| {
        log::error!("configuration error: {e}");
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e)
    })?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await
        .expect("Failed to connect to DB");

    sqlx::migrate!()
        .run(&pool)
        .await
        .expect("Failed to run migrations");

    let nowpayments = NowPaymentsClient::new(&config.nowpayments_api_key, &config.nowpayments_api_url);

    tokio::spawn(queue::start_payment_status_queue(
        pool.clone(),
        nowpayments.clone(),
        config.poller.clone(),
    ));

    let state = web::Data::new(AppState {
        pool,
        nowpayments,
        ipn_secret: config.nowpayments_ipn_secret.clone(),
        callback_base_url: config.callback_base_url.clone(),
        monthly_plan_price: config.monthly_plan_price,
        yearly_plan_price: config.yearly_plan_price,
    });

    let jwt_secret = config.jwt_secret.clone();
    log::info!("listening on {}", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(Logger::default())
            .service(api::health::index)
            .service(api::health::health)
            .service(
                SwaggerUi::new("/docs/{_:.*}")
                    .url("/api-docs/openapi.json", docs::ApiDoc::openapi()),
            )
            // Вебхук (публичный, проверка по подписи). Регистрируем до скоупа /api,
            // иначе его перехватит JWT middleware.
            .service(api::webhooks::nowpayments_ipn)
            // Защищённые роуты
            .service(
                web::scope("/api")
                    .wrap(api::auth::JwtMiddleware::new(jwt_secret.clone()))
                    .service(api::payments::create_payment)
                    .service(api::payments::currencies)
                    .service(api::payments::estimate)
                    .service(api::payments::min_amount)
                    .service(api::payments::payment_status)
                    .service(api::purchases::list_purchases)
                    .service(api::subscriptions::list_subscriptions)
                    .service(api::subscriptions::cancel_subscription),
            )
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await
}
