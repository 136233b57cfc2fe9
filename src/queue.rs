// src/queue.rs
//
// Фоновый опрос незавершённых платежей: продюсер раз в интервал кладёт payment_id
// в RabbitMQ, консьюмер спрашивает NOWPayments и сводит статус.

use futures_util::StreamExt;
use lapin::{
    options::{BasicAckOptions, BasicConsumeOptions, BasicPublishOptions, QueueDeclareOptions},
    types::FieldTable,
    BasicProperties, Channel, Connection, ConnectionProperties,
};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

use crate::api::nowpayments_client::NowPaymentsClient;
use crate::config::PollerConfig;
use crate::db;
use crate::reconcile::{self, Outcome, StatusUpdate, UpdateSource};
use crate::status::PaymentStatus;

#[derive(Debug, Serialize, Deserialize)]
pub struct PaymentCheckMessage {
    pub payment_id: String,
}

const QUEUE_NAME: &str = "nowpayments.status.check";

pub async fn start_payment_status_queue(pool: PgPool, client: NowPaymentsClient, config: PollerConfig) {
    let Some(rabbit_url) = config.rabbitmq_url.clone() else {
        log::warn!("RABBITMQ_URL not set, skipping payment status queue");
        return;
    };

    let conn = match Connection::connect(&rabbit_url, ConnectionProperties::default()).await {
        Ok(c) => c,
        Err(e) => {
            log::error!("rabbitmq connect error: {e}");
            return;
        }
    };

    let channel = match conn.create_channel().await {
        Ok(c) => c,
        Err(e) => {
            log::error!("rabbitmq channel error: {e}");
            return;
        }
    };

    if let Err(e) = channel
        .queue_declare(QUEUE_NAME, QueueDeclareOptions::default(), FieldTable::default())
        .await
    {
        log::error!("rabbitmq declare queue error: {e}");
        return;
    }

    log::info!(
        "payment status queue started interval={:?} batch_size={} max_age_hours={}",
        config.interval,
        config.batch_size,
        config.max_age_hours
    );

    let producer_pool = pool.clone();
    let producer_channel = channel.clone();
    tokio::spawn(async move {
        // держим соединение живым, пока работает продюсер
        let _conn = conn;
        loop {
            if let Err(e) = enqueue_pending_payments(
                &producer_pool,
                &producer_channel,
                config.batch_size,
                config.max_age_hours,
            )
            .await
            {
                log::error!("queue enqueue error: {e}");
            }
            tokio::time::sleep(config.interval).await;
        }
    });

    let consumer_pool = pool;
    tokio::spawn(async move {
        if let Err(e) = consume_checks(&consumer_pool, &channel, &client).await {
            log::error!("queue consume error: {e}");
        }
    });
}

async fn enqueue_pending_payments(
    pool: &PgPool,
    channel: &Channel,
    batch_size: i64,
    max_age_hours: i64,
) -> Result<usize, String> {
    let payment_ids = db::list_pollable_payments(pool, batch_size, max_age_hours)
        .await
        .map_err(|e| e.to_string())?;

    let count = payment_ids.len();
    for payment_id in payment_ids {
        let payload =
            serde_json::to_vec(&PaymentCheckMessage { payment_id }).map_err(|e| e.to_string())?;
        channel
            .basic_publish(
                "",
                QUEUE_NAME,
                BasicPublishOptions::default(),
                &payload,
                BasicProperties::default(),
            )
            .await
            .map_err(|e| e.to_string())?
            .await
            .map_err(|e| e.to_string())?;
    }

    Ok(count)
}

async fn consume_checks(
    pool: &PgPool,
    channel: &Channel,
    client: &NowPaymentsClient,
) -> Result<(), String> {
    let mut consumer = channel
        .basic_consume(
            QUEUE_NAME,
            "nowpayments-status-consumer",
            BasicConsumeOptions::default(),
            FieldTable::default(),
        )
        .await
        .map_err(|e| e.to_string())?;

    while let Some(delivery) = consumer.next().await {
        let delivery = match delivery {
            Ok(d) => d,
            Err(e) => {
                log::error!("rabbitmq delivery error: {e}");
                continue;
            }
        };

        if let Err(e) = handle_check_message(pool, client, &delivery.data).await {
            log::error!("handle payment check error: {e}");
        }

        // без ретраев: следующий тик продюсера положит платёж снова
        let _ = delivery.ack(BasicAckOptions::default()).await;
    }

    Ok(())
}

pub async fn handle_check_message(
    pool: &PgPool,
    client: &NowPaymentsClient,
    data: &[u8],
) -> Result<Option<Outcome>, String> {
    let msg: PaymentCheckMessage = serde_json::from_slice(data).map_err(|e| e.to_string())?;
    let remote = client
        .get_payment_status(&msg.payment_id)
        .await
        .map_err(|e| e.to_string())?;

    let status = match remote.payment_status.parse::<PaymentStatus>() {
        Ok(s) => s,
        Err(e) => {
            log::warn!("poll payment_id={}: {e}", msg.payment_id);
            return Ok(None);
        }
    };

    let update = StatusUpdate {
        payment_id: msg.payment_id,
        status,
        actually_paid: remote.actually_paid,
        pay_amount: remote.pay_amount,
        source: UpdateSource::Poll,
    };

    reconcile::apply_status_update(pool, &update)
        .await
        .map(Some)
        .map_err(|e| e.to_string())
}
