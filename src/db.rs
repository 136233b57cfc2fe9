// src/db.rs

use sqlx::postgres::PgRow;
use sqlx::{PgConnection, PgPool, Row};

use crate::api::nowpayments_client::PaymentResponse;
use crate::models::{Payment, Prompt, Purchase, Subscription};
use crate::status::{PaymentStatus, SubscriptionPlan};

fn payment_from_row(r: PgRow) -> Payment {
    Payment {
        id: r.get("id"),
        payment_id: r.get("payment_id"),
        payment_status: r.get("payment_status"),
        pay_address: r.get("pay_address"),
        pay_amount: r.get("pay_amount"),
        pay_currency: r.get("pay_currency"),
        price_amount: r.get("price_amount"),
        price_currency: r.get("price_currency"),
        actually_paid: r.get("actually_paid"),
        order_id: r.get("order_id"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
    }
}

fn subscription_from_row(r: PgRow) -> Subscription {
    Subscription {
        id: r.get("id"),
        user_id: r.get("user_id"),
        plan: r.get("plan"),
        status: r.get("status"),
        payment_id: r.get("payment_id"),
        current_period_start: r.get("current_period_start"),
        current_period_end: r.get("current_period_end"),
        created_at: r.get("created_at"),
        updated_at: r.get("updated_at"),
        cancelled_at: r.get("cancelled_at"),
    }
}

pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

pub async fn get_prompt_for_sale(pool: &PgPool, prompt_id: i32) -> Result<Option<Prompt>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, title, price::text AS price, seller_id
           FROM prompts
           WHERE id = $1 AND is_published = true"#,
    )
    .bind(prompt_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| Prompt {
        id: r.get("id"),
        title: r.get("title"),
        price: r.get("price"),
        seller_id: r.get("seller_id"),
    }))
}

pub async fn has_completed_purchase(pool: &PgPool, user_id: i32, prompt_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS(
               SELECT 1 FROM purchases
               WHERE user_id = $1 AND prompt_id = $2 AND status = 'completed'
           ) AS owned"#,
    )
    .bind(user_id)
    .bind(prompt_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("owned"))
}

pub async fn insert_payment(
    conn: &mut PgConnection,
    remote: &PaymentResponse,
    price_amount: &str,
    price_currency: &str,
    pay_currency: &str,
    order_id: &str,
    order_description: Option<&str>,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO payments
                (payment_id, payment_status, pay_address, pay_amount, pay_currency,
                 price_amount, price_currency, order_id, order_description)
           VALUES ($1, $2, $3, $4::numeric, $5, $6::numeric, $7, $8, $9)
           RETURNING id"#,
    )
    .bind(&remote.payment_id)
    .bind(&remote.payment_status)
    .bind(remote.pay_address.as_deref())
    .bind(remote.pay_amount.as_deref())
    .bind(remote.pay_currency.as_deref().unwrap_or(pay_currency))
    .bind(price_amount)
    .bind(price_currency)
    .bind(order_id)
    .bind(order_description)
    .fetch_one(conn)
    .await?;

    Ok(row.get("id"))
}

pub async fn insert_pending_purchase(
    conn: &mut PgConnection,
    user_id: i32,
    prompt_id: i32,
    payment_row_id: i32,
    amount: &str,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO purchases (user_id, prompt_id, payment_id, amount, status)
           VALUES ($1, $2, $3, $4::numeric, 'pending')
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(prompt_id)
    .bind(payment_row_id)
    .bind(amount)
    .fetch_one(conn)
    .await?;

    Ok(row.get("id"))
}

pub async fn insert_pending_subscription(
    conn: &mut PgConnection,
    user_id: i32,
    plan: SubscriptionPlan,
    payment_row_id: i32,
) -> Result<i32, sqlx::Error> {
    let row = sqlx::query(
        r#"INSERT INTO subscriptions (user_id, plan, status, payment_id)
           VALUES ($1, $2, 'pending', $3)
           RETURNING id"#,
    )
    .bind(user_id)
    .bind(plan.as_str())
    .bind(payment_row_id)
    .fetch_one(conn)
    .await?;

    Ok(row.get("id"))
}

pub async fn get_payment(pool: &PgPool, payment_id: &str) -> Result<Option<Payment>, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT id, payment_id, payment_status, pay_address, pay_amount::text AS pay_amount,
                  pay_currency, price_amount::text AS price_amount, price_currency,
                  actually_paid::text AS actually_paid, order_id, created_at, updated_at
           FROM payments
           WHERE payment_id = $1"#,
    )
    .bind(payment_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(payment_from_row))
}

/// Платёж принадлежит пользователю, если к нему привязана его покупка или подписка.
pub async fn payment_belongs_to(pool: &PgPool, payment_id: &str, user_id: i32) -> Result<bool, sqlx::Error> {
    let row = sqlx::query(
        r#"SELECT EXISTS(
               SELECT 1 FROM payments p
               LEFT JOIN purchases pu ON pu.payment_id = p.id
               LEFT JOIN subscriptions s ON s.payment_id = p.id
               WHERE p.payment_id = $1 AND (pu.user_id = $2 OR s.user_id = $2)
           ) AS owned"#,
    )
    .bind(payment_id)
    .bind(user_id)
    .fetch_one(pool)
    .await?;

    Ok(row.get("owned"))
}

/// Незавершённые платежи для фонового опроса, сначала давно не обновлявшиеся.
pub async fn list_pollable_payments(
    pool: &PgPool,
    batch_size: i64,
    max_age_hours: i64,
) -> Result<Vec<String>, sqlx::Error> {
    let terminal: Vec<&str> = PaymentStatus::TERMINAL.iter().map(|s| s.as_str()).collect();

    let rows = sqlx::query(
        r#"SELECT payment_id
           FROM payments
           WHERE payment_status <> ALL($1)
             AND created_at > NOW() - make_interval(hours => $2::int)
           ORDER BY updated_at ASC
           LIMIT $3"#,
    )
    .bind(terminal)
    .bind(max_age_hours)
    .bind(batch_size)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.get("payment_id")).collect())
}

pub async fn list_user_purchases(pool: &PgPool, user_id: i32) -> Result<Vec<Purchase>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, prompt_id, payment_id, amount::text AS amount, status,
                  created_at, completed_at
           FROM purchases
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .into_iter()
        .map(|r| Purchase {
            id: r.get("id"),
            user_id: r.get("user_id"),
            prompt_id: r.get("prompt_id"),
            payment_id: r.get("payment_id"),
            amount: r.get("amount"),
            status: r.get("status"),
            created_at: r.get("created_at"),
            completed_at: r.get("completed_at"),
        })
        .collect())
}

pub async fn list_user_subscriptions(pool: &PgPool, user_id: i32) -> Result<Vec<Subscription>, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, user_id, plan, status, payment_id, current_period_start, current_period_end,
                  created_at, updated_at, cancelled_at
           FROM subscriptions
           WHERE user_id = $1
           ORDER BY created_at DESC"#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(subscription_from_row).collect())
}

/// Возвращает `None`, если подписки нет или она чужая.
pub async fn cancel_user_subscription(
    pool: &PgPool,
    user_id: i32,
    subscription_id: i32,
) -> Result<Option<Subscription>, sqlx::Error> {
    let row = sqlx::query(
        r#"UPDATE subscriptions
           SET status = 'cancelled',
               cancelled_at = COALESCE(cancelled_at, NOW()),
               updated_at = NOW()
           WHERE id = $1 AND user_id = $2
           RETURNING id, user_id, plan, status, payment_id, current_period_start,
                     current_period_end, created_at, updated_at, cancelled_at"#,
    )
    .bind(subscription_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(subscription_from_row))
}
