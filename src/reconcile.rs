// src/reconcile.rs
//
// Сведение статуса платежа NOWPayments с покупками и подписками.
// Один и тот же путь используется IPN-вебхуком, ручной проверкой статуса и фоновым опросом.

use chrono::Utc;
use serde::Serialize;
use sqlx::{PgConnection, PgPool, Row};
use utoipa::ToSchema;

use crate::status::{decide, PaymentStatus, PurchaseStatus, SubscriptionPlan, SubscriptionStatus, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UpdateSource {
    Ipn,
    Poll,
}

#[derive(Debug, Clone)]
pub struct StatusUpdate {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub actually_paid: Option<String>,
    pub pay_amount: Option<String>,
    pub source: UpdateSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    UnknownPayment,
    Unchanged {
        status: PaymentStatus,
    },
    AlreadyFinal {
        status: PaymentStatus,
        incoming: PaymentStatus,
    },
    Applied {
        previous: Option<PaymentStatus>,
        current: PaymentStatus,
        purchases: u64,
        subscriptions: u64,
    },
}

/// Применяет новый статус платежа.
///
/// Строка платежа блокируется `FOR UPDATE` на всю транзакцию, поэтому IPN и опрос,
/// пришедшие одновременно, не продвинут покупку/подписку дважды: второй увидит
/// `Unchanged` или `AlreadyFinal`.
pub async fn apply_status_update(pool: &PgPool, update: &StatusUpdate) -> Result<Outcome, sqlx::Error> {
    let mut tx = pool.begin().await?;

    let row = sqlx::query(
        r#"SELECT id, payment_status
           FROM payments
           WHERE payment_id = $1
           FOR UPDATE"#,
    )
    .bind(&update.payment_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        log::warn!(
            "payment status update for unknown payment_id={} source={:?}",
            update.payment_id,
            update.source
        );
        return Ok(Outcome::UnknownPayment);
    };

    let payment_row_id: i32 = row.get("id");
    let current_raw: String = row.get("payment_status");
    let previous = current_raw.parse::<PaymentStatus>().ok();

    if let Some(current) = previous {
        match decide(current, update.status) {
            Transition::Apply => {}
            Transition::Unchanged => return Ok(Outcome::Unchanged { status: current }),
            Transition::AlreadyFinal => {
                log::info!(
                    "payment_id={} already final status={} ignoring incoming={} source={:?}",
                    update.payment_id,
                    current,
                    update.status,
                    update.source
                );
                return Ok(Outcome::AlreadyFinal {
                    status: current,
                    incoming: update.status,
                });
            }
        }
    }

    sqlx::query(
        r#"UPDATE payments
           SET payment_status = $1,
               actually_paid = COALESCE($2::numeric, actually_paid),
               pay_amount = COALESCE($3::numeric, pay_amount),
               updated_at = NOW()
           WHERE id = $4"#,
    )
    .bind(update.status.as_str())
    .bind(update.actually_paid.as_deref())
    .bind(update.pay_amount.as_deref())
    .bind(payment_row_id)
    .execute(&mut *tx)
    .await?;

    let purchases = match update.status.purchase_target() {
        Some(target) => update_purchases(&mut tx, payment_row_id, target).await?,
        None => 0,
    };

    let subscriptions = match update.status.subscription_target() {
        Some(target) => update_subscriptions(&mut tx, payment_row_id, target).await?,
        None => 0,
    };

    tx.commit().await?;

    log::info!(
        "payment_id={} status {} -> {} source={:?} purchases={} subscriptions={}",
        update.payment_id,
        current_raw,
        update.status,
        update.source,
        purchases,
        subscriptions
    );

    Ok(Outcome::Applied {
        previous,
        current: update.status,
        purchases,
        subscriptions,
    })
}

async fn update_purchases(
    conn: &mut PgConnection,
    payment_row_id: i32,
    target: PurchaseStatus,
) -> Result<u64, sqlx::Error> {
    let completed_at = (target == PurchaseStatus::Completed).then(Utc::now);

    let result = sqlx::query(
        r#"UPDATE purchases
           SET status = $1, completed_at = COALESCE($2, completed_at)
           WHERE payment_id = $3 AND status = 'pending'"#,
    )
    .bind(target.as_str())
    .bind(completed_at)
    .bind(payment_row_id)
    .execute(conn)
    .await?;

    Ok(result.rows_affected())
}

async fn update_subscriptions(
    conn: &mut PgConnection,
    payment_row_id: i32,
    target: SubscriptionStatus,
) -> Result<u64, sqlx::Error> {
    let rows = sqlx::query(
        r#"SELECT id, plan
           FROM subscriptions
           WHERE payment_id = $1 AND status = 'pending'
           FOR UPDATE"#,
    )
    .bind(payment_row_id)
    .fetch_all(&mut *conn)
    .await?;

    let now = Utc::now();
    let mut updated = 0;

    for row in rows {
        let sub_id: i32 = row.get("id");
        let plan_raw: String = row.get("plan");

        match target {
            SubscriptionStatus::Active => {
                let plan = match plan_raw.parse::<SubscriptionPlan>() {
                    Ok(p) => p,
                    Err(e) => {
                        log::error!("subscription id={sub_id}: {e}, falling back to monthly");
                        SubscriptionPlan::Monthly
                    }
                };

                sqlx::query(
                    r#"UPDATE subscriptions
                       SET status = 'active',
                           current_period_start = $1,
                           current_period_end = $2,
                           cancelled_at = NULL,
                           updated_at = NOW()
                       WHERE id = $3"#,
                )
                .bind(now)
                .bind(now + plan.period())
                .bind(sub_id)
                .execute(&mut *conn)
                .await?;
            }
            SubscriptionStatus::Cancelled => {
                sqlx::query(
                    r#"UPDATE subscriptions
                       SET status = 'cancelled', cancelled_at = NOW(), updated_at = NOW()
                       WHERE id = $1"#,
                )
                .bind(sub_id)
                .execute(&mut *conn)
                .await?;
            }
            SubscriptionStatus::Pending => continue,
        }

        updated += 1;
    }

    Ok(updated)
}
