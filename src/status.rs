// src/status.rs

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use utoipa::ToSchema;

/// Статусы платежа NOWPayments (строки совпадают с их API).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Waiting,
    Confirming,
    Confirmed,
    Sending,
    PartiallyPaid,
    Finished,
    Failed,
    Refunded,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown payment status: {0}")]
pub struct UnknownStatus(pub String);

impl PaymentStatus {
    pub const TERMINAL: [PaymentStatus; 4] = [
        PaymentStatus::Finished,
        PaymentStatus::Failed,
        PaymentStatus::Expired,
        PaymentStatus::Refunded,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Waiting => "waiting",
            PaymentStatus::Confirming => "confirming",
            PaymentStatus::Confirmed => "confirmed",
            PaymentStatus::Sending => "sending",
            PaymentStatus::PartiallyPaid => "partially_paid",
            PaymentStatus::Finished => "finished",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
            PaymentStatus::Expired => "expired",
        }
    }

    pub fn is_terminal(&self) -> bool {
        Self::TERMINAL.contains(self)
    }

    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            PaymentStatus::Failed | PaymentStatus::Expired | PaymentStatus::Refunded
        )
    }

    /// Куда переводить связанную покупку. `None` — покупку не трогаем.
    pub fn purchase_target(&self) -> Option<PurchaseStatus> {
        match self {
            PaymentStatus::Finished => Some(PurchaseStatus::Completed),
            s if s.is_failure() => Some(PurchaseStatus::Failed),
            _ => None,
        }
    }

    pub fn subscription_target(&self) -> Option<SubscriptionStatus> {
        match self {
            PaymentStatus::Finished => Some(SubscriptionStatus::Active),
            s if s.is_failure() => Some(SubscriptionStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let status = match s.trim().to_ascii_lowercase().as_str() {
            "waiting" => PaymentStatus::Waiting,
            "confirming" => PaymentStatus::Confirming,
            "confirmed" => PaymentStatus::Confirmed,
            "sending" => PaymentStatus::Sending,
            "partially_paid" => PaymentStatus::PartiallyPaid,
            "finished" => PaymentStatus::Finished,
            "failed" => PaymentStatus::Failed,
            "refunded" => PaymentStatus::Refunded,
            "expired" => PaymentStatus::Expired,
            _ => return Err(UnknownStatus(s.to_string())),
        };
        Ok(status)
    }
}

/// Что делать с входящим статусом при текущем статусе в БД.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Transition {
    Apply,
    /// Тот же статус пришёл повторно (IPN ретрай или опрос).
    Unchanged,
    /// Финальный статус уже зафиксирован и больше не меняется.
    AlreadyFinal,
}

/// Порядок продвижения платежа. Финальные статусы старше любых промежуточных.
fn progress_rank(status: PaymentStatus) -> u8 {
    match status {
        PaymentStatus::Waiting => 0,
        PaymentStatus::Confirming => 1,
        PaymentStatus::Confirmed | PaymentStatus::PartiallyPaid => 2,
        PaymentStatus::Sending => 3,
        PaymentStatus::Finished
        | PaymentStatus::Failed
        | PaymentStatus::Refunded
        | PaymentStatus::Expired => 4,
    }
}

pub fn decide(current: PaymentStatus, incoming: PaymentStatus) -> Transition {
    if current == incoming {
        Transition::Unchanged
    } else if current.is_terminal() {
        Transition::AlreadyFinal
    } else if current != PaymentStatus::PartiallyPaid && progress_rank(incoming) < progress_rank(current) {
        // запоздавший ответ опроса: назад не откатываемся. После partially_paid
        // доплата снова проходит через confirming.
        Transition::Unchanged
    } else {
        Transition::Apply
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PurchaseStatus {
    Pending,
    Completed,
    Failed,
}

impl PurchaseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PurchaseStatus::Pending => "pending",
            PurchaseStatus::Completed => "completed",
            PurchaseStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "pending",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionPlan {
    Monthly,
    Yearly,
}

impl SubscriptionPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionPlan::Monthly => "monthly",
            SubscriptionPlan::Yearly => "yearly",
        }
    }

    pub fn period(&self) -> Duration {
        match self {
            SubscriptionPlan::Monthly => Duration::days(30),
            SubscriptionPlan::Yearly => Duration::days(365),
        }
    }
}

impl FromStr for SubscriptionPlan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(SubscriptionPlan::Monthly),
            "yearly" => Ok(SubscriptionPlan::Yearly),
            other => Err(format!("unknown subscription plan: {other}")),
        }
    }
}
