// src/api/nowpayments_client.rs
//
// Клиент для NOWPayments API (https://api.nowpayments.io/v1)
// Авторизация: заголовок x-api-key

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

pub const NOWPAYMENTS_API_BASE: &str = "https://api.nowpayments.io/v1";

#[derive(Debug, thiserror::Error)]
pub enum NowPaymentsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("nowpayments api error status={status} body={body}")]
    Api { status: u16, body: String },
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct CreatePaymentRequest {
    pub price_amount: f64,
    pub price_currency: String,
    pub pay_currency: String,
    pub order_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_description: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ipn_callback_url: Option<String>,
}

/// Ответ `POST /payment` и `GET /payment/{id}`.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct PaymentResponse {
    #[serde(deserialize_with = "string_or_number")]
    pub payment_id: String,
    pub payment_status: String,
    #[serde(default)]
    pub pay_address: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub price_amount: Option<String>,
    #[serde(default)]
    pub price_currency: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub pay_amount: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub actually_paid: Option<String>,
    #[serde(default)]
    pub pay_currency: Option<String>,
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct EstimateResponse {
    pub currency_from: String,
    #[serde(deserialize_with = "string_or_number")]
    pub amount_from: String,
    pub currency_to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub estimated_amount: String,
}

#[derive(Debug, Clone, Deserialize, Serialize, ToSchema)]
pub struct MinAmountResponse {
    pub currency_from: String,
    pub currency_to: String,
    #[serde(deserialize_with = "string_or_number")]
    pub min_amount: String,
}

#[derive(Debug, Deserialize)]
struct CurrenciesResponse {
    currencies: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    message: String,
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// NOWPayments отдаёт суммы и id то числом, то строкой.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    value_to_string(value).ok_or_else(|| serde::de::Error::custom("expected string or number"))
}

fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value.and_then(value_to_string))
}

#[derive(Clone)]
pub struct NowPaymentsClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl NowPaymentsClient {
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn create_payment(
        &self,
        req: &CreatePaymentRequest,
    ) -> Result<PaymentResponse, NowPaymentsError> {
        let resp = self
            .http
            .post(format!("{}/payment", self.base_url))
            .header("x-api-key", &self.api_key)
            .json(req)
            .send()
            .await?;

        Self::read_json(resp).await
    }

    pub async fn get_payment_status(
        &self,
        payment_id: &str,
    ) -> Result<PaymentResponse, NowPaymentsError> {
        let resp = self
            .http
            .get(format!("{}/payment/{payment_id}", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        Self::read_json(resp).await
    }

    pub async fn get_currencies(&self) -> Result<Vec<String>, NowPaymentsError> {
        let resp = self
            .http
            .get(format!("{}/currencies", self.base_url))
            .header("x-api-key", &self.api_key)
            .send()
            .await?;

        let parsed: CurrenciesResponse = Self::read_json(resp).await?;
        Ok(parsed.currencies)
    }

    pub async fn get_estimate(
        &self,
        amount: f64,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<EstimateResponse, NowPaymentsError> {
        let amount = amount.to_string();
        let resp = self
            .http
            .get(format!("{}/estimate", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(&[
                ("amount", amount.as_str()),
                ("currency_from", currency_from),
                ("currency_to", currency_to),
            ])
            .send()
            .await?;

        Self::read_json(resp).await
    }

    pub async fn get_min_amount(
        &self,
        currency_from: &str,
        currency_to: &str,
    ) -> Result<MinAmountResponse, NowPaymentsError> {
        let resp = self
            .http
            .get(format!("{}/min-amount", self.base_url))
            .header("x-api-key", &self.api_key)
            .query(&[("currency_from", currency_from), ("currency_to", currency_to)])
            .send()
            .await?;

        Self::read_json(resp).await
    }

    /// `GET /status` не требует ключа, отвечает `{"message": "OK"}`.
    pub async fn api_status(&self) -> Result<String, NowPaymentsError> {
        let resp = self
            .http
            .get(format!("{}/status", self.base_url))
            .send()
            .await?;

        let parsed: StatusResponse = Self::read_json(resp).await?;
        Ok(parsed.message)
    }

    async fn read_json<T: serde::de::DeserializeOwned>(
        resp: reqwest::Response,
    ) -> Result<T, NowPaymentsError> {
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(NowPaymentsError::Api {
                status: status.as_u16(),
                body,
            });
        }

        serde_json::from_str::<T>(&body)
            .map_err(|e| NowPaymentsError::InvalidResponse(format!("{e}; body={body}")))
    }
}
