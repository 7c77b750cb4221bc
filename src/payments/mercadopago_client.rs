use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::sync::OnceCell;
use uuid::Uuid;

use crate::{
    config::GatewayConfig,
    domain::{CreatePixPayment, PaymentStatus, PixCharge},
    error::{AppError, Result},
    payments::PaymentGateway,
};

/// Mercado Pago expects expirations in Brasília time.
const BRT_OFFSET_SECS: i32 = 3 * 3600;

pub struct MercadoPagoClient {
    access_token: String,
    base_url: String,
    request_timeout: Duration,
    http: OnceCell<reqwest::Client>,
}

#[derive(Debug, Deserialize)]
struct PaymentResponse {
    id: Value,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    point_of_interaction: Option<PointOfInteraction>,
}

#[derive(Debug, Deserialize)]
struct PointOfInteraction {
    transaction_data: TransactionData,
}

#[derive(Debug, Deserialize)]
struct TransactionData {
    qr_code: Option<String>,
}

impl MercadoPagoClient {
    pub fn new(config: &GatewayConfig) -> Self {
        Self {
            access_token: config.access_token.clone().unwrap_or_default(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            http: OnceCell::new(),
        }
    }

    /// Built once, on first use.
    async fn http(&self) -> Result<&reqwest::Client> {
        self.http.get_or_try_init(|| async { self.build_http() }).await
    }

    fn build_http(&self) -> Result<reqwest::Client> {
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.access_token))
            .map_err(|_| AppError::Config("gateway access token is not a valid header".to_string()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.request_timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("HTTP client: {}", e)))
    }

    async fn read_json(response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AppError::Gateway(format!("Mercado Pago body: {}", e)))?;

        if !status.is_success() {
            return Err(AppError::Gateway(format!(
                "Mercado Pago returned {}: {}",
                status,
                truncate(&body, 300)
            )));
        }

        serde_json::from_str(&body)
            .map_err(|e| AppError::MalformedResponse(format!("Mercado Pago JSON: {}", e)))
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

pub(crate) fn payment_body(request: &CreatePixPayment) -> Value {
    json!({
        "transaction_amount": request.amount_cents as f64 / 100.0,
        "payment_method_id": "pix",
        "installments": 1,
        "description": request.description,
        "date_of_expiration": format_expiration(request.expires_at),
        "payer": { "email": request.payer_email },
    })
}

pub(crate) fn format_expiration(at: DateTime<Utc>) -> String {
    match FixedOffset::west_opt(BRT_OFFSET_SECS) {
        Some(brt) => at.with_timezone(&brt).format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
        None => at.format("%Y-%m-%dT%H:%M:%S%.3f%:z").to_string(),
    }
}

fn payment_id(value: &Value) -> Result<String> {
    match value {
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) if !s.is_empty() => Ok(s.clone()),
        other => Err(AppError::MalformedResponse(format!("unexpected payment id {}", other))),
    }
}

pub(crate) fn parse_charge(body: Value) -> Result<PixCharge> {
    let response: PaymentResponse = serde_json::from_value(body)
        .map_err(|e| AppError::MalformedResponse(format!("payment: {}", e)))?;

    let pix_code = response
        .point_of_interaction
        .and_then(|poi| poi.transaction_data.qr_code)
        .filter(|code| !code.is_empty())
        .ok_or_else(|| AppError::MalformedResponse("payment has no PIX code".to_string()))?;

    Ok(PixCharge {
        payment_id: payment_id(&response.id)?,
        pix_code,
    })
}

pub(crate) fn parse_status(body: Value) -> Result<PaymentStatus> {
    let response: PaymentResponse = serde_json::from_value(body)
        .map_err(|e| AppError::MalformedResponse(format!("payment: {}", e)))?;

    response
        .status
        .map(|s| PaymentStatus::parse(&s))
        .ok_or_else(|| AppError::MalformedResponse("payment has no status".to_string()))
}

#[async_trait]
impl PaymentGateway for MercadoPagoClient {
    fn name(&self) -> &str {
        "Mercado Pago"
    }

    async fn health_check(&self) -> Result<()> {
        if self.access_token.is_empty() {
            return Err(AppError::Config("Mercado Pago access token not configured".to_string()));
        }
        let response = self
            .http()
            .await?
            .get(format!("{}/users/me", self.base_url))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Mercado Pago error: {}", e)))?;
        Self::read_json(response).await.map(|_| ())
    }

    async fn create_pix(&self, request: &CreatePixPayment) -> Result<PixCharge> {
        let response = self
            .http()
            .await?
            .post(format!("{}/v1/payments", self.base_url))
            .header("X-Idempotency-Key", Uuid::new_v4().to_string())
            .json(&payment_body(request))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Mercado Pago error: {}", e)))?;

        let charge = parse_charge(Self::read_json(response).await?)?;
        tracing::info!(payment_id = %charge.payment_id, "PIX charge created");
        Ok(charge)
    }

    async fn get_status(&self, payment_id: &str) -> Result<PaymentStatus> {
        let response = self
            .http()
            .await?
            .get(format!("{}/v1/payments/{}", self.base_url, payment_id))
            .send()
            .await
            .map_err(|e| AppError::Gateway(format!("Mercado Pago error: {}", e)))?;

        parse_status(Self::read_json(response).await?)
    }
}
