//! HTTP client for the remote storefront backend.
//!
//! Three calls matter to checkout: the public site settings (shipping rules),
//! the public payment methods (the payment widget's public key) and the
//! public payment endpoint that receives the order payload.

use std::time::Duration;

use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::order::OrderPayload;
use super::settings::SettingsPayload;

const SETTINGS_PATH: &str = "webconfig/public/settings/";
const PAYMENT_METHODS_PATH: &str = "webconfig/public/payments/";
const PAYMENT_PATH: &str = "sales/public/payment/";

/// Provider whose widget produces the `payment_data` checkout posts.
pub const PAYMENT_PROVIDER: &str = "mercadopago";

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("payment rejected with status {status}: {detail}")]
    Rejected { status: String, detail: String },
}

/// Outcome reported by the payment endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentResult {
    #[serde(default)]
    pub id: Option<serde_json::Value>,

    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl PaymentResult {
    /// `approved` and `in_process` both mean the order went through.
    pub fn is_accepted(&self) -> bool {
        matches!(self.status.as_str(), "approved" | "in_process")
    }
}

/// A payment provider configured for the site.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentMethod {
    pub provider: String,

    #[serde(default)]
    pub active: bool,

    #[serde(default)]
    pub extra_config: Option<PaymentMethodConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PaymentMethodConfig {
    #[serde(default)]
    pub public_key: Option<String>,
}

/// Public key of the first active method for `provider` that has one.
pub fn active_public_key<'a>(methods: &'a [PaymentMethod], provider: &str) -> Option<&'a str> {
    methods
        .iter()
        .filter(|m| m.active && m.provider == provider)
        .find_map(|m| {
            let key = m.extra_config.as_ref()?.public_key.as_deref()?;
            (!key.is_empty()).then_some(key)
        })
}

#[derive(Debug, Deserialize)]
struct PaymentErrorBody {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Client for the storefront's public API.
///
/// Use [`StorefrontClient::new`] with the configured base URL; tests point it
/// at a wiremock server.
#[derive(Debug, Clone)]
pub struct StorefrontClient {
    client: Client,
    base_url: Url,
    site: Option<String>,
}

impl StorefrontClient {
    /// # Errors
    ///
    /// Returns [`GatewayError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`GatewayError::InvalidBaseUrl`] if `base_url` does not parse.
    pub fn new(
        base_url: &str,
        site: Option<String>,
        timeout_secs: u64,
    ) -> Result<Self, GatewayError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .user_agent(concat!("storefront_cart/", env!("CARGO_PKG_VERSION")))
            .build()?;

        // Exactly one trailing slash so `join` appends instead of replacing.
        let normalised = format!("{}/", base_url.trim_end_matches('/'));
        let parsed = Url::parse(&normalised).map_err(|e| GatewayError::InvalidBaseUrl {
            url: base_url.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            client,
            base_url: parsed,
            site,
        })
    }

    pub fn site(&self) -> Option<&str> {
        self.site.as_deref()
    }

    fn endpoint(&self, path: &str) -> Result<Url, GatewayError> {
        let mut url = self
            .base_url
            .join(path)
            .map_err(|e| GatewayError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })?;
        if let Some(site) = &self.site {
            url.query_pairs_mut().append_pair("site", site);
        }
        Ok(url)
    }

    /// Fetches the public site settings.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Http`] on network failure, non-2xx status or an
    /// undecodable body.
    pub async fn fetch_settings(&self) -> Result<SettingsPayload, GatewayError> {
        let url = self.endpoint(SETTINGS_PATH)?;
        let payload = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<SettingsPayload>()
            .await?;
        Ok(payload)
    }

    /// Fetches the payment providers configured for the site.
    ///
    /// # Errors
    ///
    /// [`GatewayError::Http`] on network failure, non-2xx status or an
    /// undecodable body.
    pub async fn fetch_payment_methods(&self) -> Result<Vec<PaymentMethod>, GatewayError> {
        let url = self.endpoint(PAYMENT_METHODS_PATH)?;
        let methods = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json::<Vec<PaymentMethod>>()
            .await?;
        Ok(methods)
    }

    /// Posts an order to the payment endpoint.
    ///
    /// # Errors
    ///
    /// - [`GatewayError::Rejected`] when the endpoint answers with an error
    ///   status or a status other than `approved` / `in_process`.
    /// - [`GatewayError::Http`] on network failure or an undecodable body.
    pub async fn submit_payment(
        &self,
        payload: &OrderPayload,
    ) -> Result<PaymentResult, GatewayError> {
        let url = self.endpoint(PAYMENT_PATH)?;
        let response = self.client.post(url).json(payload).send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.json::<PaymentErrorBody>().await.ok();
            return Err(rejection(status, body));
        }

        let result = response.json::<PaymentResult>().await?;
        if result.is_accepted() {
            return Ok(result);
        }
        Err(GatewayError::Rejected {
            status: result.status,
            detail: result.detail.unwrap_or_else(|| "unknown".to_owned()),
        })
    }
}

fn rejection(status: StatusCode, body: Option<PaymentErrorBody>) -> GatewayError {
    let (remote_status, detail) = match body {
        Some(body) => (body.status, body.detail.or(body.error)),
        None => (None, None),
    };
    GatewayError::Rejected {
        status: remote_status.unwrap_or_else(|| status.as_u16().to_string()),
        detail: detail.unwrap_or_else(|| "unknown".to_owned()),
    }
}
