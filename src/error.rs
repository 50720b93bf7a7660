//! HTTP-facing errors.

use std::collections::BTreeMap;

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::checkout::gateway::GatewayError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidInput(String),

    #[error("cart is empty")]
    EmptyCart,

    #[error("checkout already in progress")]
    CheckoutInProgress,

    #[error("invalid customer details")]
    InvalidCustomer(BTreeMap<&'static str, &'static str>),

    #[error(transparent)]
    Gateway(#[from] GatewayError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::InvalidCustomer(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            ApiError::EmptyCart => StatusCode::BAD_REQUEST,
            ApiError::CheckoutInProgress => StatusCode::CONFLICT,
            ApiError::Gateway(GatewayError::Rejected { .. }) => StatusCode::PAYMENT_REQUIRED,
            ApiError::Gateway(_) => StatusCode::BAD_GATEWAY,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::InvalidCustomer(fields) => json!({
                "error": self.to_string(),
                "fields": fields,
            }),
            ApiError::Gateway(GatewayError::Rejected { status, detail }) => json!({
                "error": "payment rejected",
                "status": status,
                "detail": detail,
            }),
            ApiError::Gateway(e) => {
                tracing::error!(error = %e, "storefront backend unavailable");
                json!({ "error": "payment service unavailable" })
            }
            _ => json!({ "error": self.to_string() }),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_payment_maps_to_402() {
        let err = ApiError::from(GatewayError::Rejected {
            status: "rejected".into(),
            detail: "cc_rejected_insufficient_amount".into(),
        });

        assert_eq!(err.into_response().status(), StatusCode::PAYMENT_REQUIRED);
    }

    #[test]
    fn invalid_base_url_maps_to_502() {
        let err = ApiError::from(GatewayError::InvalidBaseUrl {
            url: "x".into(),
            reason: "bad".into(),
        });

        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn concurrent_checkout_maps_to_409() {
        assert_eq!(ApiError::CheckoutInProgress.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn empty_cart_display() {
        assert_eq!(ApiError::EmptyCart.to_string(), "cart is empty");
        assert_eq!(ApiError::EmptyCart.status(), StatusCode::BAD_REQUEST);
    }
}
