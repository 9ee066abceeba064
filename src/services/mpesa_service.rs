//! STK push initiation, token acquisition and status query
//!
//! Each operation is a linear request/response cycle: acquire a token, sign
//! an envelope, call the broker. Tokens are reacquired per request (request
//! volume is low; caching until the advertised expiry would be the next step
//! if that changes). Once the broker accepts a push there is no cancel; the
//! payer resolves the prompt on their device.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::MpesaConfig;
use crate::error::MpesaError;
use crate::infrastructure::http_client;
use crate::models::{
    BrokerErrorBody, PaymentRequest, StkPushPayload, StkPushResponse, StkQueryPayload,
    TokenResponse,
};
use crate::services::signature::SignedEnvelope;

const COUNTRY_CODE: &str = "254";
const TRANSACTION_TYPE: &str = "CustomerPayBillOnline";

pub struct MpesaService {
    config: Arc<MpesaConfig>,
    base_url: String,
}

impl MpesaService {
    pub fn new(config: Arc<MpesaConfig>) -> Self {
        let base_url = config.environment.base_url().to_string();
        Self { config, base_url }
    }

    /// Point the service at a different broker endpoint. Used by tests that
    /// stand in for the broker; production derives the endpoint from the
    /// configured environment.
    pub fn with_base_url(config: Arc<MpesaConfig>, base_url: impl Into<String>) -> Self {
        Self {
            config,
            base_url: base_url.into(),
        }
    }

    /// Exchange the consumer key/secret for a short-lived bearer token.
    async fn get_access_token(&self) -> Result<String, MpesaError> {
        let url = format!(
            "{}/oauth/v1/generate?grant_type=client_credentials",
            self.base_url
        );

        let response = http_client::get_basic_auth(
            &url,
            &self.config.consumer_key,
            &self.config.consumer_secret,
        )
        .await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(MpesaError::Auth(format!(
                "token endpoint returned {status}"
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::Auth(format!("malformed token response: {e}")))?;
        Ok(token.access_token)
    }

    /// Initiate an STK push. Validation happens before any network call;
    /// on success the broker has already pushed the prompt to the payer's
    /// device and the returned correlation pair identifies the attempt.
    pub async fn initiate(&self, request: &PaymentRequest) -> Result<StkPushResponse, MpesaError> {
        validate_request(request)?;

        let access_token = self.get_access_token().await?;
        let envelope = SignedEnvelope::generate(
            &self.config.business_short_code,
            &self.config.passkey,
        );
        let phone_number = normalize_phone(&request.phone_number);
        let transaction_desc = request
            .description
            .clone()
            .unwrap_or_else(|| format!("Order {}", request.order_reference));

        let payload = StkPushPayload {
            business_short_code: self.config.business_short_code.clone(),
            password: envelope.password,
            timestamp: envelope.timestamp,
            transaction_type: TRANSACTION_TYPE,
            amount: request.amount,
            party_a: phone_number.clone(),
            party_b: self.config.business_short_code.clone(),
            phone_number,
            callback_url: self.config.callback_url.clone(),
            account_reference: request.order_reference.clone(),
            transaction_desc,
        };

        debug!(
            amount = payload.amount,
            phone = %payload.phone_number,
            reference = %payload.account_reference,
            "sending STK push"
        );

        let url = format!("{}/mpesa/stkpush/v1/processrequest", self.base_url);
        let response = http_client::post_json_bearer(&url, &access_token, &payload).await?;

        if !response.status().is_success() {
            let status = response.status();
            let body: BrokerErrorBody = response.json().await.unwrap_or_default();
            let message = body.error_message.unwrap_or_else(|| status.to_string());
            warn!(%status, "STK push rejected by broker");
            return Err(MpesaError::Initiation(message));
        }

        let push_response: StkPushResponse = response
            .json()
            .await
            .map_err(|e| MpesaError::Initiation(format!("malformed broker response: {e}")))?;

        info!(
            merchant_request_id = %push_response.merchant_request_id,
            checkout_request_id = %push_response.checkout_request_id,
            "STK push accepted"
        );
        Ok(push_response)
    }

    /// Ask the broker for the current result of a previously initiated push.
    /// The response is returned verbatim; the caller interprets result codes.
    pub async fn query_status(
        &self,
        checkout_request_id: &str,
    ) -> Result<serde_json::Value, MpesaError> {
        let access_token = self.get_access_token().await?;
        let envelope = SignedEnvelope::generate(
            &self.config.business_short_code,
            &self.config.passkey,
        );

        let payload = StkQueryPayload {
            business_short_code: self.config.business_short_code.clone(),
            password: envelope.password,
            timestamp: envelope.timestamp,
            checkout_request_id: checkout_request_id.to_string(),
        };

        let url = format!("{}/mpesa/stkpushquery/v1/query", self.base_url);
        let response = http_client::post_json_bearer(&url, &access_token, &payload).await?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(MpesaError::Query(format!("broker returned {status}")));
        }

        response
            .json()
            .await
            .map_err(|e| MpesaError::Query(format!("malformed status response: {e}")))
    }
}

/// Canonical international form: strip a leading `+`; a leading trunk zero
/// is replaced with the country code; a number already in international form
/// is left unchanged; anything else gets the country code prepended.
pub fn normalize_phone(raw: &str) -> String {
    let number = raw.trim().strip_prefix('+').unwrap_or(raw.trim());
    if let Some(rest) = number.strip_prefix('0') {
        return format!("{COUNTRY_CODE}{rest}");
    }
    if number.starts_with(COUNTRY_CODE) {
        return number.to_string();
    }
    format!("{COUNTRY_CODE}{number}")
}

fn validate_request(request: &PaymentRequest) -> Result<(), MpesaError> {
    if request.amount == 0 {
        return Err(MpesaError::Validation(
            "amount must be greater than zero".into(),
        ));
    }
    if request.order_reference.trim().is_empty() {
        return Err(MpesaError::Validation("order reference is required".into()));
    }
    if request.phone_number.trim().is_empty() {
        return Err(MpesaError::Validation("phone number is required".into()));
    }
    Ok(())
}
