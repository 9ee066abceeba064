//! Domain models and broker wire shapes
//!
//! Every broker payload gets an explicit typed shape with `serde` renames for
//! the Daraja API's PascalCase fields; nothing is accessed as untyped JSON
//! except the status-query response, which is proxied verbatim.

use serde::{Deserialize, Serialize};

/// Payment initiation request from clients.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRequest {
    #[serde(rename = "phoneNumber")]
    pub phone_number: String,
    pub amount: u64,
    #[serde(rename = "orderReference")]
    pub order_reference: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// STK push payload sent to the broker.
#[derive(Serialize)]
pub struct StkPushPayload {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "TransactionType")]
    pub transaction_type: &'static str,
    #[serde(rename = "Amount")]
    pub amount: u64,
    #[serde(rename = "PartyA")]
    pub party_a: String,
    #[serde(rename = "PartyB")]
    pub party_b: String,
    #[serde(rename = "PhoneNumber")]
    pub phone_number: String,
    #[serde(rename = "CallBackURL")]
    pub callback_url: String,
    #[serde(rename = "AccountReference")]
    pub account_reference: String,
    #[serde(rename = "TransactionDesc")]
    pub transaction_desc: String,
}

/// Broker's synchronous acknowledgement of an STK push.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StkPushResponse {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResponseCode")]
    pub response_code: String,
    #[serde(rename = "ResponseDescription")]
    pub response_description: String,
    #[serde(rename = "CustomerMessage")]
    pub customer_message: String,
}

/// Status query payload sent to the broker.
#[derive(Serialize)]
pub struct StkQueryPayload {
    #[serde(rename = "BusinessShortCode")]
    pub business_short_code: String,
    #[serde(rename = "Password")]
    pub password: String,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
}

/// Status query request from clients.
#[derive(Deserialize)]
pub struct QueryRequest {
    #[serde(rename = "checkoutRequestId")]
    pub checkout_request_id: String,
}

/// Token endpoint response.
#[derive(Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
}

/// Error body the broker returns on a rejected request.
#[derive(Deserialize, Default)]
pub struct BrokerErrorBody {
    #[serde(rename = "errorMessage", default)]
    pub error_message: Option<String>,
}

/// Asynchronous result notification: `{ Body: { stkCallback: {..} } }`.
#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    #[serde(rename = "Body")]
    pub body: CallbackBody,
}

#[derive(Debug, Deserialize)]
pub struct CallbackBody {
    #[serde(rename = "stkCallback")]
    pub stk_callback: StkCallback,
}

#[derive(Debug, Deserialize)]
pub struct StkCallback {
    #[serde(rename = "MerchantRequestID")]
    pub merchant_request_id: String,
    #[serde(rename = "CheckoutRequestID")]
    pub checkout_request_id: String,
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
    #[serde(rename = "CallbackMetadata")]
    pub callback_metadata: Option<CallbackMetadata>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackMetadata {
    #[serde(rename = "Item")]
    pub item: Vec<MetadataItem>,
}

/// Name/value pair inside the callback metadata. The broker does not
/// guarantee item order, so items are always searched by name.
#[derive(Debug, Deserialize)]
pub struct MetadataItem {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Value", default)]
    pub value: Option<serde_json::Value>,
}

impl StkCallback {
    /// Look up a metadata value by item name, order-independent.
    pub fn metadata_value(&self, name: &str) -> Option<&serde_json::Value> {
        self.callback_metadata
            .as_ref()?
            .item
            .iter()
            .find(|item| item.name == name)?
            .value
            .as_ref()
    }
}

/// Fields extracted from a successful callback.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PaymentDetails {
    #[serde(rename = "merchantRequestId")]
    pub merchant_request_id: String,
    #[serde(rename = "checkoutRequestId")]
    pub checkout_request_id: String,
    pub amount: Option<f64>,
    #[serde(rename = "mpesaReceiptNumber")]
    pub mpesa_receipt_number: Option<String>,
    #[serde(rename = "transactionDate")]
    pub transaction_date: Option<String>,
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
}

/// Acknowledgement returned to the broker for every callback delivery.
#[derive(Serialize, Deserialize)]
pub struct AckResponse {
    #[serde(rename = "ResultCode")]
    pub result_code: i64,
    #[serde(rename = "ResultDesc")]
    pub result_desc: String,
}

impl AckResponse {
    /// A zero result code tells the broker not to redeliver.
    pub fn success() -> Self {
        Self {
            result_code: 0,
            result_desc: "Success".to_string(),
        }
    }
}
