//! HTTP client for the external payment processor.
//!
//! Two endpoints are consumed: invoice creation at checkout and invoice
//! lookup for the poll path. The raw gateway status string is converted to
//! `GatewayStatus` right here at the boundary; nothing downstream sees the
//! gateway's vocabulary. Any transport or decode failure surfaces as
//! `DomainError::Upstream`; a failed call is never interpreted as a status.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::errors::DomainError;
use crate::domain::ports::{
    CreateInvoiceRequest, CreatedInvoice, InvoiceSnapshot, PaymentGateway,
};
use crate::domain::status::GatewayStatus;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpPaymentGateway {
    http: Client,
    base_url: String,
    api_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: &str, api_key: &str) -> Self {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build gateway HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        }
    }

    fn invoices_url(&self) -> String {
        format!("{}/v2/invoices", self.base_url)
    }

    fn invoice_url(&self, invoice_id: &str) -> String {
        format!("{}/v2/invoices/{}", self.base_url, invoice_id)
    }
}

#[derive(Debug, Serialize)]
struct InvoiceItemPayload<'a> {
    name: &'a str,
    quantity: i32,
    price: i64,
}

#[derive(Debug, Serialize)]
struct CreateInvoicePayload<'a> {
    external_id: String,
    amount: i64,
    description: &'a str,
    payer_email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    customer_name: Option<&'a str>,
    items: Vec<InvoiceItemPayload<'a>>,
    success_redirect_url: &'a str,
}

#[derive(Debug, Deserialize)]
struct InvoiceResponse {
    id: String,
    #[serde(default)]
    invoice_url: String,
    status: String,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_invoice(
        &self,
        request: &CreateInvoiceRequest,
    ) -> Result<CreatedInvoice, DomainError> {
        let payload = CreateInvoicePayload {
            external_id: format!("order-{}", request.order_id),
            amount: request.amount,
            description: &request.description,
            payer_email: &request.customer_email,
            customer_name: request.customer_name.as_deref(),
            items: request
                .items
                .iter()
                .map(|item| InvoiceItemPayload {
                    name: &item.name,
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            success_redirect_url: &request.success_redirect_url,
        };

        let response = self
            .http
            .post(self.invoices_url())
            .basic_auth(&self.api_key, Some(""))
            .json(&payload)
            .send()
            .await
            .map_err(|e| DomainError::Upstream(format!("create invoice: {e}")))?;

        if !response.status().is_success() {
            return Err(DomainError::Upstream(format!(
                "create invoice: gateway returned {}",
                response.status()
            )));
        }
        let invoice: InvoiceResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Upstream(format!("create invoice: bad response: {e}")))?;
        Ok(CreatedInvoice {
            id: invoice.id,
            invoice_url: invoice.invoice_url,
        })
    }

    async fn get_invoice(&self, invoice_id: &str) -> Result<InvoiceSnapshot, DomainError> {
        let response = self
            .http
            .get(self.invoice_url(invoice_id))
            .basic_auth(&self.api_key, Some(""))
            .send()
            .await
            .map_err(|e| DomainError::Upstream(format!("get invoice: {e}")))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(DomainError::NotFound);
        }
        if !response.status().is_success() {
            return Err(DomainError::Upstream(format!(
                "get invoice: gateway returned {}",
                response.status()
            )));
        }
        let invoice: InvoiceResponse = response
            .json()
            .await
            .map_err(|e| DomainError::Upstream(format!("get invoice: bad response: {e}")))?;
        Ok(InvoiceSnapshot {
            id: invoice.id,
            status: GatewayStatus::parse(&invoice.status),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let gateway = HttpPaymentGateway::new("https://gateway.example/", "key");
        assert_eq!(gateway.invoices_url(), "https://gateway.example/v2/invoices");
        assert_eq!(
            gateway.invoice_url("inv-1"),
            "https://gateway.example/v2/invoices/inv-1"
        );
    }

    #[test]
    fn invoice_response_parses_gateway_json() {
        let invoice: InvoiceResponse = serde_json::from_str(
            r#"{"id":"inv-9","invoice_url":"https://pay.example/inv-9","status":"PAID","extra":"ignored"}"#,
        )
        .expect("should parse");
        assert_eq!(invoice.id, "inv-9");
        assert_eq!(invoice.invoice_url, "https://pay.example/inv-9");
        assert_eq!(GatewayStatus::parse(&invoice.status), GatewayStatus::Paid);
    }

    #[test]
    fn invoice_payload_serializes_expected_fields() {
        let payload = CreateInvoicePayload {
            external_id: "order-31".to_string(),
            amount: 24_000,
            description: "Order #05102500031",
            payer_email: "customer@example.com",
            customer_name: None,
            items: vec![InvoiceItemPayload {
                name: "Mug",
                quantity: 2,
                price: 12_000,
            }],
            success_redirect_url: "https://shop.example/payments/success/05102500031",
        };
        let json = serde_json::to_value(&payload).expect("should serialize");
        assert_eq!(json["external_id"], "order-31");
        assert_eq!(json["amount"], 24_000);
        assert_eq!(json["items"][0]["name"], "Mug");
        assert!(json.get("customer_name").is_none());
    }
}
