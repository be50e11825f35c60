use anyhow::{Context, anyhow};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::models::CartItem;

/// Thin pass-through to PayPal's order API. An access token is requested
/// per call with the client-credentials grant; responses are returned
/// largely unmodified.
pub struct PayPalClient {
    client_id: String,
    client_secret: String,
    base_url: String,
    http: reqwest::Client,
}

fn api_base(mode: &str) -> &'static str {
    if mode.eq_ignore_ascii_case("live") {
        "https://api-m.paypal.com"
    } else {
        "https://api-m.sandbox.paypal.com"
    }
}

impl PayPalClient {
    pub fn new(client_id: String, client_secret: String, mode: &str, http: reqwest::Client) -> Self {
        Self {
            client_id,
            client_secret,
            base_url: api_base(mode).to_string(),
            http,
        }
    }

    async fn access_token(&self) -> Result<String, anyhow::Error> {
        #[derive(Deserialize)]
        struct TokenResponse {
            access_token: String,
        }

        let rsp = self
            .http
            .post(format!("{}/v1/oauth2/token", self.base_url))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .context("token request failed")?;
        if !rsp.status().is_success() {
            return Err(anyhow!("token request rejected: {}", rsp.status()));
        }
        let token: TokenResponse = rsp.json().await.context("unreadable token response")?;
        Ok(token.access_token)
    }

    pub async fn create_order(
        &self,
        items: &[CartItem],
        currency: &str,
    ) -> Result<Value, anyhow::Error> {
        let req = self
            .http
            .post(format!("{}/v2/checkout/orders", self.base_url))
            .header("Prefer", "return=representation")
            .json(&order_body(items, currency));
        self.execute(req).await
    }

    pub async fn capture_order(&self, order_id: &str) -> Result<Value, anyhow::Error> {
        let req = self
            .http
            .post(format!(
                "{}/v2/checkout/orders/{order_id}/capture",
                self.base_url
            ))
            .json(&json!({}));
        self.execute(req).await
    }

    async fn execute(&self, req: reqwest::RequestBuilder) -> Result<Value, anyhow::Error> {
        let token = self.access_token().await?;
        let rsp = req
            .bearer_auth(token)
            .send()
            .await
            .context("paypal request failed")?;
        let status = rsp.status();
        let body = rsp.text().await.context("unreadable paypal response")?;
        if !status.is_success() {
            return Err(anyhow!("paypal responded {status}: {body}"));
        }
        serde_json::from_str(&body).context("paypal response is not JSON")
    }
}

/// Order-create body: one purchase unit carrying the cart total and the
/// line items, all amounts formatted with two fraction digits.
pub fn order_body(items: &[CartItem], currency: &str) -> Value {
    let total: f64 = items.iter().map(|it| it.price * it.qty as f64).sum();
    json!({
        "intent": "CAPTURE",
        "purchase_units": [{
            "amount": {
                "currency_code": currency,
                "value": format!("{total:.2}"),
            },
            "items": items.iter().map(|it| json!({
                "name": it.name,
                "unit_amount": {
                    "currency_code": currency,
                    "value": format!("{:.2}", it.price),
                },
                "quantity": it.qty.to_string(),
            })).collect::<Vec<_>>(),
        }]
    })
}
