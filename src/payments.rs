use log::{ info, warn };
use reqwest::Client as HttpClient;
use serde::{ Deserialize, Serialize };
use std::time::Duration;
use thiserror::Error;

use crate::cli::Args;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payments are not configured")]
    NotConfigured,
    #[error("payment provider request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("payment provider returned no checkout url")]
    MissingUrl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    pub url: String,
}

#[derive(Deserialize)]
struct StripeSession {
    id: String,
    url: Option<String>,
}

/// Thin Stripe Checkout client for the subscription upgrade.
pub struct PaymentGateway {
    http: HttpClient,
    secret_key: String,
    price_id: String,
    success_url: String,
    cancel_url: String,
    base_url: String,
}

impl PaymentGateway {
    pub fn from_args(args: &Args) -> Result<Option<Self>, PaymentError> {
        if args.stripe_secret_key.trim().is_empty() || args.stripe_price_id.trim().is_empty() {
            warn!("Payments disabled: STRIPE_SECRET_KEY or STRIPE_PRICE_ID missing");
            return Ok(None);
        }
        let http = HttpClient::builder()
            .timeout(Duration::from_secs(args.http_timeout_secs))
            .build()?;
        info!("Payments configured: BaseURL={}", args.stripe_base_url);
        Ok(
            Some(Self {
                http,
                secret_key: args.stripe_secret_key.clone(),
                price_id: args.stripe_price_id.clone(),
                success_url: args.stripe_success_url.clone(),
                cancel_url: args.stripe_cancel_url.clone(),
                base_url: args.stripe_base_url.clone(),
            })
        )
    }

    fn form_fields(&self, user_email: &str) -> Vec<(&'static str, String)> {
        vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", self.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("customer_email", user_email.to_string()),
            ("client_reference_id", crate::history::user_id_for(user_email)),
            ("success_url", self.success_url.clone()),
            ("cancel_url", self.cancel_url.clone())
        ]
    }

    pub async fn create_checkout_session(
        &self,
        user_email: &str
    ) -> Result<CheckoutSession, PaymentError> {
        let url = format!("{}/v1/checkout/sessions", self.base_url.trim_end_matches('/'));
        let session = self.http
            .post(&url)
            .basic_auth(&self.secret_key, None::<&str>)
            .form(&self.form_fields(user_email))
            .send()
            .await?
            .error_for_status()?
            .json::<StripeSession>()
            .await?;
        let url = session.url.ok_or(PaymentError::MissingUrl)?;
        Ok(CheckoutSession { id: session.id, url })
    }
}
