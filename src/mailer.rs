use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::Config;

/// Best-effort delivery of verification emails. Implementations never fail;
/// the return value only reports whether the message was handed off.
#[async_trait]
pub trait VerificationMailer: Send + Sync {
    async fn send_verification_email(&self, address: &str, first_name: &str, token: &str) -> bool;
}

/// Picks the HTTP provider when one is configured, otherwise a mailer that
/// only logs.
pub fn mailer_from_config(config: &Config) -> Arc<dyn VerificationMailer> {
    match &config.mail_api_url {
        Some(endpoint) => match HttpMailer::new(endpoint.clone(), config) {
            Ok(mailer) => Arc::new(mailer),
            Err(e) => {
                tracing::warn!("Failed to build mail client, verification mail disabled: {}", e);
                Arc::new(DisabledMailer)
            }
        },
        None => {
            tracing::warn!("MAIL_API_URL not set, verification mail disabled");
            Arc::new(DisabledMailer)
        }
    }
}

#[derive(Serialize)]
struct OutgoingMail<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: String,
}

/// Posts mail as JSON to a transactional mail provider.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    from: String,
    verify_url_base: String,
}

impl HttpMailer {
    pub fn new(endpoint: String, config: &Config) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.mail_api_key.clone(),
            from: config.mail_from.clone(),
            verify_url_base: config.verify_url_base.clone(),
        })
    }

    fn body(&self, first_name: &str, token: &str) -> String {
        format!(
            "Hi {first_name},\n\n\
             Welcome aboard! Confirm your university email by opening the link below:\n\n\
             {}?token={token}\n\n\
             If you did not create an account you can ignore this message.",
            self.verify_url_base
        )
    }
}

#[async_trait]
impl VerificationMailer for HttpMailer {
    async fn send_verification_email(&self, address: &str, first_name: &str, token: &str) -> bool {
        let mail = OutgoingMail {
            from: &self.from,
            to: address,
            subject: "Verify your university email",
            text: self.body(first_name, token),
        };

        let mut request = self.client.post(&self.endpoint).json(&mail);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        match request.send().await {
            Ok(resp) if resp.status().is_success() => {
                tracing::info!("Verification email sent to {}", address);
                true
            }
            Ok(resp) => {
                tracing::warn!(
                    "Mail provider rejected verification email to {}: {}",
                    address,
                    resp.status()
                );
                false
            }
            Err(e) => {
                tracing::warn!("Failed to send verification email to {}: {}", address, e);
                false
            }
        }
    }
}

pub struct DisabledMailer;

#[async_trait]
impl VerificationMailer for DisabledMailer {
    async fn send_verification_email(&self, address: &str, _first_name: &str, _token: &str) -> bool {
        tracing::warn!("Mail disabled, verification email to {} not sent", address);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disabled_mailer_reports_failure() {
        assert!(!DisabledMailer.send_verification_email("a@iitd.ac.in", "A", "t").await);
    }

    #[tokio::test]
    async fn unreachable_provider_reports_failure() {
        let config = Config::default();
        // Port 9 (discard) on localhost is not expected to run an HTTP server.
        let mailer = HttpMailer::new("http://127.0.0.1:9/send".to_string(), &config).unwrap();
        assert!(!mailer.send_verification_email("a@iitd.ac.in", "A", "t").await);
    }

    #[test]
    fn body_carries_the_verification_link() {
        let config = Config::default();
        let mailer = HttpMailer::new("http://localhost/send".to_string(), &config).unwrap();
        let body = mailer.body("Asha", "abc123");
        assert!(body.contains("Hi Asha"));
        assert!(body.contains("verify-email?token=abc123"));
    }
}
