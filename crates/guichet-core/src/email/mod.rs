//! Transactional email outbox
//!
//! The sync only triggers template-keyed emails; rendering and delivery
//! belong to the transactional-email provider behind the HTTP API.

use serde_json::json;

use crate::error::{Error, Result};
use crate::util::{is_http_url, normalize_text_option};

/// A template-keyed transactional email with substitution parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionalEmail {
    /// No local account matched an account-update request; sent to the
    /// applicant's current email.
    NoUserFound {
        recipient: String,
        application_number: i64,
    },
    /// An idle request was classified without continuation; sent to the
    /// matched local user.
    MarkedWithoutContinuation {
        recipient: String,
        application_number: i64,
    },
}

impl TransactionalEmail {
    /// Template identifier on the email provider.
    #[must_use]
    pub const fn template_id(&self) -> &'static str {
        match self {
            Self::NoUserFound { .. } => "account-update-no-user-found",
            Self::MarkedWithoutContinuation { .. } => "account-update-without-continuation",
        }
    }

    #[must_use]
    pub fn recipient(&self) -> &str {
        match self {
            Self::NoUserFound { recipient, .. }
            | Self::MarkedWithoutContinuation { recipient, .. } => recipient,
        }
    }

    #[must_use]
    pub const fn application_number(&self) -> i64 {
        match self {
            Self::NoUserFound {
                application_number, ..
            }
            | Self::MarkedWithoutContinuation {
                application_number, ..
            } => *application_number,
        }
    }
}

/// Email-sending capability needed by the sync.
#[allow(async_fn_in_trait)]
pub trait EmailOutbox {
    /// Queue one transactional email for delivery.
    async fn enqueue(&self, email: TransactionalEmail) -> Result<()>;
}

/// reqwest-backed outbox posting to the transactional-email API.
#[derive(Clone)]
pub struct HttpEmailOutbox {
    endpoint: String,
    token: String,
    client: reqwest::Client,
}

impl HttpEmailOutbox {
    /// Create an outbox for the given API endpoint and token.
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let endpoint = normalize_text_option(Some(endpoint.into()))
            .filter(|endpoint| is_http_url(endpoint))
            .ok_or_else(|| {
                Error::InvalidInput("email endpoint must include http:// or https://".to_string())
            })?;
        let token = normalize_text_option(Some(token.into()))
            .ok_or_else(|| Error::InvalidInput("email API token must not be empty".to_string()))?;

        Ok(Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            token,
            client: reqwest::Client::builder().build()?,
        })
    }
}

impl EmailOutbox for HttpEmailOutbox {
    async fn enqueue(&self, email: TransactionalEmail) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.token)
            .json(&json!({
                "template_id": email.template_id(),
                "to": email.recipient(),
                "params": { "application_number": email.application_number() },
            }))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Email(format!(
                "{} ({})",
                crate::util::compact_text(&body),
                status.as_u16()
            )));
        }

        tracing::debug!(
            template = email.template_id(),
            application = email.application_number(),
            "Queued transactional email"
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{EmailOutbox, TransactionalEmail};
    use crate::error::Result;

    /// In-memory outbox recording every enqueued email.
    #[derive(Debug, Default)]
    pub struct RecordingEmailOutbox {
        sent: Mutex<Vec<TransactionalEmail>>,
    }

    impl RecordingEmailOutbox {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn sent(&self) -> Vec<TransactionalEmail> {
            self.sent.lock().unwrap().clone()
        }
    }

    impl EmailOutbox for RecordingEmailOutbox {
        async fn enqueue(&self, email: TransactionalEmail) -> Result<()> {
            self.sent.lock().unwrap().push(email);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_ids_are_stable() {
        let email = TransactionalEmail::NoUserFound {
            recipient: "jeune@example.com".to_string(),
            application_number: 42,
        };
        assert_eq!(email.template_id(), "account-update-no-user-found");
        assert_eq!(email.recipient(), "jeune@example.com");
        assert_eq!(email.application_number(), 42);

        let email = TransactionalEmail::MarkedWithoutContinuation {
            recipient: "jeune@example.com".to_string(),
            application_number: 43,
        };
        assert_eq!(email.template_id(), "account-update-without-continuation");
    }

    #[test]
    fn outbox_rejects_invalid_endpoint() {
        assert!(HttpEmailOutbox::new("api.example.com", "token").is_err());
        assert!(HttpEmailOutbox::new("https://api.example.com", "  ").is_err());
        assert!(HttpEmailOutbox::new("https://api.example.com/v3/smtp/email/", "token").is_ok());
    }
}
