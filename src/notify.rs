use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::{config::MailSettings, inquiries::Inquiry};

/// One outbound email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("mail relay request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("mail relay rejected message with status {0}")]
    Rejected(u16),
    #[error("notification sink unavailable: {0}")]
    Unavailable(String),
}

/// Receives new-inquiry notifications. Implementations may be slow or fail;
/// callers never let that affect the inquiry itself.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn inquiry_received(&self, inquiry: &Inquiry) -> Result<(), NotifyError>;
}

pub type DynNotifier = Arc<dyn Notifier>;

/// Hands the notification to a background task and returns immediately.
/// Failures are logged there and go nowhere else.
pub fn dispatch(notifier: DynNotifier, inquiry: Inquiry) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match notifier.inquiry_received(&inquiry).await {
            Ok(()) => info!(inquiry_id = inquiry.id, "inquiry notifications sent"),
            Err(err) => error!(
                ?err,
                inquiry_id = inquiry.id,
                "failed to send inquiry notifications"
            ),
        }
    })
}

/// Used when no mail relay is configured.
#[derive(Clone, Default)]
pub struct NoopNotifier;

#[async_trait]
impl Notifier for NoopNotifier {
    async fn inquiry_received(&self, inquiry: &Inquiry) -> Result<(), NotifyError> {
        warn!(
            inquiry_id = inquiry.id,
            "mail relay not configured; skipping inquiry notifications"
        );
        Ok(())
    }
}

/// Posts JSON messages to an HTTP mail relay: a confirmation to the
/// submitter, then an alert to the admin mailbox.
#[derive(Clone)]
pub struct HttpMailer {
    http: Client,
    settings: MailSettings,
}

impl HttpMailer {
    pub fn new(settings: MailSettings) -> Self {
        Self {
            http: Client::new(),
            settings,
        }
    }

    async fn send(&self, message: &MailMessage) -> Result<(), NotifyError> {
        let mut request = self.http.post(&self.settings.relay_url).json(message);
        if let Some(token) = &self.settings.relay_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            return Err(NotifyError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }
}

#[async_trait]
impl Notifier for HttpMailer {
    async fn inquiry_received(&self, inquiry: &Inquiry) -> Result<(), NotifyError> {
        let brand = &self.settings.brand;
        let from = format!("{brand} <{}>", self.settings.from_address);
        self.send(&confirmation_message(brand, &from, inquiry)).await?;
        self.send(&admin_alert_message(
            brand,
            &from,
            &self.settings.admin_address,
            inquiry,
        ))
        .await?;
        Ok(())
    }
}

/// Picks the relay-backed mailer when mail settings exist.
pub fn from_settings(settings: Option<MailSettings>) -> DynNotifier {
    match settings {
        Some(settings) => {
            info!(relay = %settings.relay_url, "inquiry notifications enabled");
            Arc::new(HttpMailer::new(settings))
        }
        None => Arc::new(NoopNotifier),
    }
}

pub fn confirmation_message(brand: &str, from: &str, inquiry: &Inquiry) -> MailMessage {
    MailMessage {
        from: from.to_string(),
        to: inquiry.email.clone(),
        subject: format!("Thank you for your inquiry - {brand}"),
        text: format!(
            "Dear {},\n\n\
             Thank you for reaching out to {brand}! We have received your inquiry \
             and will get in touch soon.\n\n\
             Your message: {}\n\n\
             Best regards,\n{brand} Team",
            inquiry.name, inquiry.message
        ),
    }
}

pub fn admin_alert_message(
    brand: &str,
    from: &str,
    admin_address: &str,
    inquiry: &Inquiry,
) -> MailMessage {
    MailMessage {
        from: from.to_string(),
        to: admin_address.to_string(),
        subject: format!("New Inquiry Received - {brand}"),
        text: format!(
            "New inquiry received:\n\nName: {}\nEmail: {}\nLocation: {}\nMessage: {}",
            inquiry.name, inquiry.email, inquiry.location, inquiry.message
        ),
    }
}
