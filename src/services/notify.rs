use async_trait::async_trait;
use lettre::{
    message::Mailbox, transport::smtp::authentication::Credentials, AsyncSmtpTransport,
    AsyncTransport, Message, Tokio1Executor,
};
use serde::{Deserialize, Serialize};

use super::{Ngo, Notifier};
use crate::{config::SmtpConfig, error::ServiceError};

/// Donation form as the map page posts it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DonationDetails {
    pub food_details: String,
    pub address: String,
    pub contact: String,
}

impl DonationDetails {
    /// First blank field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        [
            ("foodDetails", &self.food_details),
            ("address", &self.address),
            ("contact", &self.contact),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
    }
}

/// A resolved notification: who gets it and what it says.
#[derive(Debug, Clone, PartialEq)]
pub struct DonationNotice {
    pub to: String,
    pub ngo: Ngo,
    pub details: DonationDetails,
}

impl DonationNotice {
    pub fn subject(&self) -> String {
        format!("Food donation available for {}", self.ngo.name)
    }

    pub fn body(&self) -> String {
        format!(
            "Hello {name},\n\n\
             A food donation is ready for pickup.\n\n\
             Food: {food}\n\
             Pickup address: {address}\n\
             Donor contact: {contact}\n\n\
             This message was sent from the food spoilage assistant.\n",
            name = self.ngo.name,
            food = self.details.food_details.trim(),
            address = self.details.address.trim(),
            contact = self.details.contact.trim(),
        )
    }
}

/// SMTP delivery over STARTTLS.
pub struct SmtpNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(config: &SmtpConfig) -> Result<Self, ServiceError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| ServiceError::InvalidAddress(config.from.clone()))?;
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| ServiceError::Email(format!("SMTP relay error: {e}")))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

/// Where a notice for `ngo` goes: the NGO's own address when the directory
/// had one, else the configured fallback inbox.
pub fn resolve_recipient(ngo: &Ngo, fallback: Option<&str>) -> Option<String> {
    ngo.email
        .as_deref()
        .filter(|e| !e.trim().is_empty())
        .or(fallback)
        .map(str::to_string)
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn notify(&self, notice: &DonationNotice) -> Result<(), ServiceError> {
        let to: Mailbox = notice
            .to
            .parse()
            .map_err(|_| ServiceError::InvalidAddress(notice.to.clone()))?;
        let email = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notice.subject())
            .body(notice.body())
            .map_err(|e| ServiceError::Email(format!("failed to build email: {e}")))?;

        let response = self
            .mailer
            .send(email)
            .await
            .map_err(|e| ServiceError::Email(e.to_string()))?;
        tracing::info!(ngo = %notice.ngo.name, code = %response.code(), "donation notice sent");
        Ok(())
    }
}
