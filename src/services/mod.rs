//! Outbound collaborators. Each sits behind a trait so the HTTP layer can
//! run against stubs and so a missing credential only disables its own
//! endpoint.

pub mod chat;
pub mod notify;
pub mod places;

use async_trait::async_trait;

use crate::error::ServiceError;

pub use chat::{ChatCommand, GeminiClient};
pub use notify::{resolve_recipient, DonationDetails, DonationNotice, SmtpNotifier};
pub use places::{Ngo, NominatimClient};

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// `Ok(None)` means the upstream answered but produced no text
    /// (e.g. the candidate was blocked).
    async fn generate(&self, prompt: &str) -> Result<Option<String>, ServiceError>;
}

#[async_trait]
pub trait PlacesLookup: Send + Sync {
    async fn nearby_ngos(&self, lat: f64, lng: f64) -> Result<Vec<Ngo>, ServiceError>;
}

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, notice: &DonationNotice) -> Result<(), ServiceError>;
}
