//! Mail transport and site configuration for tests/dev.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use duewatch_notifications::{MailError, Mailer, OutboundEmail, SiteInfo};
use duewatch_projects::ItemKind;

/// Recording mailer for tests/dev: keeps every delivered email and can be
/// told to refuse delivery for specific recipient addresses.
#[derive(Debug, Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<OutboundEmail>>,
    fail_for: Mutex<HashSet<String>>,
}

impl RecordingMailer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn arc() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Refuse delivery to `address` until further notice.
    pub fn fail_delivery_to(&self, address: impl Into<String>) {
        self.fail_for.lock().unwrap().insert(address.into());
    }

    pub fn accept_delivery_to(&self, address: &str) {
        self.fail_for.lock().unwrap().remove(address);
    }

    pub fn sent(&self) -> Vec<OutboundEmail> {
        self.sent.lock().unwrap().clone()
    }
}

impl Mailer for RecordingMailer {
    fn send(&self, email: &OutboundEmail) -> Result<(), MailError> {
        if self.fail_for.lock().unwrap().contains(&email.to) {
            return Err(MailError::Delivery(format!(
                "recipient refused: {}",
                email.to
            )));
        }
        self.sent.lock().unwrap().push(email.clone());
        Ok(())
    }
}

/// Fixed site configuration, with optional per-kind heading overrides.
#[derive(Debug, Clone)]
pub struct StaticSiteInfo {
    pub site_name: String,
    pub admin_email: String,
    pub labels: HashMap<ItemKind, String>,
}

impl StaticSiteInfo {
    pub fn new(site_name: impl Into<String>, admin_email: impl Into<String>) -> Self {
        Self {
            site_name: site_name.into(),
            admin_email: admin_email.into(),
            labels: HashMap::new(),
        }
    }

    pub fn with_label(mut self, kind: ItemKind, label: impl Into<String>) -> Self {
        self.labels.insert(kind, label.into());
        self
    }
}

impl SiteInfo for StaticSiteInfo {
    fn site_name(&self) -> String {
        self.site_name.clone()
    }

    fn admin_email(&self) -> String {
        self.admin_email.clone()
    }

    fn item_label_plural(&self, kind: ItemKind) -> String {
        self.labels
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| kind.default_label_plural().to_string())
    }
}
