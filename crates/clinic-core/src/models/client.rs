//! Client model

use chrono::NaiveDateTime;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::error::{Error, Result};
use crate::models::appointment::new_record_id;
use crate::models::EntityKind;
use crate::sync::SyncRecord;
use crate::util::normalize_text_option;

static EMAIL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("Invalid regex"));

/// A clinic client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Client {
    pub id: String,
    pub name: String,
    /// Unique among clients
    pub email: String,
    /// Unique among clients
    pub phone: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Client {
    pub fn touch(&mut self, now: NaiveDateTime) {
        self.updated_at = now.max(self.created_at);
    }
}

/// Client fields supplied by API writes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientDetails {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl ClientDetails {
    /// Trim and validate; the id is ignored here.
    pub fn validated(self) -> Result<Self> {
        let name = normalize_text_option(Some(self.name))
            .ok_or_else(|| Error::InvalidInput("Client name is required".to_string()))?;
        let email = normalize_text_option(Some(self.email))
            .ok_or_else(|| Error::InvalidInput("Client email is required".to_string()))?;
        if !EMAIL_PATTERN.is_match(&email) {
            return Err(Error::InvalidInput(format!("Invalid email address: {email}")));
        }
        let phone = normalize_text_option(Some(self.phone))
            .ok_or_else(|| Error::InvalidInput("Client phone is required".to_string()))?;

        Ok(Self {
            id: normalize_text_option(self.id),
            name,
            email,
            phone,
        })
    }

    /// Build a new record, generating an id when none was supplied.
    pub fn into_client(self, now: NaiveDateTime) -> Result<Client> {
        let details = self.validated()?;
        Ok(Client {
            id: details.id.unwrap_or_else(new_record_id),
            name: details.name,
            email: details.email,
            phone: details.phone,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Store query for clients
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientFilter {
    /// Case-insensitive substring of the name
    pub name_contains: Option<String>,
}

/// Client as served by the external feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalClient {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: String,
}

impl SyncRecord for Client {
    const KIND: EntityKind = EntityKind::Client;

    type Wire = ExternalClient;
    type Filter = ClientFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn from_external(wire: Self::Wire, now: NaiveDateTime) -> Self {
        Self {
            id: wire.id,
            name: wire.name,
            email: wire.email,
            phone: wire.phone,
            created_at: now,
            updated_at: now,
        }
    }

    fn absorb_external(&mut self, external: &Self, now: NaiveDateTime) -> bool {
        let mut changed = false;
        if self.name != external.name {
            self.name.clone_from(&external.name);
            changed = true;
        }
        if self.email != external.email {
            self.email.clone_from(&external.email);
            changed = true;
        }
        if self.phone != external.phone {
            self.phone.clone_from(&external.phone);
            changed = true;
        }
        if changed {
            self.touch(now);
        }
        changed
    }
}
