//! Client records with unique email and phone.

use std::sync::Arc;

use crate::clock::Clock;
use crate::db::ClientStore;
use crate::error::{Error, Result};
use crate::models::{Client, ClientDetails, ClientFilter, EntityKind};
use crate::sync::WriteLock;
use crate::util::normalize_text_option;

pub struct ClientService {
    store: Arc<dyn ClientStore>,
    clock: Arc<dyn Clock>,
    writes: WriteLock,
}

impl ClientService {
    pub fn new(store: Arc<dyn ClientStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            writes: WriteLock::new(),
        }
    }

    /// Share the write lock used by the client reconciliation engine.
    #[must_use]
    pub fn with_write_lock(mut self, writes: WriteLock) -> Self {
        self.writes = writes;
        self
    }

    pub async fn list(&self) -> Result<Vec<Client>> {
        self.store.list(&ClientFilter::default()).await
    }

    /// Case-insensitive substring match on the name.
    pub async fn search_by_name(&self, fragment: &str) -> Result<Vec<Client>> {
        let fragment = normalize_text_option(Some(fragment.to_string()))
            .ok_or_else(|| Error::InvalidInput("Search name is required".to_string()))?;
        self.store
            .list(&ClientFilter {
                name_contains: Some(fragment),
            })
            .await
    }

    pub async fn get(&self, id: &str) -> Result<Client> {
        self.store
            .get_by_id(id)
            .await?
            .ok_or_else(|| Error::not_found(EntityKind::Client, id))
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Client>> {
        self.store.find_by_email(email.trim()).await
    }

    pub async fn create(&self, details: ClientDetails) -> Result<Client> {
        let client = details.into_client(self.clock.now())?;

        let _writes = self.writes.acquire().await;
        if self.store.exists_by_id(&client.id).await? {
            return Err(Error::InvalidInput(format!(
                "Client already exists with id: {}",
                client.id
            )));
        }
        self.ensure_unique_identity(&client, None).await?;

        let stored = self.store.upsert(&client).await?;
        tracing::info!(id = %stored.id, "Client created");
        Ok(stored)
    }

    /// Replace name, email and phone.
    pub async fn update(&self, id: &str, details: ClientDetails) -> Result<Client> {
        let details = details.validated()?;

        let _writes = self.writes.acquire().await;
        let mut client = self.get(id).await?;
        client.name = details.name;
        client.email = details.email;
        client.phone = details.phone;
        self.ensure_unique_identity(&client, Some(id)).await?;

        client.touch(self.clock.now());
        let stored = self.store.upsert(&client).await?;
        tracing::info!(id = %stored.id, "Client updated");
        Ok(stored)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let _writes = self.writes.acquire().await;
        if !self.store.delete(id).await? {
            return Err(Error::not_found(EntityKind::Client, id));
        }
        tracing::info!(%id, "Client deleted");
        Ok(())
    }

    async fn ensure_unique_identity(&self, client: &Client, owner: Option<&str>) -> Result<()> {
        let owned_by_other = |found: Option<Client>| {
            found.is_some_and(|existing| Some(existing.id.as_str()) != owner)
        };

        if owned_by_other(self.store.find_by_email(&client.email).await?) {
            return Err(Error::DuplicateIdentity {
                field: "email",
                value: client.email.clone(),
            });
        }
        if owned_by_other(self.store.find_by_phone(&client.phone).await?) {
            return Err(Error::DuplicateIdentity {
                field: "phone",
                value: client.phone.clone(),
            });
        }
        Ok(())
    }
}
