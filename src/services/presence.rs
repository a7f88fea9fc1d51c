//! Presence lifecycle: register on connect, refresh on heartbeat, remove on disconnect.

use std::sync::Arc;
use tracing::{debug, info, instrument};

use crate::error::AppResult;
use crate::models::presence::{customer_index_key, role_index_key};
use crate::models::{Identity, PresenceContext, PresenceEntry};
use crate::repositories::PresenceStore;

/// The only writer of presence data.
#[derive(Clone)]
pub struct PresenceService {
    store: Arc<dyn PresenceStore>,
}

impl PresenceService {
    pub fn new(store: Arc<dyn PresenceStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn connect(&self, identity: &Identity, socket_id: &str) -> AppResult<()> {
        let entry = PresenceEntry::connected(identity, socket_id);
        self.store.add_online_user(&identity.user_id, &entry).await?;
        info!(socket_id = %socket_id, "user online");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn heartbeat(&self, user_id: &str) -> AppResult<bool> {
        let refreshed = self.store.update_last_seen(user_id).await?;
        debug!(refreshed, "presence heartbeat");
        Ok(refreshed)
    }

    /// The connection owns its identity, so scoped indexes are always cleaned here.
    #[instrument(skip(self, identity), fields(user_id = %identity.user_id))]
    pub async fn disconnect(&self, identity: &Identity) -> AppResult<()> {
        let context = PresenceContext::from(identity);
        self.store
            .remove_online_user(&identity.user_id, Some(&context))
            .await?;
        info!("user offline");
        Ok(())
    }

    pub async fn online_users(&self) -> AppResult<Vec<PresenceEntry>> {
        self.store.get_online_users().await
    }

    pub async fn online_user_ids_by_role(&self, role: &str) -> AppResult<Vec<String>> {
        self.store.online_user_ids_in(&role_index_key(role)).await
    }

    pub async fn online_user_ids_by_customer(&self, customer_id: &str) -> AppResult<Vec<String>> {
        self.store
            .online_user_ids_in(&customer_index_key(customer_id))
            .await
    }
}
