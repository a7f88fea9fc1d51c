//! Presence entries and the key layout shared by every presence backend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::identity::Identity;

const ENTRY_PREFIX: &str = "user_online:";
const MEMBER_PREFIX: &str = "user_";
const ROLE_INDEX_PREFIX: &str = "online_by_role:";
const CUSTOMER_INDEX_PREFIX: &str = "online_by_customer:";

/// Set of every online user.
pub const GLOBAL_INDEX: &str = "online_users_index";

/// One online user, stored under `user_online:<userId>`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceEntry {
    pub user_id: String,
    pub user_name: String,
    #[serde(rename = "customer_id")]
    pub customer_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    pub connected_at: DateTime<Utc>,
    pub last_seen: DateTime<Utc>,
    pub socket_id: String,
}

impl PresenceEntry {
    /// Fresh entry for a connection admitted right now.
    pub fn connected(identity: &Identity, socket_id: &str) -> Self {
        let now = Utc::now();
        Self {
            user_id: identity.user_id.clone(),
            user_name: identity.user_name.clone(),
            customer_id: identity.customer_id.clone(),
            roles: identity.roles.clone(),
            connected_at: now,
            last_seen: now,
            socket_id: socket_id.to_string(),
        }
    }

    pub fn context(&self) -> PresenceContext {
        PresenceContext {
            roles: self.roles.clone(),
            customer_id: self.customer_id.clone(),
        }
    }
}

/// Role and customer affiliation needed to clean the scoped indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PresenceContext {
    pub roles: Vec<String>,
    pub customer_id: Option<String>,
}

impl From<&Identity> for PresenceContext {
    fn from(identity: &Identity) -> Self {
        Self {
            roles: identity.roles.clone(),
            customer_id: identity.customer_id.clone(),
        }
    }
}

impl PresenceContext {
    /// Scoped index keys (role and customer) this context touches.
    pub fn scoped_indexes(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.roles.iter().map(|r| role_index_key(r)).collect();
        if let Some(customer) = &self.customer_id {
            keys.push(customer_index_key(customer));
        }
        keys
    }

    /// Global index followed by the scoped ones.
    pub fn all_indexes(&self) -> Vec<String> {
        let mut keys = vec![GLOBAL_INDEX.to_string()];
        keys.extend(self.scoped_indexes());
        keys
    }
}

pub fn entry_key(user_id: &str) -> String {
    format!("{}{}", ENTRY_PREFIX, user_id)
}

pub fn index_member(user_id: &str) -> String {
    format!("{}{}", MEMBER_PREFIX, user_id)
}

/// Inverse of [`index_member`].
pub fn member_user_id(member: &str) -> Option<&str> {
    member.strip_prefix(MEMBER_PREFIX).filter(|id| !id.is_empty())
}

pub fn role_index_key(role: &str) -> String {
    format!("{}{}", ROLE_INDEX_PREFIX, role)
}

pub fn customer_index_key(customer_id: &str) -> String {
    format!("{}{}", CUSTOMER_INDEX_PREFIX, customer_id)
}

/// Generate a unique socket/connection id.
pub fn generate_socket_id() -> String {
    format!("{}.{}", std::process::id(), Uuid::new_v4().as_simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_layout() {
        assert_eq!(entry_key("7"), "user_online:7");
        assert_eq!(index_member("7"), "user_7");
        assert_eq!(member_user_id("user_7"), Some("7"));
        assert_eq!(member_user_id("user_"), None);
        assert_eq!(member_user_id("7"), None);
        assert_eq!(role_index_key("admin"), "online_by_role:admin");
        assert_eq!(customer_index_key("c1"), "online_by_customer:c1");
    }

    #[test]
    fn context_indexes() {
        let identity = Identity::new("1", "a").with_roles(["admin", "agent"]).with_customer("c1");
        let ctx = PresenceContext::from(&identity);
        assert_eq!(
            ctx.all_indexes(),
            vec![
                "online_users_index",
                "online_by_role:admin",
                "online_by_role:agent",
                "online_by_customer:c1"
            ]
        );
        assert!(PresenceContext::default().scoped_indexes().is_empty());
    }

    #[test]
    fn entry_wire_names() {
        let entry = PresenceEntry::connected(&Identity::new("1", "alice"), "sock");
        let value = serde_json::to_value(&entry).unwrap();
        for field in ["userId", "userName", "customer_id", "roles", "connectedAt", "lastSeen", "socketId"] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }
}
