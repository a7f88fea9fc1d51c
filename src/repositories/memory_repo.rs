//! In-process presence backend for deployments without Redis.
//!
//! Keys expire lazily: every read checks the deadline against the tokio clock.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

use super::{parse_entries, PresenceStore};
use crate::error::AppResult;
use crate::models::presence::{entry_key, index_member, member_user_id, GLOBAL_INDEX};
use crate::models::{PresenceContext, PresenceEntry};

struct Expiring<T> {
    value: T,
    deadline: Instant,
}

impl<T> Expiring<T> {
    fn live(&self, now: Instant) -> bool {
        self.deadline > now
    }
}

#[derive(Default)]
struct Keyspace {
    strings: HashMap<String, Expiring<String>>,
    sets: HashMap<String, Expiring<HashSet<String>>>,
}

impl Keyspace {
    fn purge(&mut self, now: Instant) {
        self.strings.retain(|_, v| v.live(now));
        self.sets.retain(|_, v| v.live(now) && !v.value.is_empty());
    }

    fn get(&self, key: &str, now: Instant) -> Option<&String> {
        self.strings
            .get(key)
            .filter(|v| v.live(now))
            .map(|v| &v.value)
    }

    fn members(&self, key: &str, now: Instant) -> Vec<String> {
        self.sets
            .get(key)
            .filter(|v| v.live(now))
            .map(|v| v.value.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn upsert(&mut self, entry: &PresenceEntry, data: String, deadline: Instant, now: Instant) {
        self.strings.insert(
            entry_key(&entry.user_id),
            Expiring {
                value: data,
                deadline,
            },
        );
        let member = index_member(&entry.user_id);
        for index in entry.context().all_indexes() {
            let set = self.sets.entry(index).or_insert_with(|| Expiring {
                value: HashSet::new(),
                deadline,
            });
            if !set.live(now) {
                set.value.clear();
            }
            set.value.insert(member.clone());
            set.deadline = deadline;
        }
    }
}

/// Presence kept in process memory. Clones share the same keyspace.
#[derive(Clone)]
pub struct MemoryRepository {
    keyspace: Arc<RwLock<Keyspace>>,
    ttl: Duration,
}

impl MemoryRepository {
    pub fn new(ttl: Duration) -> Self {
        Self {
            keyspace: Arc::new(RwLock::new(Keyspace::default())),
            ttl,
        }
    }
}

#[async_trait]
impl PresenceStore for MemoryRepository {
    async fn add_online_user(&self, _user_id: &str, entry: &PresenceEntry) -> AppResult<()> {
        let data = serde_json::to_string(entry)?;
        let now = Instant::now();
        let mut keyspace = self.keyspace.write().await;
        keyspace.purge(now);
        keyspace.upsert(entry, data, now + self.ttl, now);
        Ok(())
    }

    async fn remove_online_user(
        &self,
        user_id: &str,
        context: Option<&PresenceContext>,
    ) -> AppResult<()> {
        let member = index_member(user_id);
        let mut indexes = vec![GLOBAL_INDEX.to_string()];
        if let Some(context) = context {
            indexes.extend(context.scoped_indexes());
        }
        let mut keyspace = self.keyspace.write().await;
        keyspace.strings.remove(&entry_key(user_id));
        for index in indexes {
            if let Some(set) = keyspace.sets.get_mut(&index) {
                set.value.remove(&member);
            }
        }
        keyspace.purge(Instant::now());
        Ok(())
    }

    async fn update_last_seen(&self, user_id: &str) -> AppResult<bool> {
        let now = Instant::now();
        let mut keyspace = self.keyspace.write().await;
        let Some(mut entry) = keyspace
            .get(&entry_key(user_id), now)
            .and_then(|d| serde_json::from_str::<PresenceEntry>(d).ok())
        else {
            return Ok(false);
        };
        entry.last_seen = Utc::now();
        let data = serde_json::to_string(&entry)?;
        keyspace.upsert(&entry, data, now + self.ttl, now);
        Ok(true)
    }

    async fn get_online_users(&self) -> AppResult<Vec<PresenceEntry>> {
        let now = Instant::now();
        let keyspace = self.keyspace.read().await;
        let raw: Vec<Option<String>> = keyspace
            .members(GLOBAL_INDEX, now)
            .iter()
            .filter_map(|m| member_user_id(m))
            .map(|id| keyspace.get(&entry_key(id), now).cloned())
            .collect();
        Ok(parse_entries(raw))
    }

    async fn online_user_ids_in(&self, index_key: &str) -> AppResult<Vec<String>> {
        let now = Instant::now();
        let keyspace = self.keyspace.read().await;
        Ok(keyspace
            .members(index_key, now)
            .iter()
            .filter_map(|m| member_user_id(m))
            .filter(|id| keyspace.get(&entry_key(id), now).is_some())
            .map(str::to_string)
            .collect())
    }
}
