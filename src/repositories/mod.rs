//! Presence storage: the store contract and its Redis and in-process backends.

pub mod memory_repo;
pub mod redis_repo;

pub use memory_repo::MemoryRepository;
pub use redis_repo::RedisRepository;

use async_trait::async_trait;

use crate::error::AppResult;
use crate::models::{PresenceContext, PresenceEntry};

/// TTL-backed key-value store of online users with role and customer indexes.
///
/// Writes are upserts (last write wins). Index sets may briefly reference
/// entries that already expired; readers filter those out.
#[async_trait]
pub trait PresenceStore: Send + Sync {
    /// Write the entry and add the user to the global, role and customer indexes,
    /// refreshing the TTL on every key touched.
    async fn add_online_user(&self, user_id: &str, entry: &PresenceEntry) -> AppResult<()>;

    /// Delete the entry and drop the user from the global index. With a context the
    /// role and customer indexes are cleaned as well.
    async fn remove_online_user(
        &self,
        user_id: &str,
        context: Option<&PresenceContext>,
    ) -> AppResult<()>;

    /// Bump `lastSeen` and every TTL. Returns `false` when the user has no live entry.
    async fn update_last_seen(&self, user_id: &str) -> AppResult<bool>;

    /// Every live entry referenced by the global index.
    async fn get_online_users(&self) -> AppResult<Vec<PresenceEntry>>;

    /// User ids in an index set whose entries are still live.
    async fn online_user_ids_in(&self, index_key: &str) -> AppResult<Vec<String>>;
}

pub(crate) fn parse_entries<I>(raw: I) -> Vec<PresenceEntry>
where
    I: IntoIterator<Item = Option<String>>,
{
    raw.into_iter()
        .flatten()
        .filter_map(|data| serde_json::from_str::<PresenceEntry>(&data).ok())
        .collect()
}
