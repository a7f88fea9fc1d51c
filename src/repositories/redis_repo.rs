//! Redis-backed presence: one JSON string per user plus index sets, all with a TTL.

use async_trait::async_trait;
use chrono::Utc;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;
use tracing::{debug, info};

use super::{parse_entries, PresenceStore};
use crate::error::AppResult;
use crate::models::presence::{entry_key, index_member, member_user_id, GLOBAL_INDEX};
use crate::models::{PresenceContext, PresenceEntry};

/// Redis repository. Multi-key writes go out as a single `MULTI`/`EXEC` pipeline.
#[derive(Clone)]
pub struct RedisRepository {
    conn: ConnectionManager,
    ttl_secs: u64,
}

impl RedisRepository {
    /// Connect to Redis; entries and indexes expire after `ttl`.
    pub async fn connect(redis_url: &str, ttl: Duration) -> AppResult<Self> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        info!(ttl_secs = ttl.as_secs(), "connected to redis presence store");
        Ok(Self {
            conn,
            ttl_secs: ttl.as_secs().max(1),
        })
    }

    /// Queue entry write plus index membership and expiry for every index in `context`.
    fn queue_upsert(&self, pipe: &mut redis::Pipeline, entry: &PresenceEntry, data: &str) {
        let member = index_member(&entry.user_id);
        pipe.cmd("SET")
            .arg(entry_key(&entry.user_id))
            .arg(data)
            .arg("EX")
            .arg(self.ttl_secs)
            .ignore();
        for index in entry.context().all_indexes() {
            pipe.sadd(&index, &member).ignore();
            pipe.cmd("EXPIRE").arg(&index).arg(self.ttl_secs).ignore();
        }
    }
}

#[async_trait]
impl PresenceStore for RedisRepository {
    async fn add_online_user(&self, user_id: &str, entry: &PresenceEntry) -> AppResult<()> {
        let data = serde_json::to_string(entry)?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        self.queue_upsert(&mut pipe, entry, &data);
        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        debug!(user_id = %user_id, "presence entry written");
        Ok(())
    }

    async fn remove_online_user(
        &self,
        user_id: &str,
        context: Option<&PresenceContext>,
    ) -> AppResult<()> {
        let member = index_member(user_id);
        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.del(entry_key(user_id)).ignore();
        pipe.srem(GLOBAL_INDEX, &member).ignore();
        if let Some(context) = context {
            for index in context.scoped_indexes() {
                pipe.srem(&index, &member).ignore();
            }
        }
        let mut conn = self.conn.clone();
        pipe.query_async::<_, ()>(&mut conn).await?;
        debug!(user_id = %user_id, scoped = context.is_some(), "presence entry removed");
        Ok(())
    }

    async fn update_last_seen(&self, user_id: &str) -> AppResult<bool> {
        let mut conn = self.conn.clone();
        let raw: Option<String> = conn.get(entry_key(user_id)).await?;
        let Some(mut entry) = raw.and_then(|d| serde_json::from_str::<PresenceEntry>(&d).ok())
        else {
            return Ok(false);
        };
        entry.last_seen = Utc::now();
        let data = serde_json::to_string(&entry)?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        self.queue_upsert(&mut pipe, &entry, &data);
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(true)
    }

    async fn get_online_users(&self) -> AppResult<Vec<PresenceEntry>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(GLOBAL_INDEX).await?;
        let keys: Vec<String> = members
            .iter()
            .filter_map(|m| member_user_id(m))
            .map(entry_key)
            .collect();
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let raw: Vec<Option<String>> = redis::cmd("MGET").arg(&keys).query_async(&mut conn).await?;
        Ok(parse_entries(raw))
    }

    async fn online_user_ids_in(&self, index_key: &str) -> AppResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn.smembers(index_key).await?;
        let ids: Vec<String> = members
            .iter()
            .filter_map(|m| member_user_id(m))
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let keys: Vec<String> = ids.iter().map(|id| entry_key(id)).collect();
        let live: Vec<bool> = {
            let mut pipe = redis::pipe();
            for key in &keys {
                pipe.exists(key);
            }
            pipe.query_async(&mut conn).await?
        };
        Ok(ids
            .into_iter()
            .zip(live)
            .filter_map(|(id, alive)| alive.then_some(id))
            .collect())
    }
}
