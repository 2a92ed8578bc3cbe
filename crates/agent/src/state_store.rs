//! Per-user conversation state with write-through persistence.
//!
//! Turns for one user are serialized through a lock taken in
//! [`ConversationStateStore::begin_turn`] and released when the returned
//! [`TurnGuard`] is committed or dropped. Reads and writes outside a turn take
//! the same lock. Locks are created lazily and kept in a registry guarded by
//! its own mutex; different users never contend. A user's entry is dropped
//! when the conversation is cleared or evicted and no task still holds it.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use construkt_core::config::ConversationConfig;
use construkt_core::domain::conversation::{ConversationMemory, MemoryMutation};
use construkt_core::errors::{ApplicationError, DomainError};
use construkt_db::repositories::ConversationRepository;

pub struct ConversationStateStore {
    repository: Arc<dyn ConversationRepository>,
    cache: RwLock<HashMap<String, ConversationMemory>>,
    locks: StdMutex<HashMap<String, Arc<Mutex<()>>>>,
    timeout: Duration,
    history_limit: usize,
}

/// Exclusive access to one user's memory for the duration of a turn.
pub struct TurnGuard {
    memory: ConversationMemory,
    _lock: OwnedMutexGuard<()>,
}

impl TurnGuard {
    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    /// Drops everything remembered about the user, keeping only the id.
    pub fn reset(&mut self) {
        self.memory = ConversationMemory::new(self.memory.user_id.clone());
    }
}

impl ConversationStateStore {
    pub fn new(repository: Arc<dyn ConversationRepository>, config: &ConversationConfig) -> Self {
        Self {
            repository,
            cache: RwLock::new(HashMap::new()),
            locks: StdMutex::new(HashMap::new()),
            timeout: Duration::seconds(i64::try_from(config.context_timeout_secs).unwrap_or(i64::MAX)),
            history_limit: config.intent_history_limit,
        }
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        locks.entry(user_id.to_owned()).or_default().clone()
    }

    /// Removes the user's lock from the registry unless a caller still holds a
    /// handle to it.
    fn release_lock(&self, user_id: &str) {
        let mut locks = match self.locks.lock() {
            Ok(locks) => locks,
            Err(poisoned) => poisoned.into_inner(),
        };
        if locks.get(user_id).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(user_id);
        }
    }

    #[cfg(test)]
    fn tracked_locks(&self) -> usize {
        match self.locks.lock() {
            Ok(locks) => locks.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Memory for `user_id`, loaded from the repository on a cache miss and
    /// created fresh when absent, unreadable or expired. Waits for any turn
    /// in progress for the user.
    pub async fn get(&self, user_id: &str) -> ConversationMemory {
        let lock = self.user_lock(user_id);
        let _held = lock.lock().await;
        self.load(user_id).await
    }

    /// Cache-or-repository read. Callers hold the user's lock.
    async fn load(&self, user_id: &str) -> ConversationMemory {
        let now = Utc::now();
        if let Some(memory) = self.cache.read().await.get(user_id) {
            if !memory.is_expired(now, self.timeout) {
                return memory.clone();
            }
        }

        let memory = match self.repository.load(user_id).await {
            Ok(Some(stored)) if !stored.is_expired(now, self.timeout) => stored,
            Ok(Some(_)) => {
                debug!(event_name = "conversation.state.expired", user_id, "starting a fresh conversation");
                ConversationMemory::new(user_id)
            }
            Ok(None) => ConversationMemory::new(user_id),
            Err(error) => {
                warn!(
                    event_name = "conversation.load.failed",
                    user_id,
                    error = %error,
                    "could not load stored conversation, starting fresh"
                );
                ConversationMemory::new(user_id)
            }
        };

        self.cache.write().await.insert(user_id.to_owned(), memory.clone());
        memory
    }

    /// Replaces the user's memory outside of a turn.
    pub async fn save(&self, memory: &ConversationMemory) -> Result<(), ApplicationError> {
        let lock = self.user_lock(&memory.user_id);
        let _held = lock.lock().await;
        self.persist(memory).await
    }

    /// Cache and repository write. Callers hold the user's lock.
    async fn persist(&self, memory: &ConversationMemory) -> Result<(), ApplicationError> {
        self.cache.write().await.insert(memory.user_id.clone(), memory.clone());
        self.repository
            .save(memory)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))
    }

    /// Forgets the user entirely. Returns whether anything was stored.
    pub async fn clear(&self, user_id: &str) -> Result<bool, ApplicationError> {
        let removed = {
            let lock = self.user_lock(user_id);
            let _held = lock.lock().await;

            let cached = self.cache.write().await.remove(user_id).is_some();
            let stored = self.repository.delete(user_id).await;
            stored
                .map(|stored| cached || stored)
                .map_err(|error| ApplicationError::Persistence(error.to_string()))
        };
        self.release_lock(user_id);
        removed
    }

    /// Waits for the user's lock and returns their memory under it.
    pub async fn begin_turn(&self, user_id: &str) -> TurnGuard {
        let lock = self.user_lock(user_id).lock_owned().await;
        let memory = self.load(user_id).await;
        TurnGuard { memory, _lock: lock }
    }

    /// Applies the turn's mutations in order and writes the result through.
    ///
    /// A failed write is logged and the updated memory is still returned; the
    /// cache keeps the new state so the conversation continues in-process.
    pub async fn commit(
        &self,
        guard: TurnGuard,
        mutations: Vec<MemoryMutation>,
    ) -> Result<ConversationMemory, ApplicationError> {
        let TurnGuard { mut memory, _lock } = guard;
        memory.apply_all(mutations, self.history_limit);
        memory.touch();

        if let Some(current) = &memory.current_product {
            if !memory.has_mentioned(current.id) {
                return Err(DomainError::InvariantViolation(format!(
                    "current product {} was never mentioned",
                    current.id
                ))
                .into());
            }
        }

        if let Err(error) = self.persist(&memory).await {
            warn!(
                event_name = "conversation.persist.failed",
                user_id = %memory.user_id,
                error = %error,
                "conversation state kept in memory only"
            );
        }
        Ok(memory)
    }

    /// Evicts every conversation idle for longer than the timeout, from the
    /// cache and from storage. Each user's lock is held only while that user
    /// is checked and removed.
    pub async fn cleanup_expired(&self, now: DateTime<Utc>) -> Result<Vec<String>, ApplicationError> {
        let stored = self
            .repository
            .list_user_ids()
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        let mut candidates: BTreeSet<String> = stored.into_iter().collect();
        candidates.extend(self.cache.read().await.keys().cloned());

        let mut evicted = Vec::new();
        for user_id in candidates {
            if self.evict_if_expired(&user_id, now).await? {
                self.release_lock(&user_id);
                evicted.push(user_id);
            }
        }

        if !evicted.is_empty() {
            info!(
                event_name = "conversation.cleanup.evicted",
                count = evicted.len(),
                "evicted expired conversations"
            );
        }
        Ok(evicted)
    }

    async fn evict_if_expired(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, ApplicationError> {
        let lock = self.user_lock(user_id);
        let _held = lock.lock().await;

        let cached = self.cache.read().await.get(user_id).map(|memory| memory.last_access);
        let last_access = match cached {
            Some(last_access) => Some(last_access),
            None => match self.repository.load(user_id).await {
                Ok(memory) => memory.map(|memory| memory.last_access),
                Err(error) => {
                    warn!(
                        event_name = "conversation.cleanup.unreadable",
                        user_id = %user_id,
                        error = %error,
                        "skipping conversation that could not be read"
                    );
                    return Ok(false);
                }
            },
        };

        let expired = last_access
            .map(|last_access| now.signed_duration_since(last_access) > self.timeout)
            .unwrap_or(false);
        if !expired {
            return Ok(false);
        }

        self.cache.write().await.remove(user_id);
        self.repository
            .delete(user_id)
            .await
            .map_err(|error| ApplicationError::Persistence(error.to_string()))?;
        Ok(true)
    }

    /// Runs [`Self::cleanup_expired`] every `every` until the task is aborted.
    pub fn spawn_cleanup(store: Arc<Self>, every: std::time::Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                if let Err(error) = store.cleanup_expired(Utc::now()).await {
                    warn!(
                        event_name = "conversation.cleanup.failed",
                        error = %error,
                        "periodic conversation cleanup failed"
                    );
                }
            }
        })
    }
}
