use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use base64::Engine;
use parking_lot::RwLock;

use crate::tprintln;

use super::attribute::AttributeValue;

/// Prefix of every session key written by the picker, so it cannot collide with other actions.
pub const PLUGIN_TYPE: &str = "identity-picker";
pub const PICKED_IDENTITY_SESSION_KEY: &str = "identity-picker-identity";
pub const IDENTITY_LIST_SESSION_KEY: &str = "identity-picker-identity_list";
pub const IDENTITY_MODEL_SESSION_KEY: &str = "identity-picker-identity_model";

pub type TransactionId = String;

/// Key/value session storage scoped to one authentication transaction.
pub trait SessionManager {
    fn put(&self, key: &str, value: AttributeValue);

    fn get(&self, key: &str) -> Option<AttributeValue>;

    /// Read and remove in one step. A concurrent replay observes `None`.
    fn remove(&self, key: &str) -> Option<AttributeValue>;
}

/// Standalone single-transaction session, for embedding the picker in a foreign pipeline.
#[derive(Debug, Default)]
pub struct MemorySession {
    entries: RwLock<HashMap<String, AttributeValue>>,
}

impl MemorySession {
    pub fn new() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { self.entries.read().is_empty() }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.entries.read().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl SessionManager for MemorySession {
    fn put(&self, key: &str, value: AttributeValue) {
        self.entries.write().insert(key.to_string(), value);
    }

    fn get(&self, key: &str) -> Option<AttributeValue> {
        self.entries.read().get(key).cloned()
    }

    fn remove(&self, key: &str) -> Option<AttributeValue> {
        self.entries.write().remove(key)
    }
}

#[derive(Debug)]
struct Transaction {
    entries: HashMap<String, AttributeValue>,
    expires_at: Instant,
}

impl Transaction {
    fn new(ttl: Duration) -> Self {
        Self { entries: HashMap::new(), expires_at: Instant::now() + ttl }
    }

    fn is_expired(&self, now: Instant) -> bool { self.expires_at <= now }
}

fn gen_id() -> anyhow::Result<TransactionId> {
    gen_id_with(getrandom::getrandom)
}

// 256-bit random id, base64url without padding
fn gen_id_with(fill: impl FnOnce(&mut [u8]) -> Result<(), getrandom::Error>) -> anyhow::Result<TransactionId> {
    let mut buf = [0u8; 32];
    fill(&mut buf).map_err(|e| anyhow::anyhow!("failed to generate transaction id: {}", e))?;
    Ok(base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(buf))
}

/// Shared in-memory store of all live authentication transactions.
///
/// Each transaction expires `ttl` after its last write. Expired transactions are invisible
/// to reads and are dropped by [`SessionStore::sweep`].
#[derive(Clone)]
pub struct SessionStore {
    ttl: Duration,
    transactions: Arc<RwLock<HashMap<TransactionId, Transaction>>>,
}

impl Default for SessionStore {
    fn default() -> Self { Self::new(Duration::from_secs(600)) }
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, transactions: Arc::new(RwLock::new(HashMap::new())) }
    }

    /// Open a new, empty transaction. Fails rather than reuse an id that is still live.
    pub fn begin(&self) -> anyhow::Result<TransactionId> {
        let txn = gen_id()?;
        self.insert_new(txn)
    }

    fn insert_new(&self, txn: TransactionId) -> anyhow::Result<TransactionId> {
        let mut map = self.transactions.write();
        if map.contains_key(&txn) {
            tracing::warn!("transaction id collision, refusing to overwrite a live transaction");
            anyhow::bail!("transaction id already in use");
        }
        map.insert(txn.clone(), Transaction::new(self.ttl));
        tprintln!("session.begin txn={} ttl_secs={}", txn, self.ttl.as_secs());
        Ok(txn)
    }

    pub fn contains(&self, txn: &str) -> bool {
        let now = Instant::now();
        self.transactions.read().get(txn).map(|t| !t.is_expired(now)).unwrap_or(false)
    }

    pub fn end(&self, txn: &str) -> bool {
        let removed = self.transactions.write().remove(txn).is_some();
        tprintln!("session.end txn={} removed={}", txn, removed);
        removed
    }

    /// Drop expired transactions; returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let mut map = self.transactions.write();
        let before = map.len();
        map.retain(|_, t| !t.is_expired(now));
        before - map.len()
    }

    pub fn scoped(&self, txn: &str) -> ScopedSession {
        ScopedSession { store: self.clone(), txn: txn.to_string() }
    }
}

/// View of a [`SessionStore`] restricted to one transaction.
#[derive(Clone)]
pub struct ScopedSession {
    store: SessionStore,
    txn: TransactionId,
}

impl SessionManager for ScopedSession {
    fn put(&self, key: &str, value: AttributeValue) {
        let now = Instant::now();
        let ttl = self.store.ttl;
        let mut map = self.store.transactions.write();
        let txn = map.entry(self.txn.clone()).or_insert_with(|| Transaction::new(ttl));
        if txn.is_expired(now) {
            txn.entries.clear();
        }
        txn.expires_at = now + ttl;
        txn.entries.insert(key.to_string(), value);
        tprintln!("session.put txn={} key={}", self.txn, key);
    }

    fn get(&self, key: &str) -> Option<AttributeValue> {
        let now = Instant::now();
        let map = self.store.transactions.read();
        let txn = map.get(&self.txn)?;
        if txn.is_expired(now) { return None; }
        txn.entries.get(key).cloned()
    }

    fn remove(&self, key: &str) -> Option<AttributeValue> {
        let now = Instant::now();
        let mut map = self.store.transactions.write();
        let txn = map.get_mut(&self.txn)?;
        if txn.is_expired(now) { return None; }
        let out = txn.entries.remove(key);
        tprintln!("session.remove txn={} key={} found={}", self.txn, key, out.is_some());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_namespaced_and_distinct() {
        let keys = [PICKED_IDENTITY_SESSION_KEY, IDENTITY_LIST_SESSION_KEY, IDENTITY_MODEL_SESSION_KEY];
        for k in keys {
            assert!(k.starts_with(PLUGIN_TYPE), "{} lacks prefix", k);
        }
        assert_ne!(keys[0], keys[1]);
        assert_ne!(keys[1], keys[2]);
        assert_ne!(keys[0], keys[2]);
    }

    #[test]
    fn remove_consumes_at_most_once() {
        let session = MemorySession::new();
        session.put("k", AttributeValue::from("v"));
        assert_eq!(session.get("k"), Some(AttributeValue::from("v")));
        assert_eq!(session.remove("k"), Some(AttributeValue::from("v")));
        assert_eq!(session.remove("k"), None);
        assert!(session.is_empty());
    }

    #[test]
    fn transactions_are_isolated() {
        let store = SessionStore::default();
        let a = store.begin().unwrap();
        let b = store.begin().unwrap();
        assert_ne!(a, b);
        store.scoped(&a).put(IDENTITY_LIST_SESSION_KEY, AttributeValue::from("a"));
        assert_eq!(store.scoped(&b).get(IDENTITY_LIST_SESSION_KEY), None);
        assert_eq!(store.scoped(&a).remove(IDENTITY_LIST_SESSION_KEY), Some(AttributeValue::from("a")));
        assert!(store.contains(&a));
        assert!(store.end(&a));
        assert!(!store.contains(&a));
    }

    #[test]
    fn expired_transactions_are_invisible_and_swept() {
        let store = SessionStore::new(Duration::ZERO);
        let txn = store.begin().unwrap();
        let session = store.scoped(&txn);
        session.put("k", AttributeValue::from("v"));
        assert!(!store.contains(&txn));
        assert_eq!(session.get("k"), None);
        assert_eq!(session.remove("k"), None);
        assert_eq!(store.sweep(), 1);
        assert_eq!(store.sweep(), 0);
    }

    #[test]
    fn id_generation_failure_is_reported() {
        let err = gen_id_with(|_| Err(getrandom::Error::UNSUPPORTED)).unwrap_err();
        assert!(err.to_string().contains("failed to generate transaction id"));

        let id = gen_id_with(|buf| { buf.fill(7); Ok(()) }).unwrap();
        assert_eq!(id.len(), 43);
    }

    #[test]
    fn begin_never_overwrites_a_live_transaction() {
        let store = SessionStore::default();
        let txn = store.insert_new("fixed".to_string()).unwrap();
        store.scoped(&txn).put(IDENTITY_LIST_SESSION_KEY, AttributeValue::from("kept"));
        assert!(store.insert_new("fixed".to_string()).is_err());
        assert_eq!(store.scoped(&txn).get(IDENTITY_LIST_SESSION_KEY), Some(AttributeValue::from("kept")));
    }
}
