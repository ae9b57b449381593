use std::sync::Arc;

use tracing::{debug, warn};

use cartsaver_core::ids::NudgeId;

use crate::kv::KeyValueStore;

/// Durable per-nudge "last shown" markers, stored as epoch milliseconds.
///
/// Reads fail open: an unreadable marker counts as never shown, so a storage
/// fault can never block a nudge permanently.
pub struct CooldownStore {
    storage: Arc<dyn KeyValueStore>,
}

impl CooldownStore {
    pub fn new(storage: Arc<dyn KeyValueStore>) -> Self {
        Self { storage }
    }

    pub fn key_for(nudge_id: &NudgeId) -> String {
        format!("cartsaver_last_{nudge_id}")
    }

    pub fn last_shown(&self, nudge_id: &NudgeId) -> Option<i64> {
        let key = Self::key_for(nudge_id);
        match self.storage.get(&key) {
            Ok(Some(raw)) => match raw.trim().parse::<i64>() {
                Ok(ms) => Some(ms),
                Err(_) => {
                    debug!(nudge_id = %nudge_id, raw = %raw, "ignoring malformed cooldown marker");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(nudge_id = %nudge_id, error = %e, "cooldown storage unreadable, treating as eligible");
                None
            }
        }
    }

    pub fn set_shown(&self, nudge_id: &NudgeId, now_ms: i64) {
        let key = Self::key_for(nudge_id);
        if let Err(e) = self.storage.set(&key, &now_ms.to_string()) {
            warn!(
                nudge_id = %nudge_id,
                error = %e,
                error_kind = "storage_unavailable",
                "cooldown marker not persisted"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryStore, UnavailableStore};

    #[test]
    fn absent_marker_is_none() {
        let store = CooldownStore::new(Arc::new(MemoryStore::new()));
        assert_eq!(store.last_shown(&NudgeId::from_raw("n1")), None);
    }

    #[test]
    fn set_then_read() {
        let storage = Arc::new(MemoryStore::new());
        let store = CooldownStore::new(storage.clone());
        let n = NudgeId::from_raw("n1");
        store.set_shown(&n, 1_700_000_000_123);
        assert_eq!(store.last_shown(&n), Some(1_700_000_000_123));
        assert_eq!(
            storage.get("cartsaver_last_n1").unwrap().as_deref(),
            Some("1700000000123")
        );
    }

    #[test]
    fn malformed_marker_fails_open() {
        let storage = Arc::new(MemoryStore::new());
        storage.set("cartsaver_last_n1", "yesterday").unwrap();
        let store = CooldownStore::new(storage);
        assert_eq!(store.last_shown(&NudgeId::from_raw("n1")), None);
    }

    #[test]
    fn unavailable_storage_fails_open() {
        let store = CooldownStore::new(Arc::new(UnavailableStore));
        let n = NudgeId::from_raw("n1");
        store.set_shown(&n, 42);
        assert_eq!(store.last_shown(&n), None);
    }
}
