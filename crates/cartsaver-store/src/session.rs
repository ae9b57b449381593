use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cartsaver_core::clock::Clock;
use cartsaver_core::ids::{NudgeId, SessionId};

use crate::kv::KeyValueStore;

/// Session storage key holding the serialized [`SessionState`].
pub const SESSION_KEY: &str = "cartsaver_session";

/// One browsing visit: its identity and the nudges already shown in it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,
    /// Insertion-ordered, no duplicates.
    pub nudges_shown: Vec<NudgeId>,
    /// Epoch milliseconds.
    pub created_at: i64,
}

impl SessionState {
    pub fn fresh(now_ms: i64) -> Self {
        Self {
            id: SessionId::new(),
            nudges_shown: Vec::new(),
            created_at: now_ms,
        }
    }

    pub fn has_shown(&self, nudge_id: &NudgeId) -> bool {
        self.nudges_shown.contains(nudge_id)
    }

    pub fn shown_count(&self) -> usize {
        self.nudges_shown.len()
    }
}

struct Inner {
    state: Option<SessionState>,
    /// Cleared after the first failed write; the rest of the visit stays in memory.
    persist: bool,
}

/// Ephemeral per-visit state, mirrored best-effort into session storage.
pub struct SessionStore {
    storage: Arc<dyn KeyValueStore>,
    clock: Arc<dyn Clock>,
    inner: Mutex<Inner>,
}

impl SessionStore {
    pub fn new(storage: Arc<dyn KeyValueStore>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            clock,
            inner: Mutex::new(Inner {
                state: None,
                persist: true,
            }),
        }
    }

    /// Current session, restored from storage or created on first access.
    pub fn get_session(&self) -> SessionState {
        let mut inner = self.inner.lock();
        self.ensure_loaded(&mut inner).clone()
    }

    pub fn session_id(&self) -> SessionId {
        self.get_session().id
    }

    /// Record `nudge_id` as shown. Returns false if it was already present.
    pub fn mark_shown(&self, nudge_id: &NudgeId) -> bool {
        let mut inner = self.inner.lock();
        let state = self.ensure_loaded(&mut inner);
        if state.has_shown(nudge_id) {
            return false;
        }
        state.nudges_shown.push(nudge_id.clone());
        let snapshot = state.clone();
        self.persist(&mut inner, &snapshot);
        true
    }

    /// Whether writes still reach session storage.
    pub fn is_persistent(&self) -> bool {
        self.inner.lock().persist
    }

    fn ensure_loaded<'a>(&self, inner: &'a mut Inner) -> &'a mut SessionState {
        inner.state.get_or_insert_with(|| {
            self.restore().unwrap_or_else(|| {
                let state = SessionState::fresh(self.clock.now_ms());
                debug!(session_id = %state.id, "created visit session");
                state
            })
        })
    }

    fn restore(&self) -> Option<SessionState> {
        match self.storage.get(SESSION_KEY) {
            Ok(Some(raw)) => match serde_json::from_str::<SessionState>(&raw) {
                Ok(mut state) => {
                    dedup_in_order(&mut state.nudges_shown);
                    debug!(session_id = %state.id, shown = state.shown_count(), "restored visit session");
                    Some(state)
                }
                Err(e) => {
                    debug!(error = %e, "discarding unreadable session record");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                debug!(error = %e, "session storage unreadable, starting fresh");
                None
            }
        }
    }

    fn persist(&self, inner: &mut Inner, state: &SessionState) {
        if !inner.persist {
            return;
        }
        let result = serde_json::to_string(state)
            .map_err(crate::error::StoreError::from)
            .and_then(|raw| self.storage.set(SESSION_KEY, &raw));
        if let Err(e) = result {
            inner.persist = false;
            warn!(
                session_id = %state.id,
                error = %e,
                error_kind = "storage_unavailable",
                "session storage write failed, continuing in memory"
            );
        }
    }
}

fn dedup_in_order(ids: &mut Vec<NudgeId>) {
    let mut seen = Vec::with_capacity(ids.len());
    ids.retain(|id| {
        if seen.contains(id) {
            false
        } else {
            seen.push(id.clone());
            true
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::{MemoryStore, UnavailableStore};
    use cartsaver_core::clock::ManualClock;

    fn clock() -> Arc<dyn Clock> {
        Arc::new(ManualClock::new(1_700_000_000_000))
    }

    #[test]
    fn created_on_first_access_and_reused() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()), clock());
        let first = store.get_session();
        assert!(first.id.as_str().starts_with("cs_"));
        assert_eq!(first.created_at, 1_700_000_000_000);
        assert_eq!(store.get_session(), first);
    }

    #[test]
    fn mark_shown_is_idempotent() {
        let store = SessionStore::new(Arc::new(MemoryStore::new()), clock());
        let n = NudgeId::from_raw("n1");
        assert!(store.mark_shown(&n));
        assert!(!store.mark_shown(&n));
        assert_eq!(store.get_session().nudges_shown, vec![n]);
    }

    #[test]
    fn survives_reload_in_same_tab() {
        let storage: Arc<MemoryStore> = Arc::new(MemoryStore::new());
        let first = SessionStore::new(storage.clone(), clock());
        let _ = first.mark_shown(&NudgeId::from_raw("n1"));
        let id = first.session_id();

        let reloaded = SessionStore::new(storage, clock());
        let state = reloaded.get_session();
        assert_eq!(state.id, id);
        assert!(state.has_shown(&NudgeId::from_raw("n1")));
    }

    #[test]
    fn corrupt_record_starts_fresh() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(SESSION_KEY, "{not json").unwrap();
        let store = SessionStore::new(storage, clock());
        assert!(store.get_session().nudges_shown.is_empty());
    }

    #[test]
    fn duplicated_ids_in_record_are_collapsed() {
        let storage = Arc::new(MemoryStore::new());
        storage
            .set(
                SESSION_KEY,
                r#"{"id":"cs_x","nudges_shown":["a","b","a"],"created_at":1}"#,
            )
            .unwrap();
        let store = SessionStore::new(storage, clock());
        let shown = store.get_session().nudges_shown;
        assert_eq!(shown, vec![NudgeId::from_raw("a"), NudgeId::from_raw("b")]);
    }

    #[test]
    fn disabled_storage_degrades_to_memory() {
        let store = SessionStore::new(Arc::new(UnavailableStore), clock());
        assert!(store.mark_shown(&NudgeId::from_raw("n1")));
        assert!(!store.is_persistent());
        assert!(store.mark_shown(&NudgeId::from_raw("n2")));
        assert_eq!(store.get_session().shown_count(), 2);
    }
}
