use std::sync::Mutex;

use uuid::Uuid;

use crate::message::JsonMap;

/// Port for the identity persistence collaborator. The facade reads the
/// anonymous id when building every message and writes identity state on
/// identify/group/alias calls. Concrete backends (cookie, local storage)
/// live outside this crate.
pub trait IdentityStore: Send + Sync {
    /// Returns the stable pseudo-identity for this client, creating one if
    /// none has been assigned yet.
    fn anonymous_id(&self) -> String;
    fn set_anonymous_id(&self, id: String);

    fn user_id(&self) -> Option<String>;
    fn set_user_id(&self, id: Option<String>);

    fn traits(&self) -> JsonMap;
    fn set_traits(&self, traits: JsonMap);

    /// Clears all identity state, including the anonymous id.
    fn reset(&self);
}

#[derive(Default)]
struct IdentityState {
    anonymous_id: Option<String>,
    user_id: Option<String>,
    traits: JsonMap,
}

/// In-memory identity store. Suitable for tests and for embedders that
/// manage persistence themselves.
pub struct MemoryIdentityStore {
    state: Mutex<IdentityState>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(IdentityState::default()),
        }
    }
}

impl Default for MemoryIdentityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn anonymous_id(&self) -> String {
        let mut state = self.state.lock().expect("identity state poisoned");
        state
            .anonymous_id
            .get_or_insert_with(|| Uuid::new_v4().to_string())
            .clone()
    }

    fn set_anonymous_id(&self, id: String) {
        let mut state = self.state.lock().expect("identity state poisoned");
        state.anonymous_id = Some(id);
    }

    fn user_id(&self) -> Option<String> {
        self.state
            .lock()
            .expect("identity state poisoned")
            .user_id
            .clone()
    }

    fn set_user_id(&self, id: Option<String>) {
        let mut state = self.state.lock().expect("identity state poisoned");
        state.user_id = id;
    }

    fn traits(&self) -> JsonMap {
        self.state
            .lock()
            .expect("identity state poisoned")
            .traits
            .clone()
    }

    fn set_traits(&self, traits: JsonMap) {
        let mut state = self.state.lock().expect("identity state poisoned");
        state.traits = traits;
    }

    fn reset(&self) {
        let mut state = self.state.lock().expect("identity state poisoned");
        *state = IdentityState::default();
    }
}
