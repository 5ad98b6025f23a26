//! The store and bus specialised to the realm client.

use realm_types::{AppState, AppStatePatch, RealmEvent};

use crate::bus::EventBus;
use crate::store::{StateShape, Store};

impl StateShape for AppState {
    type Patch = AppStatePatch;

    fn merge(&self, patch: AppStatePatch) -> Self {
        self.merged(patch)
    }
}

/// The application store.
pub type RealmStore = Store<AppState>;

/// The application bus.
pub type RealmBus = EventBus<RealmEvent>;
