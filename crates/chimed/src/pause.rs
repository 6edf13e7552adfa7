//! In-process mirror of the durable pause flag.
//!
//! Write ordering is persist-then-flip: the durable row is updated
//! first, then the in-process flag. A crash between the two is
//! recovered by reloading durable state at the next startup. The
//! daemon also re-reads the durable flag once per poll cycle, so
//! toggles from the admin CLI (a separate process) take effect by the
//! next iteration.

use chime_store::{PauseStore, StoreError};
use std::sync::atomic::{AtomicBool, Ordering};

pub struct PauseControl {
    store: PauseStore,
    flag: AtomicBool,
}

impl PauseControl {
    /// Initialize the in-process flag from durable state.
    pub fn load(store: PauseStore) -> Result<Self, StoreError> {
        let paused = store.is_paused()?;
        Ok(Self {
            store,
            flag: AtomicBool::new(paused),
        })
    }

    pub fn is_paused(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Persist the new state, then update the in-process flag.
    pub fn set_paused(&self, paused: bool) -> Result<(), StoreError> {
        self.store.set_paused(paused)?;
        self.flag.store(paused, Ordering::SeqCst);
        Ok(())
    }

    /// Re-read durable state into the in-process flag, returning the
    /// fresh value. Called once per poll cycle.
    pub fn refresh(&self) -> Result<bool, StoreError> {
        let paused = self.store.is_paused()?;
        self.flag.store(paused, Ordering::SeqCst);
        Ok(paused)
    }
}
