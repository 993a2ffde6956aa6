//! Load-once gates for optional extraction backends.

use std::sync::{Arc, Mutex, PoisonError};

use crate::source::SourceError;

/// Observable state of a [`ModuleGate`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    /// Nothing has asked for the backend yet.
    Unloaded,
    /// The backend is being loaded.
    Loading,
    /// The backend is ready.
    Loaded,
    /// Loading failed; the reason is kept and returned to every caller.
    Failed(String),
}

enum Slot<T> {
    Unloaded,
    Loading,
    Loaded(Arc<T>),
    Failed(String),
}

/// Guards a backend that is loaded at most once, on first use.
///
/// The first caller runs the loader while holding the gate, so concurrent
/// callers wait for that single attempt instead of starting their own. A
/// failed load is sticky.
pub struct ModuleGate<T> {
    library: &'static str,
    slot: Mutex<Slot<T>>,
}

impl<T> ModuleGate<T> {
    /// Creates an unloaded gate for the named backend.
    #[must_use]
    pub const fn new(library: &'static str) -> Self {
        Self {
            library,
            slot: Mutex::new(Slot::Unloaded),
        }
    }

    /// The current state of the gate.
    #[must_use]
    pub fn state(&self) -> LoadState {
        match &*self.slot.lock().unwrap_or_else(PoisonError::into_inner) {
            Slot::Unloaded => LoadState::Unloaded,
            Slot::Loading => LoadState::Loading,
            Slot::Loaded(_) => LoadState::Loaded,
            Slot::Failed(reason) => LoadState::Failed(reason.clone()),
        }
    }

    /// Returns the backend, loading it with `loader` if this is the first
    /// request.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::LibraryLoadFailed`] if this or an earlier load
    /// attempt failed.
    pub fn load_with<F>(&self, loader: F) -> Result<Arc<T>, SourceError>
    where
        F: FnOnce() -> Result<T, String>,
    {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        match &*slot {
            Slot::Loaded(backend) => return Ok(Arc::clone(backend)),
            Slot::Failed(reason) => return Err(self.failure(reason.clone())),
            Slot::Unloaded | Slot::Loading => {}
        }

        tracing::debug!(library = self.library, "loading extraction backend");
        *slot = Slot::Loading;
        match loader() {
            Ok(backend) => {
                let backend = Arc::new(backend);
                *slot = Slot::Loaded(Arc::clone(&backend));
                Ok(backend)
            }
            Err(reason) => {
                tracing::warn!(library = self.library, %reason, "extraction backend unavailable");
                *slot = Slot::Failed(reason.clone());
                Err(self.failure(reason))
            }
        }
    }

    const fn failure(&self, reason: String) -> SourceError {
        SourceError::LibraryLoadFailed {
            library: self.library,
            reason,
        }
    }
}
