#![forbid(unsafe_code)]

//! Per-owner registry anchoring bound callbacks to their owner's lifetime.
//!
//! An owner embeds a [`BindingRegistry`] and exposes it through
//! [`BindingHost`]. When a channel binds one of the owner's methods, the only
//! strong reference to the resulting callback goes into this registry; the
//! channel keeps a `Weak`. Dropping the owner drops the registry, which drops
//! the callback, which the channel then observes as expired.
//!
//! Registration and removal are crate-private: only channel internals can
//! change what a registry holds. Owners and tests can only observe the count.
//!
//! # Usage
//!
//! ```
//! use std::rc::Rc;
//! use lifebind::{BindingHost, BindingRegistry, EventChannel};
//!
//! struct Logger {
//!     bindings: BindingRegistry,
//! }
//!
//! impl BindingHost for Logger {
//!     fn binding_registry(&self) -> &BindingRegistry {
//!         &self.bindings
//!     }
//! }
//!
//! impl Logger {
//!     fn on_line(&self, _line: &String) {}
//! }
//!
//! let channel = EventChannel::<String>::new();
//! let logger = Rc::new(Logger { bindings: BindingRegistry::new() });
//! channel.bind(&logger, Logger::on_line);
//! assert_eq!(logger.bindings.len(), 1);
//!
//! drop(channel);
//! assert_eq!(logger.bindings.len(), 0);
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Cause | Behavior |
//! |---------|-------|----------|
//! | Unregister unknown id | Token already released | No-op, returns `false` |
//! | Owner dropped mid-dispatch | Callback drops its own owner | In-flight call completes; later calls skipped |

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use ahash::AHashMap;

use crate::callback::HandleId;

/// Capability an owner type exposes so channels can bind its methods.
pub trait BindingHost {
    /// The registry holding this owner's bound callbacks.
    fn binding_registry(&self) -> &BindingRegistry;
}

/// Set of strong tokens keeping an owner's bound callbacks alive.
pub struct BindingRegistry {
    tokens: RefCell<AHashMap<HandleId, Rc<dyn Any>>>,
}

impl BindingRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tokens: RefCell::new(AHashMap::new()),
        }
    }

    /// Insert a strong token for the callback identified by `id`.
    pub(crate) fn register(&self, id: HandleId, token: Rc<dyn Any>) {
        let replaced = self.tokens.borrow_mut().insert(id, token);
        // A replaced token drops here, after the map borrow has ended.
        drop(replaced);
    }

    /// Release the token for `id`. Returns whether one was held.
    pub(crate) fn unregister(&self, id: HandleId) -> bool {
        let released = self.tokens.borrow_mut().remove(&id);
        // The token drops here, after the map borrow has ended.
        released.is_some()
    }

    /// Whether a token for `id` is held.
    #[must_use]
    pub fn contains(&self, id: HandleId) -> bool {
        self.tokens.borrow().contains_key(&id)
    }

    /// Number of bound callbacks currently anchored to this owner.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.borrow().len()
    }

    /// Whether no callbacks are anchored to this owner.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.borrow().is_empty()
    }
}

impl Default for BindingRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for BindingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BindingRegistry")
            .field("len", &self.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
