#![forbid(unsafe_code)]

//! Scope-bound subscriptions.
//!
//! [`ScopedSubscription`] ties a free callback to a lexical scope: when the
//! guard drops (normal exit, early `return`, `?`, or unwinding) the entry is
//! removed from the channel and the callback released.
//!
//! [`SubscriptionScope`] collects handles from any number of channels for a
//! logical unit (a widget, a session) and releases them together.
//!
//! # Usage
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use lifebind::{EventChannel, scoped};
//!
//! let channel = EventChannel::<i32>::new();
//! let seen = Rc::new(Cell::new(0));
//!
//! {
//!     let s = Rc::clone(&seen);
//!     let _guard = scoped!(channel, move |v: &i32| s.set(*v));
//!     channel.dispatch(&42);
//! }
//! channel.dispatch(&1337);
//! assert_eq!(seen.get(), 42);
//! ```
//!
//! # Invariants
//!
//! 1. After a guard drops, its callback is no longer in the channel list.
//! 2. `SubscriptionScope` releases handles in reverse registration order.
//! 3. `SubscriptionScope::len()` always equals the number of held handles.

use std::any::Any;
use std::fmt;

use crate::callback::CallbackHandle;
use crate::channel::EventChannel;

/// Guard that unsubscribes its callback when dropped.
#[must_use = "dropping the guard immediately unsubscribes the callback"]
pub struct ScopedSubscription<'c, A: 'static> {
    channel: &'c EventChannel<A>,
    handle: CallbackHandle<A>,
}

impl<'c, A: 'static> ScopedSubscription<'c, A> {
    /// The handle this guard keeps alive.
    pub fn handle(&self) -> &CallbackHandle<A> {
        &self.handle
    }

    /// The channel this guard is subscribed to.
    pub fn channel(&self) -> &'c EventChannel<A> {
        self.channel
    }

    /// Unsubscribe now instead of at scope exit.
    pub fn release(self) {
        drop(self);
    }
}

impl<A: 'static> Drop for ScopedSubscription<'_, A> {
    fn drop(&mut self) {
        self.channel.unsubscribe(&self.handle);
    }
}

impl<A: 'static> fmt::Debug for ScopedSubscription<'_, A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScopedSubscription")
            .field("channel", &self.channel.label())
            .field("handle", &self.handle.id())
            .finish()
    }
}

impl<A: 'static> EventChannel<A> {
    /// Subscribe a closure for the lifetime of the returned guard.
    pub fn subscribe_scoped(
        &self,
        callback: impl Fn(&A) + 'static,
    ) -> ScopedSubscription<'_, A> {
        ScopedSubscription {
            channel: self,
            handle: self.subscribe(callback),
        }
    }

    /// Subscribe a plain function for the lifetime of the returned guard.
    pub fn subscribe_fn_scoped(&self, function: fn(&A)) -> ScopedSubscription<'_, A> {
        ScopedSubscription {
            channel: self,
            handle: self.subscribe_fn(function),
        }
    }
}

/// Subscribe a callback bound to the enclosing block.
///
/// Expands to [`EventChannel::subscribe_scoped`]; bind the result to a named
/// variable (not `_`) so it lives until the end of the block.
///
/// ```
/// use lifebind::{EventChannel, scoped};
///
/// let channel = EventChannel::<u8>::new();
/// let guard = scoped!(channel, |_: &u8| {});
/// assert_eq!(channel.live_count(), 1);
/// drop(guard);
/// assert!(channel.is_empty());
/// ```
#[macro_export]
macro_rules! scoped {
    ($channel:expr, $callback:expr $(,)?) => {
        ($channel).subscribe_scoped($callback)
    };
}

/// Holds subscription handles for a logical scope.
///
/// Dropping the scope releases every held handle, so none of its callbacks
/// fire afterwards. Handles of different argument types can be mixed.
pub struct SubscriptionScope {
    handles: Vec<Box<dyn Any>>,
}

impl SubscriptionScope {
    /// Create an empty scope.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handles: Vec::new(),
        }
    }

    /// Keep `handle` alive until the scope is dropped or cleared.
    pub fn hold<A: 'static>(&mut self, handle: CallbackHandle<A>) -> &mut Self {
        self.handles.push(Box::new(handle));
        self
    }

    /// Subscribe `callback` to `channel` and hold the handle in this scope.
    pub fn subscribe<A: 'static>(
        &mut self,
        channel: &EventChannel<A>,
        callback: impl Fn(&A) + 'static,
    ) -> &mut Self {
        let handle = channel.subscribe(callback);
        self.hold(handle)
    }

    /// Number of held handles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the scope holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Release every held handle now. The scope stays usable.
    pub fn clear(&mut self) {
        while self.handles.pop().is_some() {}
    }
}

impl Default for SubscriptionScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SubscriptionScope {
    fn drop(&mut self) {
        self.clear();
    }
}

impl fmt::Debug for SubscriptionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionScope")
            .field("len", &self.handles.len())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
