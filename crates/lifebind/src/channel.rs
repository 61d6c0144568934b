#![forbid(unsafe_code)]

//! Event channel dispatching to weakly held subscribers.
//!
//! # Design
//!
//! [`EventChannel<A>`] keeps an ordered `Vec<Weak<dyn Callback<A>>>`. It never
//! owns a subscriber: free callbacks are owned by the [`CallbackHandle`]
//! returned from [`subscribe`](EventChannel::subscribe), bound callbacks by
//! their owner's [`BindingRegistry`](crate::BindingRegistry).
//!
//! Entries move through three states:
//!
//! ```text
//! Active ──(strong holder released)──▶ Expired ──(dispatch scan)──▶ Purged
//!   └──────────────(unsubscribe / unbind / clear)─────────────────────┘
//! ```
//!
//! Expired entries are only removed while scanning; nothing purges eagerly.
//!
//! # Performance
//!
//! | Operation          | Complexity                |
//! |--------------------|---------------------------|
//! | `subscribe()`      | O(1) amortized            |
//! | `dispatch()`       | O(S) where S = entries    |
//! | `unsubscribe()`    | O(S)                      |
//! | `clear()`          | O(S)                      |
//!
//! # Invariants
//!
//! 1. Live entries are invoked in subscription order, exactly once per dispatch.
//! 2. A dispatch pass removes every expired entry it reaches, without skipping
//!    the entry that follows it.
//! 3. Dropping or clearing a channel releases every registry token it caused,
//!    for owners that are still alive.
//! 4. No borrow of the subscriber list is held while a callback runs.
//! 5. Removing entries from inside a callback never makes an in-flight
//!    dispatch skip a live entry: every active scan position is shifted back
//!    when an entry before it is removed.
//!
//! # Failure Modes
//!
//! - **Callback panic**: propagates to the caller of `dispatch()`. Entries
//!   after the panicking one are not invoked on that pass; the channel stays
//!   usable.
//! - **Re-entrant mutation**: a callback may dispatch, subscribe or
//!   unsubscribe on the channel that is invoking it. Entries removed ahead of
//!   the scan are not invoked; entries behind it are unaffected. Whether a
//!   subscriber added mid-dispatch runs in the same pass is not guaranteed.
//!   Clearing the channel mid-dispatch ends every in-flight pass.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::callback::{BoundCallback, Callback, CallbackHandle, FreeCallback, HandleId};
use crate::config::ChannelConfig;
use crate::registry::BindingHost;

/// Outcome of a single [`EventChannel::dispatch`] pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    /// Live subscribers invoked.
    pub invoked: usize,
    /// Expired entries removed during the scan.
    pub purged: usize,
}

/// Ordered broadcast list of weakly held callbacks over argument type `A`.
///
/// Single-threaded: the channel is neither `Send` nor `Sync`.
pub struct EventChannel<A: 'static> {
    entries: RefCell<Vec<Weak<dyn Callback<A>>>>,
    /// Next index to visit, one per in-flight dispatch (innermost last).
    cursors: RefCell<Vec<usize>>,
    config: ChannelConfig,
}

/// Pops the cursor pushed by a dispatch pass, also on unwind.
struct CursorGuard<'a> {
    cursors: &'a RefCell<Vec<usize>>,
}

impl Drop for CursorGuard<'_> {
    fn drop(&mut self) {
        self.cursors.borrow_mut().pop();
    }
}

impl<A: 'static> EventChannel<A> {
    /// Create an empty channel with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ChannelConfig::default())
    }

    /// Create an empty channel with the given configuration.
    #[must_use]
    pub fn with_config(config: ChannelConfig) -> Self {
        Self {
            entries: RefCell::new(Vec::with_capacity(config.capacity)),
            cursors: RefCell::new(Vec::new()),
            config,
        }
    }

    /// The configured label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// The configuration this channel was built with.
    #[must_use]
    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    /// Subscribe a closure.
    ///
    /// The returned handle is the only strong reference: dropping it stops
    /// further invocations. Closures can only be unsubscribed by handle.
    pub fn subscribe(&self, callback: impl Fn(&A) + 'static) -> CallbackHandle<A> {
        let handle = CallbackHandle::new(FreeCallback::from_closure(callback));
        self.attach(handle.downgrade());
        tracing::trace!(channel = %self.config.label, handle = %handle.id(), "subscribed closure");
        handle
    }

    /// Subscribe a plain function.
    ///
    /// Unlike [`subscribe`](Self::subscribe), the entry can later be removed
    /// with [`unsubscribe_fn`](Self::unsubscribe_fn).
    pub fn subscribe_fn(&self, function: fn(&A)) -> CallbackHandle<A> {
        let handle = CallbackHandle::new(FreeCallback::from_fn(function));
        self.attach(handle.downgrade());
        tracing::trace!(channel = %self.config.label, handle = %handle.id(), "subscribed function");
        handle
    }

    /// Bind `method` to `owner`.
    ///
    /// The callback's only strong reference is stored in the owner's
    /// registry, so it lives exactly as long as the owner (or until this
    /// channel is cleared, dropped, or [`unbind`](Self::unbind)s the owner).
    pub fn bind<O, F>(&self, owner: &Rc<O>, method: F)
    where
        O: BindingHost + 'static,
        F: Fn(&O, &A) + 'static,
    {
        let callback = Rc::new(BoundCallback::<O, A, F>::new(owner, method));
        let id = HandleId::of(Rc::as_ptr(&callback));
        self.attach(Rc::<BoundCallback<O, A, F>>::downgrade(&callback));
        owner.binding_registry().register(id, callback);
        tracing::trace!(
            channel = %self.config.label,
            handle = %id,
            owner = %HandleId::of(Rc::as_ptr(owner)),
            "bound method"
        );
    }

    fn attach(&self, entry: Weak<dyn Callback<A>>) {
        self.entries.borrow_mut().push(entry);
    }

    /// Remove the entry for `handle`. Returns whether an entry was found.
    ///
    /// The handle itself stays valid; it is simply no longer reachable from
    /// this channel.
    pub fn unsubscribe(&self, handle: &CallbackHandle<A>) -> bool {
        let id = handle.id();
        let removed = self.remove_first(|entry| HandleId::of(entry.as_ptr()) == id);
        if removed {
            tracing::trace!(channel = %self.config.label, handle = %id, "unsubscribed handle");
        }
        removed
    }

    /// Remove the first live entry wrapping the plain function `function`.
    ///
    /// Returns whether an entry was found. Closures never match; use
    /// [`unsubscribe`](Self::unsubscribe) for them.
    pub fn unsubscribe_fn(&self, function: fn(&A)) -> bool {
        let removed = self.remove_first(|entry| {
            entry
                .upgrade()
                .and_then(|callback| callback.function())
                .is_some_and(|wrapped| std::ptr::fn_addr_eq(wrapped, function))
        });
        if removed {
            tracing::trace!(channel = %self.config.label, "unsubscribed function");
        }
        removed
    }

    fn remove_first(&self, matches: impl Fn(&Weak<dyn Callback<A>>) -> bool) -> bool {
        let mut entries = self.entries.borrow_mut();
        match entries.iter().position(matches) {
            Some(index) => {
                self.remove_at(&mut entries, index);
                true
            }
            None => false,
        }
    }

    /// Remove the entry at `index`, keeping in-flight scans aligned.
    fn remove_at(&self, entries: &mut Vec<Weak<dyn Callback<A>>>, index: usize) {
        for cursor in self.cursors.borrow_mut().iter_mut() {
            if *cursor > index {
                *cursor -= 1;
            }
        }
        entries.remove(index);
    }

    /// Remove every live entry bound to `owner` and release the matching
    /// tokens from its registry. Returns the number of entries removed.
    pub fn unbind<O: BindingHost + 'static>(&self, owner: &Rc<O>) -> usize {
        let owner_id = HandleId::of(Rc::as_ptr(owner));
        let mut removed: Vec<Rc<dyn Callback<A>>> = Vec::new();
        {
            let mut entries = self.entries.borrow_mut();
            let mut index = 0;
            while index < entries.len() {
                match entries[index].upgrade() {
                    Some(callback) if callback.owner_id() == Some(owner_id) => {
                        self.remove_at(&mut entries, index);
                        removed.push(callback);
                    }
                    _ => index += 1,
                }
            }
        }
        for callback in &removed {
            callback.detach_from_owner_registry();
        }
        tracing::trace!(
            channel = %self.config.label,
            owner = %owner_id,
            removed = removed.len(),
            "unbound owner"
        );
        removed.len()
    }

    /// Invoke every live subscriber with `args`, in subscription order.
    ///
    /// Expired entries met along the way are removed in place.
    pub fn dispatch(&self, args: &A) -> DispatchReport {
        #[cfg(feature = "tracing")]
        let _span = tracing::debug_span!(
            "channel_dispatch",
            channel = %self.config.label,
            entries = self.len()
        )
        .entered();

        let depth = {
            let mut cursors = self.cursors.borrow_mut();
            cursors.push(0);
            cursors.len() - 1
        };
        let _cursor = CursorGuard {
            cursors: &self.cursors,
        };

        let mut report = DispatchReport::default();
        loop {
            let Some(index) = self.cursors.borrow().get(depth).copied() else {
                break;
            };
            let slot = self.entries.borrow().get(index).map(Weak::upgrade);
            match slot {
                None => break,
                Some(Some(callback)) => {
                    // Advance first so removals made by the callback shift it.
                    if let Some(cursor) = self.cursors.borrow_mut().get_mut(depth) {
                        *cursor = index + 1;
                    }
                    callback.invoke(args);
                    report.invoked += 1;
                }
                Some(None) => {
                    let mut entries = self.entries.borrow_mut();
                    self.remove_at(&mut entries, index);
                    report.purged += 1;
                }
            }
        }

        if report.purged > 0 {
            tracing::trace!(
                channel = %self.config.label,
                purged = report.purged,
                "purged expired subscribers"
            );
        }
        report
    }

    /// Release the registry tokens of all live bound entries, then empty the
    /// list. Calling it again is a no-op.
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.entries.borrow_mut());
        for cursor in self.cursors.borrow_mut().iter_mut() {
            *cursor = 0;
        }
        if drained.is_empty() {
            return;
        }
        let live: Vec<Rc<dyn Callback<A>>> = drained.iter().filter_map(Weak::upgrade).collect();
        let mut detached = 0usize;
        for callback in &live {
            if callback.owner_id().is_some() {
                callback.detach_from_owner_registry();
                detached += 1;
            }
        }
        tracing::debug!(
            channel = %self.config.label,
            entries = drained.len(),
            detached,
            "cleared channel"
        );
    }

    /// Number of entries, including expired ones not yet purged.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Number of entries whose callback is still alive.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| entry.strong_count() > 0)
            .count()
    }

    /// Whether the list holds no entries at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl<A: 'static> Default for EventChannel<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A: 'static> Drop for EventChannel<A> {
    fn drop(&mut self) {
        self.clear();
    }
}

impl<A: 'static> fmt::Debug for EventChannel<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventChannel")
            .field("label", &self.config.label)
            .field("entries", &self.len())
            .field("live", &self.live_count())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
