#![forbid(unsafe_code)]

//! Lifetime-safe in-process event channels.
//!
//! One [`EventChannel`] broadcasts to many subscribers. A subscriber is either
//! a free function/closure, owned by the [`CallbackHandle`] the caller gets
//! back, or a method bound to an owner, owned by that owner's
//! [`BindingRegistry`]. The channel itself only ever holds `Weak` references.
//!
//! That split gives two guarantees without any manual unsubscription:
//!
//! - a bound method is never invoked after its owner is dropped;
//! - a dropped channel leaves nothing behind in a living owner's registry.
//!
//! # Architecture
//!
//! - [`callback`]: the [`Callback`] trait and its free/bound implementations.
//! - [`registry`]: [`BindingRegistry`] and the [`BindingHost`] capability.
//! - [`channel`](mod@channel): [`EventChannel`] subscribe/dispatch/clear.
//! - [`scope`]: [`ScopedSubscription`] guards and [`SubscriptionScope`].
//! - [`config`]: [`ChannelConfig`].
//!
//! All types use `Rc`/`RefCell` and are intentionally `!Send`: a channel,
//! its subscribers and their owners live on one thread.
//!
//! # Example
//!
//! ```
//! use std::cell::Cell;
//! use std::rc::Rc;
//! use lifebind::prelude::*;
//!
//! struct Gauge {
//!     value: Cell<i32>,
//!     bindings: BindingRegistry,
//! }
//!
//! impl BindingHost for Gauge {
//!     fn binding_registry(&self) -> &BindingRegistry {
//!         &self.bindings
//!     }
//! }
//!
//! impl Gauge {
//!     fn on_value(&self, v: &i32) {
//!         self.value.set(*v);
//!     }
//! }
//!
//! let values = lifebind::channel::<i32>();
//! let gauge = Rc::new(Gauge { value: Cell::new(0), bindings: BindingRegistry::new() });
//! values.bind(&gauge, Gauge::on_value);
//!
//! let total = Rc::new(Cell::new(0));
//! let t = Rc::clone(&total);
//! let handle = values.subscribe(move |v| t.set(t.get() + v));
//!
//! values.dispatch(&5);
//! assert_eq!(gauge.value.get(), 5);
//! assert_eq!(total.get(), 5);
//!
//! drop(gauge);
//! drop(handle);
//! let report = values.dispatch(&6);
//! assert_eq!(report.invoked, 0);
//! assert_eq!(report.purged, 2);
//! ```
//!
//! # Tracing
//!
//! Subscription changes and purges are reported as `tracing` events at trace
//! level (clears at debug level), tagged with the channel label. Enable the
//! `tracing` feature to also get a `channel_dispatch` span per dispatch.

pub mod callback;
pub mod channel;
pub mod config;
pub mod registry;
pub mod scope;

pub use callback::{BoundCallback, Callback, CallbackHandle, FreeCallback, HandleId};
pub use channel::{DispatchReport, EventChannel};
pub use config::ChannelConfig;
pub use registry::{BindingHost, BindingRegistry};
pub use scope::{ScopedSubscription, SubscriptionScope};

/// Create an empty channel over argument type `A`.
#[must_use]
pub fn channel<A: 'static>() -> EventChannel<A> {
    EventChannel::new()
}

/// Common imports.
pub mod prelude {
    pub use crate::scoped;
    pub use crate::{
        BindingHost, BindingRegistry, CallbackHandle, ChannelConfig, EventChannel,
        ScopedSubscription, SubscriptionScope,
    };
}
