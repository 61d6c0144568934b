#![forbid(unsafe_code)]

//! Type-erased callback handles.
//!
//! A callback is a single heap allocation implementing [`Callback<A>`]. Its
//! identity is the address of that allocation ([`HandleId`]), which stays
//! unique for as long as any `Rc` or `Weak` to it exists.
//!
//! Two variants exist:
//!
//! - [`FreeCallback`]: a plain function pointer or a closure. The subscriber
//!   owns it through the [`CallbackHandle`] returned by
//!   [`EventChannel::subscribe`](crate::EventChannel::subscribe).
//! - [`BoundCallback`]: a method selector bound to an owner held in an `Rc`.
//!   The owner's [`BindingRegistry`](crate::BindingRegistry) holds the only
//!   strong reference, so the callback dies with its owner.
//!
//! # Invariants
//!
//! 1. A callback can only be invoked through a strong reference; the channel's
//!    `Weak` never extends its lifetime.
//! 2. A bound callback never calls into an owner that has been dropped, even if
//!    something else keeps the callback allocation alive.

use std::fmt;
use std::marker::PhantomData;
use std::rc::{Rc, Weak};

use crate::registry::BindingHost;

/// Identity of a callback (or owner) allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(usize);

impl HandleId {
    /// Identity of the allocation `ptr` points into.
    pub(crate) fn of<T: ?Sized>(ptr: *const T) -> Self {
        Self(ptr.cast::<()>().addr())
    }
}

impl fmt::Display for HandleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

/// An invocable subscriber over the argument type `A`.
///
/// Multiple event arguments are passed as a tuple, e.g.
/// `EventChannel<(u32, String)>`.
pub trait Callback<A> {
    /// Run the wrapped function or method.
    fn invoke(&self, args: &A);

    /// The wrapped plain function, if this callback was created from one.
    ///
    /// Used for unsubscription by function identity. Closures return `None`.
    fn function(&self) -> Option<fn(&A)> {
        None
    }

    /// Identity of the owner this callback is bound to, if any.
    fn owner_id(&self) -> Option<HandleId> {
        None
    }

    /// Release the strong token held by the owner's registry.
    ///
    /// Only meaningful for bound callbacks; a no-op for everything else.
    fn detach_from_owner_registry(&self) {}
}

enum Target<A> {
    Function(fn(&A)),
    Closure(Box<dyn Fn(&A)>),
}

/// A callback not tied to any owner.
pub struct FreeCallback<A> {
    target: Target<A>,
}

impl<A> FreeCallback<A> {
    /// Wrap a plain function. The function address is kept for identity lookups.
    #[must_use]
    pub fn from_fn(function: fn(&A)) -> Self {
        Self {
            target: Target::Function(function),
        }
    }

    /// Wrap an arbitrary closure.
    #[must_use]
    pub fn from_closure(closure: impl Fn(&A) + 'static) -> Self {
        Self {
            target: Target::Closure(Box::new(closure)),
        }
    }
}

impl<A> Callback<A> for FreeCallback<A> {
    fn invoke(&self, args: &A) {
        match &self.target {
            Target::Function(function) => function(args),
            Target::Closure(closure) => closure(args),
        }
    }

    fn function(&self) -> Option<fn(&A)> {
        match self.target {
            Target::Function(function) => Some(function),
            Target::Closure(_) => None,
        }
    }
}

impl<A> fmt::Debug for FreeCallback<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.target {
            Target::Function(_) => "function",
            Target::Closure(_) => "closure",
        };
        f.debug_struct("FreeCallback").field("kind", &kind).finish()
    }
}

/// A method selector bound to a specific owner instance.
///
/// Holds the owner weakly: the strong reference runs the other way, from the
/// owner's registry to this callback.
pub struct BoundCallback<O, A, F> {
    owner: Weak<O>,
    method: F,
    _args: PhantomData<fn(&A)>,
}

impl<O, A, F> BoundCallback<O, A, F>
where
    O: BindingHost,
    F: Fn(&O, &A),
{
    /// Bind `method` to `owner`.
    #[must_use]
    pub fn new(owner: &Rc<O>, method: F) -> Self {
        Self {
            owner: Rc::downgrade(owner),
            method,
            _args: PhantomData,
        }
    }

    /// Whether the owner is still alive.
    #[must_use]
    pub fn owner_alive(&self) -> bool {
        self.owner.strong_count() > 0
    }
}

impl<O, A, F> Callback<A> for BoundCallback<O, A, F>
where
    O: BindingHost,
    F: Fn(&O, &A),
{
    fn invoke(&self, args: &A) {
        if let Some(owner) = self.owner.upgrade() {
            (self.method)(&owner, args);
        }
    }

    fn owner_id(&self) -> Option<HandleId> {
        Some(HandleId::of(self.owner.as_ptr()))
    }

    fn detach_from_owner_registry(&self) {
        // A dead owner has already released its registry.
        if let Some(owner) = self.owner.upgrade() {
            owner
                .binding_registry()
                .unregister(HandleId::of(std::ptr::from_ref(self)));
        }
    }
}

impl<O, A, F> fmt::Debug for BoundCallback<O, A, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundCallback")
            .field("owner", &HandleId::of(self.owner.as_ptr()))
            .field("owner_alive", &(self.owner.strong_count() > 0))
            .finish_non_exhaustive()
    }
}

/// Strong handle to a free callback.
///
/// Holding the handle keeps the subscription alive; dropping it expires the
/// channel entry, which is purged on the next dispatch. The handle is
/// deliberately not `Clone`: each callback has exactly one strong owner.
#[must_use = "dropping the handle immediately expires the subscription"]
pub struct CallbackHandle<A: 'static> {
    inner: Rc<dyn Callback<A>>,
}

impl<A: 'static> CallbackHandle<A> {
    pub(crate) fn new(callback: FreeCallback<A>) -> Self {
        Self {
            inner: Rc::new(callback),
        }
    }

    /// Identity of the underlying callback allocation.
    #[must_use]
    pub fn id(&self) -> HandleId {
        HandleId::of(Rc::as_ptr(&self.inner))
    }

    /// Invoke the callback directly, bypassing any channel.
    pub fn invoke(&self, args: &A) {
        self.inner.invoke(args);
    }

    pub(crate) fn downgrade(&self) -> Weak<dyn Callback<A>> {
        Rc::downgrade(&self.inner)
    }
}

impl<A: 'static> fmt::Debug for CallbackHandle<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("id", &self.id())
            .field("function", &self.inner.function().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BindingRegistry;
    use std::cell::Cell;

    struct Counter {
        hits: Cell<i32>,
        bindings: BindingRegistry,
    }

    impl Counter {
        fn new() -> Rc<Self> {
            Rc::new(Self {
                hits: Cell::new(0),
                bindings: BindingRegistry::new(),
            })
        }

        fn add(&self, amount: &i32) {
            self.hits.set(self.hits.get() + amount);
        }
    }

    impl BindingHost for Counter {
        fn binding_registry(&self) -> &BindingRegistry {
            &self.bindings
        }
    }

    fn noop(_: &i32) {}

    #[test]
    fn free_function_invokes() {
        thread_local! {
            static SEEN: Cell<i32> = const { Cell::new(0) };
        }
        fn record(v: &i32) {
            SEEN.with(|s| s.set(*v));
        }

        let cb = FreeCallback::from_fn(record);
        cb.invoke(&7);
        assert_eq!(SEEN.with(Cell::get), 7);
    }

    #[test]
    fn closure_invokes() {
        let seen = Rc::new(Cell::new(0));
        let s = Rc::clone(&seen);
        let cb = FreeCallback::from_closure(move |v: &i32| s.set(*v * 2));
        cb.invoke(&21);
        assert_eq!(seen.get(), 42);
    }

    #[test]
    fn function_identity_only_for_plain_functions() {
        let f = FreeCallback::from_fn(noop);
        let g = FreeCallback::from_closure(|_: &i32| {});
        assert!(f.function().is_some_and(|p| std::ptr::fn_addr_eq(p, noop as fn(&i32))));
        assert!(g.function().is_none());
        assert!(f.owner_id().is_none());
    }

    #[test]
    fn bound_callback_calls_owner_method() {
        let owner = Counter::new();
        let cb = BoundCallback::new(&owner, Counter::add);
        cb.invoke(&5);
        cb.invoke(&5);
        assert_eq!(owner.hits.get(), 10);
        assert_eq!(cb.owner_id(), Some(HandleId::of(Rc::as_ptr(&owner))));
    }

    #[test]
    fn bound_callback_skips_dead_owner() {
        let owner = Counter::new();
        let cb = BoundCallback::new(&owner, |o: &Counter, v: &i32| o.add(v));
        assert!(cb.owner_alive());
        drop(owner);
        assert!(!cb.owner_alive());
        // Must not panic or touch freed state.
        cb.invoke(&1);
    }

    #[test]
    fn handle_identity_is_stable() {
        let a = CallbackHandle::new(FreeCallback::from_fn(noop));
        let b = CallbackHandle::new(FreeCallback::from_fn(noop));
        assert_eq!(a.id(), a.id());
        assert_ne!(a.id(), b.id());
        assert_eq!(HandleId::of(a.downgrade().as_ptr()), a.id());
    }

    #[test]
    fn weak_does_not_extend_lifetime() {
        let handle = CallbackHandle::new(FreeCallback::from_closure(|_: &i32| {}));
        let weak = handle.downgrade();
        assert!(weak.upgrade().is_some());
        drop(handle);
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn debug_format() {
        let handle = CallbackHandle::new(FreeCallback::from_fn(noop));
        let dbg = format!("{handle:?}");
        assert!(dbg.contains("CallbackHandle"));
        assert!(dbg.contains("function: true"));

        let owner = Counter::new();
        let bound = BoundCallback::new(&owner, Counter::add);
        assert!(format!("{bound:?}").contains("owner_alive: true"));
    }
}
