//! Parameter tree - the unit's named, addressable tunable values
//!
//! Values live in atomic slots so the unit's processing thread can read them
//! without locking. Writes go through [`ParameterHandle::set_value`], which
//! tags the change with an [`Originator`] and fans it out to every subscribed
//! observer on the writer's thread. The tree never suppresses the echo back
//! to the originator; distinguishing self-caused changes is the subscriber's
//! choice.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use hashbrown::HashMap;

use crate::params::{ParamSpec, ParamUnit};

/// Stable numeric address of a parameter within a tree
pub type ParamAddress = u64;

static NEXT_ORIGINATOR: AtomicU64 = AtomicU64::new(1);

/// Identity tag attached to a parameter write
///
/// Lets a subscriber tell self-caused changes apart from external ones
/// (automation, UI). Process-unique via [`Originator::unique`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Originator(u64);

impl Originator {
    /// Writes made by the host itself (automation, external control)
    pub const EXTERNAL: Originator = Originator(0);

    /// A fresh, process-unique originator
    pub fn unique() -> Self {
        Self(NEXT_ORIGINATOR.fetch_add(1, Ordering::Relaxed))
    }
}

/// A single parameter change, as delivered to observers
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParamChange {
    pub address: ParamAddress,
    pub value: f64,
    pub originator: Originator,
}

struct ParamSlot {
    spec: ParamSpec,
    /// f64 stored as bits so readers never lock
    bits: AtomicU64,
}

impl ParamSlot {
    fn load(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    fn store(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Release);
    }
}

type ObserverFn = Box<dyn Fn(ParamChange) + Send + Sync>;

struct TreeInner {
    slots: Vec<ParamSlot>,
    by_name: HashMap<&'static str, usize>,
    observers: Mutex<Vec<(u64, ObserverFn)>>,
    next_observer: AtomicU64,
}

/// The set of tunable parameters a unit exposes
///
/// Cheap to clone; clones share the same slots and observer list.
#[derive(Clone)]
pub struct ParameterTree {
    inner: Arc<TreeInner>,
}

impl ParameterTree {
    /// Build a tree from parameter specs, each slot starting at its default
    pub fn new(specs: &[ParamSpec]) -> Self {
        let mut slots = Vec::with_capacity(specs.len());
        let mut by_name = HashMap::with_capacity(specs.len());

        for (index, spec) in specs.iter().enumerate() {
            by_name.insert(spec.name, index);
            slots.push(ParamSlot {
                spec: spec.clone(),
                bits: AtomicU64::new(spec.default.to_bits()),
            });
        }

        Self {
            inner: Arc::new(TreeInner {
                slots,
                by_name,
                observers: Mutex::new(Vec::new()),
                next_observer: AtomicU64::new(0),
            }),
        }
    }

    /// Look up a parameter handle by name
    pub fn lookup(&self, name: &str) -> Option<ParameterHandle> {
        let index = *self.inner.by_name.get(name)?;
        Some(ParameterHandle {
            inner: Arc::clone(&self.inner),
            index,
        })
    }

    /// Subscribe to every parameter change in this tree
    ///
    /// The observer runs on whichever thread performs the write, so it must
    /// hand off to its owner rather than touch shared state directly.
    /// Observers are invoked with the tree's observer list locked, which is
    /// what keeps notification order matching store order; the flip side is
    /// that calling `subscribe`, `unsubscribe`, or `set_value` on the same
    /// tree from inside an observer deadlocks. Send the change somewhere and
    /// return.
    /// The subscription lives until [`unsubscribe`](Self::unsubscribe);
    /// dropping the token without unsubscribing leaves the observer in place
    /// for the tree's lifetime.
    pub fn subscribe(&self, observer: impl Fn(ParamChange) + Send + Sync + 'static) -> ObserverToken {
        let id = self.inner.next_observer.fetch_add(1, Ordering::Relaxed);
        self.inner
            .observers
            .lock()
            .unwrap()
            .push((id, Box::new(observer)));
        ObserverToken { id }
    }

    /// Remove a previously subscribed observer
    pub fn unsubscribe(&self, token: &ObserverToken) {
        self.inner
            .observers
            .lock()
            .unwrap()
            .retain(|(id, _)| *id != token.id);
    }

    /// Number of parameters in the tree
    pub fn len(&self) -> usize {
        self.inner.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.slots.is_empty()
    }
}

/// Handle to one parameter in a [`ParameterTree`]
#[derive(Clone)]
pub struct ParameterHandle {
    inner: Arc<TreeInner>,
    index: usize,
}

impl ParameterHandle {
    fn slot(&self) -> &ParamSlot {
        &self.inner.slots[self.index]
    }

    /// Stable name of this parameter
    pub fn name(&self) -> &'static str {
        self.slot().spec.name
    }

    /// Stable address of this parameter, as used in change notifications
    pub fn address(&self) -> ParamAddress {
        self.slot().spec.address
    }

    /// Unit of measure, for display and logging
    pub fn unit(&self) -> ParamUnit {
        self.slot().spec.unit
    }

    /// Current value (lock-free read)
    pub fn value(&self) -> f64 {
        self.slot().load()
    }

    /// Set the value, tagged with `originator`, and notify all observers
    ///
    /// The value is clamped to the parameter's declared range first; the
    /// clamped value is what observers see. Returns the stored value.
    pub fn set_value(&self, value: f64, originator: Originator) -> f64 {
        let slot = self.slot();
        let clamped = value.clamp(slot.spec.min, slot.spec.max);

        let change = ParamChange {
            address: slot.spec.address,
            value: clamped,
            originator,
        };

        // store under the observer lock so notification order matches store
        // order; concurrent writers then agree on which value was last
        let observers = self.inner.observers.lock().unwrap();
        slot.store(clamped);
        for (_, observer) in observers.iter() {
            observer(change);
        }

        clamped
    }
}

/// Token identifying one observer subscription
pub struct ObserverToken {
    id: u64,
}
