//! Formant filter node - a parameter proxy around the external unit
//!
//! The node owns a local cache of the three filter parameters and keeps it
//! synchronized with the unit's parameter tree. Writes go out immediately
//! (or are deferred until the unit arrives); changes made elsewhere come back
//! as [`ParamChange`] events through a single channel, drained by
//! [`FormantFilter::pump`] on the owning context. The unit is authoritative;
//! the cache is a best-effort mirror.

use std::sync::Arc;

use crossbeam_channel::{unbounded, Receiver, Sender};
use tracing::{debug, info, trace, warn};

use crate::engine::{Engine, NodeId};
use crate::error::Error;
use crate::params::{FilterParams, ATTACK_DURATION, CENTER_FREQUENCY, DECAY_DURATION};
use crate::registry::{self, ComponentRegistry};
use crate::tree::{ObserverToken, Originator, ParamChange, ParameterHandle};
use crate::unit::{
    ComponentDescriptor, ComponentKind, EffectUnit, FourCc, InstantiationOptions, UnitFactory,
};

/// Descriptor the formant effect is registered and instantiated under
pub const FORMANT_EFFECT: ComponentDescriptor = ComponentDescriptor {
    kind: ComponentKind::Effect,
    subtype: FourCc::new(b"fmnt"),
    manufacturer: FourCc::new(b"vokl"),
};

/// Display name used at registration
pub const FORMANT_DISPLAY_NAME: &str = "Formant Filter";

const FORMANT_VERSION: u32 = 1;

/// Register the formant unit implementation with the global registry
///
/// One-time, process-wide step; call before constructing any
/// [`FormantFilter`]. Repeat calls are no-ops.
pub fn register_formant_unit(factory: UnitFactory) -> Result<(), Error> {
    registry::global().register(FORMANT_EFFECT, FORMANT_DISPLAY_NAME, FORMANT_VERSION, factory)
}

/// Whether the node's external unit is usable yet
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// Instantiation still in flight; writes are cached and deferred
    NotReady,
    /// Unit attached and synchronized
    Ready,
    /// Instantiation failed; the node is permanently non-functional
    Failed,
}

enum UnitEvent {
    Instantiated(Arc<dyn EffectUnit>),
    InstantiationFailed(Error),
    ParameterChanged(ParamChange),
}

struct ReadyUnit {
    unit: Arc<dyn EffectUnit>,
    center_frequency: ParameterHandle,
    attack_duration: ParameterHandle,
    decay_duration: ParameterHandle,
    node: NodeId,
    // held so the subscription could be torn down; the node never does
    #[allow(dead_code)]
    observer: ObserverToken,
}

enum State {
    NotReady,
    Ready(Box<ReadyUnit>),
    Failed(Error),
}

/// A formant filter node in the audio engine
///
/// Single-context object: all reads, writes, and [`pump`](Self::pump) calls
/// belong to one owning thread. The instantiation completion and the unit's
/// parameter observers run elsewhere and only ever send on the event channel.
pub struct FormantFilter {
    params: FilterParams,
    state: State,
    originator: Originator,
    engine: Arc<Engine>,
    upstream: NodeId,
    events: Receiver<UnitEvent>,
    sender: Sender<UnitEvent>,
}

impl FormantFilter {
    /// Create a node fed by `upstream`, using the global registry
    ///
    /// Returns immediately in [`Readiness::NotReady`]; the unit arrives
    /// through a later [`pump`](Self::pump). Parameter values read back
    /// exactly as supplied until then.
    pub fn new(engine: Arc<Engine>, upstream: NodeId, params: FilterParams) -> Self {
        Self::with_registry(
            registry::global(),
            engine,
            upstream,
            params,
            InstantiationOptions::default(),
        )
    }

    /// Create a node against a specific registry and options
    pub fn with_registry(
        registry: &ComponentRegistry,
        engine: Arc<Engine>,
        upstream: NodeId,
        params: FilterParams,
        options: InstantiationOptions,
    ) -> Self {
        let (sender, events) = unbounded();

        let completion_sender = sender.clone();
        registry.instantiate(FORMANT_EFFECT, options, move |result| {
            let event = match result {
                Ok(unit) => UnitEvent::Instantiated(unit),
                Err(e) => UnitEvent::InstantiationFailed(e),
            };
            // the receiver only disappears if the node was dropped
            let _ = completion_sender.send(event);
        });

        Self {
            params,
            state: State::NotReady,
            originator: Originator::unique(),
            engine,
            upstream,
            events,
            sender,
        }
    }

    /// Drain pending unit events, returning how many were applied
    ///
    /// This is the only place asynchronously-sourced state lands in the
    /// node, so calling it from the owning context serializes instantiation
    /// results and parameter notifications deterministically.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Ok(event) = self.events.try_recv() {
            self.apply(event);
            applied += 1;
        }
        applied
    }

    fn apply(&mut self, event: UnitEvent) {
        match event {
            UnitEvent::Instantiated(unit) => self.attach_unit(unit),
            UnitEvent::InstantiationFailed(e) => {
                if matches!(self.state, State::NotReady) {
                    warn!(error = %e, "formant unit instantiation failed");
                    self.state = State::Failed(e);
                }
            }
            UnitEvent::ParameterChanged(change) => self.apply_change(change),
        }
    }

    fn attach_unit(&mut self, unit: Arc<dyn EffectUnit>) {
        if !matches!(self.state, State::NotReady) {
            return;
        }

        let tree = unit.parameter_tree();
        let lookup = |name: &'static str| tree.lookup(name).ok_or(Error::MissingParameter(name));
        let handles = (|| {
            Ok::<_, Error>((
                lookup(CENTER_FREQUENCY)?,
                lookup(ATTACK_DURATION)?,
                lookup(DECAY_DURATION)?,
            ))
        })();
        let (center_frequency, attack_duration, decay_duration) = match handles {
            Ok(handles) => handles,
            Err(e) => {
                warn!(error = %e, "unit parameter tree is incomplete");
                self.state = State::Failed(e);
                return;
            }
        };

        let observer_sender = self.sender.clone();
        let observer = tree.subscribe(move |change| {
            let _ = observer_sender.send(UnitEvent::ParameterChanged(change));
        });

        // validate the upstream before attaching anything, so a failed node
        // leaves no trace in the shared engine
        if !self.engine.is_attached(self.upstream) {
            let e = Error::UnknownNode(self.upstream);
            warn!(error = %e, "upstream node is not attached to the engine");
            self.state = State::Failed(e);
            return;
        }

        let node = self.engine.attach(FORMANT_DISPLAY_NAME);
        if let Err(e) = self.engine.connect(self.upstream, node) {
            warn!(error = %e, "could not wire upstream into formant node");
            self.state = State::Failed(e);
            return;
        }

        // push the cached set so writes made before readiness converge
        center_frequency.set_value(self.params.center_frequency, self.originator);
        attack_duration.set_value(self.params.attack_duration, self.originator);
        decay_duration.set_value(self.params.decay_duration, self.originator);

        info!(?node, "formant unit ready");
        self.state = State::Ready(Box::new(ReadyUnit {
            unit,
            center_frequency,
            attack_duration,
            decay_duration,
            node,
            observer,
        }));
    }

    fn apply_change(&mut self, change: ParamChange) {
        let ready = match &self.state {
            State::Ready(r) => r,
            // observers only exist once ready, but a drop race is harmless
            _ => return,
        };

        let echo = change.originator == self.originator;
        if change.address == ready.center_frequency.address() {
            trace!(value = change.value, echo, "center_frequency changed");
            self.params.center_frequency = change.value;
        } else if change.address == ready.attack_duration.address() {
            trace!(value = change.value, echo, "attack_duration changed");
            self.params.attack_duration = change.value;
        } else if change.address == ready.decay_duration.address() {
            trace!(value = change.value, echo, "decay_duration changed");
            self.params.decay_duration = change.value;
        } else {
            trace!(address = change.address, "ignoring unknown parameter address");
        }
    }

    fn push(
        &self,
        value: f64,
        handle: impl FnOnce(&ReadyUnit) -> &ParameterHandle,
    ) -> Result<(), Error> {
        match &self.state {
            State::Ready(ready) => {
                let handle = handle(ready);
                debug!(
                    param = handle.name(),
                    value,
                    unit = %handle.unit(),
                    "pushing parameter to unit"
                );
                handle.set_value(value, self.originator);
                Ok(())
            }
            State::NotReady => {
                trace!(value, "unit not ready; write cached for deferred push");
                Ok(())
            }
            State::Failed(e) => Err(Error::UnitFailed {
                reason: e.to_string(),
            }),
        }
    }

    /// Set the center frequency in Hz
    ///
    /// Writing the current value is a no-op (nothing is pushed). Push
    /// happens before the cache updates, so the cache never claims a value
    /// the unit was not offered.
    pub fn set_center_frequency(&mut self, value: f64) -> Result<(), Error> {
        if value == self.params.center_frequency {
            return Ok(());
        }
        self.push(value, |r| &r.center_frequency)?;
        self.params.center_frequency = value;
        Ok(())
    }

    /// Set the attack duration in seconds
    pub fn set_attack_duration(&mut self, value: f64) -> Result<(), Error> {
        if value == self.params.attack_duration {
            return Ok(());
        }
        self.push(value, |r| &r.attack_duration)?;
        self.params.attack_duration = value;
        Ok(())
    }

    /// Set the decay duration in seconds
    pub fn set_decay_duration(&mut self, value: f64) -> Result<(), Error> {
        if value == self.params.decay_duration {
            return Ok(());
        }
        self.push(value, |r| &r.decay_duration)?;
        self.params.decay_duration = value;
        Ok(())
    }

    /// Cached center frequency in Hz
    pub fn center_frequency(&self) -> f64 {
        self.params.center_frequency
    }

    /// Cached attack duration in seconds
    pub fn attack_duration(&self) -> f64 {
        self.params.attack_duration
    }

    /// Cached decay duration in seconds
    pub fn decay_duration(&self) -> f64 {
        self.params.decay_duration
    }

    /// The whole cached parameter set
    pub fn params(&self) -> FilterParams {
        self.params
    }

    fn unit(&self) -> Result<&Arc<dyn EffectUnit>, Error> {
        match &self.state {
            State::Ready(r) => Ok(&r.unit),
            State::NotReady => Err(Error::NotReady),
            State::Failed(e) => Err(Error::UnitFailed {
                reason: e.to_string(),
            }),
        }
    }

    /// Begin processing
    pub fn start(&self) -> Result<(), Error> {
        let unit = self.unit()?;
        unit.start();
        Ok(())
    }

    /// Stop/bypass processing
    pub fn stop(&self) -> Result<(), Error> {
        let unit = self.unit()?;
        unit.stop();
        Ok(())
    }

    /// Live query of the unit's playing flag (never cached)
    pub fn is_started(&self) -> Result<bool, Error> {
        Ok(self.unit()?.is_playing())
    }

    /// Current readiness of the external unit
    pub fn readiness(&self) -> Readiness {
        match self.state {
            State::NotReady => Readiness::NotReady,
            State::Ready(_) => Readiness::Ready,
            State::Failed(_) => Readiness::Failed,
        }
    }

    /// The failure that put the node in [`Readiness::Failed`], if any
    pub fn instantiation_error(&self) -> Option<&Error> {
        match &self.state {
            State::Failed(e) => Some(e),
            _ => None,
        }
    }

    /// Identity this node tags its own parameter writes with
    pub fn originator(&self) -> Originator {
        self.originator
    }

    /// Engine node id, once attached
    pub fn node_id(&self) -> Option<NodeId> {
        match &self.state {
            State::Ready(r) => Some(r.node),
            _ => None,
        }
    }
}
