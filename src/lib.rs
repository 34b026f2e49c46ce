//! Vokal - formant filter node with message-passing parameter control
//!
//! Design principles:
//! - The external unit is authoritative; the node keeps a best-effort cache
//! - Parameter changes travel as messages through one channel, drained on
//!   the owning context - no cross-thread mutation, no locks on reads
//! - Readiness is explicit: NotReady | Ready | Failed, never a crash
//! - Component registration is a one-time process-wide step, separate from
//!   per-node construction
//!
//! ```no_run
//! use std::sync::Arc;
//! use vokal::{register_formant_unit, Engine, FilterParams, FormantFilter, Readiness};
//! # fn factory() -> vokal::UnitFactory { unimplemented!() }
//!
//! register_formant_unit(factory()).expect("registration");
//!
//! let engine = Arc::new(Engine::new());
//! let source = engine.attach("source");
//! let mut filter = FormantFilter::new(engine, source, FilterParams::default());
//!
//! // drive the node from its owning context
//! while filter.readiness() == Readiness::NotReady {
//!     filter.pump();
//! }
//! filter.set_center_frequency(2000.0).unwrap();
//! filter.start().unwrap();
//! ```

mod engine;
mod error;
mod filter;
mod params;
mod registry;
mod tree;
mod unit;

pub use engine::{Engine, NodeId};
pub use error::Error;
pub use filter::{
    register_formant_unit, FormantFilter, Readiness, FORMANT_DISPLAY_NAME, FORMANT_EFFECT,
};
pub use params::{
    formant_param_specs, FilterParams, ParamSpec, ParamUnit, ATTACK_DURATION, CENTER_FREQUENCY,
    DECAY_DURATION,
};
pub use registry::{global, ComponentRegistry};
pub use tree::{ObserverToken, Originator, ParamAddress, ParamChange, ParameterHandle, ParameterTree};
pub use unit::{
    ComponentDescriptor, ComponentKind, EffectUnit, FourCc, InstantiationOptions, UnitFactory,
};
