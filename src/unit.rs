//! External effect unit boundary
//!
//! The actual signal processing lives in a host-managed unit this crate never
//! looks inside. Everything we need from it is here: a component identity for
//! registration, a factory for instantiation, and the [`EffectUnit`] trait
//! for parameter access and transport control.

use std::fmt;
use std::sync::Arc;

use crate::error::Error;
use crate::tree::ParameterTree;

/// Four-character component identity code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourCc(pub [u8; 4]);

impl FourCc {
    pub const fn new(code: &[u8; 4]) -> Self {
        Self(*code)
    }
}

impl fmt::Display for FourCc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            // non-ASCII codes render as '?' rather than garbage
            let c = if b.is_ascii_graphic() || b == b' ' {
                b as char
            } else {
                '?'
            };
            write!(f, "{}", c)?;
        }
        Ok(())
    }
}

/// What kind of component a descriptor identifies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    Effect,
}

/// Identity of a registrable audio component
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentDescriptor {
    pub kind: ComponentKind,
    pub subtype: FourCc,
    pub manufacturer: FourCc,
}

impl fmt::Display for ComponentDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}/{}/{}", self.kind, self.subtype, self.manufacturer)
    }
}

/// Options passed to a component factory at instantiation time
#[derive(Clone, Copy, Debug)]
pub struct InstantiationOptions {
    pub sample_rate: u32,
}

impl Default for InstantiationOptions {
    fn default() -> Self {
        Self { sample_rate: 48_000 }
    }
}

/// An instantiated effect unit, treated as a black box
///
/// Implementations are shared across threads: the registry's completion
/// thread hands the unit over, the owning context drives transport, and the
/// unit's own processing runs wherever the host put it.
pub trait EffectUnit: Send + Sync {
    /// The unit's tunable parameters
    fn parameter_tree(&self) -> &ParameterTree;

    /// Begin processing
    fn start(&self);

    /// Stop/bypass processing
    fn stop(&self);

    /// Whether the unit is currently processing
    fn is_playing(&self) -> bool;
}

/// Factory invoked by the registry to build a unit instance
pub type UnitFactory =
    Arc<dyn Fn(&InstantiationOptions) -> Result<Arc<dyn EffectUnit>, Error> + Send + Sync>;
