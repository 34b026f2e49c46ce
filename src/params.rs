//! Filter parameters and their metadata

use std::fmt;

use crate::tree::ParamAddress;

/// Parameter name for the filter's center frequency
pub const CENTER_FREQUENCY: &str = "center_frequency";
/// Parameter name for the resonator attack duration
pub const ATTACK_DURATION: &str = "attack_duration";
/// Parameter name for the resonator decay duration
pub const DECAY_DURATION: &str = "decay_duration";

/// Unit of measure for a parameter, for display and logging
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ParamUnit {
    Hertz,
    Seconds,
}

impl fmt::Display for ParamUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamUnit::Hertz => write!(f, "Hz"),
            ParamUnit::Seconds => write!(f, "s"),
        }
    }
}

/// Static description of one named, addressable parameter
#[derive(Clone, Debug)]
pub struct ParamSpec {
    /// Stable name used for tree lookup
    pub name: &'static str,
    /// Stable address used in change notifications
    pub address: ParamAddress,
    pub default: f64,
    pub min: f64,
    pub max: f64,
    pub unit: ParamUnit,
}

/// The three formant filter parameters
///
/// Values are plain data; pushing them to a unit and keeping them in sync
/// is [`FormantFilter`](crate::FormantFilter)'s job.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FilterParams {
    /// Resonance center frequency in Hz
    pub center_frequency: f64,
    /// Excitation attack duration in seconds
    pub attack_duration: f64,
    /// Resonance decay duration in seconds
    pub decay_duration: f64,
}

impl Default for FilterParams {
    fn default() -> Self {
        Self {
            center_frequency: 1000.0,
            attack_duration: 0.007,
            decay_duration: 0.04,
        }
    }
}

/// Parameter specs for the formant filter, in address order
///
/// Addresses are stable: 0 = center frequency, 1 = attack, 2 = decay.
pub fn formant_param_specs() -> [ParamSpec; 3] {
    [
        ParamSpec {
            name: CENTER_FREQUENCY,
            address: 0,
            default: 1000.0,
            min: 20.0,
            max: 20_000.0,
            unit: ParamUnit::Hertz,
        },
        ParamSpec {
            name: ATTACK_DURATION,
            address: 1,
            default: 0.007,
            min: 0.0,
            max: 10.0,
            unit: ParamUnit::Seconds,
        },
        ParamSpec {
            name: DECAY_DURATION,
            address: 2,
            default: 0.04,
            min: 0.0,
            max: 10.0,
            unit: ParamUnit::Seconds,
        },
    ]
}
