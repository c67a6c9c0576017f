//! Execution constraints and the environment signal they are checked against.
//!
//! Constraints gate when a piece of work may run. They are evaluated as a
//! logical AND against the current [`EnvironmentSignal`], which the embedding
//! application pushes into the queue whenever connectivity, charge state, or
//! battery level changes.

use serde::{Deserialize, Serialize};

/// Battery percentage at or below which the battery is considered low.
pub const LOW_BATTERY_PERCENT: u8 = 15;

/// Network requirement for a work request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkType {
    /// Work can run with or without a network.
    #[default]
    NotRequired,
    /// Any connection, metered or not.
    Connected,
    /// An unmetered connection only.
    Unmetered,
}

/// Current network connectivity reported by the environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Connectivity {
    /// No network available.
    Offline,
    /// Connected over a metered link.
    Metered,
    /// Connected over an unmetered link.
    Unmetered,
}

/// A snapshot of the environment state constraints are evaluated against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSignal {
    /// Current network connectivity.
    pub connectivity: Connectivity,
    /// Whether the device is charging.
    pub charging: bool,
    /// Battery level, 0..=100.
    pub battery_percent: u8,
}

impl EnvironmentSignal {
    /// Create a signal with explicit values.
    pub fn new(connectivity: Connectivity, charging: bool, battery_percent: u8) -> Self {
        Self {
            connectivity,
            charging,
            battery_percent,
        }
    }
}

impl Default for EnvironmentSignal {
    /// Offline, discharging, full battery.
    fn default() -> Self {
        Self {
            connectivity: Connectivity::Offline,
            charging: false,
            battery_percent: 100,
        }
    }
}

/// Preconditions that must hold before a work request may run.
///
/// All fields default to "not required", so `Constraints::default()` admits
/// work unconditionally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constraints {
    /// Required network type.
    pub network: NetworkType,
    /// Whether the device must be charging.
    pub requires_charging: bool,
    /// Whether the battery must be above the low threshold.
    pub requires_battery_not_low: bool,
}

impl Constraints {
    /// Create constraints with no requirements.
    pub fn none() -> Self {
        Self::default()
    }

    /// Set the required network type.
    pub fn with_network(mut self, network: NetworkType) -> Self {
        self.network = network;
        self
    }

    /// Require (or not) that the device is charging.
    pub fn with_charging(mut self, required: bool) -> Self {
        self.requires_charging = required;
        self
    }

    /// Require (or not) that the battery is not low.
    pub fn with_battery_not_low(mut self, required: bool) -> Self {
        self.requires_battery_not_low = required;
        self
    }

    /// Check whether all constraints hold for the given signal.
    ///
    /// Pure function: no side effects, deterministic for identical inputs.
    pub fn is_satisfied(&self, signal: &EnvironmentSignal) -> bool {
        let network_ok = match self.network {
            NetworkType::NotRequired => true,
            NetworkType::Connected => signal.connectivity != Connectivity::Offline,
            NetworkType::Unmetered => signal.connectivity == Connectivity::Unmetered,
        };

        let charging_ok = !self.requires_charging || signal.charging;
        let battery_ok =
            !self.requires_battery_not_low || signal.battery_percent > LOW_BATTERY_PERCENT;

        network_ok && charging_ok && battery_ok
    }
}
