//! # Constants and type definitions for EGTF
//!
//! This module centralizes the **unit conversions**, the **default tuning constants** of the
//! adaptive smoothing method, and the **common type aliases** used throughout the crate.
//!
//! ## Overview
//!
//! - Units: positions in miles, times in epoch seconds, speeds in mph
//! - Characteristic speeds and regime blending defaults
//! - Identifiers for vehicles and lanes
//!
//! Defaults are tuned for a multi-lane freeway recorded at about 25 Hz; every one of them is
//! exposed as configuration through the parameter builders.

// -------------------------------------------------------------------------------------------------
// Unit conversions
// -------------------------------------------------------------------------------------------------

/// Number of seconds in one hour (mph ↔ miles per second)
pub const SECONDS_PER_HOUR: f64 = 3600.0;

/// Numerical epsilon used when counting grid cells from a floating extent
pub const GRID_EPS: f64 = 1e-9;

// -------------------------------------------------------------------------------------------------
// Adaptive smoothing defaults
// -------------------------------------------------------------------------------------------------

/// Characteristic free-flow propagation speed (mph), about 80% of the desired speed.
pub const DEFAULT_C_FREE: Mph = 43.0;

/// Characteristic congestion-wave speed (mph), negative: waves travel against traffic.
pub const DEFAULT_C_CONG: Mph = -13.0;

/// Spatial kernel scale (miles), the kernel window spans 0.15 mile.
pub const DEFAULT_SIGMA_SPACE: Mile = 0.075;

/// Temporal kernel scale (seconds), the kernel window spans 36 s.
pub const DEFAULT_SIGMA_TIME: Second = 18.0;

/// Crossover speed of the regime weight (mph).
pub const DEFAULT_V_CRIT: Mph = 36.0;

/// Width of the regime transition (mph).
pub const DEFAULT_DELTA_V: Mph = 12.43;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Distance in miles
pub type Mile = f64;
/// Time in seconds (epoch seconds for absolute instants)
pub type Second = f64;
/// Speed in miles per hour
pub type Mph = f64;
/// Identifier of an observed vehicle
pub type VehicleId = u32;
/// Identifier of a lane (1-based on the testbed, but any value is accepted)
pub type LaneId = u8;
/// Identifier of a virtual trajectory (spawn index)
pub type TrajectoryId = u32;

/// Direction in which traffic moves along the position axis.
///
/// Mile markers on many highways decrease along the direction of travel; the direction is
/// carried by the grid so that kernels and the integrator orient themselves without the caller
/// flipping coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum TravelDirection {
    /// Vehicles move toward larger positions.
    #[default]
    IncreasingPosition,
    /// Vehicles move toward smaller positions.
    DecreasingPosition,
}

impl TravelDirection {
    /// `+1.0` for increasing travel, `-1.0` otherwise.
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            TravelDirection::IncreasingPosition => 1.0,
            TravelDirection::DecreasingPosition => -1.0,
        }
    }
}

impl std::fmt::Display for TravelDirection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TravelDirection::IncreasingPosition => write!(f, "increasing"),
            TravelDirection::DecreasingPosition => write!(f, "decreasing"),
        }
    }
}
