//! Physical constants in SI units.
//!
//! Values follow the IAU 2015 nominal solar constants used by the
//! gravitational-wave community.

/// Speed of light in vacuum [m/s]
pub const C_SI: f64 = 299_792_458.0;

/// Solar mass expressed as a time, G M_sun / c^3 [s]
pub const MTSUN_SI: f64 = 4.925_490_947_641_266_8e-6;

/// One megaparsec [m]
pub const MPC_SI: f64 = 3.085_677_581_491_367_3e22;

/// Euler-Mascheroni constant
pub const GAMMA_E: f64 = 0.577_215_664_901_532_9;

/// Lens time scale per solar mass, `tM = 4 G M_L / c^3` [s].
///
/// `4 MTSUN_SI = 1.97e-5`, kept at the rounded 2e-5 used for published grids.
pub const LENS_TIME_PER_MSUN: f64 = 2.0e-5;
