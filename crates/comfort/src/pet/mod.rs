//! Physiological Equivalent Temperature
//!
//! PET is the air temperature of a reference indoor climate (Tmrt = Ta,
//! 0.1 m/s wind, 12 hPa vapour pressure) at which a person reaches the same
//! core and skin temperatures as under the actual outdoor conditions.
//!
//! - [`pet`] / [`solve`]: single point, from scalar meteorology
//! - [`pet_grid`] / [`pet_grid_uniform`]: every cell of a raster, with cells
//!   of mean radiant temperature below -10 °C set to [`PET_NODATA`]
//! - [`BodyParameters`]: the modelled person, validated on construction

mod body;
mod grid;
mod psychrometrics;
mod solver;

pub use body::{BodyParameters, Sex};
pub use grid::{pet_grid, pet_grid_uniform, Pet, PetInputs, PetParams, MIN_VALID_TMRT, PET_NODATA};
pub use psychrometrics::{relative_humidity, saturation_vapour_pressure, vapour_pressure};
pub use solver::{
    body_shape_factor, clothing_area_factor, pet, solve, EnvironmentSample, PetSolution,
    WaterLoss, MAX_STEPS, REGIMES,
};
