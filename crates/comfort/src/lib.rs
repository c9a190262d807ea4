//! # biomet Comfort
//!
//! Human thermal comfort indices for points and rasters.
//!
//! ## Available indices
//!
//! - **pet**: Physiological Equivalent Temperature (Höppe 1999), from air
//!   temperature, relative humidity, mean radiant temperature and wind speed
//!
//! ```
//! use biomet_comfort::prelude::*;
//!
//! let tmrt: Raster<f64> = Raster::filled(2, 3, 45.0);
//! let out = pet_grid_uniform(28.0, 45.0, &tmrt, 1.5, &PetParams::default()).unwrap();
//! assert_eq!(out.shape(), tmrt.shape());
//! ```

mod maybe_rayon;
pub mod pet;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::pet::{
        pet, pet_grid, pet_grid_uniform, solve, BodyParameters, EnvironmentSample, Pet,
        PetInputs, PetParams, PetSolution, Sex, PET_NODATA,
    };
    pub use biomet_core::prelude::*;
}
