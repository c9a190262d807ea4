//! PET over rasters
//!
//! Evaluates the point solver on every cell of co-registered meteorological
//! rasters. Cells are independent, so rows are processed in parallel.

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use biomet_core::raster::Raster;
use biomet_core::{Algorithm, Error, Result};

use super::body::BodyParameters;
use super::solver::pet;

/// Value written to cells that were not evaluated.
pub const PET_NODATA: f64 = -9999.0;

/// Lowest mean radiant temperature (°C) treated as a real radiative input.
/// Colder cells, masked terrain or missing data, get [`PET_NODATA`].
pub const MIN_VALID_TMRT: f64 = -10.0;

/// Parameters for PET grid evaluation
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PetParams {
    /// The person whose thermal state is modelled, shared by all cells
    pub body: BodyParameters,
}

/// The four input fields of a PET grid evaluation. All must share one shape.
#[derive(Debug, Clone)]
pub struct PetInputs {
    /// Air temperature, °C
    pub air_temp: Raster<f64>,
    /// Relative humidity, %
    pub rel_humidity: Raster<f64>,
    /// Mean radiant temperature, °C
    pub mean_radiant_temp: Raster<f64>,
    /// Wind speed, m/s
    pub wind_speed: Raster<f64>,
}

/// PET grid algorithm
#[derive(Debug, Clone, Default)]
pub struct Pet;

impl Algorithm for Pet {
    type Input = PetInputs;
    type Output = Raster<f64>;
    type Params = PetParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "PET"
    }

    fn description(&self) -> &'static str {
        "Physiological Equivalent Temperature from air temperature, humidity, mean radiant temperature and wind"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        pet_grid(
            &input.air_temp,
            &input.rel_humidity,
            &input.mean_radiant_temp,
            &input.wind_speed,
            &params,
        )
    }
}

/// Calculate PET for every cell of co-registered rasters.
///
/// Cells with `tmrt >= -10` are solved with the cell's four values; all other
/// cells, including NaN tmrt, are set to [`PET_NODATA`]. A solved cell with a
/// non-finite air temperature, humidity or wind is NaN. The output has the
/// shape and transform of `tmrt` and declares [`PET_NODATA`] as its nodata.
///
/// # Arguments
/// * `ta` - Air temperature raster, °C
/// * `rh` - Relative humidity raster, %
/// * `tmrt` - Mean radiant temperature raster, °C
/// * `va` - Wind speed raster, m/s
/// * `params` - Body parameters shared by all cells
///
/// # Errors
/// [`Error::SizeMismatch`] when any raster differs in shape from `tmrt`.
pub fn pet_grid(
    ta: &Raster<f64>,
    rh: &Raster<f64>,
    tmrt: &Raster<f64>,
    va: &Raster<f64>,
    params: &PetParams,
) -> Result<Raster<f64>> {
    tmrt.ensure_same_shape("air_temp", ta)?;
    tmrt.ensure_same_shape("rel_humidity", rh)?;
    tmrt.ensure_same_shape("wind_speed", va)?;

    for (layer, raster) in [("air_temp", ta), ("rel_humidity", rh), ("wind_speed", va)] {
        if !tmrt.transform().aligned_with(raster.transform()) {
            tracing::warn!(layer, "raster transform differs from mean radiant temperature");
        }
    }

    // shapes are checked above, so every (row, col) of tmrt is in bounds
    evaluate(tmrt, &params.body, |row, col| unsafe {
        (
            ta.get_unchecked(row, col),
            rh.get_unchecked(row, col),
            va.get_unchecked(row, col),
        )
    })
}

/// Calculate PET over a mean radiant temperature raster with spatially
/// uniform air temperature, humidity and wind.
///
/// Same masking and output conventions as [`pet_grid`].
pub fn pet_grid_uniform(
    ta: f64,
    rh: f64,
    tmrt: &Raster<f64>,
    va: f64,
    params: &PetParams,
) -> Result<Raster<f64>> {
    evaluate(tmrt, &params.body, |_, _| (ta, rh, va))
}

fn evaluate<F>(tmrt: &Raster<f64>, body: &BodyParameters, meteo: F) -> Result<Raster<f64>>
where
    F: Fn(usize, usize) -> (f64, f64, f64) + Sync + Send,
{
    let (rows, cols) = tmrt.shape();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![PET_NODATA; cols];
            for col in 0..cols {
                let radiant = unsafe { tmrt.get_unchecked(row, col) };
                if radiant.is_nan() || radiant < MIN_VALID_TMRT {
                    continue;
                }

                let (air, humidity, wind) = meteo(row, col);
                row_data[col] = pet(air, humidity, radiant, wind, body);
            }
            row_data
        })
        .collect();

    let mut output = tmrt.with_same_meta::<f64>(rows, cols);
    output.set_nodata(Some(PET_NODATA));
    *output.data_mut() =
        Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;

    let stats = output.statistics();
    tracing::debug!(
        rows,
        cols,
        evaluated = stats.valid_count,
        nodata = stats.nodata_count,
        min = ?stats.min,
        max = ?stats.max,
        "PET grid evaluated"
    );

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use biomet_core::GeoTransform;

    fn field(value: f64) -> Raster<f64> {
        let mut r = Raster::filled(4, 5, value);
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r
    }

    #[test]
    fn test_uniform_inputs_give_uniform_output() {
        let result = pet_grid(
            &field(20.0),
            &field(50.0),
            &field(20.0),
            &field(1.0),
            &PetParams::default(),
        )
        .unwrap();

        let expected = pet(20.0, 50.0, 20.0, 1.0, &BodyParameters::default());
        assert!(result.data().iter().all(|&v| v == expected));
        assert_eq!(result.nodata(), Some(PET_NODATA));
        assert_eq!(result.transform(), field(0.0).transform());
    }

    #[test]
    fn test_masked_cells_get_sentinel() {
        let mut tmrt = field(25.0);
        tmrt.set(0, 0, -10.0).unwrap();
        tmrt.set(1, 1, -10.0001).unwrap();
        tmrt.set(2, 2, f64::NAN).unwrap();
        tmrt.set(3, 4, -9999.0).unwrap();

        let result =
            pet_grid(&field(20.0), &field(50.0), &tmrt, &field(1.0), &PetParams::default())
                .unwrap();

        assert_ne!(result.get(0, 0).unwrap(), PET_NODATA);
        assert_eq!(result.get(1, 1).unwrap(), PET_NODATA);
        assert_eq!(result.get(2, 2).unwrap(), PET_NODATA);
        assert_eq!(result.get(3, 4).unwrap(), PET_NODATA);
        assert_eq!(result.statistics().nodata_count, 3);
    }

    #[test]
    fn test_missing_meteorology_gives_nan() {
        let mut rh = field(50.0);
        rh.set(1, 2, f64::NAN).unwrap();
        let mut va = field(1.0);
        va.set(3, 0, f64::NAN).unwrap();

        let result = pet_grid(&field(20.0), &rh, &field(20.0), &va, &PetParams::default()).unwrap();

        assert!(result.get(1, 2).unwrap().is_nan());
        assert!(result.get(3, 0).unwrap().is_nan());
        assert!(result.get(0, 0).unwrap().is_finite());
        assert_eq!(result.statistics().valid_count, 18);
    }

    #[test]
    fn test_shape_mismatch() {
        let wind = Raster::filled(4, 6, 1.0);
        let err = pet_grid(&field(20.0), &field(50.0), &field(20.0), &wind, &PetParams::default())
            .unwrap_err();

        assert_eq!(
            err,
            Error::SizeMismatch {
                layer: "wind_speed",
                er: 4,
                ec: 5,
                ar: 4,
                ac: 6
            }
        );
    }

    #[test]
    fn test_uniform_meteorology_matches_full_grid() {
        let mut tmrt = field(30.0);
        tmrt.set(1, 3, 55.0).unwrap();
        tmrt.set(2, 0, -20.0).unwrap();
        let params = PetParams::default();

        let full = pet_grid(&field(25.0), &field(40.0), &tmrt, &field(0.5), &params).unwrap();
        let uniform = pet_grid_uniform(25.0, 40.0, &tmrt, 0.5, &params).unwrap();

        assert_eq!(full.data(), uniform.data());
        assert_eq!(uniform.get(2, 0).unwrap(), PET_NODATA);
        assert!(uniform.get(1, 3).unwrap() > uniform.get(0, 0).unwrap());
    }

    #[test]
    fn test_algorithm_trait() {
        let input = PetInputs {
            air_temp: field(20.0),
            rel_humidity: field(50.0),
            mean_radiant_temp: field(20.0),
            wind_speed: field(1.0),
        };

        let result = Pet.execute_default(input).unwrap();
        assert_eq!(result.shape(), (4, 5));
        assert_eq!(Pet.name(), "PET");
    }

    #[test]
    fn test_empty_raster() {
        let empty: Raster<f64> = Raster::new(0, 0);
        let result = pet_grid_uniform(20.0, 50.0, &empty, 1.0, &PetParams::default()).unwrap();
        assert!(result.is_empty());
    }
}
