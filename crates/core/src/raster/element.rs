//! Raster element trait for cell values

use num_traits::{Float, NumCast};
use std::fmt::Debug;

/// Trait for types that can be stored in a raster cell.
///
/// Meteorological and radiative fields are continuous quantities, so only
/// floating point cells are supported. NaN always counts as no-data, in
/// addition to any explicit sentinel the raster declares.
pub trait RasterElement:
    Float + Copy + Debug + PartialOrd + NumCast + Send + Sync + 'static
{
    /// Default no-data value for this type
    fn default_nodata() -> Self;

    /// Check if this value represents no-data
    fn is_nodata(&self, nodata: Option<Self>) -> bool;

    /// Convert self to f64
    fn to_f64(self) -> Option<f64> {
        NumCast::from(self)
    }
}

macro_rules! impl_raster_element_float {
    ($t:ty) => {
        impl RasterElement for $t {
            fn default_nodata() -> Self {
                <$t>::NAN
            }

            fn is_nodata(&self, nodata: Option<Self>) -> bool {
                if self.is_nan() {
                    return true;
                }
                match nodata {
                    Some(nd) => (self - nd).abs() < <$t>::EPSILON * 100.0,
                    None => false,
                }
            }
        }
    };
}

impl_raster_element_float!(f32);
impl_raster_element_float!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_is_nodata() {
        assert!((-9999.0f64).is_nodata(Some(-9999.0)));
        assert!(!(-9998.9f64).is_nodata(Some(-9999.0)));
        assert!(f32::NAN.is_nodata(None));
        assert!(!21.5f32.is_nodata(None));
    }
}
