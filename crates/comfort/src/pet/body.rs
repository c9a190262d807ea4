//! Body parameters of the person whose thermal state is modelled

use biomet_core::{Error, Result};
use serde::{Deserialize, Serialize};

use super::solver::clothing_area_factor;

/// Sex of the modelled person. Selects the basal metabolism regression and
/// scales the sweat rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    #[default]
    Male,
    Female,
}

/// Physiological description of the modelled person.
///
/// Immutable once built; a single instance is shared read-only by every cell
/// of a grid evaluation. Construction validates the values that the energy
/// balance divides by or takes roots and logarithms of, so a `BodyParameters`
/// in hand never produces NaN through degenerate geometry. This excludes
/// near-nude clothing below about 0.014 clo, where the clothed fraction of
/// the body surface is not positive.
///
/// The default is the standard reference person of the PET literature:
/// a 35 year old man of 75 kg and 1.75 m, working at 80 W in 0.9 clo.
///
/// # Example
///
/// ```
/// use biomet_comfort::pet::{BodyParameters, Sex};
///
/// let body = BodyParameters::new(60.0, 28.0, 1.65, 80.0, 0.5, Sex::Female).unwrap();
/// assert_eq!(body.sex(), Sex::Female);
/// assert!(BodyParameters::new(0.0, 28.0, 1.65, 80.0, 0.5, Sex::Female).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "BodyConfig")]
pub struct BodyParameters {
    /// Body mass in kg
    mass: f64,
    /// Age in years
    age: f64,
    /// Height in m
    height: f64,
    /// External work load in W, added to the basal metabolism
    activity: f64,
    /// Clothing insulation in clo
    clothing: f64,
    sex: Sex,
}

impl BodyParameters {
    /// Build validated body parameters.
    ///
    /// Rejects non-finite values, `mass <= 0`, `height <= 0`, `age < 0`,
    /// `clothing < 0` and clothing too light for a positive
    /// [`clothing_area_factor`] with [`Error::InvalidParameter`].
    pub fn new(
        mass: f64,
        age: f64,
        height: f64,
        activity: f64,
        clothing: f64,
        sex: Sex,
    ) -> Result<Self> {
        let checks: [(&'static str, f64, bool, &str); 5] = [
            ("mass", mass, mass > 0.0, "must be positive"),
            ("age", age, age >= 0.0, "must not be negative"),
            ("height", height, height > 0.0, "must be positive"),
            ("activity", activity, true, ""),
            ("clothing", clothing, clothing >= 0.0, "must not be negative"),
        ];

        for (name, value, ok, reason) in checks {
            if !value.is_finite() {
                return Err(Error::invalid_parameter(name, value, "must be finite"));
            }
            if !ok {
                return Err(Error::invalid_parameter(name, value, reason));
            }
        }

        if clothing_area_factor(clothing) <= 0.0 {
            return Err(Error::invalid_parameter(
                "clothing",
                clothing,
                "clothing area factor must be positive",
            ));
        }

        Ok(Self {
            mass,
            age,
            height,
            activity,
            clothing,
            sex,
        })
    }

    /// Same person wearing a different clothing insulation (clo).
    pub fn with_clothing(self, clothing: f64) -> Result<Self> {
        Self::new(self.mass, self.age, self.height, self.activity, clothing, self.sex)
    }

    /// Same person with a different external work load (W).
    pub fn with_activity(self, activity: f64) -> Result<Self> {
        Self::new(self.mass, self.age, self.height, activity, self.clothing, self.sex)
    }

    /// Same parameters for the other sex.
    pub fn with_sex(self, sex: Sex) -> Self {
        Self { sex, ..self }
    }

    pub fn mass(&self) -> f64 {
        self.mass
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn activity(&self) -> f64 {
        self.activity
    }

    pub fn clothing(&self) -> f64 {
        self.clothing
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }
}

impl Default for BodyParameters {
    fn default() -> Self {
        Self {
            mass: 75.0,
            age: 35.0,
            height: 1.75,
            activity: 80.0,
            clothing: 0.9,
            sex: Sex::Male,
        }
    }
}

/// Unvalidated mirror of [`BodyParameters`] used for deserialization.
/// Missing fields fall back to the standard person.
#[derive(Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct BodyConfig {
    mass: f64,
    age: f64,
    height: f64,
    activity: f64,
    clothing: f64,
    sex: Sex,
}

impl Default for BodyConfig {
    fn default() -> Self {
        let standard = BodyParameters::default();
        Self {
            mass: standard.mass,
            age: standard.age,
            height: standard.height,
            activity: standard.activity,
            clothing: standard.clothing,
            sex: standard.sex,
        }
    }
}

impl TryFrom<BodyConfig> for BodyParameters {
    type Error = Error;

    fn try_from(raw: BodyConfig) -> Result<Self> {
        BodyParameters::new(raw.mass, raw.age, raw.height, raw.activity, raw.clothing, raw.sex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_standard_person() {
        let body = BodyParameters::default();
        assert_eq!(body.mass(), 75.0);
        assert_eq!(body.age(), 35.0);
        assert_eq!(body.height(), 1.75);
        assert_eq!(body.activity(), 80.0);
        assert_eq!(body.clothing(), 0.9);
        assert_eq!(body.sex(), Sex::Male);
        assert_eq!(
            BodyParameters::new(75.0, 35.0, 1.75, 80.0, 0.9, Sex::Male).unwrap(),
            body
        );
    }

    #[test]
    fn test_rejects_degenerate_values() {
        let cases = [
            (0.0, 35.0, 1.75, 80.0, 0.9, "mass"),
            (-70.0, 35.0, 1.75, 80.0, 0.9, "mass"),
            (75.0, -1.0, 1.75, 80.0, 0.9, "age"),
            (75.0, 35.0, 0.0, 80.0, 0.9, "height"),
            (75.0, 35.0, 1.75, f64::NAN, 0.9, "activity"),
            (75.0, 35.0, 1.75, 80.0, -0.1, "clothing"),
            (75.0, 35.0, f64::INFINITY, 80.0, 0.9, "height"),
        ];

        for (mass, age, height, activity, clo, field) in cases {
            match BodyParameters::new(mass, age, height, activity, clo, Sex::Male) {
                Err(Error::InvalidParameter { name, .. }) => assert_eq!(name, field),
                other => panic!("expected {} to be rejected, got {:?}", field, other),
            }
        }
    }

    #[test]
    fn test_zero_age_and_light_clothing_are_valid() {
        assert!(BodyParameters::new(20.0, 0.0, 1.1, 50.0, 0.02, Sex::Female).is_ok());
    }

    #[test]
    fn test_rejects_clothing_without_covered_area() {
        for clo in [0.0, 0.005, 0.01, 0.0136] {
            match BodyParameters::default().with_clothing(clo) {
                Err(Error::InvalidParameter { name, reason, .. }) => {
                    assert_eq!(name, "clothing");
                    assert!(reason.contains("area factor"), "{reason}");
                }
                other => panic!("expected clo {} to be rejected, got {:?}", clo, other),
            }
        }
        assert!(BodyParameters::default().with_clothing(0.014).is_ok());
    }

    #[test]
    fn test_with_clothing_revalidates() {
        let body = BodyParameters::default();
        assert_eq!(body.with_clothing(3.0).unwrap().clothing(), 3.0);
        assert!(body.with_clothing(-1.0).is_err());
        assert_eq!(body.with_sex(Sex::Female).mass(), 75.0);
    }
}
