//! Point solver for the Physiological Equivalent Temperature
//!
//! Implements the two-node energy balance of the Munich Energy-balance Model
//! for Individuals (MEMI, Höppe 1984) and the PET back-solve of Höppe (1999):
//!
//! 1. **Metabolic setup**: basal metabolism from a sex-specific regression on
//!    mass, age and height, respiratory heat loss, and the clothed-body
//!    geometry (DuBois area, clothing area factor, cylinder radii).
//! 2. **Regime search**: for each of seven physiological regimes, a fixed-step
//!    search on the clothing surface temperature balances the heat budget.
//!    Each regime has its own closed-form or quadratic expression for the
//!    core temperature (vasoconstriction / vasodilation, sweating or not);
//!    the first regime whose converged state is self-consistent is accepted.
//! 3. **Equivalent temperature**: with skin and clothing state frozen, a second
//!    fixed-step search finds the air temperature of the reference climate
//!    (Tmrt = Ta, 0.1 m/s wind, 12 hPa vapour pressure) that yields the same
//!    energy balance. That temperature is the PET.
//!
//! Both searches step by 1, 0.1, 0.01 and 0.001 °C and stop a pass when the
//! balance changes sign, so the result is resolved to about 0.001 °C and the
//! work per call is bounded.

use super::body::{BodyParameters, Sex};
use super::psychrometrics::{body_vapour_pressure, vapour_pressure};

// Physical constants of the MEMI model
const PRESSURE: f64 = 1013.25;
const PRESSURE_REF: f64 = 1013.25;
/// Density of blood, kg/l
const BLOOD_DENSITY: f64 = 1.06;
/// Specific heat of blood, W s/(l K)
const BLOOD_HEAT_CAPACITY: f64 = 3.64 * 1000.0;
const SKIN_EMISSIVITY: f64 = 0.99;
const CLOTHING_EMISSIVITY: f64 = 0.95;
/// Latent heat of evaporation, J/kg
const LATENT_HEAT: f64 = 2.42e6;
const STEFAN_BOLTZMANN: f64 = 5.67e-8;
/// Specific heat of air, J/(kg K)
const AIR_HEAT_CAPACITY: f64 = 1.01 * 1000.0;
/// Fraction of the body surface exchanging long-wave radiation
const RADIATING_FRACTION: f64 = 0.725;
/// Water vapour diffusion resistance of the skin
const SKIN_DIFFUSION_RESISTANCE: f64 = 0.79e7;
const CLOTHING_DIFFUSION_RESISTANCE: f64 = 0.0;
const KELVIN: f64 = 273.2;
/// Mechanical efficiency of the external work
const EFFICIENCY: f64 = 0.0;
const FOOD: f64 = 0.0;

/// Body temperature above which sweating starts, °C
const SWEAT_ONSET: f64 = 36.6;
const FEMALE_SWEAT_FACTOR: f64 = 0.7;
/// Hourly sweat loss cap in the water balance, g/h
const MAX_SWEAT_LOSS: f64 = 2000.0;

const REFERENCE_WIND: f64 = 0.1;
const REFERENCE_VAPOUR_PRESSURE: f64 = 12.0;

/// Number of physiological regimes tried by the regime search.
pub const REGIMES: usize = 7;
/// Step bound of one fixed-step search (per regime, per back-solve).
///
/// The count runs across all four passes of a search and is not reset when
/// the step size shrinks. Once it is spent, each remaining pass evaluates
/// the balance once and ends.
pub const MAX_STEPS: usize = 200;

/// Ambient conditions at one location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentSample {
    /// Air temperature, °C
    pub air_temp: f64,
    /// Relative humidity, %
    pub rel_humidity: f64,
    /// Mean radiant temperature, °C
    pub mean_radiant_temp: f64,
    /// Wind speed at body height, m/s
    pub wind_speed: f64,
}

impl EnvironmentSample {
    pub fn new(air_temp: f64, rel_humidity: f64, mean_radiant_temp: f64, wind_speed: f64) -> Self {
        Self {
            air_temp,
            rel_humidity,
            mean_radiant_temp,
            wind_speed,
        }
    }

    /// Whether all four values are finite
    pub fn is_finite(&self) -> bool {
        self.air_temp.is_finite()
            && self.rel_humidity.is_finite()
            && self.mean_radiant_temp.is_finite()
            && self.wind_speed.is_finite()
    }
}

/// Hourly water loss of the converged state, g/h (positive = lost).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterLoss {
    /// Sweating, capped at 2000 g/h
    pub sweat: f64,
    /// Vapour diffusion through the skin
    pub diffusion: f64,
    /// Respiration
    pub respiration: f64,
    pub total: f64,
}

/// Result of a point solve.
///
/// When no regime satisfied its acceptance test, `converged` is false and the
/// remaining fields describe the last regime tried. `pet` is still computed
/// from that state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PetSolution {
    /// Physiological Equivalent Temperature, °C
    pub pet: f64,
    pub converged: bool,
    /// Accepted regime (1..=7), `None` when the search was exhausted
    pub regime: Option<usize>,
    /// Mean skin temperature, °C
    pub skin_temp: f64,
    /// Clothing surface temperature, °C
    pub clothing_temp: f64,
    /// Core temperature of the selected regime, °C
    pub core_temp: f64,
    /// Fraction of the skin wetted by sweat (0..=1)
    pub wetted_skin: f64,
    /// Skin blood flow, l/(m² h)
    pub blood_flow: f64,
    /// Sweat rate, kg/s
    pub sweat_rate: f64,
    pub water_loss: WaterLoss,
}

impl PetSolution {
    fn undefined() -> Self {
        Self {
            pet: f64::NAN,
            converged: false,
            regime: None,
            skin_temp: f64::NAN,
            clothing_temp: f64::NAN,
            core_temp: f64::NAN,
            wetted_skin: f64::NAN,
            blood_flow: f64::NAN,
            sweat_rate: f64::NAN,
            water_loss: WaterLoss {
                sweat: f64::NAN,
                diffusion: f64::NAN,
                respiration: f64::NAN,
                total: f64::NAN,
            },
        }
    }
}

/// Physiological Equivalent Temperature (°C) for one set of conditions.
///
/// * `ta` - air temperature, °C
/// * `rh` - relative humidity, %
/// * `tmrt` - mean radiant temperature, °C
/// * `va` - wind speed, m/s
///
/// No range checks are applied to the environment. A non-finite input
/// yields NaN.
///
/// # Example
/// ```
/// use biomet_comfort::pet::{pet, BodyParameters};
///
/// let value = pet(20.0, 50.0, 20.0, 1.0, &BodyParameters::default());
/// assert!((value - 17.03).abs() < 0.01);
/// ```
pub fn pet(ta: f64, rh: f64, tmrt: f64, va: f64, body: &BodyParameters) -> f64 {
    solve(&EnvironmentSample::new(ta, rh, tmrt, va), body).pet
}

/// Solve the full energy balance and return PET with the physiological state.
///
/// Non-finite environment values give a solution with every field NaN and
/// `converged` false.
pub fn solve(env: &EnvironmentSample, body: &BodyParameters) -> PetSolution {
    if !env.is_finite() {
        return PetSolution::undefined();
    }

    let solver = PointSolver::new(env, body);
    let state = solver.regime_search();
    let pet = solver.equivalent_temperature(&state);

    if !state.converged {
        tracing::trace!(
            ta = env.air_temp,
            rh = env.rel_humidity,
            tmrt = env.mean_radiant_temp,
            va = env.wind_speed,
            iterations = state.iterations,
            "no physiological regime accepted, using last state"
        );
    }

    PetSolution {
        pet,
        converged: state.converged,
        regime: state.converged.then_some(state.regime),
        skin_temp: state.skin_temp,
        clothing_temp: state.clothing_temp,
        core_temp: state.core_temps[state.regime],
        wetted_skin: state.wetted_skin,
        blood_flow: state.blood_flow,
        sweat_rate: state.sweat_rate,
        water_loss: solver.water_loss(&state),
    }
}

/// Clothing area factor for an insulation in clo, clamped to at most 1.
pub fn clothing_area_factor(clo: f64) -> f64 {
    let facl = (-2.36 + 173.51 * clo - 100.76 * clo * clo + 19.28 * clo.powf(3.0)) / 100.0;
    if facl > 1.0 {
        1.0
    } else {
        facl
    }
}

/// Body shape factor of the clothed cylinder model.
///
/// The thresholds overlap. They are applied in order and the last one that
/// matches sets the value.
pub fn body_shape_factor(clo: f64, height: f64) -> f64 {
    let mut y = 1.0;
    if clo < 2.0 {
        y = (height - 0.2) / height;
    }
    if clo <= 0.6 {
        y = 0.5;
    }
    if clo <= 0.3 {
        y = 0.1;
    }
    y
}

/// Convective heat transfer coefficient for a wind speed in m/s.
fn convection_coefficient(wind_speed: f64) -> f64 {
    (2.67 + 6.5 * wind_speed.powf(0.67)) * (PRESSURE / PRESSURE_REF).powf(0.55)
}

/// Sensible and latent respiratory heat flux at air temperature `temp` and
/// vapour pressure `vp`, for respiratory volume `rtv`.
fn respiration(temp: f64, vp: f64, rtv: f64) -> (f64, f64) {
    let exhaled = 0.47 * temp + 21.0;
    let sensible = AIR_HEAT_CAPACITY * (temp - exhaled) * rtv;
    let exhaled_vp = body_vapour_pressure(exhaled);
    let latent = 0.623 * LATENT_HEAT / PRESSURE * (vp - exhaled_vp) * rtv;
    (sensible, latent)
}

fn radiation_term(a: f64, b: f64) -> f64 {
    (a + KELVIN).powf(4.0) - (b + KELVIN).powf(4.0)
}

/// Heat production and respiratory losses of the person in ambient air.
#[derive(Debug, Clone, Copy)]
struct Metabolism {
    /// Internal heat production, W
    heat: f64,
    /// Respiratory volume
    rtv: f64,
    /// Total respiratory heat flux, W
    respiration: f64,
    /// Latent part of `respiration`, W
    latent_respiration: f64,
}

impl Metabolism {
    fn new(body: &BodyParameters, air_temp: f64, vpa: f64) -> Self {
        let mass = body.mass();
        let stature = body.height() * 100.0 / mass.powf(1.0 / 3.0);
        let age_term = 0.004 * (30.0 - body.age());

        let basal = match body.sex() {
            Sex::Male => 3.45 * mass.powf(3.0 / 4.0) * (1.0 + age_term + 0.010 * (stature - 43.4)),
            Sex::Female => 3.19 * mass.powf(3.0 / 4.0) * (1.0 + age_term + 0.018 * (stature - 42.1)),
        };
        let met = basal + body.activity();

        let rtv = 1.44e-6 * met;
        let (sensible, latent) = respiration(air_temp, vpa, rtv);

        Self {
            heat: met * (1.0 - EFFICIENCY),
            rtv,
            respiration: sensible + latent,
            latent_respiration: latent,
        }
    }
}

/// Geometry of the clothed body.
#[derive(Debug, Clone, Copy)]
struct Geometry {
    /// DuBois body surface area, m²
    adu: f64,
    /// Clothed fraction of the body surface
    facl: f64,
    /// Clothing heat resistance
    rcl: f64,
    /// Outer clothing surface area, m²
    acl: f64,
    /// Radiating body area, m²
    aeff: f64,
    /// Heat conductance through the clothing layer
    htcl: f64,
}

impl Geometry {
    fn new(body: &BodyParameters) -> Self {
        let clo = body.clothing();
        let height = body.height();

        let adu = 0.203 * body.mass().powf(0.425) * height.powf(0.725);
        let facl = clothing_area_factor(clo);
        let rcl = (clo / 6.45) / facl;
        let y = body_shape_factor(clo, height);
        let fcl = 1.0 + 0.15 * clo;

        let r2 = adu * (fcl - 1.0 + facl) / (2.0 * 3.14 * height * y);
        let r1 = facl * adu / (2.0 * 3.14 * height * y);
        let di = r2 - r1;

        let acl = adu * facl + adu * (fcl - 1.0);
        let htcl = 6.28 * height * y * di / (rcl * (r2 / r1).ln() * acl);

        Self {
            adu,
            facl,
            rcl,
            acl,
            aeff: adu * RADIATING_FRACTION,
            htcl,
        }
    }
}

/// Working state of the regime search. Local to one solve.
#[derive(Debug, Clone, Copy)]
struct BodyState {
    skin_temp: f64,
    clothing_temp: f64,
    /// Core temperature candidates by regime; index 0 is unused
    core_temps: [f64; REGIMES + 1],
    /// Regime the state belongs to
    regime: usize,
    wetted_skin: f64,
    /// Evaporative heat flux of sweat, W (≤ 0)
    sweat_evaporation: f64,
    /// Vapour pressure at the skin, hPa
    skin_vapour_pressure: f64,
    /// Diffusive heat flux through the skin, W
    diffusion: f64,
    sweat_rate: f64,
    blood_flow: f64,
    /// Energy balance evaluations across all regimes
    iterations: usize,
    converged: bool,
}

/// One evaluation of the body energy balance at a clothing temperature.
#[derive(Debug, Clone, Copy)]
struct Balance {
    skin_temp: f64,
    /// Discriminant of the regime 2 / 5 quadratic
    disc_sweating: f64,
    /// Discriminant of the regime 1 / 6 quadratic
    disc_dilated: f64,
    wetted_skin: f64,
    sweat_evaporation: f64,
    skin_vapour_pressure: f64,
    diffusion: f64,
    sweat_rate: f64,
    blood_flow: f64,
    enbal: f64,
}

/// Four-pass fixed-step sign-change search shared by both stages.
#[derive(Debug, Clone, Copy)]
struct StepSearch {
    pass: u8,
    steps: usize,
    previous: f64,
}

impl StepSearch {
    fn new() -> Self {
        Self {
            pass: 0,
            steps: 1,
            previous: 0.0,
        }
    }

    fn step_size(&self) -> f64 {
        let mut xx = 1.0;
        if self.pass == 1 {
            xx = 0.1;
        }
        if self.pass == 2 {
            xx = 0.01;
        }
        if self.pass == 3 {
            xx = 0.001;
        }
        xx
    }

    /// Record the balance just evaluated. Returns `false` once the last pass
    /// has seen a sign change or the step bound is exhausted.
    fn record(&mut self, balance: f64) -> bool {
        let crossed =
            (balance <= 0.0 && self.previous > 0.0) || (balance >= 0.0 && self.previous < 0.0);

        if !crossed {
            self.previous = balance;
            self.steps += 1;
            if self.steps <= MAX_STEPS {
                return true;
            }
        }

        if self.pass < 3 {
            self.pass += 1;
            self.previous = 0.0;
            return true;
        }
        false
    }
}

struct PointSolver<'a> {
    env: &'a EnvironmentSample,
    body: &'a BodyParameters,
    vpa: f64,
    hc: f64,
    metabolism: Metabolism,
    geometry: Geometry,
}

impl<'a> PointSolver<'a> {
    fn new(env: &'a EnvironmentSample, body: &'a BodyParameters) -> Self {
        let vpa = vapour_pressure(env.air_temp, env.rel_humidity);
        Self {
            env,
            body,
            vpa,
            hc: convection_coefficient(env.wind_speed),
            metabolism: Metabolism::new(body, env.air_temp, vpa),
            geometry: Geometry::new(body),
        }
    }

    /// Try regimes 1..=7 in order and stop at the first accepted one.
    fn regime_search(&self) -> BodyState {
        let ta = self.env.air_temp;
        let tmrt = self.env.mean_radiant_temp;

        let mut core = [0.0; REGIMES + 1];
        let mut iterations = 0;

        let mut j = 0;
        loop {
            j += 1;

            let mut tcl = (ta + tmrt + 34.0) / 3.0;
            let mut search = StepSearch::new();
            let balance = loop {
                let balance = self.body_balance(tcl, j, &mut core);
                iterations += 1;

                let step = search.step_size();
                if balance.enbal > 0.0 {
                    tcl += step;
                }
                if balance.enbal < 0.0 {
                    tcl -= step;
                }
                if !search.record(balance.enbal) {
                    break balance;
                }
            };

            let mut state = BodyState {
                skin_temp: balance.skin_temp,
                clothing_temp: tcl,
                core_temps: core,
                regime: j,
                wetted_skin: balance.wetted_skin,
                sweat_evaporation: balance.sweat_evaporation,
                skin_vapour_pressure: balance.skin_vapour_pressure,
                diffusion: balance.diffusion,
                sweat_rate: balance.sweat_rate,
                blood_flow: balance.blood_flow,
                iterations,
                converged: false,
            };

            if accepts(j, &balance, core[j]) {
                if state.blood_flow > 90.0 {
                    state.blood_flow = 90.0;
                }
                state.converged = true;
                return state;
            }
            if j >= REGIMES {
                return state;
            }
        }
    }

    /// Energy balance of the body for clothing temperature `tcl` under
    /// regime `j`. Updates the core temperature candidates in place; the
    /// quadratic candidates keep their previous value when the discriminant
    /// is negative.
    fn body_balance(&self, tcl: f64, j: usize, core: &mut [f64; REGIMES + 1]) -> Balance {
        let ta = self.env.air_temp;
        let tmrt = self.env.mean_radiant_temp;
        let hc = self.hc;
        let g = &self.geometry;
        let m = &self.metabolism;

        // skin temperature from conduction through the clothing layer
        let rclo2 =
            CLOTHING_EMISSIVITY * STEFAN_BOLTZMANN * radiation_term(tcl, tmrt) * RADIATING_FRACTION;
        let mut tsk = 1.0 / g.htcl * (hc * (tcl - ta) + rclo2) + tcl;

        // long-wave radiation
        let rbare = g.aeff * (1.0 - g.facl) * SKIN_EMISSIVITY * STEFAN_BOLTZMANN
            * radiation_term(tmrt, tsk);
        let rclo = RADIATING_FRACTION * g.acl * CLOTHING_EMISSIVITY * STEFAN_BOLTZMANN
            * radiation_term(tmrt, tcl);
        let rsum = rbare + rclo;

        // convection
        let cbare = hc * (ta - tsk) * g.adu * (1.0 - g.facl);
        let cclo = hc * (ta - tcl) * g.acl;
        let csum = cbare + cclo;

        // core temperature
        let c0 = m.heat + m.respiration;
        let c1 = g.adu * BLOOD_DENSITY * BLOOD_HEAT_CAPACITY;
        let c2 = 18.0 - 0.5 * tsk;
        let c3 = 5.28 * g.adu * c2;
        let c4 = 0.0208 * c1;
        let c5 = 0.76075 * c1;
        let c6 = c3 - c5 - tsk * c4;
        let c7 = -c0 * c2 - tsk * c3 + tsk * c5;
        let c8 = c6 * c6 - 4.0 * c4 * c7;
        let c9 = 5.28 * g.adu - c5 - c4 * tsk;
        let c10 = c9 * c9 - 4.0 * c4 * (c5 * tsk - c0 - 5.28 * g.adu * tsk);

        // 36 °C zeroes the denominator of the regime 3 candidate
        if tsk == 36.0 {
            tsk = 36.01;
        }

        core[7] = c0 / (5.28 * g.adu + c1 * 6.3 / 3600.0) + tsk;
        core[3] = c0 / (5.28 * g.adu + (c1 * 6.3 / 3600.0) / (1.0 + 0.5 * (34.0 - tsk))) + tsk;
        if c10 >= 0.0 {
            core[6] = (-c9 - c10.sqrt()) / (2.0 * c4);
            core[1] = (-c9 + c10.sqrt()) / (2.0 * c4);
        }
        if c8 >= 0.0 {
            core[2] = (-c6 + c8.abs().sqrt()) / (2.0 * c4);
            core[5] = (-c6 - c8.abs().sqrt()) / (2.0 * c4);
        }
        core[4] = c0 / (5.28 * g.adu + c1 / 40.0) + tsk;

        // sweating
        let tbody = 0.1 * tsk + 0.9 * core[j];
        let mut swm = 304.94 * (tbody - SWEAT_ONSET) * g.adu / 3_600_000.0;
        if tbody <= SWEAT_ONSET {
            swm = 0.0;
        }
        let sweat_rate = match self.body.sex() {
            Sex::Male => swm,
            Sex::Female => FEMALE_SWEAT_FACTOR * swm,
        };

        let vpts = body_vapour_pressure(tsk);
        let eswphy = -sweat_rate * LATENT_HEAT;
        let he = 0.633 * hc / (PRESSURE * AIR_HEAT_CAPACITY);
        let fec = 1.0 / (1.0 + 0.92 * hc * g.rcl);
        let eswpot = he * (self.vpa - vpts) * g.adu * LATENT_HEAT * fec;

        let mut wetsk = eswphy / eswpot;
        if wetsk > 1.0 {
            wetsk = 1.0;
        }
        let mut esw = if eswphy - eswpot <= 0.0 { eswpot } else { eswphy };
        if esw > 0.0 {
            esw = 0.0;
        }

        // vapour diffusion through the skin
        let ed = LATENT_HEAT / (SKIN_DIFFUSION_RESISTANCE + CLOTHING_DIFFUSION_RESISTANCE)
            * g.adu
            * (1.0 - wetsk)
            * (self.vpa - vpts);

        // skin blood flow
        let mut vb1 = 34.0 - tsk;
        let mut vb2 = core[j] - SWEAT_ONSET;
        if vb2 < 0.0 {
            vb2 = 0.0;
        }
        if vb1 < 0.0 {
            vb1 = 0.0;
        }
        let blood_flow = (6.3 + 75.0 * vb2) / (1.0 + 0.5 * vb1);

        let enbal = m.heat + ed + m.respiration + esw + csum + rsum + FOOD;

        Balance {
            skin_temp: tsk,
            disc_sweating: c8,
            disc_dilated: c10,
            wetted_skin: wetsk,
            sweat_evaporation: esw,
            skin_vapour_pressure: vpts,
            diffusion: ed,
            sweat_rate,
            blood_flow,
            enbal,
        }
    }

    /// Air temperature of the reference climate giving the same heat budget
    /// as `state`.
    fn equivalent_temperature(&self, state: &BodyState) -> f64 {
        let g = &self.geometry;
        let m = &self.metabolism;
        let hc = convection_coefficient(REFERENCE_WIND);
        let tsk = state.skin_temp;
        let tcl = state.clothing_temp;

        let ed = LATENT_HEAT / (SKIN_DIFFUSION_RESISTANCE + CLOTHING_DIFFUSION_RESISTANCE)
            * g.adu
            * (1.0 - state.wetted_skin)
            * (REFERENCE_VAPOUR_PRESSURE - state.skin_vapour_pressure);

        let mut tx = self.env.air_temp;
        let mut search = StepSearch::new();
        loop {
            let rbare = g.aeff * (1.0 - g.facl) * SKIN_EMISSIVITY * STEFAN_BOLTZMANN
                * radiation_term(tx, tsk);
            let rclo = RADIATING_FRACTION * g.acl * CLOTHING_EMISSIVITY * STEFAN_BOLTZMANN
                * radiation_term(tx, tcl);
            let rsum = rbare + rclo;

            let cbare = hc * (tx - tsk) * g.adu * (1.0 - g.facl);
            let cclo = hc * (tx - tcl) * g.acl;
            let csum = cbare + cclo;

            let (sensible, latent) = respiration(tx, REFERENCE_VAPOUR_PRESSURE, m.rtv);
            let ere = sensible + latent;

            let enbal = m.heat + ed + ere + state.sweat_evaporation + csum + rsum;
            if !enbal.is_finite() {
                return f64::NAN;
            }

            let step = search.step_size();
            if enbal > 0.0 {
                tx -= step;
            }
            if enbal < 0.0 {
                tx += step;
            }
            if !search.record(enbal) {
                return tx;
            }
        }
    }

    fn water_loss(&self, state: &BodyState) -> WaterLoss {
        let mut sweat = state.sweat_rate * 3600.0 * 1000.0;
        if sweat > MAX_SWEAT_LOSS {
            sweat = MAX_SWEAT_LOSS;
        }
        let diffusion = state.diffusion / LATENT_HEAT * 3600.0 * -1000.0;
        let respiration = self.metabolism.latent_respiration / LATENT_HEAT * 3600.0 * -1000.0;

        WaterLoss {
            sweat,
            diffusion,
            respiration,
            total: sweat + diffusion + respiration,
        }
    }
}

/// Acceptance test of regime `j` for the converged balance and its core
/// temperature candidate.
fn accepts(j: usize, balance: &Balance, core: f64) -> bool {
    let tsk = balance.skin_temp;
    let consistent = match j {
        2 | 5 => balance.disc_sweating >= 0.0 && core >= SWEAT_ONSET && tsk <= 34.050,
        1 | 6 => balance.disc_dilated >= 0.0 && core >= SWEAT_ONSET && tsk > 33.850,
        3 => core < SWEAT_ONSET && tsk <= 34.000,
        4 => core < SWEAT_ONSET && tsk > 33.850,
        _ => core < SWEAT_ONSET && tsk > 34.000,
    };
    if !consistent {
        return false;
    }

    let vb = balance.blood_flow;
    !((j != 4 && vb >= 91.0) || (j == 4 && vb < 89.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn standard() -> BodyParameters {
        BodyParameters::default()
    }

    #[test]
    fn test_regression_standard_person() {
        let solution = solve(&EnvironmentSample::new(20.0, 50.0, 20.0, 1.0), &standard());
        assert_abs_diff_eq!(solution.pet, 17.029, epsilon = 0.01);
        assert!(solution.converged);
        assert_eq!(solution.regime, Some(2));
        assert_abs_diff_eq!(solution.skin_temp, 31.653, epsilon = 0.01);
        assert_abs_diff_eq!(solution.core_temp, 36.844, epsilon = 0.01);
        assert_eq!(solution.sweat_rate, 0.0);
    }

    #[test]
    fn test_reference_climate_maps_to_itself() {
        // Tmrt = Ta, 0.1 m/s and 12 hPa is the definition of PET
        let rh = super::super::psychrometrics::relative_humidity(20.0, 12.0);
        let value = pet(20.0, rh, 20.0, 0.1, &standard());
        assert_abs_diff_eq!(value, 20.0, epsilon = 0.01);
    }

    #[test]
    fn test_hot_radiant_sweating_state() {
        let solution = solve(&EnvironmentSample::new(30.0, 40.0, 60.0, 0.5), &standard());
        assert_abs_diff_eq!(solution.pet, 44.717, epsilon = 0.01);
        assert_eq!(solution.regime, Some(1));
        assert!(solution.sweat_rate > 0.0);
        assert!(solution.wetted_skin > 0.0 && solution.wetted_skin <= 1.0);
        assert!(solution.blood_flow <= 90.0);
        assert!(solution.water_loss.sweat > 0.0);
        assert_abs_diff_eq!(
            solution.water_loss.total,
            solution.water_loss.sweat + solution.water_loss.diffusion + solution.water_loss.respiration,
            epsilon = 1e-9
        );
    }

    #[test]
    fn test_cold_vasoconstriction_state() {
        let solution = solve(&EnvironmentSample::new(5.0, 80.0, 0.0, 3.0), &standard());
        assert_abs_diff_eq!(solution.pet, -1.92, epsilon = 0.01);
        assert_eq!(solution.regime, Some(3));
        assert!(solution.core_temp < SWEAT_ONSET);
    }

    #[test]
    fn test_female_sweats_less() {
        let env = EnvironmentSample::new(25.0, 60.0, 45.0, 1.0);
        let female = solve(&env, &standard().with_sex(Sex::Female));
        assert_abs_diff_eq!(female.pet, 31.434, epsilon = 0.01);
        assert!(female.converged);
    }

    #[test]
    fn test_exhausted_search_keeps_last_state() {
        let solution = solve(&EnvironmentSample::new(35.0, 95.0, 40.0, 2.0), &standard());
        assert!(!solution.converged);
        assert_eq!(solution.regime, None);
        assert!(solution.pet.is_finite());
        assert_abs_diff_eq!(solution.pet, 36.769, epsilon = 0.01);
    }

    #[test]
    fn test_clothing_area_factor_clamped() {
        assert_eq!(clothing_area_factor(3.0), 1.0);
        assert_eq!(clothing_area_factor(10.0), 1.0);
        assert_abs_diff_eq!(clothing_area_factor(0.9), 0.8624, epsilon = 1e-4);
        for i in 0..=60 {
            assert!(clothing_area_factor(i as f64 * 0.1) <= 1.0);
        }
    }

    #[test]
    fn test_body_shape_factor_last_match_wins() {
        let h = 1.75;
        assert_eq!(body_shape_factor(2.5, h), 1.0);
        assert_eq!(body_shape_factor(2.0, h), 1.0);
        assert_abs_diff_eq!(body_shape_factor(1.0, h), 1.55 / 1.75, epsilon = 1e-12);
        assert_eq!(body_shape_factor(0.6, h), 0.5);
        assert_eq!(body_shape_factor(0.31, h), 0.5);
        assert_eq!(body_shape_factor(0.3, h), 0.1);
        assert_eq!(body_shape_factor(0.0, h), 0.1);
    }

    #[test]
    fn test_step_search_passes() {
        let mut search = StepSearch::new();
        assert_eq!(search.step_size(), 1.0);

        // sign change ends each pass
        for expected in [0.1, 0.01, 0.001] {
            assert!(search.record(1.0));
            assert!(search.record(-1.0));
            assert_eq!(search.step_size(), expected);
        }
        assert!(search.record(1.0));
        assert!(!search.record(-1.0));
    }

    #[test]
    fn test_step_search_bounded() {
        let mut search = StepSearch::new();
        let mut calls = 1;
        while search.record(1.0) {
            calls += 1;
        }
        // the bound ends pass 0; each later pass then ends after one evaluation
        assert_eq!(calls, MAX_STEPS + 3);
    }

    #[test]
    fn test_nan_environment_propagates() {
        let cases = [
            (f64::NAN, 50.0, 20.0, 1.0),
            (20.0, f64::NAN, 20.0, 1.0),
            (20.0, 50.0, f64::NAN, 1.0),
            (20.0, 50.0, 20.0, f64::NAN),
            (20.0, 50.0, 20.0, f64::INFINITY),
        ];

        for (ta, rh, tmrt, va) in cases {
            let solution = solve(&EnvironmentSample::new(ta, rh, tmrt, va), &standard());
            assert!(
                solution.pet.is_nan(),
                "({ta}, {rh}, {tmrt}, {va}) gave PET {}",
                solution.pet
            );
            assert!(!solution.converged);
            assert_eq!(solution.regime, None);
        }
    }

    #[test]
    fn test_equivalent_temperature_stops_on_non_finite_balance() {
        let env = EnvironmentSample::new(20.0, 50.0, 20.0, 1.0);
        let body = standard();
        let solver = PointSolver::new(&env, &body);
        let mut state = solver.regime_search();
        state.skin_temp = f64::NAN;

        assert!(solver.equivalent_temperature(&state).is_nan());
    }
}
