//! Parameter variation model
//!
//! Each tick a reading moves by two deltas:
//! - `pattern`: deterministic reversion toward a target curve. The target is the
//!   buoy's anchor value plus a daily sinusoid (hour-of-day) and, for oxygen and
//!   temperature, a seasonal sinusoid (day-of-year), both scaled by variability.
//! - `noise`: uniform noise scaled by variability. Hyacinth coverage grows
//!   asymmetrically and occasionally jumps in a sudden step.
//!
//! The sum is clamped to the parameter's physical range.

use std::collections::{BTreeMap, HashMap};

use limnos_core::{daily_phase, seasonal_phase, BuoyId, InputError, Parameter, Readings, Timestamp};

use crate::NoiseSource;

/// Asymmetric growth behaviour (hyacinth-style coverage)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GrowthProfile {
    /// Multiplier on positive noise samples
    pub upward_scale: f64,
    /// Multiplier on negative noise samples
    pub downward_scale: f64,
    /// Per-tick probability of a sudden increase, before variability scaling
    pub step_probability: f64,
    /// Smallest sudden increase
    pub step_min: f64,
    /// Largest sudden increase
    pub step_max: f64,
}

/// Variation profile for one parameter
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ParameterProfile {
    /// Anchor used when a buoy has none registered
    pub baseline: f64,
    /// Fraction of the gap to the target closed each tick
    pub reversion: f64,
    pub daily_amplitude: f64,
    pub daily_peak_hour: f64,
    pub seasonal_amplitude: f64,
    pub seasonal_peak_day: f64,
    /// Noise magnitude per tick at variability 1.0
    pub noise_amplitude: f64,
    pub growth: Option<GrowthProfile>,
}

impl ParameterProfile {
    /// Built-in profile for a parameter
    pub fn default_for(parameter: Parameter) -> Self {
        let flat = ParameterProfile {
            baseline: 0.0,
            reversion: 0.05,
            daily_amplitude: 0.0,
            daily_peak_hour: 12.0,
            seasonal_amplitude: 0.0,
            seasonal_peak_day: 1.0,
            noise_amplitude: 0.0,
            growth: None,
        };

        match parameter {
            // Photosynthesis drives a midday peak; cold water holds more oxygen
            Parameter::DissolvedOxygen => ParameterProfile {
                baseline: 8.0,
                daily_amplitude: 1.5,
                daily_peak_hour: 13.0,
                seasonal_amplitude: 1.0,
                seasonal_peak_day: 15.0,
                noise_amplitude: 0.15,
                ..flat
            },
            Parameter::Temperature => ParameterProfile {
                baseline: 22.0,
                daily_amplitude: 2.0,
                daily_peak_hour: 15.0,
                seasonal_amplitude: 4.0,
                seasonal_peak_day: 196.0,
                noise_amplitude: 0.1,
                ..flat
            },
            // CO2 uptake raises pH through the day
            Parameter::Ph => ParameterProfile {
                baseline: 7.4,
                daily_amplitude: 0.3,
                daily_peak_hour: 14.0,
                noise_amplitude: 0.03,
                ..flat
            },
            Parameter::Turbidity => ParameterProfile {
                baseline: 12.0,
                noise_amplitude: 1.0,
                ..flat
            },
            Parameter::Phosphates => ParameterProfile {
                baseline: 0.12,
                noise_amplitude: 0.01,
                ..flat
            },
            Parameter::HyacinthCoverage => ParameterProfile {
                baseline: 8.0,
                reversion: 0.01,
                noise_amplitude: 0.4,
                growth: Some(GrowthProfile {
                    upward_scale: 1.0,
                    downward_scale: 0.35,
                    step_probability: 0.02,
                    step_min: 2.0,
                    step_max: 6.0,
                }),
                ..flat
            },
        }
    }
}

/// Deterministic phase shift per buoy so a fleet does not move in lockstep (hours)
#[inline]
fn buoy_phase_shift(buoy: BuoyId) -> f64 {
    (buoy.0 % 5) as f64 * 0.2 - 0.4
}

/// Advances parameter readings one tick at a time
#[derive(Clone, Debug)]
pub struct VariationModel {
    profiles: BTreeMap<Parameter, ParameterProfile>,
    variability: f64,
    /// Per-buoy reversion anchors
    anchors: HashMap<BuoyId, Readings>,
}

impl VariationModel {
    /// Create a model with the built-in profiles; variability is clamped to [0, 1]
    pub fn new(variability: f64) -> Self {
        VariationModel {
            profiles: Parameter::ALL
                .iter()
                .map(|p| (*p, ParameterProfile::default_for(*p)))
                .collect(),
            variability: if variability.is_nan() { 0.0 } else { variability.clamp(0.0, 1.0) },
            anchors: HashMap::new(),
        }
    }

    /// Override the profile of one parameter
    pub fn with_profile(mut self, parameter: Parameter, profile: ParameterProfile) -> Self {
        self.profiles.insert(parameter, profile);
        self
    }

    pub fn variability(&self) -> f64 {
        self.variability
    }

    /// Change variability in place, keeping anchors; clamped like `new`
    pub fn set_variability(&mut self, variability: f64) {
        self.variability = if variability.is_nan() { 0.0 } else { variability.clamp(0.0, 1.0) };
    }

    pub fn profile(&self, parameter: Parameter) -> &ParameterProfile {
        // Every parameter is populated in `new`
        &self.profiles[&parameter]
    }

    /// Register the values a buoy reverts toward. Non-finite values are ignored.
    pub fn anchor(&mut self, buoy: BuoyId, readings: &Readings) {
        let anchors: Readings = readings
            .iter()
            .filter(|(_, v)| v.is_finite())
            .map(|(p, v)| (*p, *v))
            .collect();
        self.anchors.insert(buoy, anchors);
    }

    pub fn forget(&mut self, buoy: BuoyId) {
        self.anchors.remove(&buoy);
    }

    fn anchor_value(&self, parameter: Parameter, buoy: BuoyId) -> f64 {
        self.anchors
            .get(&buoy)
            .and_then(|a| a.get(&parameter))
            .copied()
            .unwrap_or_else(|| self.profile(parameter).baseline)
    }

    /// Target value of the daily/seasonal curve at `now`
    pub fn target(&self, parameter: Parameter, buoy: BuoyId, now: Timestamp) -> f64 {
        let profile = self.profile(parameter);
        let peak = profile.daily_peak_hour + buoy_phase_shift(buoy);
        let daily = profile.daily_amplitude * daily_phase(now, peak).sin();
        let seasonal = profile.seasonal_amplitude * seasonal_phase(now, profile.seasonal_peak_day).sin();
        self.anchor_value(parameter, buoy) + self.variability * (daily + seasonal)
    }

    /// Deterministic component of the next delta
    pub fn pattern(&self, parameter: Parameter, current: f64, buoy: BuoyId, now: Timestamp) -> f64 {
        let profile = self.profile(parameter);
        profile.reversion * (self.target(parameter, buoy, now) - current)
    }

    /// Random component of the next delta
    pub fn noise(&self, parameter: Parameter, noise: &mut dyn NoiseSource) -> f64 {
        let profile = self.profile(parameter);
        let sample = noise.symmetric();
        let scaled = sample * profile.noise_amplitude * self.variability;

        match profile.growth {
            None => scaled,
            Some(growth) => {
                let mut delta = if sample >= 0.0 {
                    scaled * growth.upward_scale
                } else {
                    scaled * growth.downward_scale
                };
                if noise.chance(growth.step_probability * self.variability) {
                    let t = (noise.symmetric() + 1.0) / 2.0;
                    delta += growth.step_min + t * (growth.step_max - growth.step_min);
                }
                delta
            }
        }
    }

    /// Next reading for `parameter`, clamped to its physical range
    pub fn next(
        &self,
        parameter: Parameter,
        current: f64,
        buoy: BuoyId,
        now: Timestamp,
        noise: &mut dyn NoiseSource,
    ) -> Result<f64, InputError> {
        let current = parameter.check(current)?;
        let delta = self.pattern(parameter, current, buoy, now) + self.noise(parameter, noise);
        Ok(parameter.clamp(current + delta))
    }
}
