//! # Simulation driver
//!
//! A [`Simulation`] owns the single mutable [`NBodyState`] of one system and turns an
//! array of observation times into a [`LightCurve`]. For every time, in input order:
//!
//! 1. optionally rewind to the epoch ([`SteppingPolicy::ResetToEpoch`]),
//! 2. advance the dynamical state to the observation time,
//! 3. apply the light-time correction,
//! 4. compute the occulted flux and the radial velocity of the designated body,
//! 5. store both at the index of the time.
//!
//! Times need not be sorted: the integrator runs backward when needed. With the
//! default [`SteppingPolicy::Continue`] each sample starts from where the previous
//! one stopped, so sorted input is the cheapest.
//!
//! Numerical controls live in [`SimulationParams`], built with
//! [`SimulationParamsBuilder`] which validates every field.
//!
//! ## Example
//!
//! ```rust
//! use photodyn::photometry::{LimbDarkening, PhotometricBody};
//! use photodyn::simulation::{Simulation, SimulationParams};
//! use photodyn::system::{ElementArrays, SystemConfig};
//!
//! let inc = std::f64::consts::FRAC_PI_2;
//! let config = SystemConfig::from_arrays(&ElementArrays {
//!     masses: &[1.0, 0.001],
//!     semi_major_axes: &[0.0, 1.0],
//!     eccentricities: &[0.0, 0.0],
//!     inclinations: &[0.0, inc],
//!     periapsis_arguments: &[0.0, 0.0],
//!     ascending_node_longitudes: &[0.0, 0.0],
//!     mean_anomalies: &[0.0, 0.0],
//!     epoch: 0.0,
//! })
//! .unwrap();
//!
//! let photometry = [
//!     PhotometricBody::new(1.0, 1.0, LimbDarkening::UNIFORM),
//!     PhotometricBody::new(0.1, 0.0, LimbDarkening::UNIFORM),
//! ];
//! let params = SimulationParams::builder().max_step(0.05).build().unwrap();
//!
//! let mut sim = Simulation::new(config).unwrap();
//! let curve = sim.evaluate(&[0.0, 1.0, 2.0], &photometry, &params).unwrap();
//! assert_eq!(curve.flux.len(), 3);
//! ```

use serde::{Deserialize, Serialize};

use crate::{
    constants::{
        DEFAULT_ERROR_TOLERANCE, DEFAULT_LIGHT_TIME_MAX_ITER, DEFAULT_LIGHT_TIME_TOLERANCE,
        DEFAULT_MAX_STEP, DEFAULT_MAX_STEPS, DEFAULT_QUADRATURE_NODES, MIN_STEP, VLIGHT_AU,
    },
    light_time::{corrected_state, ApparentState, LightTimeParams},
    nbody::{NBodyState, StepControl},
    occultation::occult_n_with_nodes,
    photodyn_errors::{Dataset, PhotodynError},
    photometry::{validate_photometry, PhotometricBody, PhotometryArrays},
    radial_velocity::radial_velocity,
    system::{ElementArrays, SystemConfig},
};

/// How consecutive samples share the integrator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SteppingPolicy {
    /// Integrate from the state left by the previous sample
    #[default]
    Continue,
    /// Restart every sample from the epoch state
    ResetToEpoch,
}

/// Numerical controls of a simulation run.
///
/// Build with [`SimulationParams::builder`] to get validation; `Default` gives the
/// reference settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationParams {
    // Integrator
    pub max_step: f64,
    pub error_tolerance: f64,
    pub min_step: f64,
    pub max_steps: u64,

    // Light time
    pub speed_of_light: f64,
    pub light_time_tolerance: f64,
    pub light_time_max_iterations: usize,

    // Flux
    pub quadrature_nodes: usize,

    // Outputs and scheduling
    pub rv_body: usize,
    pub stepping: SteppingPolicy,
}

impl Default for SimulationParams {
    fn default() -> Self {
        SimulationParams {
            max_step: DEFAULT_MAX_STEP,
            error_tolerance: DEFAULT_ERROR_TOLERANCE,
            min_step: MIN_STEP,
            max_steps: DEFAULT_MAX_STEPS,
            speed_of_light: VLIGHT_AU,
            light_time_tolerance: DEFAULT_LIGHT_TIME_TOLERANCE,
            light_time_max_iterations: DEFAULT_LIGHT_TIME_MAX_ITER,
            quadrature_nodes: DEFAULT_QUADRATURE_NODES,
            rv_body: 0,
            stepping: SteppingPolicy::Continue,
        }
    }
}

impl SimulationParams {
    pub fn builder() -> SimulationParamsBuilder {
        SimulationParamsBuilder::new()
    }

    pub fn step_control(&self) -> StepControl {
        StepControl {
            max_step: self.max_step,
            error_tolerance: self.error_tolerance,
            min_step: self.min_step,
            max_steps: self.max_steps,
        }
    }

    pub fn light_time(&self) -> LightTimeParams {
        LightTimeParams {
            speed_of_light: self.speed_of_light,
            tolerance: self.light_time_tolerance,
            max_iterations: self.light_time_max_iterations,
        }
    }

    /// Check every field, see [`SimulationParamsBuilder::build`].
    pub fn validate(&self) -> Result<(), PhotodynError> {
        self.step_control().validate()?;
        self.light_time().validate()?;
        if self.quadrature_nodes == 0 {
            return Err(PhotodynError::InvalidParameter(
                "quadrature_nodes must be > 0".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`SimulationParams`].
#[derive(Debug, Clone)]
pub struct SimulationParamsBuilder {
    params: SimulationParams,
}

impl Default for SimulationParamsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulationParamsBuilder {
    /// Create a new builder initialized with default values.
    pub fn new() -> Self {
        Self {
            params: SimulationParams::default(),
        }
    }

    // --- Integrator ---
    pub fn max_step(mut self, v: f64) -> Self {
        self.params.max_step = v;
        self
    }
    pub fn error_tolerance(mut self, v: f64) -> Self {
        self.params.error_tolerance = v;
        self
    }
    pub fn min_step(mut self, v: f64) -> Self {
        self.params.min_step = v;
        self
    }
    pub fn max_steps(mut self, v: u64) -> Self {
        self.params.max_steps = v;
        self
    }

    // --- Light time ---
    pub fn speed_of_light(mut self, v: f64) -> Self {
        self.params.speed_of_light = v;
        self
    }
    pub fn light_time_tolerance(mut self, v: f64) -> Self {
        self.params.light_time_tolerance = v;
        self
    }
    pub fn light_time_max_iterations(mut self, v: usize) -> Self {
        self.params.light_time_max_iterations = v;
        self
    }

    // --- Flux ---
    pub fn quadrature_nodes(mut self, v: usize) -> Self {
        self.params.quadrature_nodes = v;
        self
    }

    // --- Outputs and scheduling ---
    pub fn rv_body(mut self, v: usize) -> Self {
        self.params.rv_body = v;
        self
    }
    pub fn stepping(mut self, v: SteppingPolicy) -> Self {
        self.params.stepping = v;
        self
    }

    /// Validate and return the parameters.
    ///
    /// Return
    /// ------
    /// * [`PhotodynError::InvalidParameter`] when a step or tolerance is not finite and
    ///   positive, `min_step > max_step`, the speed of light is not positive, or an
    ///   iteration or node count is zero.
    pub fn build(self) -> Result<SimulationParams, PhotodynError> {
        self.params.validate()?;
        Ok(self.params)
    }
}

/// Model flux and radial velocity, indexed like the input times.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightCurve {
    pub flux: Vec<f64>,
    pub radial_velocity: Vec<f64>,
}

impl LightCurve {
    pub fn len(&self) -> usize {
        self.flux.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flux.is_empty()
    }

    pub(crate) fn with_capacity(n: usize) -> Self {
        LightCurve {
            flux: Vec::with_capacity(n),
            radial_velocity: Vec::with_capacity(n),
        }
    }

    pub(crate) fn extend(&mut self, other: LightCurve) {
        self.flux.extend(other.flux);
        self.radial_velocity.extend(other.radial_velocity);
    }
}

/// Flux at the photometric times and radial velocity at the spectroscopic times.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DatasetModel {
    pub flux: Vec<f64>,
    pub radial_velocity: Vec<f64>,
}

/// One system being propagated through a sequence of observation times.
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SystemConfig,
    epoch_state: NBodyState,
    state: NBodyState,
    last_observation_time: Option<f64>,
}

impl Simulation {
    pub fn new(config: SystemConfig) -> Result<Self, PhotodynError> {
        let epoch_state = NBodyState::from_config(&config)?;
        Ok(Simulation {
            state: epoch_state.clone(),
            epoch_state,
            config,
            last_observation_time: None,
        })
    }

    pub fn from_arrays(arrays: &ElementArrays<'_>) -> Result<Self, PhotodynError> {
        Simulation::new(SystemConfig::from_arrays(arrays)?)
    }

    pub fn config(&self) -> &SystemConfig {
        &self.config
    }

    pub fn state(&self) -> &NBodyState {
        &self.state
    }

    /// Observation time of the last evaluated sample.
    pub fn last_observation_time(&self) -> Option<f64> {
        self.last_observation_time
    }

    /// Move the dynamical clock to `time`.
    pub fn advance_to(&mut self, time: f64, control: &StepControl) -> Result<(), PhotodynError> {
        self.state.advance_to(time, control)
    }

    /// Advance the dynamical clock to `observation_time` and return the light-time
    /// corrected view of the system at that time.
    pub fn apparent_state(
        &mut self,
        observation_time: f64,
        params: &SimulationParams,
    ) -> Result<ApparentState, PhotodynError> {
        params.validate()?;
        self.advance_to(observation_time, &params.step_control())?;
        corrected_state(&self.state, observation_time, &params.light_time())
    }

    /// Restore the epoch state, including the integrator history.
    pub fn reset(&mut self) {
        self.state = self.epoch_state.clone();
        self.last_observation_time = None;
    }

    /// Flux and radial velocity at every time of `times`.
    ///
    /// Arguments
    /// ---------
    /// * `times`: observation times, any order.
    /// * `photometry`: one [`PhotometricBody`] per body.
    /// * `params`: numerical controls and the RV body index.
    ///
    /// Return
    /// ------
    /// * A [`LightCurve`] with `times.len()` entries.
    /// * A configuration error before any integration, or the first sample failure
    ///   wrapped in [`PhotodynError::SampleFailed`].
    pub fn evaluate(
        &mut self,
        times: &[f64],
        photometry: &[PhotometricBody],
        params: &SimulationParams,
    ) -> Result<LightCurve, PhotodynError> {
        self.check_inputs(photometry, params)?;

        let mut curve = LightCurve::with_capacity(times.len());
        for (index, &time) in times.iter().enumerate() {
            let (flux, rv) = self
                .sample(time, photometry, params)
                .map_err(|source| sample_failed(Dataset::Times, index, time, source))?;
            curve.flux.push(flux);
            curve.radial_velocity.push(rv);
        }
        Ok(curve)
    }

    /// Evaluate photometric and spectroscopic time sets in a single pass.
    ///
    /// Both sets are merged and visited in increasing time order; a time present in
    /// both sets is integrated once.
    ///
    /// Return
    /// ------
    /// * A [`DatasetModel`] with `flux_times.len()` fluxes and `rv_times.len()` radial
    ///   velocities, in the order of their respective inputs.
    /// * A failure is reported as [`PhotodynError::SampleFailed`] tagged with the set
    ///   ([`Dataset::Flux`] or [`Dataset::RadialVelocity`]) and the index into it. When a
    ///   time appears in both sets, the first entry in the merged order carries the
    ///   failure, and flux entries come first among equal times.
    pub fn evaluate_datasets(
        &mut self,
        flux_times: &[f64],
        rv_times: &[f64],
        photometry: &[PhotometricBody],
        params: &SimulationParams,
    ) -> Result<DatasetModel, PhotodynError> {
        self.check_inputs(photometry, params)?;

        #[derive(Clone, Copy)]
        enum Target {
            Flux(usize),
            Rv(usize),
        }

        let mut schedule: Vec<(f64, Target)> = flux_times
            .iter()
            .enumerate()
            .map(|(i, &t)| (t, Target::Flux(i)))
            .chain(rv_times.iter().enumerate().map(|(i, &t)| (t, Target::Rv(i))))
            .collect();
        schedule.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut model = DatasetModel {
            flux: vec![0.0; flux_times.len()],
            radial_velocity: vec![0.0; rv_times.len()],
        };
        let mut cached: Option<(f64, f64, f64)> = None;
        for (time, target) in schedule {
            let (flux, rv) = match cached {
                Some((t, flux, rv)) if t == time => (flux, rv),
                _ => {
                    let (dataset, index) = match target {
                        Target::Flux(i) => (Dataset::Flux, i),
                        Target::Rv(i) => (Dataset::RadialVelocity, i),
                    };
                    let (flux, rv) = self
                        .sample(time, photometry, params)
                        .map_err(|source| sample_failed(dataset, index, time, source))?;
                    cached = Some((time, flux, rv));
                    (flux, rv)
                }
            };
            match target {
                Target::Flux(i) => model.flux[i] = flux,
                Target::Rv(i) => model.radial_velocity[i] = rv,
            }
        }
        Ok(model)
    }

    fn check_inputs(
        &self,
        photometry: &[PhotometricBody],
        params: &SimulationParams,
    ) -> Result<(), PhotodynError> {
        params.validate()?;
        validate_photometry(photometry, self.state.n_bodies())?;
        if params.rv_body >= self.state.n_bodies() {
            return Err(PhotodynError::BodyIndexOutOfRange {
                index: params.rv_body,
                n_bodies: self.state.n_bodies(),
            });
        }
        Ok(())
    }

    /// Flux and radial velocity at one observation time.
    fn sample(
        &mut self,
        time: f64,
        photometry: &[PhotometricBody],
        params: &SimulationParams,
    ) -> Result<(f64, f64), PhotodynError> {
        if params.stepping == SteppingPolicy::ResetToEpoch {
            self.reset();
        }
        let apparent = self.apparent_state(time, params)?;
        let flux = occult_n_with_nodes(&apparent.positions, photometry, params.quadrature_nodes)?;
        let rv = radial_velocity(&apparent, params.rv_body)?;
        self.last_observation_time = Some(time);
        Ok((flux, rv))
    }
}

fn sample_failed(
    dataset: Dataset,
    index: usize,
    observation_time: f64,
    source: PhotodynError,
) -> PhotodynError {
    PhotodynError::SampleFailed {
        dataset,
        index,
        observation_time,
        source: Box::new(source),
    }
}

/// One-call evaluation from flat arrays.
///
/// Arguments
/// ---------
/// * `elements`: masses and elements, see [`ElementArrays`].
/// * `photometry`: radii, fluxes and limb-darkening coefficients.
/// * `times`: observation times.
/// * `max_step`, `error_tolerance`: integrator controls.
/// * `rv_body`: index of the body whose radial velocity is reported.
///
/// Return
/// ------
/// * The [`LightCurve`], all other settings at their defaults.
pub fn light_curve(
    elements: &ElementArrays<'_>,
    photometry: &PhotometryArrays<'_>,
    times: &[f64],
    max_step: f64,
    error_tolerance: f64,
    rv_body: usize,
) -> Result<LightCurve, PhotodynError> {
    let params = SimulationParams::builder()
        .max_step(max_step)
        .error_tolerance(error_tolerance)
        .rv_body(rv_body)
        .build()?;
    let bodies = photometry.to_bodies()?;
    Simulation::from_arrays(elements)?.evaluate(times, &bodies, &params)
}
