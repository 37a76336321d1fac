use thiserror::Error;

use std::fmt;

use crate::nbody::StateSnapshot;

/// Time set a failing sample index refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dataset {
    /// The single time array of an evaluation
    Times,
    /// Photometric times of a dataset evaluation
    Flux,
    /// Spectroscopic times of a dataset evaluation
    RadialVelocity,
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Times => write!(f, "observation times"),
            Dataset::Flux => write!(f, "flux times"),
            Dataset::RadialVelocity => write!(f, "radial-velocity times"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhotodynError {
    #[error("At least two bodies are required, got {0}")]
    TooFewBodies(usize),

    #[error("Length mismatch for `{name}`: expected {expected}, got {got}")]
    LengthMismatch {
        name: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("Invalid mass for body {body}: {mass}")]
    InvalidMass { body: usize, mass: f64 },

    #[error("Invalid orbital elements for body {body}: {reason}")]
    InvalidElements { body: usize, reason: String },

    #[error("Invalid simulation parameter: {0}")]
    InvalidParameter(String),

    #[error("Body index {index} out of range for a system of {n_bodies} bodies")]
    BodyIndexOutOfRange { index: usize, n_bodies: usize },

    #[error("Kepler equation did not converge (M = {mean_anomaly}, e = {eccentricity})")]
    KeplerNotConverged {
        mean_anomaly: f64,
        eccentricity: f64,
    },

    #[error(
        "Step size underflow at t = {time}: step {step:e} is below the minimum {min_step:e} or the time resolution"
    )]
    StepSizeUnderflow {
        time: f64,
        step: f64,
        min_step: f64,
        last_valid: Box<StateSnapshot>,
    },

    #[error("Integration exceeded {max_steps} steps before reaching t = {target} (stopped at t = {time})")]
    MaxStepsExceeded {
        time: f64,
        target: f64,
        max_steps: u64,
        last_valid: Box<StateSnapshot>,
    },

    #[error(
        "Light-time iteration for body {body} did not converge at t_obs = {observation_time} after {iterations} iterations (residual {residual:e})"
    )]
    LightTimeNotConverged {
        body: usize,
        observation_time: f64,
        iterations: usize,
        residual: f64,
    },

    #[error(
        "State at t = {state_time} is too far from t_obs = {observation_time} for the light-time expansion (allowed offset {max_offset:e})"
    )]
    StaleState {
        state_time: f64,
        observation_time: f64,
        max_offset: f64,
    },

    #[error("Evaluation of sample {index} of the {dataset} (t = {observation_time}) failed: {source}")]
    SampleFailed {
        dataset: Dataset,
        index: usize,
        observation_time: f64,
        source: Box<PhotodynError>,
    },

    #[error("Unable to build the worker thread pool: {0}")]
    ThreadPool(String),
}

impl PhotodynError {
    /// `true` for integration and light-time failures, including those wrapped in
    /// [`PhotodynError::SampleFailed`].
    pub fn is_numerical_failure(&self) -> bool {
        use PhotodynError::*;
        match self {
            KeplerNotConverged { .. }
            | StepSizeUnderflow { .. }
            | MaxStepsExceeded { .. }
            | LightTimeNotConverged { .. } => true,
            SampleFailed { source, .. } => source.is_numerical_failure(),
            _ => false,
        }
    }

    /// The innermost error, unwrapping any [`PhotodynError::SampleFailed`] layers.
    pub fn root_cause(&self) -> &PhotodynError {
        match self {
            PhotodynError::SampleFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

impl From<rayon::ThreadPoolBuildError> for PhotodynError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        PhotodynError::ThreadPool(err.to_string())
    }
}
