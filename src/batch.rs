//! # Parallel batch evaluation
//!
//! A single simulation is strictly sequential: its integrator state depends on every
//! previous sample. Parallelism therefore comes from independent work units, each
//! with its own [`Simulation`], executed on a dedicated `rayon` pool whose size is an
//! explicit argument.
//!
//! * [`evaluate_time_chunks`] splits one time array into `workers` contiguous chunks.
//!   Each chunk is evaluated by a fresh simulation started from the epoch, and the
//!   results are concatenated back in input order.
//! * [`evaluate_many`] evaluates several independent parameter sets over the same
//!   times, e.g. the walkers of an ensemble sampler.
//!
//! With the `progress` feature, [`evaluate_many`] renders an `indicatif` progress bar.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    photodyn_errors::PhotodynError,
    photometry::PhotometricBody,
    simulation::{LightCurve, Simulation, SimulationParams},
    system::SystemConfig,
};

#[cfg(feature = "progress")]
use indicatif::{ProgressBar, ProgressStyle};

/// Everything that defines one model: dynamics and photometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    pub system: SystemConfig,
    pub photometry: Vec<PhotometricBody>,
}

impl ModelParameters {
    pub fn new(system: SystemConfig, photometry: Vec<PhotometricBody>) -> Self {
        ModelParameters { system, photometry }
    }

    /// Evaluate the model sequentially over `times`.
    pub fn evaluate(&self, times: &[f64], params: &SimulationParams) -> Result<LightCurve, PhotodynError> {
        Simulation::new(self.system.clone())?.evaluate(times, &self.photometry, params)
    }
}

fn thread_pool(workers: usize) -> Result<rayon::ThreadPool, PhotodynError> {
    if workers == 0 {
        return Err(PhotodynError::InvalidParameter(
            "the number of workers must be > 0".into(),
        ));
    }
    Ok(rayon::ThreadPoolBuilder::new().num_threads(workers).build()?)
}

/// Bounds of `parts` contiguous chunks of `len` items; the first `len % parts` chunks
/// hold one extra item.
fn chunk_bounds(len: usize, parts: usize) -> Vec<(usize, usize)> {
    let base = len / parts;
    let extra = len % parts;
    let mut start = 0;
    (0..parts)
        .map(|i| {
            let size = base + usize::from(i < extra);
            let bounds = (start, start + size);
            start += size;
            bounds
        })
        .filter(|(lo, hi)| hi > lo)
        .collect()
}

/// Evaluate one model over `times` with `workers` independent chunks.
///
/// Arguments
/// ---------
/// * `model`: system and photometry.
/// * `times`: observation times.
/// * `params`: numerical controls shared by every chunk.
/// * `workers`: number of chunks and threads (> 0).
///
/// Return
/// ------
/// * The concatenated [`LightCurve`]. A failing sample is reported through
///   [`PhotodynError::SampleFailed`] with its index in `times`.
pub fn evaluate_time_chunks(
    model: &ModelParameters,
    times: &[f64],
    params: &SimulationParams,
    workers: usize,
) -> Result<LightCurve, PhotodynError> {
    let pool = thread_pool(workers)?;
    let chunks = chunk_bounds(times.len(), workers);

    let parts: Vec<LightCurve> = pool.install(|| {
        chunks
            .par_iter()
            .map(|&(lo, hi)| {
                model
                    .evaluate(&times[lo..hi], params)
                    .map_err(|err| offset_sample_index(err, lo))
            })
            .collect::<Result<Vec<_>, _>>()
    })?;

    let mut curve = LightCurve::with_capacity(times.len());
    for part in parts {
        curve.extend(part);
    }
    Ok(curve)
}

fn offset_sample_index(err: PhotodynError, offset: usize) -> PhotodynError {
    match err {
        PhotodynError::SampleFailed {
            dataset,
            index,
            observation_time,
            source,
        } => PhotodynError::SampleFailed {
            dataset,
            index: index + offset,
            observation_time,
            source,
        },
        other => other,
    }
}

/// Evaluate independent models over the same times in parallel.
///
/// Return
/// ------
/// * One result per model, in the order of `models`. The outer error only reports a
///   failure to set up the thread pool.
pub fn evaluate_many(
    models: &[ModelParameters],
    times: &[f64],
    params: &SimulationParams,
    workers: usize,
) -> Result<Vec<Result<LightCurve, PhotodynError>>, PhotodynError> {
    let pool = thread_pool(workers)?;

    #[cfg(feature = "progress")]
    let pb = {
        let pb = ProgressBar::new(models.len() as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{bar:40.cyan/blue} {pos}/{len} ({percent:>3}%) | {per_sec} | ETA {eta_precise}",
        ) {
            pb.set_style(style);
        }
        pb
    };

    let results = pool.install(|| {
        models
            .par_iter()
            .map(|model| {
                let res = model.evaluate(times, params);
                #[cfg(feature = "progress")]
                pb.inc(1);
                res
            })
            .collect()
    });

    #[cfg(feature = "progress")]
    pb.finish_and_clear();

    Ok(results)
}
