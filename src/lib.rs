pub mod batch;
pub mod constants;
pub mod kepler;
pub mod light_time;
pub mod likelihood;
pub mod nbody;
pub mod occultation;
pub mod orbit_type;
pub mod photodyn_errors;
pub mod photometry;
pub mod radial_velocity;
pub mod simulation;
pub mod system;

pub use batch::{evaluate_many, evaluate_time_chunks, ModelParameters};
pub use light_time::{corrected_state, ApparentState, LightTimeParams};
pub use nbody::{NBodyState, StateSnapshot, StepControl};
pub use occultation::{occult_n, overlap_case, OverlapCase};
pub use orbit_type::keplerian_element::KeplerianElements;
pub use photodyn_errors::{Dataset, PhotodynError};
pub use photometry::{LimbDarkening, PhotometricBody, PhotometryArrays};
pub use radial_velocity::radial_velocity;
pub use simulation::{
    light_curve, DatasetModel, LightCurve, Simulation, SimulationParams, SimulationParamsBuilder,
    SteppingPolicy,
};
pub use system::{ElementArrays, SystemConfig};
