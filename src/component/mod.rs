//! Components: synthesis, rendering and health
//!
//! A component is one horizontally scalable unit of a Cluster. Synthesis
//! resolves its spec against the definitions, the [`Renderer`] turns it into
//! objects, and the phase machine classifies its health from observations.

pub mod phase;
pub mod pod;
pub mod render;
pub mod synthesize;
pub mod workload;

pub use phase::{evaluate_phase, next_phase, PhaseDecision, PhaseInputs, PhaseTimeouts};
pub use render::{DefaultRenderer, Renderer};
pub use synthesize::{synthesize_components, SynthesizedComponent};
pub use workload::{Observation, WorkloadHandler};
