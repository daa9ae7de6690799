//! LED preview pipeline: color fragment reassembly and update-rate tracking.

mod fragments;
mod frequency;

pub use fragments::{ColorReassembler, MAX_BUFFER_BYTES};
pub use frequency::{FrequencyEstimator, FrequencyMonitor};
