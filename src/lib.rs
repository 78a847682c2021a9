pub mod constants;
pub mod edie;
pub mod egtf_errors;
pub mod export;
pub mod grid;
pub mod pipeline;
pub mod smoothing;
pub mod trajectories;
pub mod virtual_trajectory;
