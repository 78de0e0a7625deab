pub mod phase;

pub use phase::{linear_fit, remove_time_shift, unwrap_phase};
