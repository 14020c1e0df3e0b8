pub mod conjgrad;
pub mod faer_ndarray;

pub use conjgrad::conjgrad;
pub use faer_ndarray::{batch_solve_spd, fast_ab, fast_abt, gram, LinalgError};
