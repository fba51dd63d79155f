pub mod logging;
pub mod suggest;

pub use logging::{init_logging, init_test_logging};
pub use suggest::find_best_match;
