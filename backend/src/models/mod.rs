pub mod candidate;
pub mod sky;
pub mod time;

pub use candidate::*;
pub use sky::*;
pub use time::*;
