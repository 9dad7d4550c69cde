pub mod file;
pub mod units;

pub use file::*;
pub use units::*;
