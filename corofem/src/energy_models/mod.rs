pub mod corotated;
pub mod gravity;

pub use corotated::*;
pub use gravity::*;
