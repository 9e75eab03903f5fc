pub mod preprocessing;
pub mod extraction;
pub mod alignment;
pub mod profile;
pub mod statistics;

pub use preprocessing::*;
pub use extraction::*;
pub use alignment::*;
pub use profile::*;
pub use statistics::*;
