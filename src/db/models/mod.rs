pub mod summary;
pub mod trip;

pub use summary::MileageSummary;
pub use trip::{Trip, TripCategory};
