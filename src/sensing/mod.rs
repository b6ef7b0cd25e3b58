pub mod controller;
pub mod simulation;
pub mod sink;

pub use controller::SensingController;
pub use simulation::{SimulatedRoute, SimulationPlan};
pub use sink::SensorSink;
