pub mod trips;
