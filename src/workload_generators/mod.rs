pub mod events;
pub mod generator;
pub mod native;
pub mod random;
pub mod workload_type;
