pub mod job;
pub mod order;
