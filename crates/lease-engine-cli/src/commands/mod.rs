pub mod lifecycle;
pub mod schedule;
