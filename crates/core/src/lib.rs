pub mod access;
pub mod recurrence;
pub mod scheduler;
pub mod types;
