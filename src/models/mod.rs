pub mod api;
pub mod item;
pub mod job;
pub mod result;
