pub mod batch;
pub mod reaper;
