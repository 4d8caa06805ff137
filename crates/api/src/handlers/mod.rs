pub mod gpu;
pub mod jobs;
