pub mod engine;
pub mod process_engine;

pub use engine::ComputeEngine;
pub use process_engine::ProcessEngine;
