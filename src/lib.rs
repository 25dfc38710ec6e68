pub mod accumulator;
pub mod constants;
pub mod effects;
pub mod engine;
pub mod error;
pub mod guard;
pub mod history;
pub mod host;
pub mod jumps;
pub mod scheduler;
pub mod settings;
pub mod sim;
pub mod spawn_search;
pub mod types;
pub mod vitals;

pub use engine::RunContext;
