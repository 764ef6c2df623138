pub mod configuration;
pub mod graph;
pub mod prompts;
pub mod state;
pub mod utils;
