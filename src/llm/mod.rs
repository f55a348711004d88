pub mod client;
pub mod generator;
pub mod prompts;
pub mod transcriber;
pub mod types;

pub use client::*;
pub use generator::*;
pub use transcriber::*;
pub use types::*;
