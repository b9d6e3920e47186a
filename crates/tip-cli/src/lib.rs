pub mod pipeline;
mod runner;

pub use runner::main;
