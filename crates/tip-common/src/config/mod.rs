mod application;
mod loader;

pub use application::*;
pub use loader::parse_byte_size;
