pub mod data;
pub mod io;


pub use data::{Config, EndpointConfig, TypingConfig};
pub use io::ConfigError;
