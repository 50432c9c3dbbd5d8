pub mod args;
pub mod config;
pub mod error;
pub mod launch;
pub mod path;
pub mod relay;
pub mod signals;
pub mod sink;
pub mod styling;
pub mod supervisor;

pub use error::StreamtapError;
