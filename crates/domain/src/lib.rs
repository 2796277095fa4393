pub mod capability;
pub mod config;
pub mod error;
pub mod stream;
pub mod tool;
pub mod trace;

pub use capability::*;
pub use config::Config;
pub use error::{Error, Result};
pub use stream::*;
pub use tool::*;
pub use trace::*;
