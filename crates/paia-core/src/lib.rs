pub mod config;
pub mod error;
pub mod persistence;
pub mod run;
pub mod session;

pub use config::*;
pub use error::*;
pub use persistence::*;
pub use run::*;
pub use session::*;
