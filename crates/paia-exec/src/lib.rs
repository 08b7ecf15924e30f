pub mod api;
pub mod contracts;
pub mod driver;
pub mod hybrid;
pub mod prompt;
pub mod runner;
pub mod subprocess;

pub use api::*;
pub use contracts::*;
pub use driver::*;
pub use hybrid::*;
pub use runner::*;
pub use subprocess::*;
