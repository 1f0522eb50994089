mod executor;
mod repair;
mod script;
mod types;

pub use executor::*;
pub use types::*;
