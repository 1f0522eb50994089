pub mod connection;
pub mod error;
pub mod query;
pub mod schema;
pub mod session;

pub use connection::*;
pub use error::*;
pub use query::*;
pub use schema::*;
pub use session::*;
