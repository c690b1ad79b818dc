mod error;
mod sqlite;

pub use error::*;
pub use sqlite::*;
