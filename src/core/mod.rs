pub mod error;
pub mod types;

pub use error::{ClientError, Result};
pub use types::{ReadConcern, ReadPreference, TransactionOptions, WriteConcern};
