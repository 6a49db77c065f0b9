pub mod reading;
pub mod source;

pub use reading::{parse_timestamp, FieldValue, Reading, TIMESTAMP_COLUMN};
pub use source::{RowStore, SourceError};
