mod file;
mod status;

pub(crate) use self::file::{FileRow, SiblingRow};
pub use self::file::{FileRecord, NewRecord, Sibling};
pub use self::status::Status;
