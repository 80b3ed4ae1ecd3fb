pub mod builder;

pub use builder::{ArchiveBuilder, ARCHIVE_FILE_NAME};
