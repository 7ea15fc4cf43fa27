pub use extension::{is_archive_file, split_extension};
pub use wheel_filename::{WheelFilename, WheelFilenameError};

mod extension;
mod wheel_filename;
