mod file;

pub use file::{DownloadEvent, File, NewDownloadEvent, NewFile, OwnerStats};
