mod download_handler;
mod file_handler;

pub use download_handler::*;
pub use file_handler::*;
