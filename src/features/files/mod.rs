pub mod dtos;
pub mod handlers;
pub mod models;
pub mod registry;
pub mod routes;
pub mod services;
pub mod workers;

pub use registry::{FileRegistry, PgFileRegistry};
pub use services::{DownloadService, FileService, FileServiceSettings};
pub use workers::ReclamationWorker;
