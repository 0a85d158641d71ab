pub mod access_policy;
mod download_service;
mod file_service;
mod slug;

pub use download_service::{AuthorizedDownload, Delivery, DownloadRequest, DownloadService};
pub use file_service::{FileService, FileServiceSettings, PurgeOutcome, UploadRequest};
