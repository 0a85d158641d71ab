//! Per-client admission control in front of every HTTP entry point

pub mod services;

pub use services::AdmissionController;
