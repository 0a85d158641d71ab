//! Infrastructure components for external integrations

pub mod storage;
