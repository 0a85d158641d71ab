mod reclamation;

pub use reclamation::{ReclamationReport, ReclamationWorker};
