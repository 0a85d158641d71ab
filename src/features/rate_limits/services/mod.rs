mod admission_controller;

pub use admission_controller::AdmissionController;
