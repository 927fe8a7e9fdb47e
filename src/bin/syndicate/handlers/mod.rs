pub mod dashboard;
pub mod newsletters;
pub mod profile;
pub mod sources;
pub mod subscribers;
