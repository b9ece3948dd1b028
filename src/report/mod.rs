//! Report rendering and persistence.

pub mod generator;
pub mod writer;

pub use generator::{generate_json_report, generate_text_report};
pub use writer::{ReportWriter, WrittenReport};
