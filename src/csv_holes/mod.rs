//! Blast-hole CSV family: a fixed canonical schema (spec.md §4.6.4) and a
//! caller-configured custom column mapping (spec.md §4.6.5).

pub mod custom;
pub mod fixed;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CsvHoleError {
    #[error("CSV column count {0} is not one of the supported schemas")]
    UnsupportedColumnCount(usize),
}
