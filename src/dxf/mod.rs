//! DXF family: a shared group-code codec and entity-building state machine,
//! specialized by the binary (§4.6.1/§4.7.1) and ASCII (§4.6.2/§4.7.2)
//! front ends.

pub mod ascii;
pub mod binary;
pub mod entities;
pub mod group_code;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DxfError {
    #[error("binary DXF sentinel mismatch")]
    BadSentinel,
    #[error("binary DXF record truncated at offset {offset}")]
    TruncatedRecord { offset: usize },
    #[error("ASCII DXF record stream ended mid-pair")]
    UnpairedRecord,
    #[error("group code {0} is not a valid integer")]
    BadGroupCode(String),
}

pub use entities::{DxfBuildOptions, DxfBuildOutput};
pub use group_code::{Record, Value};
