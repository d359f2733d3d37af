//! Crate-wide error taxonomy.
//!
//! Recoverable categories (bad rows, name collisions, missing assets, version
//! drift) never surface as `Err` — they accumulate into `ParseResult::warnings`
//! instead (see `crate::ParseResult`). Only the fatal categories listed in
//! `GeoIoError` are returned from a parser's top-level entry point.

use thiserror::Error;

use crate::dxf::DxfError;

/// Top-level error type returned by fatal parse/write failures.
#[derive(Debug, Error)]
pub enum GeoIoError {
    #[error("could not classify input format")]
    UnknownFormat,
    #[error("binary DXF sentinel mismatch")]
    BadSentinel,
    #[error("binary DXF record truncated at offset {offset}")]
    TruncatedRecord { offset: usize },
    #[error("schema mismatch: {0}")]
    SchemaMismatch(String),
    #[error("hole has no usable geometry combination")]
    MissingGeometry,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Dxf(#[from] DxfError),
    #[error(transparent)]
    Kap(#[from] crate::kap::KapError),
    #[error(transparent)]
    Spf(#[from] crate::spf::SpfError),
    #[error(transparent)]
    Surpac(#[from] crate::surpac::SurpacError),
    #[error(transparent)]
    CsvHole(#[from] crate::csv_holes::CsvHoleError),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GeoIoError>;
