#![forbid(unsafe_code)]
//! twbgraph-core library.
//!
//! Decodes Tableau workbooks (`.twb` / `.twbx`) and extracts the metadata
//! model that the lineage graph is built from.
//!
//! ```text
//! bytes ──load::decode_workbook──▶ Document ──parser::parse_workbook──▶ WorkbookMetadata
//!                                                   │
//!                                      refs::extract_references (per calculation)
//! ```
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums in [`error`]; `anyhow::Result` for
//!   config loading and binaries.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `error!`, `debug!`, `trace!`).
//! - **Data quality**: non-fatal problems go through [`diagnostics::Diagnostics`].

pub mod config;
pub mod diagnostics;
pub mod document;
pub mod error;
pub mod load;
pub mod model;
pub mod parser;
pub mod refs;
pub mod timing;

pub use config::TwbgraphConfig;
pub use diagnostics::{Diagnostics, Warning, WarningKind};
pub use error::{ErrorCode, FormatError, InputError, LoadError};
pub use model::WorkbookMetadata;
pub use parser::parse_workbook;
pub use refs::extract_references;
