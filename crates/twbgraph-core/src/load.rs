//! Turning raw file bytes into a parsed workbook [`Document`].
//!
//! # Pipeline
//!
//! ```text
//! bytes + file name
//!    ↓  extension check        (.twb / .twbx, else InputError)
//!    ↓  empty check            (InputError)
//!    ↓  size policy            (> max: ResourceLimit, > warn: LargeInput warning)
//!    ↓  .twbx: unzip first .twb member at any path
//!    ↓  UTF-8 decode (BOM tolerated)
//!    ↓  document::parse + <workbook> root check
//! LoadedDocument
//! ```
//!
//! Everything here runs before the parser sees the document, so a failure
//! never leaves partial metadata behind.

use std::io::{Cursor, Read};

use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::LimitsConfig;
use crate::diagnostics::{Diagnostics, WarningKind};
use crate::document::{self, Document};
use crate::error::{FormatError, InputError, LoadError};

/// The two supported container formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkbookFormat {
    /// Plain workbook markup.
    Twb,
    /// Packaged workbook (ZIP archive with one `.twb` member).
    Twbx,
}

impl WorkbookFormat {
    /// Detect the format from a file name's extension (case-insensitive).
    #[must_use]
    pub fn from_file_name(file_name: &str) -> Option<Self> {
        let lower = file_name.to_ascii_lowercase();
        if lower.ends_with(".twbx") {
            Some(Self::Twbx)
        } else if lower.ends_with(".twb") {
            Some(Self::Twb)
        } else {
            None
        }
    }
}

/// Where a loaded document came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SourceInfo {
    pub file_name: String,
    pub format: WorkbookFormat,
    pub byte_len: u64,
    /// Path of the `.twb` member inside a `.twbx`.
    pub archive_member: Option<String>,
    /// True when the input exceeded the soft size threshold.
    pub oversized: bool,
}

/// A decoded document plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub document: Document,
    pub source: SourceInfo,
}

/// Decode workbook bytes.
///
/// # Errors
///
/// - [`InputError`] for an unsupported extension, an empty buffer, or an
///   archive without entries.
/// - [`LoadError::ResourceLimit`] when the buffer (or the extracted member)
///   exceeds `limits.max_file_bytes`.
/// - [`FormatError`] when the archive is unreadable, has no `.twb` member,
///   the markup is not UTF-8 or not well-formed, or the root is not
///   `<workbook>`.
#[instrument(skip(bytes, limits, diagnostics), fields(len = bytes.len()))]
pub fn decode_workbook(
    bytes: &[u8],
    file_name: &str,
    limits: &LimitsConfig,
    diagnostics: &mut Diagnostics,
) -> Result<LoadedDocument, LoadError> {
    let format = WorkbookFormat::from_file_name(file_name)
        .ok_or_else(|| InputError::UnsupportedExtension(file_name.to_string()))?;

    if bytes.is_empty() {
        return Err(InputError::Empty(file_name.to_string()).into());
    }

    let byte_len = u64::try_from(bytes.len()).unwrap_or(u64::MAX);
    check_size(byte_len, limits)?;

    let oversized = byte_len > limits.warn_file_bytes;
    if oversized {
        diagnostics.warn(
            WarningKind::LargeInput,
            format!(
                "{file_name} is {byte_len} bytes (warning threshold {}); processing anyway",
                limits.warn_file_bytes
            ),
        );
    }

    let (markup, archive_member) = match format {
        WorkbookFormat::Twb => (decode_utf8(bytes)?, None),
        WorkbookFormat::Twbx => {
            let (member, raw) = extract_twb_member(bytes, file_name, limits)?;
            (decode_utf8(&raw)?, Some(member))
        }
    };

    let document = document::parse(&markup)?;
    if document.root.name != "workbook" {
        return Err(FormatError::MissingWorkbookRoot(document.root.name).into());
    }

    debug!(?format, ?archive_member, "workbook decoded");

    Ok(LoadedDocument {
        document,
        source: SourceInfo {
            file_name: file_name.to_string(),
            format,
            byte_len,
            archive_member,
            oversized,
        },
    })
}

fn check_size(size: u64, limits: &LimitsConfig) -> Result<(), LoadError> {
    if size > limits.max_file_bytes {
        return Err(LoadError::ResourceLimit {
            size,
            max: limits.max_file_bytes,
        });
    }
    Ok(())
}

fn decode_utf8(bytes: &[u8]) -> Result<String, FormatError> {
    let without_bom = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    std::str::from_utf8(without_bom)
        .map(str::to_string)
        .map_err(|e| FormatError::InvalidEncoding(e.to_string()))
}

/// Pull the first `.twb` member out of a packaged workbook.
fn extract_twb_member(
    bytes: &[u8],
    file_name: &str,
    limits: &LimitsConfig,
) -> Result<(String, Vec<u8>), LoadError> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| FormatError::UnreadableArchive(e.to_string()))?;

    if archive.is_empty() {
        return Err(InputError::EmptyArchive(file_name.to_string()).into());
    }

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| FormatError::UnreadableArchive(e.to_string()))?;

        if entry.is_dir() || !entry.name().to_ascii_lowercase().ends_with(".twb") {
            continue;
        }

        check_size(entry.size(), limits)?;

        let member = entry.name().to_string();
        let raw = read_capped(&mut entry, limits)?;
        return Ok((member, raw));
    }

    Err(FormatError::MissingWorkbookMember(file_name.to_string()).into())
}

/// Read at most one byte past `limits.max_file_bytes`, so a member whose
/// header understates its size still hits the hard limit.
fn read_capped<R: Read>(reader: R, limits: &LimitsConfig) -> Result<Vec<u8>, LoadError> {
    let mut raw = Vec::new();
    reader
        .take(limits.max_file_bytes.saturating_add(1))
        .read_to_end(&mut raw)
        .map_err(|e| FormatError::UnreadableArchive(e.to_string()))?;
    check_size(u64::try_from(raw.len()).unwrap_or(u64::MAX), limits)?;
    Ok(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const MINIMAL: &str = "<?xml version='1.0'?><workbook><datasources/></workbook>";

    fn zip_with(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut buf);
            let options = zip::write::SimpleFileOptions::default();
            for (name, body) in entries {
                writer.start_file(*name, options).expect("start file");
                writer.write_all(body).expect("write body");
            }
            writer.finish().expect("finish zip");
        }
        buf.into_inner()
    }

    fn decode(bytes: &[u8], name: &str) -> Result<LoadedDocument, LoadError> {
        decode_workbook(bytes, name, &LimitsConfig::default(), &mut Diagnostics::new())
    }

    #[test]
    fn detects_extensions_case_insensitively() {
        assert_eq!(WorkbookFormat::from_file_name("a.TWB"), Some(WorkbookFormat::Twb));
        assert_eq!(WorkbookFormat::from_file_name("a.twbx"), Some(WorkbookFormat::Twbx));
        assert_eq!(WorkbookFormat::from_file_name("a.xml"), None);
    }

    #[test]
    fn plain_workbook_decodes() {
        let loaded = decode(MINIMAL.as_bytes(), "sales.twb").expect("decode");
        assert_eq!(loaded.document.root.name, "workbook");
        assert_eq!(loaded.source.format, WorkbookFormat::Twb);
        assert!(loaded.source.archive_member.is_none());
    }

    #[test]
    fn bom_is_tolerated() {
        let mut bytes = b"\xEF\xBB\xBF".to_vec();
        bytes.extend_from_slice(MINIMAL.as_bytes());
        assert!(decode(&bytes, "bom.twb").is_ok());
    }

    #[test]
    fn wrong_extension_is_input_error() {
        let err = decode(MINIMAL.as_bytes(), "sales.xlsx").expect_err("reject");
        assert!(matches!(err, LoadError::Input(InputError::UnsupportedExtension(_))));
    }

    #[test]
    fn empty_buffer_is_input_error() {
        let err = decode(&[], "empty.twb").expect_err("reject");
        assert!(matches!(err, LoadError::Input(InputError::Empty(_))));
    }

    #[test]
    fn oversized_input_is_rejected_before_parsing() {
        let limits = LimitsConfig {
            max_file_bytes: 8,
            warn_file_bytes: 4,
        };
        let err = decode_workbook(b"not even xml", "big.twb", &limits, &mut Diagnostics::new())
            .expect_err("reject");
        assert!(matches!(err, LoadError::ResourceLimit { size: 12, max: 8 }));
    }

    #[test]
    fn input_over_warning_threshold_is_flagged_and_processed() {
        let limits = LimitsConfig {
            max_file_bytes: 10_000,
            warn_file_bytes: 10,
        };
        let mut diagnostics = Diagnostics::new();
        let loaded = decode_workbook(MINIMAL.as_bytes(), "w.twb", &limits, &mut diagnostics)
            .expect("processed");
        assert!(loaded.source.oversized);
        assert_eq!(diagnostics.count(WarningKind::LargeInput), 1);
    }

    #[test]
    fn non_workbook_root_is_format_error() {
        let err = decode(b"<html/>", "page.twb").expect_err("reject");
        assert!(matches!(
            err,
            LoadError::Format(FormatError::MissingWorkbookRoot(ref root)) if root == "html"
        ));
    }

    #[test]
    fn malformed_markup_is_format_error() {
        let err = decode(b"<workbook><oops></workbook>", "bad.twb").expect_err("reject");
        assert!(matches!(err, LoadError::Format(FormatError::MalformedXml(_))));
    }

    #[test]
    fn invalid_utf8_is_format_error() {
        let err = decode(&[0x3c, 0xff, 0xfe, 0x3e], "bin.twb").expect_err("reject");
        assert!(matches!(err, LoadError::Format(FormatError::InvalidEncoding(_))));
    }

    #[test]
    fn packaged_workbook_finds_nested_member() {
        let bytes = zip_with(&[
            ("Data/extract.hyper", b"binary"),
            ("nested/dir/Sales.twb", MINIMAL.as_bytes()),
        ]);
        let loaded = decode(&bytes, "Sales.twbx").expect("decode");
        assert_eq!(loaded.source.format, WorkbookFormat::Twbx);
        assert_eq!(
            loaded.source.archive_member.as_deref(),
            Some("nested/dir/Sales.twb")
        );
    }

    #[test]
    fn member_reads_stop_at_the_hard_limit() {
        let limits = LimitsConfig {
            max_file_bytes: 8,
            warn_file_bytes: 4,
        };
        let exact = Cursor::new(vec![b'x'; 8]);
        assert_eq!(read_capped(exact, &limits).expect("at limit").len(), 8);

        let over = Cursor::new(vec![b'x'; 4096]);
        let err = read_capped(over, &limits).expect_err("over limit");
        assert!(matches!(err, LoadError::ResourceLimit { size: 9, max: 8 }));
    }

    #[test]
    fn oversized_member_in_a_small_archive_is_rejected() {
        let body = format!("<workbook>{}</workbook>", " ".repeat(20_000));
        let bytes = zip_with(&[("big.twb", body.as_bytes())]);
        let limits = LimitsConfig {
            max_file_bytes: 4_096,
            warn_file_bytes: 4_096,
        };
        assert!(bytes.len() < 4_096, "deflate keeps the archive small");
        let err = decode_workbook(&bytes, "big.twbx", &limits, &mut Diagnostics::new())
            .expect_err("member over limit");
        assert!(matches!(err, LoadError::ResourceLimit { max: 4_096, .. }));
    }

    #[test]
    fn packaged_workbook_without_member_is_format_error() {
        let bytes = zip_with(&[("Image/logo.png", b"png")]);
        let err = decode(&bytes, "NoTwb.twbx").expect_err("reject");
        assert!(matches!(err, LoadError::Format(FormatError::MissingWorkbookMember(_))));
    }

    #[test]
    fn empty_archive_is_input_error() {
        let bytes = zip_with(&[]);
        let err = decode(&bytes, "Empty.twbx").expect_err("reject");
        assert!(matches!(err, LoadError::Input(InputError::EmptyArchive(_))));
    }

    #[test]
    fn garbage_archive_is_format_error() {
        let err = decode(b"definitely not a zip", "Bad.twbx").expect_err("reject");
        assert!(matches!(err, LoadError::Format(FormatError::UnreadableArchive(_))));
    }
}
