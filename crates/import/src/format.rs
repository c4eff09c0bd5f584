use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ImportError;
use crate::tables::NUBANK_HEADER_SIGNATURES;

const HEADER_SCAN_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Ofx,
    NubankCsv,
    Csv,
}

impl FileFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            FileFormat::Ofx => "ofx",
            FileFormat::NubankCsv => "nubank_csv",
            FileFormat::Csv => "csv",
        }
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classifies an upload from its name and leading bytes.
///
/// Pure: the same `(filename, content)` always yields the same tag.
pub fn detect_format(filename: &str, content: &[u8]) -> Result<FileFormat, ImportError> {
    let name = filename.trim().to_lowercase();

    if name.ends_with(".ofx") {
        return Ok(FileFormat::Ofx);
    }
    if !name.ends_with(".csv") {
        return Err(ImportError::UnsupportedFormat(filename.to_string()));
    }

    let text = String::from_utf8_lossy(content);
    let is_nubank = text
        .lines()
        .take(HEADER_SCAN_LINES)
        .map(str::to_lowercase)
        .any(|line| matches_nubank_header(&line));

    Ok(if is_nubank {
        FileFormat::NubankCsv
    } else {
        FileFormat::Csv
    })
}

/// `line` must already be lowercase.
pub(crate) fn matches_nubank_header(line: &str) -> bool {
    NUBANK_HEADER_SIGNATURES.iter().any(|signature| {
        signature
            .iter()
            .all(|group| group.iter().any(|marker| line.contains(marker)))
    })
}
