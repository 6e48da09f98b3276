//! Document formats and the support matrix.
//!
//! The matrix answers "given format X, which formats can I convert to?". It is
//! an immutable value built once and shared by the converter and batch runner.

use crate::error::{ConversionError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// A document format known to the converter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocFormat {
    Pdf,
    Docx,
    Xlsx,
    Csv,
    #[serde(rename = "md", alias = "markdown")]
    Markdown,
    #[serde(alias = "htm")]
    Html,
    Txt,
}

impl DocFormat {
    /// All known formats, in display order.
    pub const ALL: [DocFormat; 7] = [
        DocFormat::Pdf,
        DocFormat::Docx,
        DocFormat::Xlsx,
        DocFormat::Csv,
        DocFormat::Markdown,
        DocFormat::Html,
        DocFormat::Txt,
    ];

    /// Determine the format from a file extension (case-insensitive, leading dot allowed).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.trim().trim_start_matches('.');
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" => Some(Self::Xlsx),
            "csv" => Some(Self::Csv),
            "md" | "markdown" => Some(Self::Markdown),
            "html" | "htm" => Some(Self::Html),
            "txt" => Some(Self::Txt),
            _ => None,
        }
    }

    /// Infer the format from a path's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|e| e.to_str())
            .and_then(Self::from_extension)
    }

    /// Canonical file extension, without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Xlsx => "xlsx",
            Self::Csv => "csv",
            Self::Markdown => "md",
            Self::Html => "html",
            Self::Txt => "txt",
        }
    }

    /// Name of the pandoc reader for this format, if pandoc can read it.
    pub fn pandoc_reader(&self) -> Option<&'static str> {
        match self {
            Self::Csv => Some("csv"),
            other => other.pandoc_writer(),
        }
    }

    /// Name of the pandoc writer for this format, if pandoc can write it.
    /// pandoc reads CSV tables but has no CSV writer.
    pub fn pandoc_writer(&self) -> Option<&'static str> {
        match self {
            Self::Docx => Some("docx"),
            Self::Markdown => Some("markdown"),
            Self::Html => Some("html"),
            Self::Txt => Some("plain"),
            Self::Csv | Self::Pdf | Self::Xlsx => None,
        }
    }

    /// Whether a file extension belongs to this format (aliases included).
    pub fn matches_extension(&self, ext: &str) -> bool {
        Self::from_extension(ext) == Some(*self)
    }
}

impl fmt::Display for DocFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.extension())
    }
}

impl FromStr for DocFormat {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_extension(s).ok_or_else(|| ConversionError::UnknownFormat(s.to_string()))
    }
}

/// Mapping from a source format to the formats it can be converted into.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormatMatrix {
    entries: BTreeMap<DocFormat, Vec<DocFormat>>,
}

impl Default for FormatMatrix {
    fn default() -> Self {
        use DocFormat::*;
        Self::from_pairs([
            (Pdf, Docx),
            (Pdf, Txt),
            (Docx, Pdf),
            (Docx, Markdown),
            (Docx, Html),
            (Xlsx, Csv),
            (Markdown, Docx),
            (Markdown, Html),
            (Html, Docx),
            (Html, Pdf),
            (Html, Markdown),
        ])
    }
}

impl FormatMatrix {
    /// Build a matrix from (source, target) pairs. Order of targets is kept, duplicates dropped.
    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (DocFormat, DocFormat)>,
    {
        let mut entries: BTreeMap<DocFormat, Vec<DocFormat>> = BTreeMap::new();
        for (from, to) in pairs {
            let targets = entries.entry(from).or_default();
            if !targets.contains(&to) {
                targets.push(to);
            }
        }
        Self { entries }
    }

    /// Targets reachable from `from`. Empty when the source is not in the matrix.
    pub fn targets(&self, from: DocFormat) -> &[DocFormat] {
        self.entries.get(&from).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Targets reachable from a source extension. Unknown extensions yield an empty list.
    pub fn targets_for_extension(&self, ext: &str) -> Vec<DocFormat> {
        DocFormat::from_extension(ext)
            .map(|from| self.targets(from).to_vec())
            .unwrap_or_default()
    }

    /// Source formats present in the matrix.
    pub fn sources(&self) -> impl Iterator<Item = DocFormat> + '_ {
        self.entries.keys().copied()
    }

    /// Whether `from -> to` is a supported pair.
    pub fn supports(&self, from: DocFormat, to: DocFormat) -> bool {
        self.targets(from).contains(&to)
    }

    /// Fail with `UnsupportedConversion` when the pair is absent.
    pub fn ensure_supported(&self, from: DocFormat, to: DocFormat) -> Result<()> {
        if self.supports(from, to) {
            Ok(())
        } else {
            Err(ConversionError::UnsupportedConversion {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    }

    /// Number of supported pairs.
    pub fn pair_count(&self) -> usize {
        self.entries.values().map(Vec::len).sum()
    }
}
