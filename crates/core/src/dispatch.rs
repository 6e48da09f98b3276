//! Backend selection for a resolved (source, target) pair.
//!
//! A handful of pairs are special-cased in a fixed priority order; any other
//! supported pair goes through pandoc.

use crate::format::DocFormat;
use serde::{Deserialize, Serialize};

/// LibreOffice filter combinations used by the office routes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OfficeFilter {
    /// PDF imported with Draw's PDF import, exported as Word 2007+.
    PdfToDocx,
    /// Writer document exported as PDF.
    WriterPdf,
    /// HTML opened in Writer/Web and exported as PDF.
    WebPdf,
}

impl OfficeFilter {
    /// Value passed to `--convert-to`.
    pub fn export_filter(&self) -> &'static str {
        match self {
            Self::PdfToDocx => "docx:MS Word 2007 XML",
            Self::WriterPdf => "pdf:writer_pdf_Export",
            Self::WebPdf => "pdf:writer_web_pdf_Export",
        }
    }

    /// Value passed to `--infilter`, if the input needs a specific import filter.
    pub fn import_filter(&self) -> Option<&'static str> {
        match self {
            Self::PdfToDocx => Some("writer_pdf_import"),
            Self::WriterPdf | Self::WebPdf => None,
        }
    }

    /// Extension LibreOffice gives the produced file.
    pub fn output_extension(&self) -> &'static str {
        match self {
            Self::PdfToDocx => "docx",
            Self::WriterPdf | Self::WebPdf => "pdf",
        }
    }
}

/// The backend operation chosen for one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// Headless LibreOffice.
    LibreOffice(OfficeFilter),
    /// pandoc subprocess.
    Pandoc,
    /// calamine reader + CSV writer.
    Spreadsheet,
    /// pdfium text extraction.
    PdfText,
}

impl Route {
    /// Stable backend name for logs and reports.
    pub fn backend_name(&self) -> &'static str {
        match self {
            Self::LibreOffice(_) => "libreoffice",
            Self::Pandoc => "pandoc",
            Self::Spreadsheet => "spreadsheet",
            Self::PdfText => "pdfium",
        }
    }

    /// Whether the route shells out to an external program.
    pub fn is_subprocess(&self) -> bool {
        matches!(self, Self::LibreOffice(_) | Self::Pandoc)
    }
}

/// Pick the backend for a pair. Does not check the support matrix.
pub fn route(from: DocFormat, to: DocFormat) -> Route {
    use DocFormat::*;
    match (from, to) {
        (Pdf, Docx) => Route::LibreOffice(OfficeFilter::PdfToDocx),
        (Docx, Pdf) => Route::LibreOffice(OfficeFilter::WriterPdf),
        (Xlsx, Csv) => Route::Spreadsheet,
        (Docx, Markdown | Html) => Route::Pandoc,
        (Markdown, Docx) => Route::Pandoc,
        (Html, Pdf) => Route::LibreOffice(OfficeFilter::WebPdf),
        (Pdf, Txt) => Route::PdfText,
        _ => Route::Pandoc,
    }
}
