//! Format-specific text extraction, selected by file extension.

use calamine::{open_workbook_auto, Data, Reader};
use docx_rs::{
    read_docx, DocumentChild, Paragraph, Table, TableCellContent, TableChild, TableRowChild,
};
use domain::error::LoadError;
use domain::models::{Chunk, ChunkMetadata};
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentExtractor {
    Pdf,
    Word,
    PlainText,
    Spreadsheet,
}

const EXTENSION_TABLE: &[(&str, DocumentExtractor)] = &[
    ("pdf", DocumentExtractor::Pdf),
    ("docx", DocumentExtractor::Word),
    ("doc", DocumentExtractor::Word),
    ("txt", DocumentExtractor::PlainText),
    ("md", DocumentExtractor::PlainText),
    ("xlsx", DocumentExtractor::Spreadsheet),
    ("xls", DocumentExtractor::Spreadsheet),
];

impl DocumentExtractor {
    /// Look up the extractor for a lower-cased extension (no dot).
    pub fn for_extension(extension: &str) -> Option<Self> {
        EXTENSION_TABLE
            .iter()
            .find(|(ext, _)| *ext == extension)
            .map(|(_, extractor)| *extractor)
    }

    pub fn supported_extensions() -> impl Iterator<Item = &'static str> {
        EXTENSION_TABLE.iter().map(|(ext, _)| *ext)
    }

    pub fn name(self) -> &'static str {
        match self {
            DocumentExtractor::Pdf => "pdf",
            DocumentExtractor::Word => "word",
            DocumentExtractor::PlainText => "text",
            DocumentExtractor::Spreadsheet => "spreadsheet",
        }
    }

    /// Extract the text units of one file. Every unit is tagged with the file
    /// path as its source.
    pub fn extract(self, path: &Path) -> Result<Vec<Chunk>, LoadError> {
        debug!(extractor = self.name(), path = %path.display(), "extracting");
        let source = path.to_string_lossy().into_owned();
        match self {
            DocumentExtractor::Pdf => extract_pdf(path, &source),
            DocumentExtractor::Word => extract_word(path, &source),
            DocumentExtractor::PlainText => extract_text(path, &source),
            DocumentExtractor::Spreadsheet => extract_spreadsheet(path, &source),
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>, LoadError> {
    std::fs::read(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn extract_failed(path: &Path, message: impl Into<String>) -> LoadError {
    LoadError::Extract {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

fn extract_text(path: &Path, source: &str) -> Result<Vec<Chunk>, LoadError> {
    let bytes = read_bytes(path)?;
    // Lossy conversion keeps stray non-UTF8 bytes from failing the whole file.
    let content = String::from_utf8_lossy(&bytes).into_owned();
    Ok(vec![Chunk::new(content, ChunkMetadata::with_source(source))])
}

fn extract_pdf(path: &Path, source: &str) -> Result<Vec<Chunk>, LoadError> {
    let bytes = read_bytes(path)?;
    // pdf-extract panics on some malformed inputs.
    let pages = panic::catch_unwind(AssertUnwindSafe(|| {
        pdf_extract::extract_text_from_mem_by_pages(&bytes)
    }))
    .map_err(|_| extract_failed(path, "PDF parser panicked"))?
    .map_err(|e| extract_failed(path, format!("PDF extraction failed: {e}")))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(index, text)| {
            let page = u32::try_from(index + 1).unwrap_or(u32::MAX);
            Chunk::new(text, ChunkMetadata::with_source(source).page(page))
        })
        .collect())
}

fn extract_word(path: &Path, source: &str) -> Result<Vec<Chunk>, LoadError> {
    let bytes = read_bytes(path)?;
    let docx = read_docx(&bytes)
        .map_err(|e| extract_failed(path, format!("DOCX parse failed: {e}")))?;

    let mut text = String::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => push_paragraph(&mut text, p),
            DocumentChild::Table(table) => push_table(&mut text, table),
            _ => {}
        }
    }
    Ok(vec![Chunk::new(text, ChunkMetadata::with_source(source))])
}

fn push_paragraph(out: &mut String, paragraph: &Paragraph) {
    out.push_str(&paragraph.raw_text());
    out.push('\n');
}

fn push_table(out: &mut String, table: &Table) {
    for row in &table.rows {
        #[allow(irrefutable_let_patterns)]
        let TableChild::TableRow(row) = row else {
            continue;
        };
        let cells: Vec<String> = row
            .cells
            .iter()
            .filter_map(|cell| {
                #[allow(irrefutable_let_patterns)]
                let TableRowChild::TableCell(cell) = cell else {
                    return None;
                };
                let mut cell_text = String::new();
                for content in &cell.children {
                    if let TableCellContent::Paragraph(p) = content {
                        if !cell_text.is_empty() {
                            cell_text.push(' ');
                        }
                        cell_text.push_str(&p.raw_text());
                    }
                }
                Some(cell_text)
            })
            .collect();
        out.push_str(&cells.join("\t"));
        out.push('\n');
    }
}

fn extract_spreadsheet(path: &Path, source: &str) -> Result<Vec<Chunk>, LoadError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| extract_failed(path, format!("spreadsheet open failed: {e}")))?;

    let mut units = Vec::new();
    for sheet in workbook.sheet_names() {
        let range = workbook
            .worksheet_range(&sheet)
            .map_err(|e| extract_failed(path, format!("sheet {sheet}: {e}")))?;

        let rows: Vec<String> = range
            .rows()
            .map(|row| {
                row.iter()
                    .filter(|cell| !matches!(cell, Data::Empty))
                    .map(|cell| cell.to_string())
                    .collect::<Vec<_>>()
                    .join("\t")
            })
            .filter(|line| !line.trim().is_empty())
            .collect();

        if rows.is_empty() {
            continue;
        }
        units.push(Chunk::new(
            rows.join("\n"),
            ChunkMetadata::with_source(source).extra("sheet", sheet.clone()),
        ));
    }
    Ok(units)
}
