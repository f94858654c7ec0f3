//! Document text extraction: file path + extension → plain text.

use std::path::Path;

use docx_rs::{
    DocumentChild, Paragraph, ParagraphChild, RunChild, Table, TableCell, TableCellContent,
    TableChild, TableRowChild,
};
use thiserror::Error;

/// Extensions accepted for upload, lower-case with the leading dot.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[".pdf", ".docx", ".txt", ".md"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("Unsupported file type: {0}")]
    UnsupportedExtension(String),

    #[error("Failed to read document: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to extract PDF text: {0}")]
    Pdf(String),

    #[error("Failed to read Word document: {0}")]
    Docx(String),

    #[error("Document contains no extractable text")]
    Empty,
}

/// Lower-cased extension of a file name, including the dot (".pdf").
pub fn extension_of(filename: &str) -> Option<String> {
    Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
}

pub fn is_supported(extension: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&extension)
}

/// Extracts plain text from `path`, dispatching on `extension`.
/// Blocking: call from `spawn_blocking` inside async code.
pub fn extract_text(path: &Path, extension: &str) -> Result<String, DocumentError> {
    let text = match extension {
        ".pdf" => pdf_extract::extract_text(path).map_err(|e| DocumentError::Pdf(e.to_string()))?,
        ".docx" => docx_text(path)?,
        ".txt" | ".md" => std::fs::read_to_string(path)?,
        other => return Err(DocumentError::UnsupportedExtension(other.to_string())),
    };

    if text.trim().is_empty() {
        return Err(DocumentError::Empty);
    }
    Ok(text)
}

/// Paragraphs and table rows in document order, separated by blank lines.
/// Table cells are joined with " | " so schedule rows stay on one line.
fn docx_text(path: &Path) -> Result<String, DocumentError> {
    let bytes = std::fs::read(path)?;
    let docx = docx_rs::read_docx(&bytes).map_err(|e| DocumentError::Docx(e.to_string()))?;

    let mut blocks = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(p) => {
                let text = paragraph_text(p);
                if !text.trim().is_empty() {
                    blocks.push(text);
                }
            }
            DocumentChild::Table(t) => blocks.extend(table_rows(t)),
            _ => {}
        }
    }
    Ok(blocks.join("\n\n"))
}

fn paragraph_text(paragraph: &Paragraph) -> String {
    let mut text = String::new();
    for child in &paragraph.children {
        if let ParagraphChild::Run(run) = child {
            for run_child in &run.children {
                match run_child {
                    RunChild::Text(t) => text.push_str(&t.text),
                    RunChild::Tab(_) => text.push('\t'),
                    _ => {}
                }
            }
        }
    }
    text
}

fn table_rows(table: &Table) -> Vec<String> {
    table
        .rows
        .iter()
        .filter_map(|row| {
            let TableChild::TableRow(row) = row;
            let cells: Vec<String> = row
                .cells
                .iter()
                .map(|cell| {
                    let TableRowChild::TableCell(cell) = cell;
                    cell_text(cell)
                })
                .filter(|text| !text.is_empty())
                .collect();
            (!cells.is_empty()).then(|| cells.join(" | "))
        })
        .collect()
}

fn cell_text(cell: &TableCell) -> String {
    let mut parts = Vec::new();
    for content in &cell.children {
        match content {
            TableCellContent::Paragraph(p) => parts.push(paragraph_text(p)),
            TableCellContent::Table(t) => parts.extend(table_rows(t)),
            _ => {}
        }
    }
    parts
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
