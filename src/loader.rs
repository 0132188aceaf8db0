//! Filesystem document loader.
//!
//! Reads `.txt`, `.md` and `.markdown` files as UTF-8 into a single section.
//! `.pdf` files are extracted with `pdf-extract`, one section per page with
//! the page number under the `page` metadata key. Every section carries the
//! document's path under `source`.

use anyhow::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

use docsync_core::loader::DocumentLoader;
use docsync_core::models::{Document, SourceText};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unsupported file type '{extension}': {path}")]
    Unsupported { path: PathBuf, extension: String },

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("PDF extraction failed for {path}: {message}")]
    Pdf { path: PathBuf, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FileKind {
    Text,
    Pdf,
}

fn file_kind(path: &Path) -> Option<FileKind> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    match ext.as_str() {
        "txt" | "md" | "markdown" => Some(FileKind::Text),
        "pdf" => Some(FileKind::Pdf),
        _ => None,
    }
}

/// Whether [`FsLoader`] can read this file.
pub fn is_supported(path: &Path) -> bool {
    file_kind(path).is_some()
}

pub struct FsLoader;

impl FsLoader {
    /// The file's text: one entry for text files, one per page for PDFs.
    async fn read_pages(&self, path: &Path, kind: FileKind) -> Result<Vec<String>, LoadError> {
        let io_err = |source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        };
        match kind {
            FileKind::Text => Ok(vec![tokio::fs::read_to_string(path).await.map_err(io_err)?]),
            FileKind::Pdf => {
                let bytes = tokio::fs::read(path).await.map_err(io_err)?;
                let extracted = tokio::task::spawn_blocking(move || {
                    pdf_extract::extract_text_from_mem_by_pages(&bytes)
                })
                .await;
                let pdf_err = |message: String| LoadError::Pdf {
                    path: path.to_path_buf(),
                    message,
                };
                match extracted {
                    Ok(Ok(pages)) => Ok(pages),
                    Ok(Err(e)) => Err(pdf_err(e.to_string())),
                    Err(join) => Err(pdf_err(join.to_string())),
                }
            }
        }
    }
}

/// Wrap extracted text into sections. PDF pages keep their 1-based `page`
/// number and the document's `total_pages`.
fn sections(document: &Document, kind: FileKind, pages: Vec<String>) -> Vec<SourceText> {
    let total_pages = pages.len();
    pages
        .into_iter()
        .enumerate()
        .map(|(i, text)| {
            let mut section = SourceText::new(text);
            section
                .meta
                .insert("source".to_string(), document.filepath.clone().into());
            section
                .meta
                .insert("filename".to_string(), document.filename.clone().into());
            if kind == FileKind::Pdf {
                section.meta.insert("page".to_string(), (i + 1).into());
                section
                    .meta
                    .insert("total_pages".to_string(), total_pages.into());
            }
            section
        })
        .collect()
}

#[async_trait]
impl DocumentLoader for FsLoader {
    async fn load(&self, document: &Document) -> Result<Vec<SourceText>> {
        let path = Path::new(&document.filepath);
        let Some(kind) = file_kind(path) else {
            return Err(LoadError::Unsupported {
                path: path.to_path_buf(),
                extension: path
                    .extension()
                    .map(|e| e.to_string_lossy().to_string())
                    .unwrap_or_default(),
            }
            .into());
        };
        let pages = self.read_pages(path, kind).await?;
        Ok(sections(document, kind, pages))
    }
}
