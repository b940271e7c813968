//! Invoice generation orchestrator.
//!
//! fetch → render → convert, strictly in that order, inside a workspace
//! owned by the request. The workspace travels with the result and is
//! removed when the PDF stream is dropped, or immediately on failure.

use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use actix_web::web::{self, Bytes};
use futures_util::Stream;
use serde_json::{Map, Value};
use tokio_util::io::ReaderStream;

use super::converter::DocumentConverter;
use super::fetcher::TemplateFetcher;
use super::renderer::DocxRenderer;
use super::workspace::Workspace;
use super::InvoiceError;

#[derive(Clone)]
pub struct InvoiceService {
    fetcher: Arc<dyn TemplateFetcher>,
    converter: Arc<dyn DocumentConverter>,
    renderer: DocxRenderer,
    workspace_root: Option<PathBuf>,
}

impl InvoiceService {
    pub fn new(
        fetcher: Arc<dyn TemplateFetcher>,
        converter: Arc<dyn DocumentConverter>,
        workspace_root: Option<PathBuf>,
    ) -> Self {
        Self {
            fetcher,
            converter,
            renderer: DocxRenderer::new(),
            workspace_root,
        }
    }

    pub fn converter_available(&self) -> bool {
        self.converter.is_available()
    }

    /// Produce a PDF from the template at `template_url` filled with `context`.
    pub async fn generate(
        &self,
        template_url: &str,
        context: &Map<String, Value>,
    ) -> Result<GeneratedInvoice, InvoiceError> {
        let workspace = Workspace::create(self.workspace_root.as_deref())
            .map_err(|e| InvoiceError::internal("failed to create workspace", e))?;

        log::info!("Fetching template {}", template_url);
        let template = self.fetcher.fetch(template_url).await?;
        let template_path = workspace.template_path();
        tokio::fs::write(&template_path, &template)
            .await
            .map_err(|e| InvoiceError::internal("failed to store template", e))?;

        log::info!("Rendering template ({} bytes)", template.len());
        let renderer = self.renderer;
        let context = context.clone();
        let rendered_path = workspace.rendered_path();
        let rendered = web::block(move || renderer.render(&template_path, &context, &rendered_path))
            .await
            .map_err(|e| InvoiceError::internal("render task failed", e))??;

        log::info!("Converting {} to PDF", rendered.display());
        let pdf_path = self.converter.convert(&rendered, workspace.path()).await?;

        let filename = suggested_filename(&rendered);
        Ok(GeneratedInvoice {
            workspace,
            pdf_path,
            filename,
        })
    }
}

/// `<rendered document stem>.pdf`
pub fn suggested_filename(rendered: &Path) -> String {
    let stem = rendered
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "invoice".to_string());
    format!("{stem}.pdf")
}

/// A finished PDF together with the workspace that holds it.
#[derive(Debug)]
pub struct GeneratedInvoice {
    workspace: Workspace,
    pdf_path: PathBuf,
    filename: String,
}

impl GeneratedInvoice {
    pub fn filename(&self) -> &str {
        &self.filename
    }

    pub fn pdf_path(&self) -> &Path {
        &self.pdf_path
    }

    pub fn workspace_path(&self) -> &Path {
        self.workspace.path()
    }

    /// Open the PDF as a byte stream that owns the workspace.
    pub async fn into_stream(self) -> Result<PdfStream, InvoiceError> {
        let file = tokio::fs::File::open(&self.pdf_path)
            .await
            .map_err(|e| InvoiceError::internal("failed to open generated PDF", e))?;
        Ok(PdfStream {
            inner: ReaderStream::new(file),
            _workspace: self.workspace,
        })
    }
}

/// Streams the PDF; dropping it (end of body or client disconnect) removes the workspace.
pub struct PdfStream {
    inner: ReaderStream<tokio::fs::File>,
    _workspace: Workspace,
}

impl Stream for PdfStream {
    type Item = Result<Bytes, std::io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggested_filename_uses_rendered_stem() {
        assert_eq!(suggested_filename(Path::new("/tmp/ws/output.docx")), "output.pdf");
        assert_eq!(suggested_filename(Path::new("report.final.docx")), "report.final.pdf");
        assert_eq!(suggested_filename(Path::new("/")), "invoice.pdf");
    }
}
