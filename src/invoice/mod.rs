//! Invoice module - turns a remote DOCX template plus a JSON context into a PDF.
//!
//! The pipeline is split into submodules, leaf-first:
//! - `converter` - locating and running LibreOffice in headless mode
//! - `process_tree` - killing LibreOffice together with the processes it forks
//! - `docx_xml` - normalising Word XML so Jinja-style tags survive Word's run splitting
//! - `renderer` - filling the DOCX template parts with Tera
//! - `fetcher` - downloading the template over HTTP
//! - `workspace` - the per-request temporary directory
//! - `service` - the orchestrator composing the stages above
//! - `handlers` - the HTTP endpoint

pub mod converter;
pub mod docx_xml;
pub mod fetcher;
pub mod handlers;
pub mod models;
mod process_tree;
pub mod renderer;
pub mod service;
pub mod validation;
pub mod workspace;

pub use converter::{DocumentConverter, ExecutableLocator, LibreOfficeConverter};
pub use fetcher::{HttpTemplateFetcher, TemplateFetcher};
pub use models::GenerateInvoiceFile;
pub use renderer::DocxRenderer;
pub use service::{GeneratedInvoice, InvoiceService};
pub use workspace::Workspace;

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

use crate::ErrorResponse;

/// Errors that can occur while generating an invoice.
///
/// Every pipeline stage returns one of these kinds unmodified; only the
/// HTTP layer translates them into a status code.
#[derive(Debug, Error)]
pub enum InvoiceError {
    #[error("{0}")]
    BadRequest(String),
    #[error("failed to download DOCX template: {0}")]
    TemplateFetch(String),
    #[error("failed to render DOCX template: {0}")]
    TemplateRender(String),
    #[error("LibreOffice 'soffice' binary not found. Install LibreOffice or set LIBREOFFICE_PATH.")]
    ExecutableNotFound,
    #[error("LibreOffice conversion timed out after {seconds} seconds")]
    ConversionTimeout { seconds: u64 },
    #[error("LibreOffice failed (exit code {code}): {output}")]
    ConversionFailed { code: i32, output: String },
    #[error("PDF not created by LibreOffice: expected {0}")]
    OutputMissing(String),
    #[error("invoice generation failed: {0}")]
    Internal(String),
}

impl InvoiceError {
    /// Stable machine-readable name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BadRequest",
            Self::TemplateFetch(_) => "TemplateFetchError",
            Self::TemplateRender(_) => "TemplateRenderError",
            Self::ExecutableNotFound => "ExecutableNotFound",
            Self::ConversionTimeout { .. } => "ConversionTimeout",
            Self::ConversionFailed { .. } => "ConversionFailed",
            Self::OutputMissing(_) => "OutputMissing",
            Self::Internal(_) => "InternalGenerationError",
        }
    }

    pub(crate) fn internal(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Internal(format!("{context}: {err}"))
    }
}

impl ResponseError for InvoiceError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::ExecutableNotFound => StatusCode::SERVICE_UNAVAILABLE,
            Self::ConversionTimeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code())
            .json(ErrorResponse::new(self.kind(), &self.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_are_differentiated() {
        assert_eq!(
            InvoiceError::BadRequest("bad".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            InvoiceError::ExecutableNotFound.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            InvoiceError::ConversionTimeout { seconds: 5 }.status_code(),
            StatusCode::GATEWAY_TIMEOUT
        );
        for err in [
            InvoiceError::TemplateFetch("404".into()),
            InvoiceError::TemplateRender("missing".into()),
            InvoiceError::ConversionFailed {
                code: 1,
                output: "boom".into(),
            },
            InvoiceError::OutputMissing("/tmp/x.pdf".into()),
            InvoiceError::Internal("oops".into()),
        ] {
            assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        }
    }

    #[test]
    fn test_conversion_failed_keeps_diagnostics() {
        let err = InvoiceError::ConversionFailed {
            code: 81,
            output: "source file could not be loaded".into(),
        };
        let message = err.to_string();
        assert!(message.contains("81"));
        assert!(message.contains("source file could not be loaded"));
        assert_eq!(err.kind(), "ConversionFailed");
    }
}
