use std::sync::Arc;

use crate::config::AppConfig;
use crate::invoice::{ExecutableLocator, HttpTemplateFetcher, InvoiceService, LibreOfficeConverter};

/// Immutable application state, built once at startup and shared by all workers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub invoice_service: InvoiceService,
}

impl AppState {
    pub fn new(config: AppConfig) -> Result<Self, reqwest::Error> {
        let fetcher = HttpTemplateFetcher::new(config.fetch_timeout, config.max_template_bytes)?;
        let converter = LibreOfficeConverter::new(
            ExecutableLocator::new(config.libreoffice_path.clone()),
            config.conversion_timeout,
        );
        let invoice_service = InvoiceService::new(
            Arc::new(fetcher),
            Arc::new(converter),
            config.workspace_dir.clone(),
        );

        Ok(Self::with_service(config, invoice_service))
    }

    pub fn with_service(config: AppConfig, invoice_service: InvoiceService) -> Self {
        Self {
            config: Arc::new(config),
            invoice_service,
        }
    }
}
