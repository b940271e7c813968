use actix_cors::Cors;
use actix_web::middleware::{Compress, Logger};
use actix_web::{http::header, web, App, HttpServer};
use actix_web_prometheus::PrometheusMetricsBuilder;
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};
use utoipa_swagger_ui::SwaggerUi;

pub mod config;
pub mod health;
pub mod invoice;
pub mod state;

pub use crate::config::AppConfig;
pub use crate::state::AppState;

#[derive(Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorResponse {
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            error: error_type.to_string(),
            message: message.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Invoice Generator",
        description = "API for generating invoice templates."
    ),
    paths(
        crate::invoice::handlers::generate_invoice,
        crate::health::health
    ),
    components(
        schemas(
            invoice::models::GenerateInvoiceFile,
            health::HealthResponse,
            ErrorResponse,
        )
    ),
    tags(
        (name = "Generate Invoice", description = "Fill a DOCX template and convert it to PDF."),
        (name = "Health", description = "Liveness probe.")
    )
)]
pub struct ApiDoc;

/// Register every route of the service.
pub fn configure_app(cfg: &mut web::ServiceConfig) {
    cfg.configure(invoice::handlers::config)
        .configure(health::config);
}

fn build_cors(origins: &[String]) -> Cors {
    let cors = origins
        .iter()
        .fold(Cors::default(), |cors, origin| cors.allowed_origin(origin));

    cors.allowed_methods(vec!["GET", "POST", "OPTIONS"])
        .allowed_headers(vec![header::ACCEPT, header::CONTENT_TYPE])
        .expose_headers(vec![header::CONTENT_DISPOSITION])
        .max_age(3600)
}

pub async fn run() -> std::io::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let bind = (config.host.clone(), config.port);
    let app_state = match AppState::new(config) {
        Ok(state) => web::Data::new(state),
        Err(e) => {
            log::error!("Failed to create HTTP client for template downloads: {}", e);
            std::process::exit(1);
        }
    };

    if !app_state.invoice_service.converter_available() {
        log::warn!(
            "LibreOffice 'soffice' binary not found. Install LibreOffice or set LIBREOFFICE_PATH; \
             conversions will fail until it is available."
        );
    }

    let prometheus = PrometheusMetricsBuilder::new("invoice_generator_server")
        .endpoint("/metrics")
        .build()
        .expect("Failed to create Prometheus metrics middleware");

    log::info!("Starting server at http://{}:{}", bind.0, bind.1);

    HttpServer::new(move || {
        let app_state = app_state.clone();
        let prometheus = prometheus.clone();
        let cors = build_cors(&app_state.config.cors_allowed_origins);

        App::new()
            .wrap(Compress::default())
            .wrap(prometheus)
            .wrap(cors)
            .wrap(Logger::default())
            .app_data(app_state)
            .configure(configure_app)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", ApiDoc::openapi()),
            )
    })
    .keep_alive(actix_web::http::KeepAlive::Os)
    .bind(bind)?
    .run()
    .await
}
