use actix_web::error::JsonPayloadError;
use actix_web::http::header::{ContentDisposition, DispositionParam, DispositionType};
use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use super::models::GenerateInvoiceFile;
use super::validation::Validator;
use super::InvoiceError;
use crate::{AppState, ErrorResponse};

/// Generate a PDF invoice using a remote DOCX template URL and data context.
#[utoipa::path(
    tag = "Generate Invoice",
    post,
    path = "/generate-invoice-file",
    request_body = GenerateInvoiceFile,
    responses(
        (status = 200, description = "Rendered PDF invoice", body = Vec<u8>, content_type = "application/pdf"),
        (status = 400, description = "Malformed request body", body = ErrorResponse),
        (status = 500, description = "Template download, rendering or conversion failed", body = ErrorResponse),
        (status = 503, description = "LibreOffice is not installed", body = ErrorResponse),
        (status = 504, description = "LibreOffice conversion timed out", body = ErrorResponse)
    )
)]
pub async fn generate_invoice(
    req: web::Json<GenerateInvoiceFile>,
    data: web::Data<AppState>,
) -> Result<HttpResponse, InvoiceError> {
    let request_id = Uuid::new_v4();
    let request = req.into_inner();
    log::info!("[{}] Generating invoice from {}", request_id, request.file_url);

    if let Err(message) = request.validate() {
        log::warn!("[{}] Rejected invoice request: {}", request_id, message);
        return Err(InvoiceError::BadRequest(message));
    }

    let generated = match data
        .invoice_service
        .generate(request.file_url.trim(), &request.invoice_dict)
        .await
    {
        Ok(generated) => generated,
        Err(e) => {
            log::error!("[{}] Invoice generation failed ({}): {}", request_id, e.kind(), e);
            return Err(e);
        }
    };

    let filename = generated.filename().to_string();
    let stream = generated.into_stream().await?;
    log::info!("[{}] Streaming {}", request_id, filename);

    Ok(HttpResponse::Ok()
        .content_type("application/pdf")
        .insert_header(ContentDisposition {
            disposition: DispositionType::Attachment,
            parameters: vec![DispositionParam::Filename(filename)],
        })
        .streaming(stream))
}

/// JSON extractor config that reports body errors as `ErrorResponse` 400s.
pub fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(json_error_handler)
}

fn json_error_handler(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    let message = match &err {
        JsonPayloadError::ContentType => "Content-Type must be application/json".to_string(),
        JsonPayloadError::Deserialize(e) => format!("Invalid request body: {}", e),
        other => format!("Invalid request body: {}", other),
    };
    log::warn!("Rejected malformed request: {}", message);
    InvoiceError::BadRequest(message).into()
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::resource("/generate-invoice-file")
            .app_data(json_config())
            .route(web::post().to(generate_invoice)),
    );
}
