use actix_web::{web, HttpResponse, Responder};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::AppState;

#[derive(Serialize, Deserialize, Debug, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    /// Whether a LibreOffice executable can currently be found.
    pub converter_available: bool,
}

#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is running", body = HealthResponse)
    )
)]
pub async fn health(data: web::Data<AppState>) -> impl Responder {
    let service = data.invoice_service.clone();
    let converter_available = web::block(move || service.converter_available())
        .await
        .unwrap_or(false);

    HttpResponse::Ok().json(HealthResponse {
        status: "ok".to_string(),
        converter_available,
    })
}

pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::resource("/health").route(web::get().to(health)));
}
