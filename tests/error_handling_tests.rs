use actix_web::body::to_bytes;
use actix_web::http::StatusCode;
use actix_web::ResponseError;
use invoice_generator_server::invoice::InvoiceError;
use invoice_generator_server::ErrorResponse;

async fn response_body(err: &InvoiceError) -> (StatusCode, ErrorResponse) {
    let response = err.error_response();
    let status = response.status();
    let bytes = to_bytes(response.into_body()).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[test]
fn test_error_response_serialization() {
    let response = ErrorResponse::new("BadRequest", "file_url must not be empty");
    let json = serde_json::to_value(&response).unwrap();

    assert_eq!(json["error"], "BadRequest");
    assert_eq!(json["message"], "file_url must not be empty");
    assert!(chrono::DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());
}

#[actix_web::test]
async fn test_bad_request_body() {
    let err = InvoiceError::BadRequest("file_url must not be empty".to_string());
    let (status, body) = response_body(&err).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body.error, "BadRequest");
    assert_eq!(body.message, "file_url must not be empty");
}

#[actix_web::test]
async fn test_missing_executable_body_names_the_fix() {
    let (status, body) = response_body(&InvoiceError::ExecutableNotFound).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body.error, "ExecutableNotFound");
    assert!(body.message.contains("LIBREOFFICE_PATH"));
}

#[actix_web::test]
async fn test_timeout_body_reports_limit() {
    let (status, body) = response_body(&InvoiceError::ConversionTimeout { seconds: 120 }).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body.error, "ConversionTimeout");
    assert!(body.message.contains("120 seconds"));
}

#[actix_web::test]
async fn test_render_error_body_carries_cause() {
    let err = InvoiceError::TemplateRender(
        "word/document.xml: Variable `total` not found in context".to_string(),
    );
    let (status, body) = response_body(&err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error, "TemplateRenderError");
    assert!(body.message.starts_with("failed to render DOCX template"));
    assert!(body.message.contains("`total`"));
}

#[actix_web::test]
async fn test_conversion_failure_body_keeps_output() {
    let err = InvoiceError::ConversionFailed {
        code: 81,
        output: "Error: source file could not be loaded".to_string(),
    };
    let (status, body) = response_body(&err).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body.error, "ConversionFailed");
    assert!(body.message.contains("exit code 81"));
    assert!(body.message.contains("source file could not be loaded"));
}
