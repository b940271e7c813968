use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use utoipa::ToSchema;

use super::validation::{validate_http_url, ValidationErrors, Validator};

/// Request body for generating a PDF invoice from a DOCX template.
#[derive(Serialize, Deserialize, Debug, Clone, ToSchema)]
pub struct GenerateInvoiceFile {
    /// Public or signed URL of the DOCX invoice template.
    #[schema(example = "https://example.com/invoice_template.docx")]
    pub file_url: String,
    /// Key-value data used to fill placeholders inside the DOCX template.
    #[schema(value_type = Object, example = json!({
        "invoice_number": "INV-2025-001",
        "date": "2025-11-06",
        "client_name": "John Doe",
        "address": "123 Main Street, New York, NY",
        "items": [
            {"description": "Website Development", "price": "1200.00"},
            {"description": "Hosting (1 year)", "price": "300.00"}
        ],
        "subtotal": "1500.00",
        "tax": "0.00",
        "total": "1500.00",
        "notes": "Thank you for your business."
    }))]
    pub invoice_dict: Map<String, Value>,
}

impl Validator for GenerateInvoiceFile {
    fn validate(&self) -> Result<(), String> {
        let mut errors = ValidationErrors::new();
        validate_http_url(&self.file_url, "file_url", &mut errors);
        errors.into_result()
    }
}
