#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use actix_web::dev::ServerHandle;
use actix_web::{web, App, HttpResponse, HttpServer};
use async_trait::async_trait;
use invoice_generator_server::invoice::converter::expected_output_path;
use invoice_generator_server::invoice::{DocumentConverter, InvoiceError, TemplateFetcher};
use regex::Regex;
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

const CONTENT_TYPES: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">"#,
    r#"<Default Extension="xml" ContentType="application/xml"/>"#,
    r#"<Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>"#,
    r#"</Types>"#
);

const RELS: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    r#"<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="word/document.xml"/>"#,
    r#"</Relationships>"#
);

/// Invoice template with a placeholder split across runs, a line-item row and a total.
pub const INVOICE_DOCUMENT: &str = concat!(
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#,
    r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Invoice {</w:t></w:r><w:r><w:t>{ invoice_</w:t></w:r>"#,
    r#"<w:proofErr w:type="spellStart"/><w:r><w:t>number }}</w:t></w:r></w:p>"#,
    r#"<w:tbl>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>{%tr for item in items %}</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>{{ item.description }}</w:t></w:r></w:p></w:tc>"#,
    r#"<w:tc><w:p><w:r><w:t>{{ item.price }}</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"<w:tr><w:tc><w:p><w:r><w:t>{%tr endfor %}</w:t></w:r></w:p></w:tc></w:tr>"#,
    r#"</w:tbl>"#,
    r#"<w:p><w:r><w:t xml:space="preserve">Total: {{ total }}</w:t></w:r></w:p>"#,
    r#"</w:body></w:document>"#
);

pub fn docx_with_document(document_xml: &str) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default();
    for (name, content) in [
        ("[Content_Types].xml", CONTENT_TYPES),
        ("_rels/.rels", RELS),
        ("word/document.xml", document_xml),
    ] {
        writer.start_file(name, options).unwrap();
        writer.write_all(content.as_bytes()).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

pub fn invoice_template() -> Vec<u8> {
    docx_with_document(INVOICE_DOCUMENT)
}

pub fn example_context() -> serde_json::Map<String, serde_json::Value> {
    serde_json::json!({
        "invoice_number": "INV-1",
        "items": [{"description": "A", "price": "10.00"}],
        "total": "10.00"
    })
    .as_object()
    .unwrap()
    .clone()
}

/// Plain text of `word/document.xml` inside a DOCX file.
pub fn document_text(docx: &Path) -> String {
    let mut archive = ZipArchive::new(std::fs::File::open(docx).unwrap()).unwrap();
    let mut entry = archive.by_name("word/document.xml").unwrap();
    let mut xml = String::new();
    entry.read_to_string(&mut xml).unwrap();
    let tags = Regex::new(r"<[^>]*>").unwrap();
    tags.replace_all(&xml, " ").split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Converter stand-in: writes a PDF-looking file carrying the document text.
pub struct TextPdfConverter;

#[async_trait]
impl DocumentConverter for TextPdfConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, InvoiceError> {
        let text = document_text(input);
        let pdf = expected_output_path(input, output_dir)?;
        std::fs::write(&pdf, format!("%PDF-1.4\n{}\n%%EOF\n", text)).unwrap();
        Ok(pdf)
    }
}

/// Converter that always fails with the error built by the given function.
pub struct FailingConverter(pub fn() -> InvoiceError);

#[async_trait]
impl DocumentConverter for FailingConverter {
    async fn convert(&self, _input: &Path, _output_dir: &Path) -> Result<PathBuf, InvoiceError> {
        Err((self.0)())
    }
}

/// Fetcher returning fixed bytes for every URL.
pub struct StaticFetcher(pub Vec<u8>);

#[async_trait]
impl TemplateFetcher for StaticFetcher {
    async fn fetch(&self, _url: &str) -> Result<Vec<u8>, InvoiceError> {
        Ok(self.0.clone())
    }
}

pub struct FailingFetcher;

#[async_trait]
impl TemplateFetcher for FailingFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, InvoiceError> {
        Err(InvoiceError::TemplateFetch(format!(
            "server responded with status 404 Not Found for {url}"
        )))
    }
}

/// Local HTTP server publishing a template.
pub struct TemplateServer {
    pub base_url: String,
    handle: ServerHandle,
}

impl TemplateServer {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn stop(self) {
        self.handle.stop(false).await;
    }
}

async fn serve_template(template: web::Data<Vec<u8>>) -> HttpResponse {
    HttpResponse::Ok()
        .content_type("application/vnd.openxmlformats-officedocument.wordprocessingml.document")
        .body(template.get_ref().clone())
}

async fn not_found() -> HttpResponse {
    HttpResponse::NotFound().body("no such template")
}

async fn redirect() -> HttpResponse {
    HttpResponse::Found()
        .insert_header(("Location", "/t.docx"))
        .finish()
}

async fn slow() -> HttpResponse {
    tokio::time::sleep(Duration::from_secs(5)).await;
    HttpResponse::Ok().body("late")
}

/// Routes: `/t.docx`, `/missing.docx` (404), `/redirect` (302 → `/t.docx`), `/slow`.
pub async fn start_template_server(template: Vec<u8>) -> TemplateServer {
    let template = web::Data::new(template);
    let server = HttpServer::new(move || {
        App::new()
            .app_data(template.clone())
            .route("/t.docx", web::get().to(serve_template))
            .route("/missing.docx", web::get().to(not_found))
            .route("/redirect", web::get().to(redirect))
            .route("/slow", web::get().to(slow))
    })
    .workers(1)
    .disable_signals()
    .bind(("127.0.0.1", 0))
    .unwrap();

    let addr = server.addrs()[0];
    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(server);

    TemplateServer {
        base_url: format!("http://{}", addr),
        handle,
    }
}

/// Poll until `dir` has no entries; workspace removal runs on the blocking pool.
pub async fn wait_until_empty(dir: &Path) -> bool {
    for _ in 0..150 {
        let empty = std::fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(true);
        if empty {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}

pub async fn wait_until_removed(path: &Path) -> bool {
    for _ in 0..150 {
        if !path.exists() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    false
}
