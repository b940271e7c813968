//! DOCX template rendering.
//!
//! A DOCX file is a ZIP archive. The text-bearing XML parts are normalised
//! with [`prepare_template_xml`], evaluated with Tera (Jinja2 syntax) against
//! the caller's JSON context, and written to a new archive. Every other entry
//! is copied byte-for-byte.

use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use regex::Regex;
use serde_json::{Map, Value};
use tera::{Context, Tera};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use super::docx_xml::prepare_template_xml;
use super::InvoiceError;

lazy_static! {
    static ref TEMPLATED_PART: Regex =
        Regex::new(r"^word/(document|header\d*|footer\d*|footnotes|endnotes)\.xml$").unwrap();
}

/// Whether a ZIP entry holds text that may carry placeholders.
pub fn is_templated_part(name: &str) -> bool {
    TEMPLATED_PART.is_match(name)
}

/// Stateless renderer for Jinja-style DOCX templates.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocxRenderer;

impl DocxRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Fill `template_path` with `context` and write the result to `output_path`.
    ///
    /// Undefined variables and type mismatches fail the render instead of
    /// producing blank fields. The template file is never modified.
    pub fn render(
        &self,
        template_path: &Path,
        context: &Map<String, Value>,
        output_path: &Path,
    ) -> Result<PathBuf, InvoiceError> {
        if template_path == output_path {
            return Err(InvoiceError::internal(
                "refusing to overwrite template",
                template_path.display(),
            ));
        }

        let template = File::open(template_path)
            .map_err(|e| InvoiceError::TemplateRender(format!("cannot open template: {e}")))?;
        let mut archive = ZipArchive::new(BufReader::new(template))
            .map_err(|e| InvoiceError::TemplateRender(format!("template is not a valid DOCX file: {e}")))?;

        let context = Context::from_value(Value::Object(context.clone()))
            .map_err(|e| InvoiceError::TemplateRender(error_chain(&e)))?;

        let output = File::create(output_path)
            .map_err(|e| InvoiceError::internal("cannot create rendered document", e))?;
        let mut writer = ZipWriter::new(BufWriter::new(output));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        let mut rendered_parts = 0usize;
        for index in 0..archive.len() {
            let mut entry = archive
                .by_index(index)
                .map_err(|e| InvoiceError::TemplateRender(format!("corrupted DOCX entry: {e}")))?;
            let name = entry.name().to_string();

            if !is_templated_part(&name) {
                writer
                    .raw_copy_file(entry)
                    .map_err(|e| InvoiceError::internal("failed to copy DOCX entry", e))?;
                continue;
            }

            let mut xml = String::new();
            entry
                .read_to_string(&mut xml)
                .map_err(|e| InvoiceError::TemplateRender(format!("cannot read {name}: {e}")))?;
            let rendered = render_part(&name, &xml, &context)?;
            rendered_parts += 1;

            writer
                .start_file(name.as_str(), options)
                .map_err(|e| InvoiceError::internal("failed to write DOCX entry", e))?;
            writer
                .write_all(rendered.as_bytes())
                .map_err(|e| InvoiceError::internal("failed to write DOCX entry", e))?;
        }

        if rendered_parts == 0 {
            return Err(InvoiceError::TemplateRender(
                "template has no word/document.xml part".to_string(),
            ));
        }

        let mut inner = writer
            .finish()
            .map_err(|e| InvoiceError::internal("failed to finish rendered document", e))?;
        inner
            .flush()
            .map_err(|e| InvoiceError::internal("failed to flush rendered document", e))?;

        log::debug!(
            "Rendered {} template part(s) into {}",
            rendered_parts,
            output_path.display()
        );
        Ok(output_path.to_path_buf())
    }
}

fn render_part(name: &str, xml: &str, context: &Context) -> Result<String, InvoiceError> {
    let source = prepare_template_xml(xml);

    let mut tera = Tera::default();
    tera.autoescape_on(vec![".xml"]);
    tera.set_escape_fn(escape_xml);
    tera.add_raw_template(name, &source)
        .map_err(|e| InvoiceError::TemplateRender(format!("{name}: {}", error_chain(&e))))?;

    tera.render(name, context)
        .map_err(|e| InvoiceError::TemplateRender(format!("{name}: {}", error_chain(&e))))
}

fn escape_xml(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

/// Tera nests the useful part of a message in `source()`; flatten it.
fn error_chain(err: &dyn std::error::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
