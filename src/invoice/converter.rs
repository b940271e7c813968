//! Headless LibreOffice conversion.
//!
//! Finds the `soffice` executable and runs it once per call to turn a DOCX
//! into a PDF. The timeout covers the process and every pipe it or its
//! descendants hold open; on expiry the whole process tree is killed.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

use super::process_tree::{self, ProcessTree};
use super::workspace::PROFILE_DIR;
use super::InvoiceError;

const SOFFICE_PROGRAM: &str = "soffice";
const MAX_DIAGNOSTIC_BYTES: usize = 4096;

#[cfg(target_os = "linux")]
const WELL_KNOWN_LOCATIONS: &[&str] = &[
    "/usr/bin/soffice",
    "/usr/local/bin/soffice",
    "/snap/bin/libreoffice",
    "/usr/lib/libreoffice/program/soffice",
    "/opt/libreoffice/program/soffice",
];

#[cfg(target_os = "macos")]
const WELL_KNOWN_LOCATIONS: &[&str] = &["/Applications/LibreOffice.app/Contents/MacOS/soffice"];

#[cfg(target_os = "windows")]
const WELL_KNOWN_LOCATIONS: &[&str] = &[
    r"C:\Program Files\LibreOffice\program\soffice.exe",
    r"C:\Program Files (x86)\LibreOffice\program\soffice.exe",
];

#[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
const WELL_KNOWN_LOCATIONS: &[&str] = &[];

/// Per-platform install locations checked after the `PATH` lookup.
pub fn well_known_locations() -> Vec<PathBuf> {
    WELL_KNOWN_LOCATIONS.iter().map(PathBuf::from).collect()
}

/// Resolve the converter executable.
///
/// Priority: explicit override, then `path_lookup`, then the first
/// candidate for which `is_file` holds. An override that is not a file is
/// ignored with a warning.
pub fn discover_executable(
    override_path: Option<&Path>,
    path_lookup: impl FnOnce() -> Option<PathBuf>,
    candidates: &[PathBuf],
    is_file: impl Fn(&Path) -> bool,
) -> Option<PathBuf> {
    if let Some(path) = override_path {
        if is_file(path) {
            return Some(path.to_path_buf());
        }
        log::warn!(
            "LIBREOFFICE_PATH is set to {} but it is not a file, falling back to discovery",
            path.display()
        );
    }

    if let Some(path) = path_lookup() {
        return Some(path);
    }

    candidates.iter().find(|p| is_file(p)).cloned()
}

/// Discovery configuration for the converter executable.
#[derive(Debug, Clone)]
pub struct ExecutableLocator {
    pub override_path: Option<PathBuf>,
    pub program: String,
    pub candidates: Vec<PathBuf>,
}

impl ExecutableLocator {
    pub fn new(override_path: Option<PathBuf>) -> Self {
        Self {
            override_path,
            program: SOFFICE_PROGRAM.to_string(),
            candidates: well_known_locations(),
        }
    }

    pub fn locate(&self) -> Option<PathBuf> {
        discover_executable(
            self.override_path.as_deref(),
            || which::which(&self.program).ok(),
            &self.candidates,
            Path::is_file,
        )
    }
}

/// Converts a document into a PDF inside `output_dir`, returning the PDF path.
#[async_trait]
pub trait DocumentConverter: Send + Sync {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, InvoiceError>;

    /// Whether the converter could run right now.
    fn is_available(&self) -> bool {
        true
    }
}

/// `DocumentConverter` backed by `soffice --headless --convert-to pdf`.
#[derive(Debug, Clone)]
pub struct LibreOfficeConverter {
    locator: ExecutableLocator,
    timeout: Duration,
}

impl LibreOfficeConverter {
    pub fn new(locator: ExecutableLocator, timeout: Duration) -> Self {
        Self { locator, timeout }
    }

    fn build_command(soffice: &Path, input: &Path, output_dir: &Path) -> Command {
        let mut cmd = Command::new(soffice);
        cmd.arg("--headless")
            .arg("--norestore")
            .arg("--nolockcheck")
            .arg("--nodefault")
            .arg("--convert-to")
            .arg("pdf:writer_pdf_Export")
            .arg("--outdir")
            .arg(output_dir)
            .arg(user_installation_arg(&output_dir.join(PROFILE_DIR)))
            .arg(input);

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.kill_on_drop(true);
        process_tree::isolate(&mut cmd);
        cmd
    }
}

#[async_trait]
impl DocumentConverter for LibreOfficeConverter {
    async fn convert(&self, input: &Path, output_dir: &Path) -> Result<PathBuf, InvoiceError> {
        let locator = self.locator.clone();
        let soffice = tokio::task::spawn_blocking(move || locator.locate())
            .await
            .map_err(|e| InvoiceError::internal("executable lookup failed", e))?
            .ok_or(InvoiceError::ExecutableNotFound)?;
        let mut cmd = Self::build_command(&soffice, input, output_dir);

        log::info!(
            "Running LibreOffice: {} --convert-to pdf --outdir {} {}",
            soffice.display(),
            output_dir.display(),
            input.display()
        );

        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                InvoiceError::ExecutableNotFound
            } else {
                InvoiceError::internal("failed to spawn LibreOffice", e)
            }
        })?;
        let tree = ProcessTree::attach(&child);

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();
        let run = async {
            let (status, stdout, stderr) =
                tokio::join!(child.wait(), read_all(stdout_pipe), read_all(stderr_pipe));
            status.map(|status| (status, stdout, stderr))
        };

        let outcome = tokio::time::timeout(self.timeout, run).await;
        let (status, stdout, stderr) = match outcome {
            Ok(Ok(finished)) => finished,
            Ok(Err(e)) => return Err(InvoiceError::internal("failed to wait for LibreOffice", e)),
            Err(_) => {
                tree.terminate(&mut child).await;
                log::error!(
                    "LibreOffice conversion of {} timed out after {:?}",
                    input.display(),
                    self.timeout
                );
                return Err(InvoiceError::ConversionTimeout {
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        if !status.success() {
            let output = diagnostic_output(&stdout, &stderr);
            log::error!("LibreOffice failed: {}", output);
            return Err(InvoiceError::ConversionFailed {
                code: status.code().unwrap_or(-1),
                output,
            });
        }

        let pdf_path = expected_output_path(input, output_dir)?;
        if !tokio::fs::try_exists(&pdf_path).await.unwrap_or(false) {
            log::error!(
                "LibreOffice exited successfully but {} is missing; output: {}",
                pdf_path.display(),
                diagnostic_output(&stdout, &stderr)
            );
            return Err(InvoiceError::OutputMissing(pdf_path.display().to_string()));
        }

        log::debug!("LibreOffice produced {}", pdf_path.display());
        Ok(pdf_path)
    }

    fn is_available(&self) -> bool {
        self.locator.locate().is_some()
    }
}

/// `<output_dir>/<input stem>.pdf`
pub fn expected_output_path(input: &Path, output_dir: &Path) -> Result<PathBuf, InvoiceError> {
    let stem = input.file_stem().ok_or_else(|| {
        InvoiceError::Internal(format!("invalid input filename: {}", input.display()))
    })?;
    let mut filename = stem.to_os_string();
    filename.push(".pdf");
    Ok(output_dir.join(filename))
}

fn user_installation_arg(profile_dir: &Path) -> String {
    let path = profile_dir.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("-env:UserInstallation=file://{}", path)
    } else {
        format!("-env:UserInstallation=file:///{}", path)
    }
}

async fn read_all<R: AsyncRead + Unpin>(pipe: Option<R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        let _ = pipe.read_to_end(&mut buf).await;
    }
    buf
}

/// stderr if it has content, else stdout, capped to a few KiB.
fn diagnostic_output(stdout: &[u8], stderr: &[u8]) -> String {
    let raw = if stderr.iter().any(|b| !b.is_ascii_whitespace()) {
        stderr
    } else {
        stdout
    };
    let text = String::from_utf8_lossy(raw).trim().to_string();
    truncate_output(text)
}

fn truncate_output(mut output: String) -> String {
    if output.len() > MAX_DIAGNOSTIC_BYTES {
        let mut cut = MAX_DIAGNOSTIC_BYTES;
        while !output.is_char_boundary(cut) {
            cut -= 1;
        }
        output.truncate(cut);
        output.push_str("…[truncated]");
    }
    output
}
