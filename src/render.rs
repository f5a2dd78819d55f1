//! Document view -> PDF bytes.

use std::fs;
use std::path::PathBuf;
use std::process::Command;

use tracing::{debug, info};

use crate::document::DocumentView;
use crate::error::RenderError;
use crate::template::InvoiceTemplate;

/// Produces the binary document for a laid-out invoice.
pub trait DocumentRenderer: Send + Sync {
    fn render(&self, view: &DocumentView) -> Result<Vec<u8>, RenderError>;
}

/// Compiles the templated markup with the `typst` command line tool.
pub struct TypstRenderer {
    binary: PathBuf,
    font_dir: Option<PathBuf>,
    template: InvoiceTemplate,
}

impl TypstRenderer {
    pub fn new(binary: impl Into<PathBuf>, template: InvoiceTemplate) -> Self {
        Self {
            binary: binary.into(),
            font_dir: None,
            template,
        }
    }

    pub fn with_font_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.font_dir = dir;
        self
    }

    /// Typst markup for the view, as handed to the compiler.
    pub fn source(&self, view: &DocumentView) -> Result<String, RenderError> {
        self.template.render(view)
    }
}

impl DocumentRenderer for TypstRenderer {
    fn render(&self, view: &DocumentView) -> Result<Vec<u8>, RenderError> {
        let source = self.source(view)?;

        let workdir = tempfile::tempdir()?;
        let typ_path = workdir.path().join("invoice.typ");
        let pdf_path = workdir.path().join("invoice.pdf");
        fs::write(&typ_path, source)?;

        let mut command = Command::new(&self.binary);
        command.arg("compile");
        if let Some(dir) = &self.font_dir {
            command.arg("--font-path").arg(dir);
        }
        command.arg(&typ_path).arg(&pdf_path);

        debug!(binary = %self.binary.display(), "compiling invoice");
        let output = command.output().map_err(|source| RenderError::Launch {
            binary: self.binary.display().to_string(),
            source,
        })?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RenderError::Compile(if stderr.is_empty() {
                format!("exited with {}", output.status)
            } else {
                stderr
            }));
        }

        let bytes = fs::read(&pdf_path)?;
        info!(bytes = bytes.len(), "PDF generated");
        Ok(bytes)
    }
}
