//! Export pipeline: PDF download and PNG share/download.
//!
//! Both exports work on an owned [`ExportRequest`] snapshot, so they can run
//! on their own thread while the editor keeps going, and never touch the
//! live state or its storage.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use tracing::{info, warn};

use crate::document::{DocumentOptions, DocumentView, build_document};
use crate::error::{ExportError, ShareError};
use crate::model::InvoiceRecord;
use crate::raster::Rasterizer;
use crate::render::DocumentRenderer;
use crate::state::AppState;

pub const IMAGE_SCALE: f32 = 3.0;
pub const SHARE_TITLE: &str = "請求書";
pub const IMAGE_EXPORT_FAILED: &str = "画像の生成に失敗しました。";
pub const DOCUMENT_EXPORT_FAILED: &str = "PDFの生成に失敗しました。";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    Pdf,
    Png,
}

impl ExportKind {
    pub fn extension(&self) -> &'static str {
        match self {
            ExportKind::Pdf => "pdf",
            ExportKind::Png => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            ExportKind::Pdf => "application/pdf",
            ExportKind::Png => "image/png",
        }
    }

    /// The one message shown to the user when this export fails.
    pub fn failure_message(&self) -> &'static str {
        match self {
            ExportKind::Pdf => DOCUMENT_EXPORT_FAILED,
            ExportKind::Png => IMAGE_EXPORT_FAILED,
        }
    }
}

impl std::str::FromStr for ExportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pdf" => Ok(ExportKind::Pdf),
            "png" | "image" => Ok(ExportKind::Png),
            other => Err(format!("Unknown export format: {}", other)),
        }
    }
}

/// `invoice_<recipient>` without extension.
pub fn base_name(recipient: &str) -> String {
    format!("invoice_{recipient}")
}

pub fn file_name(recipient: &str, kind: ExportKind) -> String {
    format!("{}.{}", base_name(recipient), kind.extension())
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportRequest {
    pub record: InvoiceRecord,
    pub options: DocumentOptions,
}

impl ExportRequest {
    pub fn from_state(state: &AppState) -> Self {
        Self {
            record: state.record().clone(),
            options: state.options(),
        }
    }

    pub fn document(&self) -> DocumentView {
        build_document(&self.record, self.options, self.record.total())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SharedFile {
    pub name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Native file sharing, where the platform has one.
pub trait ShareSheet: Send + Sync {
    fn is_available(&self) -> bool;
    fn can_share(&self, file: &SharedFile) -> bool;
    fn share(&self, file: &SharedFile, title: &str, text: &str) -> Result<(), ShareError>;
}

/// Desktop builds have no share sheet; every image goes straight to disk.
pub struct NoShareSheet;

impl ShareSheet for NoShareSheet {
    fn is_available(&self) -> bool {
        false
    }

    fn can_share(&self, _file: &SharedFile) -> bool {
        false
    }

    fn share(&self, _file: &SharedFile, _title: &str, _text: &str) -> Result<(), ShareError> {
        Err(ShareError::Unsupported)
    }
}

/// Where finished artifacts are delivered.
pub trait Downloads: Send + Sync {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError>;
}

/// Saves artifacts into a folder, optionally revealing them afterwards.
pub struct FolderDownloads {
    dir: PathBuf,
    reveal: bool,
}

impl FolderDownloads {
    pub fn new(dir: impl Into<PathBuf>, reveal: bool) -> Self {
        Self {
            dir: dir.into(),
            reveal,
        }
    }
}

/// Path separators in the recipient would otherwise escape the folder.
fn sanitize_file_name(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '/' | '\\' | '\0' => '_',
            c => c,
        })
        .collect()
}

impl Downloads for FolderDownloads {
    fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
        let path = self.dir.join(sanitize_file_name(file_name));
        let save_err = |source| ExportError::Save {
            path: path.clone(),
            source,
        };

        fs::create_dir_all(&self.dir).map_err(save_err)?;
        // write beside the target and rename, so a failed write leaves nothing behind
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(save_err)?;
        tmp.write_all(bytes).map_err(save_err)?;
        tmp.persist(&path).map_err(|e| save_err(e.error))?;

        info!(path = %path.display(), bytes = bytes.len(), "export saved");
        if self.reveal {
            open_and_reveal(&path);
        }
        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportOutcome {
    Saved(PathBuf),
    Shared(String),
}

#[derive(Clone)]
pub struct ExportPipeline {
    renderer: Arc<dyn DocumentRenderer>,
    rasterizer: Arc<dyn Rasterizer>,
    share: Arc<dyn ShareSheet>,
    downloads: Arc<dyn Downloads>,
}

impl ExportPipeline {
    pub fn new(
        renderer: Arc<dyn DocumentRenderer>,
        rasterizer: Arc<dyn Rasterizer>,
        share: Arc<dyn ShareSheet>,
        downloads: Arc<dyn Downloads>,
    ) -> Self {
        Self {
            renderer,
            rasterizer,
            share,
            downloads,
        }
    }

    pub fn run(&self, kind: ExportKind, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
        match kind {
            ExportKind::Pdf => self.export_pdf(request),
            ExportKind::Png => self.export_png(request),
        }
    }

    pub fn export_pdf(&self, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
        let pdf = self.renderer.render(&request.document())?;
        let name = file_name(&request.record.recipient, ExportKind::Pdf);
        Ok(ExportOutcome::Saved(self.downloads.save(&name, &pdf)?))
    }

    pub fn export_png(&self, request: &ExportRequest) -> Result<ExportOutcome, ExportError> {
        let pdf = self.renderer.render(&request.document())?;
        let surface = self.rasterizer.rasterize(&pdf, 1, IMAGE_SCALE)?;
        let png = surface.encode_png()?;

        let recipient = &request.record.recipient;
        let file = SharedFile {
            name: file_name(recipient, ExportKind::Png),
            mime_type: ExportKind::Png.mime_type(),
            bytes: png,
        };

        if self.share.is_available() && self.share.can_share(&file) {
            match self.share.share(&file, SHARE_TITLE, &base_name(recipient)) {
                Ok(()) => {
                    info!(name = %file.name, "image shared");
                    return Ok(ExportOutcome::Shared(file.name));
                }
                Err(ShareError::Cancelled) => info!("share cancelled, saving instead"),
                Err(e) => warn!(error = %e, "share failed, saving instead"),
            }
        }

        Ok(ExportOutcome::Saved(self.downloads.save(&file.name, &file.bytes)?))
    }
}

/// Reveals a freshly written file in Finder/Explorer/the desktop file manager.
pub fn open_and_reveal(path: &Path) {
    #[cfg(target_os = "macos")]
    let result = Command::new("open").arg("-R").arg(path).spawn();

    #[cfg(target_os = "windows")]
    let result = Command::new("explorer")
        .arg(format!("/select,{}", path.to_string_lossy()))
        .spawn();

    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    let result = Command::new("xdg-open")
        .arg(path.parent().unwrap_or(path))
        .spawn();

    if let Err(e) = result {
        warn!(path = %path.display(), error = %e, "could not open file manager");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::error::{RasterError, RenderError};
    use crate::raster::RasterSurface;
    use crate::state::FormEdit;
    use crate::storage::MemoryStore;
    use pretty_assertions::assert_eq;

    struct FakeRenderer;

    impl DocumentRenderer for FakeRenderer {
        fn render(&self, view: &DocumentView) -> Result<Vec<u8>, RenderError> {
            Ok(format!("%PDF {} {}", view.recipient, view.table.total).into_bytes())
        }
    }

    #[derive(Default)]
    struct FakeRasterizer {
        fail: bool,
        calls: Mutex<Vec<(Vec<u8>, u32, f32)>>,
    }

    impl Rasterizer for FakeRasterizer {
        fn rasterize(&self, pdf: &[u8], page: u32, scale: f32) -> Result<RasterSurface, RasterError> {
            self.calls.lock().unwrap().push((pdf.to_vec(), page, scale));
            if self.fail {
                return Err(RasterError::Failed("corrupt document".into()));
            }
            Ok(RasterSurface {
                width: 1,
                height: 1,
                pixels: vec![255, 255, 255, 255],
            })
        }
    }

    struct FakeShare {
        reply: Result<(), ShareError>,
        shared: Mutex<Vec<(String, String, String)>>,
    }

    impl ShareSheet for FakeShare {
        fn is_available(&self) -> bool {
            true
        }

        fn can_share(&self, file: &SharedFile) -> bool {
            file.mime_type == "image/png"
        }

        fn share(&self, file: &SharedFile, title: &str, text: &str) -> Result<(), ShareError> {
            self.reply.clone()?;
            self.shared
                .lock()
                .unwrap()
                .push((file.name.clone(), title.to_string(), text.to_string()));
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingDownloads {
        saved: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl Downloads for RecordingDownloads {
        fn save(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, ExportError> {
            self.saved
                .lock()
                .unwrap()
                .push((file_name.to_string(), bytes.to_vec()));
            Ok(PathBuf::from("/downloads").join(file_name))
        }
    }

    struct Harness {
        rasterizer: Arc<FakeRasterizer>,
        share: Arc<FakeShare>,
        downloads: Arc<RecordingDownloads>,
        pipeline: ExportPipeline,
    }

    #[derive(Clone, Copy)]
    enum Share {
        Unsupported,
        Accept,
        Cancel,
        Fail,
    }

    fn harness(fail_raster: bool, mode: Share) -> Harness {
        let rasterizer = Arc::new(FakeRasterizer {
            fail: fail_raster,
            ..Default::default()
        });
        let share = Arc::new(FakeShare {
            reply: match mode {
                Share::Cancel => Err(ShareError::Cancelled),
                Share::Fail => Err(ShareError::Failed("no share target".into())),
                Share::Unsupported | Share::Accept => Ok(()),
            },
            shared: Mutex::new(Vec::new()),
        });
        let downloads = Arc::new(RecordingDownloads::default());
        let share_sheet: Arc<dyn ShareSheet> = match mode {
            Share::Unsupported => Arc::new(NoShareSheet),
            Share::Accept | Share::Cancel | Share::Fail => share.clone(),
        };
        let pipeline = ExportPipeline::new(
            Arc::new(FakeRenderer),
            rasterizer.clone(),
            share_sheet,
            downloads.clone(),
        );
        Harness {
            rasterizer,
            share,
            downloads,
            pipeline,
        }
    }

    fn request() -> ExportRequest {
        ExportRequest {
            record: InvoiceRecord::default(),
            options: DocumentOptions::default(),
        }
    }

    #[test]
    fn file_names_follow_recipient() {
        assert_eq!(file_name("株式会社○○ 御中", ExportKind::Pdf), "invoice_株式会社○○ 御中.pdf");
        assert_eq!(file_name("A", ExportKind::Png), "invoice_A.png");
        assert_eq!(sanitize_file_name("invoice_a/b\\c.pdf"), "invoice_a_b_c.pdf");
    }

    #[test]
    fn parses_export_kinds() {
        assert_eq!("PDF".parse::<ExportKind>(), Ok(ExportKind::Pdf));
        assert_eq!("image".parse::<ExportKind>(), Ok(ExportKind::Png));
        assert!("gif".parse::<ExportKind>().is_err());
    }

    #[test]
    fn pdf_export_saves_rendered_bytes() {
        let h = harness(false, Share::Unsupported);
        let outcome = h.pipeline.export_pdf(&request()).unwrap();

        assert_eq!(
            outcome,
            ExportOutcome::Saved(PathBuf::from("/downloads/invoice_株式会社○○ 御中.pdf"))
        );
        let saved = h.downloads.saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].1, "%PDF 株式会社○○ 御中 ¥3,000".as_bytes());
        assert!(h.rasterizer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn png_export_rasterizes_first_page_at_triple_scale() {
        let h = harness(false, Share::Unsupported);
        let outcome = h.pipeline.export_png(&request()).unwrap();

        assert_eq!(
            outcome,
            ExportOutcome::Saved(PathBuf::from("/downloads/invoice_株式会社○○ 御中.png"))
        );
        let calls = h.rasterizer.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, 1);
        assert_eq!(calls[0].2, 3.0);
        let saved = h.downloads.saved.lock().unwrap();
        assert_eq!(&saved[0].1[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[test]
    fn png_export_prefers_share_sheet() {
        let h = harness(false, Share::Accept);
        let outcome = h.pipeline.export_png(&request()).unwrap();

        assert_eq!(outcome, ExportOutcome::Shared("invoice_株式会社○○ 御中.png".into()));
        assert_eq!(
            h.share.shared.lock().unwrap().clone(),
            vec![(
                "invoice_株式会社○○ 御中.png".to_string(),
                "請求書".to_string(),
                "invoice_株式会社○○ 御中".to_string()
            )]
        );
        assert!(h.downloads.saved.lock().unwrap().is_empty());
    }

    #[test]
    fn cancelled_share_falls_back_to_download() {
        let h = harness(false, Share::Cancel);

        let outcome = h.pipeline.export_png(&request()).unwrap();
        assert!(matches!(outcome, ExportOutcome::Saved(_)));
        assert_eq!(h.downloads.saved.lock().unwrap().len(), 1);
        assert!(h.share.shared.lock().unwrap().is_empty());
    }

    #[test]
    fn failed_share_falls_back_to_download() {
        let h = harness(false, Share::Fail);

        let outcome = h.pipeline.export_png(&request()).unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::Saved(PathBuf::from("/downloads/invoice_株式会社○○ 御中.png"))
        );
        assert!(h.share.shared.lock().unwrap().is_empty());
    }

    #[test]
    fn desktop_share_sheet_reports_unsupported() {
        let file = SharedFile {
            name: "invoice_A.png".into(),
            mime_type: ExportKind::Png.mime_type(),
            bytes: Vec::new(),
        };
        assert!(!NoShareSheet.is_available());
        assert_eq!(NoShareSheet.share(&file, SHARE_TITLE, "invoice_A"), Err(ShareError::Unsupported));
    }

    #[test]
    fn raster_failure_is_one_error_and_leaves_state_alone() {
        let store = MemoryStore::new();
        let mut state = AppState::load(Box::new(store.clone()));
        state.apply(FormEdit::Recipient("テスト".into()));
        let stored_before = store.snapshot();
        let record_before = state.record().clone();

        let h = harness(true, Share::Unsupported);
        let err = h.pipeline.run(ExportKind::Png, &ExportRequest::from_state(&state));

        assert!(matches!(err, Err(ExportError::Raster(_))));
        assert_eq!(ExportKind::Png.failure_message(), "画像の生成に失敗しました。");
        assert!(h.downloads.saved.lock().unwrap().is_empty());
        assert_eq!(state.record(), &record_before);
        assert_eq!(store.snapshot(), stored_before);
    }

    #[test]
    fn both_exports_leave_request_untouched() {
        let h = harness(false, Share::Unsupported);
        let req = request();
        let before = req.clone();
        h.pipeline.run(ExportKind::Pdf, &req).unwrap();
        h.pipeline.run(ExportKind::Png, &req).unwrap();
        assert_eq!(req, before);
        assert_eq!(h.downloads.saved.lock().unwrap().len(), 2);
    }

    #[test]
    fn folder_downloads_write_atomically_into_dir() {
        let dir = tempfile::tempdir().unwrap();
        let downloads = FolderDownloads::new(dir.path().join("output"), false);
        let path = downloads.save("invoice_a/b.pdf", b"%PDF-1.7").unwrap();

        assert_eq!(path, dir.path().join("output").join("invoice_a_b.pdf"));
        assert_eq!(fs::read(&path).unwrap(), b"%PDF-1.7");
        let entries = fs::read_dir(dir.path().join("output")).unwrap().count();
        assert_eq!(entries, 1, "no temp files left behind");
    }
}
