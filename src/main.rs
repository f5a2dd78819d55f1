mod amount;
mod document;
mod error;
mod export;
mod gui;
mod model;
mod raster;
mod render;
mod report;
mod settings;
mod state;
mod storage;
mod template;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inquire::Confirm;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::export::{
    ExportKind, ExportOutcome, ExportPipeline, ExportRequest, FolderDownloads, NoShareSheet,
};
use crate::raster::PdftoppmRasterizer;
use crate::render::TypstRenderer;
use crate::settings::{AppSettings, load_settings, setup_config_wizard};
use crate::state::AppState;
use crate::storage::FileStore;
use crate::template::InvoiceTemplate;

// ==========================================
// CLI
// ==========================================

#[derive(Parser)]
#[command(name = "invoice-editor", version, about = "Single-page invoice editor")]
struct Cli {
    /// Data directory to use instead of the configured one
    #[arg(long, global = true)]
    data_root: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Export the saved invoice (pdf or png)
    Export { format: ExportKind },
    /// Print the saved invoice
    Show,
    /// Restore the initial invoice and display options
    Reset {
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Configure data directory and fonts
    Config,
}

// ==========================================
// Main Function
// ==========================================

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    let mut settings = load_settings();
    if let Some(root) = cli.data_root {
        settings.data_root = root;
    }
    debug!(root = %settings.root().display(), "using data directory");

    match cli.command {
        None => {
            let state = open_state(&settings)?;
            gui::run(state, build_pipeline(&settings)?, settings.ui_font())
        }
        Some(Commands::Export { format }) => export(&settings, format),
        Some(Commands::Show) => {
            show(&open_state(&settings)?);
            Ok(())
        }
        Some(Commands::Reset { yes }) => reset(open_state(&settings)?, yes),
        Some(Commands::Config) => {
            setup_config_wizard()?;
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

// ==========================================
// Wiring
// ==========================================

fn open_state(settings: &AppSettings) -> Result<AppState> {
    let store = FileStore::open(settings.storage_dir()).context("failed to open storage")?;
    Ok(AppState::load(Box::new(store)))
}

fn build_pipeline(settings: &AppSettings) -> Result<ExportPipeline> {
    let dir = settings.template_dir();
    let template = match InvoiceTemplate::load(&dir) {
        Ok(template) => template,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "custom template unusable, using built-in layout");
            InvoiceTemplate::builtin().context("built-in template is invalid")?
        }
    }
    .with_font_family(settings.font_family.clone());
    let renderer =
        TypstRenderer::new(&settings.typst_bin, template).with_font_dir(settings.font_dir());

    Ok(ExportPipeline::new(
        Arc::new(renderer),
        Arc::new(PdftoppmRasterizer::new(&settings.pdftoppm_bin)),
        Arc::new(NoShareSheet),
        Arc::new(FolderDownloads::new(
            settings.output_dir(),
            settings.reveal_exports,
        )),
    ))
}

// ==========================================
// Commands
// ==========================================

fn export(settings: &AppSettings, kind: ExportKind) -> Result<()> {
    let state = open_state(settings)?;
    let pipeline = build_pipeline(settings)?;
    let request = ExportRequest::from_state(&state);

    match pipeline.run(kind, &request) {
        Ok(ExportOutcome::Saved(path)) => println!("✅ Saved: {}", path.display()),
        Ok(ExportOutcome::Shared(name)) => println!("✅ Shared: {name}"),
        Err(e) => {
            eprintln!("❌ {}", kind.failure_message());
            return Err(e.into());
        }
    }
    Ok(())
}

fn show(state: &AppState) {
    let view = state.document();
    for line in report::summary_lines(&view) {
        println!("{line}");
    }
    println!("{}", report::items_table(&view));
}

fn reset(mut state: AppState, yes: bool) -> Result<()> {
    let confirmed = yes
        || Confirm::new(gui::RESET_PROMPT)
            .with_default(false)
            .prompt()?;

    if confirmed {
        state.reset();
        info!("invoice reset to initial values");
        println!("✅ Reset to initial values.");
    } else {
        println!("Cancelled.");
    }
    Ok(())
}
