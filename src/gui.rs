//! The editor window.
//!
//! Widgets never write to [`AppState`] directly. Each frame collects the
//! edits the user made into a list of [`FormEdit`]s and applies them once the
//! UI pass is over, so a frame always draws one consistent record.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use chrono::Local;
use eframe::egui::{self, Align, Color32, Layout, RichText};
use tracing::{error, info, warn};

use crate::amount::format_yen;
use crate::document::{TAX_RATE_LABEL, TITLE};
use crate::error::ExportError;
use crate::export::{ExportKind, ExportOutcome, ExportPipeline, ExportRequest};
use crate::model::{AccountField, BankField, ItemField, ORDINARY_ACCOUNT, SenderField};
use crate::state::{AppState, FormEdit};

pub const WINDOW_TITLE: &str = "請求書作成";
pub const RESET_PROMPT: &str = "入力内容を初期状態に戻しますか？";

const ACCENT: Color32 = Color32::from_rgb(37, 99, 235);
const UI_FONT_NAME: &str = "ui-font";

/// Issue date as shown on the invoice, e.g. `2026年 01月01日`.
pub fn date_label(date: chrono::NaiveDate) -> String {
    date.format("%Y年 %m月%d日").to_string()
}

struct ExportReport {
    kind: ExportKind,
    result: Result<ExportOutcome, ExportError>,
}

pub struct EditorApp {
    state: AppState,
    pipeline: ExportPipeline,
    reports_tx: Sender<ExportReport>,
    reports_rx: Receiver<ExportReport>,
    running_exports: usize,
    confirm_reset: bool,
    alert: Option<String>,
    status: Option<String>,
}

impl EditorApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        state: AppState,
        pipeline: ExportPipeline,
        ui_font: Option<&Path>,
    ) -> Self {
        if let Some(path) = ui_font {
            install_ui_font(&cc.egui_ctx, path);
        }
        let (reports_tx, reports_rx) = mpsc::channel();
        Self {
            state,
            pipeline,
            reports_tx,
            reports_rx,
            running_exports: 0,
            confirm_reset: false,
            alert: None,
            status: None,
        }
    }

    fn start_export(&mut self, kind: ExportKind, ctx: &egui::Context) {
        let request = ExportRequest::from_state(&self.state);
        let pipeline = self.pipeline.clone();
        let tx = self.reports_tx.clone();
        let ctx = ctx.clone();

        let spawned = thread::Builder::new()
            .name(format!("export-{}", kind.extension()))
            .spawn(move || {
                let result = pipeline.run(kind, &request);
                // the window may already be closed
                let _ = tx.send(ExportReport { kind, result });
                ctx.request_repaint();
            });

        match spawned {
            Ok(_) => {
                self.running_exports += 1;
                info!(?kind, "export started");
            }
            Err(e) => {
                error!(?kind, error = %e, "could not start export thread");
                self.alert = Some(kind.failure_message().to_string());
            }
        }
    }

    fn collect_reports(&mut self) {
        while let Ok(report) = self.reports_rx.try_recv() {
            self.running_exports = self.running_exports.saturating_sub(1);
            match report.result {
                Ok(ExportOutcome::Saved(path)) => {
                    self.status = Some(format!("保存しました: {}", path.display()));
                }
                Ok(ExportOutcome::Shared(name)) => {
                    self.status = Some(format!("共有しました: {name}"));
                }
                Err(e) => {
                    error!(kind = ?report.kind, error = %e, "export failed");
                    self.alert = Some(report.kind.failure_message().to_string());
                }
            }
        }
    }

    fn toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal_wrapped(|ui| {
            ui.heading(WINDOW_TITLE);
            ui.separator();

            if ui.button("リセット").clicked() {
                self.confirm_reset = true;
            }

            let mut show_tax_registration = self.state.show_tax_registration();
            if ui.checkbox(&mut show_tax_registration, "インボイス").changed() {
                self.state.set_show_tax_registration(show_tax_registration);
            }
            let mut show_email = self.state.show_email();
            if ui.checkbox(&mut show_email, "メール").changed() {
                self.state.set_show_email(show_email);
            }

            ui.separator();
            if ui.button("画像").clicked() {
                self.start_export(ExportKind::Png, ui.ctx());
            }
            if ui.button("PDF").clicked() {
                self.start_export(ExportKind::Pdf, ui.ctx());
            }
            if self.running_exports > 0 {
                ui.spinner();
            }
        });
    }

    fn form(&self, ui: &mut egui::Ui, edits: &mut Vec<FormEdit>) {
        let record = self.state.record();
        let show_tax_registration = self.state.show_tax_registration();
        let total = format_yen(self.state.total());

        ui.horizontal(|ui| {
            ui.label(RichText::new(TITLE).size(28.0).strong().color(ACCENT));
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.small_button("今日").clicked() {
                    edits.push(FormEdit::IssueDate(date_label(Local::now().date_naive())));
                }
                if let Some(value) = text_field(ui, &record.issue_date, 140.0) {
                    edits.push(FormEdit::IssueDate(value));
                }
                ui.label("発行日");
            });
        });
        ui.add_space(12.0);

        if let Some(value) = text_field(ui, &record.recipient, f32::INFINITY) {
            edits.push(FormEdit::Recipient(value));
        }
        ui.add_space(8.0);

        egui::Grid::new("sender").num_columns(2).show(ui, |ui| {
            for (label, field, value) in [
                ("氏名", SenderField::Name, &record.sender.name),
                ("〒", SenderField::PostalCode, &record.sender.postal_code),
            ] {
                ui.strong(label);
                if let Some(value) = text_field(ui, value, 320.0) {
                    edits.push(FormEdit::Sender(field, value));
                }
                ui.end_row();
            }
            ui.strong("住所");
            if let Some(value) = text_area(ui, &record.sender.address, 320.0) {
                edits.push(FormEdit::Sender(SenderField::Address, value));
            }
            ui.end_row();
        });

        if show_tax_registration {
            ui.horizontal(|ui| {
                ui.label("登録番号:");
                let number = &record.sender.tax_registration_number;
                if let Some(value) = text_field(ui, number, 160.0) {
                    edits.push(FormEdit::Sender(SenderField::TaxRegistrationNumber, value));
                }
            });
        }
        ui.add_space(12.0);

        ui.label("下記の通り、ご請求申し上げます。");
        egui::Frame::group(ui.style())
            .stroke(egui::Stroke::new(1.5, ACCENT))
            .show(ui, |ui| {
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new("ご請求金額 (税込)").strong().color(ACCENT));
                    ui.label(RichText::new(&total).size(30.0).strong());
                });
            });
        ui.add_space(12.0);

        ui.label(RichText::new("振込先").strong().color(ACCENT));
        egui::Grid::new("bank").num_columns(2).show(ui, |ui| {
            ui.strong("銀行");
            if let Some(value) = text_field(ui, &record.bank_info.bank_name, 240.0) {
                edits.push(FormEdit::Bank(BankField::BankName, value));
            }
            ui.end_row();

            ui.strong(ORDINARY_ACCOUNT);
            if let Some(value) = text_field(ui, &record.bank_info.account_number, 240.0) {
                edits.push(FormEdit::Bank(BankField::AccountNumber, value));
            }
            ui.end_row();

            ui.strong("名義");
            if let Some(value) = text_field(ui, &record.bank_info.account_holder, 240.0) {
                edits.push(FormEdit::Bank(BankField::AccountHolder, value));
            }
            ui.end_row();
        });
        ui.add_space(12.0);

        self.items_grid(ui, edits, &total);
        if ui.button("＋ 行を追加").clicked() {
            edits.push(FormEdit::AddItem);
        }
        ui.add_space(12.0);

        egui::Grid::new("account").num_columns(2).show(ui, |ui| {
            ui.strong("アカウント名");
            if let Some(value) = text_field(ui, &record.account_info.display_name, 320.0) {
                edits.push(FormEdit::Account(AccountField::DisplayName, value));
            }
            ui.end_row();

            ui.strong("ID @");
            if let Some(value) = text_field(ui, &record.account_info.handle, 320.0) {
                edits.push(FormEdit::Account(AccountField::Handle, value));
            }
            ui.end_row();

            if self.state.show_email() {
                ui.strong("メール");
                let email = record.account_info.email.as_deref().unwrap_or("");
                if let Some(value) = text_field(ui, email, 320.0) {
                    edits.push(FormEdit::Account(AccountField::Email, value));
                }
                ui.end_row();
            }
        });
    }

    fn items_grid(&self, ui: &mut egui::Ui, edits: &mut Vec<FormEdit>, total: &str) {
        let record = self.state.record();
        let show_tax_registration = self.state.show_tax_registration();
        let columns = self.state.document().table.columns;
        let removable = record.items.len() > 1;

        egui::Grid::new("items")
            .num_columns(columns.len() + 1)
            .striped(true)
            .show(ui, |ui| {
                for column in &columns {
                    ui.label(RichText::new(column.header).strong().color(ACCENT));
                }
                ui.label("");
                ui.end_row();

                for item in &record.items {
                    let cells = [
                        (ItemField::Date, item.date.as_str(), 80.0),
                        (ItemField::Content, item.content.as_str(), 240.0),
                        (ItemField::Quantity, item.quantity.raw(), 50.0),
                        (ItemField::Unit, item.unit.as_str(), 40.0),
                        (ItemField::UnitPrice, item.unit_price.raw(), 80.0),
                    ];
                    for (field, value, width) in cells {
                        if let Some(value) = text_field(ui, value, width) {
                            edits.push(FormEdit::Item(item.id, field, value));
                        }
                    }
                    if show_tax_registration {
                        ui.label(TAX_RATE_LABEL);
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        if item.has_amount() {
                            ui.label(format_yen(item.amount()));
                        }
                    });
                    let delete = ui.add_enabled(removable, egui::Button::new("✖"));
                    if delete.on_hover_text("この行を削除").clicked() {
                        edits.push(FormEdit::RemoveItem(item.id));
                    }
                    ui.end_row();
                }

                for _ in 0..columns.len().saturating_sub(2) {
                    ui.label("");
                }
                ui.label(RichText::new("合計").strong().color(ACCENT));
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    ui.strong(total);
                });
                ui.end_row();
            });
    }

    fn reset_dialog(&mut self, ctx: &egui::Context) {
        if !self.confirm_reset {
            return;
        }
        let mut confirmed = false;
        let mut dismissed = false;
        egui::Window::new("リセット")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(RESET_PROMPT);
                ui.horizontal(|ui| {
                    confirmed = ui.button("OK").clicked();
                    dismissed = ui.button("キャンセル").clicked();
                });
            });

        if confirmed {
            self.state.reset();
            self.status = None;
        }
        if confirmed || dismissed {
            self.confirm_reset = false;
        }
    }

    fn alert_dialog(&mut self, ctx: &egui::Context) {
        let Some(message) = &self.alert else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new("エラー")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                ui.label(message.as_str());
                dismissed = ui.button("OK").clicked();
            });
        if dismissed {
            self.alert = None;
        }
    }
}

impl eframe::App for EditorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.collect_reports();

        egui::TopBottomPanel::top("toolbar").show(ctx, |ui| self.toolbar(ui));
        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.label(self.status.as_deref().unwrap_or(""));
        });

        let mut edits = Vec::new();
        egui::CentralPanel::default().show(ctx, |ui| {
            egui::ScrollArea::vertical().show(ui, |ui| self.form(ui, &mut edits));
        });
        for edit in edits {
            self.state.apply(edit);
        }

        self.reset_dialog(ctx);
        self.alert_dialog(ctx);
    }
}

fn text_field(ui: &mut egui::Ui, value: &str, width: f32) -> Option<String> {
    let mut buffer = value.to_owned();
    let response = ui.add(egui::TextEdit::singleline(&mut buffer).desired_width(width));
    response.changed().then_some(buffer)
}

fn text_area(ui: &mut egui::Ui, value: &str, width: f32) -> Option<String> {
    let mut buffer = value.to_owned();
    let response = ui.add(
        egui::TextEdit::multiline(&mut buffer)
            .desired_rows(2)
            .desired_width(width),
    );
    response.changed().then_some(buffer)
}

/// Appends a font file to both families so Japanese text has glyphs.
fn install_ui_font(ctx: &egui::Context, path: &Path) {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "could not read UI font");
            return;
        }
    };
    let mut fonts = egui::FontDefinitions::default();
    fonts.font_data.insert(
        UI_FONT_NAME.to_owned(),
        Arc::new(egui::FontData::from_owned(bytes)),
    );
    for family in [egui::FontFamily::Proportional, egui::FontFamily::Monospace] {
        fonts
            .families
            .entry(family)
            .or_default()
            .push(UI_FONT_NAME.to_owned());
    }
    ctx.set_fonts(fonts);
    info!(path = %path.display(), "UI font installed");
}

/// Opens the editor window and blocks until it is closed.
pub fn run(state: AppState, pipeline: ExportPipeline, ui_font: Option<PathBuf>) -> anyhow::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size([980.0, 1080.0]),
        ..Default::default()
    };
    eframe::run_native(
        "invoice-editor",
        options,
        Box::new(move |cc| {
            Ok(Box::new(EditorApp::new(
                cc,
                state,
                pipeline,
                ui_font.as_deref(),
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("editor window failed: {e}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    #[test]
    fn date_label_matches_default_issue_date_format() {
        let date = NaiveDate::from_ymd_opt(2026, 1, 1).unwrap();
        assert_eq!(date_label(date), "2026年 01月01日");
        let date = NaiveDate::from_ymd_opt(2026, 12, 24).unwrap();
        assert_eq!(date_label(date), "2026年 12月24日");
    }
}
