//! The single owner of the invoice being edited.
//!
//! Every change goes through [`AppState`]: the next record is produced from
//! the current one plus the edit, swapped in, and written to storage in full
//! before the call returns.

use tracing::{debug, info, warn};

use crate::document::{DocumentOptions, DocumentView, build_document};
use crate::model::{AccountField, BankField, InvoiceRecord, ItemField, SenderField};
use crate::storage::{
    ALL_KEYS, RECORD_KEY, SHOW_EMAIL_KEY, SHOW_TAX_REGISTRATION_KEY, Storage, load_json, save_json,
};

/// One edit made in the form.
#[derive(Debug, Clone, PartialEq)]
pub enum FormEdit {
    IssueDate(String),
    Recipient(String),
    Sender(SenderField, String),
    Bank(BankField, String),
    Account(AccountField, String),
    Item(u32, ItemField, String),
    AddItem,
    RemoveItem(u32),
}

pub struct AppState {
    record: InvoiceRecord,
    show_tax_registration: bool,
    show_email: bool,
    store: Box<dyn Storage>,
}

impl AppState {
    /// Hydrates each entry independently, falling back to defaults.
    pub fn load(store: Box<dyn Storage>) -> Self {
        let record = load_json::<InvoiceRecord>(store.as_ref(), RECORD_KEY)
            .map(InvoiceRecord::normalized)
            .unwrap_or_default();
        let defaults = DocumentOptions::default();
        let show_tax_registration = load_json::<bool>(store.as_ref(), SHOW_TAX_REGISTRATION_KEY)
            .unwrap_or(defaults.show_tax_registration);
        let show_email =
            load_json::<bool>(store.as_ref(), SHOW_EMAIL_KEY).unwrap_or(defaults.show_email);

        debug!(
            items = record.items.len(),
            show_tax_registration, show_email, "loaded editor state"
        );

        Self {
            record,
            show_tax_registration,
            show_email,
            store,
        }
    }

    pub fn record(&self) -> &InvoiceRecord {
        &self.record
    }

    pub fn show_tax_registration(&self) -> bool {
        self.show_tax_registration
    }

    pub fn show_email(&self) -> bool {
        self.show_email
    }

    pub fn options(&self) -> DocumentOptions {
        DocumentOptions {
            show_tax_registration: self.show_tax_registration,
            show_email: self.show_email,
        }
    }

    pub fn total(&self) -> f64 {
        self.record.total()
    }

    pub fn document(&self) -> DocumentView {
        build_document(&self.record, self.options(), self.total())
    }

    /// Applies one form edit. Returns false when the edit was refused
    /// (removing the last row), in which case nothing is written.
    pub fn apply(&mut self, edit: FormEdit) -> bool {
        let current = &self.record;
        let next = match edit {
            FormEdit::IssueDate(value) => current.with_issue_date(value),
            FormEdit::Recipient(value) => current.with_recipient(value),
            FormEdit::Sender(field, value) => current.with_sender_field(field, value),
            FormEdit::Bank(field, value) => current.with_bank_field(field, value),
            FormEdit::Account(field, value) => current.with_account_field(field, value),
            FormEdit::Item(id, field, value) => current.with_item_field(id, field, value),
            FormEdit::AddItem => current.with_added_item(),
            FormEdit::RemoveItem(id) => match current.without_item(id) {
                Some(next) => next,
                None => {
                    debug!(id, "refusing to remove the last row");
                    return false;
                }
            },
        };
        self.replace_record(next);
        true
    }

    pub fn set_show_tax_registration(&mut self, show: bool) {
        self.show_tax_registration = show;
        self.persist(SHOW_TAX_REGISTRATION_KEY, &show);
    }

    pub fn set_show_email(&mut self, show: bool) {
        self.show_email = show;
        self.persist(SHOW_EMAIL_KEY, &show);
    }

    /// Back to the default invoice with both flags on; stored entries are dropped.
    pub fn reset(&mut self) {
        let defaults = DocumentOptions::default();
        self.record = InvoiceRecord::default();
        self.show_tax_registration = defaults.show_tax_registration;
        self.show_email = defaults.show_email;
        for key in ALL_KEYS {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "could not clear stored entry");
            }
        }
        info!("editor state reset to defaults");
    }

    fn replace_record(&mut self, next: InvoiceRecord) {
        self.record = next;
        self.persist(RECORD_KEY, &self.record);
    }

    fn persist<T: serde::Serialize>(&self, key: &str, value: &T) {
        if let Err(e) = save_json(self.store.as_ref(), key, value) {
            warn!(key, error = %e, "could not persist change, keeping it in memory only");
        }
    }
}
