//! Print layout of an invoice.
//!
//! [`build_document`] maps a record onto the fixed blocks of the A4 page.
//! It has no state and no side effects; the total is passed in so the
//! printed figure is the same number the editor shows.

use serde::Serialize;

use crate::amount::format_yen;
use crate::model::{InvoiceRecord, ORDINARY_ACCOUNT};

pub const TITLE: &str = "請求書";
/// Tax rate label printed on every row when the registration number is shown.
pub const TAX_RATE_LABEL: &str = "10%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DocumentOptions {
    pub show_tax_registration: bool,
    pub show_email: bool,
}

/// Both optional parts shown, as on first launch and after a reset.
impl Default for DocumentOptions {
    fn default() -> Self {
        Self {
            show_tax_registration: true,
            show_email: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSpec {
    pub paper: &'static str,
    pub margin_pt: u32,
    pub font_size_pt: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabeledValue {
    pub label: &'static str,
    pub value: String,
}

impl LabeledValue {
    fn new(label: &'static str, value: impl Into<String>) -> Self {
        Self {
            label,
            value: value.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TotalDue {
    pub lead: &'static str,
    pub heading: &'static str,
    pub amount: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BankBlock {
    pub label: &'static str,
    pub bank_name: String,
    pub account_type: &'static str,
    pub account_number: String,
    pub account_holder: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Date,
    Content,
    Quantity,
    Unit,
    UnitPrice,
    TaxRate,
    Amount,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub kind: ColumnKind,
    pub header: &'static str,
    pub width_pct: u32,
    pub align: Align,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemTable {
    pub columns: Vec<Column>,
    pub rows: Vec<Vec<String>>,
    pub total_label: &'static str,
    pub total: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentView {
    pub page: PageSpec,
    pub title: &'static str,
    pub issue_date: LabeledValue,
    pub recipient: String,
    pub sender: Vec<LabeledValue>,
    pub registration: Option<String>,
    pub total_due: TotalDue,
    pub bank: BankBlock,
    pub table: ItemTable,
    pub account: Vec<LabeledValue>,
}

const COLUMNS: [Column; 7] = [
    Column { kind: ColumnKind::Date, header: "日付", width_pct: 12, align: Align::Center },
    Column { kind: ColumnKind::Content, header: "内容", width_pct: 35, align: Align::Left },
    Column { kind: ColumnKind::Quantity, header: "数量", width_pct: 8, align: Align::Center },
    Column { kind: ColumnKind::Unit, header: "単位", width_pct: 8, align: Align::Center },
    Column { kind: ColumnKind::UnitPrice, header: "単価", width_pct: 12, align: Align::Right },
    Column { kind: ColumnKind::TaxRate, header: "税率", width_pct: 8, align: Align::Center },
    Column { kind: ColumnKind::Amount, header: "金額(税込)", width_pct: 17, align: Align::Right },
];

pub fn build_document(record: &InvoiceRecord, options: DocumentOptions, total: f64) -> DocumentView {
    let total = format_yen(total);

    let columns: Vec<Column> = COLUMNS
        .iter()
        .filter(|c| options.show_tax_registration || c.kind != ColumnKind::TaxRate)
        .cloned()
        .collect();

    let rows = record
        .items
        .iter()
        .map(|item| {
            columns
                .iter()
                .map(|c| match c.kind {
                    ColumnKind::Date => item.date.clone(),
                    ColumnKind::Content => item.content.clone(),
                    ColumnKind::Quantity => item.quantity.display().to_string(),
                    ColumnKind::Unit => item.unit.clone(),
                    ColumnKind::UnitPrice => item.unit_price.display().to_string(),
                    ColumnKind::TaxRate => TAX_RATE_LABEL.to_string(),
                    ColumnKind::Amount if item.has_amount() => format_yen(item.amount()),
                    ColumnKind::Amount => String::new(),
                })
                .collect()
        })
        .collect();

    let mut account = vec![
        LabeledValue::new("アカウント名", &record.account_info.display_name),
        LabeledValue::new("ID @", &record.account_info.handle),
    ];
    if options.show_email {
        account.push(LabeledValue::new(
            "メール",
            record.account_info.email.clone().unwrap_or_default(),
        ));
    }

    DocumentView {
        page: PageSpec {
            paper: "a4",
            margin_pt: 30,
            font_size_pt: 10,
        },
        title: TITLE,
        issue_date: LabeledValue::new("発行日", &record.issue_date),
        recipient: record.recipient.clone(),
        sender: vec![
            LabeledValue::new("氏名", &record.sender.name),
            LabeledValue::new("〒", &record.sender.postal_code),
            LabeledValue::new("住所", &record.sender.address),
        ],
        registration: options
            .show_tax_registration
            .then(|| format!("登録番号: {}", record.sender.tax_registration_number)),
        total_due: TotalDue {
            lead: "下記の通り、ご請求申し上げます。",
            heading: "ご請求金額 (税込)",
            amount: total.clone(),
        },
        bank: BankBlock {
            label: "振込先",
            bank_name: record.bank_info.bank_name.clone(),
            account_type: ORDINARY_ACCOUNT,
            account_number: record.bank_info.account_number.clone(),
            account_holder: record.bank_info.account_holder.clone(),
        },
        table: ItemTable {
            columns,
            rows,
            total_label: "合計",
            total,
        },
        account,
    }
}
