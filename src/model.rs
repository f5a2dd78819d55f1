use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::amount::NumberText;

/// Account type printed next to the account number. Only ordinary accounts
/// are supported, so it is not part of the stored record.
pub const ORDINARY_ACCOUNT: &str = "普通";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sender {
    pub name: String,
    #[serde(alias = "zip")]
    pub postal_code: String,
    pub address: String,
    #[serde(alias = "regNumber")]
    pub tax_registration_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankInfo {
    pub bank_name: String,
    #[serde(alias = "number")]
    pub account_number: String,
    #[serde(alias = "holder")]
    pub account_holder: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(alias = "name")]
    pub display_name: String,
    #[serde(alias = "id")]
    pub handle: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub id: u32,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub quantity: NumberText,
    #[serde(default)]
    pub unit: String,
    #[serde(default, alias = "price")]
    pub unit_price: NumberText,
}

impl LineItem {
    pub fn blank(id: u32) -> Self {
        Self {
            id,
            date: String::new(),
            content: String::new(),
            quantity: NumberText::default(),
            unit: String::new(),
            unit_price: NumberText::default(),
        }
    }

    pub fn amount(&self) -> f64 {
        self.quantity.value() * self.unit_price.value()
    }

    /// Rows only show an amount once both quantity and price are filled in.
    pub fn has_amount(&self) -> bool {
        self.quantity.value() != 0.0 && self.unit_price.value() != 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceRecord {
    pub issue_date: String,
    pub recipient: String,
    pub sender: Sender,
    pub bank_info: BankInfo,
    pub items: Vec<LineItem>,
    pub account_info: AccountInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SenderField {
    Name,
    PostalCode,
    Address,
    TaxRegistrationNumber,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BankField {
    BankName,
    AccountNumber,
    AccountHolder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountField {
    DisplayName,
    Handle,
    Email,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemField {
    Date,
    Content,
    Quantity,
    Unit,
    UnitPrice,
}

impl Default for InvoiceRecord {
    fn default() -> Self {
        Self {
            issue_date: "2026年 01月01日".into(),
            recipient: "株式会社○○ 御中".into(),
            sender: Sender {
                name: "山田 花子".into(),
                postal_code: "000-0000".into(),
                address: "東京都中央区銀座0-0-0 銀座ビル 5F".into(),
                tax_registration_number: "T1234567890123".into(),
            },
            bank_info: BankInfo {
                bank_name: "三菱UFJ銀行".into(),
                account_number: "0000000".into(),
                account_holder: "ヤマダ ハナコ".into(),
            },
            items: vec![
                LineItem {
                    id: 1,
                    date: "2026.01.01".into(),
                    content: "SNS PR 交通費".into(),
                    quantity: NumberText::new("1"),
                    unit: "円".into(),
                    unit_price: NumberText::new("3000"),
                },
                LineItem::blank(2),
                LineItem::blank(3),
                LineItem::blank(4),
            ],
            account_info: AccountInfo {
                display_name: "インスタアカウント-花子-".into(),
                handle: "ここにIDを入力".into(),
                email: Some("example@email.com".into()),
            },
        }
    }
}

impl InvoiceRecord {
    /// Sum of quantity x unit price over all rows. Never cached.
    pub fn total(&self) -> f64 {
        self.items.iter().map(LineItem::amount).sum()
    }

    /// `max(ids) + 1`, or `None` once the largest id is `u32::MAX`.
    pub fn next_item_id(&self) -> Option<u32> {
        self.items
            .iter()
            .map(|i| i.id)
            .max()
            .unwrap_or(0)
            .checked_add(1)
    }

    /// Restores the item list invariants on hydrated data: at least one row,
    /// unique ids, and room for one more id.
    pub fn normalized(mut self) -> Self {
        if self.items.is_empty() {
            self.items.push(LineItem::blank(1));
        }
        if self.has_duplicate_ids() || self.next_item_id().is_none() {
            self = self.renumbered();
        }
        self
    }

    fn has_duplicate_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.items.len());
        !self.items.iter().all(|i| seen.insert(i.id))
    }

    /// Ids become 1..=n in the current row order.
    fn renumbered(mut self) -> Self {
        for (id, item) in (1..).zip(self.items.iter_mut()) {
            item.id = id;
        }
        self
    }

    pub fn with_issue_date(&self, value: impl Into<String>) -> Self {
        Self {
            issue_date: value.into(),
            ..self.clone()
        }
    }

    pub fn with_recipient(&self, value: impl Into<String>) -> Self {
        Self {
            recipient: value.into(),
            ..self.clone()
        }
    }

    pub fn with_sender_field(&self, field: SenderField, value: impl Into<String>) -> Self {
        let mut sender = self.sender.clone();
        let value = value.into();
        match field {
            SenderField::Name => sender.name = value,
            SenderField::PostalCode => sender.postal_code = value,
            SenderField::Address => sender.address = value,
            SenderField::TaxRegistrationNumber => sender.tax_registration_number = value,
        }
        Self {
            sender,
            ..self.clone()
        }
    }

    pub fn with_bank_field(&self, field: BankField, value: impl Into<String>) -> Self {
        let mut bank_info = self.bank_info.clone();
        let value = value.into();
        match field {
            BankField::BankName => bank_info.bank_name = value,
            BankField::AccountNumber => bank_info.account_number = value,
            BankField::AccountHolder => bank_info.account_holder = value,
        }
        Self {
            bank_info,
            ..self.clone()
        }
    }

    pub fn with_account_field(&self, field: AccountField, value: impl Into<String>) -> Self {
        let mut account_info = self.account_info.clone();
        let value = value.into();
        match field {
            AccountField::DisplayName => account_info.display_name = value,
            AccountField::Handle => account_info.handle = value,
            AccountField::Email => account_info.email = Some(value),
        }
        Self {
            account_info,
            ..self.clone()
        }
    }

    /// Replaces one field of the row with the given id. Unknown ids leave
    /// the items untouched.
    pub fn with_item_field(&self, id: u32, field: ItemField, value: impl Into<String>) -> Self {
        let value = value.into();
        let items = self
            .items
            .iter()
            .map(|item| {
                if item.id != id {
                    return item.clone();
                }
                let mut item = item.clone();
                match field {
                    ItemField::Date => item.date = value.clone(),
                    ItemField::Content => item.content = value.clone(),
                    ItemField::Quantity => item.quantity = NumberText::new(value.clone()),
                    ItemField::Unit => item.unit = value.clone(),
                    ItemField::UnitPrice => item.unit_price = NumberText::new(value.clone()),
                }
                item
            })
            .collect();
        Self {
            items,
            ..self.clone()
        }
    }

    pub fn with_added_item(&self) -> Self {
        let mut next = self.clone();
        let id = match self.next_item_id() {
            Some(id) => id,
            None => {
                next = next.renumbered();
                next.items.len() as u32 + 1
            }
        };
        next.items.push(LineItem::blank(id));
        next
    }

    /// Drops the row with the given id, or `None` when it is the last row.
    pub fn without_item(&self, id: u32) -> Option<Self> {
        if self.items.len() <= 1 {
            return None;
        }
        let items = self.items.iter().filter(|i| i.id != id).cloned().collect();
        Some(Self {
            items,
            ..self.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn item(id: u32, quantity: &str, price: &str) -> LineItem {
        LineItem {
            quantity: NumberText::new(quantity),
            unit_price: NumberText::new(price),
            ..LineItem::blank(id)
        }
    }

    fn record_with(items: Vec<LineItem>) -> InvoiceRecord {
        InvoiceRecord {
            items,
            ..InvoiceRecord::default()
        }
    }

    #[test]
    fn default_total_is_single_priced_row() {
        assert_eq!(InvoiceRecord::default().total(), 3000.0);
    }

    #[test]
    fn total_sums_quantity_times_price() {
        let record = record_with(vec![item(1, "2", "1000"), item(2, "3", "500")]);
        assert_eq!(record.total(), 3500.0);
    }

    #[test]
    fn blank_and_malformed_rows_contribute_zero() {
        let record = record_with(vec![
            item(1, "1", "3000"),
            item(2, "", ""),
            item(3, "abc", "100"),
            item(4, "0", "0"),
        ]);
        assert_eq!(record.total(), 3000.0);
    }

    #[test]
    fn added_item_gets_max_id_plus_one() {
        let record = record_with(vec![item(1, "", ""), item(7, "", ""), item(3, "", "")]);
        let next = record.with_added_item();
        assert_eq!(next.items.len(), 4);
        assert_eq!(next.items.last().map(|i| i.id), Some(8));
        assert_eq!(record.items.len(), 3, "source record must not change");
    }

    #[test]
    fn next_id_on_empty_list_is_one() {
        assert_eq!(record_with(vec![]).next_item_id(), Some(1));
    }

    #[test]
    fn removing_last_item_is_refused() {
        let record = record_with(vec![item(5, "1", "1")]);
        assert!(record.without_item(5).is_none());
    }

    #[test]
    fn removing_by_id_keeps_order() {
        let record = InvoiceRecord::default();
        let next = record.without_item(2).unwrap();
        let ids: Vec<u32> = next.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3, 4]);
    }

    #[test]
    fn item_edit_touches_only_matching_row() {
        let record = InvoiceRecord::default();
        let next = record.with_item_field(3, ItemField::UnitPrice, "12a");
        assert_eq!(next.items[2].unit_price.raw(), "12a");
        assert_eq!(next.items[0], record.items[0]);
        assert_eq!(next.items[1], record.items[1]);
        assert_eq!(next.total(), 3000.0);
    }

    #[test]
    fn nested_field_updates_replace_one_field() {
        let record = InvoiceRecord::default();
        let next = record
            .with_sender_field(SenderField::PostalCode, "104-0061")
            .with_bank_field(BankField::AccountHolder, "タナカ")
            .with_account_field(AccountField::Email, "");
        assert_eq!(next.sender.postal_code, "104-0061");
        assert_eq!(next.sender.name, record.sender.name);
        assert_eq!(next.bank_info.account_holder, "タナカ");
        assert_eq!(next.bank_info.bank_name, record.bank_info.bank_name);
        assert_eq!(next.account_info.email.as_deref(), Some(""));
    }

    #[test]
    fn reads_snapshots_with_legacy_keys() {
        let json = r#"{
            "issueDate": "2026年 02月01日",
            "recipient": "株式会社テスト 御中",
            "sender": {"name": "A", "zip": "111-1111", "address": "B", "regNumber": "T1"},
            "bankInfo": {"bankName": "C", "type": "普通", "number": "123", "holder": "D"},
            "items": [{"id": 1, "date": "", "content": "x", "quantity": "2", "unit": "", "price": 1000}],
            "accountInfo": {"name": "E", "id": "F"}
        }"#;
        let record: InvoiceRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.sender.postal_code, "111-1111");
        assert_eq!(record.sender.tax_registration_number, "T1");
        assert_eq!(record.bank_info.account_number, "123");
        assert_eq!(record.account_info.handle, "F");
        assert_eq!(record.account_info.email, None);
        assert_eq!(record.total(), 2000.0);
    }

    #[test]
    fn snapshot_survives_reload() {
        let record = InvoiceRecord::default().with_item_field(2, ItemField::Quantity, "1.");
        let json = serde_json::to_string(&record).unwrap();
        let back: InvoiceRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn normalizing_empty_items_adds_blank_row() {
        let record = record_with(vec![]).normalized();
        assert_eq!(record.items, vec![LineItem::blank(1)]);
    }

    #[test]
    fn largest_possible_id_has_no_successor() {
        let record = record_with(vec![item(1, "", ""), item(u32::MAX, "", "")]);
        assert_eq!(record.next_item_id(), None);
    }

    #[test]
    fn normalizing_renumbers_exhausted_or_duplicate_ids() {
        let exhausted = record_with(vec![item(u32::MAX, "2", "10"), item(3, "", "")]).normalized();
        let ids: Vec<u32> = exhausted.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(exhausted.total(), 20.0);

        let duplicated = record_with(vec![item(4, "", ""), item(4, "", ""), item(9, "", "")]).normalized();
        let ids: Vec<u32> = duplicated.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);

        let fine = record_with(vec![item(2, "", ""), item(7, "", "")]);
        assert_eq!(fine.clone().normalized(), fine);
    }

    #[test]
    fn adding_after_largest_id_renumbers_instead_of_wrapping() {
        let record = record_with(vec![item(u32::MAX, "1", "5")]);
        let next = record.with_added_item();
        let ids: Vec<u32> = next.items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(next.items[0].unit_price.raw(), "5");
    }
}
