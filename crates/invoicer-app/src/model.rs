// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use serde::ser::{Error as _, SerializeMap};
use serde::{Deserialize, Serialize, Serializer};
use time::Date;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::ids::*;

pub const DATE_FORMAT: &[BorrowedFormatItem<'static>] = format_description!("[year]-[month]-[day]");

time::serde::format_description!(iso_date, Date, "[year]-[month]-[day]");

pub fn parse_date(value: &str) -> Result<Date> {
    Date::parse(value.trim(), DATE_FORMAT)
        .with_context(|| format!("invalid date {value:?}; use YYYY-MM-DD"))
}

pub fn format_date(date: Date) -> String {
    date.format(DATE_FORMAT).unwrap_or_else(|_| date.to_string())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Unpaid,
    Paid,
    Overdue,
}

impl InvoiceStatus {
    pub const ALL: [Self; 3] = [Self::Unpaid, Self::Paid, Self::Overdue];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unpaid => "unpaid",
            Self::Paid => "paid",
            Self::Overdue => "overdue",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(Self::Unpaid),
            "paid" => Some(Self::Paid),
            "overdue" => Some(Self::Overdue),
            _ => None,
        }
    }

    pub fn next(self) -> Self {
        match self {
            Self::Unpaid => Self::Paid,
            Self::Paid => Self::Overdue,
            Self::Overdue => Self::Unpaid,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub invoice_number: String,
    pub client_name: String,
    pub amount: f64,
    #[serde(default, with = "iso_date::option")]
    pub issue_date: Option<Date>,
    #[serde(default, with = "iso_date::option")]
    pub due_date: Option<Date>,
    pub status: InvoiceStatus,
    #[serde(default)]
    pub pdf_path: Option<String>,
}

impl Invoice {
    pub fn has_pdf(&self) -> bool {
        self.pdf_path
            .as_deref()
            .is_some_and(|path| !path.is_empty())
    }

    /// Current value of `field` as the text an editor would show.
    pub fn field_text(&self, field: InvoiceField) -> String {
        match field {
            InvoiceField::InvoiceNumber => self.invoice_number.clone(),
            InvoiceField::ClientName => self.client_name.clone(),
            InvoiceField::Amount => self.amount.to_string(),
            InvoiceField::Status => self.status.as_str().to_owned(),
            InvoiceField::IssueDate => self.issue_date.map(format_date).unwrap_or_default(),
            InvoiceField::DueDate => self.due_date.map(format_date).unwrap_or_default(),
        }
    }
}

/// Two-decimal display text. Lossy; never feed it back into a request.
pub fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        let text = format!("{amount:.2}");
        text.trim_end_matches('0').trim_end_matches('.').to_owned()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewInvoice {
    pub invoice_number: String,
    pub client_name: String,
    pub amount: f64,
    #[serde(with = "iso_date::option")]
    pub issue_date: Option<Date>,
    #[serde(with = "iso_date::option")]
    pub due_date: Option<Date>,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct InvoicePage {
    pub items: Vec<Invoice>,
    pub total: u64,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvoiceField {
    InvoiceNumber,
    ClientName,
    Amount,
    Status,
    IssueDate,
    DueDate,
}

impl InvoiceField {
    pub const ALL: [Self; 6] = [
        Self::InvoiceNumber,
        Self::ClientName,
        Self::Amount,
        Self::Status,
        Self::IssueDate,
        Self::DueDate,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvoiceNumber => "invoice_number",
            Self::ClientName => "client_name",
            Self::Amount => "amount",
            Self::Status => "status",
            Self::IssueDate => "issue_date",
            Self::DueDate => "due_date",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::InvoiceNumber => "invoice #",
            Self::ClientName => "client",
            Self::Amount => "amount",
            Self::Status => "status",
            Self::IssueDate => "issue date",
            Self::DueDate => "due date",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.as_str() == value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PatchValue {
    Text(String),
    Number(f64),
    Status(InvoiceStatus),
    Date(Date),
    Null,
}

/// Partial update sent with PATCH; each field appears at most once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvoicePatch {
    entries: Vec<(InvoiceField, PatchValue)>,
}

impl InvoicePatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(field: InvoiceField, value: PatchValue) -> Self {
        let mut patch = Self::new();
        patch.set(field, value);
        patch
    }

    pub fn set(&mut self, field: InvoiceField, value: PatchValue) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == field) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((field, value)),
        }
    }

    pub fn get(&self, field: InvoiceField) -> Option<&PatchValue> {
        self.entries
            .iter()
            .find(|(existing, _)| *existing == field)
            .map(|(_, value)| value)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

impl Serialize for InvoicePatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (field, value) in &self.entries {
            match value {
                PatchValue::Text(text) => map.serialize_entry(field.as_str(), text)?,
                PatchValue::Number(number) => map.serialize_entry(field.as_str(), number)?,
                PatchValue::Status(status) => map.serialize_entry(field.as_str(), status)?,
                PatchValue::Date(date) => {
                    let text = date.format(DATE_FORMAT).map_err(S::Error::custom)?;
                    map.serialize_entry(field.as_str(), &text)?;
                }
                PatchValue::Null => map.serialize_entry(field.as_str(), &())?,
            }
        }
        map.end()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Asc => "asc",
            Self::Desc => "desc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortField {
    Id,
    InvoiceNumber,
    ClientName,
    Amount,
    IssueDate,
    DueDate,
    Status,
}

impl SortField {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Id => "id",
            Self::InvoiceNumber => "invoice_number",
            Self::ClientName => "client_name",
            Self::Amount => "amount",
            Self::IssueDate => "issue_date",
            Self::DueDate => "due_date",
            Self::Status => "status",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FormKind {
    EditInvoice,
    NewInvoice,
    Filters,
}

impl FormKind {
    pub const fn label(self) -> &'static str {
        match self {
            Self::EditInvoice => "edit invoice",
            Self::NewInvoice => "new invoice",
            Self::Filters => "filters",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmAction {
    DeleteInvoice(InvoiceId),
    RemovePdf(InvoiceId),
}

impl ConfirmAction {
    pub fn prompt(self) -> String {
        match self {
            Self::DeleteInvoice(id) => format!("delete invoice {id}?"),
            Self::RemovePdf(id) => format!("remove PDF from invoice {id}?"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppMode {
    Nav,
    Form(FormKind),
    Confirm(ConfirmAction),
    UploadPrompt(InvoiceId),
}

#[cfg(test)]
mod tests {
    use super::{
        Invoice, InvoiceField, InvoicePage, InvoicePatch, InvoiceStatus, NewInvoice, PatchValue,
        format_amount, parse_date,
    };
    use crate::InvoiceId;
    use anyhow::Result;
    use time::{Date, Month};

    #[test]
    fn invoice_decodes_server_record() -> Result<()> {
        let invoice: Invoice = serde_json::from_str(
            r#"{"id":7,"invoice_number":"INV-7","client_name":"Acme","amount":1200.5,
               "issue_date":"2025-08-01","due_date":null,"status":"unpaid","pdf_path":null}"#,
        )?;
        assert_eq!(invoice.id, InvoiceId::new(7));
        assert_eq!(
            invoice.issue_date,
            Some(Date::from_calendar_date(2025, Month::August, 1)?)
        );
        assert_eq!(invoice.due_date, None);
        assert_eq!(invoice.status, InvoiceStatus::Unpaid);
        assert!(!invoice.has_pdf());
        Ok(())
    }

    #[test]
    fn unknown_status_fails_to_decode() {
        let result = serde_json::from_str::<Invoice>(
            r#"{"id":1,"invoice_number":"A","client_name":"B","amount":1,"status":"void"}"#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn page_decodes_without_echo_fields() -> Result<()> {
        let page: InvoicePage = serde_json::from_str(r#"{"items":[],"total":42}"#)?;
        assert_eq!(page.total, 42);
        assert_eq!(page.page, None);
        Ok(())
    }

    #[test]
    fn patch_serializes_single_key_object() -> Result<()> {
        let patch = InvoicePatch::single(
            InvoiceField::Status,
            PatchValue::Status(InvoiceStatus::Paid),
        );
        assert_eq!(serde_json::to_string(&patch)?, r#"{"status":"paid"}"#);

        let cleared = InvoicePatch::single(InvoiceField::DueDate, PatchValue::Null);
        assert_eq!(serde_json::to_string(&cleared)?, r#"{"due_date":null}"#);
        Ok(())
    }

    #[test]
    fn patch_set_replaces_existing_field() -> Result<()> {
        let mut patch = InvoicePatch::new();
        patch.set(InvoiceField::Amount, PatchValue::Number(1.0));
        patch.set(
            InvoiceField::IssueDate,
            PatchValue::Date(Date::from_calendar_date(2025, Month::March, 9)?),
        );
        patch.set(InvoiceField::Amount, PatchValue::Number(2.5));
        assert_eq!(patch.len(), 2);
        assert_eq!(
            serde_json::to_string(&patch)?,
            r#"{"amount":2.5,"issue_date":"2025-03-09"}"#
        );
        Ok(())
    }

    #[test]
    fn new_invoice_serializes_null_dates() -> Result<()> {
        let payload = NewInvoice {
            invoice_number: "INV-1".to_owned(),
            client_name: "Acme".to_owned(),
            amount: 150.5,
            issue_date: None,
            due_date: None,
            status: InvoiceStatus::Unpaid,
        };
        let value = serde_json::to_value(&payload)?;
        assert_eq!(value["amount"], serde_json::json!(150.5));
        assert!(value["issue_date"].is_null());
        assert!(value["due_date"].is_null());
        assert_eq!(value["status"], "unpaid");
        assert!(value.get("id").is_none());
        Ok(())
    }

    #[test]
    fn field_text_and_amount_formatting() {
        assert_eq!(format_amount(890.0), "890");
        assert_eq!(format_amount(1200.5), "1200.5");
        assert_eq!(format_amount(450.75), "450.75");
        assert_eq!(InvoiceField::parse("due_date"), Some(InvoiceField::DueDate));
        assert_eq!(InvoiceField::parse("id"), None);
    }

    #[test]
    fn parse_date_rejects_garbage() {
        assert!(parse_date("2025-02-30").is_err());
        assert!(parse_date("tomorrow").is_err());
        assert!(parse_date(" 2025-02-03 ").is_ok());
    }
}
