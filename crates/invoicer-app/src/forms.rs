// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, bail};
use time::Date;

use crate::{
    Invoice, InvoiceField, InvoiceFilters, InvoiceId, InvoicePatch, InvoiceStatus, NewInvoice,
    PatchValue, format_date, parse_date,
};

/// One line of a form as the UI renders it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormRow {
    pub label: &'static str,
    pub value: String,
    pub is_choice: bool,
}

fn parse_amount(raw: &str, label: &str) -> Result<f64> {
    let trimmed = raw.trim();
    let amount: f64 = match trimmed.parse() {
        Ok(amount) => amount,
        Err(_) => bail!("{label} must be a number, got {trimmed:?}"),
    };
    if !amount.is_finite() {
        bail!("{label} must be a finite number");
    }
    Ok(amount)
}

fn parse_optional_date(raw: &str) -> Result<Option<Date>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_date(raw).map(Some)
}

fn parse_optional_amount(raw: &str, label: &str) -> Result<Option<f64>> {
    if raw.trim().is_empty() {
        return Ok(None);
    }
    parse_amount(raw, label).map(Some)
}

fn cycle_index(current: usize, len: usize, delta: isize) -> usize {
    let len = len as isize;
    (current as isize + delta).rem_euclid(len) as usize
}

/// Edits one field of an existing invoice at a time.
#[derive(Debug, Clone, PartialEq)]
pub struct EditForm {
    invoice: Invoice,
    field: InvoiceField,
    value: String,
    focus: usize,
}

impl EditForm {
    pub const DEFAULT_FIELD: InvoiceField = InvoiceField::Status;

    pub fn open(invoice: &Invoice) -> Self {
        Self {
            invoice: invoice.clone(),
            field: Self::DEFAULT_FIELD,
            value: invoice.field_text(Self::DEFAULT_FIELD),
            focus: 1,
        }
    }

    pub fn invoice_id(&self) -> InvoiceId {
        self.invoice.id
    }

    pub fn title(&self) -> String {
        format!("edit invoice #{}", self.invoice.id)
    }

    pub fn field(&self) -> InvoiceField {
        self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn select_field(&mut self, field: InvoiceField) {
        self.field = field;
        self.value = self.invoice.field_text(field);
    }

    pub fn cycle_field(&mut self, delta: isize) {
        let current = InvoiceField::ALL
            .iter()
            .position(|field| *field == self.field)
            .unwrap_or(0);
        let next = cycle_index(current, InvoiceField::ALL.len(), delta);
        self.select_field(InvoiceField::ALL[next]);
    }

    pub fn set_value(&mut self, value: impl Into<String>) {
        self.value = value.into();
    }

    pub fn move_focus(&mut self, delta: isize) {
        self.focus = cycle_index(self.focus, 2, delta);
    }

    pub fn input_char(&mut self, ch: char) {
        if self.focus == 1 && self.field != InvoiceField::Status {
            self.value.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if self.focus == 1 && self.field != InvoiceField::Status {
            self.value.pop();
        }
    }

    pub fn cycle_choice(&mut self, delta: isize) {
        if self.focus == 0 {
            self.cycle_field(delta);
            return;
        }
        if self.field == InvoiceField::Status {
            let current = InvoiceStatus::parse(&self.value).unwrap_or(InvoiceStatus::Unpaid);
            let index = InvoiceStatus::ALL
                .iter()
                .position(|status| *status == current)
                .unwrap_or(0);
            let next = cycle_index(index, InvoiceStatus::ALL.len(), delta);
            self.value = InvoiceStatus::ALL[next].as_str().to_owned();
        }
    }

    pub fn rows(&self) -> Vec<FormRow> {
        vec![
            FormRow {
                label: "field",
                value: self.field.label().to_owned(),
                is_choice: true,
            },
            FormRow {
                label: "new value",
                value: self.value.clone(),
                is_choice: self.field == InvoiceField::Status,
            },
        ]
    }

    /// Single-key patch for the selected field. Amount must be numeric;
    /// an empty value clears every other field.
    pub fn submit(&self) -> Result<InvoicePatch> {
        let raw = self.value.trim();
        let value = match self.field {
            InvoiceField::Amount => PatchValue::Number(parse_amount(raw, "amount")?),
            _ if raw.is_empty() => PatchValue::Null,
            InvoiceField::Status => match InvoiceStatus::parse(raw) {
                Some(status) => PatchValue::Status(status),
                None => bail!("status must be one of unpaid, paid, overdue"),
            },
            InvoiceField::IssueDate | InvoiceField::DueDate => PatchValue::Date(parse_date(raw)?),
            InvoiceField::InvoiceNumber | InvoiceField::ClientName => {
                PatchValue::Text(raw.to_owned())
            }
        };
        Ok(InvoicePatch::single(self.field, value))
    }
}

const CREATE_FIELDS: [InvoiceField; 6] = [
    InvoiceField::InvoiceNumber,
    InvoiceField::ClientName,
    InvoiceField::Amount,
    InvoiceField::IssueDate,
    InvoiceField::DueDate,
    InvoiceField::Status,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateForm {
    pub invoice_number: String,
    pub client_name: String,
    pub amount: String,
    pub issue_date: String,
    pub due_date: String,
    pub status: InvoiceStatus,
    focus: usize,
}

impl Default for CreateForm {
    fn default() -> Self {
        Self {
            invoice_number: String::new(),
            client_name: String::new(),
            amount: String::new(),
            issue_date: String::new(),
            due_date: String::new(),
            status: InvoiceStatus::Unpaid,
            focus: 0,
        }
    }
}

impl CreateForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn focused_field(&self) -> InvoiceField {
        CREATE_FIELDS[self.focus]
    }

    pub fn move_focus(&mut self, delta: isize) {
        self.focus = cycle_index(self.focus, CREATE_FIELDS.len(), delta);
    }

    fn text_mut(&mut self, field: InvoiceField) -> Option<&mut String> {
        match field {
            InvoiceField::InvoiceNumber => Some(&mut self.invoice_number),
            InvoiceField::ClientName => Some(&mut self.client_name),
            InvoiceField::Amount => Some(&mut self.amount),
            InvoiceField::IssueDate => Some(&mut self.issue_date),
            InvoiceField::DueDate => Some(&mut self.due_date),
            InvoiceField::Status => None,
        }
    }

    pub fn input_char(&mut self, ch: char) {
        if let Some(text) = self.text_mut(self.focused_field()) {
            text.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.text_mut(self.focused_field()) {
            text.pop();
        }
    }

    pub fn cycle_choice(&mut self, delta: isize) {
        if self.focused_field() != InvoiceField::Status {
            return;
        }
        let index = InvoiceStatus::ALL
            .iter()
            .position(|status| *status == self.status)
            .unwrap_or(0);
        self.status = InvoiceStatus::ALL[cycle_index(index, InvoiceStatus::ALL.len(), delta)];
    }

    pub fn rows(&self) -> Vec<FormRow> {
        CREATE_FIELDS
            .iter()
            .map(|field| FormRow {
                label: field.label(),
                value: match field {
                    InvoiceField::InvoiceNumber => self.invoice_number.clone(),
                    InvoiceField::ClientName => self.client_name.clone(),
                    InvoiceField::Amount => self.amount.clone(),
                    InvoiceField::IssueDate => self.issue_date.clone(),
                    InvoiceField::DueDate => self.due_date.clone(),
                    InvoiceField::Status => self.status.as_str().to_owned(),
                },
                is_choice: *field == InvoiceField::Status,
            })
            .collect()
    }

    pub fn submit(&self) -> Result<NewInvoice> {
        let missing: Vec<&str> = [
            ("invoice_number", &self.invoice_number),
            ("client_name", &self.client_name),
            ("amount", &self.amount),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();
        if !missing.is_empty() {
            bail!(
                "{} required -- invoice_number, client_name, and amount must be filled in",
                missing.join(", ")
            );
        }

        Ok(NewInvoice {
            invoice_number: self.invoice_number.trim().to_owned(),
            client_name: self.client_name.trim().to_owned(),
            amount: parse_amount(&self.amount, "amount")?,
            issue_date: parse_optional_date(&self.issue_date)?,
            due_date: parse_optional_date(&self.due_date)?,
            status: self.status,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FilterField {
    Client,
    Status,
    InvoiceNumber,
    IssueFrom,
    IssueTo,
    MinAmount,
    MaxAmount,
}

impl FilterField {
    const ALL: [Self; 7] = [
        Self::Client,
        Self::Status,
        Self::InvoiceNumber,
        Self::IssueFrom,
        Self::IssueTo,
        Self::MinAmount,
        Self::MaxAmount,
    ];

    const fn label(self) -> &'static str {
        match self {
            Self::Client => "client",
            Self::Status => "status",
            Self::InvoiceNumber => "invoice #",
            Self::IssueFrom => "issued from",
            Self::IssueTo => "issued to",
            Self::MinAmount => "min amount",
            Self::MaxAmount => "max amount",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FilterForm {
    pub client: String,
    pub status: Option<InvoiceStatus>,
    pub invoice_number: String,
    pub issue_from: String,
    pub issue_to: String,
    pub min_amount: String,
    pub max_amount: String,
    focus: usize,
}

impl FilterForm {
    pub fn from_filters(filters: &InvoiceFilters) -> Self {
        Self {
            client: filters.client.clone(),
            status: filters.status,
            invoice_number: filters.invoice_number.clone(),
            issue_from: filters.issue_from.map(format_date).unwrap_or_default(),
            issue_to: filters.issue_to.map(format_date).unwrap_or_default(),
            min_amount: filters.min_amount.map(|amount| amount.to_string()).unwrap_or_default(),
            max_amount: filters.max_amount.map(|amount| amount.to_string()).unwrap_or_default(),
            focus: 0,
        }
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    pub fn move_focus(&mut self, delta: isize) {
        self.focus = cycle_index(self.focus, FilterField::ALL.len(), delta);
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match FilterField::ALL[self.focus] {
            FilterField::Client => Some(&mut self.client),
            FilterField::Status => None,
            FilterField::InvoiceNumber => Some(&mut self.invoice_number),
            FilterField::IssueFrom => Some(&mut self.issue_from),
            FilterField::IssueTo => Some(&mut self.issue_to),
            FilterField::MinAmount => Some(&mut self.min_amount),
            FilterField::MaxAmount => Some(&mut self.max_amount),
        }
    }

    pub fn input_char(&mut self, ch: char) {
        if let Some(text) = self.text_mut() {
            text.push(ch);
        }
    }

    pub fn backspace(&mut self) {
        if let Some(text) = self.text_mut() {
            text.pop();
        }
    }

    /// Status cycles through all, unpaid, paid, overdue.
    pub fn cycle_choice(&mut self, delta: isize) {
        if FilterField::ALL[self.focus] != FilterField::Status {
            return;
        }
        let options = [
            None,
            Some(InvoiceStatus::Unpaid),
            Some(InvoiceStatus::Paid),
            Some(InvoiceStatus::Overdue),
        ];
        let index = options
            .iter()
            .position(|option| *option == self.status)
            .unwrap_or(0);
        self.status = options[cycle_index(index, options.len(), delta)];
    }

    pub fn clear(&mut self) {
        *self = Self {
            focus: self.focus,
            ..Self::default()
        };
    }

    pub fn rows(&self) -> Vec<FormRow> {
        FilterField::ALL
            .iter()
            .map(|field| FormRow {
                label: field.label(),
                value: match field {
                    FilterField::Client => self.client.clone(),
                    FilterField::Status => self
                        .status
                        .map_or("all", InvoiceStatus::as_str)
                        .to_owned(),
                    FilterField::InvoiceNumber => self.invoice_number.clone(),
                    FilterField::IssueFrom => self.issue_from.clone(),
                    FilterField::IssueTo => self.issue_to.clone(),
                    FilterField::MinAmount => self.min_amount.clone(),
                    FilterField::MaxAmount => self.max_amount.clone(),
                },
                is_choice: *field == FilterField::Status,
            })
            .collect()
    }

    pub fn apply(&self) -> Result<InvoiceFilters> {
        let filters = InvoiceFilters {
            client: self.client.trim().to_owned(),
            status: self.status,
            invoice_number: self.invoice_number.trim().to_owned(),
            issue_from: parse_optional_date(&self.issue_from)?,
            issue_to: parse_optional_date(&self.issue_to)?,
            min_amount: parse_optional_amount(&self.min_amount, "min amount")?,
            max_amount: parse_optional_amount(&self.max_amount, "max amount")?,
        };
        if let (Some(from), Some(to)) = (filters.issue_from, filters.issue_to)
            && to < from
        {
            bail!("issued-to date must be on/after issued-from date");
        }
        if let (Some(min), Some(max)) = (filters.min_amount, filters.max_amount)
            && max < min
        {
            bail!("max amount must be at least min amount");
        }
        Ok(filters)
    }
}
