// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use time::Date;

use crate::{InvoiceStatus, SortDirection, SortField, format_date};

pub const PAGE_SIZE_OPTIONS: [u32; 3] = [10, 25, 50];
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortSpec {
    pub field: SortField,
    pub direction: SortDirection,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InvoiceFilters {
    pub client: String,
    pub status: Option<InvoiceStatus>,
    pub invoice_number: String,
    pub issue_from: Option<Date>,
    pub issue_to: Option<Date>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl InvoiceFilters {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn active_count(&self) -> usize {
        [
            !self.client.trim().is_empty(),
            self.status.is_some(),
            !self.invoice_number.trim().is_empty(),
            self.issue_from.is_some(),
            self.issue_to.is_some(),
            self.min_amount.is_some(),
            self.max_amount.is_some(),
        ]
        .into_iter()
        .filter(|active| *active)
        .count()
    }
}

/// Pagination, sort, and filter state as the UI sees it. `page_index` is 0-based.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryState {
    pub page_index: u32,
    pub page_size: u32,
    pub sort: Option<SortSpec>,
    pub filters: InvoiceFilters,
}

impl Default for QueryState {
    fn default() -> Self {
        Self {
            page_index: 0,
            page_size: DEFAULT_PAGE_SIZE,
            sort: None,
            filters: InvoiceFilters::default(),
        }
    }
}

impl QueryState {
    pub fn with_page_size(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            ..Self::default()
        }
    }

    pub fn to_query(&self) -> InvoiceQuery {
        let filters = &self.filters;
        InvoiceQuery {
            page: self.page_index + 1,
            limit: self.page_size,
            sort: self.sort.map(|sort| sort.field),
            order: self.sort.map(|sort| sort.direction),
            client: non_empty(&filters.client),
            status: filters.status,
            invoice_number: non_empty(&filters.invoice_number),
            issue_from: filters.issue_from,
            issue_to: filters.issue_to,
            min_amount: filters.min_amount,
            max_amount: filters.max_amount,
        }
    }

    /// Number of pages implied by `total`; never less than one.
    pub fn page_count(&self, total: u64) -> u32 {
        let size = u64::from(self.page_size.max(1));
        let pages = total.div_ceil(size).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_owned())
    }
}

/// Wire form of a list request. `page` is 1-based.
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceQuery {
    pub page: u32,
    pub limit: u32,
    pub sort: Option<SortField>,
    pub order: Option<SortDirection>,
    pub client: Option<String>,
    pub status: Option<InvoiceStatus>,
    pub invoice_number: Option<String>,
    pub issue_from: Option<Date>,
    pub issue_to: Option<Date>,
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
}

impl InvoiceQuery {
    pub fn first_page(limit: u32) -> Self {
        QueryState::with_page_size(limit).to_query()
    }

    /// Query parameters in wire order; unset values are omitted.
    pub fn to_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("page", self.page.to_string()),
            ("limit", self.limit.to_string()),
        ];
        if let Some(sort) = self.sort {
            pairs.push(("sort", sort.as_str().to_owned()));
            let order = self.order.unwrap_or(SortDirection::Asc);
            pairs.push(("order", order.as_str().to_owned()));
        }
        if let Some(client) = &self.client {
            pairs.push(("client", client.clone()));
        }
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_owned()));
        }
        if let Some(invoice_number) = &self.invoice_number {
            pairs.push(("invoice_number", invoice_number.clone()));
        }
        if let Some(date) = self.issue_from {
            pairs.push(("issue_from", format_date(date)));
        }
        if let Some(date) = self.issue_to {
            pairs.push(("issue_to", format_date(date)));
        }
        if let Some(amount) = self.min_amount {
            pairs.push(("min_amount", amount.to_string()));
        }
        if let Some(amount) = self.max_amount {
            pairs.push(("max_amount", amount.to_string()));
        }
        pairs
    }
}

#[cfg(test)]
mod tests {
    use super::{InvoiceFilters, QueryState, SortSpec};
    use crate::{InvoiceStatus, SortDirection, SortField};
    use anyhow::Result;
    use time::{Date, Month};

    fn pairs(state: &QueryState) -> Vec<(&'static str, String)> {
        state.to_query().to_pairs()
    }

    #[test]
    fn status_filter_only_emits_page_limit_and_status() {
        let state = QueryState {
            filters: InvoiceFilters {
                status: Some(InvoiceStatus::Paid),
                ..InvoiceFilters::default()
            },
            ..QueryState::default()
        };
        assert_eq!(
            pairs(&state),
            vec![
                ("page", "1".to_owned()),
                ("limit", "10".to_owned()),
                ("status", "paid".to_owned()),
            ]
        );
    }

    #[test]
    fn empty_and_blank_filters_are_omitted() {
        let state = QueryState {
            filters: InvoiceFilters {
                client: "   ".to_owned(),
                invoice_number: String::new(),
                ..InvoiceFilters::default()
            },
            ..QueryState::default()
        };
        let keys: Vec<&str> = pairs(&state).into_iter().map(|(key, _)| key).collect();
        assert_eq!(keys, vec!["page", "limit"]);
    }

    #[test]
    fn sort_and_every_filter_are_emitted_in_wire_order() -> Result<()> {
        let state = QueryState {
            page_index: 2,
            page_size: 25,
            sort: Some(SortSpec {
                field: SortField::Amount,
                direction: SortDirection::Desc,
            }),
            filters: InvoiceFilters {
                client: "acme".to_owned(),
                status: Some(InvoiceStatus::Overdue),
                invoice_number: "INV".to_owned(),
                issue_from: Some(Date::from_calendar_date(2025, Month::January, 1)?),
                issue_to: Some(Date::from_calendar_date(2025, Month::December, 31)?),
                min_amount: Some(10.0),
                max_amount: Some(99.5),
            },
        };
        assert_eq!(
            pairs(&state),
            vec![
                ("page", "3".to_owned()),
                ("limit", "25".to_owned()),
                ("sort", "amount".to_owned()),
                ("order", "desc".to_owned()),
                ("client", "acme".to_owned()),
                ("status", "overdue".to_owned()),
                ("invoice_number", "INV".to_owned()),
                ("issue_from", "2025-01-01".to_owned()),
                ("issue_to", "2025-12-31".to_owned()),
                ("min_amount", "10".to_owned()),
                ("max_amount", "99.5".to_owned()),
            ]
        );
        Ok(())
    }

    #[test]
    fn page_count_rounds_up_and_is_never_zero() {
        let state = QueryState::default();
        assert_eq!(state.page_count(0), 1);
        assert_eq!(state.page_count(10), 1);
        assert_eq!(state.page_count(11), 2);
        assert_eq!(QueryState::with_page_size(25).page_count(51), 3);
    }

    #[test]
    fn active_filter_count_ignores_blank_text() {
        let filters = InvoiceFilters {
            client: " ".to_owned(),
            status: Some(InvoiceStatus::Unpaid),
            min_amount: Some(1.0),
            ..InvoiceFilters::default()
        };
        assert_eq!(filters.active_count(), 2);
        assert!(!filters.is_empty());
        assert!(InvoiceFilters::default().is_empty());
    }

    #[test]
    fn amount_bounds_are_sent_unrounded() {
        let state = QueryState {
            filters: InvoiceFilters {
                min_amount: Some(0.001),
                max_amount: Some(0.004),
                ..InvoiceFilters::default()
            },
            ..QueryState::default()
        };
        let amounts: Vec<_> = pairs(&state)
            .into_iter()
            .filter(|(key, _)| key.ends_with("_amount"))
            .collect();
        assert_eq!(
            amounts,
            vec![
                ("min_amount", "0.001".to_owned()),
                ("max_amount", "0.004".to_owned()),
            ]
        );
    }
}
