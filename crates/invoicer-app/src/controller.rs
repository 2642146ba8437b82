// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

//! List state for the invoice table.
//!
//! The controller owns the query state and the rows currently on screen.
//! Every effective query change hands back exactly one [`FetchRequest`],
//! tagged with a sequence number; only the response to the most recently
//! issued request is ever applied, so overlapping fetches resolve as
//! "last query wins" regardless of the order responses arrive in.

use tracing::debug;

use crate::{
    Invoice, InvoiceFilters, InvoiceId, InvoicePage, InvoiceQuery, InvoiceStatus, QueryState,
    SortDirection, SortField, SortSpec,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchRequest {
    pub seq: u64,
    pub query: InvoiceQuery,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Applied { rows: usize, total: u64 },
    Failed(String),
    Discarded,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceController {
    query: QueryState,
    rows: Vec<Invoice>,
    total: u64,
    load: LoadState,
    issued_seq: u64,
}

impl Default for InvoiceController {
    fn default() -> Self {
        Self::new(QueryState::default())
    }
}

impl InvoiceController {
    pub fn new(query: QueryState) -> Self {
        Self {
            query,
            rows: Vec::new(),
            total: 0,
            load: LoadState::Idle,
            issued_seq: 0,
        }
    }

    pub fn query(&self) -> &QueryState {
        &self.query
    }

    pub fn rows(&self) -> &[Invoice] {
        &self.rows
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn load_state(&self) -> LoadState {
        self.load
    }

    pub fn is_loading(&self) -> bool {
        self.load == LoadState::Loading
    }

    pub fn latest_seq(&self) -> u64 {
        self.issued_seq
    }

    pub fn find(&self, id: InvoiceId) -> Option<&Invoice> {
        self.rows.iter().find(|row| row.id == id)
    }

    pub fn page_count(&self) -> u32 {
        self.query.page_count(self.total)
    }

    /// Unconditional refetch of the current query.
    pub fn reload(&mut self) -> FetchRequest {
        self.issue()
    }

    pub fn set_page(&mut self, page_index: u32) -> Option<FetchRequest> {
        if page_index == self.query.page_index {
            return None;
        }
        self.query.page_index = page_index;
        Some(self.issue())
    }

    pub fn next_page(&mut self) -> Option<FetchRequest> {
        let next = self.query.page_index.saturating_add(1);
        if next >= self.page_count() {
            return None;
        }
        self.set_page(next)
    }

    pub fn prev_page(&mut self) -> Option<FetchRequest> {
        let prev = self.query.page_index.checked_sub(1)?;
        self.set_page(prev)
    }

    pub fn set_page_size(&mut self, page_size: u32) -> Option<FetchRequest> {
        if page_size == 0 || page_size == self.query.page_size {
            return None;
        }
        self.query.page_size = page_size;
        self.query.page_index = 0;
        Some(self.issue())
    }

    pub fn set_sort(&mut self, sort: Option<SortSpec>) -> Option<FetchRequest> {
        if sort == self.query.sort {
            return None;
        }
        self.query.sort = sort;
        Some(self.issue())
    }

    /// asc, then desc, then unsorted; a different field starts over at asc.
    pub fn cycle_sort(&mut self, field: SortField) -> Option<FetchRequest> {
        let next = match self.query.sort {
            Some(SortSpec {
                field: current,
                direction: SortDirection::Asc,
            }) if current == field => Some(SortSpec {
                field,
                direction: SortDirection::Desc,
            }),
            Some(SortSpec {
                field: current,
                direction: SortDirection::Desc,
            }) if current == field => None,
            _ => Some(SortSpec {
                field,
                direction: SortDirection::Asc,
            }),
        };
        self.set_sort(next)
    }

    pub fn clear_sort(&mut self) -> Option<FetchRequest> {
        self.set_sort(None)
    }

    pub fn set_filters(&mut self, filters: InvoiceFilters) -> Option<FetchRequest> {
        if filters == self.query.filters {
            return None;
        }
        self.query.filters = filters;
        self.query.page_index = 0;
        Some(self.issue())
    }

    pub fn set_client_filter(&mut self, client: &str) -> Option<FetchRequest> {
        let filters = InvoiceFilters {
            client: client.to_owned(),
            ..self.query.filters.clone()
        };
        self.set_filters(filters)
    }

    pub fn set_status_filter(&mut self, status: Option<InvoiceStatus>) -> Option<FetchRequest> {
        let filters = InvoiceFilters {
            status,
            ..self.query.filters.clone()
        };
        self.set_filters(filters)
    }

    /// all, unpaid, paid, overdue, all.
    pub fn cycle_status_filter(&mut self) -> Option<FetchRequest> {
        let next = match self.query.filters.status {
            None => Some(InvoiceStatus::Unpaid),
            Some(InvoiceStatus::Overdue) => None,
            Some(status) => Some(status.next()),
        };
        self.set_status_filter(next)
    }

    pub fn apply_fetch(&mut self, seq: u64, result: Result<InvoicePage, String>) -> FetchOutcome {
        if seq != self.issued_seq {
            debug!(seq, latest = self.issued_seq, "discarding stale invoice page");
            return FetchOutcome::Discarded;
        }

        self.load = LoadState::Idle;
        match result {
            Ok(page) => {
                self.rows = page.items;
                self.total = page.total;
                FetchOutcome::Applied {
                    rows: self.rows.len(),
                    total: self.total,
                }
            }
            Err(error) => FetchOutcome::Failed(error),
        }
    }

    /// Replaces the row with the same id in place. Returns false when the
    /// record is not on the current page.
    pub fn merge_record(&mut self, invoice: Invoice) -> bool {
        match self.rows.iter_mut().find(|row| row.id == invoice.id) {
            Some(row) => {
                *row = invoice;
                true
            }
            None => false,
        }
    }

    pub fn apply_updated(&mut self, invoice: Invoice) -> FetchRequest {
        self.merge_record(invoice);
        self.issue()
    }

    pub fn apply_created(&mut self, _invoice: &Invoice) -> FetchRequest {
        self.issue()
    }

    pub fn apply_deleted(&mut self, id: InvoiceId) -> FetchRequest {
        let before = self.rows.len();
        self.rows.retain(|row| row.id != id);
        if self.rows.len() < before {
            self.total = self.total.saturating_sub(1);
        }
        if self.rows.is_empty() && self.query.page_index > 0 {
            self.query.page_index = self.query.page_index.min(self.page_count() - 1);
        }
        self.issue()
    }

    fn issue(&mut self) -> FetchRequest {
        self.issued_seq = self.issued_seq.saturating_add(1);
        self.load = LoadState::Loading;
        FetchRequest {
            seq: self.issued_seq,
            query: self.query.to_query(),
        }
    }
}
