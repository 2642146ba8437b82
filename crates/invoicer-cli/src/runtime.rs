// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use invoicer_api::Client;
use invoicer_app::{
    FetchRequest, Invoice, InvoiceId, InvoicePage, InvoicePatch, InvoiceQuery, NewInvoice,
};
use invoicer_tui::InternalEvent;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, warn};

/// Runs every UI request against the invoice HTTP API.
pub struct ApiRuntime {
    client: Client,
    cache_dir: PathBuf,
    pdf_viewer: Option<String>,
}

impl ApiRuntime {
    pub fn new(client: Client, cache_dir: PathBuf) -> Self {
        Self {
            client,
            cache_dir,
            pdf_viewer: None,
        }
    }

    pub fn with_pdf_viewer(mut self, viewer: Option<&str>) -> Self {
        self.pdf_viewer = viewer.map(str::to_owned);
        self
    }

    fn launch_viewer(&self, viewer: &str, path: &Path) -> Result<()> {
        let mut parts = viewer.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| anyhow!("ui.pdf_viewer is empty"))?;
        Command::new(program)
            .args(parts)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .with_context(|| format!("launch {program:?}; check [ui].pdf_viewer"))?;
        Ok(())
    }
}

impl invoicer_tui::AppRuntime for ApiRuntime {
    fn list_invoices(&mut self, query: &InvoiceQuery) -> Result<InvoicePage> {
        self.client.list_invoices(query)
    }

    fn spawn_list(&mut self, request: FetchRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("invoice-fetch-{}", request.seq))
            .spawn(move || {
                let result = client
                    .list_invoices(&request.query)
                    .map_err(|error| format!("{error:#}"));
                if tx
                    .send(InternalEvent::Fetched {
                        seq: request.seq,
                        result,
                    })
                    .is_err()
                {
                    debug!(seq = request.seq, "ui closed before fetch finished");
                }
            })
            .context("spawn fetch worker")?;
        Ok(())
    }

    fn create_invoice(&mut self, invoice: &NewInvoice) -> Result<Invoice> {
        self.client.create_invoice(invoice)
    }

    fn update_invoice(&mut self, id: InvoiceId, patch: &InvoicePatch) -> Result<Invoice> {
        self.client.update_invoice(id, patch)
    }

    fn delete_invoice(&mut self, id: InvoiceId) -> Result<()> {
        self.client.delete_invoice(id)
    }

    fn upload_pdf(&mut self, id: InvoiceId, path: &Path) -> Result<Invoice> {
        self.client.upload_invoice_pdf(id, path)
    }

    fn remove_pdf(&mut self, id: InvoiceId) -> Result<Invoice> {
        self.client.delete_invoice_pdf(id)
    }

    fn open_pdf(&mut self, id: InvoiceId) -> Result<String> {
        let path = self.client.download_pdf(id, &self.cache_dir)?;
        let Some(viewer) = self.pdf_viewer.as_deref() else {
            return Ok(format!("saved {}", path.display()));
        };
        if let Err(error) = self.launch_viewer(viewer, &path) {
            warn!(%id, error = %format!("{error:#}"), "pdf viewer failed");
            return Err(error.context(format!("saved {} but could not open it", path.display())));
        }
        Ok(format!("opened {}", path.display()))
    }
}
