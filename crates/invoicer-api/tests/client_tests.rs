// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::Result;
use invoicer_api::{ApiError, Client};
use invoicer_app::{
    CreateForm, EditForm, InvoiceFilters, InvoiceId, InvoiceQuery, InvoiceStatus, QueryState,
};
use invoicer_testkit::{MockResponse, MockServer, invoice_json, page_json, seed_invoices};
use serde_json::json;
use std::time::Duration;

fn client_for(server: &MockServer) -> Result<Client> {
    Client::new(server.base_url(), Duration::from_secs(2))
}

#[test]
fn unreachable_server_names_the_config_key() {
    let client =
        Client::new("http://127.0.0.1:1", Duration::from_millis(50)).expect("client should build");
    let error = client
        .list_invoices(&InvoiceQuery::first_page(10))
        .expect_err("list should fail for unreachable endpoint");
    assert!(matches!(
        error.downcast_ref::<ApiError>(),
        Some(ApiError::Connection { .. })
    ));
    assert!(error.to_string().contains("[api].base_url"));
}

#[test]
fn list_requests_only_non_empty_fields() -> Result<()> {
    let seeds = seed_invoices();
    let server = MockServer::start(vec![MockResponse::json(
        200,
        page_json(&seeds[1..2], 1),
    )])?;
    let client = client_for(&server)?;

    let state = QueryState {
        filters: InvoiceFilters {
            status: Some(InvoiceStatus::Paid),
            ..InvoiceFilters::default()
        },
        ..QueryState::default()
    };
    let page = client.list_invoices(&state.to_query())?;
    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].client_name, "Globex");

    let requests = server.finish()?;
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].path(), "/invoices");
    assert_eq!(requests[0].query(), Some("page=1&limit=10&status=paid"));
    Ok(())
}

#[test]
fn list_failure_is_generic() -> Result<()> {
    let server = MockServer::start(vec![MockResponse::text(500, "Internal Server Error")])?;
    let client = client_for(&server)?;

    let error = client
        .list_invoices(&InvoiceQuery::first_page(25))
        .expect_err("list should fail");
    assert_eq!(error.to_string(), "failed to fetch invoices");
    assert_eq!(
        error.downcast_ref::<ApiError>().and_then(ApiError::status),
        Some(500)
    );
    server.finish()?;
    Ok(())
}

#[test]
fn edit_status_patches_single_field() -> Result<()> {
    let mut record = seed_invoices().remove(0);
    record.id = InvoiceId::new(7);
    let mut updated = record.clone();
    updated.status = InvoiceStatus::Paid;

    let server = MockServer::start(vec![MockResponse::json(200, invoice_json(&updated))])?;
    let client = client_for(&server)?;

    let mut form = EditForm::open(&record);
    form.set_value("paid");
    let patch = form.submit()?;
    let returned = client.update_invoice(record.id, &patch)?;
    assert_eq!(returned.status, InvoiceStatus::Paid);
    assert_eq!(returned.client_name, record.client_name);

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "PATCH");
    assert_eq!(requests[0].path(), "/invoices/7");
    assert_eq!(requests[0].json()?, json!({"status": "paid"}));
    Ok(())
}

#[test]
fn create_coerces_amount_and_nulls_dates() -> Result<()> {
    let server = MockServer::start(vec![MockResponse::json(
        201,
        json!({
            "id": 9,
            "invoice_number": "INV-1",
            "client_name": "Acme",
            "amount": 150.5,
            "issue_date": null,
            "due_date": null,
            "status": "unpaid",
            "pdf_path": null,
        }),
    )])?;
    let client = client_for(&server)?;

    let mut form = CreateForm::new();
    form.invoice_number = "INV-1".to_owned();
    form.client_name = "Acme".to_owned();
    form.amount = "150.5".to_owned();
    let created = client.create_invoice(&form.submit()?)?;
    assert_eq!(created.id, InvoiceId::new(9));

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/invoices");
    let body = requests[0].json()?;
    assert_eq!(body["amount"], json!(150.5));
    assert_eq!(body["issue_date"], json!(null));
    assert_eq!(body["due_date"], json!(null));
    assert_eq!(body["status"], json!("unpaid"));
    assert!(body.get("id").is_none());
    Ok(())
}

#[test]
fn create_surfaces_server_error_text() -> Result<()> {
    let server = MockServer::start(vec![MockResponse::json(
        400,
        json!({"error": "invoice_number, client_name, amount are required"}),
    )])?;
    let client = client_for(&server)?;

    let mut form = CreateForm::new();
    form.invoice_number = "INV-2".to_owned();
    form.client_name = "Acme".to_owned();
    form.amount = "10".to_owned();
    let error = client
        .create_invoice(&form.submit()?)
        .expect_err("create should fail");
    assert_eq!(
        error.to_string(),
        "invoice_number, client_name, amount are required"
    );
    server.finish()?;
    Ok(())
}

#[test]
fn upload_sends_multipart_file_field() -> Result<()> {
    let mut record = seed_invoices().remove(2);
    record.pdf_path = Some("uploads/3_scan.pdf".to_owned());
    let server = MockServer::start(vec![MockResponse::json(200, invoice_json(&record))])?;
    let client = client_for(&server)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("scan.pdf");
    std::fs::write(&path, b"%PDF-1.4 test")?;

    let returned = client.upload_invoice_pdf(record.id, &path)?;
    assert!(returned.has_pdf());

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].path(), "/invoices/3/upload-pdf");
    let content_type = requests[0].content_type.clone().unwrap_or_default();
    assert!(content_type.starts_with("multipart/form-data"));
    let body = requests[0].body_text();
    assert!(body.contains(r#"name="file""#));
    assert!(body.contains(r#"filename="scan.pdf""#));
    assert!(body.contains("application/pdf"));
    assert!(body.contains("%PDF-1.4 test"));
    Ok(())
}

#[test]
fn upload_rejects_non_pdf_without_request() -> Result<()> {
    let server = MockServer::start(Vec::new())?;
    let client = client_for(&server)?;

    let dir = tempfile::tempdir()?;
    let path = dir.path().join("notes.txt");
    std::fs::write(&path, b"hello")?;
    let error = client
        .upload_invoice_pdf(InvoiceId::new(1), &path)
        .expect_err("non-pdf should be rejected");
    assert!(matches!(
        error.downcast_ref::<ApiError>(),
        Some(ApiError::InvalidUpload(_))
    ));

    let empty = dir.path().join("empty.pdf");
    std::fs::write(&empty, b"")?;
    assert!(client.upload_invoice_pdf(InvoiceId::new(1), &empty).is_err());

    assert!(server.finish()?.is_empty());
    Ok(())
}

#[test]
fn remove_pdf_returns_cleared_record() -> Result<()> {
    let record = seed_invoices().remove(0);
    let server = MockServer::start(vec![MockResponse::json(200, invoice_json(&record))])?;
    let client = client_for(&server)?;

    let returned = client.delete_invoice_pdf(record.id)?;
    assert!(!returned.has_pdf());

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path(), "/invoices/1/pdf");
    Ok(())
}

#[test]
fn remove_pdf_falls_back_to_fetch_on_message_body() -> Result<()> {
    let record = seed_invoices().remove(1);
    let server = MockServer::start(vec![
        MockResponse::json(200, json!({"message": "Nothing to delete"})),
        MockResponse::json(200, invoice_json(&record)),
    ])?;
    let client = client_for(&server)?;

    let returned = client.delete_invoice_pdf(record.id)?;
    assert_eq!(returned, record);

    let requests = server.finish()?;
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[1].method, "GET");
    assert_eq!(requests[1].path(), "/invoices/2");
    Ok(())
}

#[test]
fn delete_uses_status_only() -> Result<()> {
    let server = MockServer::start(vec![
        MockResponse::text(204, ""),
        MockResponse::text(404, "not found"),
    ])?;
    let client = client_for(&server)?;

    client.delete_invoice(InvoiceId::new(5))?;
    let error = client
        .delete_invoice(InvoiceId::new(6))
        .expect_err("missing record should fail");
    assert_eq!(error.to_string(), "delete failed");

    let requests = server.finish()?;
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].path(), "/invoices/5");
    Ok(())
}

#[test]
fn download_writes_pdf_into_cache_dir() -> Result<()> {
    let server = MockServer::start(vec![MockResponse::bytes(
        200,
        "application/pdf",
        b"%PDF-1.7 body".to_vec(),
    )])?;
    let client = client_for(&server)?;

    let dir = tempfile::tempdir()?;
    let path = client.download_pdf(InvoiceId::new(3), &dir.path().join("pdf"))?;
    assert_eq!(path.file_name().and_then(|name| name.to_str()), Some("invoice-3.pdf"));
    assert_eq!(std::fs::read(&path)?, b"%PDF-1.7 body");

    let requests = server.finish()?;
    assert_eq!(requests[0].path(), "/invoices/3/pdf");
    Ok(())
}
