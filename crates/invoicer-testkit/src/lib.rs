// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use invoicer_app::{Invoice, InvoiceId, InvoiceStatus};
use serde_json::{Value, json};
use std::io::Read;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use time::{Date, Duration as DateDuration, Month};
use tiny_http::{Header, Response, Server};

const CLIENT_ADJECTIVES: [&str; 12] = [
    "Premier",
    "Central",
    "Reliable",
    "Bright",
    "Quality",
    "Summit",
    "Eagle",
    "Heritage",
    "Greenleaf",
    "Sparks",
    "Hartley",
    "Apex",
];

const CLIENT_NOUNS: [&str; 8] = [
    "Logistics",
    "Foods",
    "Dynamics",
    "Textiles",
    "Labs",
    "Media",
    "Freight",
    "Systems",
];

const CLIENT_SUFFIXES: [&str; 6] = ["Inc", "LLC", "Co", "Group", "Ltd", "Partners"];

const REFERENCE_YEAR: i32 = 2025;
const MOCK_RECV_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn bool(&mut self) -> bool {
        (self.next_u64() & 1) == 1
    }
}

/// Deterministic invoice generator for tests and demo data.
#[derive(Debug, Clone)]
pub struct InvoiceFaker {
    rng: DeterministicRng,
    next_id: i64,
}

impl InvoiceFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
            next_id: 1,
        }
    }

    pub fn client_name(&mut self) -> String {
        let adjective = self.pick(&CLIENT_ADJECTIVES);
        let noun = self.pick(&CLIENT_NOUNS);
        let suffix = self.pick(&CLIENT_SUFFIXES);
        format!("{adjective} {noun} {suffix}")
    }

    pub fn invoice(&mut self) -> Invoice {
        let id = self.next_id;
        self.next_id += 1;

        let issue_offset = self.rng.int_n(365) as i64;
        let issue_date = reference_date().checked_add(DateDuration::days(issue_offset));
        let due_date = issue_date.and_then(|date| date.checked_add(DateDuration::days(30)));
        let cents = 5_000 + self.rng.int_n(500_000) as i64;
        let status = InvoiceStatus::ALL[self.rng.int_n(InvoiceStatus::ALL.len())];
        let has_pdf = self.rng.bool();

        Invoice {
            id: InvoiceId::new(id),
            invoice_number: format!("INV-{REFERENCE_YEAR}-{id:04}"),
            client_name: self.client_name(),
            amount: cents as f64 / 100.0,
            issue_date,
            due_date,
            status,
            pdf_path: has_pdf.then(|| format!("uploads/invoice-{id}-scan.pdf")),
        }
    }

    pub fn invoices(&mut self, count: usize) -> Vec<Invoice> {
        (0..count).map(|_| self.invoice()).collect()
    }

    fn pick<'a>(&mut self, values: &'a [&'a str]) -> &'a str {
        values[self.rng.int_n(values.len())]
    }
}

fn reference_date() -> Date {
    Date::from_calendar_date(REFERENCE_YEAR, Month::January, 1).unwrap_or(Date::MIN)
}

/// The three invoices a freshly seeded server starts with.
pub fn seed_invoices() -> Vec<Invoice> {
    let date = |month, day| Date::from_calendar_date(2025, month, day).ok();
    vec![
        Invoice {
            id: InvoiceId::new(1),
            invoice_number: "INV-2025-0001".to_owned(),
            client_name: "Acme Corp".to_owned(),
            amount: 1200.50,
            issue_date: date(Month::August, 1),
            due_date: date(Month::September, 1),
            status: InvoiceStatus::Unpaid,
            pdf_path: None,
        },
        Invoice {
            id: InvoiceId::new(2),
            invoice_number: "INV-2025-0002".to_owned(),
            client_name: "Globex".to_owned(),
            amount: 890.00,
            issue_date: date(Month::August, 5),
            due_date: date(Month::August, 25),
            status: InvoiceStatus::Paid,
            pdf_path: None,
        },
        Invoice {
            id: InvoiceId::new(3),
            invoice_number: "INV-2025-0003".to_owned(),
            client_name: "Initech".to_owned(),
            amount: 450.75,
            issue_date: date(Month::August, 10),
            due_date: date(Month::August, 30),
            status: InvoiceStatus::Overdue,
            pdf_path: None,
        },
    ]
}

pub fn invoice_json(invoice: &Invoice) -> Value {
    serde_json::to_value(invoice).unwrap_or(Value::Null)
}

pub fn page_json(items: &[Invoice], total: u64) -> Value {
    json!({
        "items": items.iter().map(invoice_json).collect::<Vec<_>>(),
        "total": total,
    })
}

/// A canned reply for [`MockServer`].
#[derive(Debug, Clone)]
pub struct MockResponse {
    status: u16,
    content_type: &'static str,
    body: Vec<u8>,
}

impl MockResponse {
    pub fn json(status: u16, value: Value) -> Self {
        Self {
            status,
            content_type: "application/json",
            body: value.to_string().into_bytes(),
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Self {
            status,
            content_type: "text/plain",
            body: body.as_bytes().to_vec(),
        }
    }

    pub fn bytes(status: u16, content_type: &'static str, body: Vec<u8>) -> Self {
        Self {
            status,
            content_type,
            body,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub url: String,
    pub content_type: Option<String>,
    pub body: Vec<u8>,
}

impl RecordedRequest {
    pub fn path(&self) -> &str {
        self.url.split('?').next().unwrap_or(&self.url)
    }

    pub fn query(&self) -> Option<&str> {
        self.url.split_once('?').map(|(_, query)| query)
    }

    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json(&self) -> Result<Value> {
        serde_json::from_slice(&self.body).context("decode recorded request body")
    }
}

/// Serves one scripted response per incoming request, in order, and records
/// what it received. Stops after the script runs out or when no request
/// arrives for a few seconds.
pub struct MockServer {
    base_url: String,
    handle: JoinHandle<Result<Vec<RecordedRequest>>>,
}

impl MockServer {
    pub fn start(script: Vec<MockResponse>) -> Result<Self> {
        let server =
            Server::http("127.0.0.1:0").map_err(|error| anyhow!("start mock server: {error}"))?;
        let base_url = format!("http://{}", server.server_addr());

        let handle = thread::spawn(move || {
            let mut recorded = Vec::new();
            for reply in script {
                let Some(mut request) = server
                    .recv_timeout(MOCK_RECV_TIMEOUT)
                    .context("receive mock request")?
                else {
                    break;
                };

                let content_type = request
                    .headers()
                    .iter()
                    .find(|header| header.field.equiv("Content-Type"))
                    .map(|header| header.value.as_str().to_owned());
                let mut body = Vec::new();
                request
                    .as_reader()
                    .read_to_end(&mut body)
                    .context("read mock request body")?;
                recorded.push(RecordedRequest {
                    method: request.method().to_string(),
                    url: request.url().to_owned(),
                    content_type,
                    body,
                });

                let header = Header::from_bytes("Content-Type", reply.content_type)
                    .map_err(|_| anyhow!("invalid mock content type"))?;
                let response = Response::from_data(reply.body)
                    .with_status_code(reply.status)
                    .with_header(header);
                request.respond(response).context("send mock response")?;
            }
            Ok(recorded)
        });

        Ok(Self { base_url, handle })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn finish(self) -> Result<Vec<RecordedRequest>> {
        self.handle
            .join()
            .map_err(|_| anyhow!("mock server thread panicked"))?
    }
}
