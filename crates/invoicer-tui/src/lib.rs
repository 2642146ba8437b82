// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use crossterm::{execute, terminal};
use invoicer_app::{
    AppCommand, AppEvent, AppMode, AppState, ConfirmAction, CreateForm, EditForm, FetchOutcome,
    FetchRequest, FilterForm, FormKind, FormRow, Invoice, InvoiceController, InvoiceId,
    InvoicePage, InvoicePatch, InvoiceQuery, InvoiceStatus, NewInvoice, PAGE_SIZE_OPTIONS,
    QueryState, SortDirection, SortField, SortSpec, format_amount, format_date,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, Wrap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::Duration;
use tracing::debug;

const STATUS_CLEAR_AFTER: Duration = Duration::from_secs(4);
const POLL_INTERVAL: Duration = Duration::from_millis(120);
const PDF_MARK: &str = "pdf";
const NO_PDF_MARK: &str = "-";

struct ColumnSpec {
    label: &'static str,
    sort: Option<SortField>,
}

const COLUMNS: [ColumnSpec; 8] = [
    ColumnSpec {
        label: "#",
        sort: None,
    },
    ColumnSpec {
        label: "invoice #",
        sort: Some(SortField::InvoiceNumber),
    },
    ColumnSpec {
        label: "client",
        sort: Some(SortField::ClientName),
    },
    ColumnSpec {
        label: "amount",
        sort: Some(SortField::Amount),
    },
    ColumnSpec {
        label: "issue",
        sort: Some(SortField::IssueDate),
    },
    ColumnSpec {
        label: "due",
        sort: Some(SortField::DueDate),
    },
    ColumnSpec {
        label: "status",
        sort: Some(SortField::Status),
    },
    ColumnSpec {
        label: "file",
        sort: None,
    },
];

/// Everything the UI needs from the outside world. List fetches go through
/// [`AppRuntime::spawn_list`] so an implementation can run them off the UI
/// thread; mutations are called inline.
pub trait AppRuntime {
    fn list_invoices(&mut self, query: &InvoiceQuery) -> Result<InvoicePage>;
    fn create_invoice(&mut self, invoice: &NewInvoice) -> Result<Invoice>;
    fn update_invoice(&mut self, id: InvoiceId, patch: &InvoicePatch) -> Result<Invoice>;
    fn delete_invoice(&mut self, id: InvoiceId) -> Result<()>;
    fn upload_pdf(&mut self, id: InvoiceId, path: &Path) -> Result<Invoice>;
    fn remove_pdf(&mut self, id: InvoiceId) -> Result<Invoice>;
    /// Makes the attached PDF available to the user and returns a status line.
    fn open_pdf(&mut self, id: InvoiceId) -> Result<String>;

    fn spawn_list(&mut self, request: FetchRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let result = self
            .list_invoices(&request.query)
            .map_err(|error| format!("{error:#}"));
        tx.send(InternalEvent::Fetched {
            seq: request.seq,
            result,
        })
        .map_err(|_| anyhow!("fetch event channel closed"))?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum InternalEvent {
    ClearStatus {
        token: u64,
    },
    Fetched {
        seq: u64,
        result: Result<InvoicePage, String>,
    },
}

/// Read-only view of one page of invoices, one text cell per column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableProjection {
    pub columns: Vec<String>,
    pub rows: Vec<TableRowProjection>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRowProjection {
    pub id: InvoiceId,
    pub has_pdf: bool,
    pub cells: Vec<String>,
}

impl TableProjection {
    pub fn from_rows(rows: &[Invoice], sort: Option<SortSpec>) -> Self {
        let columns = COLUMNS
            .iter()
            .map(|column| header_label(column, sort))
            .collect();
        let rows = rows
            .iter()
            .enumerate()
            .map(|(index, invoice)| TableRowProjection {
                id: invoice.id,
                has_pdf: invoice.has_pdf(),
                cells: vec![
                    (index + 1).to_string(),
                    invoice.invoice_number.clone(),
                    invoice.client_name.clone(),
                    format_amount(invoice.amount),
                    invoice.issue_date.map(format_date).unwrap_or_default(),
                    invoice.due_date.map(format_date).unwrap_or_default(),
                    invoice.status.as_str().to_owned(),
                    if invoice.has_pdf() {
                        PDF_MARK.to_owned()
                    } else {
                        NO_PDF_MARK.to_owned()
                    },
                ],
            })
            .collect();
        Self { columns, rows }
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }
}

fn header_label(column: &ColumnSpec, sort: Option<SortSpec>) -> String {
    match (column.sort, sort) {
        (Some(field), Some(active)) if field == active.field => {
            let arrow = match active.direction {
                SortDirection::Asc => "↑",
                SortDirection::Desc => "↓",
            };
            format!("{} {arrow}", column.label)
        }
        _ => column.label.to_owned(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ActiveForm {
    Edit(EditForm),
    Create(CreateForm),
    Filters(FilterForm),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TableCommand {
    MoveRow(isize),
    MoveColumn(isize),
    JumpFirstRow,
    JumpLastRow,
    JumpFirstColumn,
    JumpLastColumn,
    CycleSort,
    ClearSort,
    NextPage,
    PrevPage,
    GrowPageSize,
    ShrinkPageSize,
    CycleStatusFilter,
    Reload,
}

#[derive(Debug, Clone, PartialEq, Default)]
struct ViewData {
    controller: InvoiceController,
    selected_row: usize,
    selected_col: usize,
    form: Option<ActiveForm>,
    upload_path: String,
    status_token: u64,
}

impl ViewData {
    fn new(query: QueryState) -> Self {
        Self {
            controller: InvoiceController::new(query),
            ..Self::default()
        }
    }
}

pub fn run_app<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    query: QueryState,
) -> Result<()> {
    enable_raw_mode().context("enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).context("create terminal")?;

    let mut view_data = ViewData::new(query);
    let (internal_tx, internal_rx) = mpsc::channel();

    let initial = view_data.controller.reload();
    request_fetch(state, runtime, &mut view_data, &internal_tx, initial);

    let mut result = Ok(());
    loop {
        process_internal_events(state, &mut view_data, &internal_tx, &internal_rx);

        if let Err(error) = terminal.draw(|frame| render(frame, state, &view_data)) {
            result = Err(error).context("draw frame");
            break;
        }

        let has_event = match event::poll(POLL_INTERVAL).context("poll event") {
            Ok(has_event) => has_event,
            Err(error) => {
                result = Err(error);
                break;
            }
        };
        if has_event {
            match event::read().context("read event") {
                Ok(Event::Key(key)) => {
                    if handle_key_event(state, runtime, &mut view_data, &internal_tx, key) {
                        break;
                    }
                }
                Ok(_) => {}
                Err(error) => {
                    result = Err(error);
                    break;
                }
            }
        }
    }

    disable_raw_mode().context("disable raw mode")?;
    execute!(io::stdout(), terminal::LeaveAlternateScreen).context("leave alternate screen")?;
    result
}

fn process_internal_events(
    state: &mut AppState,
    view_data: &mut ViewData,
    tx: &Sender<InternalEvent>,
    rx: &Receiver<InternalEvent>,
) {
    while let Ok(event) = rx.try_recv() {
        match event {
            InternalEvent::ClearStatus { token } if token == view_data.status_token => {
                state.dispatch(AppCommand::ClearStatus);
            }
            InternalEvent::ClearStatus { .. } => {}
            InternalEvent::Fetched { seq, result } => {
                match view_data.controller.apply_fetch(seq, result) {
                    FetchOutcome::Applied { rows, total } => {
                        debug!(seq, rows, total, "invoice page applied");
                        clamp_table_cursor(view_data);
                    }
                    FetchOutcome::Failed(message) => {
                        emit_status(state, view_data, tx, message);
                    }
                    FetchOutcome::Discarded => {}
                }
            }
        }
    }
}

fn request_fetch<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    request: FetchRequest,
) {
    let seq = request.seq;
    debug!(seq, page = request.query.page, "fetching invoices");
    if let Err(error) = runtime.spawn_list(request, internal_tx.clone()) {
        let message = format!("load failed: {error:#}");
        view_data.controller.apply_fetch(seq, Err(message.clone()));
        emit_status(state, view_data, internal_tx, message);
    }
}

fn schedule_status_clear(internal_tx: &Sender<InternalEvent>, token: u64) {
    let sender = internal_tx.clone();
    thread::spawn(move || {
        thread::sleep(STATUS_CLEAR_AFTER);
        let _ = sender.send(InternalEvent::ClearStatus { token });
    });
}

fn emit_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    message: impl Into<String>,
) {
    state.dispatch(AppCommand::SetStatus(message.into()));
    view_data.status_token = view_data.status_token.saturating_add(1);
    schedule_status_clear(internal_tx, view_data.status_token);
}

fn dispatch_with_status(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: AppCommand,
) {
    let events = state.dispatch(command);
    if events
        .iter()
        .any(|event| matches!(event, AppEvent::StatusUpdated(_)))
    {
        view_data.status_token = view_data.status_token.saturating_add(1);
        schedule_status_clear(internal_tx, view_data.status_token);
    }
}

fn close_overlay(state: &mut AppState, view_data: &mut ViewData) {
    state.dispatch(AppCommand::ExitToNav);
    view_data.form = None;
    view_data.upload_path.clear();
}

fn handle_key_event<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if key.modifiers.contains(KeyModifiers::CONTROL)
        && matches!(key.code, KeyCode::Char('q') | KeyCode::Char('c'))
    {
        return true;
    }

    if state.help_visible {
        if matches!(key.code, KeyCode::Esc | KeyCode::Char('?')) {
            state.dispatch(AppCommand::ToggleHelp);
        }
        return false;
    }

    match state.mode {
        AppMode::Form(_) => {
            handle_form_key(state, runtime, view_data, internal_tx, key);
            false
        }
        AppMode::Confirm(action) => {
            handle_confirm_key(state, runtime, view_data, internal_tx, action, key);
            false
        }
        AppMode::UploadPrompt(id) => {
            handle_upload_prompt_key(state, runtime, view_data, internal_tx, id, key);
            false
        }
        AppMode::Nav => handle_nav_key(state, runtime, view_data, internal_tx, key),
    }
}

fn handle_nav_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) -> bool {
    if let Some(command) = table_command_for_key(key) {
        apply_table_command(state, runtime, view_data, internal_tx, command);
        return false;
    }

    match (key.code, key.modifiers) {
        (KeyCode::Char('q'), KeyModifiers::NONE) => return true,
        (KeyCode::Char('?'), _) => {
            state.dispatch(AppCommand::ToggleHelp);
        }
        (KeyCode::Char('e'), KeyModifiers::NONE) | (KeyCode::Enter, _) => {
            open_edit_form(state, view_data, internal_tx);
        }
        (KeyCode::Char('a'), KeyModifiers::NONE) => {
            view_data.form = Some(ActiveForm::Create(CreateForm::new()));
            state.dispatch(AppCommand::OpenForm(FormKind::NewInvoice));
        }
        (KeyCode::Char('/'), _) => {
            let filters = FilterForm::from_filters(&view_data.controller.query().filters);
            view_data.form = Some(ActiveForm::Filters(filters));
            state.dispatch(AppCommand::OpenForm(FormKind::Filters));
        }
        (KeyCode::Char('d'), KeyModifiers::NONE) => {
            if let Some(id) = selected_invoice(view_data).map(|invoice| invoice.id) {
                dispatch_with_status(
                    state,
                    view_data,
                    internal_tx,
                    AppCommand::Confirm(ConfirmAction::DeleteInvoice(id)),
                );
            } else {
                emit_status(state, view_data, internal_tx, "no invoice selected");
            }
        }
        (KeyCode::Char('u'), KeyModifiers::NONE) => {
            if let Some(id) = selected_invoice(view_data).map(|invoice| invoice.id) {
                view_data.upload_path.clear();
                state.dispatch(AppCommand::PromptUpload(id));
            } else {
                emit_status(state, view_data, internal_tx, "no invoice selected");
            }
        }
        (KeyCode::Char('x'), KeyModifiers::NONE) => {
            if let Some(id) = selected_pdf_invoice(state, view_data, internal_tx) {
                dispatch_with_status(
                    state,
                    view_data,
                    internal_tx,
                    AppCommand::Confirm(ConfirmAction::RemovePdf(id)),
                );
            }
        }
        (KeyCode::Char('o'), KeyModifiers::NONE) => {
            if let Some(id) = selected_pdf_invoice(state, view_data, internal_tx) {
                let message = match runtime.open_pdf(id) {
                    Ok(message) => message,
                    Err(error) => format!("open failed: {error:#}"),
                };
                emit_status(state, view_data, internal_tx, message);
            }
        }
        _ => {}
    }
    false
}

fn table_command_for_key(key: KeyEvent) -> Option<TableCommand> {
    match (key.code, key.modifiers) {
        (KeyCode::Char('j'), _) | (KeyCode::Down, _) => Some(TableCommand::MoveRow(1)),
        (KeyCode::Char('k'), _) | (KeyCode::Up, _) => Some(TableCommand::MoveRow(-1)),
        (KeyCode::Char('h'), _) | (KeyCode::Left, _) => Some(TableCommand::MoveColumn(-1)),
        (KeyCode::Char('l'), _) | (KeyCode::Right, _) => Some(TableCommand::MoveColumn(1)),
        (KeyCode::Char('g'), _) | (KeyCode::Home, _) => Some(TableCommand::JumpFirstRow),
        (KeyCode::Char('G'), _) | (KeyCode::End, _) => Some(TableCommand::JumpLastRow),
        (KeyCode::Char('^'), _) => Some(TableCommand::JumpFirstColumn),
        (KeyCode::Char('$'), _) => Some(TableCommand::JumpLastColumn),
        (KeyCode::Char('s'), KeyModifiers::NONE) => Some(TableCommand::CycleSort),
        (KeyCode::Char('S'), _) => Some(TableCommand::ClearSort),
        (KeyCode::Char('n'), KeyModifiers::NONE) | (KeyCode::PageDown, _) => {
            Some(TableCommand::NextPage)
        }
        (KeyCode::Char('p'), KeyModifiers::NONE) | (KeyCode::PageUp, _) => {
            Some(TableCommand::PrevPage)
        }
        (KeyCode::Char('+'), _) | (KeyCode::Char('='), _) => Some(TableCommand::GrowPageSize),
        (KeyCode::Char('-'), _) => Some(TableCommand::ShrinkPageSize),
        (KeyCode::Char('f'), KeyModifiers::NONE) => Some(TableCommand::CycleStatusFilter),
        (KeyCode::Char('r'), KeyModifiers::NONE) => Some(TableCommand::Reload),
        _ => None,
    }
}

fn apply_table_command<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    command: TableCommand,
) {
    let row_count = view_data.controller.rows().len();
    let request = match command {
        TableCommand::MoveRow(delta) => {
            view_data.selected_row = step_index(view_data.selected_row, row_count, delta);
            None
        }
        TableCommand::MoveColumn(delta) => {
            view_data.selected_col = step_index(view_data.selected_col, COLUMNS.len(), delta);
            None
        }
        TableCommand::JumpFirstRow => {
            view_data.selected_row = 0;
            None
        }
        TableCommand::JumpLastRow => {
            view_data.selected_row = row_count.saturating_sub(1);
            None
        }
        TableCommand::JumpFirstColumn => {
            view_data.selected_col = 0;
            None
        }
        TableCommand::JumpLastColumn => {
            view_data.selected_col = COLUMNS.len() - 1;
            None
        }
        TableCommand::CycleSort => {
            let column = &COLUMNS[view_data.selected_col];
            let Some(field) = column.sort else {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{} column is not sortable", column.label),
                );
                return;
            };
            let request = view_data.controller.cycle_sort(field);
            let message = match view_data.controller.query().sort {
                Some(sort) => format!("sort: {} {}", sort.field.as_str(), sort.direction.as_str()),
                None => "sort cleared".to_owned(),
            };
            emit_status(state, view_data, internal_tx, message);
            request
        }
        TableCommand::ClearSort => {
            let request = view_data.controller.clear_sort();
            if request.is_some() {
                emit_status(state, view_data, internal_tx, "sort cleared");
            }
            request
        }
        TableCommand::NextPage => {
            let request = view_data.controller.next_page();
            if request.is_none() {
                emit_status(state, view_data, internal_tx, "already on the last page");
            }
            request
        }
        TableCommand::PrevPage => {
            let request = view_data.controller.prev_page();
            if request.is_none() {
                emit_status(state, view_data, internal_tx, "already on the first page");
            }
            request
        }
        TableCommand::GrowPageSize | TableCommand::ShrinkPageSize => {
            let delta = if command == TableCommand::GrowPageSize {
                1
            } else {
                -1
            };
            let size = next_page_size(view_data.controller.query().page_size, delta);
            let request = view_data.controller.set_page_size(size);
            if request.is_some() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    format!("{size} rows per page"),
                );
            }
            request
        }
        TableCommand::CycleStatusFilter => {
            let request = view_data.controller.cycle_status_filter();
            let label = view_data
                .controller
                .query()
                .filters
                .status
                .map_or("all", InvoiceStatus::as_str);
            emit_status(state, view_data, internal_tx, format!("status: {label}"));
            request
        }
        TableCommand::Reload => Some(view_data.controller.reload()),
    };

    if let Some(request) = request {
        view_data.selected_row = 0;
        request_fetch(state, runtime, view_data, internal_tx, request);
    }
}

fn step_index(current: usize, len: usize, delta: isize) -> usize {
    if len == 0 {
        return 0;
    }
    let max = len as isize - 1;
    (current as isize + delta).clamp(0, max) as usize
}

/// Moves to the neighbouring page-size option, staying put at either end.
fn next_page_size(current: u32, delta: isize) -> u32 {
    let index = PAGE_SIZE_OPTIONS
        .iter()
        .position(|size| *size >= current)
        .unwrap_or(PAGE_SIZE_OPTIONS.len() - 1);
    let next = step_index(index, PAGE_SIZE_OPTIONS.len(), delta);
    PAGE_SIZE_OPTIONS[next]
}

fn selected_invoice(view_data: &ViewData) -> Option<&Invoice> {
    view_data.controller.rows().get(view_data.selected_row)
}

fn selected_pdf_invoice(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) -> Option<InvoiceId> {
    let Some(invoice) = selected_invoice(view_data) else {
        emit_status(state, view_data, internal_tx, "no invoice selected");
        return None;
    };
    if invoice.has_pdf() {
        return Some(invoice.id);
    }
    let message = format!("invoice {} has no PDF -- press u to attach one", invoice.id);
    emit_status(state, view_data, internal_tx, message);
    None
}

fn open_edit_form(
    state: &mut AppState,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(invoice) = selected_invoice(view_data) else {
        emit_status(state, view_data, internal_tx, "no invoice selected");
        return;
    };
    view_data.form = Some(ActiveForm::Edit(EditForm::open(invoice)));
    state.dispatch(AppCommand::OpenForm(FormKind::EditInvoice));
}

fn handle_form_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    key: KeyEvent,
) {
    let Some(form) = view_data.form.as_mut() else {
        close_overlay(state, view_data);
        return;
    };

    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            close_overlay(state, view_data);
            emit_status(state, view_data, internal_tx, "canceled");
        }
        (KeyCode::Enter, _) | (KeyCode::Char('s'), KeyModifiers::CONTROL) => {
            submit_form(state, runtime, view_data, internal_tx);
        }
        (KeyCode::Char('u'), KeyModifiers::CONTROL) => {
            if let ActiveForm::Filters(filters) = form {
                filters.clear();
            }
        }
        (KeyCode::Tab, _) | (KeyCode::Down, _) => form_move_focus(form, 1),
        (KeyCode::BackTab, _) | (KeyCode::Up, _) => form_move_focus(form, -1),
        (KeyCode::Right, _) => form_cycle_choice(form, 1),
        (KeyCode::Left, _) => form_cycle_choice(form, -1),
        (KeyCode::Backspace, _) => match form {
            ActiveForm::Edit(edit) => edit.backspace(),
            ActiveForm::Create(create) => create.backspace(),
            ActiveForm::Filters(filters) => filters.backspace(),
        },
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            match form {
                ActiveForm::Edit(edit) => edit.input_char(ch),
                ActiveForm::Create(create) => create.input_char(ch),
                ActiveForm::Filters(filters) => filters.input_char(ch),
            }
        }
        _ => {}
    }
}

fn form_move_focus(form: &mut ActiveForm, delta: isize) {
    match form {
        ActiveForm::Edit(edit) => edit.move_focus(delta),
        ActiveForm::Create(create) => create.move_focus(delta),
        ActiveForm::Filters(filters) => filters.move_focus(delta),
    }
}

fn form_cycle_choice(form: &mut ActiveForm, delta: isize) {
    match form {
        ActiveForm::Edit(edit) => edit.cycle_choice(delta),
        ActiveForm::Create(create) => create.cycle_choice(delta),
        ActiveForm::Filters(filters) => filters.cycle_choice(delta),
    }
}

fn submit_form<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
) {
    let Some(form) = view_data.form.clone() else {
        return;
    };

    let outcome = match form {
        ActiveForm::Edit(edit) => submit_edit(runtime, view_data, &edit),
        ActiveForm::Create(create) => submit_create(runtime, view_data, &create),
        ActiveForm::Filters(filters) => submit_filters(view_data, &filters),
    };

    match outcome {
        Ok((message, request)) => {
            close_overlay(state, view_data);
            emit_status(state, view_data, internal_tx, message);
            if let Some(request) = request {
                request_fetch(state, runtime, view_data, internal_tx, request);
            }
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("{error:#}"));
        }
    }
}

type Submitted = (String, Option<FetchRequest>);

fn submit_edit<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    form: &EditForm,
) -> Result<Submitted> {
    let patch = form.submit()?;
    let id = form.invoice_id();
    let updated = runtime.update_invoice(id, &patch)?;
    let request = view_data.controller.apply_updated(updated);
    Ok((
        format!("invoice {id}: {} updated", form.field().label()),
        Some(request),
    ))
}

fn submit_create<R: AppRuntime>(
    runtime: &mut R,
    view_data: &mut ViewData,
    form: &CreateForm,
) -> Result<Submitted> {
    let invoice = form.submit()?;
    let created = runtime.create_invoice(&invoice)?;
    let request = view_data.controller.apply_created(&created);
    Ok((
        format!("created invoice {} ({})", created.invoice_number, created.id),
        Some(request),
    ))
}

fn submit_filters(view_data: &mut ViewData, form: &FilterForm) -> Result<Submitted> {
    let filters = form.apply()?;
    let active = filters.active_count();
    let request = view_data.controller.set_filters(filters);
    let message = match active {
        0 => "filters cleared".to_owned(),
        1 => "1 filter active".to_owned(),
        count => format!("{count} filters active"),
    };
    Ok((message, request))
}

fn handle_confirm_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: ConfirmAction,
    key: KeyEvent,
) {
    match key.code {
        KeyCode::Char('y') | KeyCode::Char('Y') | KeyCode::Enter => {
            close_overlay(state, view_data);
            run_confirmed(state, runtime, view_data, internal_tx, action);
        }
        KeyCode::Char('n') | KeyCode::Char('N') | KeyCode::Esc => {
            close_overlay(state, view_data);
            emit_status(state, view_data, internal_tx, "canceled");
        }
        _ => {}
    }
}

fn run_confirmed<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    action: ConfirmAction,
) {
    let outcome = match action {
        ConfirmAction::DeleteInvoice(id) => runtime.delete_invoice(id).map(|()| {
            let request = view_data.controller.apply_deleted(id);
            clamp_table_cursor(view_data);
            (format!("deleted invoice {id}"), request)
        }),
        ConfirmAction::RemovePdf(id) => runtime.remove_pdf(id).map(|updated| {
            let request = view_data.controller.apply_updated(updated);
            (format!("removed PDF from invoice {id}"), request)
        }),
    };

    match outcome {
        Ok((message, request)) => {
            emit_status(state, view_data, internal_tx, message);
            request_fetch(state, runtime, view_data, internal_tx, request);
        }
        Err(error) => {
            emit_status(state, view_data, internal_tx, format!("{error:#}"));
        }
    }
}

fn handle_upload_prompt_key<R: AppRuntime>(
    state: &mut AppState,
    runtime: &mut R,
    view_data: &mut ViewData,
    internal_tx: &Sender<InternalEvent>,
    id: InvoiceId,
    key: KeyEvent,
) {
    match (key.code, key.modifiers) {
        (KeyCode::Esc, _) => {
            close_overlay(state, view_data);
            emit_status(state, view_data, internal_tx, "canceled");
        }
        (KeyCode::Enter, _) => {
            let raw = view_data.upload_path.trim().to_owned();
            if raw.is_empty() {
                emit_status(
                    state,
                    view_data,
                    internal_tx,
                    "enter the path to a PDF, or esc to cancel",
                );
                return;
            }
            let path = expand_home(&raw);
            match runtime.upload_pdf(id, &path) {
                Ok(updated) => {
                    let request = view_data.controller.apply_updated(updated);
                    close_overlay(state, view_data);
                    let name = path
                        .file_name()
                        .map(|name| name.to_string_lossy().into_owned())
                        .unwrap_or(raw);
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("attached {name} to invoice {id}"),
                    );
                    request_fetch(state, runtime, view_data, internal_tx, request);
                }
                Err(error) => {
                    emit_status(
                        state,
                        view_data,
                        internal_tx,
                        format!("upload failed: {error:#}"),
                    );
                }
            }
        }
        (KeyCode::Backspace, _) => {
            view_data.upload_path.pop();
        }
        (KeyCode::Char(ch), modifiers) if !modifiers.contains(KeyModifiers::CONTROL) => {
            view_data.upload_path.push(ch);
        }
        _ => {}
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix("~/")
        && let Some(home) = std::env::var_os("HOME")
    {
        return PathBuf::from(home).join(rest);
    }
    PathBuf::from(raw)
}

fn clamp_table_cursor(view_data: &mut ViewData) {
    let rows = view_data.controller.rows().len();
    view_data.selected_row = view_data.selected_row.min(rows.saturating_sub(1));
    view_data.selected_col = view_data.selected_col.min(COLUMNS.len() - 1);
}

fn render(frame: &mut ratatui::Frame<'_>, state: &AppState, view_data: &ViewData) {
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(1),
            Constraint::Length(3),
        ])
        .split(frame.area());

    let header = Paragraph::new(query_summary_text(view_data))
        .block(Block::default().title("invoicer").borders(Borders::ALL))
        .style(Style::default().fg(Color::White));
    frame.render_widget(header, layout[0]);

    render_table(frame, layout[1], view_data);

    let status_widget = Paragraph::new(status_text(state))
        .style(Style::default().fg(Color::Yellow))
        .wrap(Wrap { trim: true })
        .block(Block::default().borders(Borders::ALL));
    frame.render_widget(status_widget, layout[2]);

    match state.mode {
        AppMode::Form(kind) => {
            if let Some(form) = &view_data.form {
                let area = centered_rect(60, 60, frame.area());
                frame.render_widget(Clear, area);
                let title = match form {
                    ActiveForm::Edit(edit) => edit.title(),
                    _ => kind.label().to_owned(),
                };
                let widget = Paragraph::new(render_form_text(form))
                    .block(Block::default().title(title).borders(Borders::ALL));
                frame.render_widget(widget, area);
            }
        }
        AppMode::Confirm(action) => {
            let area = centered_rect(50, 20, frame.area());
            frame.render_widget(Clear, area);
            let widget = Paragraph::new(render_confirm_text(action))
                .style(Style::default().fg(Color::Red))
                .block(Block::default().title("confirm").borders(Borders::ALL));
            frame.render_widget(widget, area);
        }
        AppMode::UploadPrompt(id) => {
            let area = centered_rect(64, 24, frame.area());
            frame.render_widget(Clear, area);
            let has_pdf = view_data
                .controller
                .find(id)
                .is_some_and(Invoice::has_pdf);
            let widget =
                Paragraph::new(render_upload_prompt_text(id, has_pdf, &view_data.upload_path))
                    .block(Block::default().title("pdf").borders(Borders::ALL));
            frame.render_widget(widget, area);
        }
        AppMode::Nav => {}
    }

    if state.help_visible {
        let area = centered_rect(80, 72, frame.area());
        frame.render_widget(Clear, area);
        let help = Paragraph::new(help_overlay_text())
            .block(Block::default().title("help").borders(Borders::ALL));
        frame.render_widget(help, area);
    }
}

fn render_table(frame: &mut ratatui::Frame<'_>, area: Rect, view_data: &ViewData) {
    let projection = TableProjection::from_rows(
        view_data.controller.rows(),
        view_data.controller.query().sort,
    );
    let widths = [
        Constraint::Length(4),
        Constraint::Min(12),
        Constraint::Min(16),
        Constraint::Length(12),
        Constraint::Length(11),
        Constraint::Length(11),
        Constraint::Length(9),
        Constraint::Length(5),
    ];

    let header = Row::new(projection.columns.iter().enumerate().map(|(index, label)| {
        let mut style = Style::default()
            .fg(Color::White)
            .add_modifier(Modifier::BOLD);
        if index == view_data.selected_col {
            style = style.fg(Color::Cyan);
        }
        Cell::from(label.clone()).style(style)
    }));

    let rows = projection.rows.iter().enumerate().map(|(row_index, row)| {
        let selected_row = row_index == view_data.selected_row;
        let cells = row
            .cells
            .iter()
            .enumerate()
            .map(|(column_index, text)| {
                let mut style = Style::default();
                if selected_row {
                    style = style.bg(Color::DarkGray);
                }
                if selected_row && column_index == view_data.selected_col {
                    style = Style::default()
                        .fg(Color::Black)
                        .bg(Color::Cyan)
                        .add_modifier(Modifier::BOLD);
                }
                Cell::from(text.clone()).style(style)
            })
            .collect::<Vec<_>>();
        Row::new(cells)
    });

    let title = if projection.row_count() == 0 && !view_data.controller.is_loading() {
        "no invoices".to_owned()
    } else {
        format!("{} shown", projection.row_count())
    };
    let table = Table::new(rows, widths)
        .header(header)
        .column_spacing(1)
        .block(Block::default().title(title).borders(Borders::ALL));
    frame.render_widget(table, area);
}

fn query_summary_text(view_data: &ViewData) -> String {
    let controller = &view_data.controller;
    let query = controller.query();
    let mut parts = vec![
        format!("page {}/{}", query.page_index + 1, controller.page_count()),
        format!("{} per page", query.page_size),
        format!("{} invoices", controller.total()),
    ];
    if let Some(sort) = query.sort {
        parts.push(format!(
            "sort {} {}",
            sort.field.as_str(),
            sort.direction.as_str()
        ));
    }
    let filters = &query.filters;
    if !filters.client.trim().is_empty() {
        parts.push(format!("client~{}", filters.client.trim()));
    }
    if let Some(status) = filters.status {
        parts.push(format!("status={}", status.as_str()));
    }
    let hidden = filters.active_count()
        - usize::from(!filters.client.trim().is_empty())
        - usize::from(filters.status.is_some());
    if hidden > 0 {
        parts.push(format!("+{hidden} filters"));
    }
    if controller.is_loading() {
        parts.push("loading...".to_owned());
    }
    parts.join(" | ")
}

fn status_text(state: &AppState) -> String {
    if state.help_visible {
        return String::new();
    }
    let (mode, hints) = match state.mode {
        AppMode::Nav => (
            "NAV",
            "e edit | a new | d del | u upload | o open | x rm pdf | s/S sort | n/p page | +/- size | / filter | f status | ? help | q quit",
        ),
        AppMode::Form(_) => (
            "FORM",
            "tab/shift+tab field | left/right choose | enter save | esc cancel",
        ),
        AppMode::Confirm(_) => ("CONFIRM", "y confirm | n cancel"),
        AppMode::UploadPrompt(_) => ("UPLOAD", "type a path | enter upload | esc cancel"),
    };
    match &state.status_line {
        Some(status) => format!("{mode} | {status} | {hints}"),
        None => format!("{mode} | {hints}"),
    }
}

fn render_form_text(form: &ActiveForm) -> String {
    let (rows, focus, footer): (Vec<FormRow>, usize, &str) = match form {
        ActiveForm::Edit(edit) => (edit.rows(), edit.focus(), "enter save | esc cancel"),
        ActiveForm::Create(create) => (create.rows(), create.focus(), "enter create | esc cancel"),
        ActiveForm::Filters(filters) => (
            filters.rows(),
            filters.focus(),
            "enter apply | ctrl+u clear | esc cancel",
        ),
    };
    let mut lines = rows
        .iter()
        .enumerate()
        .map(|(index, row)| {
            let marker = if index == focus { ">" } else { " " };
            let value = if row.is_choice {
                format!("< {} >", row.value)
            } else if index == focus {
                format!("{}_", row.value)
            } else {
                row.value.clone()
            };
            format!("{marker} {:<12} {value}", format!("{}:", row.label))
        })
        .collect::<Vec<_>>();
    lines.push(String::new());
    lines.push(footer.to_owned());
    lines.join("\n")
}

fn render_confirm_text(action: ConfirmAction) -> String {
    format!("{}\n\ny yes | n no", action.prompt())
}

fn render_upload_prompt_text(id: InvoiceId, has_pdf: bool, path: &str) -> String {
    let verb = if has_pdf { "replace PDF on" } else { "attach PDF to" };
    format!("{verb} invoice {id}\n\npath: {path}_\n\nenter upload | esc cancel")
}

fn help_overlay_text() -> &'static str {
    "global: ctrl+q quit | ? help\n\
nav: j/k rows | h/l columns | g/G first/last row | ^/$ first/last column\n\
nav: n/p next/prev page | +/- page size | r reload\n\
nav: s sort column (asc, desc, off) | S clear sort\n\
nav: / filters | f cycle status filter\n\
nav: e/enter edit | a new | d delete\n\
pdf: u upload/replace | o open | x remove\n\
form: tab/shift+tab field | left/right choose | enter save | esc cancel\n\
filters: ctrl+u clear all\n\
confirm: y yes | n/esc no"
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
