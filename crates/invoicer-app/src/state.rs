// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AppMode, ConfirmAction, FormKind, InvoiceId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub mode: AppMode,
    pub help_visible: bool,
    pub status_line: Option<String>,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            mode: AppMode::Nav,
            help_visible: false,
            status_line: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppCommand {
    ExitToNav,
    OpenForm(FormKind),
    Confirm(ConfirmAction),
    PromptUpload(InvoiceId),
    ToggleHelp,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppEvent {
    ModeChanged(AppMode),
    HelpVisibilityChanged(bool),
    StatusUpdated(String),
    StatusCleared,
}

impl AppState {
    pub fn dispatch(&mut self, command: AppCommand) -> Vec<AppEvent> {
        match command {
            AppCommand::ExitToNav => {
                self.mode = AppMode::Nav;
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::OpenForm(kind) => {
                self.mode = AppMode::Form(kind);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::Confirm(action) => {
                self.mode = AppMode::Confirm(action);
                vec![
                    AppEvent::ModeChanged(self.mode),
                    self.set_status(&format!("{} (y/n)", action.prompt())),
                ]
            }
            AppCommand::PromptUpload(id) => {
                self.mode = AppMode::UploadPrompt(id);
                vec![AppEvent::ModeChanged(self.mode)]
            }
            AppCommand::ToggleHelp => {
                self.help_visible = !self.help_visible;
                vec![AppEvent::HelpVisibilityChanged(self.help_visible)]
            }
            AppCommand::SetStatus(message) => vec![self.set_status(&message)],
            AppCommand::ClearStatus => {
                self.status_line = None;
                vec![AppEvent::StatusCleared]
            }
        }
    }

    pub fn in_overlay(&self) -> bool {
        self.mode != AppMode::Nav
    }

    fn set_status(&mut self, message: &str) -> AppEvent {
        self.status_line = Some(message.to_owned());
        AppEvent::StatusUpdated(message.to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::{AppCommand, AppEvent, AppState};
    use crate::{AppMode, ConfirmAction, FormKind, InvoiceId};

    #[test]
    fn mode_transitions() {
        let mut state = AppState::default();

        state.dispatch(AppCommand::OpenForm(FormKind::NewInvoice));
        assert_eq!(state.mode, AppMode::Form(FormKind::NewInvoice));
        assert!(state.in_overlay());

        state.dispatch(AppCommand::ExitToNav);
        assert_eq!(state.mode, AppMode::Nav);
        assert!(!state.in_overlay());
    }

    #[test]
    fn confirm_sets_prompt_status() {
        let mut state = AppState::default();
        let action = ConfirmAction::DeleteInvoice(InvoiceId::new(3));

        let events = state.dispatch(AppCommand::Confirm(action));
        assert_eq!(
            events,
            vec![
                AppEvent::ModeChanged(AppMode::Confirm(action)),
                AppEvent::StatusUpdated("delete invoice 3? (y/n)".to_owned()),
            ]
        );
    }

    #[test]
    fn status_set_and_clear() {
        let mut state = AppState::default();
        state.dispatch(AppCommand::SetStatus("saved".to_owned()));
        assert_eq!(state.status_line.as_deref(), Some("saved"));

        let events = state.dispatch(AppCommand::ClearStatus);
        assert_eq!(events, vec![AppEvent::StatusCleared]);
        assert_eq!(state.status_line, None);
    }

    #[test]
    fn help_toggles() {
        let mut state = AppState::default();
        assert_eq!(
            state.dispatch(AppCommand::ToggleHelp),
            vec![AppEvent::HelpVisibilityChanged(true)]
        );
        state.dispatch(AppCommand::ToggleHelp);
        assert!(!state.help_visible);
    }
}
