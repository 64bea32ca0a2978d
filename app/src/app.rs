use crate::ui;
use anyhow::Result;
use gait_core::conversation::{CurrentSlot, SendError};
use gait_core::{FetchError, GaitClient, Registration};
use std::io::{BufRead, Write};
use std::sync::Arc;
use tokio::runtime::Runtime;
use tracing::error;

/// Whether the chat loop should keep reading input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

const CHAT_HELP: &str = "\
Type a question and press Enter.
  :history      list past questions
  :reload       fetch history from the server again
  :select N     show history entry N
  :delete N     remove history entry N (local only)
  :redo         ask the selected history entry again
  :retry        resend a failed question
  :new          clear the current question
  :logout       log out and leave
  :quit         leave";

/// Drives the client from the terminal. Every backend call is awaited on the
/// shared runtime before the next command is read.
pub struct ChatApp {
    client: GaitClient,
    runtime: Arc<Runtime>,
}

impl ChatApp {
    pub fn new(client: GaitClient, runtime: Arc<Runtime>) -> Self {
        Self { client, runtime }
    }

    pub fn client(&self) -> &GaitClient {
        &self.client
    }

    pub fn login(&self, email: &str, password: &str, out: &mut impl Write) -> Result<bool> {
        let session = self.client.session();
        match self.runtime.block_on(session.login(email, password)) {
            Ok(()) => {
                writeln!(out, "Logged in as {email}.")?;
                Ok(true)
            }
            Err(err) => {
                error!(%err, "login failed");
                writeln!(out, "Login failed. Check your email and password.")?;
                Ok(false)
            }
        }
    }

    pub fn register(&self, registration: &Registration, out: &mut impl Write) -> Result<bool> {
        let session = self.client.session();
        match self.runtime.block_on(session.register(registration)) {
            Ok(()) => {
                writeln!(
                    out,
                    "Account created for {}. Run `gait login` to start.",
                    registration.email
                )?;
                Ok(true)
            }
            Err(err) => {
                error!(%err, "registration failed");
                writeln!(out, "Could not create the account.")?;
                Ok(false)
            }
        }
    }

    pub fn logout(&self, out: &mut impl Write) -> Result<()> {
        self.client.session().logout();
        self.client.conversations().clear();
        writeln!(out, "Logged out.")?;
        Ok(())
    }

    pub fn status(&self, out: &mut impl Write) -> Result<()> {
        let session = self.client.session();
        session.ensure_valid();
        let credential = session.gateway().credential().ok().flatten();
        writeln!(out, "{}", ui::render_status(session.status(), credential.as_ref()))?;
        Ok(())
    }

    pub fn ask(&self, prompt: &str, out: &mut impl Write) -> Result<bool> {
        let conversations = self.client.conversations();
        let result = self.runtime.block_on(conversations.send_prompt(prompt));
        self.report_send(result, out)
    }

    pub fn history(&self, out: &mut impl Write) -> Result<bool> {
        let conversations = self.client.conversations();
        let loaded = self.runtime.block_on(conversations.ensure_history());
        self.report_history(loaded, out)
    }

    pub fn run_chat(&self, input: impl BufRead, out: &mut impl Write) -> Result<()> {
        if !self.client.session().ensure_valid() {
            writeln!(out, "{}", ui::render_status(self.client.session().status(), None))?;
            return Ok(());
        }
        writeln!(out, "Connected. `:help` lists commands.")?;
        self.history(out)?;
        for line in input.lines() {
            let line = line?;
            if self.handle_line(&line, out)? == Flow::Quit {
                break;
            }
        }
        Ok(())
    }

    pub fn handle_line(&self, line: &str, out: &mut impl Write) -> Result<Flow> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(Flow::Continue);
        }
        let Some(command) = line.strip_prefix(':') else {
            self.ask(line, out)?;
            return Ok(self.session_flow());
        };

        let mut parts = command.split_whitespace();
        let conversations = self.client.conversations();
        match (parts.next().unwrap_or_default(), parts.next()) {
            ("help", _) => writeln!(out, "{CHAT_HELP}")?,
            ("history", _) => {
                self.history(out)?;
            }
            ("reload", _) => {
                let loaded = self.runtime.block_on(conversations.load_history());
                self.report_history(loaded, out)?;
            }
            ("select", Some(n)) => match self.history_entry(n) {
                Some(entry) if conversations.select_from_history(&entry) => {
                    writeln!(out, "{}", ui::render_slot(&conversations.current()))?
                }
                _ => writeln!(out, "No history entry {n}.")?,
            },
            ("delete", Some(n)) => match self.history_entry(n) {
                Some(entry) if conversations.delete_from_history(&entry) => {
                    writeln!(out, "Removed \"{}\".", ui::snippet(&entry.prompt))?
                }
                _ => writeln!(out, "No history entry {n}.")?,
            },
            ("redo", _) => {
                let result = self.runtime.block_on(conversations.redo());
                self.report_send(result, out)?;
                return Ok(self.session_flow());
            }
            ("retry", _) => {
                let result = self.runtime.block_on(conversations.retry());
                self.report_send(result, out)?;
                return Ok(self.session_flow());
            }
            ("new", _) => {
                conversations.new_question();
                writeln!(out, "{}", ui::render_slot(&CurrentSlot::Empty))?;
            }
            ("logout", _) => {
                self.logout(out)?;
                return Ok(Flow::Quit);
            }
            ("quit" | "q", _) => return Ok(Flow::Quit),
            _ => writeln!(out, "Unknown command `{line}`. `:help` lists commands.")?,
        }
        Ok(Flow::Continue)
    }

    // Leave the loop once the backend has ended the session.
    fn session_flow(&self) -> Flow {
        if self.client.session().is_logged_in() {
            Flow::Continue
        } else {
            Flow::Quit
        }
    }

    fn history_entry(&self, position: &str) -> Option<gait_core::ConversationEntry> {
        let index = position.parse::<usize>().ok()?.checked_sub(1)?;
        self.client.conversations().history().get(index).cloned()
    }

    fn report_send(
        &self,
        result: Result<gait_core::ConversationEntry, SendError>,
        out: &mut impl Write,
    ) -> Result<bool> {
        match result {
            Ok(entry) => {
                writeln!(out, "{}", entry.answer)?;
                Ok(true)
            }
            Err(SendError::EmptyPrompt) => Ok(false),
            Err(err) => {
                writeln!(out, "{}", ui::describe_send_error(&err))?;
                Ok(false)
            }
        }
    }

    fn report_history(
        &self,
        loaded: Result<Vec<gait_core::ConversationEntry>, FetchError>,
        out: &mut impl Write,
    ) -> Result<bool> {
        match loaded {
            Ok(history) => {
                writeln!(out, "{}", ui::render_history(&history))?;
                Ok(true)
            }
            Err(FetchError::NotAuthenticated) | Err(FetchError::Unauthorized) => {
                writeln!(out, "Not logged in. Run `gait login`.")?;
                Ok(false)
            }
            Err(err) => {
                error!(%err, "history unavailable");
                writeln!(out, "History is unavailable right now.")?;
                Ok(false)
            }
        }
    }
}
