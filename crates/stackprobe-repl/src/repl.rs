//! Command dispatch for the debugger prompt.

use crate::commands::{Command, HELP};
use stackprobe::agent::Agent;
use stackprobe::session::navigator::{self, Direction};
use stackprobe::session::snapshot::{SnapshotDebugger, SnapshotError};
use stackprobe::session::Session;
use std::path::Path;
use tracing::debug;

/// What the prompt should do after a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Print(String),
    Silent,
    Quit,
}

/// Load a snapshot file into a session.
pub fn load_session(path: &Path, hide_external: bool) -> Result<Session, SnapshotError> {
    let debugger = SnapshotDebugger::from_path(path)?;
    Ok(Session::new(Box::new(debugger), hide_external))
}

pub struct Repl<'a> {
    agent: Agent<'a>,
    session: Session,
}

impl<'a> Repl<'a> {
    pub fn new(agent: Agent<'a>, session: Session) -> Self {
        Self { agent, session }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn agent(&self) -> &Agent<'a> {
        &self.agent
    }

    /// Current frame as `> path(line)function()` plus its source line.
    pub fn location(&mut self) -> String {
        let current = self.session.current_index();
        format!("> {}", self.session.format_stack_entry(current))
    }

    pub async fn handle(&mut self, command: Command) -> Step {
        debug!("Command: {command:?}");
        if !command.is_question() && command != Command::Empty {
            self.agent.record_command();
        }
        match command {
            Command::Ask(question) => match self.agent.ask(&mut self.session, &question).await {
                Ok(answer) => Step::Print(answer),
                Err(e) => Step::Print(format!("*** {e}")),
            },
            Command::Up => self.step(Direction::Up),
            Command::Down => self.step(Direction::Down),
            Command::Where => {
                let current = self.session.current_index();
                Step::Print(self.session.format_stack_trace(current))
            }
            Command::Print(expression) => {
                let Some(frame) = self.session.current_frame().map(|f| f.index) else {
                    return Step::Print("*** There is no active frame.".into());
                };
                match self.session.debugger().evaluate(frame, &expression) {
                    Ok(value) => Step::Print(value),
                    Err(e) => Step::Print(format!("*** {e}")),
                }
            }
            Command::Reset => {
                self.agent.reset();
                Step::Print("Conversation reset.".into())
            }
            Command::Help => Step::Print(HELP.into()),
            Command::Quit => Step::Quit,
            Command::Empty => Step::Silent,
            Command::Unknown(line) => Step::Print(format!(
                "*** Unknown command '{line}'. Type 'help' for a list of commands."
            )),
        }
    }

    fn step(&mut self, direction: Direction) -> Step {
        match navigator::move_frame(&mut self.session, direction) {
            Ok(_) => Step::Print(self.location()),
            Err(e) => Step::Print(format!("*** {e}")),
        }
    }
}
