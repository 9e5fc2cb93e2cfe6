//! Debugger prompt commands.

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `ask <question>` or `? <question>`.
    Ask(String),
    Up,
    Down,
    Where,
    /// `p <expression>`.
    Print(String),
    Reset,
    Help,
    Quit,
    /// Blank input. Not a command, so it never breaks a follow-up chain.
    Empty,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Command::Empty;
        }
        if let Some(rest) = line.strip_prefix('?') {
            return ask(rest);
        }
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        match word {
            "ask" => ask(rest),
            "up" | "u" if rest.is_empty() => Command::Up,
            "down" | "d" if rest.is_empty() => Command::Down,
            "where" | "w" | "bt" if rest.is_empty() => Command::Where,
            "p" | "print" if !rest.is_empty() => Command::Print(rest.to_string()),
            "reset" => Command::Reset,
            "help" | "h" => Command::Help,
            "quit" | "q" | "exit" => Command::Quit,
            _ => Command::Unknown(line.to_string()),
        }
    }

    /// Whether the command is a question for the agent.
    pub fn is_question(&self) -> bool {
        matches!(self, Command::Ask(_))
    }
}

fn ask(question: &str) -> Command {
    let question = question.trim();
    if question.is_empty() {
        Command::Unknown("ask".into())
    } else {
        Command::Ask(question.to_string())
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Ask(q) => write!(f, "ask {q}"),
            Command::Up => f.write_str("up"),
            Command::Down => f.write_str("down"),
            Command::Where => f.write_str("where"),
            Command::Print(e) => write!(f, "p {e}"),
            Command::Reset => f.write_str("reset"),
            Command::Help => f.write_str("help"),
            Command::Quit => f.write_str("quit"),
            Command::Empty => Ok(()),
            Command::Unknown(s) => f.write_str(s),
        }
    }
}

pub const HELP: &str = "Commands:
  ask <question>, ? <question>   ask about the program's state
  up, u                          move to the calling frame
  down, d                        move to the called frame
  where, w, bt                   print the stack trace
  p <expression>                 print the value of an expression
  reset                          start a new conversation
  help                           show this message
  quit, q                        exit

Questions asked back to back form one conversation; any other command
starts a new one.";
