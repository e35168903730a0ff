use std::io::{self, Write};

use murmur_client::SessionSnapshot;
use murmur_types::{ConnectionStatus, Message};

/// A line typed by the user.
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Say(String),
    Join(String),
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let trimmed = line.trim();
        if trimmed == "/quit" {
            return Self::Quit;
        }
        if let Some(rest) = trimmed.strip_prefix("/join") {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return Self::Join(rest.trim().to_string());
            }
        }
        Self::Say(line.to_string())
    }
}

/// Terminal renderer. Prints only what changed since the last snapshot.
pub struct View<W: Write> {
    out: W,
    room: Option<String>,
    status: Option<ConnectionStatus>,
    error_seq: u64,
    shown: Vec<Message>,
}

impl<W: Write> View<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            room: None,
            status: None,
            error_seq: 0,
            shown: Vec::new(),
        }
    }

    pub fn render(&mut self, snapshot: &SessionSnapshot) -> io::Result<()> {
        if snapshot.room != self.room {
            if let Some(room) = &snapshot.room {
                writeln!(self.out, "== #{} ==", room)?;
            }
            self.room = snapshot.room.clone();
            self.shown.clear();
        }

        if self.status != Some(snapshot.status) {
            let marker = if snapshot.status.is_connected() { '●' } else { '○' };
            writeln!(self.out, "{} {}", marker, snapshot.status)?;
            self.status = Some(snapshot.status);
        }

        if snapshot.error_seq != self.error_seq {
            if let Some(error) = &snapshot.last_error {
                writeln!(self.out, "! {}", error)?;
            }
            self.error_seq = snapshot.error_seq;
        }

        // History lands ahead of live lines, so redraw when the prefix moved.
        let start = if snapshot.timeline.starts_with(&self.shown) {
            self.shown.len()
        } else {
            if let Some(room) = &snapshot.room {
                writeln!(self.out, "-- #{} --", room)?;
            }
            0
        };
        for message in &snapshot.timeline[start..] {
            writeln!(self.out, "{}", format_line(message))?;
        }
        self.shown = snapshot.timeline.clone();
        self.out.flush()
    }

    pub fn notice(&mut self, text: &str) -> io::Result<()> {
        writeln!(self.out, "! {}", text)?;
        self.out.flush()
    }
}

fn format_line(message: &Message) -> String {
    if message.is_own {
        format!("{} you: {}", message.timestamp, message.text)
    } else {
        format!("{} {}: {}", message.timestamp, message.sender_id, message.text)
    }
}
