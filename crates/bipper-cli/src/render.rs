//! Terminal output for a running countdown.

use std::io::{self, Write};
use std::time::Duration;

use bipper_core::document::format_duration;
use bipper_core::{Observer, SectionInfo, Update};
use chrono::{SecondsFormat, Utc};
use serde_json::json;

/// How updates are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// A live status line plus one line per section and message.
    Text { show_document: bool },
    /// One JSON object per update.
    Json,
}

/// `mm:ss`, or `h:mm:ss` from one hour up.
pub fn format_clock(duration: Duration) -> String {
    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{h}:{m:02}:{s:02}")
    } else {
        format!("{m:02}:{s:02}")
    }
}

pub struct Renderer<W: Write> {
    out: W,
    mode: Mode,
    section: Option<SectionInfo>,
    remaining: Duration,
    total: Duration,
    status_drawn: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, mode: Mode) -> Self {
        Self {
            out,
            mode,
            section: None,
            remaining: Duration::ZERO,
            total: Duration::ZERO,
            status_drawn: false,
        }
    }

    pub fn handle(&mut self, update: &Update) -> io::Result<()> {
        match self.mode {
            Mode::Json => self.write_json(update),
            Mode::Text { show_document } => self.write_text(update, show_document),
        }
    }

    /// End the status line so the shell prompt starts on a fresh line.
    pub fn finish(&mut self) -> io::Result<()> {
        self.clear_status()?;
        self.out.flush()
    }

    fn write_json(&mut self, update: &Update) -> io::Result<()> {
        let value = match update {
            Update::Document(raw) => json!(raw),
            Update::Section(info) => {
                json!({ "name": info.name, "duration_secs": info.duration.as_secs() })
            }
            Update::Remaining(left) => json!(left.as_secs()),
            Update::Message(text) => json!(text),
            Update::TotalRemaining(total) => json!(total.as_secs()),
        };
        let line = json!({
            "at": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "port": update.port(),
            "value": value,
        });
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn write_text(&mut self, update: &Update, show_document: bool) -> io::Result<()> {
        match update {
            Update::Document(raw) => {
                if show_document && !raw.is_empty() {
                    self.clear_status()?;
                    writeln!(self.out, "{}", raw.trim_end())?;
                }
            }
            Update::Section(info) => {
                self.clear_status()?;
                if !info.name.is_empty() {
                    writeln!(
                        self.out,
                        "== {} ({}) ==",
                        info.name,
                        format_duration(info.duration)
                    )?;
                }
                self.section = Some(info.clone());
            }
            Update::Message(text) => {
                self.clear_status()?;
                writeln!(self.out, "{text}")?;
            }
            Update::Remaining(left) => {
                self.remaining = *left;
                self.draw_status()?;
            }
            Update::TotalRemaining(total) => {
                self.total = *total;
                self.draw_status()?;
            }
        }
        self.out.flush()
    }

    fn draw_status(&mut self) -> io::Result<()> {
        let name = self
            .section
            .as_ref()
            .map(|s| s.name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or("-");
        // Trailing spaces wipe leftovers from a longer previous line.
        write!(
            self.out,
            "\r  {}  {}  (total {})    ",
            format_clock(self.remaining),
            name,
            format_clock(self.total)
        )?;
        self.status_drawn = true;
        Ok(())
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.status_drawn {
            writeln!(self.out)?;
            self.status_drawn = false;
        }
        Ok(())
    }
}

/// Render every update until the engine closes its ports.
pub async fn drive<W: Write>(mut observer: Observer, mut renderer: Renderer<W>) -> io::Result<()> {
    while let Some(update) = observer.recv().await {
        renderer.handle(&update)?;
    }
    renderer.finish()
}
