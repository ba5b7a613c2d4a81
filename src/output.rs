//! Terminal rendering of session events and scheme cards.
//!
//! Cards go to stdout; status, transcription and error lines go to stderr
//! so the cards can be piped on their own.

use crate::catalog::{Category, DisplayedScheme, Scheme};
use crate::session::events::UiEvent;
use crate::session::state::SessionStatus;
use owo_colors::{AnsiColors, OwoColorize};
use std::io::{self, Write};

const CARD_FOOTER: &str = "Visit your nearest Common Service Centre (CSC) or Jan Seva Kendra \
with these documents to begin your application.";

const RULE_WIDTH: usize = 60;

/// Clear the current terminal line
pub fn clear_line() -> &'static str {
    "\r\x1b[2K"
}

/// Header color of a category.
pub fn category_color(category: Category) -> AnsiColors {
    match category {
        Category::Agriculture => AnsiColors::Green,
        Category::Health => AnsiColors::Red,
        Category::Education => AnsiColors::Blue,
        Category::Housing => AnsiColors::Yellow,
        Category::Finance => AnsiColors::Cyan,
        Category::Business => AnsiColors::Magenta,
        Category::SocialWelfare => AnsiColors::BrightBlue,
    }
}

/// Prompt shown for a session status.
pub fn status_line(status: SessionStatus) -> &'static str {
    match status {
        SessionStatus::Idle => "Press Enter to talk to Lingo",
        SessionStatus::Connecting => "Connecting...",
        SessionStatus::Listening => "Listening... (press Enter to end the call)",
        SessionStatus::Speaking => "Lingo is speaking... (press Enter to end the call)",
        SessionStatus::Error => "Session failed. Press Enter to try again",
    }
}

/// Render a scheme card.
pub fn format_scheme_card(scheme: &DisplayedScheme, color: bool) -> String {
    let base = scheme.scheme;
    let accent = category_color(base.category);
    let rule = "─".repeat(RULE_WIDTH);
    let mut out = String::new();

    out.push_str(&paint(&rule, color, |s| s.color(accent).to_string()));
    out.push('\n');
    let header = format!("{} · {}", base.category, base.year);
    out.push_str(&paint(&header, color, |s| s.color(accent).bold().to_string()));
    out.push('\n');
    out.push_str(&paint(scheme.name(), color, |s| s.bold().to_string()));
    out.push('\n');
    out.push_str(&paint(base.ministry, color, |s| s.dimmed().to_string()));
    out.push_str("\n\n");

    out.push_str(scheme.explanation());
    out.push_str("\n\n");

    out.push_str(&paint("Why you may be eligible", color, |s| {
        s.color(accent).bold().to_string()
    }));
    out.push('\n');
    out.push_str(scheme.eligibility());
    out.push_str("\n\n");

    out.push_str(&paint("Documents to bring", color, |s| {
        s.color(accent).bold().to_string()
    }));
    out.push('\n');
    for (idx, item) in scheme.checklist().iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", idx + 1, item));
    }
    out.push('\n');

    out.push_str(&paint(CARD_FOOTER, color, |s| s.dimmed().to_string()));
    out.push('\n');
    out.push_str(&paint(&rule, color, |s| s.color(accent).to_string()));
    out.push('\n');
    out
}

/// One line per scheme: id, category and name.
pub fn format_scheme_list(schemes: &[Scheme], color: bool) -> String {
    let width = schemes.iter().map(|s| s.id.len()).max().unwrap_or(0);
    let mut out = String::new();
    for scheme in schemes {
        let id = format!("{:<width$}", scheme.id);
        let category = format!("{:<14}", scheme.category.as_str());
        out.push_str(&format!(
            "  {}  {}  {}\n",
            paint(&id, color, |s| s.bold().to_string()),
            paint(&category, color, |s| s
                .color(category_color(scheme.category))
                .to_string()),
            scheme.name
        ));
    }
    out
}

fn paint(text: &str, color: bool, style: impl FnOnce(&str) -> String) -> String {
    if color {
        style(text)
    } else {
        text.to_string()
    }
}

/// Which live line is currently open on stderr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LiveLine {
    User,
    Model,
}

/// Renders [`UiEvent`]s for an interactive terminal.
///
/// Transcriptions update in place on one line per speaker; a turn end
/// (empty transcription) closes the line.
#[derive(Debug)]
pub struct Renderer {
    quiet: bool,
    color: bool,
    live: Option<LiveLine>,
}

impl Renderer {
    pub fn new(quiet: bool, color: bool) -> Self {
        Self {
            quiet,
            color,
            live: None,
        }
    }

    pub fn render(
        &mut self,
        event: &UiEvent,
        stdout: &mut impl Write,
        stderr: &mut impl Write,
    ) -> io::Result<()> {
        match event {
            UiEvent::StateChanged(status) => {
                self.close_live(stderr)?;
                if !self.quiet {
                    let line = status_line(*status);
                    let styled = match status {
                        SessionStatus::Error => paint(line, self.color, |s| s.red().to_string()),
                        SessionStatus::Listening => {
                            paint(line, self.color, |s| s.green().to_string())
                        }
                        SessionStatus::Speaking => {
                            paint(line, self.color, |s| s.cyan().to_string())
                        }
                        _ => paint(line, self.color, |s| s.dimmed().to_string()),
                    };
                    writeln!(stderr, "{}", styled)?;
                }
            }
            UiEvent::SchemeDisplayed(scheme) => {
                self.close_live(stderr)?;
                writeln!(stdout)?;
                write!(stdout, "{}", format_scheme_card(scheme, self.color))?;
                stdout.flush()?;
            }
            UiEvent::SchemeCleared => {
                self.close_live(stderr)?;
                if !self.quiet {
                    writeln!(
                        stderr,
                        "{}",
                        paint("(scheme card dismissed)", self.color, |s| s.dimmed().to_string())
                    )?;
                }
            }
            UiEvent::Transcription(text) => self.live_line(LiveLine::User, text, stderr)?,
            UiEvent::ResponseTranscription(text) => {
                self.live_line(LiveLine::Model, text, stderr)?
            }
            UiEvent::Error(message) => {
                self.close_live(stderr)?;
                writeln!(
                    stderr,
                    "{} {}",
                    paint("Error:", self.color, |s| s.red().bold().to_string()),
                    message
                )?;
            }
        }
        stderr.flush()
    }

    fn live_line(&mut self, line: LiveLine, text: &str, stderr: &mut impl Write) -> io::Result<()> {
        if self.quiet {
            return Ok(());
        }
        if text.is_empty() {
            if self.live == Some(line) {
                self.close_live(stderr)?;
            }
            return Ok(());
        }
        match self.live {
            Some(open) if open == line => write!(stderr, "{}", clear_line())?,
            Some(_) => writeln!(stderr)?,
            None => {}
        }
        let label = match line {
            LiveLine::User => paint("You:", self.color, |s| s.bold().to_string()),
            LiveLine::Model => paint("Lingo:", self.color, |s| s.cyan().bold().to_string()),
        };
        write!(stderr, "{} {}", label, text)?;
        self.live = Some(line);
        Ok(())
    }

    fn close_live(&mut self, stderr: &mut impl Write) -> io::Result<()> {
        if self.live.take().is_some() {
            writeln!(stderr)?;
        }
        Ok(())
    }
}
