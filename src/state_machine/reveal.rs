//! Message reveal engine (pure part)
//!
//! A reveal displays a complete text one character per tick. The runtime
//! drives the ticks; this type only tracks how much is shown.

use serde::Serialize;

/// Progress of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevealStep<'a> {
    /// One more character is shown; the displayed prefix so far
    Partial(&'a str),
    /// The full text was already displayed; the reveal is done
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Reveal {
    text: String,
    /// Byte offset of the end of the displayed prefix (always a char boundary)
    #[serde(skip)]
    shown_bytes: usize,
    shown_chars: usize,
    total_chars: usize,
}

impl Reveal {
    pub fn new(text: impl Into<String>) -> Self {
        let text = text.into();
        let total_chars = text.chars().count();
        Self {
            text,
            shown_bytes: 0,
            shown_chars: 0,
            total_chars,
        }
    }

    /// Ticks needed from start to completion: one per character plus the
    /// completing tick.
    pub fn ticks_required(&self) -> usize {
        self.total_chars + 1
    }

    /// Advance by one tick.
    pub fn tick(&mut self) -> RevealStep<'_> {
        let next = self
            .text
            .get(self.shown_bytes..)
            .and_then(|rest| rest.chars().next());

        match next {
            Some(c) => {
                self.shown_bytes += c.len_utf8();
                self.shown_chars += 1;
                RevealStep::Partial(self.displayed())
            }
            None => RevealStep::Complete,
        }
    }

    /// The prefix displayed so far
    pub fn displayed(&self) -> &str {
        self.text.get(..self.shown_bytes).unwrap_or_default()
    }

    pub fn full_text(&self) -> &str {
        &self.text
    }
}
