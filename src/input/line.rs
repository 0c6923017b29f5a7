//! Shell line editing with history recall.
//!
//! The editor only tracks text; [`LineEditor::feed`] reports what changed so
//! the caller can echo it on whatever console it owns.

use alloc::collections::VecDeque;
use alloc::string::String;

use crate::config::{CMD_BUF_SIZE, HISTORY_LEN};

use super::keyboard::{KEY_DOWN, KEY_UP};

const BACKSPACE: u8 = 0x08;

/// Longest line the editor accepts.
pub const MAX_LINE: usize = CMD_BUF_SIZE - 1;

/// Result of feeding one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edit {
    /// Nothing to show.
    Ignored,
    /// Character appended; echo it.
    Echo(u8),
    /// Last character removed.
    Erase,
    /// The visible line was replaced by a history entry: erase `erased`
    /// characters, then print [`LineEditor::line`].
    Recall { erased: usize },
    /// Enter pressed; collect the line with [`LineEditor::submit`].
    Submit,
}

pub struct LineEditor {
    line: String,
    history: VecDeque<String>,
    /// Index into `history` while browsing it.
    browsing: Option<usize>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self {
            line: String::with_capacity(MAX_LINE),
            history: VecDeque::with_capacity(HISTORY_LEN),
            browsing: None,
        }
    }

    pub fn line(&self) -> &str {
        &self.line
    }

    pub fn feed(&mut self, key: u8) -> Edit {
        match key {
            b'\n' => Edit::Submit,
            BACKSPACE => {
                if self.line.pop().is_some() {
                    Edit::Erase
                } else {
                    Edit::Ignored
                }
            }
            KEY_UP => self.recall_older(),
            KEY_DOWN => self.recall_newer(),
            0x20..=0x7E => {
                if self.line.len() < MAX_LINE {
                    self.line.push(char::from(key));
                    Edit::Echo(key)
                } else {
                    Edit::Ignored
                }
            }
            _ => Edit::Ignored,
        }
    }

    fn recall_older(&mut self) -> Edit {
        let index = match self.browsing {
            None if self.history.is_empty() => return Edit::Ignored,
            None => self.history.len() - 1,
            Some(0) => return Edit::Ignored,
            Some(i) => i - 1,
        };
        self.show_history(Some(index))
    }

    fn recall_newer(&mut self) -> Edit {
        match self.browsing {
            None => Edit::Ignored,
            Some(i) if i + 1 < self.history.len() => self.show_history(Some(i + 1)),
            Some(_) => self.show_history(None),
        }
    }

    fn show_history(&mut self, index: Option<usize>) -> Edit {
        let erased = self.line.len();
        self.line.clear();
        if let Some(entry) = index.and_then(|i| self.history.get(i)) {
            self.line.push_str(entry);
        }
        self.browsing = index;
        Edit::Recall { erased }
    }

    /// Takes the finished line and remembers it; blank lines and immediate
    /// repeats are not stored.
    pub fn submit(&mut self) -> String {
        self.browsing = None;
        let line = core::mem::take(&mut self.line);
        let keep = !line.trim().is_empty()
            && self.history.back().map_or(true, |last| *last != line);
        if keep {
            if self.history.len() == HISTORY_LEN {
                self.history.pop_front();
            }
            self.history.push_back(line.clone());
        }
        line
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }
}

impl Default for LineEditor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn type_line(ed: &mut LineEditor, text: &str) -> String {
        for b in text.bytes() {
            ed.feed(b);
        }
        assert_eq!(ed.feed(b'\n'), Edit::Submit);
        ed.submit()
    }

    #[test]
    fn typing_and_backspace() {
        let mut ed = LineEditor::new();
        assert_eq!(ed.feed(b'l'), Edit::Echo(b'l'));
        assert_eq!(ed.feed(b's'), Edit::Echo(b's'));
        assert_eq!(ed.feed(b'x'), Edit::Echo(b'x'));
        assert_eq!(ed.feed(BACKSPACE), Edit::Erase);
        assert_eq!(ed.line(), "ls");
        assert_eq!(ed.feed(0x1B), Edit::Ignored);
        assert_eq!(ed.submit(), "ls");
        assert_eq!(ed.feed(BACKSPACE), Edit::Ignored);
    }

    #[test]
    fn line_length_is_capped() {
        let mut ed = LineEditor::new();
        for _ in 0..CMD_BUF_SIZE + 10 {
            ed.feed(b'a');
        }
        assert_eq!(ed.line().len(), MAX_LINE);
        assert_eq!(ed.feed(b'b'), Edit::Ignored);
    }

    #[test]
    fn history_up_and_down() {
        let mut ed = LineEditor::new();
        type_line(&mut ed, "dir");
        type_line(&mut ed, "type log.txt");

        ed.feed(b'x');
        assert_eq!(ed.feed(KEY_UP), Edit::Recall { erased: 1 });
        assert_eq!(ed.line(), "type log.txt");
        assert_eq!(ed.feed(KEY_UP), Edit::Recall { erased: 12 });
        assert_eq!(ed.line(), "dir");
        assert_eq!(ed.feed(KEY_UP), Edit::Ignored);
        assert_eq!(ed.feed(KEY_DOWN), Edit::Recall { erased: 3 });
        assert_eq!(ed.line(), "type log.txt");
        assert_eq!(ed.feed(KEY_DOWN), Edit::Recall { erased: 12 });
        assert_eq!(ed.line(), "");
        assert_eq!(ed.feed(KEY_DOWN), Edit::Ignored);
    }

    #[test]
    fn history_skips_blanks_and_repeats_and_is_bounded() {
        let mut ed = LineEditor::new();
        type_line(&mut ed, "   ");
        type_line(&mut ed, "ver");
        type_line(&mut ed, "ver");
        assert_eq!(ed.history_len(), 1);

        for i in 0..HISTORY_LEN + 3 {
            type_line(&mut ed, &format!("echo {i}"));
        }
        assert_eq!(ed.history_len(), HISTORY_LEN);
        ed.feed(KEY_UP);
        assert_eq!(ed.line(), format!("echo {}", HISTORY_LEN + 2));
    }
}
