//! Plain-text rendering of decoded directives
//!
//! Reconstructs the printed page as text lines: justification is applied
//! with GBK column widths, separator rules are dropped, trailing spaces
//! are trimmed.

use crate::decoder::{Align, Directive};
use crate::encoding::gbk_width;

/// Characters width of an 80mm receipt (GBK columns)
pub const DEFAULT_LINE_WIDTH: usize = 42;

const SEPARATOR_CHARS: [char; 5] = ['-', '=', '_', '─', '═'];

/// Whether a line consists only of separator rule characters (ignoring whitespace)
pub fn is_separator_line(line: &str) -> bool {
    let mut saw_rule = false;
    for c in line.chars() {
        if c.is_whitespace() {
            continue;
        }
        if !SEPARATOR_CHARS.contains(&c) {
            return false;
        }
        saw_rule = true;
    }
    saw_rule
}

/// Renders a directive sequence into newline separated text
#[derive(Debug, Clone, Copy)]
pub struct PlainTextRenderer {
    width: usize,
}

impl Default for PlainTextRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_LINE_WIDTH)
    }
}

impl PlainTextRenderer {
    pub fn new(width: usize) -> Self {
        Self { width }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Render directives into text.
    ///
    /// Lines longer than the width are kept as they are (no wrapping).
    pub fn render(&self, directives: &[Directive]) -> String {
        let mut lines: Vec<String> = Vec::new();
        let mut current = String::new();
        let mut align = Align::Left;

        for directive in directives {
            match directive {
                Directive::Text(text) => {
                    if !is_separator_line(text) {
                        current.push_str(text);
                    }
                }
                Directive::LineFeed | Directive::Feed(_) => {
                    lines.push(self.justify(&current, align));
                    current.clear();
                }
                Directive::FeedLines(n) => {
                    lines.push(self.justify(&current, align));
                    current.clear();
                    for _ in 1..*n {
                        lines.push(String::new());
                    }
                }
                Directive::Align(a) => align = *a,
                Directive::Init => align = Align::Left,
                Directive::Cut => {
                    if !current.is_empty() {
                        lines.push(self.justify(&current, align));
                        current.clear();
                    }
                    lines.push(String::new());
                }
                _ => {}
            }
        }

        if !current.is_empty() {
            lines.push(self.justify(&current, align));
        }

        lines
            .iter()
            .map(|line| line.trim_end())
            .filter(|line| !is_separator_line(line))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn justify(&self, line: &str, align: Align) -> String {
        let width = gbk_width(line);
        if width >= self.width {
            return line.to_string();
        }
        let spare = self.width - width;
        match align {
            Align::Left => line.to_string(),
            Align::Center => format!("{}{}", " ".repeat(spare / 2), line),
            Align::Right => format!("{}{}", " ".repeat(spare), line),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::decode;

    fn text(s: &str) -> Directive {
        Directive::Text(s.to_string())
    }

    #[test]
    fn test_separator_detection() {
        assert!(is_separator_line("-----"));
        assert!(is_separator_line(" ═══ ─── "));
        assert!(!is_separator_line(""));
        assert!(!is_separator_line("--- 合计 ---"));
    }

    #[test]
    fn test_center_and_right_use_gbk_width() {
        let renderer = PlainTextRenderer::new(10);
        let out = renderer.render(&[
            Directive::Align(Align::Center),
            text("桌号"),
            Directive::LineFeed,
            Directive::Align(Align::Right),
            text("8"),
            Directive::LineFeed,
        ]);
        assert_eq!(out, "   桌号\n         8");
    }

    #[test]
    fn test_separators_are_dropped() {
        let out = PlainTextRenderer::default().render(&[
            text("A"),
            Directive::LineFeed,
            text("=========="),
            Directive::LineFeed,
            text("B"),
        ]);
        assert_eq!(out, "A\n\nB");
    }

    #[test]
    fn test_init_resets_alignment() {
        let out = PlainTextRenderer::new(6).render(&[
            Directive::Align(Align::Right),
            Directive::Init,
            text("ab"),
            Directive::LineFeed,
        ]);
        assert_eq!(out, "ab");
    }

    #[test]
    fn test_feed_lines_and_cut() {
        let out = PlainTextRenderer::default().render(&[
            text("A"),
            Directive::FeedLines(3),
            text("B"),
            Directive::Cut,
            text("C"),
        ]);
        assert_eq!(out, "A\n\n\nB\n\nC");
    }

    #[test]
    fn test_long_lines_are_not_wrapped() {
        let long = "x".repeat(60);
        let out = PlainTextRenderer::default().render(&[
            Directive::Align(Align::Center),
            text(&long),
        ]);
        assert_eq!(out, long);
    }

    #[test]
    fn test_render_decoded_stream() {
        let data = b"\x1b@\x1ba\x01Kitchen\n\x1ba\x00Table 8   \n--------\n\x1dV\x00";
        let directives = decode(data).unwrap();
        let out = PlainTextRenderer::new(21).render(&directives);
        // the dropped rule still leaves its line feed, the cut adds a blank line
        assert_eq!(out, "       Kitchen\nTable 8\n\n");
    }
}
