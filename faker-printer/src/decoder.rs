//! ESC/POS command decoder
//!
//! Scans a captured byte buffer left to right and produces the ordered list
//! of [`Directive`]s it encodes. Runs of printable bytes become text,
//! recognized commands become typed directives, unknown control bytes are
//! dropped.

use crate::encoding::decode_text;
use crate::error::{DecodeError, DecodeResult};
use crate::opcode::{self, DLE, ESC, FS, GS, LF, NUL};
use tracing::{instrument, trace};

/// Justification selected by `ESC a n`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Align {
    #[default]
    Left,
    Center,
    Right,
}

impl Align {
    /// Both the binary (0/1/2) and ASCII ('0'/'1'/'2') parameter forms are accepted
    pub fn from_param(n: u8) -> Self {
        match n {
            1 | b'1' => Align::Center,
            2 | b'2' => Align::Right,
            _ => Align::Left,
        }
    }
}

/// Which status/identification request a terminal sent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    /// `DLE EOT n`
    RealTime(u8),
    /// `GS r n`
    Transmit(u8),
    /// `GS a n`
    AutoStatus(u8),
    /// `GS I n`
    Identify(u8),
}

/// One decoded printer instruction or text run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    Text(String),
    LineFeed,
    Init,
    Cut,
    Bold(bool),
    Align(Align),
    SizeMode(u8),
    PrintMode(u8),
    CjkMode(u8),
    Kanji(bool),
    Reverse(bool),
    /// `ESC J n`: print and feed `n` dots
    Feed(u8),
    /// `ESC d n`: print and feed `n` lines
    FeedLines(u8),
    VerticalTabs(Vec<u8>),
    /// Raster image; `width` is in bytes per row (8 dots each)
    Image { width: u32, height: u32 },
    StatusQuery(StatusKind),
}

/// Decode a complete print job.
///
/// Stateless across calls. Fails only when a raster image header is cut short
/// or declares more payload than the buffer holds.
#[instrument(skip(data), fields(len = data.len()))]
pub fn decode(data: &[u8]) -> DecodeResult<Vec<Directive>> {
    let mut decoder = Decoder {
        data,
        pos: 0,
        out: Vec::new(),
    };
    decoder.run()?;
    trace!(directives = decoder.out.len(), "decode finished");
    Ok(decoder.out)
}

struct Decoder<'a> {
    data: &'a [u8],
    pos: usize,
    out: Vec<Directive>,
}

impl Decoder<'_> {
    fn run(&mut self) -> DecodeResult<()> {
        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            match b {
                ESC | GS | FS | DLE => {
                    if !self.command()? {
                        // Unknown command prefix: drop the control byte only
                        self.pos += 1;
                    }
                }
                LF => {
                    self.out.push(Directive::LineFeed);
                    self.pos += 1;
                }
                b if b < 0x20 => self.pos += 1,
                _ => self.text_run(),
            }
        }
        Ok(())
    }

    /// Parameter byte at `offset` past the current position
    fn param(&self, offset: usize) -> Option<u8> {
        self.data.get(self.pos + offset).copied()
    }

    /// Emit a directive built from a single parameter byte, consuming 3 bytes.
    ///
    /// A command cut off before its parameter ends the stream.
    fn with_param(&mut self, build: impl FnOnce(u8) -> Directive) {
        match self.param(2) {
            Some(n) => {
                self.out.push(build(n));
                self.pos += 3;
            }
            None => {
                trace!(offset = self.pos, "command without parameter at end of stream");
                self.pos = self.data.len();
            }
        }
    }

    /// Try to decode a command at the current position.
    ///
    /// Returns `false` when the bytes do not form a recognized command.
    fn command(&mut self) -> DecodeResult<bool> {
        let Some(code) = self.param(1) else {
            return Ok(false);
        };

        match [self.data[self.pos], code] {
            opcode::INIT => {
                self.out.push(Directive::Init);
                self.pos += 2;
            }
            opcode::CUT => self.cut(),
            opcode::BOLD => self.with_param(|n| Directive::Bold(n & 0x01 != 0)),
            opcode::PRINT_MODE => self.with_param(Directive::PrintMode),
            opcode::CJK_MODE => self.with_param(Directive::CjkMode),
            opcode::SIZE => self.with_param(Directive::SizeMode),
            opcode::ALIGN => self.with_param(|n| Directive::Align(Align::from_param(n))),
            opcode::AUTO_STATUS => {
                self.with_param(|n| Directive::StatusQuery(StatusKind::AutoStatus(n)))
            }
            opcode::REVERSE => self.with_param(|n| Directive::Reverse(n & 0x01 != 0)),
            opcode::FEED => self.with_param(Directive::Feed),
            opcode::FEED_LINES => self.with_param(Directive::FeedLines),
            opcode::VERTICAL_TABS => self.vertical_tabs(),
            opcode::TRANSMIT_STATUS => {
                self.with_param(|n| Directive::StatusQuery(StatusKind::Transmit(n)))
            }
            opcode::REALTIME_STATUS => {
                self.with_param(|n| Directive::StatusQuery(StatusKind::RealTime(n)))
            }
            opcode::IDENTIFY => self.with_param(|n| Directive::StatusQuery(StatusKind::Identify(n))),
            opcode::KANJI_ON => {
                self.out.push(Directive::Kanji(true));
                self.pos += 2;
            }
            opcode::KANJI_OFF => {
                self.out.push(Directive::Kanji(false));
                self.pos += 2;
            }
            [GS, b'v'] if self.param(2) == Some(b'0') => self.raster_image()?,
            _ => return Ok(false),
        }
        Ok(true)
    }

    /// `GS V m` or `GS V m n` (function B, m = 65/66, carries a feed amount)
    fn cut(&mut self) {
        self.out.push(Directive::Cut);
        self.pos += match self.param(2) {
            Some(0x41 | 0x42) if self.param(3).is_some() => 4,
            Some(_) => 3,
            None => 2,
        };
    }

    /// `ESC B n1 ... nk NUL`: parameters run until NUL or the next recognized command
    fn vertical_tabs(&mut self) {
        self.pos += 2;
        let mut stops = Vec::new();
        while self.pos < self.data.len() {
            let b = self.data[self.pos];
            if b == NUL {
                self.pos += 1;
                break;
            }
            if opcode::starts_command(self.data, self.pos) {
                break;
            }
            stops.push(b);
            self.pos += 1;
        }
        self.out.push(Directive::VerticalTabs(stops));
    }

    /// `GS v 0 m xL xH yL yH d1...dk`, k = (xL + xH*256) * (yL + yH*256)
    fn raster_image(&mut self) -> DecodeResult<()> {
        let offset = self.pos;
        let header = self
            .data
            .get(offset + 4..offset + 8)
            .ok_or(DecodeError::TruncatedHeader {
                command: "GS v 0",
                offset,
            })?;

        let width = u32::from(header[0]) + u32::from(header[1]) * 256;
        let height = u32::from(header[2]) + u32::from(header[3]) * 256;
        let needed = (width as usize) * (height as usize);
        let start = offset + 8;
        let available = self.data.len() - start;

        if needed > available {
            return Err(DecodeError::ImageOverrun {
                offset,
                width,
                height,
                needed,
                available,
            });
        }

        self.out.push(Directive::Image { width, height });
        self.pos = start + needed;
        Ok(())
    }

    /// Collect printable bytes up to the next control byte and decode them as text
    fn text_run(&mut self) {
        let start = self.pos;
        while self.pos < self.data.len() && self.data[self.pos] >= 0x20 {
            self.pos += 1;
        }

        let text = decode_text(&self.data[start..self.pos]);
        if !text.trim().is_empty() {
            self.out.push(Directive::Text(text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_and_line_feeds() {
        let directives = decode(b"\x1b@A\nB\x1dV\x00").unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Init,
                Directive::Text("A".into()),
                Directive::LineFeed,
                Directive::Text("B".into()),
                Directive::Cut,
            ]
        );
    }

    #[test]
    fn test_formatting_commands() {
        let directives = decode(b"\x1bE\x01\x1da\x00\x1d!\x11\x1b\x61\x01\x1dB\x01\x1c!\x0c").unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Bold(true),
                Directive::StatusQuery(StatusKind::AutoStatus(0)),
                Directive::SizeMode(0x11),
                Directive::Align(Align::Center),
                Directive::Reverse(true),
                Directive::CjkMode(0x0c),
            ]
        );
    }

    #[test]
    fn test_gbk_text_run() {
        let (gbk, _, _) = encoding_rs::GBK.encode("桌号: 8");
        let mut data = vec![0x1C, 0x26];
        data.extend_from_slice(&gbk);
        data.push(LF);

        let directives = decode(&data).unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Kanji(true),
                Directive::Text("桌号: 8".into()),
                Directive::LineFeed
            ]
        );
    }

    #[test]
    fn test_image_payload_is_skipped() {
        // 2 bytes wide, 2 rows high: 4 payload bytes that look like text/commands
        let data = b"\x1dv0\x00\x02\x00\x02\x00\x1b@AB\nok";
        let directives = decode(data).unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::Image {
                    width: 2,
                    height: 2
                },
                Directive::LineFeed,
                Directive::Text("ok".into()),
            ]
        );
    }

    #[test]
    fn test_image_overrun_is_an_error() {
        let data = b"\x1dv0\x00\x10\x00\x10\x00short";
        assert!(matches!(
            decode(data),
            Err(DecodeError::ImageOverrun { needed: 256, available: 5, .. })
        ));
    }

    #[test]
    fn test_vertical_tabs_stop_at_nul_or_next_command() {
        let directives = decode(b"\x1bB\x02\x05\x00X").unwrap();
        assert_eq!(directives[0], Directive::VerticalTabs(vec![2, 5]));
        assert_eq!(directives[1], Directive::Text("X".into()));

        let directives = decode(b"\x1bB\x03\x1b@").unwrap();
        assert_eq!(
            directives,
            vec![Directive::VerticalTabs(vec![3]), Directive::Init]
        );
    }

    #[test]
    fn test_status_queries() {
        let directives = decode(b"\x10\x04\x01\x10\x04\x04\x1dr\x01\x1dI\x01").unwrap();
        assert_eq!(
            directives,
            vec![
                Directive::StatusQuery(StatusKind::RealTime(1)),
                Directive::StatusQuery(StatusKind::RealTime(4)),
                Directive::StatusQuery(StatusKind::Transmit(1)),
                Directive::StatusQuery(StatusKind::Identify(1)),
            ]
        );
    }

    #[test]
    fn test_unknown_control_bytes_are_skipped() {
        let directives = decode(b"\x07\x0dA\x09B\x1b\x07").unwrap();
        assert_eq!(
            directives,
            vec![Directive::Text("A".into()), Directive::Text("B".into())]
        );
    }

    #[test]
    fn test_cut_with_feed_consumes_amount() {
        let directives = decode(b"\x1dV\x42\x41Z").unwrap();
        assert_eq!(directives, vec![Directive::Cut, Directive::Text("Z".into())]);
    }

    #[test]
    fn test_feeds() {
        let directives = decode(b"\x1bJ\x10\x1bd\x03").unwrap();
        assert_eq!(directives, vec![Directive::Feed(16), Directive::FeedLines(3)]);
    }

    #[test]
    fn test_trailing_command_without_parameter() {
        let directives = decode(b"A\x1bE").unwrap();
        assert_eq!(directives, vec![Directive::Text("A".into())]);
    }
}
