//! ESC/POS command builder
//!
//! Synthesizes the byte streams a POS terminal would send, for replaying
//! receipts into the listener and for tests.

use crate::encoding::{encode_gbk, gbk_width};
use crate::opcode::{self, DLE, EOT, GS};
use tracing::instrument;

/// ESC/POS command builder
///
/// Text is accumulated as UTF-8 and converted to GBK by [`build`](Self::build),
/// command bytes pass through untouched.
pub struct EscPosBuilder {
    buf: Vec<u8>,
    width: usize,
}

impl EscPosBuilder {
    /// Create a new builder with the specified paper width in characters
    ///
    /// Common widths:
    /// - 58mm paper: 32 characters
    /// - 80mm paper: 42 (Chinese terminals) or 48 characters
    pub fn new(width: usize) -> Self {
        let mut buf = Vec::with_capacity(1024);
        buf.extend_from_slice(&opcode::INIT);
        Self { buf, width }
    }

    /// Get the configured paper width
    pub fn width(&self) -> usize {
        self.width
    }

    // === Text Output ===

    /// Write raw text (GBK encoded on build)
    pub fn text(&mut self, s: &str) -> &mut Self {
        self.buf.extend_from_slice(s.as_bytes());
        self
    }

    /// Write text followed by newline
    pub fn line(&mut self, s: &str) -> &mut Self {
        self.text(s);
        self.buf.push(opcode::LF);
        self
    }

    /// Write empty line
    pub fn newline(&mut self) -> &mut Self {
        self.buf.push(opcode::LF);
        self
    }

    /// Print and feed n lines (ESC d n)
    pub fn feed(&mut self, lines: u8) -> &mut Self {
        self.command(opcode::FEED_LINES, lines)
    }

    // === Alignment ===

    pub fn center(&mut self) -> &mut Self {
        self.command(opcode::ALIGN, 0x01)
    }

    pub fn left(&mut self) -> &mut Self {
        self.command(opcode::ALIGN, 0x00)
    }

    pub fn right(&mut self) -> &mut Self {
        self.command(opcode::ALIGN, 0x02)
    }

    // === Text Style ===

    pub fn bold(&mut self) -> &mut Self {
        self.command(opcode::BOLD, 0x01)
    }

    pub fn bold_off(&mut self) -> &mut Self {
        self.command(opcode::BOLD, 0x00)
    }

    /// Double width and height
    pub fn double_size(&mut self) -> &mut Self {
        self.command(opcode::SIZE, 0x11)
    }

    /// Reset to normal size
    pub fn reset_size(&mut self) -> &mut Self {
        self.command(opcode::SIZE, 0x00)
    }

    /// Enter Kanji mode (FS &), sent by most Chinese terminals before GBK text
    pub fn kanji(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&opcode::KANJI_ON);
        self
    }

    // === Separators ===

    /// Print a line of '=' characters
    pub fn sep_double(&mut self) -> &mut Self {
        self.line(&"=".repeat(self.width))
    }

    /// Print a line of '-' characters
    pub fn sep_single(&mut self) -> &mut Self {
        self.line(&"-".repeat(self.width))
    }

    // === Layout Helpers ===

    /// Print left and right text on the same line
    ///
    /// Left text is left-aligned, right text is right-aligned,
    /// with spaces filling the gap.
    pub fn line_lr(&mut self, left: &str, right: &str) -> &mut Self {
        let lw = gbk_width(left);
        let rw = gbk_width(right);
        let spaces = self.width.saturating_sub(lw + rw).max(1);
        self.text(left);
        self.text(&" ".repeat(spaces));
        self.line(right)
    }

    // === Paper Control ===

    /// Full cut (GS V 0)
    pub fn cut(&mut self) -> &mut Self {
        self.command(opcode::CUT, 0x00)
    }

    /// Full cut after feeding n lines (GS V 66 n)
    pub fn cut_feed(&mut self, lines: u8) -> &mut Self {
        self.buf.extend_from_slice(&opcode::CUT);
        self.buf.extend_from_slice(&[0x42, lines]);
        self
    }

    // === Queries ===

    /// Real-time status request (DLE EOT n)
    pub fn status_query(&mut self, n: u8) -> &mut Self {
        self.buf.extend_from_slice(&[DLE, EOT, n]);
        self
    }

    /// Printer identification request (GS I 1)
    pub fn identify(&mut self) -> &mut Self {
        self.command(opcode::IDENTIFY, 0x01)
    }

    // === Images ===

    /// Raster bit image (GS v 0), `width_bytes` bytes per row
    ///
    /// `payload` is written as given; a short payload produces a stream
    /// whose header overruns the data.
    pub fn raster(&mut self, width_bytes: u16, height: u16, payload: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(&opcode::RASTER_IMAGE);
        self.buf.push(0x00);
        self.buf.extend_from_slice(&width_bytes.to_le_bytes());
        self.buf.extend_from_slice(&height.to_le_bytes());
        self.buf.extend_from_slice(payload);
        self
    }

    // === Raw Commands ===

    /// Write raw bytes directly
    pub fn raw(&mut self, bytes: &[u8]) -> &mut Self {
        self.buf.extend_from_slice(bytes);
        self
    }

    /// Reset printer to default state
    pub fn reset(&mut self) -> &mut Self {
        self.buf.extend_from_slice(&opcode::INIT);
        self
    }

    fn command(&mut self, cmd: [u8; 2], n: u8) -> &mut Self {
        self.buf.extend_from_slice(&cmd);
        self.buf.push(n);
        self
    }

    // === Build ===

    /// Build the final byte buffer with GBK encoding
    ///
    /// Raster payload bytes >= 0x80 would be re-encoded; use
    /// [`build_raw`](Self::build_raw) for streams carrying images.
    #[instrument(skip(self), fields(width = self.width))]
    pub fn build(&self) -> Vec<u8> {
        encode_gbk(&self.buf)
    }

    /// Build without GBK conversion (ASCII-only content)
    pub fn build_raw(&self) -> Vec<u8> {
        self.buf.clone()
    }
}

impl Default for EscPosBuilder {
    fn default() -> Self {
        Self::new(crate::normalizer::DEFAULT_LINE_WIDTH)
    }
}

/// Bare status query as sent by terminals between jobs
pub fn status_query() -> Vec<u8> {
    vec![DLE, EOT, 0x01, GS, b'I', 0x01]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{Align, Directive, decode};
    use crate::normalizer::PlainTextRenderer;

    #[test]
    fn test_builder_starts_with_init() {
        let data = EscPosBuilder::new(32).build();
        assert_eq!(data, opcode::INIT.to_vec());
    }

    #[test]
    fn test_built_receipt_decodes_back() {
        let mut b = EscPosBuilder::new(20);
        b.center().bold().line("制作分单").bold_off().left();
        b.sep_single();
        b.line_lr("桌号:", "8").cut();

        let directives = decode(&b.build()).unwrap();
        assert_eq!(directives[0], Directive::Init);
        assert_eq!(directives[1], Directive::Align(Align::Center));
        assert_eq!(directives.last(), Some(&Directive::Cut));

        let text = PlainTextRenderer::new(20).render(&directives);
        assert!(text.contains("制作分单"));
        assert!(text.contains(&format!("桌号:{}8", " ".repeat(14))));
        assert!(!text.contains("----"));
    }

    #[test]
    fn test_cut_feed_and_raster() {
        let mut b = EscPosBuilder::new(32);
        b.raster(1, 2, &[0xFF, 0x00]).cut_feed(3);
        let data = b.build_raw();
        assert_eq!(
            &data[2..],
            &[0x1D, 0x76, 0x30, 0x00, 0x01, 0x00, 0x02, 0x00, 0xFF, 0x00, 0x1D, 0x56, 0x42, 3]
        );
    }

    #[test]
    fn test_status_query() {
        assert_eq!(status_query(), vec![0x10, 0x04, 0x01, 0x1D, 0x49, 0x01]);
    }
}
