//! ESC/POS opcode bytes honored by the decoder and the responder

pub const LF: u8 = 0x0A;
pub const DLE: u8 = 0x10;
pub const ESC: u8 = 0x1B;
pub const FS: u8 = 0x1C;
pub const GS: u8 = 0x1D;
pub const NUL: u8 = 0x00;
pub const EOT: u8 = 0x04;

/// ESC @ - initialize
pub const INIT: [u8; 2] = [ESC, b'@'];
/// GS V - cut paper
pub const CUT: [u8; 2] = [GS, b'V'];
/// ESC E n - bold on/off
pub const BOLD: [u8; 2] = [ESC, b'E'];
/// ESC ! n - print mode
pub const PRINT_MODE: [u8; 2] = [ESC, b'!'];
/// FS ! n - CJK character mode
pub const CJK_MODE: [u8; 2] = [FS, b'!'];
/// GS ! n - character size
pub const SIZE: [u8; 2] = [GS, b'!'];
/// ESC a n - justification
pub const ALIGN: [u8; 2] = [ESC, b'a'];
/// GS a n - automatic status back
pub const AUTO_STATUS: [u8; 2] = [GS, b'a'];
/// GS B n - white/black reverse
pub const REVERSE: [u8; 2] = [GS, b'B'];
/// ESC J n - print and feed n dots
pub const FEED: [u8; 2] = [ESC, b'J'];
/// ESC d n - print and feed n lines
pub const FEED_LINES: [u8; 2] = [ESC, b'd'];
/// ESC B n1..nk NUL - vertical tab positions
pub const VERTICAL_TABS: [u8; 2] = [ESC, b'B'];
/// GS r n - transmit status
pub const TRANSMIT_STATUS: [u8; 2] = [GS, b'r'];
/// DLE EOT n - real-time status
pub const REALTIME_STATUS: [u8; 2] = [DLE, EOT];
/// GS I n - printer identification
pub const IDENTIFY: [u8; 2] = [GS, b'I'];
/// GS v 0 - raster bit image
pub const RASTER_IMAGE: [u8; 3] = [GS, b'v', b'0'];
/// FS & - enter Kanji (GBK double-byte) mode
pub const KANJI_ON: [u8; 2] = [FS, b'&'];
/// FS . - leave Kanji mode
pub const KANJI_OFF: [u8; 2] = [FS, b'.'];

/// Two-byte prefixes of every recognized command
pub const KNOWN: [[u8; 2]; 18] = [
    INIT,
    CUT,
    BOLD,
    PRINT_MODE,
    CJK_MODE,
    SIZE,
    ALIGN,
    AUTO_STATUS,
    REVERSE,
    FEED,
    FEED_LINES,
    VERTICAL_TABS,
    TRANSMIT_STATUS,
    REALTIME_STATUS,
    IDENTIFY,
    [GS, b'v'],
    KANJI_ON,
    KANJI_OFF,
];

/// Whether a recognized command starts at `pos`
pub fn starts_command(data: &[u8], pos: usize) -> bool {
    data.get(pos..pos + 2)
        .is_some_and(|pair| KNOWN.iter().any(|known| known == pair))
}

/// Whether `needle` occurs anywhere in `haystack`
pub fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    !needle.is_empty() && haystack.windows(needle.len()).any(|w| w == needle)
}
