//! # faker-printer
//!
//! ESC/POS protocol library for a virtual thermal printer - the "receiving" side.
//!
//! ## Scope
//!
//! This crate handles HOW a captured print stream is understood:
//! - Command decoding (bytes -> [`Directive`] sequence)
//! - Plain-text rendering of decoded directives
//! - Emulated synchronous status responses (DLE EOT, GS I, ACK)
//! - GBK encoding utilities and the text decode fallback chain
//! - An ESC/POS builder and network client for synthesizing jobs
//!
//! Business logic (WHAT a receipt means) stays in the server:
//! - Receipt field extraction, order classification -> faker-server
//!
//! ## Example
//!
//! ```ignore
//! use faker_printer::{decode, EscPosBuilder, PlainTextRenderer};
//!
//! let mut builder = EscPosBuilder::new(42);
//! builder.center().line("制作分单").left().line("桌号: 8").cut();
//!
//! let directives = decode(&builder.build())?;
//! let text = PlainTextRenderer::default().render(&directives);
//! ```

mod decoder;
mod encoding;
mod error;
mod escpos;
mod normalizer;
pub mod opcode;
mod printer;
mod responder;

// Re-exports
pub use decoder::{Align, Directive, StatusKind, decode};
pub use encoding::{decode_text, encode_gbk, gbk_width};
pub use error::{DecodeError, DecodeResult, PrintError, PrintResult};
pub use escpos::{EscPosBuilder, status_query};
pub use normalizer::{DEFAULT_LINE_WIDTH, PlainTextRenderer, is_separator_line};
pub use printer::NetworkPrinter;
pub use responder::{ACK, PRINTER_MODEL, STATUS_OK, STATUS_ONLINE, respond};
