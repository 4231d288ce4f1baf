//! Emulated synchronous printer responses
//!
//! POS terminals query the printer before and during a job and wait for the
//! answer. Every chunk read from the socket goes through [`respond`] and the
//! returned bytes are written back before the next read.

use crate::opcode::{self, DLE, EOT, GS};

/// Real-time status: printer online, no error
pub const STATUS_ONLINE: u8 = 0x16;
/// Real-time status: paper present / no error
pub const STATUS_OK: u8 = 0x12;
/// Generic acknowledgement
pub const ACK: u8 = 0x06;
/// Identification string returned for `GS I`
pub const PRINTER_MODEL: &[u8] = b"TM-T88V\0";

/// Build the response for one received chunk.
///
/// Status and identification queries are answered in the order they appear.
/// Without any query, a chunk carrying an initialize, cut or feed command is
/// acknowledged. Anything else needs no answer.
pub fn respond(chunk: &[u8]) -> Option<Vec<u8>> {
    let mut response = Vec::new();
    let mut i = 0;

    while i < chunk.len() {
        match (chunk[i], chunk.get(i + 1), chunk.get(i + 2)) {
            (DLE, Some(&EOT), Some(&n)) => {
                response.push(realtime_status(n));
                i += 3;
            }
            (GS, Some(&b'I'), _) => {
                response.extend_from_slice(PRINTER_MODEL);
                i += if i + 2 < chunk.len() { 3 } else { 2 };
            }
            _ => i += 1,
        }
    }

    if !response.is_empty() {
        return Some(response);
    }

    let acknowledged = [opcode::INIT, opcode::CUT, opcode::FEED, opcode::FEED_LINES]
        .iter()
        .any(|cmd| opcode::contains(chunk, cmd));
    acknowledged.then(|| vec![ACK])
}

fn realtime_status(n: u8) -> u8 {
    match n {
        2..=4 => STATUS_OK,
        _ => STATUS_ONLINE,
    }
}
