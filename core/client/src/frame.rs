//! Frame assembly for the streamed progress response.
//!
//! The backend streams newline-delimited JSON objects. Chunk boundaries are
//! arbitrary: a chunk may split a line, split a multi-byte UTF-8 sequence,
//! or bundle several lines. [`FrameReader`] reassembles complete lines and
//! decodes them into [`ProgressRecord`]s in arrival order.

use serde::Deserialize;
use std::collections::BTreeMap;

use sealpost_common::{Error, Result};

/// One decoded line of the response stream.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ProgressRecord {
    /// Human-readable progress label.
    #[serde(default)]
    pub progress: String,
    /// Server-reported failure; terminal when present.
    #[serde(default)]
    pub error: Option<String>,
    /// Completion flag; terminal when true.
    #[serde(default)]
    pub done: bool,
    /// Final summary text, carried on the completion record.
    #[serde(default)]
    pub summary: Option<String>,
    /// PHI compliance checks, check name to pass/fail.
    #[serde(default)]
    pub phi_verification: Option<BTreeMap<String, bool>>,
}

impl ProgressRecord {
    /// Whether this record ends the stream's logical sequence.
    pub fn is_terminal(&self) -> bool {
        self.done || self.error.is_some()
    }
}

/// Stateful reader turning raw response chunks into progress records.
///
/// A reader consumes one stream exactly once: feed each chunk to
/// [`FrameReader::push`], then call [`FrameReader::finish`] at end-of-data.
///
/// Decode-failure policy: a complete line that is not valid JSON is held
/// back rather than failing immediately, because a proxy may flush a
/// partial write that looks line-terminated. If a later line decodes
/// successfully the held line cannot have been a boundary artifact and the
/// stream is rejected as malformed; if the stream ends right after, the
/// held line is discarded.
pub struct FrameReader {
    /// Bytes held back because they end mid-way through a UTF-8 sequence.
    pending: Vec<u8>,
    /// Decoded text of the current incomplete line.
    carry: String,
    /// A complete line that failed JSON decode, awaiting resolution.
    held_back: Option<String>,
    /// Set once a terminal record has been yielded; later lines are ignored.
    terminated: bool,
}

impl FrameReader {
    /// Create a reader for one response stream.
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            carry: String::new(),
            held_back: None,
            terminated: false,
        }
    }

    /// Whether a terminal record has already been yielded.
    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// Feed one chunk of response bytes, yielding any records completed by it.
    ///
    /// Records are yielded strictly in the order their bytes arrived.
    ///
    /// # Errors
    /// - `MalformedInput` if the stream contains invalid UTF-8, or if a line
    ///   that failed JSON decode is followed by a line that decodes
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<ProgressRecord>> {
        self.pending.extend_from_slice(chunk);
        let text = self.take_decodable_text()?;
        self.carry.push_str(&text);

        let mut records = Vec::new();
        while let Some(pos) = self.carry.find('\n') {
            let rest = self.carry.split_off(pos + 1);
            let mut line = std::mem::replace(&mut self.carry, rest);
            line.truncate(line.len() - 1); // drop the separator
            self.accept_line(line.trim_end_matches('\r'), &mut records)?;
        }

        Ok(records)
    }

    /// Signal end-of-data.
    ///
    /// Any residual accumulator content is discarded: a final fragment
    /// without a terminator is not a valid record, and a held-back
    /// undecodable line with nothing after it is treated as a partial-write
    /// artifact.
    pub fn finish(&mut self) {
        self.pending.clear();
        self.carry.clear();
        self.held_back = None;
    }

    /// Take the longest UTF-8-decodable prefix of the pending bytes.
    ///
    /// An incomplete multi-byte sequence at the tail stays pending for the
    /// next chunk; an invalid sequence is fatal.
    fn take_decodable_text(&mut self) -> Result<String> {
        match std::str::from_utf8(&self.pending) {
            Ok(_) => {
                let bytes = std::mem::take(&mut self.pending);
                String::from_utf8(bytes)
                    .map_err(|_| Error::MalformedInput("Invalid UTF-8 in stream".to_string()))
            }
            Err(e) if e.error_len().is_some() => Err(Error::MalformedInput(
                "Invalid UTF-8 in stream".to_string(),
            )),
            Err(e) => {
                let tail = self.pending.split_off(e.valid_up_to());
                let head = std::mem::replace(&mut self.pending, tail);
                String::from_utf8(head)
                    .map_err(|_| Error::MalformedInput("Invalid UTF-8 in stream".to_string()))
            }
        }
    }

    /// Process one complete line.
    fn accept_line(&mut self, line: &str, records: &mut Vec<ProgressRecord>) -> Result<()> {
        if line.trim().is_empty() || self.terminated {
            return Ok(());
        }

        match serde_json::from_str::<ProgressRecord>(line) {
            Ok(record) => {
                if let Some(held) = self.held_back.take() {
                    // A real boundary split never re-synchronizes into valid
                    // JSON mid-stream, so the held line was genuine garbage.
                    return Err(Error::MalformedInput(format!(
                        "Undecodable record in stream: {}",
                        held
                    )));
                }
                if record.is_terminal() {
                    self.terminated = true;
                }
                records.push(record);
                Ok(())
            }
            Err(_) => {
                self.held_back.get_or_insert_with(|| line.to_string());
                Ok(())
            }
        }
    }
}

impl Default for FrameReader {
    fn default() -> Self {
        Self::new()
    }
}
