//! Pulls the event id and model id out of a single JSON record while it is being
//! scanned, without materializing the record.

use std::io::{self, Write};

use serde::Serialize;
use tracing::trace;

use crate::error::ScanError;
use crate::scanner::{Flow, JsonHandler, JsonScanner, ScanOutcome, Token};

pub const DEFAULT_EVENT_KEY: &str = "_eventid";
pub const DEFAULT_MODEL_KEY: &str = "_modelid";

/// Names of the two keys to look for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetKeys {
    pub event: Vec<u8>,
    pub model: Vec<u8>,
}

impl TargetKeys {
    pub fn new(event: impl Into<Vec<u8>>, model: impl Into<Vec<u8>>) -> Self {
        Self { event: event.into(), model: model.into() }
    }
}

impl Default for TargetKeys {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_KEY, DEFAULT_MODEL_KEY)
    }
}

/// How a matched key is tied to the value that follows it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PairingMode {
    /// A matched key only claims its own value. If that value is not a string,
    /// the occurrence is skipped and a later occurrence of the key may still match.
    #[default]
    Strict,
    /// A matched key stays armed for the rest of the record, so the next string
    /// anywhere downstream fills the field. The scan stops at the first value seen
    /// once both keys have been armed, whatever that value is. Kept for parity with
    /// older index files.
    Lenient,
}

/// Fields armed by the most recent matching key.
#[derive(Debug, Clone, Copy, Default)]
struct Armed {
    event: bool,
    model: bool,
}

/// Ids captured from one record. Empty means not found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedIds {
    pub event_id: Vec<u8>,
    pub model_id: Vec<u8>,
}

impl ExtractedIds {
    pub fn has_event_id(&self) -> bool {
        !self.event_id.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        !self.event_id.is_empty() && !self.model_id.is_empty()
    }

    /// Write the index line `<event_id> <model_id>\n`.
    pub fn write_to<W: Write>(&self, out: &mut W) -> io::Result<()> {
        out.write_all(&self.event_id)?;
        out.write_all(b" ")?;
        out.write_all(&self.model_id)?;
        out.write_all(b"\n")
    }
}

/// Scanner event consumer for one record. Build a fresh one per line.
#[derive(Debug)]
pub struct FieldExtractor<'k> {
    keys: &'k TargetKeys,
    mode: PairingMode,
    armed: Armed,
    ids: ExtractedIds,
}

impl<'k> FieldExtractor<'k> {
    pub fn new(keys: &'k TargetKeys, mode: PairingMode) -> Self {
        Self { keys, mode, armed: Armed::default(), ids: ExtractedIds::default() }
    }

    pub fn ids(&self) -> &ExtractedIds {
        &self.ids
    }

    pub fn into_ids(self) -> ExtractedIds {
        self.ids
    }

    fn flow(&self) -> Flow {
        let done = match self.mode {
            PairingMode::Strict => self.ids.is_complete(),
            PairingMode::Lenient => self.armed.event && self.armed.model,
        };
        if done {
            Flow::StopEarly
        } else {
            Flow::Continue
        }
    }

    /// A value started. In strict mode it belongs to the last key, so the arming is spent.
    fn value_seen(&mut self) {
        if self.mode == PairingMode::Strict {
            self.armed = Armed::default();
        }
    }
}

impl JsonHandler for FieldExtractor<'_> {
    fn key(&mut self, key: &[u8]) -> Flow {
        let event = key == self.keys.event.as_slice();
        let model = key == self.keys.model.as_slice();
        match self.mode {
            PairingMode::Strict => self.armed = Armed { event, model },
            PairingMode::Lenient => {
                self.armed.event |= event;
                self.armed.model |= model;
            }
        }
        Flow::Continue
    }

    fn string(&mut self, value: &[u8]) -> Flow {
        if self.armed.event && self.ids.event_id.is_empty() {
            trace!(target = "log_ids::extract", "captured event id");
            self.ids.event_id.extend_from_slice(value);
        }
        if self.armed.model && self.ids.model_id.is_empty() {
            trace!(target = "log_ids::extract", "captured model id");
            self.ids.model_id.extend_from_slice(value);
        }
        self.value_seen();
        self.flow()
    }

    fn other(&mut self, _token: Token<'_>) -> Flow {
        self.value_seen();
        self.flow()
    }
}

/// Run a fresh [`FieldExtractor`] over `record` using the shared `scanner`.
pub fn extract_ids(
    scanner: &mut JsonScanner,
    record: &[u8],
    keys: &TargetKeys,
    mode: PairingMode,
) -> Result<(ExtractedIds, ScanOutcome), ScanError> {
    let mut extractor = FieldExtractor::new(keys, mode);
    let outcome = scanner.scan(record, &mut extractor)?;
    Ok((extractor.into_ids(), outcome))
}
