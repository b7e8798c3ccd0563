use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};

use lease_engine_core::bundle::{LineItemBundle, LineItemSink, MemorySink};
use lease_engine_core::{LeaseError, LeaseResult};

/// Appends one JSON document per bundle.
pub struct JsonLinesSink {
    writer: BufWriter<File>,
}

impl JsonLinesSink {
    pub fn append(path: &str) -> LeaseResult<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| LeaseError::Persistence(format!("cannot open '{path}': {e}")))?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl LineItemSink for JsonLinesSink {
    fn insert_many(&mut self, bundle: &LineItemBundle) -> LeaseResult<()> {
        serde_json::to_writer(&mut self.writer, bundle)?;
        writeln!(self.writer)
            .and_then(|_| self.writer.flush())
            .map_err(|e| LeaseError::Persistence(e.to_string()))
    }
}

/// Where this invocation's bundle goes: a file, or nowhere (preview).
pub enum CliSink {
    Preview(MemorySink),
    File(JsonLinesSink),
}

impl CliSink {
    pub fn open(persist: Option<&str>) -> LeaseResult<Self> {
        match persist {
            Some(path) => Ok(CliSink::File(JsonLinesSink::append(path)?)),
            None => Ok(CliSink::Preview(MemorySink::new())),
        }
    }

    pub fn persists(&self) -> bool {
        matches!(self, CliSink::File(_))
    }
}

impl LineItemSink for CliSink {
    fn insert_many(&mut self, bundle: &LineItemBundle) -> LeaseResult<()> {
        match self {
            CliSink::Preview(sink) => sink.insert_many(bundle),
            CliSink::File(sink) => sink.insert_many(bundle),
        }
    }
}
