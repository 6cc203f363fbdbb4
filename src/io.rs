//! Read/process/write contracts the engine consumes, plus the bundled
//! in-memory and line-file implementations.

use std::fs::File;
use std::io::{BufRead, BufReader, Lines, Write};
use std::path::Path;

use crate::error::Fault;

/// Item source. `Ok(None)` signals end of data.
///
/// A fault refers to the record the reader was producing; the engine may call
/// `read` again afterwards, either to retry the source or to move on past
/// the faulty record after counting a skip.
pub trait ItemReader<I> {
    fn read(&mut self) -> Result<Option<I>, Fault>;
}

/// Optional per-item transformation applied between reading and committing.
pub trait ItemProcessor<I> {
    fn process(&mut self, item: I) -> Result<I, Fault>;
}

/// Identity processor used when a step has no transformation configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<I> ItemProcessor<I> for PassThrough {
    fn process(&mut self, item: I) -> Result<I, Fault> {
        Ok(item)
    }
}

/// Item sink. Each `write` call is all-or-nothing: a returned fault means the
/// sink kept none of the items of this call.
pub trait ItemWriter<I> {
    fn write(&mut self, items: &[I]) -> Result<(), Fault>;
}

/// In-memory reader over a fixed item list.
#[derive(Debug)]
pub struct VecReader<I> {
    items: std::vec::IntoIter<I>,
}

impl<I> VecReader<I> {
    pub fn new(items: Vec<I>) -> Self {
        Self {
            items: items.into_iter(),
        }
    }
}

impl<I> ItemReader<I> for VecReader<I> {
    fn read(&mut self) -> Result<Option<I>, Fault> {
        Ok(self.items.next())
    }
}

/// Sink that accepts everything except the configured poison items, for which
/// every write attempt fails with the configured fault.
///
/// Used by the demo and the engine tests to reproduce deterministic failure
/// traces.
#[derive(Debug)]
pub struct PoisonWriter<I> {
    accepted: Vec<I>,
    poison: Vec<I>,
    fault: Fault,
}

impl<I: Clone + PartialEq> PoisonWriter<I> {
    pub fn new(poison: Vec<I>, fault: Fault) -> Self {
        Self {
            accepted: Vec::new(),
            poison,
            fault,
        }
    }

    /// Items the sink durably accepted, in write order.
    pub fn accepted(&self) -> &[I] {
        &self.accepted
    }
}

impl<I: Clone + PartialEq> ItemWriter<I> for PoisonWriter<I> {
    fn write(&mut self, items: &[I]) -> Result<(), Fault> {
        if items.iter().any(|item| self.poison.contains(item)) {
            return Err(self.fault.clone());
        }
        self.accepted.extend_from_slice(items);
        Ok(())
    }
}

/// Line-oriented file reader: one item per line.
#[derive(Debug)]
pub struct LineFileReader {
    lines: Lines<BufReader<File>>,
}

impl LineFileReader {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        let file = File::open(path)?;
        Ok(Self {
            lines: BufReader::new(file).lines(),
        })
    }
}

impl ItemReader<String> for LineFileReader {
    fn read(&mut self) -> Result<Option<String>, Fault> {
        match self.lines.next() {
            None => Ok(None),
            Some(Ok(line)) => Ok(Some(line)),
            Some(Err(e)) => Err(Fault::new("io.read", e.to_string())),
        }
    }
}

/// Line-oriented file sink.
///
/// Each `write` call stages its lines in one buffer and appends them with a
/// single `write_all`, so a call either lands fully or surfaces a fault with
/// nothing staged for the next call.
#[derive(Debug)]
pub struct LineFileWriter {
    file: File,
}

impl LineFileWriter {
    pub fn create(path: &Path) -> std::io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self { file })
    }
}

impl ItemWriter<String> for LineFileWriter {
    fn write(&mut self, items: &[String]) -> Result<(), Fault> {
        let mut buf = String::new();
        for item in items {
            buf.push_str(item);
            buf.push('\n');
        }
        self.file
            .write_all(buf.as_bytes())
            .and_then(|_| self.file.flush())
            .map_err(|e| Fault::new("io.write", e.to_string()))
    }
}
