use crate::error::Result;
use crate::melt::format::{format_row, header_line};
use crate::melt::schema::SchemaSet;
use crate::melt::types::{Kind, Node, StreamName};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Where stream output goes
pub trait StreamSink {
    type Writer: Write;

    /// Human-readable location of a stream, used in notices and reports
    fn location(&self, name: &StreamName) -> String;

    /// Create (or truncate) the destination for a stream
    fn open(&mut self, name: &StreamName) -> io::Result<Self::Writer>;
}

/// A destination that can drop everything written past a given length
pub trait Truncate {
    fn truncate_to(&mut self, len: u64) -> io::Result<()>;
}

impl Truncate for File {
    fn truncate_to(&mut self, len: u64) -> io::Result<()> {
        self.set_len(len)?;
        self.seek(SeekFrom::Start(len))?;
        Ok(())
    }
}

/// Writer that commits each `write` whole or not at all.
///
/// Every call is one complete line. If the underlying write fails part way,
/// the destination is cut back to the end of the last committed line, so a
/// failed row never leaves a fragment behind.
pub struct RowFile<F: Write + Truncate> {
    inner: F,
    committed: u64,
}

impl<F: Write + Truncate> RowFile<F> {
    /// Wrap a freshly created (empty) destination
    pub fn new(inner: F) -> Self {
        RowFile { inner, committed: 0 }
    }

    pub fn committed(&self) -> u64 {
        self.committed
    }

    pub fn into_inner(self) -> F {
        self.inner
    }
}

impl<F: Write + Truncate> Write for RowFile<F> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if let Err(e) = self.inner.write_all(buf) {
            if let Err(rollback) = self.inner.truncate_to(self.committed) {
                warn!("Failed to discard partial row: {}", rollback);
            }
            return Err(e);
        }
        self.committed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes each stream to `<dir>/<name>.csv`
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new<P: AsRef<Path>>(dir: P) -> io::Result<Self> {
        std::fs::create_dir_all(&dir)?;
        Ok(DirectorySink {
            dir: dir.as_ref().to_path_buf(),
        })
    }

    pub fn path_for(&self, name: &StreamName) -> PathBuf {
        self.dir.join(name.file_name())
    }
}

impl StreamSink for DirectorySink {
    type Writer = RowFile<File>;

    fn location(&self, name: &StreamName) -> String {
        self.path_for(name).display().to_string()
    }

    fn open(&mut self, name: &StreamName) -> io::Result<Self::Writer> {
        File::create(self.path_for(name)).map(RowFile::new)
    }
}

/// Outcome for one stream once the run is over
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreamReport {
    pub name: StreamName,
    pub kind: Kind,
    pub location: String,
    pub rows: usize,
    pub failed_rows: usize,
    /// False when the final flush failed
    pub closed_cleanly: bool,
}

struct OpenStream<W: Write> {
    kind: Kind,
    writer: W,
    location: String,
    rows: usize,
    failed_rows: usize,
}

/// One writer per stream, opened on first use with its header line and
/// closed exactly once by [`StreamRegistry::finish`].
pub struct StreamRegistry<S: StreamSink> {
    sink: S,
    schemas: SchemaSet,
    streams: BTreeMap<StreamName, OpenStream<S::Writer>>,
    verbose: bool,
}

impl<S: StreamSink> StreamRegistry<S> {
    pub fn new(sink: S, schemas: SchemaSet, verbose: bool) -> Self {
        StreamRegistry {
            sink,
            schemas,
            streams: BTreeMap::new(),
            verbose,
        }
    }

    /// Write one node as a row of `name`.
    ///
    /// Failing to open a stream is fatal. Failing to write a single row is
    /// logged and counted. The line is rendered in full and handed to the
    /// writer in one call, which [`RowFile`] commits whole or rolls back.
    pub fn write_row(&mut self, name: &StreamName, kind: Kind, node: &Node) -> Result<()> {
        self.ensure_open(name, kind)?;

        let schema = self.schemas.get(kind);
        let resolved_type = (kind == Kind::Record).then(|| name.as_str());
        let line = format_row(node, schema, resolved_type);

        // ensure_open just inserted it if it was missing
        let Some(stream) = self.streams.get_mut(name) else {
            return Err(crate::error::MeltError::UnknownStream(name.to_string()));
        };

        match stream.writer.write_all(line.as_bytes()) {
            Ok(()) => stream.rows += 1,
            Err(e) => {
                stream.failed_rows += 1;
                warn!("Failed to write row to {}: {}", stream.location, e);
            }
        }
        Ok(())
    }

    fn ensure_open(&mut self, name: &StreamName, kind: Kind) -> Result<()> {
        if self.streams.contains_key(name) {
            return Ok(());
        }

        let location = self.sink.location(name);
        let mut writer = self.sink.open(name)?;
        let header = format!("{}\n", header_line(self.schemas.get(kind)));
        writer.write_all(header.as_bytes())?;
        notice(self.verbose, &format!("Opening {} for writing", location));

        self.streams.insert(
            name.clone(),
            OpenStream {
                kind,
                writer,
                location,
                rows: 0,
                failed_rows: 0,
            },
        );
        Ok(())
    }

    pub fn is_open(&self, name: &StreamName) -> bool {
        self.streams.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Flush and close every opened stream, whatever happened to its rows
    pub fn finish(self) -> Vec<StreamReport> {
        let verbose = self.verbose;
        self.streams
            .into_iter()
            .map(|(name, mut stream)| {
                let closed_cleanly = match stream.writer.flush() {
                    Ok(()) => true,
                    Err(e) => {
                        warn!("Failed to flush {}: {}", stream.location, e);
                        false
                    }
                };
                drop(stream.writer);
                notice(verbose, &format!("Written {} data.", name));

                StreamReport {
                    name,
                    kind: stream.kind,
                    location: stream.location,
                    rows: stream.rows,
                    failed_rows: stream.failed_rows,
                    closed_cleanly,
                }
            })
            .collect()
    }
}

fn notice(verbose: bool, message: &str) {
    if verbose {
        info!("{}", message);
    } else {
        debug!("{}", message);
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Shared in-memory buffers; writes containing `poison` are rejected whole
    #[derive(Clone, Default)]
    pub(crate) struct MemorySink {
        pub buffers: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
        pub poison: Option<&'static str>,
    }

    pub(crate) struct MemoryWriter {
        name: String,
        buffers: Rc<RefCell<BTreeMap<String, Vec<u8>>>>,
        poison: Option<&'static str>,
    }

    impl Write for MemoryWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if let Some(poison) = self.poison {
                if String::from_utf8_lossy(buf).contains(poison) {
                    return Err(io::Error::new(io::ErrorKind::Other, "poisoned row"));
                }
            }
            self.buffers
                .borrow_mut()
                .entry(self.name.clone())
                .or_default()
                .extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl StreamSink for MemorySink {
        type Writer = MemoryWriter;

        fn location(&self, name: &StreamName) -> String {
            format!("memory:{}", name)
        }

        fn open(&mut self, name: &StreamName) -> io::Result<MemoryWriter> {
            self.buffers.borrow_mut().insert(name.to_string(), Vec::new());
            Ok(MemoryWriter {
                name: name.to_string(),
                buffers: self.buffers.clone(),
                poison: self.poison,
            })
        }
    }

    impl MemorySink {
        pub fn contents(&self, name: &str) -> String {
            String::from_utf8(self.buffers.borrow()[name].clone()).unwrap()
        }
    }

    #[test]
    fn test_header_written_once_on_first_row() {
        let sink = MemorySink::default();
        let mut registry = StreamRegistry::new(sink.clone(), SchemaSet::builtin().unwrap(), false);
        let name = StreamName::new("ActivitySummary");
        let node = Node::new("ActivitySummary")
            .with_attribute("dateComponents", "2020-01-01")
            .with_attribute("appleStandHours", "10");

        assert!(!registry.is_open(&name));
        registry.write_row(&name, Kind::ActivitySummary, &node).unwrap();
        registry.write_row(&name, Kind::ActivitySummary, &node).unwrap();
        assert_eq!(registry.len(), 1);

        let reports = registry.finish();
        assert_eq!(reports[0].rows, 2);
        assert!(reports[0].closed_cleanly);

        let output = sink.contents("ActivitySummary");
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(
            lines[0],
            "dateComponents,activeEnergyBurned,activeEnergyBurnedGoal,activeEnergyBurnedUnit,\
             appleExerciseTime,appleExerciseTimeGoal,appleStandHours,appleStandHoursGoal"
        );
        assert_eq!(lines[1], "2020-01-01,,,,,,10,");
    }

    #[test]
    fn test_failed_row_leaves_no_partial_line() {
        let sink = MemorySink {
            poison: Some("boom"),
            ..Default::default()
        };
        let mut registry = StreamRegistry::new(sink.clone(), SchemaSet::builtin().unwrap(), false);
        let name = StreamName::new("StepCount");
        let good = Node::new("Record").with_attribute("value", "1");
        let bad = Node::new("Record").with_attribute("sourceName", "boom").with_attribute("value", "2");

        registry.write_row(&name, Kind::Record, &good).unwrap();
        registry.write_row(&name, Kind::Record, &bad).unwrap();
        registry.write_row(&name, Kind::Record, &good).unwrap();

        let reports = registry.finish();
        assert_eq!(reports[0].rows, 2);
        assert_eq!(reports[0].failed_rows, 1);

        let output = sink.contents("StepCount");
        assert!(output.ends_with('\n'));
        assert_eq!(output.lines().count(), 3);
        assert!(!output.contains("boom"));
    }

    /// Accepts bytes until `capacity`, then fails
    struct ShortDisk {
        data: Vec<u8>,
        capacity: usize,
    }

    impl Write for ShortDisk {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let room = self.capacity - self.data.len();
            if room == 0 {
                return Err(io::Error::new(io::ErrorKind::Other, "no space left"));
            }
            let n = room.min(buf.len());
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Truncate for ShortDisk {
        fn truncate_to(&mut self, len: u64) -> io::Result<()> {
            self.data.truncate(len as usize);
            Ok(())
        }
    }

    #[test]
    fn test_row_file_rolls_back_partial_write() {
        let mut file = RowFile::new(ShortDisk { data: Vec::new(), capacity: 20 });
        file.write_all(b"header\n").unwrap();
        file.write_all(b"row-one\n").unwrap();
        assert!(file.write_all(b"row-two\n").is_err());
        assert_eq!(file.committed(), 15);

        let disk = file.into_inner();
        assert_eq!(disk.data, b"header\nrow-one\n");
    }

    #[test]
    fn test_file_truncate_to_resets_position() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.csv");
        let mut file = RowFile::new(File::create(&path).unwrap());
        file.write_all(b"a,b\n").unwrap();
        file.inner.write_all(b"1,").unwrap();
        let committed = file.committed();
        file.inner.truncate_to(committed).unwrap();
        file.write_all(b"3,4\n").unwrap();
        file.flush().unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a,b\n3,4\n");
    }

    #[test]
    fn test_directory_sink_truncates_previous_output() {
        let dir = tempfile::tempdir().unwrap();
        let name = StreamName::new("Workout");
        std::fs::write(dir.path().join("Workout.csv"), "stale\nstale\nstale\n").unwrap();

        let sink = DirectorySink::new(dir.path()).unwrap();
        let mut registry = StreamRegistry::new(sink, SchemaSet::builtin().unwrap(), true);
        registry
            .write_row(&name, Kind::Workout, &Node::new("Workout").with_attribute("duration", "5"))
            .unwrap();
        let reports = registry.finish();

        let output = std::fs::read_to_string(dir.path().join("Workout.csv")).unwrap();
        assert!(!output.contains("stale"));
        assert_eq!(output.lines().count(), 2);
        assert!(reports[0].location.ends_with("Workout.csv"));
    }
}
