use std::fs::File;
use std::io::{BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use log::debug;

use crate::error::{EdfError, Result};
use crate::header::decode_header;
use crate::layout::RecordLayout;
use crate::types::{DataRecord, FileHeader, SignalDescriptor};

/// EDF+ reader with random access to data records
///
/// The reader owns its byte source. Opening a file with [`EdfReader::open`]
/// acquires the handle; dropping the reader releases it.
///
/// # Examples
///
/// ```rust
/// use edf_export::EdfReader;
///
/// # edf_export::doctest_utils::create_simple_test_file("recording.edf")?;
/// let mut reader = EdfReader::open("recording.edf")?;
/// println!("Format: {}", reader.header().format);
/// println!("Signals: {}", reader.signals().len());
///
/// for record in reader.records() {
///     let record = record?;
///     for event in record.annotations() {
///         println!("{}: {:?}", event.onset, event.texts);
///     }
/// }
/// # std::fs::remove_file("recording.edf").ok();
/// # Ok::<(), edf_export::EdfError>(())
/// ```
pub struct EdfReader<R = BufReader<File>> {
    source: R,
    header: FileHeader,
    signals: Vec<SignalDescriptor>,
    layout: RecordLayout,
    /// 单个数据记录的读缓冲区
    buffer: Vec<u8>,
}

impl EdfReader<BufReader<File>> {
    /// Opens an EDF+ file for reading
    ///
    /// # Errors
    ///
    /// * `EdfError::FileNotFound` - File doesn't exist or can't be opened
    /// * `EdfError::MalformedHeader` - A header field could not be parsed
    /// * `EdfError::UnsupportedFormat` - Plain EDF, or an unknown record count
    /// * `EdfError::MissingAnnotationSignal` - No "EDF Annotations" signal
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path)
            .map_err(|e| EdfError::FileNotFound(format!("{}: {}", path.as_ref().display(), e)))?;

        Self::from_reader(BufReader::new(file))
    }
}

impl<R: Read + Seek> EdfReader<R> {
    /// Decodes the header of any seekable byte source.
    pub fn from_reader(mut source: R) -> Result<Self> {
        source.seek(SeekFrom::Start(0))?;
        let (header, signals) = decode_header(&mut source)?;

        if !header.format.is_edfplus() {
            return Err(EdfError::UnsupportedFormat(
                "Only EDF+ files are supported".to_string(),
            ));
        }
        if !signals.iter().any(|s| s.is_annotation()) {
            return Err(EdfError::MissingAnnotationSignal);
        }

        let layout = RecordLayout::from_signals(header.header_bytes, &signals);
        debug!(
            "Record layout: {} bytes per record starting at byte {}",
            layout.record_size(),
            header.header_bytes
        );

        Ok(EdfReader {
            source,
            buffer: vec![0u8; layout.record_size()],
            header,
            signals,
            layout,
        })
    }

    pub fn header(&self) -> &FileHeader {
        &self.header
    }

    /// All signals in file order, annotation signals included
    pub fn signals(&self) -> &[SignalDescriptor] {
        &self.signals
    }

    pub fn layout(&self) -> &RecordLayout {
        &self.layout
    }

    pub fn record_count(&self) -> u64 {
        self.header.datarecords_in_file
    }

    /// Reads and decodes a single data record.
    ///
    /// Short reads are fatal. Annotation spans that fail to decode are
    /// reported and marked as skipped without failing the record.
    pub fn read_record(&mut self, index: u64) -> Result<DataRecord> {
        if index >= self.header.datarecords_in_file {
            return Err(EdfError::InvalidRecordIndex(index));
        }

        self.source.seek(SeekFrom::Start(self.layout.record_offset(index)))?;
        self.source.read_exact(&mut self.buffer)?;

        Ok(self.layout.decode_record(index, &self.buffer, &self.signals))
    }

    /// Lazily iterates over all records from the first one.
    ///
    /// Each call starts a new pass over the file.
    pub fn records(&mut self) -> Records<'_, R> {
        Records { reader: self, next: 0 }
    }

    /// Decodes every record into memory.
    pub fn read_all_records(&mut self) -> Result<Vec<DataRecord>> {
        self.records().collect()
    }
}

/// Iterator over the data records of an [`EdfReader`]
pub struct Records<'a, R> {
    reader: &'a mut EdfReader<R>,
    next: u64,
}

impl<R: Read + Seek> Iterator for Records<'_, R> {
    type Item = Result<DataRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next >= self.reader.record_count() {
            return None;
        }
        let record = self.reader.read_record(self.next);
        // 出错后停止迭代
        self.next = match record {
            Ok(_) => self.next + 1,
            Err(_) => self.reader.record_count(),
        };
        Some(record)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.reader.record_count().saturating_sub(self.next);
        // 读取失败时会提前结束，所以下界为0
        (0, usize::try_from(remaining).ok())
    }
}
