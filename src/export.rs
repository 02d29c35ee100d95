//! Mapping of decoded EDF+ records onto a segment container.
//!
//! A container holds one recording with a set of channels. Every data record
//! becomes one blob of frame-major interleaved samples plus one segment that
//! places the blob on the recording's global sample axis.

use std::io::{Read, Seek};

use chrono::NaiveDateTime;
use log::info;

use crate::error::{EdfError, Result};
use crate::reader::EdfReader;
use crate::types::{DataRecord, SignalDescriptor};

pub type BlobId = u32;

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelInfo {
    /// Index of the source signal in the EDF file
    pub index: usize,
    pub name: String,
    pub bits: u8,
    pub unit: String,
    pub digital_min: i32,
    pub digital_max: i32,
    pub physical_min: f64,
    pub physical_max: f64,
    pub comment: String,
}

impl ChannelInfo {
    pub fn from_signal(index: usize, signal: &SignalDescriptor) -> Self {
        ChannelInfo {
            index,
            name: signal.label.clone(),
            bits: 16,
            unit: signal.physical_dimension.clone(),
            digital_min: signal.digital_min,
            digital_max: signal.digital_max,
            physical_min: signal.physical_min,
            physical_max: signal.physical_max,
            comment: format!(
                "Physical ({},{}) to ({},{})",
                signal.physical_min, signal.physical_max, signal.digital_min, signal.digital_max
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContainerProps {
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub description: String,
    pub sample_rate: f64,
    pub channels: Vec<ChannelInfo>,
}

/// Ids assigned by the sink when the container is created
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordingHandle {
    pub recording_id: u32,
    pub channel_set_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    pub recording_id: u32,
    pub channel_set_id: u32,
    /// Inclusive sample range on the recording's sample axis
    pub first_sample: u64,
    pub last_sample: u64,
    pub blob_id: BlobId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataScope {
    Global,
    Recording(u32),
}

/// Destination container for exported recordings.
pub trait StorageSink {
    fn create_container(&mut self, props: &ContainerProps) -> Result<RecordingHandle>;

    fn append_blob(&mut self, bytes: &[u8]) -> Result<BlobId>;

    fn append_segment(&mut self, segment: &Segment) -> Result<()>;

    fn set_metadata(&mut self, scope: MetadataScope, key: &str, value: &str) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub description: String,
    /// Overrides the rate derived from the header
    pub sample_rate: Option<f64>,
    pub software: String,
    pub original_filename: Option<String>,
    pub recording_type: Option<String>,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            description: "EDF+ recording".to_string(),
            sample_rate: None,
            software: "edf-export".to_string(),
            original_filename: None,
            recording_type: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExportSummary {
    pub channels: usize,
    pub records: u64,
    pub samples_per_channel: u64,
    pub annotations: usize,
    pub skipped_annotation_spans: usize,
}

/// Writes every record of `reader` into `sink`.
///
/// Records are read one at a time, so memory use does not grow with the
/// recording length. Errors from the reader or the sink abort the export; the
/// sink is left with whatever was written so far.
///
/// # Examples
///
/// ```rust
/// use edf_export::{export_recording, EdfReader, ExportOptions, MemorySink};
///
/// # edf_export::doctest_utils::create_simple_test_file("export.edf")?;
/// let mut reader = EdfReader::open("export.edf")?;
/// let mut sink = MemorySink::new();
/// let summary = export_recording(&mut reader, &mut sink, &ExportOptions::default())?;
///
/// assert_eq!(summary.records, reader.record_count());
/// assert_eq!(sink.segments.len() as u64, summary.records);
/// # std::fs::remove_file("export.edf").ok();
/// # Ok::<(), edf_export::EdfError>(())
/// ```
pub fn export_recording<R, S>(
    reader: &mut EdfReader<R>,
    sink: &mut S,
    options: &ExportOptions,
) -> Result<ExportSummary>
where
    R: Read + Seek,
    S: StorageSink + ?Sized,
{
    let header = reader.header().clone();
    let channel_signals: Vec<usize> = reader
        .signals()
        .iter()
        .enumerate()
        .filter(|(_, s)| !s.is_annotation())
        .map(|(i, _)| i)
        .collect();
    let channels: Vec<ChannelInfo> = channel_signals
        .iter()
        .map(|&i| ChannelInfo::from_signal(i, &reader.signals()[i]))
        .collect();

    let samples_per_record = frame_count(reader.signals(), &channel_signals)?;

    let sample_rate = match options.sample_rate {
        Some(rate) => rate,
        None => channel_signals
            .first()
            .and_then(|&i| reader.signals()[i].sample_rate(header.datarecord_duration))
            .unwrap_or(0.0),
    };
    let end = header
        .end_time()
        .ok_or_else(|| EdfError::Export("Recording end time is out of range".to_string()))?;

    let handle = sink.create_container(&ContainerProps {
        start: header.start,
        end,
        description: options.description.clone(),
        sample_rate,
        channels,
    })?;
    info!(
        "Exporting {} records of {} channels at {} Hz",
        header.datarecords_in_file,
        channel_signals.len(),
        sample_rate
    );

    let mut cursor = 0u64;
    let mut annotations = Vec::new();
    let mut skipped = 0;

    for record in reader.records() {
        let record = record?;

        if samples_per_record > 0 {
            let blob = interleave_frames(&record, &channel_signals);
            let blob_id = sink.append_blob(&blob)?;
            sink.append_segment(&Segment {
                recording_id: handle.recording_id,
                channel_set_id: handle.channel_set_id,
                first_sample: cursor,
                last_sample: cursor + samples_per_record as u64 - 1,
                blob_id,
            })?;
            cursor += samples_per_record as u64;
        }

        if record.has_skipped_annotations() {
            skipped += 1;
        }
        annotations.extend(record.annotations().filter(|e| !e.is_time_keeping()).cloned());
    }

    let global = MetadataScope::Global;
    sink.set_metadata(global, "Recording.Software", &options.software)?;
    if let Some(filename) = &options.original_filename {
        sink.set_metadata(global, "Recording.OriginalFilename", filename)?;
    }
    if let Some(recording_type) = &options.recording_type {
        sink.set_metadata(global, "Recording.Type", recording_type)?;
    }

    let scope = MetadataScope::Recording(handle.recording_id);
    let patient = header.patient_info();
    let recording = header.recording_info();
    sink.set_metadata(scope, "Recording.Format", &header.format.to_string())?;
    sink.set_metadata(scope, "Recording.StartTime", &header.start.format("%Y-%m-%d %H:%M:%S").to_string())?;
    sink.set_metadata(scope, "Recording.Equipment", &recording.equipment)?;
    sink.set_metadata(scope, "Patient.Code", &patient.code)?;
    sink.set_metadata(scope, "Patient.Name", &patient.name)?;
    sink.set_metadata(scope, "Annotations.Count", &annotations.len().to_string())?;

    for (n, event) in annotations.iter().enumerate() {
        let mut value = event.onset.to_string();
        if let Some(duration) = &event.duration {
            value.push(';');
            value.push_str(&duration.to_string());
        }
        value.push(';');
        value.push_str(&event.texts.join("|"));
        sink.set_metadata(scope, &format!("Annotation.{}", n), &value)?;
    }

    Ok(ExportSummary {
        channels: channel_signals.len(),
        records: header.datarecords_in_file,
        samples_per_channel: cursor,
        annotations: annotations.len(),
        skipped_annotation_spans: skipped,
    })
}

/// Common per-record sample count of the exported channels.
fn frame_count(signals: &[SignalDescriptor], channels: &[usize]) -> Result<usize> {
    let mut counts = channels.iter().map(|&i| signals[i].samples_per_record);
    let first = counts.next().unwrap_or(0);
    if counts.any(|count| count != first) {
        return Err(EdfError::Export(
            "Channels with different samples per record cannot be interleaved".to_string(),
        ));
    }
    Ok(first)
}

/// Builds one frame-major blob: for each sample slot, one little-endian
/// value per channel in channel order.
pub fn interleave_frames(record: &DataRecord, channels: &[usize]) -> Vec<u8> {
    let columns: Vec<&[i16]> = channels
        .iter()
        .map(|&i| record.samples(i).unwrap_or(&[]))
        .collect();
    let frames = columns.iter().map(|c| c.len()).max().unwrap_or(0);

    let mut blob = Vec::with_capacity(frames * columns.len() * 2);
    for frame in 0..frames {
        for column in &columns {
            let value = column.get(frame).copied().unwrap_or(0);
            blob.extend_from_slice(&value.to_le_bytes());
        }
    }
    blob
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SignalData;

    #[test]
    fn test_interleave_is_frame_major() {
        let record = DataRecord {
            index: 0,
            signals: vec![
                SignalData::Samples(vec![1, 2, 3]),
                SignalData::Annotations(Vec::new()),
                SignalData::Samples(vec![-1, -2, -3]),
            ],
        };

        let blob = interleave_frames(&record, &[0, 2]);

        let values: Vec<i16> = blob
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(values, vec![1, -1, 2, -2, 3, -3]);
    }

    #[test]
    fn test_channel_comment() {
        let signal = SignalDescriptor {
            label: "ECG".to_string(),
            transducer: String::new(),
            physical_dimension: "mV".to_string(),
            physical_min: -5.0,
            physical_max: 5.0,
            digital_min: -2048,
            digital_max: 2047,
            prefilter: String::new(),
            samples_per_record: 500,
            reserved: String::new(),
            kind: crate::types::SignalKind::Ordinary,
        };

        let channel = ChannelInfo::from_signal(3, &signal);
        assert_eq!(channel.index, 3);
        assert_eq!(channel.bits, 16);
        assert_eq!(channel.comment, "Physical (-5,5) to (-2048,2047)");
    }
}
