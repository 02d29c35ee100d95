//! Storage sinks: an in-memory sink and the SCF container file writer.
//!
//! SCF (segment container file) is a flat little-endian chunk stream:
//! the magic `SCF1`, then chunks of `[kind u8][payload length u32][payload]`.
//! Strings are stored as `[length u16][utf-8 bytes]`.

use std::io::{self, Write};

use crate::error::{EdfError, Result};
use crate::export::{BlobId, ContainerProps, MetadataScope, RecordingHandle, Segment, StorageSink};

/// Magic bytes at the start of every SCF file
pub const SCF_MAGIC: [u8; 4] = *b"SCF1";

/// Extension used for derived output paths
pub const SCF_EXTENSION: &str = "scf";

pub const CHUNK_CONTAINER: u8 = 1;
pub const CHUNK_BLOB: u8 = 2;
pub const CHUNK_SEGMENT: u8 = 3;
pub const CHUNK_METADATA: u8 = 4;

/// Keeps everything written to it; used for tests and dry runs.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub container: Option<ContainerProps>,
    pub blobs: Vec<Vec<u8>>,
    pub segments: Vec<Segment>,
    pub metadata: Vec<(MetadataScope, String, String)>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata
            .iter()
            .find(|(_, k, _)| k == key)
            .map(|(_, _, v)| v.as_str())
    }
}

impl StorageSink for MemorySink {
    fn create_container(&mut self, props: &ContainerProps) -> Result<RecordingHandle> {
        if self.container.is_some() {
            return Err(EdfError::Export("Container already created".to_string()));
        }
        self.container = Some(props.clone());
        Ok(RecordingHandle { recording_id: 1, channel_set_id: 1 })
    }

    fn append_blob(&mut self, bytes: &[u8]) -> Result<BlobId> {
        self.blobs.push(bytes.to_vec());
        Ok(self.blobs.len() as BlobId)
    }

    fn append_segment(&mut self, segment: &Segment) -> Result<()> {
        self.segments.push(*segment);
        Ok(())
    }

    fn set_metadata(&mut self, scope: MetadataScope, key: &str, value: &str) -> Result<()> {
        self.metadata.push((scope, key.to_string(), value.to_string()));
        Ok(())
    }
}

/// Writes an SCF stream to any writer.
pub struct ContainerWriter<W: Write> {
    writer: W,
    created: bool,
    next_blob: BlobId,
}

impl<W: Write> ContainerWriter<W> {
    pub fn new(mut writer: W) -> Result<Self> {
        writer.write_all(&SCF_MAGIC)?;
        Ok(ContainerWriter { writer, created: false, next_blob: 1 })
    }

    /// Flushes and returns the underlying writer.
    pub fn finish(mut self) -> Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }

    fn write_chunk(&mut self, kind: u8, payload: &[u8]) -> Result<()> {
        let len = u32::try_from(payload.len())
            .map_err(|_| EdfError::Export(format!("Chunk of {} bytes is too large", payload.len())))?;
        self.writer.write_all(&[kind])?;
        self.writer.write_all(&len.to_le_bytes())?;
        self.writer.write_all(payload)?;
        Ok(())
    }
}

impl<W: Write> StorageSink for ContainerWriter<W> {
    fn create_container(&mut self, props: &ContainerProps) -> Result<RecordingHandle> {
        if self.created {
            return Err(EdfError::Export("Container already created".to_string()));
        }

        let mut payload = Vec::new();
        payload.extend_from_slice(&props.start.and_utc().timestamp_millis().to_le_bytes());
        payload.extend_from_slice(&props.end.and_utc().timestamp_millis().to_le_bytes());
        payload.extend_from_slice(&props.sample_rate.to_le_bytes());
        put_str(&mut payload, &props.description)?;
        let channel_count = u16::try_from(props.channels.len())
            .map_err(|_| EdfError::Export("Too many channels".to_string()))?;
        payload.extend_from_slice(&channel_count.to_le_bytes());

        for channel in &props.channels {
            payload.extend_from_slice(&(channel.index as u16).to_le_bytes());
            put_str(&mut payload, &channel.name)?;
            put_str(&mut payload, &channel.unit)?;
            payload.push(channel.bits);
            payload.extend_from_slice(&channel.digital_min.to_le_bytes());
            payload.extend_from_slice(&channel.digital_max.to_le_bytes());
            payload.extend_from_slice(&channel.physical_min.to_le_bytes());
            payload.extend_from_slice(&channel.physical_max.to_le_bytes());
            put_str(&mut payload, &channel.comment)?;
        }

        self.write_chunk(CHUNK_CONTAINER, &payload)?;
        self.created = true;
        Ok(RecordingHandle { recording_id: 1, channel_set_id: 1 })
    }

    fn append_blob(&mut self, bytes: &[u8]) -> Result<BlobId> {
        let id = self.next_blob;
        let mut payload = Vec::with_capacity(bytes.len() + 4);
        payload.extend_from_slice(&id.to_le_bytes());
        payload.extend_from_slice(bytes);
        self.write_chunk(CHUNK_BLOB, &payload)?;
        self.next_blob += 1;
        Ok(id)
    }

    fn append_segment(&mut self, segment: &Segment) -> Result<()> {
        if !self.created {
            return Err(EdfError::Export("Segment written before the container".to_string()));
        }
        let mut payload = [0u8; 28];
        payload[0..4].copy_from_slice(&segment.recording_id.to_le_bytes());
        payload[4..8].copy_from_slice(&segment.channel_set_id.to_le_bytes());
        payload[8..16].copy_from_slice(&segment.first_sample.to_le_bytes());
        payload[16..24].copy_from_slice(&segment.last_sample.to_le_bytes());
        payload[24..28].copy_from_slice(&segment.blob_id.to_le_bytes());
        self.write_chunk(CHUNK_SEGMENT, &payload)
    }

    fn set_metadata(&mut self, scope: MetadataScope, key: &str, value: &str) -> Result<()> {
        let mut payload = Vec::new();
        // 0 表示全局作用域
        let scope_id = match scope {
            MetadataScope::Global => 0u32,
            MetadataScope::Recording(id) => id,
        };
        payload.extend_from_slice(&scope_id.to_le_bytes());
        put_str(&mut payload, key)?;
        put_str(&mut payload, value)?;
        self.write_chunk(CHUNK_METADATA, &payload)
    }
}

fn put_str(buf: &mut Vec<u8>, s: &str) -> Result<()> {
    let len = u16::try_from(s.len()).map_err(|_| {
        EdfError::Io(io::Error::new(io::ErrorKind::InvalidInput, "string longer than 65535 bytes"))
    })?;
    buf.extend_from_slice(&len.to_le_bytes());
    buf.extend_from_slice(s.as_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn props() -> ContainerProps {
        let start = NaiveDate::from_ymd_opt(2002, 3, 2)
            .unwrap()
            .and_hms_opt(14, 27, 0)
            .unwrap();
        ContainerProps {
            start,
            end: start + chrono::Duration::seconds(3),
            description: "test".to_string(),
            sample_rate: 4.0,
            channels: Vec::new(),
        }
    }

    /// Returns (kind, payload) for every chunk after the magic.
    fn chunks(bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        assert_eq!(&bytes[..4], &SCF_MAGIC);
        let mut rest = &bytes[4..];
        let mut out = Vec::new();
        while !rest.is_empty() {
            let len = u32::from_le_bytes([rest[1], rest[2], rest[3], rest[4]]) as usize;
            out.push((rest[0], rest[5..5 + len].to_vec()));
            rest = &rest[5 + len..];
        }
        out
    }

    #[test]
    fn test_container_writer_chunks() {
        let mut writer = ContainerWriter::new(Vec::new()).unwrap();
        let handle = writer.create_container(&props()).unwrap();
        let blob = writer.append_blob(&[1, 0, 2, 0]).unwrap();
        writer
            .append_segment(&Segment {
                recording_id: handle.recording_id,
                channel_set_id: handle.channel_set_id,
                first_sample: 0,
                last_sample: 1,
                blob_id: blob,
            })
            .unwrap();
        writer.set_metadata(MetadataScope::Global, "Recording.Type", "EKG").unwrap();

        let bytes = writer.finish().unwrap();
        let chunks = chunks(&bytes);

        let kinds: Vec<u8> = chunks.iter().map(|(k, _)| *k).collect();
        assert_eq!(kinds, vec![CHUNK_CONTAINER, CHUNK_BLOB, CHUNK_SEGMENT, CHUNK_METADATA]);
        assert_eq!(chunks[1].1, vec![1, 0, 0, 0, 1, 0, 2, 0]);
        assert_eq!(chunks[2].1.len(), 28);
        assert_eq!(&chunks[3].1[..4], &[0, 0, 0, 0]);
        assert_eq!(&chunks[3].1[4..6], &14u16.to_le_bytes());
    }

    #[test]
    fn test_segment_before_container_fails() {
        let mut writer = ContainerWriter::new(Vec::new()).unwrap();
        let segment = Segment {
            recording_id: 1,
            channel_set_id: 1,
            first_sample: 0,
            last_sample: 0,
            blob_id: 1,
        };
        assert!(matches!(writer.append_segment(&segment), Err(EdfError::Export(_))));
    }

    #[test]
    fn test_memory_sink_assigns_blob_ids() {
        let mut sink = MemorySink::new();
        sink.create_container(&props()).unwrap();
        assert!(sink.create_container(&props()).is_err());
        assert_eq!(sink.append_blob(&[0, 0]).unwrap(), 1);
        assert_eq!(sink.append_blob(&[1, 1]).unwrap(), 2);
        sink.set_metadata(MetadataScope::Global, "k", "v").unwrap();
        assert_eq!(sink.metadata_value("k"), Some("v"));
    }
}
