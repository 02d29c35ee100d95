//! Byte layout of the data records that follow the header.

use std::ops::Range;

use log::warn;

use crate::tal::parse_tals;
use crate::types::{DataRecord, SignalData, SignalDescriptor, SignalKind};

/// Every sample is a 16 bit little-endian integer.
pub const BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordLayout {
    header_bytes: u64,
    /// 每个信号在数据记录中的字节范围
    spans: Vec<Range<usize>>,
    record_size: usize,
}

impl RecordLayout {
    /// Computes the layout from the header length and the per-signal sample counts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use edf_export::RecordLayout;
    ///
    /// let layout = RecordLayout::new(768, &[3, 1]);
    /// assert_eq!(layout.record_size(), 8);
    /// assert_eq!(layout.record_offset(2), 784);
    /// assert_eq!(layout.span(1), 6..8);
    /// ```
    pub fn new(header_bytes: u64, samples_per_record: &[usize]) -> Self {
        let mut spans = Vec::with_capacity(samples_per_record.len());
        let mut buffer_offset = 0;

        for &samples in samples_per_record {
            let len = samples * BYTES_PER_SAMPLE;
            spans.push(buffer_offset..buffer_offset + len);
            buffer_offset += len;
        }

        RecordLayout {
            header_bytes,
            spans,
            record_size: buffer_offset,
        }
    }

    pub fn from_signals(header_bytes: u64, signals: &[SignalDescriptor]) -> Self {
        let counts: Vec<usize> = signals.iter().map(|s| s.samples_per_record).collect();
        Self::new(header_bytes, &counts)
    }

    /// Size of one data record in bytes
    pub fn record_size(&self) -> usize {
        self.record_size
    }

    /// File offset of the first byte of record `index`
    pub fn record_offset(&self, index: u64) -> u64 {
        self.header_bytes + index * self.record_size as u64
    }

    pub fn span(&self, signal: usize) -> Range<usize> {
        self.spans[signal].clone()
    }

    /// Splits one record's bytes into per-signal data.
    ///
    /// A TAL decoding failure only affects that record's annotation signal,
    /// which becomes [`SignalData::Skipped`].
    pub fn decode_record(&self, index: u64, bytes: &[u8], signals: &[SignalDescriptor]) -> DataRecord {
        debug_assert_eq!(bytes.len(), self.record_size);
        debug_assert_eq!(signals.len(), self.spans.len());

        let data = signals
            .iter()
            .zip(&self.spans)
            .enumerate()
            .map(|(signal, (descriptor, span))| {
                let raw = &bytes[span.clone()];
                match descriptor.kind {
                    SignalKind::Ordinary => SignalData::Samples(decode_samples(raw)),
                    SignalKind::Annotation => match parse_tals(raw) {
                        Ok(events) => SignalData::Annotations(events),
                        Err(e) => {
                            warn!(
                                "Skipping annotations of record {}, signal {}: {}",
                                index, signal, e
                            );
                            SignalData::Skipped
                        }
                    },
                }
            })
            .collect();

        DataRecord { index, signals: data }
    }
}

/// 转换为有符号16位整数（小端序）
pub fn decode_samples(raw: &[u8]) -> Vec<i16> {
    raw.chunks_exact(BYTES_PER_SAMPLE)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}
