// Internal utilities for documentation and integration tests
// Builds synthetic EDF+ byte images so tests don't depend on recordings on disk

use crate::Result;
use std::path::Path;

#[derive(Debug, Clone)]
pub struct FixtureSignal {
    pub label: String,
    pub physical_dimension: String,
    pub physical_min: String,
    pub physical_max: String,
    pub digital_min: String,
    pub digital_max: String,
    pub samples_per_record: usize,
}

/// A synthetic EDF(+) file, encoded field by field.
#[derive(Debug, Clone)]
pub struct EdfFixture {
    pub reserved: String,
    pub patient: String,
    pub recording: String,
    pub start_date: String,
    pub start_time: String,
    pub record_duration: String,
    /// Overrides the record count field, e.g. with "-1"
    pub record_count: Option<String>,
    pub signals: Vec<FixtureSignal>,
    /// Raw bytes per record, per signal
    pub records: Vec<Vec<Vec<u8>>>,
}

impl Default for EdfFixture {
    fn default() -> Self {
        EdfFixture {
            reserved: "EDF+C".to_string(),
            patient: "MCH-0234567 F 02-MAY-1951 Haagse_Harry".to_string(),
            recording: "Startdate 02-MAR-2002 EMG561 BK/JOP Sony. MNC R Median Nerve.".to_string(),
            start_date: "02.03.02".to_string(),
            start_time: "14.27.00".to_string(),
            record_duration: "1".to_string(),
            record_count: None,
            signals: Vec::new(),
            records: Vec::new(),
        }
    }
}

impl EdfFixture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal(mut self, label: &str, samples_per_record: usize) -> Self {
        self.signals.push(FixtureSignal {
            label: label.to_string(),
            physical_dimension: if label == crate::ANNOTATION_LABEL { "" } else { "mV" }.to_string(),
            physical_min: "-5".to_string(),
            physical_max: "5".to_string(),
            digital_min: "-32768".to_string(),
            digital_max: "32767".to_string(),
            samples_per_record,
        });
        self
    }

    pub fn record(mut self, spans: Vec<Vec<u8>>) -> Self {
        self.records.push(spans);
        self
    }

    /// Little-endian sample bytes
    pub fn samples(values: &[i16]) -> Vec<u8> {
        values.iter().flat_map(|v| v.to_le_bytes()).collect()
    }

    /// TAL bytes padded with nulls to fill `samples` sample slots
    pub fn annotations(tals: &[u8], samples: usize) -> Vec<u8> {
        let mut span = tals.to_vec();
        span.resize(samples * 2, 0);
        span
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let n = self.signals.len();
        let mut buf = Vec::with_capacity((n + 1) * 256);

        put(&mut buf, "0", 8);
        put(&mut buf, &self.patient, 80);
        put(&mut buf, &self.recording, 80);
        put(&mut buf, &self.start_date, 8);
        put(&mut buf, &self.start_time, 8);
        put(&mut buf, &((n + 1) * 256).to_string(), 8);
        put(&mut buf, &self.reserved, 44);
        let record_count = self
            .record_count
            .clone()
            .unwrap_or_else(|| self.records.len().to_string());
        put(&mut buf, &record_count, 8);
        put(&mut buf, &self.record_duration, 8);
        put(&mut buf, &n.to_string(), 4);

        for s in &self.signals {
            put(&mut buf, &s.label, 16);
        }
        for _ in &self.signals {
            put(&mut buf, "", 80);
        }
        for s in &self.signals {
            put(&mut buf, &s.physical_dimension, 8);
        }
        for s in &self.signals {
            put(&mut buf, &s.physical_min, 8);
        }
        for s in &self.signals {
            put(&mut buf, &s.physical_max, 8);
        }
        for s in &self.signals {
            put(&mut buf, &s.digital_min, 8);
        }
        for s in &self.signals {
            put(&mut buf, &s.digital_max, 8);
        }
        for _ in &self.signals {
            put(&mut buf, "", 80);
        }
        for s in &self.signals {
            put(&mut buf, &s.samples_per_record.to_string(), 8);
        }
        for _ in &self.signals {
            put(&mut buf, "", 32);
        }

        for record in &self.records {
            for span in record {
                buf.extend_from_slice(span);
            }
        }
        buf
    }

    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }
}

fn put(buf: &mut Vec<u8>, text: &str, width: usize) {
    let mut field = text.as_bytes().to_vec();
    field.resize(width, b' ');
    buf.extend_from_slice(&field[..width]);
}

/// Two ECG leads plus an annotation signal, three one-second records
pub fn simple_fixture() -> EdfFixture {
    let mut fixture = EdfFixture::new()
        .signal("ECG I", 4)
        .signal("ECG II", 4)
        .signal(crate::ANNOTATION_LABEL, 15);

    for i in 0..3i16 {
        let tal = format!("+{}\x14\x14\x00", i);
        let mut tals = tal.into_bytes();
        if i == 1 {
            tals.extend_from_slice(b"+1.5\x150.2\x14Beat\x14\x00");
        }
        fixture = fixture.record(vec![
            EdfFixture::samples(&[i * 10, i * 10 + 1, i * 10 + 2, i * 10 + 3]),
            EdfFixture::samples(&[-i, -i - 1, -i - 2, -i - 3]),
            EdfFixture::annotations(&tals, 15),
        ]);
    }
    fixture
}

/// Creates a simple test EDF+ file for documentation examples
pub fn create_simple_test_file<P: AsRef<Path>>(path: P) -> Result<()> {
    simple_fixture().write_to(path)
}
