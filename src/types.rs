use std::fmt;

use bigdecimal::BigDecimal;
use chrono::{Duration, NaiveDateTime};

use crate::{ANNOTATION_LABEL, EDFLIB_TIME_DIMENSION};

/// EDF变体，由头部保留字段的前缀决定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileFormat {
    Edf,
    /// EDF+ 连续记录
    EdfPlusC,
    /// EDF+ 不连续记录
    EdfPlusD,
}

impl FileFormat {
    /// 根据44字节保留字段识别格式
    pub fn detect(reserved: &[u8]) -> Self {
        if reserved.starts_with(b"EDF+C") {
            FileFormat::EdfPlusC
        } else if reserved.starts_with(b"EDF+D") {
            FileFormat::EdfPlusD
        } else {
            FileFormat::Edf
        }
    }

    pub fn is_edfplus(&self) -> bool {
        !matches!(self, FileFormat::Edf)
    }
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FileFormat::Edf => "EDF",
            FileFormat::EdfPlusC => "EDF+C",
            FileFormat::EdfPlusD => "EDF+D",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileHeader {
    pub version: String,
    /// 本地患者标识（原始80字节字段）
    pub patient: String,
    /// 本地记录标识（原始80字节字段）
    pub recording: String,
    pub format: FileFormat,
    pub start: NaiveDateTime,
    /// 头部字节数，即数据记录开始的偏移
    pub header_bytes: u64,
    pub datarecords_in_file: u64,
    pub datarecord_duration: i64,     // 数据记录持续时间（100纳秒为单位）
    pub signal_count: usize,
}

impl FileHeader {
    pub fn datarecord_duration_seconds(&self) -> f64 {
        self.datarecord_duration as f64 / EDFLIB_TIME_DIMENSION as f64
    }

    /// 整个文件的持续时间（100纳秒为单位）
    pub fn file_duration(&self) -> Option<i64> {
        i64::try_from(self.datarecords_in_file)
            .ok()
            .and_then(|n| self.datarecord_duration.checked_mul(n))
    }

    pub fn end_time(&self) -> Option<NaiveDateTime> {
        let duration = Duration::microseconds(self.file_duration()? / 10);
        self.start.checked_add_signed(duration)
    }

    /// EDF+ 患者字段: "patientcode sex birthdate patientname additional_info"
    pub fn patient_info(&self) -> PatientInfo {
        let parts: Vec<&str> = self.patient.split_whitespace().collect();
        let part = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();

        PatientInfo {
            code: part(0),
            sex: part(1),
            birthdate: part(2),
            name: part(3),
            additional: parts.get(4..).map(|s| s.join(" ")).unwrap_or_default(),
        }
    }

    /// EDF+ 记录字段: "Startdate dd-MMM-yyyy admincode technician equipment additional_info"
    pub fn recording_info(&self) -> RecordingInfo {
        let parts: Vec<&str> = self.recording.split_whitespace().collect();
        let part = |i: usize| parts.get(i).map(|s| s.to_string()).unwrap_or_default();

        RecordingInfo {
            admin_code: part(2),
            technician: part(3),
            equipment: part(4),
            additional: parts.get(5..).map(|s| s.join(" ")).unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatientInfo {
    pub code: String,
    pub sex: String,
    pub birthdate: String,
    pub name: String,
    pub additional: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordingInfo {
    pub admin_code: String,
    pub technician: String,
    pub equipment: String,
    pub additional: String,
}

/// 信号类别，在解析头部时根据标签确定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    Ordinary,
    Annotation,
}

impl SignalKind {
    pub fn from_label(label: &str) -> Self {
        if label == ANNOTATION_LABEL {
            SignalKind::Annotation
        } else {
            SignalKind::Ordinary
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SignalDescriptor {
    pub label: String,
    pub transducer: String,
    pub physical_dimension: String,
    pub physical_min: f64,
    pub physical_max: f64,
    pub digital_min: i32,
    pub digital_max: i32,
    pub prefilter: String,
    pub samples_per_record: usize,
    pub reserved: String,
    pub kind: SignalKind,
}

impl SignalDescriptor {
    pub fn is_annotation(&self) -> bool {
        self.kind == SignalKind::Annotation
    }

    /// 计算物理值转换参数
    pub fn bit_value(&self) -> f64 {
        (self.physical_max - self.physical_min) /
        (self.digital_max - self.digital_min) as f64
    }

    /// 计算偏移量
    pub fn offset(&self) -> f64 {
        self.physical_max / self.bit_value() - self.digital_max as f64
    }

    /// 将数字值转换为物理值
    pub fn to_physical(&self, digital_value: i32) -> f64 {
        self.bit_value() * (self.offset() + digital_value as f64)
    }

    /// Samples per second, given the record duration in 100 ns units.
    pub fn sample_rate(&self, datarecord_duration: i64) -> Option<f64> {
        if datarecord_duration <= 0 {
            return None;
        }
        let seconds = datarecord_duration as f64 / EDFLIB_TIME_DIMENSION as f64;
        Some(self.samples_per_record as f64 / seconds)
    }
}

/// One Time-stamped Annotation List entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotationEvent {
    /// Seconds relative to the recording start, exact.
    pub onset: BigDecimal,
    pub duration: Option<BigDecimal>,
    pub texts: Vec<String>,
}

impl AnnotationEvent {
    /// The record time stamp every EDF+ record starts with ("+onset\x14\x14")
    pub fn is_time_keeping(&self) -> bool {
        self.duration.is_none() && self.texts.len() == 1 && self.texts[0].is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SignalData {
    Samples(Vec<i16>),
    Annotations(Vec<AnnotationEvent>),
    /// The annotation span of this record could not be decoded.
    Skipped,
}

/// 一个数据记录，每个信号对应一项，顺序与信号描述表相同
#[derive(Debug, Clone, PartialEq)]
pub struct DataRecord {
    pub index: u64,
    pub signals: Vec<SignalData>,
}

impl DataRecord {
    pub fn samples(&self, signal: usize) -> Option<&[i16]> {
        match self.signals.get(signal) {
            Some(SignalData::Samples(samples)) => Some(samples.as_slice()),
            _ => None,
        }
    }

    /// All events from every annotation signal of this record.
    pub fn annotations(&self) -> impl Iterator<Item = &AnnotationEvent> {
        self.signals
            .iter()
            .filter_map(|data| match data {
                SignalData::Annotations(events) => Some(events.iter()),
                _ => None,
            })
            .flatten()
    }

    pub fn time_keeping(&self) -> Option<&BigDecimal> {
        self.annotations()
            .find(|event| event.is_time_keeping())
            .map(|event| &event.onset)
    }

    pub fn has_skipped_annotations(&self) -> bool {
        self.signals.iter().any(|data| matches!(data, SignalData::Skipped))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn eeg_descriptor() -> SignalDescriptor {
        SignalDescriptor {
            label: "EEG Fp1".to_string(),
            transducer: String::new(),
            physical_dimension: "uV".to_string(),
            physical_min: -100.0,
            physical_max: 100.0,
            digital_min: -32768,
            digital_max: 32767,
            prefilter: String::new(),
            samples_per_record: 256,
            reserved: String::new(),
            kind: SignalKind::Ordinary,
        }
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(FileFormat::detect(b"EDF+C                 "), FileFormat::EdfPlusC);
        assert_eq!(FileFormat::detect(b"EDF+D"), FileFormat::EdfPlusD);
        assert_eq!(FileFormat::detect(b"                      "), FileFormat::Edf);
        assert_eq!(FileFormat::detect(b"EDF+X"), FileFormat::Edf);
        assert_eq!(FileFormat::detect(b" EDF+C"), FileFormat::Edf);
        assert_eq!(FileFormat::EdfPlusD.to_string(), "EDF+D");
    }

    #[test]
    fn test_signal_kind_requires_exact_label() {
        assert_eq!(SignalKind::from_label("EDF Annotations"), SignalKind::Annotation);
        assert_eq!(SignalKind::from_label("EDF annotations"), SignalKind::Ordinary);
        assert_eq!(SignalKind::from_label("EDF  Annotations"), SignalKind::Ordinary);
    }

    #[test]
    fn test_physical_conversion() {
        let signal = eeg_descriptor();
        let physical = signal.to_physical(16384);
        assert!((physical - 50.0).abs() < 0.1);
        assert!((signal.to_physical(32767) - 100.0).abs() < 1e-9);
        assert_eq!(signal.sample_rate(EDFLIB_TIME_DIMENSION), Some(256.0));
        assert_eq!(signal.sample_rate(5_000_000), Some(512.0));
        assert_eq!(signal.sample_rate(0), None);
    }

    #[test]
    fn test_time_keeping_lookup() {
        let record = DataRecord {
            index: 3,
            signals: vec![
                SignalData::Samples(vec![1, 2]),
                SignalData::Annotations(vec![
                    AnnotationEvent {
                        onset: BigDecimal::from_str("3").unwrap(),
                        duration: None,
                        texts: vec![String::new()],
                    },
                    AnnotationEvent {
                        onset: BigDecimal::from_str("3.5").unwrap(),
                        duration: None,
                        texts: vec!["Blink".to_string()],
                    },
                ]),
            ],
        };

        assert_eq!(record.time_keeping(), Some(&BigDecimal::from_str("3").unwrap()));
        assert_eq!(record.annotations().count(), 2);
        assert_eq!(record.samples(0), Some(&[1i16, 2][..]));
        assert_eq!(record.samples(1), None);
        assert!(!record.has_skipped_annotations());
    }
}
