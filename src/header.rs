//! Decoding of the fixed-layout EDF header.
//!
//! The main header is 256 bytes, followed by 256 bytes per signal laid out
//! column by column: all labels first, then all transducers, and so on.

use std::io::{self, Read};

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use log::{debug, warn};

use crate::error::{EdfError, Result};
use crate::types::{FileFormat, FileHeader, SignalDescriptor, SignalKind};
use crate::utils::{field_text, parse_edf_time, parse_float_field, parse_integer_field};
use crate::EDFLIB_MAXSIGNALS;

/// Size of the main header and of each signal's header block.
pub const MAIN_HEADER_SIZE: usize = 256;
pub const SIGNAL_HEADER_SIZE: usize = 256;

// 信号头部各列的宽度，按文件中的顺序排列
const LABEL_WIDTH: usize = 16;
const TRANSDUCER_WIDTH: usize = 80;
const DIMENSION_WIDTH: usize = 8;
const PHYS_MIN_WIDTH: usize = 8;
const PHYS_MAX_WIDTH: usize = 8;
const DIG_MIN_WIDTH: usize = 8;
const DIG_MAX_WIDTH: usize = 8;
const PREFILTER_WIDTH: usize = 80;
const SAMPLES_WIDTH: usize = 8;
const RESERVED_WIDTH: usize = 32;

/// Reads the full header from a byte source positioned at offset 0.
///
/// Consumes exactly `256 * (N + 1)` bytes. The format variant is reported
/// as found; rejecting plain EDF is left to the caller.
pub fn decode_header<R: Read>(reader: &mut R) -> Result<(FileHeader, Vec<SignalDescriptor>)> {
    let mut main_header = [0u8; MAIN_HEADER_SIZE];
    read_header_bytes(reader, &mut main_header)?;

    let version = field_text(&main_header[0..8]);
    if version != "0" {
        return Err(EdfError::MalformedHeader(format!("Unknown version '{}'", version)));
    }

    let patient = field_text(&main_header[8..88]);
    let recording = field_text(&main_header[88..168]);
    let start = parse_datetime(&main_header[168..176], &main_header[176..184])?;

    let header_bytes = parse_integer_field("header byte count", &main_header[184..192])?;
    let format = FileFormat::detect(&main_header[192..236]);

    let datarecords = parse_integer_field("number of data records", &main_header[236..244])?;
    if datarecords == -1 {
        return Err(EdfError::UnsupportedFormat(
            "unknown number of data records (-1)".to_string(),
        ));
    }
    let datarecords_in_file = u64::try_from(datarecords).map_err(|_| {
        EdfError::MalformedHeader(format!("Invalid number of data records: {}", datarecords))
    })?;

    let datarecord_duration = parse_edf_time(&field_text(&main_header[244..252]))?;
    if datarecord_duration < 0 {
        return Err(EdfError::MalformedHeader(
            "Negative data record duration".to_string(),
        ));
    }

    let signal_count = parse_integer_field("number of signals", &main_header[252..256])?;
    if signal_count < 1 || signal_count > EDFLIB_MAXSIGNALS as i64 {
        return Err(EdfError::MalformedHeader(format!(
            "Invalid number of signals: {}",
            signal_count
        )));
    }
    let signal_count = signal_count as usize;

    let header_bytes = u64::try_from(header_bytes).map_err(|_| {
        EdfError::MalformedHeader(format!("Invalid header byte count: {}", header_bytes))
    })?;
    let expected_header_bytes = ((signal_count + 1) * SIGNAL_HEADER_SIZE) as u64;
    if header_bytes != expected_header_bytes {
        warn!(
            "Header declares {} bytes but {} signals need {}; using the declared value",
            header_bytes, signal_count, expected_header_bytes
        );
    }

    let mut signal_header = vec![0u8; signal_count * SIGNAL_HEADER_SIZE];
    read_header_bytes(reader, &mut signal_header)?;
    let signals = parse_signals(&signal_header, signal_count)?;

    debug!(
        "Decoded {} header: {} signals, {} records of {} x 100ns",
        format, signal_count, datarecords_in_file, datarecord_duration
    );

    let header = FileHeader {
        version,
        patient,
        recording,
        format,
        start,
        header_bytes,
        datarecords_in_file,
        datarecord_duration,
        signal_count,
    };

    Ok((header, signals))
}

fn read_header_bytes<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<()> {
    reader.read_exact(buf).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => {
            EdfError::MalformedHeader("File ends inside the header".to_string())
        }
        _ => EdfError::Io(e),
    })
}

/// 解析日期时间 "dd.mm.yy" + "hh.mm.ss"
fn parse_datetime(date_field: &[u8], time_field: &[u8]) -> Result<NaiveDateTime> {
    let date_str = field_text(date_field);
    let time_str = field_text(time_field);

    let [day, month, yy] = split_triplet(&date_str)
        .ok_or_else(|| EdfError::MalformedHeader(format!("Invalid start date '{}'", date_str)))?;
    // 85-99 属于 1900 年代，00-84 属于 2000 年代
    let year = if yy > 84 { 1900 + yy } else { 2000 + yy };
    let start_date = NaiveDate::from_ymd_opt(year as i32, month, day)
        .ok_or_else(|| EdfError::MalformedHeader(format!("Invalid start date '{}'", date_str)))?;

    let [hour, minute, second] = split_triplet(&time_str)
        .ok_or_else(|| EdfError::MalformedHeader(format!("Invalid start time '{}'", time_str)))?;
    let start_time = NaiveTime::from_hms_opt(hour, minute, second)
        .ok_or_else(|| EdfError::MalformedHeader(format!("Invalid start time '{}'", time_str)))?;

    Ok(NaiveDateTime::new(start_date, start_time))
}

/// Splits "aa.bb.cc" into three two-digit numbers.
fn split_triplet(s: &str) -> Option<[u32; 3]> {
    let mut parts = s.split('.');
    let mut values = [0u32; 3];
    for value in values.iter_mut() {
        let part = parts.next()?;
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        *value = part.parse().ok()?;
    }
    if parts.next().is_some() {
        return None;
    }
    Some(values)
}

/// 解析信号参数
fn parse_signals(signal_header: &[u8], total_signal_count: usize) -> Result<Vec<SignalDescriptor>> {
    let n = total_signal_count;

    // 每列的起始偏移 = 之前所有列宽度之和 * 信号数量
    let transducer_base = n * LABEL_WIDTH;
    let dimension_base = transducer_base + n * TRANSDUCER_WIDTH;
    let phys_min_base = dimension_base + n * DIMENSION_WIDTH;
    let phys_max_base = phys_min_base + n * PHYS_MIN_WIDTH;
    let dig_min_base = phys_max_base + n * PHYS_MAX_WIDTH;
    let dig_max_base = dig_min_base + n * DIG_MIN_WIDTH;
    let prefilter_base = dig_max_base + n * DIG_MAX_WIDTH;
    let samples_base = prefilter_base + n * PREFILTER_WIDTH;
    let reserved_base = samples_base + n * SAMPLES_WIDTH;
    debug_assert_eq!(reserved_base + n * RESERVED_WIDTH, signal_header.len());

    let field = |base: usize, width: usize, i: usize| &signal_header[base + i * width..base + (i + 1) * width];

    let mut signals = Vec::with_capacity(n);
    for i in 0..n {
        let label = field_text(field(0, LABEL_WIDTH, i));
        let kind = SignalKind::from_label(&label);

        let digital_min = parse_integer_field("digital minimum", field(dig_min_base, DIG_MIN_WIDTH, i))?;
        let digital_max = parse_integer_field("digital maximum", field(dig_max_base, DIG_MAX_WIDTH, i))?;
        let samples_per_record =
            parse_integer_field("samples per record", field(samples_base, SAMPLES_WIDTH, i))?;

        let digital_min = i32::try_from(digital_min)
            .map_err(|_| EdfError::MalformedHeader(format!("Digital minimum out of range: {}", digital_min)))?;
        let digital_max = i32::try_from(digital_max)
            .map_err(|_| EdfError::MalformedHeader(format!("Digital maximum out of range: {}", digital_max)))?;
        let samples_per_record = usize::try_from(samples_per_record).map_err(|_| {
            EdfError::MalformedHeader(format!(
                "Signal {} has a negative sample count: {}",
                i, samples_per_record
            ))
        })?;

        signals.push(SignalDescriptor {
            label,
            transducer: field_text(field(transducer_base, TRANSDUCER_WIDTH, i)),
            physical_dimension: field_text(field(dimension_base, DIMENSION_WIDTH, i)),
            physical_min: parse_float_field("physical minimum", field(phys_min_base, PHYS_MIN_WIDTH, i))?,
            physical_max: parse_float_field("physical maximum", field(phys_max_base, PHYS_MAX_WIDTH, i))?,
            digital_min,
            digital_max,
            prefilter: field_text(field(prefilter_base, PREFILTER_WIDTH, i)),
            samples_per_record,
            reserved: field_text(field(reserved_base, RESERVED_WIDTH, i)),
            kind,
        });
    }

    Ok(signals)
}
