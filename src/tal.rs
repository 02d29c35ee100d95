//! Time-stamped Annotation Lists (TAL) as stored in "EDF Annotations" signals.
//!
//! A TAL is `onset [0x15 duration] 0x14 text 0x14 [text 0x14 ...] 0x00`.
//! An annotation span holds any number of TALs and is padded with 0x00.

use std::str::FromStr;

use bigdecimal::BigDecimal;

use crate::error::{EdfError, Result};
use crate::types::AnnotationEvent;

/// Separates the time stamp from the annotation texts, and texts from each other
pub const TAL_TEXT_SEPARATOR: u8 = 0x14;
/// Separates onset from duration
pub const TAL_DURATION_SEPARATOR: u8 = 0x15;
pub const TAL_TERMINATOR: u8 = 0x00;

/// Decodes every TAL in one record's annotation span.
///
/// Decoding stops at the first TAL that would start with a null byte, so
/// trailing padding is ignored.
///
/// # Examples
///
/// ```rust
/// use edf_export::tal::parse_tals;
///
/// let events = parse_tals(b"+1.5\x152.0\x14Seizure\x14\x00\x00\x00")?;
/// assert_eq!(events.len(), 1);
/// assert_eq!(events[0].onset.to_string(), "1.5");
/// assert_eq!(events[0].texts, vec!["Seizure".to_string()]);
/// # Ok::<(), edf_export::EdfError>(())
/// ```
pub fn parse_tals(data: &[u8]) -> Result<Vec<AnnotationEvent>> {
    let mut events = Vec::new();
    let mut rest = data;

    while let Some(&first) = rest.first() {
        if first == TAL_TERMINATOR {
            break;
        }

        let end = rest
            .iter()
            .position(|&b| b == TAL_TERMINATOR)
            .ok_or_else(|| EdfError::MalformedAnnotation("TAL is not null-terminated".to_string()))?;

        events.push(parse_tal(&rest[..end])?);
        rest = &rest[end + 1..];
    }

    Ok(events)
}

/// Decodes a single TAL body (without its terminating null byte).
pub fn parse_tal(body: &[u8]) -> Result<AnnotationEvent> {
    let stamp_end = body
        .iter()
        .position(|&b| b == TAL_TEXT_SEPARATOR)
        .ok_or_else(|| EdfError::MalformedAnnotation("TAL has no annotation separator".to_string()))?;
    let (stamp, texts) = (&body[..stamp_end], &body[stamp_end + 1..]);

    let (onset, duration) = match stamp.iter().position(|&b| b == TAL_DURATION_SEPARATOR) {
        Some(split) => (
            parse_seconds("onset", &stamp[..split])?,
            Some(parse_seconds("duration", &stamp[split + 1..])?),
        ),
        None => (parse_seconds("onset", stamp)?, None),
    };

    // 最后一个分隔符之后的空串不是注释
    let texts = texts
        .strip_suffix(&[TAL_TEXT_SEPARATOR])
        .ok_or_else(|| {
            EdfError::MalformedAnnotation("TAL does not end with an annotation separator".to_string())
        })?
        .split(|&b| b == TAL_TEXT_SEPARATOR)
        .map(|text| String::from_utf8_lossy(text).into_owned())
        .collect();

    Ok(AnnotationEvent { onset, duration, texts })
}

fn parse_seconds(name: &str, field: &[u8]) -> Result<BigDecimal> {
    let text = std::str::from_utf8(field)
        .map_err(|_| EdfError::MalformedAnnotation(format!("{} is not ASCII", name)))?
        .trim();

    let digits = text.strip_prefix(['+', '-']).unwrap_or(text);
    let valid = !digits.is_empty()
        && digits.bytes().all(|b| b.is_ascii_digit() || b == b'.')
        && digits.bytes().any(|b| b.is_ascii_digit())
        && digits.bytes().filter(|&b| b == b'.').count() <= 1;
    if !valid {
        return Err(EdfError::MalformedAnnotation(format!("Invalid {} '{}'", name, text)));
    }

    let value = BigDecimal::from_str(digits)
        .map_err(|_| EdfError::MalformedAnnotation(format!("Invalid {} '{}'", name, text)))?;
    Ok(if text.starts_with('-') { -value } else { value })
}
