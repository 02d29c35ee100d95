use crate::error::{EdfError, Result};

/// 将定长ASCII字段解码为去除首尾空格的字符串
pub fn field_text(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

/// 解析整数字段（去除填充空格后必须是合法整数）
pub fn parse_integer_field(name: &str, bytes: &[u8]) -> Result<i64> {
    let text = field_text(bytes);
    text.parse::<i64>().map_err(|_| {
        EdfError::MalformedHeader(format!("{} is not an integer: '{}'", name, text))
    })
}

/// 解析实数字段
pub fn parse_float_field(name: &str, bytes: &[u8]) -> Result<f64> {
    let text = field_text(bytes);
    match text.parse::<f64>() {
        Ok(value) if value.is_finite() => Ok(value),
        _ => Err(EdfError::MalformedHeader(format!(
            "{} is not a number: '{}'",
            name, text
        ))),
    }
}

/// 解析EDF时间字符串为100纳秒单位
pub fn parse_edf_time(s: &str) -> Result<i64> {
    let s = s.trim();

    if s.is_empty() {
        return Err(EdfError::MalformedHeader("Empty time string".to_string()));
    }

    // 处理符号
    let (negative, s) = if let Some(rest) = s.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = s.strip_prefix('+') {
        (false, rest)
    } else {
        (false, s)
    };

    let invalid = || EdfError::MalformedHeader(format!("Invalid time value: '{}'", s));
    let all_digits = |part: &str| part.bytes().all(|b| b.is_ascii_digit());

    let (integer_part, decimal_part) = match s.find('.') {
        Some(dot_pos) => (&s[..dot_pos], &s[dot_pos + 1..]),
        None => (s, ""),
    };
    if (integer_part.is_empty() && decimal_part.is_empty())
        || !all_digits(integer_part)
        || !all_digits(decimal_part)
    {
        return Err(invalid());
    }

    let mut value = 0i64;

    if !integer_part.is_empty() {
        value = integer_part
            .parse::<i64>()
            .ok()
            .and_then(|v| v.checked_mul(crate::EDFLIB_TIME_DIMENSION))
            .ok_or_else(invalid)?;
    }

    // 解析小数部分（最多7位精度）
    if !decimal_part.is_empty() {
        let decimal_str = if decimal_part.len() > 7 {
            &decimal_part[..7]
        } else {
            decimal_part
        };

        let decimal_value = decimal_str.parse::<i64>().map_err(|_| invalid())?;
        let scale = 10i64.pow(7 - decimal_str.len() as u32);
        value += decimal_value * scale;
    }

    if negative {
        value = -value;
    }

    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_text_trims_padding() {
        assert_eq!(field_text(b"EEG Fp1         "), "EEG Fp1");
        assert_eq!(field_text(b"        "), "");
    }

    #[test]
    fn test_parse_integer_field() {
        assert_eq!(parse_integer_field("n", b"768     ").unwrap(), 768);
        assert_eq!(parse_integer_field("n", b"-32768  ").unwrap(), -32768);
        assert_eq!(parse_integer_field("n", b"+12     ").unwrap(), 12);
        assert!(matches!(
            parse_integer_field("n", b"12.5    "),
            Err(EdfError::MalformedHeader(_))
        ));
        assert!(parse_integer_field("n", b"        ").is_err());
    }

    #[test]
    fn test_parse_float_field() {
        assert_eq!(parse_float_field("p", b"-200    ").unwrap(), -200.0);
        assert_eq!(parse_float_field("p", b"3.25    ").unwrap(), 3.25);
        assert!(parse_float_field("p", b"abc     ").is_err());
    }

    #[test]
    fn test_parse_edf_time() {
        assert_eq!(parse_edf_time("1").unwrap(), 10_000_000);
        assert_eq!(parse_edf_time("1.5").unwrap(), 15_000_000);
        assert_eq!(parse_edf_time("-2.5").unwrap(), -25_000_000);
        assert_eq!(parse_edf_time("+0.0000001").unwrap(), 1);
        assert_eq!(parse_edf_time("0.25    ").unwrap(), 2_500_000);
        assert!(parse_edf_time("").is_err());
        assert!(parse_edf_time("1.5e3").is_err());
        assert!(parse_edf_time(".").is_err());
    }
}
