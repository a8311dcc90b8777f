// Date helpers: dates travel through transforms as RFC 3339 strings

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, SecondsFormat, TimeDelta, TimeZone, Utc};
use serde_json::Value;

use crate::domain::expression::value::{to_number, to_text};
use crate::domain::expression::ExpressionError;

const DEFAULT_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%:z";
const QUERY_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";
// about 285 million years either way
const MAX_OFFSET_MS: f64 = 9.0e18;

/// Read a date from epoch milliseconds or a date/date-time string
pub fn parse_date(value: &Value) -> Option<DateTime<FixedOffset>> {
    match value {
        Value::Number(n) => {
            let millis = n.as_f64()?;
            Utc.timestamp_millis_opt(millis as i64)
                .single()
                .map(|dt| dt.fixed_offset())
        }
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt);
            }
            ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                })
                .map(|naive| naive.and_utc().fixed_offset())
        }
        _ => None,
    }
}

fn to_value(date: DateTime<FixedOffset>) -> Value {
    Value::String(date.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// `newDate()`, `newDate(millisOrText)` or `newDate(year, monthIndex, day, h, m, s, ms)` (UTC)
pub fn new_date(args: &[Option<Value>]) -> Result<Option<Value>, ExpressionError> {
    match args {
        [] => Ok(Some(to_value(Utc::now().fixed_offset()))),
        [single] => {
            let date = single
                .as_ref()
                .and_then(parse_date)
                .ok_or_else(|| ExpressionError::Evaluation(format!("invalid date '{}'", to_text(single))))?;
            Ok(Some(to_value(date)))
        }
        parts => {
            let part = |i: usize, default: f64| {
                parts
                    .get(i)
                    .map(to_number)
                    .filter(|n| !n.is_nan())
                    .unwrap_or(default)
            };
            let date = date_from_parts(
                part(0, 1970.0),
                part(1, 0.0),
                part(2, 1.0),
                [part(3, 0.0), part(4, 0.0), part(5, 0.0), part(6, 0.0)],
            )
            .ok_or_else(|| ExpressionError::Evaluation("invalid date components".to_string()))?;
            Ok(Some(to_value(date.and_utc().fixed_offset())))
        }
    }
}

/// Out-of-range components roll over into the next larger unit (month 12 is January next year)
fn date_from_parts(
    year: f64,
    month: f64,
    day: f64,
    [hour, minute, second, milli]: [f64; 4],
) -> Option<NaiveDateTime> {
    let months = year.trunc() * 12.0 + month.trunc();
    let offset_ms = (day.trunc() - 1.0) * 86_400_000.0
        + hour.trunc() * 3_600_000.0
        + minute.trunc() * 60_000.0
        + second.trunc() * 1000.0
        + milli.trunc();
    if !months.is_finite()
        || months.abs() > f64::from(i32::MAX)
        || !offset_ms.is_finite()
        || offset_ms.abs() > MAX_OFFSET_MS
    {
        return None;
    }

    let months = months as i64;
    let year = i32::try_from(months.div_euclid(12)).ok()?;
    let month = u32::try_from(months.rem_euclid(12)).ok()? + 1;
    let start = NaiveDate::from_ymd_opt(year, month, 1)?.and_hms_opt(0, 0, 0)?;
    start.checked_add_signed(TimeDelta::try_milliseconds(offset_ms as i64)?)
}

/// `formatDate(date, format?)`: dayjs-style tokens, or `forQuery` for `datetime'...'` literals
pub fn format_date(args: &[Option<Value>]) -> Result<Option<Value>, ExpressionError> {
    let date_arg = args.first().cloned().flatten();
    let date = date_arg
        .as_ref()
        .and_then(parse_date)
        .ok_or_else(|| ExpressionError::Evaluation(format!("invalid date '{}'", to_text(&date_arg))))?;

    let text = match args.get(1).cloned().flatten() {
        None | Some(Value::Null) => date.format(DEFAULT_FORMAT).to_string(),
        Some(Value::String(format)) if format == "forQuery" => {
            format!("datetime'{}'", date.format(QUERY_FORMAT))
        }
        Some(format) => date.format(&translate_format(&to_text(&Some(format)))).to_string(),
    };
    Ok(Some(Value::String(text)))
}

/// dayjs tokens, longest first
const TOKENS: [(&str, &str); 23] = [
    ("YYYY", "%Y"),
    ("YY", "%y"),
    ("MMMM", "%B"),
    ("MMM", "%b"),
    ("MM", "%m"),
    ("M", "%-m"),
    ("DD", "%d"),
    ("D", "%-d"),
    ("dddd", "%A"),
    ("ddd", "%a"),
    ("HH", "%H"),
    ("H", "%-H"),
    ("hh", "%I"),
    ("h", "%-I"),
    ("mm", "%M"),
    ("m", "%-M"),
    ("ss", "%S"),
    ("s", "%-S"),
    ("SSS", "%3f"),
    ("A", "%p"),
    ("a", "%P"),
    ("ZZ", "%z"),
    ("Z", "%:z"),
];

/// Translate a dayjs format string into a chrono one; `[text]` is emitted verbatim
pub fn translate_format(format: &str) -> String {
    let mut out = String::with_capacity(format.len() * 2);
    let mut rest = format;

    'scan: while let Some(ch) = rest.chars().next() {
        if ch == '[' {
            if let Some(close) = rest.find(']') {
                out.push_str(&rest[1..close].replace('%', "%%"));
                rest = &rest[close + 1..];
                continue;
            }
        }
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                out.push_str(spec);
                rest = tail;
                continue 'scan;
            }
        }
        if ch == '%' {
            out.push_str("%%");
        } else {
            out.push(ch);
        }
        rest = &rest[ch.len_utf8()..];
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_translate_format() {
        assert_eq!(translate_format("YYYY-MM-DD"), "%Y-%m-%d");
        assert_eq!(translate_format("HH:mm:ss.SSS"), "%H:%M:%S.%3f");
        assert_eq!(translate_format("[Day] D, 100%"), "Day %-d, 100%%");
    }

    #[test]
    fn test_format_default_and_query() {
        let date = Some(json!("2024-03-05T07:08:09Z"));
        assert_eq!(
            format_date(&[date.clone()]).unwrap(),
            Some(json!("2024-03-05T07:08:09+00:00"))
        );
        assert_eq!(
            format_date(&[date.clone(), Some(json!("forQuery"))]).unwrap(),
            Some(json!("datetime'2024-03-05T07:08:09'"))
        );
        assert_eq!(
            format_date(&[date, Some(json!("DD/MM/YYYY"))]).unwrap(),
            Some(json!("05/03/2024"))
        );
    }

    #[test]
    fn test_new_date_from_parts_and_millis() {
        let from_parts = new_date(&[Some(json!(2024)), Some(json!(0)), Some(json!(31))]).unwrap();
        assert_eq!(from_parts, Some(json!("2024-01-31T00:00:00.000Z")));
        let from_millis = new_date(&[Some(json!(0))]).unwrap();
        assert_eq!(from_millis, Some(json!("1970-01-01T00:00:00.000Z")));
        assert_eq!(new_date(&[Some(json!("2024-02-01"))]).unwrap(), Some(json!("2024-02-01T00:00:00.000Z")));
    }

    #[test]
    fn test_new_date_rolls_over_out_of_range_parts() {
        let next_year = new_date(&[Some(json!(2024)), Some(json!(12)), Some(json!(1))]).unwrap();
        assert_eq!(next_year, Some(json!("2025-01-01T00:00:00.000Z")));
        let day_zero = new_date(&[Some(json!(2024)), Some(json!(2)), Some(json!(0))]).unwrap();
        assert_eq!(day_zero, Some(json!("2024-02-29T00:00:00.000Z")));
        let late = new_date(&[Some(json!(2024)), Some(json!(0)), Some(json!(1)), Some(json!(25))]).unwrap();
        assert_eq!(late, Some(json!("2024-01-02T01:00:00.000Z")));
        let earlier = new_date(&[Some(json!(2024)), Some(json!(-1)), Some(json!(1))]).unwrap();
        assert_eq!(earlier, Some(json!("2023-12-01T00:00:00.000Z")));
    }

    #[test]
    fn test_new_date_with_huge_parts_is_an_error() {
        assert!(new_date(&[Some(json!(2024)), Some(json!(5e9)), Some(json!(1))]).is_err());
        assert!(new_date(&[Some(json!(2024)), Some(json!(0)), Some(json!(1e300))]).is_err());
        assert!(new_date(&[Some(json!(2024)), Some(json!(0)), Some(json!(1)), Some(json!(-1e18))]).is_err());
    }

    #[test]
    fn test_invalid_dates() {
        assert!(format_date(&[Some(json!("not a date"))]).is_err());
        assert!(new_date(&[None]).is_err());
    }
}
