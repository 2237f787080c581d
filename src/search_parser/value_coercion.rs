//! Converts raw literal text into a [`TypedValue`] of the property's type.

use chrono::{DateTime, Duration, Local, Months, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use nom::{
    character::complete::{char, digit1, satisfy},
    combinator::{all_consuming, opt, recognize},
    multi::many0,
    sequence::{pair, preceded},
    IResult, Parser,
};

use super::errors::SearchParseError;
use crate::entity_catalog::ScalarType;
use crate::search_condition::TypedValue;

pub const DEFAULT_DATE_FORMAT: &str = "%Y-%m-%d";
pub const DEFAULT_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoercionOptions {
    pub date_format: String,
    pub datetime_format: String,
    /// Accept a trailing UTC offset on datetimes and normalise to UTC
    pub timezone_support: bool,
}

impl Default for CoercionOptions {
    fn default() -> Self {
        CoercionOptions {
            date_format: DEFAULT_DATE_FORMAT.to_string(),
            datetime_format: DEFAULT_DATETIME_FORMAT.to_string(),
            timezone_support: false,
        }
    }
}

pub fn coerce(
    raw: &str,
    target: &ScalarType,
    options: &CoercionOptions,
) -> Result<TypedValue, SearchParseError> {
    let fail = || SearchParseError::TypeCoercion {
        value: raw.to_string(),
        target: target.to_string(),
    };

    let value = match target {
        ScalarType::String => TypedValue::String(raw.to_string()),
        ScalarType::Integer => {
            let v: i32 = raw.trim().parse().map_err(|_| fail())?;
            TypedValue::Integer(v as i64)
        }
        ScalarType::Long => TypedValue::Integer(raw.trim().parse().map_err(|_| fail())?),
        ScalarType::Double => TypedValue::Double(raw.trim().parse().map_err(|_| fail())?),
        ScalarType::Boolean => match raw.trim().to_ascii_lowercase().as_str() {
            "true" => TypedValue::Boolean(true),
            "false" => TypedValue::Boolean(false),
            _ => return Err(fail()),
        },
        ScalarType::Date => NaiveDate::parse_from_str(raw, &options.date_format)
            .ok()
            .or_else(|| relative_to_now(raw).map(|dt| dt.date()))
            .map(TypedValue::Date)
            .ok_or_else(fail)?,
        ScalarType::DateTime => parse_datetime(raw, options)
            .or_else(|| relative_to_now(raw))
            .map(TypedValue::DateTime)
            .ok_or_else(fail)?,
        ScalarType::Time => NaiveTime::parse_from_str(raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M"))
            .map(TypedValue::Time)
            .map_err(|_| fail())?,
        ScalarType::Enum { values } => values
            .iter()
            .find(|v| v.as_str() == raw)
            .or_else(|| values.iter().find(|v| v.eq_ignore_ascii_case(raw)))
            .map(|v| TypedValue::Enum(v.clone()))
            .ok_or_else(fail)?,
    };
    Ok(value)
}

fn parse_datetime(raw: &str, options: &CoercionOptions) -> Option<NaiveDateTime> {
    if options.timezone_support {
        let with_offset = format!("{}%:z", options.datetime_format);
        let parsed = DateTime::parse_from_str(raw, &with_offset)
            .or_else(|_| {
                DateTime::parse_from_str(raw, &format!("{}%z", options.datetime_format))
            })
            .or_else(|_| DateTime::parse_from_rfc3339(raw));
        if let Ok(dt) = parsed {
            return Some(dt.with_timezone(&Utc).naive_utc());
        }
    }
    NaiveDateTime::parse_from_str(raw, &options.datetime_format).ok()
}

fn relative_to_now(raw: &str) -> Option<NaiveDateTime> {
    let duration = IsoDuration::parse(raw)?;
    duration.apply(Local::now().naive_local())
}

/// ISO-8601 duration such as `P1Y2M3DT4H5M6.5S` or `-PT1M`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IsoDuration {
    pub negative: bool,
    pub years: u32,
    pub months: u32,
    pub weeks: u32,
    pub days: u32,
    pub hours: u32,
    pub minutes: u32,
    pub seconds: f64,
}

fn number_with_designator(input: &str) -> IResult<&str, (&str, char)> {
    pair(
        recognize(pair(digit1, opt(preceded(char('.'), digit1)))),
        satisfy(|c: char| c.is_ascii_alphabetic() && c != 'T'),
    )
    .parse(input)
}

fn duration_parts(input: &str) -> IResult<&str, (bool, Vec<(&str, char)>, Vec<(&str, char)>)> {
    let (input, sign) = opt(char('-')).parse(input)?;
    let (input, _) = char('P').parse(input)?;
    let (input, date_parts) = many0(number_with_designator).parse(input)?;
    let (input, time_parts) =
        opt(preceded(char('T'), many0(number_with_designator))).parse(input)?;
    Ok((
        input,
        (sign.is_some(), date_parts, time_parts.unwrap_or_default()),
    ))
}

impl IsoDuration {
    pub fn parse(raw: &str) -> Option<IsoDuration> {
        let (_, (negative, date_parts, time_parts)) =
            all_consuming(duration_parts).parse(raw.trim()).ok()?;
        if date_parts.is_empty() && time_parts.is_empty() {
            return None;
        }

        let whole = |n: &str| n.parse::<u32>().ok();

        let mut d = IsoDuration {
            negative,
            ..Default::default()
        };
        for (n, designator) in date_parts {
            match designator {
                'Y' => d.years = whole(n)?,
                'M' => d.months = whole(n)?,
                'W' => d.weeks = whole(n)?,
                'D' => d.days = whole(n)?,
                _ => return None,
            }
        }
        for (n, designator) in time_parts {
            match designator {
                'H' => d.hours = whole(n)?,
                'M' => d.minutes = whole(n)?,
                'S' => d.seconds = n.parse().ok()?,
                _ => return None,
            }
        }
        Some(d)
    }

    /// Shift `base` by this duration; calendar units move by calendar months.
    pub fn apply(&self, base: NaiveDateTime) -> Option<NaiveDateTime> {
        let months = Months::new(self.years.checked_mul(12)?.checked_add(self.months)?);
        let millis = (self.seconds * 1000.0).round();
        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return None;
        }
        let fixed = Duration::try_weeks(self.weeks as i64)?
            .checked_add(&Duration::try_days(self.days as i64)?)?
            .checked_add(&Duration::try_hours(self.hours as i64)?)?
            .checked_add(&Duration::try_minutes(self.minutes as i64)?)?
            .checked_add(&Duration::try_milliseconds(millis as i64)?)?;
        if self.negative {
            base.checked_sub_months(months)?.checked_sub_signed(fixed)
        } else {
            base.checked_add_months(months)?.checked_add_signed(fixed)
        }
    }
}

/// Percent-decode a query value.
pub fn percent_decode(raw: &str) -> Result<String, SearchParseError> {
    if !raw.as_bytes().contains(&b'%') {
        return Ok(raw.to_string());
    }

    fn from_hex(b: u8) -> Option<u8> {
        Some(match b {
            b'0'..=b'9' => b - b'0',
            b'a'..=b'f' => 10 + (b - b'a'),
            b'A'..=b'F' => 10 + (b - b'A'),
            _ => return None,
        })
    }

    let invalid = || SearchParseError::InvalidEncoding {
        value: raw.to_string(),
    };
    let bytes = raw.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'%' => {
                let hi = bytes.get(i + 1).copied().and_then(from_hex).ok_or_else(invalid)?;
                let lo = bytes.get(i + 2).copied().and_then(from_hex).ok_or_else(invalid)?;
                out.push((hi << 4) | lo);
                i += 3;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    String::from_utf8(out).map_err(|_| invalid())
}
