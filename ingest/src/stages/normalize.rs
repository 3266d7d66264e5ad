//! Field normalizers usable both as stages and as record processors.

use config::shared::BuiltinStage;
use serde_json::Value;

use crate::bail;
use crate::error::{ErrorKind, IngestResult};
use crate::stages::FnTransform;
use crate::types::Record;

const TITLE_KEY: &str = "title";
const AUTHOR_KEY: &str = "author";
const VIEW_COUNT_KEY: &str = "viewCount";
const INFO_DATE_KEY: &str = "info_date";

/// Length of a `YYYY-MM` prefix.
const YEAR_MONTH_LEN: usize = 7;

/// Returns the function implementing `stage`.
pub fn builtin_function(stage: BuiltinStage) -> fn(&mut Record) -> IngestResult<()> {
    match stage {
        BuiltinStage::StripTitle => strip_title,
        BuiltinStage::NormalizeAuthor => normalize_author,
        BuiltinStage::ClampViewCount => clamp_view_count,
        BuiltinStage::NormalizeDate => normalize_date,
    }
}

pub fn builtin_transform(stage: BuiltinStage) -> FnTransform {
    FnTransform(builtin_function(stage))
}

/// Trims surrounding whitespace from `data.title`.
pub fn strip_title(record: &mut Record) -> IngestResult<()> {
    if let Some(title) = string_field(record, TITLE_KEY)? {
        let trimmed = title.trim().to_string();
        record.data.insert(TITLE_KEY.to_string(), Value::String(trimmed));
    }

    Ok(())
}

/// Title-cases `data.author`: the first letter of every word is uppercased, the rest lowercased.
pub fn normalize_author(record: &mut Record) -> IngestResult<()> {
    if let Some(author) = string_field(record, AUTHOR_KEY)? {
        let normalized = title_case(author);
        record.data.insert(AUTHOR_KEY.to_string(), Value::String(normalized));
    }

    Ok(())
}

/// Replaces a negative `data.viewCount` with zero. Numeric strings are accepted.
pub fn clamp_view_count(record: &mut Record) -> IngestResult<()> {
    let count = match record.data.get(VIEW_COUNT_KEY) {
        None | Some(Value::Null) => return Ok(()),
        Some(Value::Number(number)) => match number.as_i64() {
            Some(count) => count,
            None => match number.as_f64().and_then(whole_count) {
                Some(count) => count,
                None => bail!(
                    ErrorKind::ConversionError,
                    "View count is out of range",
                    number
                ),
            },
        },
        Some(Value::String(text)) => match text.trim().parse::<i64>() {
            Ok(count) => count,
            Err(err) => bail!(
                ErrorKind::ConversionError,
                "View count is not an integer",
                format!("{text}: {err}")
            ),
        },
        Some(other) => bail!(
            ErrorKind::InvalidData,
            "View count has an unsupported type",
            other
        ),
    };

    record
        .data
        .insert(VIEW_COUNT_KEY.to_string(), Value::from(count.max(0)));

    Ok(())
}

/// Truncates `data.info_date` to its first seven characters (`YYYY-MM`).
///
/// Missing and shorter values are left as they are.
pub fn normalize_date(record: &mut Record) -> IngestResult<()> {
    if let Some(date) = string_field(record, INFO_DATE_KEY)? {
        if date.chars().count() > YEAR_MONTH_LEN {
            let truncated: String = date.chars().take(YEAR_MONTH_LEN).collect();
            record.data.insert(INFO_DATE_KEY.to_string(), Value::String(truncated));
        }
    }

    Ok(())
}

/// Returns `data[key]` as a string. Missing and `null` values yield `None`, any other non-string
/// value is an error.
fn string_field<'a>(record: &'a Record, key: &str) -> IngestResult<Option<&'a str>> {
    match record.data.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(other) => bail!(
            ErrorKind::InvalidData,
            "Field is not a string",
            format!("data.{key} = {other}")
        ),
    }
}

fn title_case(value: &str) -> String {
    let mut result = String::with_capacity(value.len());
    let mut previous_is_letter = false;

    for c in value.chars() {
        if c.is_alphabetic() {
            if previous_is_letter {
                result.extend(c.to_lowercase());
            } else {
                result.extend(c.to_uppercase());
            }
            previous_is_letter = true;
        } else {
            result.push(c);
            previous_is_letter = false;
        }
    }

    result
}

/// Truncates a float count, or returns `None` when it does not fit in an `i64`.
fn whole_count(count: f64) -> Option<i64> {
    let count = count.trunc();
    // `i64::MAX as f64` rounds up to 2^63, which is already out of range.
    (count.is_finite() && count >= i64::MIN as f64 && count < i64::MAX as f64)
        .then_some(count as i64)
}
