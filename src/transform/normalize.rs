//! Total value normalizers. None of these can fail; malformed input
//! degrades to a default.

use super::field_map::RawValue;
use crate::domain::model::FieldIssue;
use serde_json::Value;
use std::borrow::Cow;

pub const EMAIL_MAX_LEN: usize = 200;
pub const DOMAIN_MAX_LEN: usize = 100;

/// First `max_len` characters of `s`; absent becomes `""`.
pub fn truncate(s: Option<&str>, max_len: usize) -> String {
    match s {
        None => String::new(),
        Some(s) => match s.char_indices().nth(max_len) {
            Some((byte_idx, _)) => s[..byte_idx].to_string(),
            None => s.to_string(),
        },
    }
}

/// Finite number from a JSON number or numeric string; otherwise `None`.
pub fn coerce_float(v: RawValue<'_>) -> Option<f64> {
    let parsed = match v.value()? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                None
            } else {
                s.parse::<f64>().ok()
            }
        }
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

/// Integer identifier. Fractional or out-of-range numbers are not identifiers.
pub fn coerce_id(v: RawValue<'_>) -> Option<i64> {
    match v.value()? {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            let f = n.as_f64()?;
            if f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
                Some(f as i64)
            } else {
                None
            }
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}

/// Text form of a raw scalar. Strings pass through; numbers and booleans
/// use their JSON spelling; anything else is reported as a degradation.
pub fn coerce_text<'a>(v: RawValue<'a>) -> Result<Cow<'a, str>, FieldIssue> {
    match v {
        RawValue::Absent | RawValue::Present(Value::Null) => Err(FieldIssue::Absent),
        RawValue::Present(Value::String(s)) => Ok(Cow::Borrowed(s.as_str())),
        RawValue::Present(Value::Number(n)) => Ok(Cow::Owned(n.to_string())),
        RawValue::Present(Value::Bool(b)) => Ok(Cow::Owned(b.to_string())),
        RawValue::Present(_) => Err(FieldIssue::WrongType),
    }
}

pub fn lowercase_email(s: Option<&str>) -> String {
    match s {
        None => String::new(),
        Some(s) => truncate(Some(s.to_lowercase().as_str()), EMAIL_MAX_LEN),
    }
}

/// Text after the last `@`, lowercased; `""` when there is no `@`.
pub fn extract_domain(email: &str) -> String {
    match email.rsplit_once('@') {
        Some((_, domain)) => truncate(Some(domain.to_lowercase().as_str()), DOMAIN_MAX_LEN),
        None => String::new(),
    }
}

pub fn presence<A, B>(a: &Option<A>, b: &Option<B>) -> bool {
    a.is_some() && b.is_some()
}

pub fn strip_whitespace(s: Option<&str>) -> String {
    s.map(|s| s.trim().to_string()).unwrap_or_default()
}
