//! Raw field extraction by dotted path.
//!
//! Lookups never fail: a path that cannot be followed yields
//! [`RawValue::Absent`], which is kept distinct from a key that is present
//! with a JSON `null`.

use crate::domain::model::{EntityKind, RawRecord};
use serde_json::Value;

pub const USER_FIELDS: &[&str] = &[
    "id",
    "username",
    "name",
    "email",
    "phone",
    "website",
    "address.city",
    "address.zipcode",
    "address.geo.lat",
    "address.geo.lng",
    "company.name",
    "company.catchPhrase",
];

pub const POST_FIELDS: &[&str] = &["id", "userId", "title", "body"];

pub fn fields_for(kind: EntityKind) -> &'static [&'static str] {
    match kind {
        EntityKind::User => USER_FIELDS,
        EntityKind::Post => POST_FIELDS,
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawValue<'a> {
    Absent,
    Present(&'a Value),
}

impl<'a> RawValue<'a> {
    pub fn is_absent(&self) -> bool {
        matches!(self, RawValue::Absent)
    }

    /// Present and not JSON `null`.
    pub fn value(&self) -> Option<&'a Value> {
        match self {
            RawValue::Present(Value::Null) | RawValue::Absent => None,
            RawValue::Present(v) => Some(v),
        }
    }
}

/// Follows `path` through nested objects.
///
/// A top-level key spelled exactly like the dotted path takes precedence, so
/// records that were flattened upstream resolve the same way as nested ones.
pub fn lookup_path<'a>(record: &'a RawRecord, path: &str) -> RawValue<'a> {
    if let Some(value) = record.data.get(path) {
        return RawValue::Present(value);
    }

    let mut segments = path.split('.');
    let Some(first) = segments.next() else {
        return RawValue::Absent;
    };
    let Some(mut current) = record.data.get(first) else {
        return RawValue::Absent;
    };

    for segment in segments {
        match current {
            Value::Object(map) => match map.get(segment) {
                Some(next) => current = next,
                None => return RawValue::Absent,
            },
            _ => return RawValue::Absent,
        }
    }

    RawValue::Present(current)
}

/// Raw values for every field an entity kind needs, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMap<'a> {
    entries: Vec<(&'static str, RawValue<'a>)>,
}

impl<'a> FieldMap<'a> {
    pub fn get(&self, path: &str) -> RawValue<'a> {
        self.entries
            .iter()
            .find(|(p, _)| *p == path)
            .map(|(_, v)| *v)
            .unwrap_or(RawValue::Absent)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&'static str, RawValue<'a>)> + '_ {
        self.entries.iter().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

pub fn map_fields(record: &RawRecord, kind: EntityKind) -> FieldMap<'_> {
    let entries = fields_for(kind)
        .iter()
        .map(|path| (*path, lookup_path(record, path)))
        .collect();
    FieldMap { entries }
}
