use prost_types::value::Kind;
use prost_types::{ListValue, Value};

use crate::proto::spanner::key_range::{EndKeyType, StartKeyType};
use crate::proto::spanner::KeyRange as WireKeyRange;
use crate::proto::spanner::KeySet as WireKeySet;
use crate::statement::ToKind;

/// A primary key value for a row, possibly composite.
#[derive(Clone)]
pub struct Key {
    pub(crate) values: ListValue,
}

impl Key {
    pub fn new(values: Vec<Kind>) -> Key {
        Key {
            values: ListValue {
                values: values.into_iter().map(|kind| Value { kind: Some(kind) }).collect(),
            },
        }
    }

    pub fn one(value: impl ToKind) -> Key {
        Key::new(vec![value.to_kind()])
    }

    pub fn composite(values: &[&dyn ToKind]) -> Key {
        Key::new(values.iter().map(|v| v.to_kind()).collect())
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
pub enum RangeKind {
    ClosedClosed,
    ClosedOpen,
    OpenClosed,
    OpenOpen,
}

/// A contiguous range of keys, with configurable bound openness.
#[derive(Clone)]
pub struct KeyRange {
    start: Key,
    end: Key,
    kind: RangeKind,
}

impl KeyRange {
    pub fn new(start: Key, end: Key, kind: RangeKind) -> KeyRange {
        KeyRange { start, end, kind }
    }
}

impl From<KeyRange> for WireKeyRange {
    fn from(range: KeyRange) -> Self {
        let (start, end) = match range.kind {
            RangeKind::ClosedClosed => (
                StartKeyType::StartClosed(range.start.values),
                EndKeyType::EndClosed(range.end.values),
            ),
            RangeKind::ClosedOpen => (
                StartKeyType::StartClosed(range.start.values),
                EndKeyType::EndOpen(range.end.values),
            ),
            RangeKind::OpenClosed => (
                StartKeyType::StartOpen(range.start.values),
                EndKeyType::EndClosed(range.end.values),
            ),
            RangeKind::OpenOpen => (
                StartKeyType::StartOpen(range.start.values),
                EndKeyType::EndOpen(range.end.values),
            ),
        };
        WireKeyRange {
            start_key_type: Some(start),
            end_key_type: Some(end),
        }
    }
}

/// The rows to read or delete, as point keys and/or ranges.
#[derive(Clone)]
pub struct KeySet {
    pub(crate) inner: WireKeySet,
}

/// Matches every row of the table.
pub fn all_keys() -> KeySet {
    KeySet {
        inner: WireKeySet {
            keys: vec![],
            ranges: vec![],
            all: true,
        },
    }
}

impl From<Key> for KeySet {
    fn from(key: Key) -> Self {
        KeySet {
            inner: WireKeySet {
                keys: vec![key.values],
                ranges: vec![],
                all: false,
            },
        }
    }
}

impl From<Vec<Key>> for KeySet {
    fn from(keys: Vec<Key>) -> Self {
        KeySet {
            inner: WireKeySet {
                keys: keys.into_iter().map(|key| key.values).collect(),
                ranges: vec![],
                all: false,
            },
        }
    }
}

impl From<KeyRange> for KeySet {
    fn from(range: KeyRange) -> Self {
        KeySet {
            inner: WireKeySet {
                keys: vec![],
                ranges: vec![range.into()],
                all: false,
            },
        }
    }
}
