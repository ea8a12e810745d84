use time::error::ComponentRange;
use time::OffsetDateTime;

/// Wall-clock instant reported by the server, e.g. a commit timestamp.
///
/// Must be from 0001-01-01T00:00:00Z to 9999-12-31T23:59:59Z inclusive;
/// `nanos` counts forward in time and is always in `0..=999_999_999`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Timestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl Timestamp {
    pub fn to_offset_date_time(&self) -> Result<OffsetDateTime, ComponentRange> {
        OffsetDateTime::from_unix_timestamp_nanos(self.seconds as i128 * 1_000_000_000 + self.nanos as i128)
    }
}

impl From<prost_types::Timestamp> for Timestamp {
    fn from(t: prost_types::Timestamp) -> Self {
        Timestamp {
            seconds: t.seconds,
            nanos: t.nanos,
        }
    }
}

impl From<Timestamp> for prost_types::Timestamp {
    fn from(t: Timestamp) -> Self {
        prost_types::Timestamp {
            seconds: t.seconds,
            nanos: t.nanos,
        }
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(t: OffsetDateTime) -> Self {
        Timestamp {
            seconds: t.unix_timestamp(),
            nanos: t.nanosecond() as i32,
        }
    }
}
