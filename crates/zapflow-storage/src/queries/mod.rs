// SPDX-FileCopyrightText: 2026 Zapflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Typed query modules and the column codecs they share.

pub mod instances;
pub mod messages;
pub mod users;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Type;
use uuid::Uuid;

/// Timestamps are stored as fixed-width RFC 3339 text so they sort lexically.
pub(crate) fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub(crate) fn decode_ts(idx: usize, raw: String) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

pub(crate) fn decode_uuid(idx: usize, raw: String) -> rusqlite::Result<Uuid> {
    Uuid::parse_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Decode a text column into a strum-backed enum.
pub(crate) fn decode_enum<T>(idx: usize, raw: String) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(&raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// SQLite `LIMIT` value; 0 means unbounded.
pub(crate) fn sql_limit(limit: u32) -> i64 {
    if limit == 0 { -1 } else { i64::from(limit) }
}

/// Whether the error is a UNIQUE / FOREIGN KEY / CHECK violation.
pub(crate) fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _) if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}


#[cfg(test)]
mod tests {
    use super::*;
    use zapflow_core::InstanceStatus;

    #[test]
    fn timestamps_round_trip_at_millisecond_precision() {
        let ts = DateTime::parse_from_rfc3339("2026-03-01T12:30:45.123Z")
            .unwrap()
            .with_timezone(&Utc);
        let encoded = encode_ts(&ts);
        assert_eq!(encoded, "2026-03-01T12:30:45.123Z");
        assert_eq!(decode_ts(0, encoded).unwrap(), ts);
    }

    #[test]
    fn bad_enum_text_is_a_conversion_error() {
        let err = decode_enum::<InstanceStatus>(3, "sleeping".into()).unwrap_err();
        assert!(matches!(
            err,
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, _)
        ));
    }
}
