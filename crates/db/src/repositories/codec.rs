use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite};

use super::RepositoryError;

/// Fixed-width UTC so that stored timestamps compare correctly as text.
pub(crate) fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn column<'r, T>(row: &'r SqliteRow, name: &str) -> Result<T, RepositoryError>
where
    T: sqlx::Decode<'r, Sqlite> + sqlx::Type<Sqlite>,
{
    row.try_get(name).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn parse_timestamp(name: &str, raw: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Decode(format!("{name}: `{raw}` is not rfc3339: {e}")))
}

pub(crate) fn parse_optional_timestamp(
    name: &str,
    raw: Option<String>,
) -> Result<Option<DateTime<Utc>>, RepositoryError> {
    raw.map(|value| parse_timestamp(name, &value)).transpose()
}

pub(crate) fn parse_date(name: &str, raw: &str) -> Result<NaiveDate, RepositoryError> {
    NaiveDate::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("{name}: `{raw}` is not a date: {e}")))
}

pub(crate) fn parse_decimal(name: &str, raw: &str) -> Result<Decimal, RepositoryError> {
    Decimal::from_str(raw)
        .map_err(|e| RepositoryError::Decode(format!("{name}: `{raw}` is not a decimal: {e}")))
}

pub(crate) fn to_json<T: Serialize>(name: &str, value: &T) -> Result<String, RepositoryError> {
    serde_json::to_string(value).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn from_json<T: DeserializeOwned>(name: &str, raw: &str) -> Result<T, RepositoryError> {
    serde_json::from_str(raw).map_err(|e| RepositoryError::Decode(format!("{name}: {e}")))
}

pub(crate) fn version_from_db(raw: i64) -> Result<u32, RepositoryError> {
    u32::try_from(raw).map_err(|_| RepositoryError::Decode(format!("version: {raw} out of range")))
}

/// Maps UNIQUE constraint failures to `Duplicate`; everything else stays a database error.
pub(crate) fn insert_error(entity: &'static str, error: sqlx::Error) -> RepositoryError {
    match &error {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            RepositoryError::Duplicate { entity, detail: db.message().to_owned() }
        }
        _ => RepositoryError::Database(error),
    }
}
