//! Row decoding into JSON records.

use std::error::Error;
use std::net::IpAddr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value as Json};
use tokio_postgres::Row;
use tokio_postgres::types::{FromSql, Type};
use uuid::Uuid;

use crate::error::{ChainError, ChainResult, error_chain};
use crate::value::is_textual;

/// One decoded row: column name → JSON value, in result-column order.
///
/// Key order relies on `serde_json`'s `preserve_order` feature.
pub type Record = Map<String, Json>;

/// A single column value decoded by its server type.
///
/// Accepts every type; unsupported ones fail in `from_sql` so the error can name the type.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonCell(pub Json);

type DecodeError = Box<dyn Error + Sync + Send>;

impl<'a> FromSql<'a> for JsonCell {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let json = match *ty {
            Type::BOOL => Json::Bool(bool::from_sql(ty, raw)?),
            Type::INT2 => Json::from(i16::from_sql(ty, raw)?),
            Type::INT4 => Json::from(i32::from_sql(ty, raw)?),
            Type::INT8 => Json::from(i64::from_sql(ty, raw)?),
            Type::OID => Json::from(u32::from_sql(ty, raw)?),
            Type::FLOAT4 => float(f32::from_sql(ty, raw)? as f64),
            Type::FLOAT8 => float(f64::from_sql(ty, raw)?),
            Type::NUMERIC => decimal(Decimal::from_sql(ty, raw)?),
            Type::JSON | Type::JSONB => Json::from_sql(ty, raw)?,
            Type::UUID => uuid_text(Uuid::from_sql(ty, raw)?),
            Type::TIMESTAMPTZ => timestamptz(DateTime::<Utc>::from_sql(ty, raw)?),
            Type::TIMESTAMP => Json::String(
                NaiveDateTime::from_sql(ty, raw)?
                    .format("%Y-%m-%dT%H:%M:%S%.f")
                    .to_string(),
            ),
            Type::DATE => date(NaiveDate::from_sql(ty, raw)?),
            Type::TIME => Json::String(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::INTERVAL => Json::String(interval_text(raw)?),
            Type::INET | Type::CIDR => Json::String(inet_text(ty, raw)?),
            Type::BYTEA => Json::String(hex_bytes(<&[u8]>::from_sql(ty, raw)?)),
            Type::TEXT_ARRAY | Type::VARCHAR_ARRAY | Type::BPCHAR_ARRAY => {
                array(ty, raw, Json::String)?
            }
            Type::INT2_ARRAY => array(ty, raw, |v: i16| Json::from(v))?,
            Type::INT4_ARRAY => array(ty, raw, |v: i32| Json::from(v))?,
            Type::INT8_ARRAY => array(ty, raw, |v: i64| Json::from(v))?,
            Type::FLOAT4_ARRAY => array(ty, raw, |v: f32| float(v as f64))?,
            Type::FLOAT8_ARRAY => array(ty, raw, float)?,
            Type::NUMERIC_ARRAY => array(ty, raw, decimal)?,
            Type::BOOL_ARRAY => array(ty, raw, Json::Bool)?,
            Type::UUID_ARRAY => array(ty, raw, uuid_text)?,
            Type::JSON_ARRAY | Type::JSONB_ARRAY => array(ty, raw, |v: Json| v)?,
            Type::DATE_ARRAY => array(ty, raw, date)?,
            Type::TIMESTAMPTZ_ARRAY => array(ty, raw, timestamptz)?,
            _ if is_textual(ty) => Json::String(<&str>::from_sql(ty, raw)?.to_string()),
            _ => return Err(format!("unsupported column type {}", ty.name()).into()),
        };
        Ok(JsonCell(json))
    }

    fn from_sql_null(_: &Type) -> Result<Self, DecodeError> {
        Ok(JsonCell(Json::Null))
    }

    fn accepts(_: &Type) -> bool {
        true
    }
}

fn float(f: f64) -> Json {
    Number::from_f64(f).map_or(Json::Null, Json::Number)
}

fn decimal(d: Decimal) -> Json {
    Json::String(d.to_string())
}

fn uuid_text(id: Uuid) -> Json {
    Json::String(id.to_string())
}

fn date(d: NaiveDate) -> Json {
    Json::String(d.to_string())
}

fn timestamptz(ts: DateTime<Utc>) -> Json {
    Json::String(ts.to_rfc3339())
}

/// One-dimensional array; NULL elements become JSON null.
fn array<'a, T: FromSql<'a>>(
    ty: &Type,
    raw: &'a [u8],
    element: impl Fn(T) -> Json,
) -> Result<Json, DecodeError> {
    let items = Vec::<Option<T>>::from_sql(ty, raw)?;
    Ok(Json::Array(
        items
            .into_iter()
            .map(|item| item.map_or(Json::Null, &element))
            .collect(),
    ))
}

/// Address text as PostgreSQL prints it: `/bits` only when the mask is not a single host,
/// always for cidr.
fn inet_text(ty: &Type, raw: &[u8]) -> Result<String, DecodeError> {
    let addr = IpAddr::from_sql(ty, raw)?;
    let bits = *raw.get(1).ok_or("truncated inet value")?;
    let host = if addr.is_ipv4() { 32 } else { 128 };
    if *ty == Type::CIDR || bits != host {
        Ok(format!("{addr}/{bits}"))
    } else {
        Ok(addr.to_string())
    }
}

fn interval_text(raw: &[u8]) -> Result<String, DecodeError> {
    if raw.len() != 16 {
        return Err(format!("invalid interval length {}", raw.len()).into());
    }
    let micros = i64::from_be_bytes(raw[..8].try_into()?);
    let days = i32::from_be_bytes(raw[8..12].try_into()?);
    let months = i32::from_be_bytes(raw[12..].try_into()?);
    Ok(format_interval(micros, days, months))
}

/// PostgreSQL's default `postgres` interval style, e.g. `1 year 2 mons 3 days 04:05:06`.
fn format_interval(micros: i64, days: i32, months: i32) -> String {
    let mut parts = Vec::new();
    for (n, unit) in [(months / 12, "year"), (months % 12, "mon"), (days, "day")] {
        if n != 0 {
            let plural = if n == 1 { "" } else { "s" };
            parts.push(format!("{n} {unit}{plural}"));
        }
    }
    if micros != 0 || parts.is_empty() {
        let sign = if micros < 0 { "-" } else { "" };
        let total = micros.unsigned_abs();
        let (secs, frac) = (total / 1_000_000, total % 1_000_000);
        let mut clock = format!(
            "{sign}{:02}:{:02}:{:02}",
            secs / 3600,
            secs / 60 % 60,
            secs % 60
        );
        if frac != 0 {
            clock.push_str(format!(".{frac:06}").trim_end_matches('0'));
        }
        parts.push(clock);
    }
    parts.join(" ")
}

/// PostgreSQL hex output format for bytea.
fn hex_bytes(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push_str(&format!("{:02x}", b));
    }
    out
}

/// Extension trait for decoding a [`Row`] into a [`Record`].
pub trait RowExt {
    /// Decode every column, failing with [`ChainError::Decode`] on an unsupported type.
    fn to_record(&self) -> ChainResult<Record>;
}

impl RowExt for Row {
    fn to_record(&self) -> ChainResult<Record> {
        let mut record = Map::with_capacity(self.len());
        for (idx, column) in self.columns().iter().enumerate() {
            let cell: JsonCell = self
                .try_get(idx)
                .map_err(|e| ChainError::decode(column.name(), error_chain(&e)))?;
            record.insert(column.name().to_string(), cell.0);
        }
        Ok(record)
    }
}

/// Decode a list of rows.
pub fn decode_rows(rows: &[Row]) -> ChainResult<Vec<Record>> {
    rows.iter().map(RowExt::to_record).collect()
}
