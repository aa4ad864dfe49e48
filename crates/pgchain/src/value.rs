//! Tagged parameter values.
//!
//! Payloads and filters are built at runtime from arbitrary key sets, so every bound
//! parameter is a [`Value`]. Binding is driven by the type PostgreSQL infers for the
//! placeholder: an integer bound against an `int4` column is encoded as `int4`, a text value
//! bound against a `uuid` column is parsed as a UUID, and so on. A conversion that cannot be
//! performed is reported by the driver as a bind error when the statement runs.

use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::error::Error;
use std::net::IpAddr;
use std::str::FromStr;
use tokio_postgres::types::{IsNull, Kind, ToSql, Type};
use uuid::Uuid;

type BindError = Box<dyn Error + Sync + Send>;

/// A dynamically typed SQL parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    /// SQL NULL
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (bound as int2/int4/int8/numeric/... as the column requires)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// Text value (also parsed for uuid, temporal, numeric, integer, inet and interval columns)
    Text(String),
    /// JSON document
    Json(serde_json::Value),
    /// UUID value
    Uuid(Uuid),
    /// Timestamp with time zone
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(val: $t) -> Self {
                    Value::Int(i64::from(val))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(val: bool) -> Self {
        Value::Bool(val)
    }
}

impl From<f32> for Value {
    fn from(val: f32) -> Self {
        Value::Float(f64::from(val))
    }
}

impl From<f64> for Value {
    fn from(val: f64) -> Self {
        Value::Float(val)
    }
}

impl From<&str> for Value {
    fn from(val: &str) -> Self {
        Value::Text(val.to_string())
    }
}

impl From<String> for Value {
    fn from(val: String) -> Self {
        Value::Text(val)
    }
}

impl From<&String> for Value {
    fn from(val: &String) -> Self {
        Value::Text(val.clone())
    }
}

impl From<serde_json::Value> for Value {
    fn from(val: serde_json::Value) -> Self {
        Value::Json(val)
    }
}

impl From<Uuid> for Value {
    fn from(val: Uuid) -> Self {
        Value::Uuid(val)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(val: DateTime<Utc>) -> Self {
        Value::Timestamp(val)
    }
}

impl<T> From<Option<T>> for Value
where
    T: Into<Value>,
{
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

impl ToSql for Value {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
        match self {
            Value::Null => Ok(IsNull::Yes),
            Value::Bool(b) => bind_bool(*b, ty, out),
            Value::Int(i) => bind_int(*i, ty, out),
            Value::Float(f) => bind_float(*f, ty, out),
            Value::Text(s) => bind_text(s, ty, out),
            Value::Json(v) => bind_json(v, ty, out),
            Value::Uuid(u) => match *ty {
                Type::UUID => u.to_sql(ty, out),
                _ if is_textual(ty) => write_text(&u.to_string(), out),
                _ => Err(mismatch("uuid", ty)),
            },
            Value::Timestamp(ts) => bind_timestamp(ts, ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    tokio_postgres::types::to_sql_checked!();
}

fn mismatch(kind: &str, ty: &Type) -> BindError {
    format!("cannot bind {kind} value to parameter of type {ty}").into()
}

/// Types that take the plain text wire format.
pub(crate) fn is_textual(ty: &Type) -> bool {
    matches!(
        *ty,
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME | Type::UNKNOWN
    ) || ty.name() == "citext"
        || matches!(ty.kind(), Kind::Enum(_))
}

fn write_text(s: &str, out: &mut BytesMut) -> Result<IsNull, BindError> {
    out.extend_from_slice(s.as_bytes());
    Ok(IsNull::No)
}

fn bind_bool(b: bool, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    match *ty {
        Type::BOOL => b.to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::Bool(b).to_sql(ty, out),
        _ if is_textual(ty) => write_text(if b { "true" } else { "false" }, out),
        _ => Err(mismatch("boolean", ty)),
    }
}

fn bind_int(i: i64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    match *ty {
        Type::INT2 => i16::try_from(i)?.to_sql(ty, out),
        Type::INT4 => i32::try_from(i)?.to_sql(ty, out),
        Type::INT8 => i.to_sql(ty, out),
        Type::OID => u32::try_from(i)?.to_sql(ty, out),
        Type::FLOAT4 => (i as f32).to_sql(ty, out),
        Type::FLOAT8 => (i as f64).to_sql(ty, out),
        Type::NUMERIC => Decimal::from(i).to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::from(i).to_sql(ty, out),
        _ if is_textual(ty) => write_text(&i.to_string(), out),
        _ => Err(mismatch("integer", ty)),
    }
}

fn bind_float(f: f64, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    match *ty {
        Type::FLOAT4 => (f as f32).to_sql(ty, out),
        Type::FLOAT8 => f.to_sql(ty, out),
        Type::NUMERIC => Decimal::try_from(f)?.to_sql(ty, out),
        Type::INT2 | Type::INT4 | Type::INT8 if f.fract() == 0.0 => bind_int(f as i64, ty, out),
        Type::JSON | Type::JSONB => match serde_json::Number::from_f64(f) {
            Some(n) => serde_json::Value::Number(n).to_sql(ty, out),
            None => Err(format!("cannot encode non-finite float {f} as JSON").into()),
        },
        _ if is_textual(ty) => write_text(&f.to_string(), out),
        _ => Err(mismatch("float", ty)),
    }
}

fn bind_text(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    match *ty {
        Type::UUID => Uuid::parse_str(s.trim())?.to_sql(ty, out),
        Type::TIMESTAMPTZ => parse_timestamptz(s)?.to_sql(ty, out),
        Type::TIMESTAMP => parse_timestamp(s)?.to_sql(ty, out),
        Type::DATE => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")?.to_sql(ty, out),
        Type::TIME => parse_time(s)?.to_sql(ty, out),
        Type::INET | Type::CIDR => bind_inet(s, ty, out),
        Type::INTERVAL => bind_interval(s, out),
        Type::INT2 | Type::INT4 | Type::INT8 | Type::OID => {
            bind_int(s.trim().parse::<i64>()?, ty, out)
        }
        Type::FLOAT4 | Type::FLOAT8 => bind_float(s.trim().parse::<f64>()?, ty, out),
        Type::NUMERIC => Decimal::from_str(s.trim())?.to_sql(ty, out),
        Type::BOOL => bind_bool(parse_bool(s)?, ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::String(s.to_string()).to_sql(ty, out),
        _ if is_textual(ty) => write_text(s, out),
        _ => Err(mismatch("text", ty)),
    }
}

fn bind_json(v: &serde_json::Value, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    use serde_json::Value as Json;

    match *ty {
        Type::JSON | Type::JSONB => return v.to_sql(ty, out),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => {
            let items = v.as_array().ok_or_else(|| mismatch("json", ty))?;
            let strings = items
                .iter()
                .map(|item| match item {
                    Json::Null => Ok(None),
                    Json::String(s) => Ok(Some(s.clone())),
                    Json::Number(n) => Ok(Some(n.to_string())),
                    Json::Bool(b) => Ok(Some(b.to_string())),
                    _ => Err(mismatch("nested json", ty)),
                })
                .collect::<Result<Vec<Option<String>>, BindError>>()?;
            return strings.to_sql(ty, out);
        }
        _ => {}
    }

    match v {
        Json::Null => Ok(IsNull::Yes),
        Json::Bool(b) => bind_bool(*b, ty, out),
        Json::Number(n) => match n.as_i64() {
            Some(i) => bind_int(i, ty, out),
            None => bind_float(n.as_f64().unwrap_or(f64::NAN), ty, out),
        },
        Json::String(s) => bind_text(s, ty, out),
        Json::Array(_) | Json::Object(_) if is_textual(ty) => write_text(&v.to_string(), out),
        Json::Array(_) | Json::Object(_) => Err(mismatch("json", ty)),
    }
}

fn bind_timestamp(ts: &DateTime<Utc>, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    match *ty {
        Type::TIMESTAMPTZ => ts.to_sql(ty, out),
        Type::TIMESTAMP => ts.naive_utc().to_sql(ty, out),
        Type::DATE => ts.date_naive().to_sql(ty, out),
        Type::JSON | Type::JSONB => serde_json::Value::String(ts.to_rfc3339()).to_sql(ty, out),
        _ if is_textual(ty) => write_text(&ts.to_rfc3339(), out),
        _ => Err(mismatch("timestamp", ty)),
    }
}

/// inet/cidr wire format: family, mask bits, cidr flag, address length, address bytes.
fn bind_inet(s: &str, ty: &Type, out: &mut BytesMut) -> Result<IsNull, BindError> {
    let s = s.trim();
    let (addr, bits) = match s.split_once('/') {
        Some((addr, bits)) => (addr.parse::<IpAddr>()?, Some(bits.parse::<u8>()?)),
        None => (s.parse::<IpAddr>()?, None),
    };
    let (family, full, octets) = match addr {
        IpAddr::V4(a) => (2u8, 32u8, a.octets().to_vec()),
        IpAddr::V6(a) => (3u8, 128u8, a.octets().to_vec()),
    };
    let bits = bits.unwrap_or(full);
    if bits > full {
        return Err(format!("invalid netmask /{bits} for {addr}").into());
    }
    let is_cidr = u8::from(*ty == Type::CIDR);
    out.extend_from_slice(&[family, bits, is_cidr, octets.len() as u8]);
    out.extend_from_slice(&octets);
    Ok(IsNull::No)
}

/// interval wire format: microseconds, days, months.
fn bind_interval(s: &str, out: &mut BytesMut) -> Result<IsNull, BindError> {
    let (micros, days, months) = parse_interval(s)?;
    out.extend_from_slice(&micros.to_be_bytes());
    out.extend_from_slice(&days.to_be_bytes());
    out.extend_from_slice(&months.to_be_bytes());
    Ok(IsNull::No)
}

fn parse_time(s: &str) -> Result<NaiveTime, BindError> {
    let s = s.trim();
    match NaiveTime::parse_from_str(s, "%H:%M:%S%.f") {
        Ok(t) => Ok(t),
        Err(_) => Ok(NaiveTime::parse_from_str(s, "%H:%M")?),
    }
}

/// Parse `N unit` terms and an optional `[-]HH:MM[:SS[.f]]` clock into
/// `(microseconds, days, months)`.
fn parse_interval(s: &str) -> Result<(i64, i32, i32), BindError> {
    let mut micros: i64 = 0;
    let mut days: i64 = 0;
    let mut months: i64 = 0;
    let mut tokens = s.split_whitespace();
    let mut seen = false;

    while let Some(token) = tokens.next() {
        seen = true;
        if token.contains(':') {
            micros += parse_clock(token)?;
            continue;
        }
        let n: i64 = token.parse()?;
        let unit = tokens
            .next()
            .ok_or_else(|| format!("interval quantity {n} has no unit"))?
            .to_ascii_lowercase();
        match unit.trim_end_matches('s') {
            "year" => months += n * 12,
            "month" | "mon" => months += n,
            "week" => days += n * 7,
            "day" => days += n,
            "hour" => micros += n * 3_600_000_000,
            "minute" | "min" => micros += n * 60_000_000,
            "second" | "sec" => micros += n * 1_000_000,
            _ => return Err(format!("unknown interval unit '{unit}'").into()),
        }
    }
    if !seen {
        return Err("empty interval".into());
    }
    Ok((micros, i32::try_from(days)?, i32::try_from(months)?))
}

fn parse_clock(token: &str) -> Result<i64, BindError> {
    let (negative, clock) = match token.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, token),
    };
    let mut parts = clock.split(':');
    let hours: i64 = parts.next().unwrap_or_default().parse()?;
    let minutes: i64 = parts.next().unwrap_or_default().parse()?;
    let seconds: f64 = match parts.next() {
        Some(secs) => secs.parse()?,
        None => 0.0,
    };
    if parts.next().is_some() {
        return Err(format!("invalid interval clock '{token}'").into());
    }
    let micros = hours * 3_600_000_000 + minutes * 60_000_000 + (seconds * 1e6).round() as i64;
    Ok(if negative { -micros } else { micros })
}

fn parse_bool(s: &str) -> Result<bool, BindError> {
    match s.trim().to_ascii_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "on" | "1" => Ok(true),
        "false" | "f" | "no" | "n" | "off" | "0" => Ok(false),
        other => Err(format!("invalid boolean literal '{other}'").into()),
    }
}

fn parse_timestamp(s: &str) -> Result<NaiveDateTime, BindError> {
    let s = s.trim();
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(ts) = NaiveDateTime::parse_from_str(s, fmt) {
            return Ok(ts);
        }
    }
    Ok(DateTime::parse_from_rfc3339(s)?.naive_utc())
}

fn parse_timestamptz(s: &str) -> Result<DateTime<Utc>, BindError> {
    match DateTime::parse_from_rfc3339(s.trim()) {
        Ok(ts) => Ok(ts.with_timezone(&Utc)),
        // Offset-less input is taken as UTC.
        Err(_) => Ok(parse_timestamp(s)?.and_utc()),
    }
}
