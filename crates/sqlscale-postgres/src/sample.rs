//! Numeric sample decoding.
//!
//! A scaler query may return any numeric column (`count(*)` is INT8,
//! `avg(...)` is NUMERIC, a literal `5` is INT4). `Sample` accepts all of
//! them, plus text that parses as a number, and widens to `f64`.

use sqlx::error::BoxDynError;
use sqlx::postgres::{PgTypeInfo, PgValueFormat, PgValueRef};
use sqlx::{Decode, Postgres, Type, TypeInfo, ValueRef};

/// A single numeric reading from the data source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample(pub f64);

const NUMERIC_POS: u16 = 0x0000;
const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Base of a NUMERIC digit on the wire.
const NBASE: f64 = 10_000.0;

impl Type<Postgres> for Sample {
    fn type_info() -> PgTypeInfo {
        <f64 as Type<Postgres>>::type_info()
    }

    fn compatible(ty: &PgTypeInfo) -> bool {
        matches!(
            ty.name(),
            "INT2" | "INT4" | "INT8" | "FLOAT4" | "FLOAT8" | "NUMERIC" | "TEXT" | "VARCHAR"
                | "BPCHAR" | "NAME" | "UNKNOWN"
        )
    }
}

impl<'r> Decode<'r, Postgres> for Sample {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let type_name = value.type_info().name().to_string();
        let sample = match type_name.as_str() {
            "INT2" => f64::from(<i16 as Decode<Postgres>>::decode(value)?),
            "INT4" => f64::from(<i32 as Decode<Postgres>>::decode(value)?),
            "INT8" => <i64 as Decode<Postgres>>::decode(value)? as f64,
            "FLOAT4" => f64::from(<f32 as Decode<Postgres>>::decode(value)?),
            "FLOAT8" => <f64 as Decode<Postgres>>::decode(value)?,
            "NUMERIC" => match value.format() {
                PgValueFormat::Binary => numeric_from_binary(value.as_bytes()?)?,
                PgValueFormat::Text => value.as_str()?.trim().parse::<f64>()?,
            },
            _ => value.as_str()?.trim().parse::<f64>()?,
        };
        Ok(Sample(sample))
    }
}

/// Decode the binary NUMERIC representation:
/// `ndigits:i16 weight:i16 sign:u16 dscale:u16` then `ndigits` base-10000
/// digits, most significant first, the first one scaled by `NBASE^weight`.
fn numeric_from_binary(buf: &[u8]) -> Result<f64, BoxDynError> {
    if buf.len() < 8 {
        return Err("numeric value shorter than its header".into());
    }
    let ndigits = i16::from_be_bytes([buf[0], buf[1]]);
    let weight = i16::from_be_bytes([buf[2], buf[3]]);
    let sign = u16::from_be_bytes([buf[4], buf[5]]);

    match sign {
        NUMERIC_POS | NUMERIC_NEG => {}
        NUMERIC_NAN => return Err("NaN cannot be used as a sample".into()),
        NUMERIC_PINF => return Ok(f64::INFINITY),
        NUMERIC_NINF => return Ok(f64::NEG_INFINITY),
        other => return Err(format!("unknown numeric sign {other:#06x}").into()),
    }

    let ndigits = usize::try_from(ndigits).map_err(|_| "negative numeric digit count")?;
    let digits = &buf[8..];
    if digits.len() < ndigits * 2 {
        return Err("numeric value shorter than its digit count".into());
    }

    let mut value = 0.0;
    for (i, chunk) in digits.chunks_exact(2).take(ndigits).enumerate() {
        let digit = f64::from(u16::from_be_bytes([chunk[0], chunk[1]]));
        value += digit * NBASE.powi(i32::from(weight) - i as i32);
    }

    if sign == NUMERIC_NEG {
        value = -value;
    }
    Ok(value)
}
