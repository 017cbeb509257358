//! Value Codec Module
//!
//! Converts [`CacheValue`]s to tagged strings (`tag::payload`) and back.
//!
//! Scalars are stored in their canonical string form; records and all
//! sequences are stored as JSON.

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::cache::value::{CacheValue, TypeTag};
use crate::error::{CacheError, Result};

/// Separator between the type tag and the payload.
pub const TAG_SEPARATOR: &str = "::";

// == Encode ==
/// Encodes a value as `tag::payload`.
///
/// Fails with [`CacheError::NonFiniteNumber`] for NaN or infinite numbers.
pub fn encode(value: &CacheValue) -> Result<String> {
    let payload = match value {
        CacheValue::Text(s) => s.clone(),
        CacheValue::Number(n) => {
            ensure_finite(*n)?;
            n.to_string()
        }
        CacheValue::Boolean(b) => b.to_string(),
        CacheValue::Record(map) => to_json(map)?,
        CacheValue::TextList(items) => to_json(items)?,
        CacheValue::NumberList(items) => {
            items.iter().copied().try_for_each(ensure_finite)?;
            to_json(items)?
        }
        CacheValue::BooleanList(items) => to_json(items)?,
        CacheValue::RecordList(items) => to_json(items)?,
    };

    Ok(format!("{}{TAG_SEPARATOR}{payload}", value.tag()))
}

// == Decode ==
/// Decodes a raw stored string. `None` (key absent) decodes to `None`.
pub fn decode(raw: Option<&str>) -> Result<Option<CacheValue>> {
    raw.map(decode_tagged).transpose()
}

/// Decodes a single `tag::payload` string.
///
/// Splits on the first separator only, so text payloads may contain `::`.
pub fn decode_tagged(raw: &str) -> Result<CacheValue> {
    let (tag, payload) = raw
        .split_once(TAG_SEPARATOR)
        .ok_or_else(|| CacheError::decode("missing type tag separator"))?;

    let tag: TypeTag = tag.parse()?;
    let value = match tag {
        TypeTag::Text => CacheValue::Text(payload.to_string()),
        TypeTag::Number => CacheValue::Number(payload.trim().parse::<f64>().map_err(|e| {
            CacheError::decode(format!("invalid number payload '{payload}': {e}"))
        })?),
        TypeTag::Boolean => CacheValue::Boolean(payload == "true"),
        TypeTag::Record => CacheValue::Record(from_json(tag, payload)?),
        TypeTag::TextList => CacheValue::TextList(from_json(tag, payload)?),
        TypeTag::NumberList => CacheValue::NumberList(from_json(tag, payload)?),
        TypeTag::BooleanList => CacheValue::BooleanList(from_json(tag, payload)?),
        TypeTag::RecordList => CacheValue::RecordList(from_json(tag, payload)?),
    };
    Ok(value)
}

fn ensure_finite(n: f64) -> Result<()> {
    if n.is_finite() {
        Ok(())
    } else {
        Err(CacheError::NonFiniteNumber)
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(|e| CacheError::UnsupportedValue(e.to_string()))
}

fn from_json<T: DeserializeOwned>(tag: TypeTag, payload: &str) -> Result<T> {
    serde_json::from_str(payload)
        .map_err(|e| CacheError::decode(format!("invalid {tag} payload: {e}")))
}
