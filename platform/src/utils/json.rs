//! JSON encoding helpers for types serde does not render the way API
//! clients expect.
//!
//! Timestamps and UUIDs already serialise as strings through the `chrono`
//! and `uuid` serde support. Decimals and raw bytes need a nudge: use the
//! [`decimal_as_float`] and [`bytes_as_text`] modules with
//! `#[serde(with = "...")]`.

use serde::Serialize;

/// Encode `value` as compact JSON, keeping non-ASCII text as is.
///
/// # Errors
///
/// Returns the serialiser error when `value` cannot be represented in JSON,
/// for example a map with non-string keys.
///
/// # Examples
/// ```
/// use platform_kit::utils::json_serialize;
/// use serde_json::json;
///
/// let encoded = json_serialize(&json!({"city": "Zürich"})).expect("encodes");
/// assert_eq!(encoded, r#"{"city":"Zürich"}"#);
/// ```
pub fn json_serialize<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string(value)
}

/// Serialise a [`rust_decimal::Decimal`] as a JSON number.
pub mod decimal_as_float {
    use rust_decimal::Decimal;
    use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
    use serde::{Deserialize, Deserializer, Serializer, de, ser};

    /// Write the decimal as an `f64`.
    ///
    /// # Errors
    ///
    /// Fails when the decimal has no `f64` representation.
    pub fn serialize<S: Serializer>(value: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        let float = value
            .to_f64()
            .ok_or_else(|| ser::Error::custom(format!("decimal {value} does not fit in f64")))?;
        serializer.serialize_f64(float)
    }

    /// Read a JSON number into a decimal.
    ///
    /// # Errors
    ///
    /// Fails for non-finite numbers or values outside the decimal range.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        let float = f64::deserialize(deserializer)?;
        Decimal::from_f64(float)
            .ok_or_else(|| de::Error::custom(format!("{float} is not a valid decimal")))
    }
}

/// Serialise bytes as UTF-8 text rather than an array of numbers.
pub mod bytes_as_text {
    use serde::{Deserialize, Deserializer, Serializer, ser};

    /// Write the bytes as a string.
    ///
    /// # Errors
    ///
    /// Fails when the bytes are not valid UTF-8.
    pub fn serialize<S: Serializer>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        let text = std::str::from_utf8(value).map_err(ser::Error::custom)?;
        serializer.serialize_str(text)
    }

    /// Read a string back into bytes.
    ///
    /// # Errors
    ///
    /// Fails when the input is not a string.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        String::deserialize(deserializer).map(String::into_bytes)
    }
}
