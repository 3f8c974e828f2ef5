//! Lenient numeric deserializers.
//!
//! Postgres `numeric` columns come back either as JSON numbers or as
//! strings depending on precision, so score and amount columns accept both.

use serde::de;

struct NumberVisitor;

impl<'de> de::Visitor<'de> for NumberVisitor {
    type Value = Option<f64>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a number or numeric string")
    }

    fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E> {
        Ok(Some(v))
    }

    fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E> {
        Ok(Some(v as f64))
    }

    fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
    where
        E: de::Error,
    {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        trimmed
            .parse::<f64>()
            .map(Some)
            .map_err(|_| E::invalid_value(de::Unexpected::Str(v), &self))
    }

    fn visit_none<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }

    fn visit_unit<E>(self) -> Result<Self::Value, E> {
        Ok(None)
    }
}

/// Number, numeric string, or null.
pub(crate) fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: de::Deserializer<'de>,
{
    deserializer.deserialize_any(NumberVisitor)
}

/// Number or numeric string; null reads as zero.
pub(crate) fn number_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: de::Deserializer<'de>,
{
    Ok(optional_number(deserializer)?.unwrap_or(0.0))
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    #[derive(Deserialize)]
    struct Probe {
        #[serde(default, deserialize_with = "super::optional_number")]
        value: Option<f64>,
    }

    fn probe(json: &str) -> Option<f64> {
        serde_json::from_str::<Probe>(json).unwrap().value
    }

    #[test]
    fn test_accepts_numbers_and_strings() {
        assert_eq!(probe(r#"{"value": 42}"#), Some(42.0));
        assert_eq!(probe(r#"{"value": 87.5}"#), Some(87.5));
        assert_eq!(probe(r#"{"value": "150.25"}"#), Some(150.25));
        assert_eq!(probe(r#"{"value": null}"#), None);
        assert_eq!(probe(r#"{}"#), None);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(serde_json::from_str::<Probe>(r#"{"value": "abc"}"#).is_err());
    }
}
