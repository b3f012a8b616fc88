//! Shared output vocabulary used across every analyzer's result types.
//!
//! `Metric<T>` replaces the original's exception-driven "maybe this wasn't
//! computable" control flow with a tagged variant (§9 design notes): every
//! metric that can be gated by the Reliability Gate (C1) is one of these,
//! never a bare value with an out-of-band sentinel.

use serde::{Serialize, Serializer};

/// A metric that may be unavailable because its minimum-N requirement
/// (§4.1) was not met, or because the supporting data was absent
/// (e.g. no market-share entry for an entity).
#[derive(Debug, Clone)]
pub enum Metric<T> {
    Available { value: T, interpretation: String },
    Unavailable { reason: String, required_n: Option<usize> },
}

impl<T> Metric<T> {
    pub fn available(value: T, interpretation: impl Into<String>) -> Self {
        Metric::Available {
            value,
            interpretation: interpretation.into(),
        }
    }

    pub fn unavailable(reason: impl Into<String>, required_n: Option<usize>) -> Self {
        Metric::Unavailable {
            reason: reason.into(),
            required_n,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Metric::Available { .. })
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Metric::Available { value, .. } => Some(value),
            Metric::Unavailable { .. } => None,
        }
    }
}

/// Serializes as `{"available": true, "value": ..., "interpretation": ...}`
/// or `{"available": false, "reason": ..., "required_n": ...}`, matching the
/// `available: false` + reason contract in §4.1/§7.
impl<T: Serialize> Serialize for Metric<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        match self {
            Metric::Available { value, interpretation } => {
                let mut s = serializer.serialize_struct("Metric", 3)?;
                s.serialize_field("available", &true)?;
                s.serialize_field("value", value)?;
                s.serialize_field("interpretation", interpretation)?;
                s.end()
            }
            Metric::Unavailable { reason, required_n } => {
                let mut s = serializer.serialize_struct("Metric", 3)?;
                s.serialize_field("available", &false)?;
                s.serialize_field("reason", reason)?;
                s.serialize_field("required_n", required_n)?;
                s.end()
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BiasDirection {
    FavorsUnmasked,
    FavorsMasked,
    Neutral,
}

impl BiasDirection {
    pub fn from_delta(delta: f64) -> Self {
        if delta > 0.0 {
            BiasDirection::FavorsUnmasked
        } else if delta < 0.0 {
            BiasDirection::FavorsMasked
        } else {
            BiasDirection::Neutral
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityLevel {
    High,
    Moderate,
    Low,
}

impl SimilarityLevel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.7 {
            SimilarityLevel::High
        } else if score > 0.4 {
            SimilarityLevel::Moderate
        } else {
            SimilarityLevel::Low
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_serializes_available_branch() {
        let m = Metric::available(1.23, "strong bias");
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["available"], true);
        assert_eq!(json["value"], 1.23);
    }

    #[test]
    fn metric_serializes_unavailable_branch() {
        let m: Metric<f64> = Metric::unavailable("execution_count below minimum", Some(5));
        let json = serde_json::to_value(&m).unwrap();
        assert_eq!(json["available"], false);
        assert_eq!(json["required_n"], 5);
    }
}
