use serde::{Deserialize, Serialize};

/// A monitored on-screen quantity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Hp,
    Mana,
}

impl Metric {
    pub const ALL: [Metric; 2] = [Metric::Hp, Metric::Mana];

    /// Name used in the region file and in logs
    pub fn label(&self) -> &'static str {
        match self {
            Metric::Hp => "HP",
            Metric::Mana => "Mana",
        }
    }

    /// Case-insensitive lookup of a region file name
    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(label.trim()))
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Consensus result of one extraction call
///
/// `Known` values always satisfy `1 <= value <= max_value` of the metric they
/// were extracted for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ExtractedValue {
    Known(u32),
    #[default]
    Unknown,
}

impl ExtractedValue {
    pub fn known(&self) -> Option<u32> {
        match self {
            ExtractedValue::Known(v) => Some(*v),
            ExtractedValue::Unknown => None,
        }
    }

    pub fn is_known(&self) -> bool {
        matches!(self, ExtractedValue::Known(_))
    }
}

impl From<Option<u32>> for ExtractedValue {
    fn from(value: Option<u32>) -> Self {
        value.map_or(ExtractedValue::Unknown, ExtractedValue::Known)
    }
}

impl std::fmt::Display for ExtractedValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractedValue::Known(v) => write!(f, "{}", v),
            ExtractedValue::Unknown => f.write_str("N/A"),
        }
    }
}

/// One recognizer attempt: which preprocessing/config produced which text
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CandidateReading {
    pub method_id: String,
    pub parsed_value: Option<u32>,
    pub raw_text: String,
}

/// Result of one extraction call with every attempt that led to it
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct Extraction {
    pub value: ExtractedValue,
    pub candidates: Vec<CandidateReading>,
}

/// Severity of a corrective key press
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Critical,
    Moderate,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Action::Critical => f.write_str("CRITICAL"),
            Action::Moderate => f.write_str("MODERATE"),
        }
    }
}

/// Where the last valid reading placed a metric
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum HealthPhase {
    #[default]
    Healthy,
    ModerateNeed,
    CriticalPendingConfirmation,
    CriticalConfirmed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_labels() {
        assert_eq!(Metric::Hp.label(), "HP");
        assert_eq!(Metric::Mana.label(), "Mana");
        assert_eq!(Metric::from_label("hp"), Some(Metric::Hp));
        assert_eq!(Metric::from_label(" MANA "), Some(Metric::Mana));
        assert_eq!(Metric::from_label("stamina"), None);
    }

    #[test]
    fn test_extracted_value_from_option() {
        assert_eq!(ExtractedValue::from(Some(864)), ExtractedValue::Known(864));
        assert_eq!(ExtractedValue::from(None), ExtractedValue::Unknown);
        assert_eq!(ExtractedValue::Known(5).known(), Some(5));
        assert!(!ExtractedValue::Unknown.is_known());
    }

    #[test]
    fn test_extracted_value_display() {
        assert_eq!(ExtractedValue::Known(1067).to_string(), "1067");
        assert_eq!(ExtractedValue::Unknown.to_string(), "N/A");
    }

    #[test]
    fn test_extracted_value_serialization() {
        let json = serde_json::to_string(&ExtractedValue::Known(42)).unwrap();
        assert_eq!(json, r#"{"kind":"known","value":42}"#);

        let unknown: ExtractedValue = serde_json::from_str(r#"{"kind":"unknown"}"#).unwrap();
        assert_eq!(unknown, ExtractedValue::Unknown);
    }

    #[test]
    fn test_phase_default_is_healthy() {
        assert_eq!(HealthPhase::default(), HealthPhase::Healthy);
    }
}
