//! Instrument file loading.
//!
//! Accepts either a JSON array of instruments or an object with an
//! `instruments` array. Instruments without an id get a UUID v4 (hex).

use std::path::Path;

use anyhow::{Context, Result};
use harmony_core::models::Instrument;
use serde::Deserialize;

#[derive(Deserialize)]
#[serde(untagged)]
enum InstrumentFile {
    List(Vec<Instrument>),
    Wrapped { instruments: Vec<Instrument> },
}

/// Parse instruments from a JSON string and assign missing ids.
pub fn parse_instruments(json: &str) -> Result<Vec<Instrument>> {
    let file: InstrumentFile = serde_json::from_str(json)
        .with_context(|| "Failed to parse instruments: expected an array or {\"instruments\": [...]}")?;

    let mut instruments = match file {
        InstrumentFile::List(list) => list,
        InstrumentFile::Wrapped { instruments } => instruments,
    };
    assign_ids(&mut instruments);
    Ok(instruments)
}

/// Read and parse an instrument file.
pub fn load_instruments(path: &Path) -> Result<Vec<Instrument>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read instrument file: {}", path.display()))?;
    let instruments = parse_instruments(&content)
        .with_context(|| format!("Invalid instrument file: {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        instruments = instruments.len(),
        "instruments loaded"
    );
    Ok(instruments)
}

/// Give every instrument without an id a fresh UUID v4 in simple hex form.
pub fn assign_ids(instruments: &mut [Instrument]) {
    for instrument in instruments {
        if instrument.instrument_id.as_deref().map_or(true, |id| id.trim().is_empty()) {
            instrument.instrument_id = Some(uuid::Uuid::new_v4().simple().to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_array() {
        let json = r#"[
            {"instrument_id": "gad7", "instrument_name": "GAD-7",
             "items": [{"question_text": "Feeling nervous, anxious or on edge", "question_no": "1"}]},
            {"instrument_name": "PHQ-9", "language": "pt",
             "questions": [{"question_text": "Pouco interesse"}]}
        ]"#;
        let instruments = parse_instruments(json).unwrap();
        assert_eq!(instruments.len(), 2);
        assert_eq!(instruments[0].instrument_id.as_deref(), Some("gad7"));
        assert_eq!(instruments[1].language, "pt");

        let assigned = instruments[1].instrument_id.as_deref().unwrap();
        assert_eq!(assigned.len(), 32);
        assert!(assigned.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_parse_wrapped() {
        let json = r#"{"instruments": [{"instrument_name": "A", "items": [{"question_text": "I feel sad"}]}]}"#;
        assert_eq!(parse_instruments(json).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_instruments(r#"{"foo": 1}"#).is_err());
        assert!(parse_instruments("not json").is_err());
    }

    #[test]
    fn test_load_missing_file() {
        let err = load_instruments(Path::new("/nonexistent/instruments.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to read instrument file"));
    }
}
