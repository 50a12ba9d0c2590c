//! Typed views of the session JSON files and the stimulus protocol they carry.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chrono::{DateTime, FixedOffset, NaiveDateTime};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::error::{PackagingError, Result};
use crate::types::Subject;

/// A protocol number as written by acquisition software: either a JSON number
/// or a numeric string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Numeric {
    Number(f64),
    Text(String),
}

impl Numeric {
    pub fn value(&self, field: &str) -> Result<f64> {
        match self {
            Numeric::Number(v) => Ok(*v),
            Numeric::Text(s) => s.trim().parse().map_err(|_| {
                PackagingError::InvalidMetadata(format!("{} is not numeric: '{}'", field, s))
            }),
        }
    }
}

/// A protocol field that may be a scalar or a list of values.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany {
    One(Numeric),
    Many(Vec<Numeric>),
}

impl OneOrMany {
    /// All values, a scalar becoming a singleton list
    pub fn values(&self, field: &str) -> Result<Vec<f64>> {
        match self {
            OneOrMany::One(n) => Ok(vec![n.value(field)?]),
            OneOrMany::Many(items) => items.iter().map(|n| n.value(field)).collect(),
        }
    }

    /// The scalar value, or the first element of a list
    pub fn first(&self, field: &str) -> Result<f64> {
        self.values(field)?
            .into_iter()
            .next()
            .ok_or_else(|| PackagingError::InvalidMetadata(format!("{} is an empty list", field)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StimulusParameters {
    pub pulse_frequency: Option<OneOrMany>,
    pub baseline_duration: Option<OneOrMany>,
    pub number_pulse_trains: Option<OneOrMany>,
    pub pulse_train_duration: Option<OneOrMany>,
    pub pulse_train_interval: Option<OneOrMany>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StimulusEpoch {
    #[serde(default)]
    pub stimulus_parameters: Vec<StimulusParameters>,
    pub trials_total: Option<Numeric>,
}

/// Contents of `session.json` needed for packaging; other keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionMetadata {
    pub session_start_time: Option<String>,
    #[serde(default)]
    pub stimulus_epochs: Vec<StimulusEpoch>,
}

impl SessionMetadata {
    /// Parses `session_start_time`
    ///
    /// RFC 3339 timestamps keep their offset. Timestamps without an offset
    /// are taken as UTC.
    pub fn start_time(&self) -> Result<DateTime<FixedOffset>> {
        let raw = self
            .session_start_time
            .as_deref()
            .ok_or_else(|| PackagingError::InvalidMetadata("missing session_start_time".to_string()))?;
        parse_start_time(raw)
    }
}

pub fn parse_start_time(raw: &str) -> Result<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(PackagingError::InvalidMetadata(format!(
        "unrecognized session_start_time '{}'",
        raw
    )))
}

/// Contents of `data_description.json` needed for packaging.
#[derive(Debug, Clone, Deserialize)]
pub struct DataDescription {
    pub name: String,
    pub subject_id: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Species {
    Named { name: String },
    Plain(String),
}

/// Contents of `subject.json` needed for packaging.
#[derive(Debug, Clone, Deserialize)]
pub struct SubjectMetadata {
    pub subject_id: serde_json::Value,
    pub sex: Option<String>,
    pub species: Option<Species>,
    pub date_of_birth: Option<String>,
    pub genotype: Option<String>,
}

impl SubjectMetadata {
    pub fn to_subject(&self) -> Subject {
        Subject {
            subject_id: json_to_text(&self.subject_id),
            sex: self.sex.clone(),
            species: self.species.as_ref().map(|s| match s {
                Species::Named { name } => name.clone(),
                Species::Plain(name) => name.clone(),
            }),
            date_of_birth: self.date_of_birth.clone(),
            genotype: self.genotype.clone(),
        }
    }
}

/// Renders a JSON identifier (string or number) as plain text.
pub fn json_to_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Reads and deserializes a required JSON file
///
/// # Errors
///
/// * `PackagingError::MissingInput` - the file does not exist
/// * `PackagingError::Json` - the file is not valid JSON for `T`
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    if !path.is_file() {
        return Err(PackagingError::MissingInput(format!(
            "{} does not exist",
            path.display()
        )));
    }
    let file = File::open(path)?;
    let value = serde_json::from_reader(BufReader::new(file))?;
    debug!(path = %path.display(), "loaded json");
    Ok(value)
}

/// Pulse-train protocol driving event reconstruction.
///
/// Frequency and duration are lists so that protocols stepping through
/// several values per trial share one code path with fixed protocols
/// (a single value is a singleton list).
#[derive(Debug, Clone, PartialEq)]
pub struct StimulusProtocol {
    /// Seconds before the first onset
    pub baseline_duration: f64,
    /// Hz
    pub pulse_frequencies: Vec<f64>,
    /// Seconds each train lasts
    pub pulse_train_durations: Vec<f64>,
    /// Seconds between a train's offset and the next onset
    pub pulse_train_interval: f64,
    /// Number of trials (or pulse trains)
    pub train_count: f64,
}

impl StimulusProtocol {
    /// Extracts the protocol from the first parameters block of the first
    /// stimulus epoch
    ///
    /// The train count is the epoch's `trials_total` when present, otherwise
    /// the first value of `number_pulse_trains`.
    ///
    /// # Errors
    ///
    /// * `PackagingError::InvalidMetadata` - a block or field is absent, a
    ///   list is empty, or a value is negative or not finite
    pub fn from_session(session: &SessionMetadata) -> Result<Self> {
        let epoch = session
            .stimulus_epochs
            .first()
            .ok_or_else(|| PackagingError::InvalidMetadata("no stimulus_epochs".to_string()))?;
        let params = epoch.stimulus_parameters.first().ok_or_else(|| {
            PackagingError::InvalidMetadata("first stimulus epoch has no stimulus_parameters".to_string())
        })?;

        let train_count = match &epoch.trials_total {
            Some(total) => total.value("trials_total")?,
            None => required(&params.number_pulse_trains, "number_pulse_trains")?.first("number_pulse_trains")?,
        };

        let protocol = StimulusProtocol {
            baseline_duration: required(&params.baseline_duration, "baseline_duration")?
                .first("baseline_duration")?,
            pulse_frequencies: required(&params.pulse_frequency, "pulse_frequency")?
                .values("pulse_frequency")?,
            pulse_train_durations: required(&params.pulse_train_duration, "pulse_train_duration")?
                .values("pulse_train_duration")?,
            pulse_train_interval: required(&params.pulse_train_interval, "pulse_train_interval")?
                .first("pulse_train_interval")?,
            train_count,
        };
        protocol.validate()?;
        Ok(protocol)
    }

    /// Checks every value is usable as a sample-count factor.
    pub fn validate(&self) -> Result<()> {
        if self.pulse_frequencies.is_empty() {
            return Err(PackagingError::InvalidMetadata("pulse_frequency is an empty list".to_string()));
        }
        if self.pulse_train_durations.is_empty() {
            return Err(PackagingError::InvalidMetadata(
                "pulse_train_duration is an empty list".to_string(),
            ));
        }

        let scalars = [
            ("baseline_duration", self.baseline_duration),
            ("pulse_train_interval", self.pulse_train_interval),
            ("train count", self.train_count),
        ];
        let listed = self
            .pulse_frequencies
            .iter()
            .map(|v| ("pulse_frequency", *v))
            .chain(self.pulse_train_durations.iter().map(|v| ("pulse_train_duration", *v)));

        for (field, value) in scalars.into_iter().chain(listed) {
            if !value.is_finite() || value < 0.0 {
                return Err(PackagingError::InvalidMetadata(format!(
                    "{} must be a non-negative number, got {}",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Trains after the first one; a count of one (or less) gives zero.
    pub fn repetitions(&self) -> usize {
        (self.train_count - 1.0).max(0.0) as usize
    }
}

fn required<'a>(field: &'a Option<OneOrMany>, name: &str) -> Result<&'a OneOrMany> {
    field
        .as_ref()
        .ok_or_else(|| PackagingError::InvalidMetadata(format!("missing stimulus parameter {}", name)))
}
