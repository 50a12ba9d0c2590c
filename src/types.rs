use std::collections::HashSet;

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

use crate::error::{PackagingError, Result};

/// Unit recorded for every acquired channel.
pub const CHANNEL_UNIT: &str = "s";

/// One acquired channel: timestamps and values of equal length.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeries {
    pub name: String,
    pub description: String,
    pub unit: String,
    pub timestamps: Vec<f64>,
    pub data: Vec<f64>,
}

impl TimeSeries {
    /// Builds a channel series; description and unit follow the fixed convention
    pub fn new(name: impl Into<String>, timestamps: Vec<f64>, data: Vec<f64>) -> Self {
        let name = name.into();
        TimeSeries {
            description: format!("{} timeseries data", name),
            unit: CHANNEL_UNIT.to_string(),
            name,
            timestamps,
            data,
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }
}

/// Which edge of a pulse train an event marks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Onset,
    Offset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    pub timestamp: f64,
    pub event: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MeaningRecord {
    pub value: String,
    pub meaning: String,
    #[serde(rename = "HED_tag")]
    pub hed_tag: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeaningsTable {
    pub name: String,
    pub description: String,
    pub rows: Vec<MeaningRecord>,
}

/// Events table with its linked meanings vocabulary.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventsTable {
    pub name: String,
    pub description: String,
    pub records: Vec<EventRecord>,
    pub meanings: MeaningsTable,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Subject {
    pub subject_id: String,
    pub sex: Option<String>,
    pub species: Option<String>,
    pub date_of_birth: Option<String>,
    pub genotype: Option<String>,
}

/// The packaged session: acquired channels plus the stimulus events table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionContainer {
    pub session_id: String,
    pub session_description: String,
    pub session_start_time: DateTime<FixedOffset>,
    pub identifier: String,
    pub subject: Subject,
    pub acquisition: Vec<TimeSeries>,
    pub events: Option<EventsTable>,
}

impl SessionContainer {
    pub fn new(
        session_id: impl Into<String>,
        session_description: impl Into<String>,
        session_start_time: DateTime<FixedOffset>,
        identifier: impl Into<String>,
        subject: Subject,
    ) -> Self {
        SessionContainer {
            session_id: session_id.into(),
            session_description: session_description.into(),
            session_start_time,
            identifier: identifier.into(),
            subject,
            acquisition: Vec::new(),
            events: None,
        }
    }

    /// Adds an acquired channel
    ///
    /// # Errors
    ///
    /// * `PackagingError::LengthMismatch` - timestamps and data differ in length
    /// * `PackagingError::DuplicateChannel` - a channel with this name exists
    pub fn add_acquisition(&mut self, series: TimeSeries) -> Result<()> {
        if series.timestamps.len() != series.data.len() {
            return Err(PackagingError::LengthMismatch {
                channel: series.name,
                timestamps: series.timestamps.len(),
                values: series.data.len(),
            });
        }
        if self.find_acquisition(&series.name).is_some() {
            return Err(PackagingError::DuplicateChannel(series.name));
        }
        self.acquisition.push(series);
        Ok(())
    }

    /// Looks up an acquired channel by name
    pub fn find_acquisition(&self, name: &str) -> Option<&TimeSeries> {
        self.acquisition.iter().find(|s| s.name == name)
    }

    /// Attaches the events table; every event label must have a meaning row
    ///
    /// # Errors
    ///
    /// * `PackagingError::UnmappedEventLabel` - an event's label is missing from the meanings
    pub fn add_events_table(&mut self, table: EventsTable) -> Result<()> {
        let known: HashSet<&str> = table.meanings.rows.iter().map(|m| m.value.as_str()).collect();
        if let Some(unmapped) = table.records.iter().find(|e| !known.contains(e.event.as_str())) {
            return Err(PackagingError::UnmappedEventLabel(unmapped.event.clone()));
        }
        self.events = Some(table);
        Ok(())
    }
}
