//! # Opto + Fiber Session Packaging
//!
//! Converts an optogenetics / fiber photometry session (per-channel CSV traces
//! plus JSON session metadata) into a container holding one time series per
//! ROI channel and an events table describing the stimulus laser's pulse
//! trains, with HED-tagged meanings.
//!
//! ## Quick Start
//!
//! ### Packaging a session directory
//!
//! ```rust
//! use optofiber::{package_session, ContainerWriter, Result};
//!
//! fn main() -> Result<()> {
//!     # let input = optofiber::doctest_utils::create_session_dir("crate_doc")?;
//!     # let output = std::env::temp_dir().join("crate_doc_results");
//!     // `input` holds raw_data/{session,data_description,subject}.json
//!     // and raw_data/fib/{Signal,Iso,Stim}*.csv
//!     let container = package_session(&input)?;
//!
//!     for series in &container.acquisition {
//!         println!("{}: {} samples", series.name, series.len());
//!     }
//!
//!     let mut writer = ContainerWriter::create(
//!         ContainerWriter::path_for(&output, &container.session_id))?;
//!     writer.write_container(&container)?;
//!     writer.finalize()?;
//!     # std::fs::remove_dir_all(&input).ok();
//!     # std::fs::remove_dir_all(&output).ok();
//!     Ok(())
//! }
//! ```
//!
//! ### Reconstructing stimulus events
//!
//! Events are derived from the protocol alone; the stimulus file only maps
//! sample positions to timestamps.
//!
//! ```rust
//! use optofiber::{EventReconstructor, StimulusProtocol};
//!
//! let protocol = StimulusProtocol {
//!     baseline_duration: 2.0,
//!     pulse_frequencies: vec![10.0],
//!     pulse_train_durations: vec![1.0],
//!     pulse_train_interval: 5.0,
//!     train_count: 1.0,
//! };
//! let timestamps: Vec<f64> = (0..100).map(|i| i as f64 * 0.1).collect();
//!
//! let reconstructor = EventReconstructor::default();
//! let events = reconstructor.reconstruct(&protocol, &timestamps)?;
//! assert_eq!(events.len(), 2);
//! assert_eq!(events[0].timestamp, timestamps[20]);
//! assert_eq!(events[1].timestamp, timestamps[30]);
//!
//! let meanings = reconstructor.meanings(&events)?;
//! assert_eq!(meanings[0].hed_tag, "Onset/Experimental-stimulus");
//! # Ok::<(), optofiber::PackagingError>(())
//! ```

pub mod error;
pub mod types;
pub mod utils;
pub mod metadata;
pub mod reader;
pub mod events;
pub mod session;
pub mod writer;

#[doc(hidden)]
pub mod doctest_utils; // For internal doctest support

// Re-export main types for convenience
pub use error::{PackagingError, Result};
pub use types::{
    EventKind, EventRecord, EventsTable, MeaningRecord, MeaningsTable, SessionContainer, Subject, TimeSeries,
};
pub use metadata::{SessionMetadata, StimulusProtocol};
pub use reader::{ChannelConvention, ChannelLoader, ChannelReader};
pub use events::{plan_frames, EventReconstructor, EventTerm, EventVocabulary, FrameEvent};
pub use session::{package_session, SessionPackager};
pub use writer::ContainerWriter;

// Acquisition file conventions
pub const TIMESTAMP_COLUMN: &str = "SoftwareTS";
pub const STIMULUS_FILE_PREFIX: &str = "Stim";

/// Library version
///
/// # Examples
///
/// ```rust
/// let version = optofiber::version();
/// assert!(version.contains('.'));
/// ```
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
