//! Assembles a whole session directory into a [`SessionContainer`].

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PackagingError, Result};
use crate::events::EventReconstructor;
use crate::metadata::{json_to_text, load_json, DataDescription, SessionMetadata, SubjectMetadata};
use crate::reader::ChannelLoader;
use crate::types::{EventsTable, MeaningsTable, SessionContainer};

pub const PRIMARY_DATA_DIR: &str = "raw_data";
pub const FIBER_DATA_DIR: &str = "fib";
pub const SESSION_JSON: &str = "session.json";
pub const DATA_DESCRIPTION_JSON: &str = "data_description.json";
pub const SUBJECT_JSON: &str = "subject.json";

pub const SESSION_DESCRIPTION: &str = "Opto + Fiber Indicator Benchmarking";
pub const EVENTS_TABLE_NAME: &str = "events";
pub const EVENTS_TABLE_DESCRIPTION: &str = "Events for Benchmark Indicator experiment";
pub const MEANINGS_TABLE_NAME: &str = "meanings";
pub const MEANINGS_TABLE_DESCRIPTION: &str =
    "Description of values in events table for Benchmark Indicator experiment";

/// Returns `<input>/raw_data`
///
/// # Errors
///
/// * `PackagingError::MissingInput` - no primary data directory is attached
pub fn locate_primary_data<P: AsRef<Path>>(input_directory: P) -> Result<PathBuf> {
    let primary = input_directory.as_ref().join(PRIMARY_DATA_DIR);
    if !primary.is_dir() {
        return Err(PackagingError::MissingInput(format!(
            "No primary data asset attached at {}",
            primary.display()
        )));
    }
    Ok(primary)
}

/// Packages sessions with a given channel loader and event reconstructor.
#[derive(Debug, Clone, Default)]
pub struct SessionPackager {
    loader: ChannelLoader,
    reconstructor: EventReconstructor,
}

impl SessionPackager {
    pub fn new(loader: ChannelLoader, reconstructor: EventReconstructor) -> Self {
        SessionPackager { loader, reconstructor }
    }

    /// Builds the container for the session under `input_directory`
    ///
    /// Reads the three metadata files from `raw_data/`, every channel and
    /// the stimulus file from `raw_data/fib/`. Any failure aborts the whole
    /// session.
    pub fn package<P: AsRef<Path>>(&self, input_directory: P) -> Result<SessionContainer> {
        let primary = locate_primary_data(input_directory)?;
        info!(path = %primary.display(), "found primary data");

        let session: SessionMetadata = load_json(&primary.join(SESSION_JSON))?;
        let description: DataDescription = load_json(&primary.join(DATA_DESCRIPTION_JSON))?;
        let subject: SubjectMetadata = load_json(&primary.join(SUBJECT_JSON))?;
        info!(session = %description.name, "starting session packaging");

        let mut container = SessionContainer::new(
            description.name.clone(),
            SESSION_DESCRIPTION,
            session.start_time()?,
            json_to_text(&description.subject_id),
            subject.to_subject(),
        );

        let fib_dir = primary.join(FIBER_DATA_DIR);
        for series in self.loader.load(&fib_dir)? {
            container.add_acquisition(series)?;
        }
        info!(channels = container.acquisition.len(), "finished packaging timeseries");

        let (records, meanings) = self.reconstructor.load_events(&fib_dir, &session)?;
        container.add_events_table(EventsTable {
            name: EVENTS_TABLE_NAME.to_string(),
            description: EVENTS_TABLE_DESCRIPTION.to_string(),
            records,
            meanings: MeaningsTable {
                name: MEANINGS_TABLE_NAME.to_string(),
                description: MEANINGS_TABLE_DESCRIPTION.to_string(),
                rows: meanings,
            },
        })?;
        info!("finished gathering events and meanings tables");

        Ok(container)
    }
}

/// Packages a session with the default conventions
///
/// # Examples
///
/// ```rust
/// use optofiber::package_session;
///
/// # let input = optofiber::doctest_utils::create_session_dir("package_doc")?;
/// let container = package_session(&input)?;
///
/// println!("{}: {} channels", container.session_id, container.acquisition.len());
/// let events = container.events.as_ref().expect("events table");
/// assert_eq!(events.meanings.rows.len(), 2);
/// # std::fs::remove_dir_all(&input).ok();
/// # Ok::<(), optofiber::PackagingError>(())
/// ```
pub fn package_session<P: AsRef<Path>>(input_directory: P) -> Result<SessionContainer> {
    SessionPackager::default().package(input_directory)
}
