use std::collections::HashSet;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::{debug, info};

use crate::error::{PackagingError, Result};
use crate::types::TimeSeries;
use crate::utils::{derive_channel_suffix, find_single_file, parse_sample};

/// Naming conventions of the photometry acquisition CSVs
///
/// Each group names a family of files (`<group>*.csv`) holding one
/// timestamp column and any number of measurement columns whose header
/// contains `marker`. Some rigs write an alternate header form carrying
/// `alternate_infix`, which is ignored when deriving channel names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConvention {
    pub groups: Vec<String>,
    pub timestamp_column: String,
    pub marker: String,
    pub alternate_infix: String,
}

impl Default for ChannelConvention {
    fn default() -> Self {
        ChannelConvention {
            groups: vec!["Signal".to_string(), "Iso".to_string(), "Stim".to_string()],
            timestamp_column: crate::TIMESTAMP_COLUMN.to_string(),
            marker: "ROI".to_string(),
            alternate_infix: "_sensorfloor".to_string(),
        }
    }
}

impl ChannelConvention {
    /// Output name for a measurement column of `group`, e.g. `Signal_0`
    pub fn channel_name(&self, group: &str, column: &str) -> Result<String> {
        let suffix = derive_channel_suffix(column, &self.alternate_infix).ok_or_else(|| {
            PackagingError::InvalidFormat(format!("cannot derive a channel suffix from column '{}'", column))
        })?;
        Ok(format!("{}_{}", group, suffix))
    }
}

/// One CSV file held fully in memory
///
/// The file handle is released once [`ChannelReader::open`] returns;
/// columns are parsed on demand.
#[derive(Debug, Clone)]
pub struct ChannelReader {
    path: PathBuf,
    headers: StringRecord,
    records: Vec<StringRecord>,
}

impl ChannelReader {
    /// Reads a headed CSV file
    ///
    /// Rows shorter than the header are kept as-is; reading a column they
    /// lack fails instead of padding or skipping them.
    ///
    /// # Errors
    ///
    /// * `PackagingError::MissingInput` - the file does not exist
    /// * `PackagingError::Csv` - the file cannot be read or is not valid CSV
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::Headers)
            .from_path(path)
            .map_err(|e| match e.kind() {
                csv::ErrorKind::Io(io) if io.kind() == std::io::ErrorKind::NotFound => {
                    PackagingError::MissingInput(format!("{}: {}", path.display(), io))
                }
                _ => PackagingError::Csv(e),
            })?;

        let headers = reader.headers()?.clone();
        let records = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
        debug!(path = %path.display(), rows = records.len(), "read csv");

        Ok(ChannelReader {
            path: path.to_path_buf(),
            headers,
            records,
        })
    }

    /// Headers containing `marker`, in file order
    pub fn columns_containing<'a>(&'a self, marker: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.headers.iter().filter(move |h| h.contains(marker))
    }

    /// Parses a numeric column
    ///
    /// Blank cells become NaN. The result holds exactly one value per row.
    ///
    /// # Errors
    ///
    /// * `PackagingError::MissingColumn` - no header equals `name`
    /// * `PackagingError::InvalidFormat` - a row is too short to hold the
    ///   column, or a cell is not a number
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let index = self
            .headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| PackagingError::MissingColumn {
                file: self.path.display().to_string(),
                column: name.to_string(),
            })?;

        let mut values = Vec::with_capacity(self.records.len());
        for (row, record) in self.records.iter().enumerate() {
            let cell = record.get(index).ok_or_else(|| {
                PackagingError::InvalidFormat(format!(
                    "{} row {} has no '{}' cell",
                    self.path.display(),
                    row + 1,
                    name
                ))
            })?;
            let value = parse_sample(cell).ok_or_else(|| {
                PackagingError::InvalidFormat(format!(
                    "{} row {} column '{}': '{}' is not a number",
                    self.path.display(),
                    row + 1,
                    name,
                    cell
                ))
            })?;
            values.push(value);
        }
        Ok(values)
    }
}

/// Resolves every measurement column of every channel group into a
/// [`TimeSeries`].
#[derive(Debug, Clone, Default)]
pub struct ChannelLoader {
    convention: ChannelConvention,
}

impl ChannelLoader {
    pub fn new(convention: ChannelConvention) -> Self {
        ChannelLoader { convention }
    }

    pub fn convention(&self) -> &ChannelConvention {
        &self.convention
    }

    /// Loads all channels found in `data_directory`
    ///
    /// Series are returned in group order, then column order within each
    /// file. No group is optional.
    ///
    /// # Errors
    ///
    /// * `PackagingError::MissingInput` - a group has no `<group>*.csv` file
    /// * `PackagingError::AmbiguousInput` - a group has several candidate files
    /// * `PackagingError::MissingColumn` - the timestamp column is absent
    /// * `PackagingError::LengthMismatch` - a column and its timestamps differ in length
    /// * `PackagingError::DuplicateChannel` - two columns derive the same channel name
    ///
    /// # Examples
    ///
    /// ```rust
    /// use optofiber::ChannelLoader;
    ///
    /// # let session = optofiber::doctest_utils::create_session_dir("loader_doc")?;
    /// # let fib_dir = session.join("raw_data").join("fib");
    /// let channels = ChannelLoader::default().load(&fib_dir)?;
    ///
    /// for series in &channels {
    ///     println!("{}: {} samples", series.name, series.len());
    /// }
    /// assert!(channels.iter().any(|s| s.name == "Signal_0"));
    /// # std::fs::remove_dir_all(&session).ok();
    /// # Ok::<(), optofiber::PackagingError>(())
    /// ```
    pub fn load<P: AsRef<Path>>(&self, data_directory: P) -> Result<Vec<TimeSeries>> {
        let data_directory = data_directory.as_ref();
        let mut series = Vec::new();
        let mut seen = HashSet::new();

        for group in &self.convention.groups {
            let path = find_single_file(data_directory, group, "csv")?;
            let reader = ChannelReader::open(&path)?;
            let timestamps = reader.column(&self.convention.timestamp_column)?;

            for column in reader.columns_containing(&self.convention.marker) {
                let values = reader.column(column)?;
                let name = self.convention.channel_name(group, column)?;
                if timestamps.len() != values.len() {
                    return Err(PackagingError::LengthMismatch {
                        channel: name,
                        timestamps: timestamps.len(),
                        values: values.len(),
                    });
                }
                if !seen.insert(name.clone()) {
                    return Err(PackagingError::DuplicateChannel(name));
                }
                debug!(channel = %name, column, samples = values.len(), "resolved column");
                series.push(TimeSeries::new(name, timestamps.clone(), values));
            }
        }

        info!(
            channels = series.len(),
            directory = %data_directory.display(),
            "loaded channel data"
        );
        Ok(series)
    }
}

/// Reads the timestamp column of a CSV file.
pub fn read_timestamps<P: AsRef<Path>>(path: P, timestamp_column: &str) -> Result<Vec<f64>> {
    ChannelReader::open(path)?.column(timestamp_column)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_csv(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_channel_name_uses_convention() {
        let convention = ChannelConvention::default();
        assert_eq!(convention.channel_name("Signal", "ROI0").unwrap(), "Signal_0");
        assert_eq!(convention.channel_name("Iso", "ROI1_sensorfloor").unwrap(), "Iso_1");
        assert!(convention.channel_name("Iso", "").is_err());
    }

    #[test]
    fn test_reader_parses_columns() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(
            dir.path(),
            "Signal_test.csv",
            "FrameCounter,SoftwareTS,ROI0,ROI1\n1,0.0,1.5,2.5\n2,0.05,,3.0\n",
        );
        let reader = ChannelReader::open(&path).unwrap();
        assert_eq!(reader.column("SoftwareTS").unwrap(), vec![0.0, 0.05]);

        let roi0 = reader.column("ROI0").unwrap();
        assert_eq!(roi0[0], 1.5);
        assert!(roi0[1].is_nan());

        let marked: Vec<&str> = reader.columns_containing("ROI").collect();
        assert_eq!(marked, vec!["ROI0", "ROI1"]);

        assert!(matches!(
            reader.column("Missing"),
            Err(PackagingError::MissingColumn { .. })
        ));
    }

    #[test]
    fn test_reader_rejects_text_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Iso.csv", "SoftwareTS,ROI0\n0.0,oops\n");
        let reader = ChannelReader::open(&path).unwrap();
        assert!(matches!(
            reader.column("ROI0"),
            Err(PackagingError::InvalidFormat(_))
        ));
    }

    #[test]
    fn test_short_row_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_csv(dir.path(), "Signal.csv", "SoftwareTS,ROI0\n0.0,1.0\n0.1\n");
        let loader = ChannelLoader::new(ChannelConvention {
            groups: vec!["Signal".to_string()],
            ..ChannelConvention::default()
        });
        match loader.load(dir.path()) {
            Err(PackagingError::InvalidFormat(message)) => {
                assert!(message.contains("row 2"), "{}", message);
                assert!(message.contains("'ROI0'"), "{}", message);
            }
            other => panic!("expected InvalidFormat, got {:?}", other),
        }
    }

    #[test]
    fn test_short_row_in_timestamp_column_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Stim.csv", "ROI0,SoftwareTS\n0,1.0\n0\n0,3.0\n");
        assert!(matches!(
            read_timestamps(&path, "SoftwareTS"),
            Err(PackagingError::InvalidFormat(message)) if message.contains("row 2")
        ));
    }

    #[test]
    fn test_missing_file_is_missing_input() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ChannelReader::open(dir.path().join("Signal.csv")),
            Err(PackagingError::MissingInput(_))
        ));
    }

    #[test]
    fn test_unreadable_path_is_csv_error() {
        let dir = tempfile::tempdir().unwrap();
        // a directory opens but cannot be read as a file
        let path = dir.path().join("Signal.csv");
        fs::create_dir(&path).unwrap();
        assert!(matches!(ChannelReader::open(&path), Err(PackagingError::Csv(_))));
    }

    #[test]
    fn test_read_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_csv(dir.path(), "Stim.csv", "SoftwareTS,ROI0\n1.0,0\n2.0,0\n3.0,0\n");
        assert_eq!(read_timestamps(&path, "SoftwareTS").unwrap(), vec![1.0, 2.0, 3.0]);
    }
}
