use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{PackagingError, Result};
use crate::types::SessionContainer;

/// Extension of written containers.
pub const CONTAINER_EXTENSION: &str = "json";

/// Writes a [`SessionContainer`] to disk
///
/// # File Creation Workflow
///
/// 1. Create the writer with `ContainerWriter::create()` (parent directories
///    are created as needed)
/// 2. Hand over the container with `write_container()`
/// 3. Flush it to disk with `finalize()`
///
/// # Examples
///
/// ```rust
/// use optofiber::{package_session, ContainerWriter};
///
/// # let input = optofiber::doctest_utils::create_session_dir("writer_doc")?;
/// let container = package_session(&input)?;
///
/// let output = std::env::temp_dir().join("writer_doc_results");
/// let path = ContainerWriter::path_for(&output, &container.session_id);
/// let mut writer = ContainerWriter::create(&path)?;
/// writer.write_container(&container)?;
/// writer.finalize()?;
///
/// assert!(path.exists());
/// # std::fs::remove_dir_all(&input).ok();
/// # std::fs::remove_dir_all(&output).ok();
/// # Ok::<(), optofiber::PackagingError>(())
/// ```
pub struct ContainerWriter {
    file: BufWriter<File>,
    path: PathBuf,
    written: bool,
}

impl ContainerWriter {
    /// Output path of a session's container inside `output_directory`
    pub fn path_for<P: AsRef<Path>>(output_directory: P, session_id: &str) -> PathBuf {
        output_directory
            .as_ref()
            .join(format!("{}.{}", session_id, CONTAINER_EXTENSION))
    }

    /// Creates (or truncates) the container file
    ///
    /// # Errors
    ///
    /// * `PackagingError::Io` - the file or its parent directory cannot be created
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = File::create(path)?;

        Ok(ContainerWriter {
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            written: false,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Serializes the container
    ///
    /// # Errors
    ///
    /// * `PackagingError::InvalidFormat` - a container was already written
    /// * `PackagingError::Json` - serialization failed
    pub fn write_container(&mut self, container: &SessionContainer) -> Result<()> {
        if self.written {
            return Err(PackagingError::InvalidFormat(
                "a container has already been written to this file".to_string(),
            ));
        }
        serde_json::to_writer_pretty(&mut self.file, container)?;
        self.file.write_all(b"\n")?;
        self.written = true;

        info!(
            path = %self.path.display(),
            channels = container.acquisition.len(),
            events = container.events.as_ref().map_or(0, |t| t.records.len()),
            "wrote session container"
        );
        Ok(())
    }

    /// Flushes buffered output to disk
    ///
    /// # Errors
    ///
    /// * `PackagingError::InvalidFormat` - nothing was written
    /// * `PackagingError::Io` - flushing failed
    pub fn finalize(mut self) -> Result<()> {
        if !self.written {
            return Err(PackagingError::InvalidFormat(format!(
                "no container written to {}",
                self.path.display()
            )));
        }
        self.file.flush()?;
        Ok(())
    }
}
