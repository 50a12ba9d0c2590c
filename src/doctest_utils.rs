// Internal utilities for documentation tests
// Builds synthetic session directories shaped like real acquisitions

use std::fs;
use std::path::{Path, PathBuf};

use crate::session::{DATA_DESCRIPTION_JSON, FIBER_DATA_DIR, PRIMARY_DATA_DIR, SESSION_JSON, SUBJECT_JSON};
use crate::Result;

/// Rows in every generated channel file (20 Hz for 5 seconds)
pub const FIXTURE_ROWS: usize = 100;

/// Session id written to the generated `data_description.json`
pub const FIXTURE_SESSION_ID: &str = "FIP_712345_2024-03-05_10-15-00";

/// Session JSON for a 3-train protocol: 10 Hz, 1 s trains, 0.5 s apart,
/// after a 2 s baseline (frames 20, 30, 35, 45, 50, 60)
pub const FIXTURE_SESSION_JSON: &str = r#"{
    "session_start_time": "2024-03-05T10:15:00-08:00",
    "stimulus_epochs": [
        {
            "stimulus_name": "OptoStim",
            "stimulus_parameters": [
                {
                    "pulse_frequency": ["10"],
                    "baseline_duration": "2",
                    "number_pulse_trains": ["3"],
                    "pulse_train_duration": ["1"],
                    "pulse_train_interval": "0.5"
                }
            ]
        }
    ]
}"#;

/// Writes a CSV with the given header and numeric rows
pub fn write_channel_csv<P: AsRef<Path>>(path: P, headers: &[&str], rows: &[Vec<f64>]) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(row.iter().map(|v| v.to_string()))?;
    }
    writer.flush()?;
    Ok(())
}

/// Rows of `SoftwareTS` plus one ramp per ROI column
pub fn fixture_rows(roi_columns: usize) -> Vec<Vec<f64>> {
    (0..FIXTURE_ROWS)
        .map(|i| {
            let mut row = vec![i as f64 * 0.05];
            row.extend((0..roi_columns).map(|c| (c * 1000 + i) as f64));
            row
        })
        .collect()
}

/// Creates a complete session under `root` and returns `root`
///
/// Layout: `raw_data/{session,data_description,subject}.json` and
/// `raw_data/fib/{Signal,Iso,Stim}_*.csv`, each CSV carrying `SoftwareTS`
/// and two ROI columns (the second in the `_sensorfloor` form).
pub fn create_session_in<P: AsRef<Path>>(root: P) -> Result<PathBuf> {
    let root = root.as_ref().to_path_buf();
    let primary = root.join(PRIMARY_DATA_DIR);
    let fib = primary.join(FIBER_DATA_DIR);
    fs::create_dir_all(&fib)?;

    fs::write(primary.join(SESSION_JSON), FIXTURE_SESSION_JSON)?;
    fs::write(
        primary.join(DATA_DESCRIPTION_JSON),
        format!(r#"{{"name": "{}", "subject_id": "712345"}}"#, FIXTURE_SESSION_ID),
    )?;
    fs::write(
        primary.join(SUBJECT_JSON),
        r#"{"subject_id": "712345", "sex": "Female", "species": {"name": "Mus musculus"}, "date_of_birth": "2023-11-01"}"#,
    )?;

    let headers = ["SoftwareTS", "ROI0", "ROI1_sensorfloor"];
    for group in ["Signal", "Iso", "Stim"] {
        write_channel_csv(
            fib.join(format!("{}_2024-03-05T10_15_00.csv", group)),
            &headers,
            &fixture_rows(2),
        )?;
    }
    Ok(root)
}

/// Creates a complete session in a fresh directory under the system temp dir
pub fn create_session_dir(name: &str) -> Result<PathBuf> {
    let root = std::env::temp_dir().join(format!("optofiber_{}_{}", name, std::process::id()));
    if root.exists() {
        fs::remove_dir_all(&root)?;
    }
    create_session_in(root)
}
