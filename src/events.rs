use std::collections::HashSet;
use std::path::Path;

use tracing::{debug, info};

use crate::error::{PackagingError, Result};
use crate::metadata::{SessionMetadata, StimulusProtocol};
use crate::reader::read_timestamps;
use crate::types::{EventKind, EventRecord, MeaningRecord};
use crate::utils::{find_single_file, samples_spanned};

/// Label, meaning and HED tag for one edge of the stimulus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventTerm {
    pub label: String,
    pub meaning: String,
    pub hed_tag: String,
}

impl EventTerm {
    pub fn new(label: &str, meaning: &str, hed_tag: &str) -> Self {
        EventTerm {
            label: label.to_string(),
            meaning: meaning.to_string(),
            hed_tag: hed_tag.to_string(),
        }
    }
}

/// Immutable label vocabulary for reconstructed events
///
/// The default describes the optogenetic stimulus laser. Any label not in
/// the vocabulary is rejected when building the meanings table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventVocabulary {
    onset: EventTerm,
    offset: EventTerm,
}

impl Default for EventVocabulary {
    fn default() -> Self {
        EventVocabulary::new(
            EventTerm::new(
                "OptoStimLaser_onset",
                "Onset of Optogenetic Stimulus Laser",
                "Onset/Experimental-stimulus",
            ),
            EventTerm::new(
                "OptoStimLaser_offset",
                "Offset of Optogenetic Stimulus Laser",
                "Offset/Experimental-stimulus",
            ),
        )
    }
}

impl EventVocabulary {
    pub fn new(onset: EventTerm, offset: EventTerm) -> Self {
        EventVocabulary { onset, offset }
    }

    pub fn term(&self, kind: EventKind) -> &EventTerm {
        match kind {
            EventKind::Onset => &self.onset,
            EventKind::Offset => &self.offset,
        }
    }

    pub fn label(&self, kind: EventKind) -> &str {
        &self.term(kind).label
    }

    /// Looks up a label
    pub fn lookup(&self, label: &str) -> Option<&EventTerm> {
        [&self.onset, &self.offset].into_iter().find(|t| t.label == label)
    }
}

/// A planned event: which edge, at which sample of the stimulus file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameEvent {
    pub frame: usize,
    pub kind: EventKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WalkState {
    AwaitingOnset,
    AwaitingOffset,
    Terminal,
}

/// Accumulates frame events, enforcing onset/offset alternation. Every
/// frame must index one of `sample_count` samples.
#[derive(Debug)]
struct FrameWalk {
    frame: usize,
    sample_count: usize,
    state: WalkState,
    events: Vec<FrameEvent>,
}

impl FrameWalk {
    fn new(sample_count: usize) -> Self {
        FrameWalk {
            frame: 0,
            sample_count,
            state: WalkState::AwaitingOnset,
            events: Vec::new(),
        }
    }

    fn advance(&mut self, samples: usize, kind: EventKind) -> Result<()> {
        let frame = self.frame.checked_add(samples).ok_or(PackagingError::IndexOutOfRange {
            index: usize::MAX,
            len: self.sample_count,
        })?;
        if frame >= self.sample_count {
            return Err(PackagingError::IndexOutOfRange {
                index: frame,
                len: self.sample_count,
            });
        }
        self.frame = frame;
        self.events.push(FrameEvent { frame, kind });
        Ok(())
    }

    fn onset_after(&mut self, samples: usize) -> Result<()> {
        debug_assert_eq!(self.state, WalkState::AwaitingOnset);
        self.advance(samples, EventKind::Onset)?;
        self.state = WalkState::AwaitingOffset;
        Ok(())
    }

    fn offset_after(&mut self, samples: usize) -> Result<()> {
        debug_assert_eq!(self.state, WalkState::AwaitingOffset);
        self.advance(samples, EventKind::Offset)?;
        self.state = WalkState::AwaitingOnset;
        Ok(())
    }

    fn finish(mut self, samples: usize) -> Result<Vec<FrameEvent>> {
        self.offset_after(samples)?;
        self.state = WalkState::Terminal;
        Ok(self.events)
    }
}

/// Plans the onset/offset frame indices of a pulse-train protocol against a
/// recording of `sample_count` samples
///
/// The first onset lies `frequency[0] * baseline` samples in. Each further
/// trial steps through every (frequency, duration) pair: an offset after
/// `frequency * duration` samples, then the next onset after
/// `frequency * interval` samples. A closing offset follows the last onset,
/// using the pair that produced it (the first pair when there is only one
/// trial). Every step is truncated to whole samples.
///
/// The walk stops at the first frame that does not index a sample, so the
/// planned list never outgrows the recording.
///
/// # Errors
///
/// * `PackagingError::IndexOutOfRange` - a frame lies at or past `sample_count`
/// * `PackagingError::InvalidMetadata` - the protocol has unusable values
///
/// # Examples
///
/// ```rust
/// use optofiber::{plan_frames, StimulusProtocol};
///
/// let protocol = StimulusProtocol {
///     baseline_duration: 1.0,
///     pulse_frequencies: vec![10.0],
///     pulse_train_durations: vec![1.0],
///     pulse_train_interval: 0.5,
///     train_count: 3.0,
/// };
/// let frames: Vec<usize> = plan_frames(&protocol, 60)?.iter().map(|e| e.frame).collect();
/// assert_eq!(frames, vec![10, 20, 25, 35, 40, 50]);
///
/// assert!(plan_frames(&protocol, 50).is_err());
/// # Ok::<(), optofiber::PackagingError>(())
/// ```
pub fn plan_frames(protocol: &StimulusProtocol, sample_count: usize) -> Result<Vec<FrameEvent>> {
    protocol.validate()?;

    let first_frequency = protocol.pulse_frequencies[0];
    let mut last_pair = (first_frequency, protocol.pulse_train_durations[0]);

    let mut walk = FrameWalk::new(sample_count);
    walk.onset_after(samples_spanned(first_frequency, protocol.baseline_duration))?;

    for _ in 0..protocol.repetitions() {
        for &frequency in &protocol.pulse_frequencies {
            for &duration in &protocol.pulse_train_durations {
                walk.offset_after(samples_spanned(frequency, duration))?;
                walk.onset_after(samples_spanned(frequency, protocol.pulse_train_interval))?;
                last_pair = (frequency, duration);
            }
        }
    }

    let (frequency, duration) = last_pair;
    walk.finish(samples_spanned(frequency, duration))
}

/// Turns a stimulus protocol and the stimulus file's timestamps into event
/// and meaning records.
#[derive(Debug, Clone)]
pub struct EventReconstructor {
    vocabulary: EventVocabulary,
    timestamp_column: String,
}

impl Default for EventReconstructor {
    fn default() -> Self {
        EventReconstructor::new(EventVocabulary::default())
    }
}

impl EventReconstructor {
    pub fn new(vocabulary: EventVocabulary) -> Self {
        EventReconstructor {
            vocabulary,
            timestamp_column: crate::TIMESTAMP_COLUMN.to_string(),
        }
    }

    /// Overrides the stimulus file's timestamp column name.
    pub fn with_timestamp_column(mut self, column: &str) -> Self {
        self.timestamp_column = column.to_string();
        self
    }

    pub fn vocabulary(&self) -> &EventVocabulary {
        &self.vocabulary
    }

    /// Resolves the planned frames against `timestamps`
    ///
    /// Deterministic in its inputs.
    ///
    /// # Errors
    ///
    /// * `PackagingError::IndexOutOfRange` - a frame lies past the last sample
    /// * `PackagingError::InvalidMetadata` - the protocol has unusable values
    pub fn reconstruct(&self, protocol: &StimulusProtocol, timestamps: &[f64]) -> Result<Vec<EventRecord>> {
        let planned = plan_frames(protocol, timestamps.len())?;
        Ok(planned
            .into_iter()
            .map(|event| EventRecord {
                timestamp: timestamps[event.frame],
                event: self.vocabulary.label(event.kind).to_string(),
            })
            .collect())
    }

    /// One meaning row per distinct label, in first-appearance order
    ///
    /// # Errors
    ///
    /// * `PackagingError::UnmappedEventLabel` - a label is not in the vocabulary
    pub fn meanings(&self, events: &[EventRecord]) -> Result<Vec<MeaningRecord>> {
        let mut seen = HashSet::new();
        let mut rows = Vec::new();
        for event in events {
            if !seen.insert(event.event.as_str()) {
                continue;
            }
            let term = self
                .vocabulary
                .lookup(&event.event)
                .ok_or_else(|| PackagingError::UnmappedEventLabel(event.event.clone()))?;
            rows.push(MeaningRecord {
                value: term.label.clone(),
                meaning: term.meaning.clone(),
                hed_tag: term.hed_tag.clone(),
            });
        }
        Ok(rows)
    }

    /// Reconstructs events from the `Stim*.csv` file in `data_directory`
    ///
    /// # Errors
    ///
    /// * `PackagingError::MissingInput` / `AmbiguousInput` - stimulus file lookup failed
    /// * `PackagingError::InvalidMetadata` - the session has no usable protocol
    /// * any error of [`EventReconstructor::reconstruct`] or [`EventReconstructor::meanings`]
    ///
    /// # Examples
    ///
    /// ```rust
    /// use optofiber::{EventReconstructor, SessionMetadata};
    ///
    /// # let session_dir = optofiber::doctest_utils::create_session_dir("events_doc")?;
    /// # let fib_dir = session_dir.join("raw_data").join("fib");
    /// # let session: SessionMetadata = optofiber::metadata::load_json(
    /// #     &session_dir.join("raw_data").join("session.json"))?;
    /// let (events, meanings) = EventReconstructor::default().load_events(&fib_dir, &session)?;
    ///
    /// assert_eq!(events.first().map(|e| e.event.as_str()), Some("OptoStimLaser_onset"));
    /// assert_eq!(events.last().map(|e| e.event.as_str()), Some("OptoStimLaser_offset"));
    /// assert_eq!(meanings.len(), 2);
    /// # std::fs::remove_dir_all(&session_dir).ok();
    /// # Ok::<(), optofiber::PackagingError>(())
    /// ```
    pub fn load_events<P: AsRef<Path>>(
        &self,
        data_directory: P,
        session: &SessionMetadata,
    ) -> Result<(Vec<EventRecord>, Vec<MeaningRecord>)> {
        let data_directory = data_directory.as_ref();
        let stim_path = find_single_file(data_directory, crate::STIMULUS_FILE_PREFIX, "csv")?;
        let timestamps = read_timestamps(&stim_path, &self.timestamp_column)?;
        let protocol = StimulusProtocol::from_session(session)?;
        debug!(?protocol, samples = timestamps.len(), "stimulus protocol");

        let events = self.reconstruct(&protocol, &timestamps)?;
        let meanings = self.meanings(&events)?;
        info!(
            events = events.len(),
            labels = meanings.len(),
            file = %stim_path.display(),
            "reconstructed stimulus events"
        );
        Ok((events, meanings))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn protocol(freqs: &[f64], durations: &[f64], interval: f64, baseline: f64, trains: f64) -> StimulusProtocol {
        StimulusProtocol {
            baseline_duration: baseline,
            pulse_frequencies: freqs.to_vec(),
            pulse_train_durations: durations.to_vec(),
            pulse_train_interval: interval,
            train_count: trains,
        }
    }

    fn frames(protocol: &StimulusProtocol) -> Vec<usize> {
        plan_frames(protocol, usize::MAX).unwrap().iter().map(|e| e.frame).collect()
    }

    #[test]
    fn test_single_trial_frames() {
        let p = protocol(&[10.0], &[1.0], 5.0, 2.0, 1.0);
        let planned = plan_frames(&p, usize::MAX).unwrap();
        assert_eq!(
            planned,
            vec![
                FrameEvent { frame: 20, kind: EventKind::Onset },
                FrameEvent { frame: 30, kind: EventKind::Offset },
            ]
        );
    }

    #[test]
    fn test_three_trial_frames() {
        let p = protocol(&[10.0], &[1.0], 0.5, 1.0, 3.0);
        assert_eq!(frames(&p), vec![10, 20, 25, 35, 40, 50]);
    }

    #[test]
    fn test_kinds_alternate() {
        let p = protocol(&[20.0, 40.0], &[0.5, 1.0, 2.0], 1.0, 3.0, 4.0);
        let planned = plan_frames(&p, usize::MAX).unwrap();
        assert_eq!(planned.first().unwrap().kind, EventKind::Onset);
        assert_eq!(planned.last().unwrap().kind, EventKind::Offset);
        for pair in planned.windows(2) {
            assert_ne!(pair[0].kind, pair[1].kind);
            assert!(pair[0].frame <= pair[1].frame);
        }
        // 3 repetitions * 6 pairs * 2 events + first onset + final offset
        assert_eq!(planned.len(), 3 * 6 * 2 + 2);
    }

    #[test]
    fn test_cross_product_uses_last_pair_for_final_offset() {
        // baseline 1s at 10Hz -> 10
        // trial: (10Hz,1s) off 20, on 25; (10Hz,2s) off 45, on 50;
        //        (20Hz,1s) off 70, on 80; (20Hz,2s) off 120, on 130
        // final offset with (20Hz, 2s) -> 170
        let p = protocol(&[10.0, 20.0], &[1.0, 2.0], 0.5, 1.0, 2.0);
        assert_eq!(frames(&p), vec![10, 20, 25, 45, 50, 70, 80, 120, 130, 170]);
    }

    #[test]
    fn test_zero_repetitions_reuse_first_pair() {
        let p = protocol(&[10.0, 50.0], &[1.0, 3.0], 0.5, 1.0, 1.0);
        assert_eq!(frames(&p), vec![10, 20]);
    }

    #[test]
    fn test_steps_truncate_to_whole_samples() {
        // 7Hz * 0.5s = 3.5 -> 3; 7Hz * 1.1s = 7.7 -> 7; 7Hz * 0.3s = 2.1 -> 2
        let p = protocol(&[7.0], &[1.1], 0.3, 0.5, 2.0);
        assert_eq!(frames(&p), vec![3, 10, 12, 19]);
    }

    #[test]
    fn test_reconstruct_maps_frames_to_timestamps() {
        let timestamps: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64 * 0.1).collect();
        let p = protocol(&[10.0], &[1.0], 0.5, 1.0, 3.0);
        let events = EventReconstructor::default().reconstruct(&p, &timestamps).unwrap();

        let expected_frames = [10, 20, 25, 35, 40, 50];
        assert_eq!(events.len(), expected_frames.len());
        for (event, frame) in events.iter().zip(expected_frames) {
            assert_eq!(event.timestamp, timestamps[frame]);
        }
        assert_eq!(events[0].event, "OptoStimLaser_onset");
        assert_eq!(events[1].event, "OptoStimLaser_offset");
    }

    #[test]
    fn test_frame_past_end_is_out_of_range() {
        let p = protocol(&[10.0], &[1.0], 0.5, 1.0, 3.0);
        // last frame is 50, so 50 samples are one too few
        let timestamps = vec![0.0; 50];
        match EventReconstructor::default().reconstruct(&p, &timestamps) {
            Err(PackagingError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 50);
                assert_eq!(len, 50);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
        let timestamps = vec![0.0; 51];
        assert!(EventReconstructor::default().reconstruct(&p, &timestamps).is_ok());
    }

    #[test]
    fn test_huge_train_count_stops_at_recording_end() {
        // 2e7 trains would plan 4e7 frames; the walk must stop at frame 65
        let p = protocol(&[10.0], &[1.0], 0.5, 1.0, 2e7);
        let timestamps = vec![0.0; 60];
        match EventReconstructor::default().reconstruct(&p, &timestamps) {
            Err(PackagingError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, 65);
                assert_eq!(len, 60);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_huge_frequency_is_out_of_range() {
        let p = protocol(&[1e19], &[1.0], 1.0, 1.0, 1.0);
        let timestamps = vec![0.0; 10];
        assert!(matches!(
            EventReconstructor::default().reconstruct(&p, &timestamps),
            Err(PackagingError::IndexOutOfRange { len: 10, .. })
        ));
    }

    #[test]
    fn test_frame_overflow_is_out_of_range() {
        // onset at 1e19 fits in usize, the offset 1e19 later does not
        let p = protocol(&[1e19], &[1.0], 1.0, 1.0, 1.0);
        match plan_frames(&p, usize::MAX) {
            Err(PackagingError::IndexOutOfRange { index, len }) => {
                assert_eq!(index, usize::MAX);
                assert_eq!(len, usize::MAX);
            }
            other => panic!("expected IndexOutOfRange, got {:?}", other),
        }
    }

    #[test]
    fn test_meanings_in_first_appearance_order() {
        let reconstructor = EventReconstructor::default();
        let events = vec![
            EventRecord { timestamp: 2.0, event: "OptoStimLaser_offset".to_string() },
            EventRecord { timestamp: 3.0, event: "OptoStimLaser_onset".to_string() },
            EventRecord { timestamp: 4.0, event: "OptoStimLaser_offset".to_string() },
        ];
        let meanings = reconstructor.meanings(&events).unwrap();
        assert_eq!(meanings.len(), 2);
        assert_eq!(meanings[0].value, "OptoStimLaser_offset");
        assert_eq!(meanings[0].hed_tag, "Offset/Experimental-stimulus");
        assert_eq!(meanings[1].meaning, "Onset of Optogenetic Stimulus Laser");
    }

    #[test]
    fn test_unmapped_label_is_rejected() {
        let events = vec![EventRecord { timestamp: 0.0, event: "Reward_onset".to_string() }];
        assert!(matches!(
            EventReconstructor::default().meanings(&events),
            Err(PackagingError::UnmappedEventLabel(label)) if label == "Reward_onset"
        ));
    }

    #[test]
    fn test_alternate_vocabulary() {
        let vocabulary = EventVocabulary::new(
            EventTerm::new("Tone_onset", "Tone starts", "Onset/Sensory-event"),
            EventTerm::new("Tone_offset", "Tone stops", "Offset/Sensory-event"),
        );
        let reconstructor = EventReconstructor::new(vocabulary);
        let timestamps: Vec<f64> = (0..40).map(|i| i as f64).collect();
        let p = protocol(&[10.0], &[1.0], 5.0, 2.0, 1.0);

        let events = reconstructor.reconstruct(&p, &timestamps).unwrap();
        assert_eq!(events[0], EventRecord { timestamp: 20.0, event: "Tone_onset".to_string() });
        assert_eq!(events[1], EventRecord { timestamp: 30.0, event: "Tone_offset".to_string() });

        let meanings = reconstructor.meanings(&events).unwrap();
        assert_eq!(meanings[0].hed_tag, "Onset/Sensory-event");

        // default labels are foreign to this vocabulary
        let foreign = EventReconstructor::default().reconstruct(&p, &timestamps).unwrap();
        assert!(reconstructor.meanings(&foreign).is_err());
    }

    #[test]
    fn test_reconstruction_is_deterministic() {
        let timestamps: Vec<f64> = (0..500).map(|i| i as f64 * 0.05).collect();
        let p = protocol(&[10.0, 20.0], &[1.0, 0.5], 1.0, 2.0, 3.0);
        let reconstructor = EventReconstructor::default();
        let first = reconstructor.reconstruct(&p, &timestamps).unwrap();
        let second = reconstructor.reconstruct(&p, &timestamps).unwrap();
        assert_eq!(first, second);
    }
}
