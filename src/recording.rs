//! In-memory recordings.
//!
//! A [`Recording`] holds everything a decoder would return for one file and
//! answers the [`Decoder`] contract directly. It round-trips through JSON,
//! which makes it usable as an interchange dump for recordings exported by
//! vendor tools, and as a fixture in tests and benchmarks.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

use crate::decoder::Decoder;
use crate::error::{ConvertError, Result};
use crate::types::*;

/// One continuous channel of a recording.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordedChannel {
    pub name: String,
    pub vendor_channel_number: u32,
    /// Samples for the channel; `None` for an unused acquisition slot
    #[serde(default)]
    pub data: Option<ChannelRead>,
}

impl RecordedChannel {
    pub fn sample_count(&self) -> usize {
        self.data.as_ref().map_or(0, |d| d.values.len())
    }
}

/// A complete recording held in memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    /// Format name reported to run metadata
    #[serde(default = "default_format")]
    pub format: String,
    /// Continuous channels in acquisition order
    pub channels: Vec<RecordedChannel>,
    /// Strobed events keyed by event channel name
    #[serde(default)]
    pub events: HashMap<String, Vec<StrobedEvent>>,
    #[serde(default)]
    pub start_markers: Vec<f64>,
    #[serde(default)]
    pub stop_markers: Vec<f64>,
    /// Optional file index carried into run metadata
    #[serde(default)]
    pub index: Option<serde_json::Value>,
}

fn default_format() -> String {
    "recording-json".to_string()
}

impl Default for Recording {
    fn default() -> Self {
        Self {
            format: default_format(),
            channels: Vec::new(),
            events: HashMap::new(),
            start_markers: Vec::new(),
            stop_markers: Vec::new(),
            index: None,
        }
    }
}

impl Recording {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads a recording dump written by [`Recording::to_json_file`].
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let recording: Recording = serde_json::from_str(&text)?;
        log::debug!(
            "Loaded recording dump {} with {} continuous channels",
            path.as_ref().display(),
            recording.channels.len()
        );
        Ok(recording)
    }

    pub fn to_json_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let text = serde_json::to_string(self)?;
        fs::write(path, text)?;
        Ok(())
    }

    /// Adds a continuous channel.
    pub fn with_channel(
        mut self,
        name: &str,
        vendor_channel_number: u32,
        data: Option<ChannelRead>,
    ) -> Self {
        self.channels.push(RecordedChannel {
            name: name.to_string(),
            vendor_channel_number,
            data,
        });
        self
    }

    /// Adds strobed events for an event channel.
    pub fn with_events(mut self, channel: &str, events: Vec<StrobedEvent>) -> Self {
        self.events.insert(channel.to_string(), events);
        self
    }

    pub fn with_markers(mut self, kind: MarkerKind, markers: Vec<f64>) -> Self {
        match kind {
            MarkerKind::Start => self.start_markers = markers,
            MarkerKind::Stop => self.stop_markers = markers,
        }
        self
    }
}

impl Decoder for Recording {
    fn list_continuous_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .channels
            .iter()
            .map(|c| ChannelInfo {
                name: c.name.clone(),
                vendor_channel_number: c.vendor_channel_number,
            })
            .collect())
    }

    fn channel_sample_counts(&self) -> Result<HashMap<u32, usize>> {
        Ok(self
            .channels
            .iter()
            .map(|c| (c.vendor_channel_number, c.sample_count()))
            .collect())
    }

    fn read_channel_samples(
        &self,
        vendor_channel_number: u32,
        name: Option<&str>,
    ) -> Result<ChannelRead> {
        let recorded = self
            .channels
            .iter()
            .find(|c| match name {
                Some(name) => c.name == name,
                None => c.vendor_channel_number == vendor_channel_number,
            })
            .ok_or_else(|| ConvertError::ChannelReadFailure {
                channel: name
                    .map(str::to_string)
                    .unwrap_or_else(|| format!("#{}", vendor_channel_number)),
                reason: "channel not present in recording".to_string(),
            })?;

        Ok(recorded.data.clone().unwrap_or(ChannelRead {
            values: Vec::new(),
            sample_rate: 0.0,
            fragments: Vec::new(),
        }))
    }

    fn read_digital_events(&self, channel: &str) -> Result<Vec<StrobedEvent>> {
        Ok(self.events.get(channel).cloned().unwrap_or_default())
    }

    fn read_start_stop_markers(&self, kind: MarkerKind) -> Result<Vec<f64>> {
        Ok(match kind {
            MarkerKind::Start => self.start_markers.clone(),
            MarkerKind::Stop => self.stop_markers.clone(),
        })
    }

    fn format_name(&self) -> &str {
        &self.format
    }

    fn file_index(&self) -> Option<serde_json::Value> {
        self.index.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single_fragment(values: Vec<f64>) -> ChannelRead {
        let count = values.len();
        ChannelRead {
            values,
            sample_rate: 1000.0,
            fragments: vec![FragmentSpan {
                start_time: 0.0,
                sample_count: count,
            }],
        }
    }

    #[test]
    fn unused_slots_report_zero_samples() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(single_fragment(vec![1.0, 2.0])))
            .with_channel("SPKC02", 2, None);

        let counts = recording.channel_sample_counts().unwrap();
        assert_eq!(counts[&1], 2);
        assert_eq!(counts[&2], 0);
    }

    #[test]
    fn unknown_channel_is_a_read_failure() {
        let recording = Recording::new();
        assert!(matches!(
            recording.read_channel_samples(9, Some("SPKC09")),
            Err(ConvertError::ChannelReadFailure { .. })
        ));
        assert!(matches!(
            recording.read_channel_samples(9, None),
            Err(ConvertError::ChannelReadFailure { .. })
        ));
    }

    #[test]
    fn unnamed_channel_is_read_by_vendor_number() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(single_fragment(vec![1.0, 2.0])))
            .with_channel("SPKC02", 2, Some(single_fragment(vec![3.0, 4.0])));
        let read = recording.read_channel_samples(2, None).unwrap();
        assert_eq!(read.values, vec![3.0, 4.0]);
    }

    #[test]
    fn missing_event_channel_reads_empty() {
        let recording = Recording::new().with_events(
            "Strobed",
            vec![StrobedEvent {
                timestamp: 0.5,
                value: 12,
            }],
        );
        assert_eq!(recording.read_digital_events("Strobed").unwrap().len(), 1);
        assert!(recording.read_digital_events("EVT01").unwrap().is_empty());
    }

    #[test]
    fn json_dump_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let recording = Recording::new()
            .with_channel("WB01", 7, Some(single_fragment(vec![3.0, -4.0, 5.0])))
            .with_markers(MarkerKind::Start, vec![0.0]);

        recording.to_json_file(&path).unwrap();
        let loaded = Recording::from_json_file(&path).unwrap();
        assert_eq!(loaded, recording);
        assert_eq!(loaded.format_name(), "recording-json");
    }
}
