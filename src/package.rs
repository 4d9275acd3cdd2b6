//! Auxiliary extraction and artifact persistence.
//!
//! Every artifact is an independent write. A failure midway leaves the
//! artifacts written so far on disk; re-running the conversion replaces them.

use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::decoder::Decoder;
use crate::error::{ConvertError, Result};
use crate::timeline::{build_time_map, fragments_from_spans};
use crate::types::*;
use crate::writer;

/// Reads every occupied channel in `channels` into an auxiliary stream.
///
/// Each channel gets its own time map from its own fragments.
pub fn extract_auxiliary(
    decoder: &dyn Decoder,
    channels: &[ChannelInfo],
    kind: AuxiliaryKind,
) -> Result<AuxiliaryStream> {
    let mut extracted = Vec::with_capacity(channels.len());

    for channel in channels {
        let read =
            decoder.read_channel_samples(channel.vendor_channel_number, Some(&channel.name))?;
        if read.values.is_empty() {
            return Err(ConvertError::ChannelReadFailure {
                channel: channel.name.clone(),
                reason: "decoder returned no samples".to_string(),
            });
        }

        let fragments = fragments_from_spans(&read.fragments, read.sample_rate);
        let time_map = build_time_map(&fragments)?;
        if time_map.len() != read.values.len() {
            return Err(ConvertError::MalformedFragmentSequence {
                index: fragments.len().saturating_sub(1),
                reason: format!(
                    "fragments of {} cover {} samples but {} were read",
                    channel.name,
                    time_map.len(),
                    read.values.len()
                ),
            });
        }

        log::debug!(
            "Extracted {:?} channel {} ({} samples in {} fragments)",
            kind,
            channel.name,
            read.values.len(),
            fragments.len()
        );

        extracted.push(AuxiliaryChannel {
            vendor_channel_number: channel.vendor_channel_number,
            name: channel.name.clone(),
            sample_rate: read.sample_rate,
            values: read.values,
            time_map,
        });
    }

    log::info!("Extracted {} {:?} channels", extracted.len(), kind);

    Ok(AuxiliaryStream {
        kind,
        channels: extracted,
    })
}

/// Strobed events from `event_channel` plus start/stop markers.
pub fn read_event_log(decoder: &dyn Decoder, event_channel: &str) -> Result<EventLog> {
    let events = EventLog {
        strobed: decoder.read_digital_events(event_channel)?,
        start_markers: decoder.read_start_stop_markers(MarkerKind::Start)?,
        stop_markers: decoder.read_start_stop_markers(MarkerKind::Stop)?,
    };

    log::info!(
        "Read {} strobed events, {} start and {} stop markers",
        events.strobed.len(),
        events.start_markers.len(),
        events.stop_markers.len()
    );

    Ok(events)
}

/// Paths of the artifacts one run writes into its output folder.
#[derive(Debug, Clone)]
pub struct Packager {
    folder: PathBuf,
    dataset_name: String,
}

impl Packager {
    pub fn new<P: AsRef<Path>>(folder: P, dataset_name: &str) -> Self {
        Self {
            folder: folder.as_ref().to_path_buf(),
            dataset_name: dataset_name.to_string(),
        }
    }

    pub fn folder(&self) -> &Path {
        &self.folder
    }

    /// Raw sample matrix, `<dataset>.dat`.
    pub fn dat_path(&self) -> PathBuf {
        self.folder.join(format!("{}.dat", self.dataset_name))
    }

    pub fn metadata_path(&self) -> PathBuf {
        self.artifact("meta.json")
    }

    pub fn time_map_path(&self) -> PathBuf {
        self.artifact("time.f64")
    }

    pub fn events_path(&self) -> PathBuf {
        self.artifact("events.json")
    }

    pub fn auxiliary_path(&self, kind: AuxiliaryKind) -> PathBuf {
        match kind {
            AuxiliaryKind::AnalogInput => self.artifact("ai.json"),
            AuxiliaryKind::Lfp => self.artifact("lfp.json"),
        }
    }

    pub fn artifact_report_path(&self) -> PathBuf {
        self.artifact("artifacts.json")
    }

    pub fn probe_summary_path(&self) -> PathBuf {
        self.artifact("probe.json")
    }

    pub fn write_metadata(&self, metadata: &RunMetadata) -> Result<()> {
        write_json(&self.metadata_path(), metadata)
    }

    pub fn write_time_map(&self, time_map: &TimeMap) -> Result<()> {
        writer::write_time_map(self.time_map_path(), time_map)
    }

    pub fn write_events(&self, events: &EventLog) -> Result<()> {
        write_json(&self.events_path(), events)
    }

    pub fn write_auxiliary(&self, stream: &AuxiliaryStream) -> Result<()> {
        write_json(&self.auxiliary_path(stream.kind), stream)
    }

    pub fn write_artifact_report(&self, report: &ArtifactReport) -> Result<()> {
        write_json(&self.artifact_report_path(), report)
    }

    pub fn write_probe_summary(&self, summary: &[ProbeVoltage]) -> Result<()> {
        write_json(&self.probe_summary_path(), summary)
    }

    fn artifact(&self, suffix: &str) -> PathBuf {
        self.folder.join(format!("{}_{}", self.dataset_name, suffix))
    }
}

fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)?;
    writer.flush()?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}
