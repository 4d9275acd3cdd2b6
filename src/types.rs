use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::config::ConvertConfig;

/// Dense sample matrix, shape `[n_channels, n_samples]`, in scaled voltage units.
pub type SampleMatrix = Array2<i16>;

/// Dense per-sample timestamps (seconds), one entry per sample column.
pub type TimeMap = Array1<f64>;

/// A contiguous run of samples within one continuous stream.
///
/// Fragments are contiguous in sample-index space but may be separated
/// by arbitrary gaps in time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Fragment {
    /// Timestamp of the first sample in the fragment (seconds)
    pub start_time: f64,
    /// Number of samples in the fragment
    pub sample_count: usize,
    /// Sampling rate inside the fragment (Hz)
    pub sample_rate: f64,
}

impl Fragment {
    /// Time just past the last sample of the fragment.
    pub fn end_time(&self) -> f64 {
        self.start_time + self.sample_count as f64 / self.sample_rate
    }
}

/// Fragment boundary as reported by a decoder, before a sample rate is attached.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FragmentSpan {
    /// Timestamp of the first sample (seconds)
    pub start_time: f64,
    /// Number of samples in the span
    pub sample_count: usize,
}

/// A continuous channel as listed by a decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Channel name assigned by the acquisition system (e.g. "SPKC01")
    pub name: String,
    /// Channel number in the vendor's numbering
    pub vendor_channel_number: u32,
}

/// A continuous channel together with its occupancy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel number in the vendor's numbering
    pub vendor_id: u32,
    /// Channel name assigned by the acquisition system
    pub name: String,
    /// Whether the channel ended up in the sample matrix
    pub is_selected: bool,
    /// Number of samples the decoder holds for this channel (0 = unused slot)
    pub sample_count: usize,
}

/// Raw result of reading one channel from a decoder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelRead {
    /// Sample values in the decoder's units
    pub values: Vec<f64>,
    /// Per-ADC sampling rate (Hz)
    pub sample_rate: f64,
    /// Fragment boundaries, in recording order
    pub fragments: Vec<FragmentSpan>,
}

/// How the selected channels were chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionMode {
    /// Channel numbers supplied by the caller
    Explicit,
    /// Name markers and non-zero occupancy
    Heuristic,
}

/// One entry of the resolved channel mapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectedChannel {
    /// Row of the sample matrix this channel fills
    pub order: usize,
    /// Channel number in the vendor's numbering
    pub vendor_channel_number: u32,
    /// Channel name, when the decoder lists one for this number
    pub name: Option<String>,
}

impl SelectedChannel {
    /// Name used in diagnostics; `#<number>` when the decoder lists none.
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("#{}", self.vendor_channel_number),
        }
    }
}

/// Ordered set of channels that make up the sample matrix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelSelection {
    pub mode: SelectionMode,
    pub channels: Vec<SelectedChannel>,
}

impl ChannelSelection {
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Vendor channel numbers in selection order.
    pub fn vendor_numbers(&self) -> Vec<u32> {
        self.channels
            .iter()
            .map(|c| c.vendor_channel_number)
            .collect()
    }
}

/// A strobed digital code emitted by task-control equipment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StrobedEvent {
    /// Event time (seconds)
    pub timestamp: f64,
    /// Strobed word value
    pub value: i32,
}

/// Which recording marker to read from a decoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Start,
    Stop,
}

/// Strobed events plus recording start/stop markers, persisted verbatim.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventLog {
    /// Strobed events in recording order
    pub strobed: Vec<StrobedEvent>,
    /// Recording start markers (seconds)
    pub start_markers: Vec<f64>,
    /// Recording stop markers (seconds)
    pub stop_markers: Vec<f64>,
}

/// Kind of auxiliary stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuxiliaryKind {
    /// Analog inputs (e.g. "AI01")
    AnalogInput,
    /// Local field potentials (e.g. "FP01")
    Lfp,
}

/// One auxiliary channel with its own reconstructed time map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryChannel {
    /// Channel number in the vendor's numbering
    pub vendor_channel_number: u32,
    /// Channel name assigned by the acquisition system
    pub name: String,
    /// Native sampling rate (Hz)
    pub sample_rate: f64,
    /// Sample values in the decoder's units
    pub values: Vec<f64>,
    /// Timestamps for `values`, built from this channel's fragments
    pub time_map: TimeMap,
}

/// Analog-input or LFP channels extracted alongside the sample matrix.
///
/// Auxiliary streams keep their native rate and fragmentation and never
/// share the primary time map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryStream {
    pub kind: AuxiliaryKind,
    pub channels: Vec<AuxiliaryChannel>,
}

/// Outcome of artifact removal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactReport {
    /// Number of sample columns before removal
    pub samples_before: usize,
    /// Column indices that were excised, ascending
    pub removed_indices: Vec<usize>,
    /// Standard deviation of the per-column median absolute value
    pub deviation: f64,
    /// Flagging threshold (`multiplier * deviation`)
    pub threshold: f64,
    /// Per-column median absolute values, kept only when requested
    pub median_abs_series: Option<Vec<f64>>,
}

impl ArtifactReport {
    pub fn removed_count(&self) -> usize {
        self.removed_indices.len()
    }

    /// Share of removed samples, in percent.
    pub fn removed_percent(&self) -> f64 {
        if self.samples_before == 0 {
            0.0
        } else {
            100.0 * self.removed_count() as f64 / self.samples_before as f64
        }
    }
}

/// Voltage summary for one matrix row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeVoltage {
    pub vendor_channel_number: u32,
    pub min: i16,
    pub max: i16,
    pub mean: f64,
    pub rms: f64,
}

/// Provenance record written once at the end of a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    /// Recording the run converted
    pub source_path: PathBuf,
    /// Stem used for every persisted artifact
    pub dataset_name: String,
    /// Decoder that read the source
    pub format: String,
    /// Every continuous channel the decoder listed, with occupancy
    pub channels: Vec<Channel>,
    /// Resolved mapping from matrix row to vendor channel
    pub channel_selection: ChannelSelection,
    /// Options the run was invoked with
    pub options: ConvertConfig,
    /// Sampling rate of the primary channels (Hz)
    pub sample_rate: f64,
    /// Sample columns read from the decoder
    pub samples_recorded: usize,
    /// Sample columns left after post-processing
    pub samples_retained: usize,
    /// Decoder-specific index, if the decoder exposes one
    pub decoder_index: Option<serde_json::Value>,
    /// Completion time of the run
    pub completed_at: DateTime<Utc>,
}

/// Everything a conversion run produces.
///
/// # Examples
///
/// ```no_run
/// use ephys_converter::{convert, ConvertConfig, DecoderRegistry};
///
/// let output = convert("session.json", &ConvertConfig::default(), &DecoderRegistry::default()).unwrap();
/// println!("Wrote {} channels to {}", output.num_channels(), output.dat_path.display());
/// println!("Recording duration: {:.2} seconds", output.duration());
/// ```
#[derive(Debug, Clone)]
pub struct ConversionOutput {
    /// Final sample matrix (after any post-processing)
    pub matrix: SampleMatrix,
    /// Primary time map, aligned with `matrix` columns
    pub time_map: TimeMap,
    /// Path of the written `.dat` file
    pub dat_path: PathBuf,
    /// Provenance record
    pub metadata: RunMetadata,
    /// Strobed events and start/stop markers
    pub events: EventLog,
    /// Artifact removal outcome, if removal ran
    pub artifact_report: Option<ArtifactReport>,
    /// Analog-input channels, if requested
    pub analog_inputs: Option<AuxiliaryStream>,
    /// LFP channels, if requested
    pub lfp: Option<AuxiliaryStream>,
}

impl ConversionOutput {
    pub fn num_channels(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn num_samples(&self) -> usize {
        self.matrix.ncols()
    }

    /// Time spanned by the retained samples, in seconds.
    ///
    /// Gaps between fragments are included. Returns 0.0 for an empty matrix.
    pub fn duration(&self) -> f64 {
        let n = self.time_map.len();
        if n == 0 {
            return 0.0;
        }
        self.time_map[n - 1] - self.time_map[0] + 1.0 / self.metadata.sample_rate
    }
}
