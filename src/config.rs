use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{ConvertError, Result};

/// Name of the folder created next to the source when no output folder is given.
pub const DEFAULT_OUTPUT_DIR: &str = "converted";

/// Options recognized by a conversion run.
///
/// Built once (defaults, a JSON file, or CLI flags), validated at the
/// `convert` boundary and then passed read-only to every stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConvertConfig {
    /// Destination folder; `<source dir>/converted` when absent
    pub output_folder: Option<PathBuf>,
    /// Subtract the cross-channel mean from every sample column
    pub common_average_referencing: bool,
    /// Excise high-amplitude artifact columns
    pub remove_artifacts: bool,
    /// Keep and persist the artifact detection series for external plotting
    pub remove_artifacts_visualize: bool,
    /// Explicit vendor channel numbers; heuristic selection when absent
    pub specific_channels: Option<Vec<u32>>,
    /// Compute and persist a per-channel voltage summary
    pub plot_probe_voltage: bool,
    /// Extract LFP channels
    pub extract_lfp: bool,
    /// Extract analog-input channels
    pub extract_ai: bool,
    /// Name substrings marking spike-continuous channels
    pub spike_name_markers: Vec<String>,
    /// Name prefix of analog-input channels
    pub ai_name_prefix: String,
    /// Name prefix of LFP channels
    pub lfp_name_prefix: String,
    /// Event channel holding strobed words
    pub event_channel: String,
    /// Artifact threshold, in standard deviations of the median-absolute series
    pub artifact_threshold: f64,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            output_folder: None,
            common_average_referencing: false,
            remove_artifacts: false,
            remove_artifacts_visualize: false,
            specific_channels: None,
            plot_probe_voltage: false,
            extract_lfp: false,
            extract_ai: false,
            spike_name_markers: vec!["SPKC".to_string(), "WB".to_string()],
            ai_name_prefix: "AI".to_string(),
            lfp_name_prefix: "FP".to_string(),
            event_channel: "Strobed".to_string(),
            artifact_threshold: 3.5,
        }
    }
}

impl ConvertConfig {
    /// Loads a configuration from a JSON file. Missing keys take their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = fs::read_to_string(path.as_ref())?;
        let config: ConvertConfig = serde_json::from_str(&text)?;
        Ok(config)
    }

    /// Checks every option once, so later stages can trust the values.
    pub fn validate(&self) -> Result<()> {
        if let Some(channels) = &self.specific_channels {
            if channels.is_empty() {
                return Err(ConvertError::InvalidConfig(
                    "specific_channels is empty; omit it for heuristic selection".to_string(),
                ));
            }
            let mut seen = HashSet::new();
            for channel in channels {
                if !seen.insert(channel) {
                    return Err(ConvertError::InvalidConfig(format!(
                        "channel {} listed more than once in specific_channels",
                        channel
                    )));
                }
            }
        }

        if self.spike_name_markers.is_empty()
            || self.spike_name_markers.iter().any(|m| m.is_empty())
        {
            return Err(ConvertError::InvalidConfig(
                "spike_name_markers must contain non-empty substrings".to_string(),
            ));
        }

        if self.remove_artifacts_visualize && !self.remove_artifacts {
            return Err(ConvertError::InvalidConfig(
                "remove_artifacts_visualize requires remove_artifacts".to_string(),
            ));
        }

        if self.extract_ai && self.ai_name_prefix.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "ai_name_prefix must not be empty".to_string(),
            ));
        }

        if self.extract_lfp && self.lfp_name_prefix.is_empty() {
            return Err(ConvertError::InvalidConfig(
                "lfp_name_prefix must not be empty".to_string(),
            ));
        }

        if !self.artifact_threshold.is_finite() || self.artifact_threshold <= 0.0 {
            return Err(ConvertError::InvalidConfig(format!(
                "artifact_threshold must be positive, got {}",
                self.artifact_threshold
            )));
        }

        Ok(())
    }

    /// Folder artifacts are written to for `source`.
    pub fn resolve_output_folder(&self, source: &Path) -> PathBuf {
        match &self.output_folder {
            Some(folder) => folder.clone(),
            None => source
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(DEFAULT_OUTPUT_DIR),
        }
    }
}
