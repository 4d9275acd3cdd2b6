//! Decoder contract and format dispatch.
//!
//! Vendor file formats are read by implementations of [`Decoder`]. The
//! pipeline only ever sees this trait; which implementation handles a file
//! is decided by [`DecoderRegistry`] from the file extension.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{ConvertError, Result};
use crate::recording::Recording;
use crate::types::*;

/// Read access to one recording file.
///
/// The source path is bound when the decoder is opened.
pub trait Decoder {
    /// Continuous channels in acquisition order.
    fn list_continuous_channels(&self) -> Result<Vec<ChannelInfo>>;

    /// Number of samples held for each vendor channel number.
    fn channel_sample_counts(&self) -> Result<HashMap<u32, usize>>;

    /// Reads all samples of one continuous channel.
    ///
    /// `name` is `None` when the channel was requested by vendor number
    /// only and the listing has no name for it.
    fn read_channel_samples(
        &self,
        vendor_channel_number: u32,
        name: Option<&str>,
    ) -> Result<ChannelRead>;

    /// Reads the strobed words of an event channel.
    fn read_digital_events(&self, channel: &str) -> Result<Vec<StrobedEvent>>;

    /// Reads recording start or stop markers.
    fn read_start_stop_markers(&self, kind: MarkerKind) -> Result<Vec<f64>>;

    /// Short format name recorded in run metadata (e.g. "PL2").
    fn format_name(&self) -> &str;

    /// Decoder-specific file index, if the format has one.
    fn file_index(&self) -> Option<serde_json::Value> {
        None
    }
}

/// Opens a decoder for a path.
pub type DecoderFactory = fn(&Path) -> Result<Box<dyn Decoder>>;

/// Maps file extensions to decoder factories.
pub struct DecoderRegistry {
    factories: HashMap<String, DecoderFactory>,
}

impl DecoderRegistry {
    /// Registry with no formats registered.
    pub fn empty() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// Registers `factory` for `extension` (case-insensitive, without the dot).
    pub fn register(&mut self, extension: &str, factory: DecoderFactory) {
        self.factories
            .insert(extension.trim_start_matches('.').to_lowercase(), factory);
    }

    pub fn supports(&self, extension: &str) -> bool {
        self.factories.contains_key(&extension.to_lowercase())
    }

    /// Picks the factory for `path`'s extension.
    ///
    /// Fails with `UnsupportedFormat` without touching the file system.
    pub fn factory_for(&self, path: &Path) -> Result<DecoderFactory> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();

        self.factories.get(&extension).copied().ok_or_else(|| {
            ConvertError::UnsupportedFormat(if extension.is_empty() {
                format!("{} has no file extension", path.display())
            } else {
                format!("no decoder registered for .{} files", extension)
            })
        })
    }

    /// Opens a decoder for `path`.
    pub fn open(&self, path: &Path) -> Result<Box<dyn Decoder>> {
        let factory = self.factory_for(path)?;
        factory(path)
    }
}

impl Default for DecoderRegistry {
    /// Registry that understands JSON recording dumps.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry.register("json", open_recording);
        registry
    }
}

fn open_recording(path: &Path) -> Result<Box<dyn Decoder>> {
    Ok(Box::new(Recording::from_json_file(path)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_extension_is_unsupported() {
        let registry = DecoderRegistry::default();
        let result = registry.open(Path::new("/nonexistent/session.xyz"));
        assert!(matches!(result, Err(ConvertError::UnsupportedFormat(_))));
    }

    #[test]
    fn missing_extension_is_unsupported() {
        let registry = DecoderRegistry::default();
        let result = registry.factory_for(Path::new("/nonexistent/session"));
        assert!(matches!(result, Err(ConvertError::UnsupportedFormat(_))));
    }

    #[test]
    fn extensions_match_case_insensitively() {
        let mut registry = DecoderRegistry::empty();
        registry.register(".PL2", open_recording);
        assert!(registry.supports("pl2"));
        assert!(registry.factory_for(Path::new("a/b/rec.Pl2")).is_ok());
        assert!(!registry.supports("plx"));
    }
}
