mod assembler;
pub mod channels;
pub mod config;
pub mod decoder;
pub mod error;
mod package;
mod pipeline;
pub mod postprocess;
pub mod progress;
pub mod recording;
pub mod timeline;
pub mod types;
pub mod writer;

use std::path::Path;

// Re-export types
pub use assembler::{assemble_sample_matrix, AssembledSignal};
pub use config::ConvertConfig;
pub use decoder::{Decoder, DecoderFactory, DecoderRegistry};
pub use error::{ConvertError, Result};
pub use package::{extract_auxiliary, read_event_log, Packager};
pub use progress::{LogProgress, NoProgress, ProgressEvent, ProgressObserver, Stage};
pub use recording::Recording;
pub use timeline::build_time_map;
pub use types::*;

/// Converts a recording into a flat `.dat` sample file plus its time map,
/// event log, auxiliary tables and run metadata.
///
/// Progress is reported through the `log` facade.
///
/// # Examples
///
/// ```no_run
/// use ephys_converter::{convert, ConvertConfig, DecoderRegistry};
///
/// let config = ConvertConfig {
///     common_average_referencing: true,
///     remove_artifacts: true,
///     ..Default::default()
/// };
/// match convert("path/to/session.json", &config, &DecoderRegistry::default()) {
///     Ok(output) => println!("Wrote {}", output.dat_path.display()),
///     Err(e) => println!("Error converting file: {}", e),
/// }
/// ```
pub fn convert<P: AsRef<Path>>(
    source: P,
    config: &ConvertConfig,
    registry: &DecoderRegistry,
) -> Result<ConversionOutput> {
    pipeline::run_conversion(
        source.as_ref(),
        config,
        registry,
        &mut LogProgress::default(),
    )
}

/// Same as [`convert`], reporting progress to `observer` instead of the log.
pub fn convert_with_progress<P: AsRef<Path>>(
    source: P,
    config: &ConvertConfig,
    registry: &DecoderRegistry,
    observer: &mut dyn ProgressObserver,
) -> Result<ConversionOutput> {
    pipeline::run_conversion(source.as_ref(), config, registry, observer)
}
