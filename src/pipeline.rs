use chrono::Utc;
use std::fs;
use std::path::Path;
use std::time::Instant;

use crate::assembler::{assemble_sample_matrix, AssembledSignal};
use crate::channels::{channel_table, select_by_prefix, select_channels};
use crate::config::ConvertConfig;
use crate::decoder::DecoderRegistry;
use crate::error::Result;
use crate::package::{extract_auxiliary, read_event_log, Packager};
use crate::postprocess::{common_average_reference, probe_voltage_summary, remove_artifacts};
use crate::progress::{ProgressEvent, ProgressObserver, Stage};
use crate::types::*;
use crate::writer::write_sample_matrix;

/// Runs one conversion from `source` to the configured output folder.
///
/// Validation, format dispatch and channel selection all happen before
/// anything is written, so those failures leave no output behind. Every
/// read from the decoder also completes before the first write.
pub fn run_conversion(
    source: &Path,
    config: &ConvertConfig,
    registry: &DecoderRegistry,
    observer: &mut dyn ProgressObserver,
) -> Result<ConversionOutput> {
    let tic = Instant::now();

    config.validate()?;
    let factory = registry.factory_for(source)?;
    let opened = factory(source)?;
    let decoder = &*opened;

    log::info!(
        "Converting {} ({} format)",
        source.display(),
        decoder.format_name()
    );

    observer.on_event(&ProgressEvent::Stage(Stage::SelectingChannels));
    let listing = decoder.list_continuous_channels()?;
    let sample_counts = decoder.channel_sample_counts()?;
    let selection = select_channels(&listing, &sample_counts, config)?;
    let channels = channel_table(&listing, &sample_counts, &selection);

    let AssembledSignal {
        mut matrix,
        mut time_map,
        sample_rate,
        ..
    } = assemble_sample_matrix(decoder, &selection, observer)?;
    let samples_recorded = matrix.ncols();

    if config.common_average_referencing {
        observer.on_event(&ProgressEvent::Stage(Stage::CommonAverageReferencing));
        common_average_reference(&mut matrix);
    }

    let artifact_report = if config.remove_artifacts {
        observer.on_event(&ProgressEvent::Stage(Stage::RemovingArtifacts));
        let (cleaned, cleaned_times, report) = remove_artifacts(
            &matrix,
            &time_map,
            config.artifact_threshold,
            config.remove_artifacts_visualize,
        )?;
        matrix = cleaned;
        time_map = cleaned_times;
        Some(report)
    } else {
        None
    };

    let events = read_event_log(decoder, &config.event_channel)?;

    if config.extract_ai || config.extract_lfp {
        observer.on_event(&ProgressEvent::Stage(Stage::ExtractingAuxiliary));
    }
    let analog_inputs = if config.extract_ai {
        let ai_channels = select_by_prefix(&listing, &sample_counts, &config.ai_name_prefix);
        Some(extract_auxiliary(
            decoder,
            &ai_channels,
            AuxiliaryKind::AnalogInput,
        )?)
    } else {
        None
    };
    let lfp = if config.extract_lfp {
        let lfp_channels = select_by_prefix(&listing, &sample_counts, &config.lfp_name_prefix);
        Some(extract_auxiliary(decoder, &lfp_channels, AuxiliaryKind::Lfp)?)
    } else {
        None
    };

    let probe_summary = config
        .plot_probe_voltage
        .then(|| probe_voltage_summary(&matrix, &selection));

    let packager = Packager::new(config.resolve_output_folder(source), &dataset_name(source));
    fs::create_dir_all(packager.folder())?;

    observer.on_event(&ProgressEvent::Stage(Stage::WritingBinary));
    let dat_path = packager.dat_path();
    write_sample_matrix(&dat_path, &matrix)?;

    observer.on_event(&ProgressEvent::Stage(Stage::Packaging));
    let metadata = RunMetadata {
        source_path: source.to_path_buf(),
        dataset_name: dataset_name(source),
        format: decoder.format_name().to_string(),
        channels,
        channel_selection: selection,
        options: config.clone(),
        sample_rate,
        samples_recorded,
        samples_retained: matrix.ncols(),
        decoder_index: decoder.file_index(),
        completed_at: Utc::now(),
    };
    packager.write_metadata(&metadata)?;
    packager.write_time_map(&time_map)?;
    packager.write_events(&events)?;
    if let Some(stream) = &analog_inputs {
        packager.write_auxiliary(stream)?;
    }
    if let Some(stream) = &lfp {
        packager.write_auxiliary(stream)?;
    }
    if let Some(report) = &artifact_report {
        if config.remove_artifacts_visualize {
            packager.write_artifact_report(report)?;
        }
    }
    if let Some(summary) = &probe_summary {
        packager.write_probe_summary(summary)?;
    }

    log::info!(
        "Done! Elapsed time: {:.1} seconds",
        tic.elapsed().as_secs_f64()
    );

    Ok(ConversionOutput {
        matrix,
        time_map,
        dat_path,
        metadata,
        events,
        artifact_report,
        analog_inputs,
        lfp,
    })
}

/// Stem shared by every artifact of a run.
fn dataset_name(source: &Path) -> String {
    source
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "recording".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dataset_name_is_the_file_stem() {
        assert_eq!(dataset_name(Path::new("/data/m1_session3.pl2")), "m1_session3");
        assert_eq!(dataset_name(Path::new("/")), "recording");
    }
}
