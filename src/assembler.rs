use ndarray::{Array2, ArrayViewMut1};
use std::time::Instant;

use crate::decoder::Decoder;
use crate::error::{ConvertError, Result};
use crate::progress::{ProgressEvent, ProgressObserver, Stage};
use crate::timeline::{build_time_map, count_time_gaps, fragments_from_spans};
use crate::types::*;

/// Signal channels read into one matrix, plus the primary time map.
#[derive(Debug, Clone)]
pub struct AssembledSignal {
    /// Shape `[selection.len(), n_samples]`
    pub matrix: SampleMatrix,
    /// Built from the first selected channel's fragments
    pub time_map: TimeMap,
    /// Sampling rate of the first selected channel (Hz)
    pub sample_rate: f64,
    /// Fragments of the first selected channel
    pub fragments: Vec<Fragment>,
}

/// Reads every selected channel, in selection order, into row `order` of
/// the sample matrix.
///
/// The first channel fixes the sample count. Any later channel with a
/// different count fails with `MismatchedChannelLength`; empty or constant
/// reads fail with `ChannelReadFailure`. Reads are sequential and never
/// retried.
pub fn assemble_sample_matrix(
    decoder: &dyn Decoder,
    selection: &ChannelSelection,
    observer: &mut dyn ProgressObserver,
) -> Result<AssembledSignal> {
    let tic = Instant::now();
    observer.on_event(&ProgressEvent::Stage(Stage::ReadingChannels));

    let Some(first) = selection.channels.first() else {
        return Err(ConvertError::NoChannelsSelected);
    };
    let total = selection.len();

    let first_label = first.label();
    let first_read = read_checked(decoder, first)?;
    let num_samples = first_read.values.len();

    let fragments = fragments_from_spans(&first_read.fragments, first_read.sample_rate);
    let fragment_total: usize = fragments.iter().map(|f| f.sample_count).sum();
    if fragment_total != num_samples {
        return Err(ConvertError::MalformedFragmentSequence {
            index: fragments.len().saturating_sub(1),
            reason: format!(
                "fragments of {} cover {} samples but {} were read",
                first_label, fragment_total, num_samples
            ),
        });
    }
    let time_map = build_time_map(&fragments)?;
    report_time_gaps(&fragments);

    log::info!(
        "Reading {} channels of {} samples at {:.2} kS/s...",
        total,
        num_samples,
        first_read.sample_rate / 1000.0
    );

    let mut matrix = Array2::<i16>::zeros((total, num_samples));
    fill_row(matrix.row_mut(0), &first_read.values);
    report_channel(observer, 0, total, first_label);

    for channel in selection.channels.iter().skip(1) {
        let label = channel.label();
        let read = read_checked(decoder, channel)?;
        if read.values.len() != num_samples {
            return Err(ConvertError::MismatchedChannelLength {
                channel: label,
                expected: num_samples,
                actual: read.values.len(),
            });
        }
        fill_row(matrix.row_mut(channel.order), &read.values);
        report_channel(observer, channel.order, total, label);
    }

    log::info!(
        "Done! Read {} channels in {:.1} seconds",
        total,
        tic.elapsed().as_secs_f64()
    );

    Ok(AssembledSignal {
        matrix,
        time_map,
        sample_rate: first_read.sample_rate,
        fragments,
    })
}

/// Reads one channel and rejects degenerate results.
fn read_checked(decoder: &dyn Decoder, channel: &SelectedChannel) -> Result<ChannelRead> {
    let read =
        decoder.read_channel_samples(channel.vendor_channel_number, channel.name.as_deref())?;

    if read.values.is_empty() {
        return Err(ConvertError::ChannelReadFailure {
            channel: channel.label(),
            reason: "decoder returned no samples".to_string(),
        });
    }

    if let Some(position) = read.values.iter().position(|v| !v.is_finite()) {
        return Err(ConvertError::ChannelReadFailure {
            channel: channel.label(),
            reason: format!(
                "sample {} is {}, which has no integer value",
                position, read.values[position]
            ),
        });
    }

    let first = read.values[0];
    if read.values.len() > 1 && read.values.iter().all(|&v| v == first) {
        return Err(ConvertError::ChannelReadFailure {
            channel: channel.label(),
            reason: format!(
                "all {} samples equal {}; source region is likely corrupt",
                read.values.len(),
                first
            ),
        });
    }

    Ok(read)
}

/// Rounds to the nearest integer, saturating at the i16 range.
///
/// Non-finite values never get here; `read_checked` rejects them.
fn fill_row(mut row: ArrayViewMut1<i16>, values: &[f64]) {
    for (dst, &value) in row.iter_mut().zip(values) {
        *dst = value.round() as i16;
    }
}

fn report_channel(
    observer: &mut dyn ProgressObserver,
    index: usize,
    total: usize,
    channel: String,
) {
    observer.on_event(&ProgressEvent::ChannelRead {
        index,
        total,
        channel,
        percent: 100.0 * (index + 1) as f64 / total as f64,
    });
}

fn report_time_gaps(fragments: &[Fragment]) {
    let num_gaps = count_time_gaps(fragments);
    if num_gaps == 0 {
        log::info!("No pauses between {} fragments.", fragments.len());
    } else {
        log::warn!(
            "{} pauses between {} fragments found. Time scale will not be uniform!",
            num_gaps,
            fragments.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::select_channels;
    use crate::config::ConvertConfig;
    use crate::progress::NoProgress;
    use crate::recording::Recording;

    fn read(values: Vec<f64>, spans: &[(f64, usize)]) -> ChannelRead {
        ChannelRead {
            values,
            sample_rate: 10.0,
            fragments: spans
                .iter()
                .map(|&(start_time, sample_count)| FragmentSpan {
                    start_time,
                    sample_count,
                })
                .collect(),
        }
    }

    fn selection_for(recording: &Recording) -> ChannelSelection {
        let channels = recording.list_continuous_channels().unwrap();
        let counts = recording.channel_sample_counts().unwrap();
        select_channels(&channels, &counts, &ConvertConfig::default()).unwrap()
    }

    #[test]
    fn fills_rows_in_selection_order() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 3)])))
            .with_channel("SPKC02", 2, Some(read(vec![4.0, 5.4, 5.6], &[(0.0, 3)])));
        let selection = selection_for(&recording);

        let mut events = Vec::new();
        let mut observer = |e: &ProgressEvent| events.push(e.clone());
        let signal = assemble_sample_matrix(&recording, &selection, &mut observer).unwrap();

        assert_eq!(signal.matrix, ndarray::arr2(&[[1i16, 2, 3], [4, 5, 6]]));
        assert_eq!(signal.time_map.len(), 3);
        assert_eq!(signal.sample_rate, 10.0);

        let reads = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ChannelRead { .. }))
            .count();
        assert_eq!(reads, 2);
        assert!(events.contains(&ProgressEvent::ChannelRead {
            index: 1,
            total: 2,
            channel: "SPKC02".to_string(),
            percent: 100.0,
        }));
    }

    #[test]
    fn primary_time_map_follows_first_channel_fragments() {
        let recording = Recording::new().with_channel(
            "SPKC01",
            1,
            Some(read(vec![1.0, 2.0, 3.0, 4.0, 5.0], &[(0.0, 3), (1.0, 2)])),
        );
        let selection = selection_for(&recording);
        let signal = assemble_sample_matrix(&recording, &selection, &mut NoProgress).unwrap();
        assert!((signal.time_map[3] - 1.0).abs() < 1e-12);
        assert!((signal.time_map[4] - 1.1).abs() < 1e-12);
    }

    #[test]
    fn mismatched_length_fails_fast() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 3)])))
            .with_channel("SPKC02", 2, Some(read(vec![1.0, 2.0], &[(0.0, 2)])));
        let selection = selection_for(&recording);

        match assemble_sample_matrix(&recording, &selection, &mut NoProgress) {
            Err(ConvertError::MismatchedChannelLength {
                channel,
                expected,
                actual,
            }) => {
                assert_eq!(channel, "SPKC02");
                assert_eq!(expected, 3);
                assert_eq!(actual, 2);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn constant_read_is_a_channel_failure() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 3)])))
            .with_channel("SPKC02", 2, Some(read(vec![-1.0; 3], &[(0.0, 3)])));
        let selection = selection_for(&recording);

        match assemble_sample_matrix(&recording, &selection, &mut NoProgress) {
            Err(ConvertError::ChannelReadFailure { channel, .. }) => assert_eq!(channel, "SPKC02"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn fragments_must_cover_the_read() {
        let recording = Recording::new().with_channel(
            "SPKC01",
            1,
            Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 2)])),
        );
        let selection = selection_for(&recording);
        assert!(matches!(
            assemble_sample_matrix(&recording, &selection, &mut NoProgress),
            Err(ConvertError::MalformedFragmentSequence { .. })
        ));
    }

    #[test]
    fn non_finite_sample_is_a_channel_failure() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 3)])))
            .with_channel("SPKC02", 2, Some(read(vec![1.0, f64::NAN, 3.0], &[(0.0, 3)])));
        let selection = selection_for(&recording);

        match assemble_sample_matrix(&recording, &selection, &mut NoProgress) {
            Err(ConvertError::ChannelReadFailure { channel, reason }) => {
                assert_eq!(channel, "SPKC02");
                assert!(reason.contains("sample 1"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn unnamed_explicit_channel_reads_by_vendor_number() {
        let recording = Recording::new()
            .with_channel("SPKC01", 1, Some(read(vec![1.0, 2.0, 3.0], &[(0.0, 3)])))
            .with_channel("SPKC02", 2, Some(read(vec![7.0, 8.0, 9.0], &[(0.0, 3)])));
        let selection = ChannelSelection {
            mode: SelectionMode::Explicit,
            channels: vec![SelectedChannel {
                order: 0,
                vendor_channel_number: 2,
                name: None,
            }],
        };

        let signal = assemble_sample_matrix(&recording, &selection, &mut NoProgress).unwrap();
        assert_eq!(signal.matrix.row(0).to_vec(), vec![7, 8, 9]);
    }

    #[test]
    fn values_saturate_at_i16_range() {
        let recording = Recording::new().with_channel(
            "SPKC01",
            1,
            Some(read(vec![1e6, -1e6, 0.4], &[(0.0, 3)])),
        );
        let selection = selection_for(&recording);
        let signal = assemble_sample_matrix(&recording, &selection, &mut NoProgress).unwrap();
        assert_eq!(signal.matrix.row(0).to_vec(), vec![i16::MAX, i16::MIN, 0]);
    }
}
