//! Fragment-to-timeline reconstruction.

use ndarray::Array1;

use crate::error::{ConvertError, Result};
use crate::types::{Fragment, FragmentSpan, TimeMap};

/// Builds the dense per-sample time map for one stream.
///
/// Sample `k` of fragment `i` is stamped `start_time[i] + k / sample_rate[i]`.
/// Sample offsets accumulate across fragments without gaps; the time axis
/// may jump forward between fragments, never back: a fragment starting
/// more than half a sample period before the previous one ends is rejected.
///
/// # Examples
///
/// ```
/// use ephys_converter::{build_time_map, Fragment};
///
/// let fragments = [
///     Fragment { start_time: 0.0, sample_count: 3, sample_rate: 10.0 },
///     Fragment { start_time: 1.0, sample_count: 2, sample_rate: 10.0 },
/// ];
/// let times = build_time_map(&fragments).unwrap();
/// assert_eq!(times.len(), 5);
/// assert!((times[3] - 1.0).abs() < 1e-12);
/// ```
pub fn build_time_map(fragments: &[Fragment]) -> Result<TimeMap> {
    validate_fragments(fragments)?;

    let total: usize = fragments.iter().map(|f| f.sample_count).sum();
    let mut time_map = Array1::zeros(total);

    let mut offset = 0;
    for fragment in fragments {
        for k in 0..fragment.sample_count {
            time_map[offset + k] = fragment.start_time + k as f64 / fragment.sample_rate;
        }
        offset += fragment.sample_count;
    }

    Ok(time_map)
}

/// Attaches a channel's sampling rate to the spans reported by a decoder.
pub fn fragments_from_spans(spans: &[FragmentSpan], sample_rate: f64) -> Vec<Fragment> {
    spans
        .iter()
        .map(|span| Fragment {
            start_time: span.start_time,
            sample_count: span.sample_count,
            sample_rate,
        })
        .collect()
}

/// Counts fragment boundaries where recording paused.
///
/// A boundary counts as a gap when the next fragment does not start within
/// half a sample period of where the previous one ended.
pub fn count_time_gaps(fragments: &[Fragment]) -> usize {
    fragments
        .windows(2)
        .filter(|pair| {
            let tolerance = 0.5 / pair[0].sample_rate;
            (pair[1].start_time - pair[0].end_time()).abs() > tolerance
        })
        .count()
}

fn validate_fragments(fragments: &[Fragment]) -> Result<()> {
    for (index, fragment) in fragments.iter().enumerate() {
        if fragment.sample_count == 0 {
            return Err(ConvertError::MalformedFragmentSequence {
                index,
                reason: "sample count must be positive".to_string(),
            });
        }
        if !(fragment.sample_rate.is_finite() && fragment.sample_rate > 0.0) {
            return Err(ConvertError::MalformedFragmentSequence {
                index,
                reason: format!("sample rate must be positive, got {}", fragment.sample_rate),
            });
        }
        if !fragment.start_time.is_finite() {
            return Err(ConvertError::MalformedFragmentSequence {
                index,
                reason: format!("start time is not finite: {}", fragment.start_time),
            });
        }
    }

    for (index, pair) in fragments.windows(2).enumerate() {
        let tolerance = 0.5 / pair[0].sample_rate;
        if pair[1].start_time < pair[0].end_time() - tolerance {
            return Err(ConvertError::MalformedFragmentSequence {
                index: index + 1,
                reason: format!(
                    "starts at {} before the previous fragment ends at {}",
                    pair[1].start_time,
                    pair[0].end_time()
                ),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fragment(start_time: f64, sample_count: usize, sample_rate: f64) -> Fragment {
        Fragment {
            start_time,
            sample_count,
            sample_rate,
        }
    }

    fn assert_close(actual: &[f64], expected: &[f64]) {
        assert_eq!(actual.len(), expected.len());
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() < 1e-9, "{} != {}", a, e);
        }
    }

    #[test]
    fn stamps_each_fragment_from_its_own_start() {
        let times = build_time_map(&[fragment(0.0, 3, 10.0), fragment(1.0, 2, 10.0)]).unwrap();
        assert_close(times.as_slice().unwrap(), &[0.0, 0.1, 0.2, 1.0, 1.1]);
    }

    #[test]
    fn fragments_may_use_different_rates() {
        let times = build_time_map(&[fragment(2.0, 2, 4.0), fragment(5.0, 3, 2.0)]).unwrap();
        assert_close(times.as_slice().unwrap(), &[2.0, 2.25, 5.0, 5.5, 6.0]);
    }

    #[test]
    fn empty_sequence_gives_empty_map() {
        assert_eq!(build_time_map(&[]).unwrap().len(), 0);
    }

    #[test]
    fn zero_sample_fragment_is_rejected() {
        let result = build_time_map(&[fragment(0.0, 3, 10.0), fragment(1.0, 0, 10.0)]);
        match result {
            Err(ConvertError::MalformedFragmentSequence { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn sample_times_divide_by_rate() {
        let times = build_time_map(&[fragment(0.0, 5, 10.0)]).unwrap();
        assert_eq!(times[3], 0.3);
    }

    #[test]
    fn fragments_out_of_time_order_are_rejected() {
        let result = build_time_map(&[fragment(5.0, 3, 10.0), fragment(1.0, 2, 10.0)]);
        match result {
            Err(ConvertError::MalformedFragmentSequence { index, .. }) => assert_eq!(index, 1),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn overlapping_fragments_are_rejected() {
        let result = build_time_map(&[
            fragment(0.0, 10, 10.0),
            fragment(1.0, 2, 10.0),
            fragment(0.5, 2, 10.0),
        ]);
        assert!(matches!(
            result,
            Err(ConvertError::MalformedFragmentSequence { index: 2, .. })
        ));
    }

    #[test]
    fn start_within_half_a_period_of_previous_end_is_accepted() {
        let times = build_time_map(&[fragment(0.0, 10, 10.0), fragment(0.98, 2, 10.0)]).unwrap();
        assert_eq!(times.len(), 12);
    }

    #[test]
    fn non_positive_rate_is_rejected() {
        for rate in [0.0, -10.0, f64::NAN] {
            assert!(matches!(
                build_time_map(&[fragment(0.0, 3, rate)]),
                Err(ConvertError::MalformedFragmentSequence { index: 0, .. })
            ));
        }
    }

    #[test]
    fn counts_only_real_pauses() {
        let contiguous = [fragment(0.0, 10, 10.0), fragment(1.0, 5, 10.0)];
        assert_eq!(count_time_gaps(&contiguous), 0);

        let paused = [
            fragment(0.0, 10, 10.0),
            fragment(3.0, 5, 10.0),
            fragment(3.5, 5, 10.0),
        ];
        assert_eq!(count_time_gaps(&paused), 1);
    }

    #[test]
    fn spans_take_channel_rate() {
        let spans = [
            FragmentSpan {
                start_time: 0.0,
                sample_count: 4,
            },
            FragmentSpan {
                start_time: 9.0,
                sample_count: 1,
            },
        ];
        let fragments = fragments_from_spans(&spans, 40000.0);
        assert_eq!(fragments.len(), 2);
        assert!(fragments.iter().all(|f| f.sample_rate == 40000.0));
        assert_eq!(fragments[1].start_time, 9.0);
    }
}
