//! Channel selection.
//!
//! Decides which continuous channels become rows of the sample matrix and
//! which ones feed the auxiliary streams.

use std::collections::HashMap;

use crate::config::ConvertConfig;
use crate::error::{ConvertError, Result};
use crate::types::*;

/// Resolves the ordered set of signal channels.
///
/// With `specific_channels` set, those vendor numbers are taken verbatim in
/// the given order. Otherwise a channel is kept when its name contains one
/// of the spike markers AND the decoder holds samples for it.
pub fn select_channels(
    channels: &[ChannelInfo],
    sample_counts: &HashMap<u32, usize>,
    config: &ConvertConfig,
) -> Result<ChannelSelection> {
    let selection = match &config.specific_channels {
        Some(numbers) => ChannelSelection {
            mode: SelectionMode::Explicit,
            channels: numbers
                .iter()
                .enumerate()
                .map(|(order, &number)| SelectedChannel {
                    order,
                    vendor_channel_number: number,
                    name: channel_name(channels, number),
                })
                .collect(),
        },
        None => ChannelSelection {
            mode: SelectionMode::Heuristic,
            channels: channels
                .iter()
                .filter(|c| matches_any_marker(&c.name, &config.spike_name_markers))
                .filter(|c| occupied(c, sample_counts))
                .enumerate()
                .map(|(order, c)| SelectedChannel {
                    order,
                    vendor_channel_number: c.vendor_channel_number,
                    name: Some(c.name.clone()),
                })
                .collect(),
        },
    };

    if selection.is_empty() {
        return Err(ConvertError::NoChannelsSelected);
    }

    log::info!(
        "Selected {} channels ({:?}): {:?}",
        selection.len(),
        selection.mode,
        selection.vendor_numbers()
    );

    Ok(selection)
}

/// Occupied channels whose name starts with `prefix`, in listing order.
pub fn select_by_prefix(
    channels: &[ChannelInfo],
    sample_counts: &HashMap<u32, usize>,
    prefix: &str,
) -> Vec<ChannelInfo> {
    channels
        .iter()
        .filter(|c| c.name.starts_with(prefix))
        .filter(|c| occupied(c, sample_counts))
        .cloned()
        .collect()
}

/// Full channel table with occupancy and selection flags.
pub fn channel_table(
    channels: &[ChannelInfo],
    sample_counts: &HashMap<u32, usize>,
    selection: &ChannelSelection,
) -> Vec<Channel> {
    let selected = selection.vendor_numbers();
    channels
        .iter()
        .map(|c| Channel {
            vendor_id: c.vendor_channel_number,
            name: c.name.clone(),
            is_selected: selected.contains(&c.vendor_channel_number),
            sample_count: sample_counts
                .get(&c.vendor_channel_number)
                .copied()
                .unwrap_or(0),
        })
        .collect()
}

fn matches_any_marker(name: &str, markers: &[String]) -> bool {
    markers.iter().any(|marker| name.contains(marker.as_str()))
}

fn occupied(channel: &ChannelInfo, sample_counts: &HashMap<u32, usize>) -> bool {
    sample_counts
        .get(&channel.vendor_channel_number)
        .is_some_and(|&count| count > 0)
}

fn channel_name(channels: &[ChannelInfo], number: u32) -> Option<String> {
    channels
        .iter()
        .find(|c| c.vendor_channel_number == number)
        .map(|c| c.name.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(entries: &[(&str, u32, usize)]) -> (Vec<ChannelInfo>, HashMap<u32, usize>) {
        let channels = entries
            .iter()
            .map(|&(name, number, _)| ChannelInfo {
                name: name.to_string(),
                vendor_channel_number: number,
            })
            .collect();
        let counts = entries
            .iter()
            .map(|&(_, number, count)| (number, count))
            .collect();
        (channels, counts)
    }

    #[test]
    fn heuristic_requires_name_and_occupancy() {
        let (channels, counts) = listing(&[
            ("SPKC01", 1, 100),
            ("SPKC02", 2, 0),
            ("FP01", 3, 100),
            ("WB01", 4, 100),
            ("AI01", 5, 100),
        ]);

        let selection = select_channels(&channels, &counts, &ConvertConfig::default()).unwrap();
        assert_eq!(selection.mode, SelectionMode::Heuristic);
        assert_eq!(selection.vendor_numbers(), vec![1, 4]);
        assert_eq!(selection.channels[1].order, 1);
        assert_eq!(selection.channels[1].name.as_deref(), Some("WB01"));
    }

    #[test]
    fn markers_are_case_sensitive() {
        let (channels, counts) = listing(&[("spkc01", 1, 100), ("wb02", 2, 100)]);
        assert!(matches!(
            select_channels(&channels, &counts, &ConvertConfig::default()),
            Err(ConvertError::NoChannelsSelected)
        ));
    }

    #[test]
    fn explicit_list_is_taken_verbatim() {
        let (channels, counts) = listing(&[("SPKC01", 1, 100), ("FP01", 3, 0)]);
        let config = ConvertConfig {
            specific_channels: Some(vec![3, 1, 42]),
            ..Default::default()
        };

        let selection = select_channels(&channels, &counts, &config).unwrap();
        assert_eq!(selection.mode, SelectionMode::Explicit);
        assert_eq!(selection.vendor_numbers(), vec![3, 1, 42]);
        assert_eq!(selection.channels[0].label(), "FP01");
        assert_eq!(selection.channels[2].label(), "#42");
    }

    #[test]
    fn empty_selection_fails() {
        let (channels, counts) = listing(&[("SPKC01", 1, 0), ("AI01", 2, 10)]);
        assert!(matches!(
            select_channels(&channels, &counts, &ConvertConfig::default()),
            Err(ConvertError::NoChannelsSelected)
        ));
    }

    #[test]
    fn prefix_selection_skips_unused_slots() {
        let (channels, counts) = listing(&[("AI01", 1, 10), ("AI02", 2, 0), ("FP01", 3, 10)]);
        let ai = select_by_prefix(&channels, &counts, "AI");
        assert_eq!(ai.len(), 1);
        assert_eq!(ai[0].name, "AI01");
    }

    #[test]
    fn table_flags_selected_channels() {
        let (channels, counts) = listing(&[("SPKC01", 1, 10), ("SPKC02", 2, 0)]);
        let selection = select_channels(&channels, &counts, &ConvertConfig::default()).unwrap();
        let table = channel_table(&channels, &counts, &selection);
        assert!(table[0].is_selected);
        assert!(!table[1].is_selected);
        assert_eq!(table[1].sample_count, 0);
    }
}
