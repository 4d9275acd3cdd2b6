//! Progress reporting.
//!
//! Long reads emit [`ProgressEvent`]s to an observer. Observers are purely
//! advisory: nothing in the pipeline depends on whether one is listening.

const PRINT_PROGRESS_STEP: f64 = 10.0;

/// Pipeline stages announced to observers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    SelectingChannels,
    ReadingChannels,
    CommonAverageReferencing,
    RemovingArtifacts,
    WritingBinary,
    ExtractingAuxiliary,
    Packaging,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// A stage started
    Stage(Stage),
    /// One signal channel finished reading
    ChannelRead {
        /// Zero-based position in the selection
        index: usize,
        total: usize,
        channel: String,
        /// Share of channels read so far
        percent: f64,
    },
}

/// Receives progress events.
pub trait ProgressObserver {
    fn on_event(&mut self, event: &ProgressEvent);
}

impl<F> ProgressObserver for F
where
    F: FnMut(&ProgressEvent),
{
    fn on_event(&mut self, event: &ProgressEvent) {
        self(event)
    }
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressObserver for NoProgress {
    fn on_event(&mut self, _event: &ProgressEvent) {}
}

/// Logs stages and channel progress in 10% steps.
#[derive(Debug)]
pub struct LogProgress {
    next_report: f64,
}

impl Default for LogProgress {
    fn default() -> Self {
        Self {
            next_report: PRINT_PROGRESS_STEP,
        }
    }
}

impl ProgressObserver for LogProgress {
    fn on_event(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Stage(stage) => {
                if *stage == Stage::ReadingChannels {
                    self.next_report = PRINT_PROGRESS_STEP;
                }
                log::debug!("Stage: {:?}", stage);
            }
            ProgressEvent::ChannelRead {
                index,
                total,
                channel,
                percent,
            } => {
                log::debug!("Read channel {} ({}/{})", channel, index + 1, total);
                while *percent >= self.next_report {
                    log::info!("{}% done...", self.next_report);
                    self.next_report += PRINT_PROGRESS_STEP;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closures_observe_events() {
        let mut seen = Vec::new();
        {
            let mut observer = |event: &ProgressEvent| seen.push(event.clone());
            observer.on_event(&ProgressEvent::Stage(Stage::WritingBinary));
        }
        assert_eq!(seen, vec![ProgressEvent::Stage(Stage::WritingBinary)]);
    }

    #[test]
    fn log_progress_advances_past_reported_steps() {
        let mut observer = LogProgress::default();
        observer.on_event(&ProgressEvent::ChannelRead {
            index: 0,
            total: 4,
            channel: "SPKC01".to_string(),
            percent: 25.0,
        });
        assert_eq!(observer.next_report, 30.0);

        observer.on_event(&ProgressEvent::Stage(Stage::ReadingChannels));
        assert_eq!(observer.next_report, PRINT_PROGRESS_STEP);
    }
}
