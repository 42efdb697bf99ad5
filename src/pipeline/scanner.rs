// Cooperative scan loop
//
// Polls the feed source on a fixed tick, runs every visible item through the
// orchestrator and hands changed decisions to the sink. A slower tick sweeps
// expired alternative cache entries. Shutdown drains pending refinements.

use super::{InterventionDecision, Orchestrator};
use crate::error::{Result, ZenfeedError};
use crate::feed::{ItemId, RawFeedItem};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time;

/// Where visible feed items come from
#[async_trait]
pub trait FeedSource: Send {
    /// Items currently visible. `None` once the source is exhausted.
    async fn visible_items(&mut self) -> Result<Option<Vec<RawFeedItem>>>;
}

/// Where decisions are rendered
pub trait DecisionSink: Send {
    fn render(&mut self, decision: &InterventionDecision);
}

/// Recorded scan frames, one JSON array of raw items per line
pub struct ReplayFeedSource {
    frames: VecDeque<Vec<RawFeedItem>>,
}

impl ReplayFeedSource {
    pub fn from_frames(frames: Vec<Vec<RawFeedItem>>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn open(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| ZenfeedError::Io {
            source: e,
            context: format!("Failed to read scan frames: {:?}", path),
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let mut frames = VecDeque::new();
        for (index, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: Vec<RawFeedItem> =
                serde_json::from_str(line).map_err(|e| ZenfeedError::Json {
                    source: e,
                    context: format!("Invalid scan frame on line {}", index + 1),
                })?;
            frames.push_back(frame);
        }
        Ok(Self { frames })
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

#[async_trait]
impl FeedSource for ReplayFeedSource {
    async fn visible_items(&mut self) -> Result<Option<Vec<RawFeedItem>>> {
        Ok(self.frames.pop_front())
    }
}

/// Logs each decision
#[derive(Debug, Default)]
pub struct LogSink;

impl DecisionSink for LogSink {
    fn render(&mut self, decision: &InterventionDecision) {
        tracing::info!("{:?} on {}", decision.action, decision.item_id);
    }
}

/// Keeps every rendered decision, shareable with the caller
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    decisions: Arc<Mutex<Vec<InterventionDecision>>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decisions(&self) -> Vec<InterventionDecision> {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl DecisionSink for RecordingSink {
    fn render(&mut self, decision: &InterventionDecision) {
        self.decisions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(decision.clone());
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub frames: usize,
    pub items: usize,
    pub rendered: usize,
    pub swept: usize,
}

pub struct Scanner {
    orchestrator: Arc<Orchestrator>,
    interval: Duration,
    sweep_interval: Duration,
}

impl Scanner {
    pub fn new(orchestrator: Arc<Orchestrator>, interval: Duration, sweep_interval: Duration) -> Self {
        Self {
            orchestrator,
            interval,
            sweep_interval,
        }
    }

    /// Scan until the source is exhausted or shutdown is signalled
    pub async fn run<S, D>(
        &self,
        mut source: S,
        mut sink: D,
        mut shutdown: watch::Receiver<bool>,
    ) -> ScanReport
    where
        S: FeedSource,
        D: DecisionSink,
    {
        let mut scan_timer = time::interval(self.interval);
        let mut sweep_timer = time::interval(self.sweep_interval);
        // the first tick of an interval fires immediately
        sweep_timer.tick().await;

        let mut rendered: HashMap<ItemId, InterventionDecision> = HashMap::new();
        let mut report = ScanReport::default();

        loop {
            tokio::select! {
                _ = scan_timer.tick() => {
                    match source.visible_items().await {
                        Ok(Some(items)) => {
                            report.frames += 1;
                            report.items += items.len();
                            report.rendered += self.scan_frame(&items, &mut sink, &mut rendered).await;
                        }
                        Ok(None) => {
                            tracing::info!("Feed source exhausted");
                            break;
                        }
                        Err(e) => tracing::warn!("Failed to read feed: {}", e),
                    }
                }

                _ = sweep_timer.tick() => {
                    let swept = self.orchestrator.context().alternatives().sweep();
                    if swept > 0 {
                        tracing::debug!("Swept {} expired alternatives", swept);
                    }
                    report.swept += swept;
                }

                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        tracing::info!("Scanner shutting down");
                        break;
                    }
                }
            }
        }

        self.orchestrator.drain().await;
        tracing::info!(
            "Scanner finished: {} frames, {} items, {} decisions rendered",
            report.frames,
            report.items,
            report.rendered
        );
        report
    }

    async fn scan_frame<D: DecisionSink>(
        &self,
        items: &[RawFeedItem],
        sink: &mut D,
        rendered: &mut HashMap<ItemId, InterventionDecision>,
    ) -> usize {
        let mut count = 0;
        for raw in items {
            let decision = self.orchestrator.process(raw).await;
            if !decision.is_intervention() {
                // withdraw an intervention a refinement overturned
                if rendered.remove(&decision.item_id).is_some() {
                    sink.render(&decision);
                    count += 1;
                }
                continue;
            }
            if rendered.get(&decision.item_id) == Some(&decision) {
                continue;
            }
            sink.render(&decision);
            rendered.insert(decision.item_id.clone(), decision);
            count += 1;
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frames() {
        let content = r#"[{"title": "A", "durationText": "0:30"}]

[{"title": "B"}, {"title": "C", "durationSeconds": 1800}]
"#;
        let source = ReplayFeedSource::parse(content).unwrap();
        assert_eq!(source.remaining(), 2);
    }

    #[test]
    fn test_parse_reports_line() {
        let err = ReplayFeedSource::parse("[]\n{oops").err().unwrap();
        assert!(err.to_string().contains("line 2"));
    }

    #[test]
    fn test_recording_sink_shares_state() {
        let sink = RecordingSink::new();
        let mut writer = sink.clone();
        writer.render(&InterventionDecision::blur("x".to_string()));
        assert_eq!(sink.decisions().len(), 1);
    }
}
