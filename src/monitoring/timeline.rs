//! Execution Timeline
//!
//! Tracks step start/finish times for run reports and the
//! ASCII timeline printed at debug level.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

/// Final state of a step within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    /// Dispatched and succeeded
    Completed,
    /// Condition resolved to a falsy value
    Skipped,
    /// Failed, but `continue_on_error` kept the run going
    Warned,
    /// Failed and stopped the run
    Failed,
    /// Never started because the run was aborted
    Cancelled,
    /// Resolved during a dry run without dispatching
    Validated,
}

impl StepStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Skipped => "skipped",
            Self::Warned => "warned",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::Validated => "validated",
        }
    }
}

/// Type of timeline event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventType {
    Started,
    Finished(StepStatus),
}

/// A single event in the execution timeline.
#[derive(Debug, Clone)]
pub struct TimelineEvent {
    /// 0-based step position
    pub index: usize,
    pub step: String,
    pub event_type: EventType,
    pub timestamp: Instant,
}

/// Records when each step starts and finishes.
#[derive(Debug, Clone)]
pub struct ExecutionTimeline {
    events: Vec<TimelineEvent>,
    start_time: Instant,
}

impl ExecutionTimeline {
    /// Creates a new timeline starting now.
    pub fn new() -> Self {
        Self {
            events: Vec::new(),
            start_time: Instant::now(),
        }
    }

    /// Records an event for a step now.
    pub fn add_event(&mut self, index: usize, step: impl Into<String>, event_type: EventType) {
        self.add_event_at(index, step, event_type, Instant::now());
    }

    /// Records an event observed at `timestamp`, e.g. by a worker thread.
    pub fn add_event_at(
        &mut self,
        index: usize,
        step: impl Into<String>,
        event_type: EventType,
        timestamp: Instant,
    ) {
        self.events.push(TimelineEvent {
            index,
            step: step.into(),
            event_type,
            timestamp,
        });
    }

    pub fn get_events(&self) -> &[TimelineEvent] {
        &self.events
    }

    /// Returns the total elapsed time since timeline creation.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns durations of steps that both started and finished, by index.
    pub fn durations(&self) -> HashMap<usize, Duration> {
        let mut starts: HashMap<usize, Instant> = HashMap::new();
        let mut durations = HashMap::new();

        for event in &self.events {
            match event.event_type {
                EventType::Started => {
                    starts.insert(event.index, event.timestamp);
                }
                EventType::Finished(_) => {
                    if let Some(start) = starts.get(&event.index) {
                        durations.insert(event.index, event.timestamp.saturating_duration_since(*start));
                    }
                }
            }
        }

        durations
    }

    /// Generates an ASCII Gantt chart, one bar per finished step.
    pub fn gantt_chart(&self) -> String {
        let mut output = String::from("\nExecution Timeline:\n\n");

        let total_time = self.start_time.elapsed().as_millis();
        if total_time == 0 {
            return output;
        }

        // Scale to 50 characters width
        let scale = 50.0 / total_time as f64;

        let mut bars: Vec<(u128, u128, &str)> = Vec::new();
        let mut starts: HashMap<usize, (u128, &str)> = HashMap::new();

        for event in &self.events {
            let elapsed = event
                .timestamp
                .saturating_duration_since(self.start_time)
                .as_millis();

            match event.event_type {
                EventType::Started => {
                    starts.insert(event.index, (elapsed, event.step.as_str()));
                }
                EventType::Finished(_) => {
                    if let Some((start, step)) = starts.remove(&event.index) {
                        bars.push((start, elapsed, step));
                    }
                }
            }
        }

        bars.sort_by_key(|(start, _, _)| *start);

        for (start, end, step) in bars {
            let start_pos = (start as f64 * scale) as usize;
            let width = ((end.saturating_sub(start)) as f64 * scale).max(1.0) as usize;

            let mut bar = " ".repeat(start_pos);
            bar.push_str(&"#".repeat(width));

            output.push_str(&format!(
                "{:12} |{}| ({} ms)\n",
                truncate(step, 12),
                bar,
                end.saturating_sub(start)
            ));
        }

        output.push_str(&format!("\nTotal: {} ms\n", total_time));
        output
    }
}

impl Default for ExecutionTimeline {
    fn default() -> Self {
        Self::new()
    }
}

/// Pads or truncates a label to `max_len` characters.
fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        format!("{:width$}", s, width = max_len)
    } else {
        let head: String = s.chars().take(max_len - 3).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_timeline_creation() {
        let timeline = ExecutionTimeline::new();
        assert!(timeline.get_events().is_empty());
    }

    #[test]
    fn test_durations() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(0, "Convert", EventType::Started);
        thread::sleep(Duration::from_millis(30));
        timeline.add_event(0, "Convert", EventType::Finished(StepStatus::Completed));

        let durations = timeline.durations();
        assert!(durations[&0] >= Duration::from_millis(30));
    }

    #[test]
    fn test_unstarted_steps_have_no_duration() {
        let mut timeline = ExecutionTimeline::new();
        timeline.add_event(2, "Later", EventType::Finished(StepStatus::Cancelled));
        assert!(timeline.durations().is_empty());
    }

    #[test]
    fn test_add_event_at_uses_given_time() {
        let mut timeline = ExecutionTimeline::new();
        let start = Instant::now();
        let end = start + Duration::from_millis(40);
        timeline.add_event_at(1, "Hash", EventType::Started, start);
        timeline.add_event_at(1, "Hash", EventType::Finished(StepStatus::Warned), end);

        assert_eq!(timeline.durations()[&1], Duration::from_millis(40));
        assert_eq!(
            timeline.get_events()[1].event_type,
            EventType::Finished(StepStatus::Warned)
        );
    }

    #[test]
    fn test_gantt_chart_generation() {
        let mut timeline = ExecutionTimeline::new();

        timeline.add_event(0, "step1", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event(0, "step1", EventType::Finished(StepStatus::Completed));
        timeline.add_event(1, "a-very-long-step-name", EventType::Started);
        thread::sleep(Duration::from_millis(20));
        timeline.add_event(1, "a-very-long-step-name", EventType::Finished(StepStatus::Failed));

        let chart = timeline.gantt_chart();
        assert!(chart.contains("step1"));
        assert!(chart.contains("a-very-lo..."));
        assert!(chart.contains("Total:"));
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&StepStatus::Warned).unwrap();
        assert_eq!(json, "\"warned\"");
        assert_eq!(StepStatus::Cancelled.label(), "cancelled");
    }
}
