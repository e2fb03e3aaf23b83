//! Transition history tracking.
//!
//! Keeps a bounded record of the most recent transitions a machine performed,
//! including which states were exited and entered. Records are plain values
//! and serialize cleanly for diagnostics.

use crate::core::tree::ROOT_NAME;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::time::Duration;

/// Number of records kept when no limit is configured.
pub const DEFAULT_HISTORY_LIMIT: usize = 64;

/// Record of a single completed transition.
///
/// # Example
///
/// ```rust
/// use nestor::core::TransitionRecord;
///
/// let first = TransitionRecord::new(None, "Idle", vec![], vec!["PoweredOn".into(), "Idle".into()]);
/// assert_eq!(first.to_string(), "[*] -> Idle");
///
/// let next = TransitionRecord::new(Some("Idle".into()), "Brewing", vec!["Idle".into()], vec!["Brewing".into()]);
/// assert_eq!(next.to_string(), "Idle -> Brewing");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRecord {
    /// Active leaf before the transition, `None` for the first one
    pub from: Option<String>,
    /// Leaf the machine settled on
    pub to: String,
    /// States exited, innermost first
    pub exited: Vec<String>,
    /// States entered, outermost first
    pub entered: Vec<String>,
    /// When the transition completed
    pub timestamp: DateTime<Utc>,
}

impl TransitionRecord {
    pub fn new(
        from: Option<String>,
        to: impl Into<String>,
        exited: Vec<String>,
        entered: Vec<String>,
    ) -> Self {
        Self {
            from,
            to: to.into(),
            exited,
            entered,
            timestamp: Utc::now(),
        }
    }
}

impl fmt::Display for TransitionRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let from = self.from.as_deref().unwrap_or(ROOT_NAME);
        write!(f, "{from} -> {}", self.to)
    }
}

/// Bounded, ordered history of transitions.
///
/// Once `limit` records are held, recording a new one evicts the oldest.
/// A limit of zero disables recording.
///
/// # Example
///
/// ```rust
/// use nestor::core::{TransitionHistory, TransitionRecord};
///
/// let mut history = TransitionHistory::new(2);
/// history.record(TransitionRecord::new(None, "A", vec![], vec!["A".into()]));
/// history.record(TransitionRecord::new(Some("A".into()), "B", vec!["A".into()], vec!["B".into()]));
/// history.record(TransitionRecord::new(Some("B".into()), "C", vec!["B".into()], vec!["C".into()]));
///
/// assert_eq!(history.len(), 2);
/// assert_eq!(history.get_path(), vec!["A", "B", "C"]);
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransitionHistory {
    records: VecDeque<TransitionRecord>,
    limit: usize,
}

impl Default for TransitionHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_LIMIT)
    }
}

impl TransitionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            records: VecDeque::with_capacity(limit.min(DEFAULT_HISTORY_LIMIT)),
            limit,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Append a record, evicting the oldest one when full.
    pub fn record(&mut self, record: TransitionRecord) {
        if self.limit == 0 {
            return;
        }
        while self.records.len() >= self.limit {
            self.records.pop_front();
        }
        self.records.push_back(record);
    }

    /// Names of the leaves visited, oldest first.
    ///
    /// Starts with the `from` state of the oldest retained record when it has
    /// one, followed by the `to` state of every record.
    pub fn get_path(&self) -> Vec<&str> {
        let mut path = Vec::with_capacity(self.records.len() + 1);
        if let Some(from) = self.records.front().and_then(|r| r.from.as_deref()) {
            path.push(from);
        }
        path.extend(self.records.iter().map(|r| r.to.as_str()));
        path
    }

    /// Time between the oldest and newest retained record.
    pub fn duration(&self) -> Option<Duration> {
        let (first, last) = (self.records.front()?, self.records.back()?);
        last.timestamp
            .signed_duration_since(first.timestamp)
            .to_std()
            .ok()
    }

    pub fn transitions(&self) -> impl Iterator<Item = &TransitionRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TransitionRecord> {
        self.records.back()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(from: Option<&str>, to: &str) -> TransitionRecord {
        TransitionRecord::new(
            from.map(str::to_owned),
            to,
            from.map(|f| vec![f.to_owned()]).unwrap_or_default(),
            vec![to.to_owned()],
        )
    }

    #[test]
    fn new_history_is_empty() {
        let history = TransitionHistory::default();

        assert!(history.is_empty());
        assert!(history.get_path().is_empty());
        assert!(history.duration().is_none());
        assert_eq!(history.limit(), DEFAULT_HISTORY_LIMIT);
    }

    #[test]
    fn get_path_starts_at_first_source() {
        let mut history = TransitionHistory::default();
        history.record(record(Some("Initial"), "Processing"));
        history.record(record(Some("Processing"), "Complete"));

        assert_eq!(history.get_path(), vec!["Initial", "Processing", "Complete"]);
    }

    #[test]
    fn first_transition_has_no_source_in_path() {
        let mut history = TransitionHistory::default();
        history.record(record(None, "Idle"));

        assert_eq!(history.get_path(), vec!["Idle"]);
        assert_eq!(history.last().unwrap().to_string(), "[*] -> Idle");
    }

    #[test]
    fn limit_evicts_oldest_records() {
        let mut history = TransitionHistory::new(2);
        history.record(record(None, "A"));
        history.record(record(Some("A"), "B"));
        history.record(record(Some("B"), "C"));

        assert_eq!(history.len(), 2);
        let targets: Vec<&str> = history.transitions().map(|r| r.to.as_str()).collect();
        assert_eq!(targets, vec!["B", "C"]);
    }

    #[test]
    fn zero_limit_disables_recording() {
        let mut history = TransitionHistory::new(0);
        history.record(record(None, "A"));

        assert!(history.is_empty());
    }

    #[test]
    fn duration_calculates_elapsed_time() {
        let mut history = TransitionHistory::default();
        history.record(record(None, "A"));
        std::thread::sleep(Duration::from_millis(10));
        history.record(record(Some("A"), "B"));

        assert!(history.duration().unwrap() >= Duration::from_millis(10));
    }

    #[test]
    fn history_serializes_correctly() {
        let mut history = TransitionHistory::default();
        history.record(record(Some("Idle"), "Brewing"));

        let json = serde_json::to_string(&history).unwrap();
        let deserialized: TransitionHistory = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized.len(), 1);
        assert_eq!(deserialized.last(), history.last());
    }
}
