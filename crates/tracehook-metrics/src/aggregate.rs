//! Session metrics aggregation.
//!
//! The summary is a pure function of the event log: every run reads the
//! whole log and replaces `metrics.json`, so running twice over the same log
//! differs only in `aggregated_at`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use tracehook_core::{time, Event, MetricsSummary, SessionId};
use tracehook_session::store::Result;
use tracehook_session::{SessionSelector, SessionStore};

/// Compute the summary of a session's events.
pub fn summarize(session_id: &str, events: &[Event], aggregated_at: DateTime<Utc>) -> MetricsSummary {
    let mut agents_by_type: BTreeMap<String, u64> = BTreeMap::new();
    let mut models_used: BTreeMap<String, u64> = BTreeMap::new();

    for spawn in events.iter().filter_map(Event::agent_spawn) {
        *agents_by_type.entry(spawn.agent_type.clone()).or_insert(0) += 1;
        *models_used.entry(spawn.model.clone()).or_insert(0) += 1;
    }

    MetricsSummary {
        session_id: session_id.to_string(),
        aggregated_at,
        total_events: events.len() as u64,
        total_agents_spawned: agents_by_type.values().sum(),
        agents_by_type,
        models_used,
        first_event: events.first().and_then(|e| e.timestamp),
        last_event: events.last().and_then(|e| e.timestamp),
    }
}

/// Reads session logs and persists their summaries.
pub struct MetricsAggregator<S: SessionStore> {
    store: S,
    selector: SessionSelector,
}

impl<S: SessionStore> MetricsAggregator<S> {
    pub fn new(store: S, selector: SessionSelector) -> Self {
        Self { store, selector }
    }

    /// Get a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Aggregate the current session.
    ///
    /// Returns `None` without writing anything when there is no session or
    /// the session has no decodable events.
    pub async fn aggregate_current(&self) -> Result<Option<MetricsSummary>> {
        match self.selector.current(&self.store).await? {
            Some(entry) => self.aggregate_session(&entry.id).await,
            None => {
                tracing::debug!(root = %self.store.root().display(), "No sessions to aggregate");
                Ok(None)
            }
        }
    }

    /// Aggregate one session by id.
    pub async fn aggregate_session(&self, id: &SessionId) -> Result<Option<MetricsSummary>> {
        if !self.store.exists(id).await? {
            tracing::debug!(session = %id, "Session directory missing, nothing to aggregate");
            return Ok(None);
        }

        let log = self.store.read_events(id).await?;
        if log.skipped > 0 {
            tracing::warn!(session = %id, skipped = log.skipped, "Skipped malformed event lines");
        }
        if log.is_empty() {
            tracing::debug!(session = %id, "No events, leaving summary untouched");
            return Ok(None);
        }

        let summary = summarize(id.as_str(), &log.events, time::now());
        self.store.write_summary(id, &summary).await?;

        tracing::debug!(
            session = %id,
            events = summary.total_events,
            agents = summary.total_agents_spawned,
            "Wrote metrics summary"
        );

        Ok(Some(summary))
    }

    /// Aggregate `session` (or the current one) without ever failing.
    pub async fn aggregate_silently(&self, session: Option<&SessionId>) -> Option<MetricsSummary> {
        let result = match session {
            Some(id) => self.aggregate_session(id).await,
            None => self.aggregate_current().await,
        };

        match result {
            Ok(summary) => summary,
            Err(e) => {
                tracing::warn!(error = %e, "Metrics aggregation failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;
    use tempfile::TempDir;
    use tracehook_core::{AgentSpawn, EventKind};
    use tracehook_session::store::{FileSessionStore, METRICS_FILE};

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 17, 9, minute, 0).unwrap()
    }

    fn spawn(agent: &str, model: &str, minute: u32) -> Event {
        Event {
            kind: EventKind::AgentSpawned(AgentSpawn {
                agent_type: agent.to_string(),
                description: String::new(),
                model: model.to_string(),
                run_in_background: false,
            }),
            timestamp: Some(at(minute)),
            session_id: "sess_1".to_string(),
        }
    }

    fn aggregator(tmp: &TempDir) -> MetricsAggregator<FileSessionStore> {
        MetricsAggregator::new(
            FileSessionStore::new(tmp.path()),
            SessionSelector::new("sess_", ""),
        )
    }

    #[test]
    fn test_three_agent_scenario() {
        let events = vec![
            spawn("mobile-ui-specialist", "sonnet", 1),
            spawn("mobile-ui-specialist", "sonnet", 2),
            spawn("backend-integration-specialist", "sonnet", 3),
        ];
        let summary = summarize("sess_1", &events, at(10));

        assert_eq!(summary.total_events, 3);
        assert_eq!(summary.total_agents_spawned, 3);
        assert_eq!(summary.agents_by_type.get("mobile-ui-specialist"), Some(&2));
        assert_eq!(summary.agents_by_type.get("backend-integration-specialist"), Some(&1));
        assert_eq!(summary.agents_by_type.len(), 2);
        assert_eq!(summary.models_used, BTreeMap::from([("sonnet".to_string(), 3)]));
        assert_eq!(summary.first_event, Some(at(1)));
        assert_eq!(summary.last_event, Some(at(3)));
    }

    #[test]
    fn test_sum_invariant_with_unknown_events() {
        let mut events = vec![
            spawn("a", "opus", 1),
            spawn("b", "sonnet", 2),
            spawn("a", "default", 3),
        ];
        events.insert(
            1,
            Event {
                kind: EventKind::Unknown {
                    kind: "agent_finished".to_string(),
                    data: None,
                },
                timestamp: None,
                session_id: "sess_1".to_string(),
            },
        );
        let summary = summarize("sess_1", &events, at(10));

        let spawned = events.iter().filter(|e| e.agent_spawn().is_some()).count() as u64;
        assert_eq!(summary.total_events, 4);
        assert_eq!(summary.total_agents_spawned, spawned);
        assert_eq!(summary.agents_by_type.values().sum::<u64>(), spawned);
        assert_eq!(summary.models_used.values().sum::<u64>(), spawned);
    }

    #[test]
    fn test_boundary_timestamps_follow_first_and_last_lines() {
        let mut events = vec![spawn("a", "m", 4), spawn("b", "m", 2)];
        events[1].timestamp = None;
        let summary = summarize("sess_1", &events, at(10));
        assert_eq!(summary.first_event, Some(at(4)));
        assert_eq!(summary.last_event, None);

        let empty = summarize("sess_1", &[], at(10));
        assert_eq!(empty.total_agents_spawned, 0);
        assert!(empty.first_event.is_none());
    }

    #[tokio::test]
    async fn test_empty_session_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let agg = aggregator(&tmp);
        fs::create_dir_all(tmp.path().join("sess_1")).unwrap();

        assert!(agg.aggregate_current().await.unwrap().is_none());
        assert!(!tmp.path().join("sess_1").join(METRICS_FILE).exists());

        fs::write(tmp.path().join("sess_1").join("events.jsonl"), "\n{broken\n").unwrap();
        assert!(agg.aggregate_current().await.unwrap().is_none());
        assert!(!tmp.path().join("sess_1").join(METRICS_FILE).exists());
    }

    #[tokio::test]
    async fn test_missing_root_is_not_an_error() {
        let tmp = TempDir::new().unwrap();
        let agg = MetricsAggregator::new(
            FileSessionStore::new(tmp.path().join("nope")),
            SessionSelector::new("sess_", ""),
        );
        assert!(agg.aggregate_current().await.unwrap().is_none());
        assert!(agg.aggregate_silently(None).await.is_none());

        let id = SessionId::parse("sess_missing").unwrap();
        assert!(agg.aggregate_session(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_line_among_valid_lines() {
        let tmp = TempDir::new().unwrap();
        let agg = aggregator(&tmp);
        let id = SessionId::parse("sess_1").unwrap();

        for (i, agent) in ["a", "b", "c"].iter().enumerate() {
            agg.store().append_event(&id, &spawn(agent, "sonnet", i as u32)).await.unwrap();
        }
        let log_path = tmp.path().join("sess_1").join("events.jsonl");
        let mut raw = fs::read_to_string(&log_path).unwrap();
        raw.push_str("{\"event\":\"agent_spawned\",\n");
        fs::write(&log_path, raw).unwrap();
        agg.store().append_event(&id, &spawn("d", "sonnet", 9)).await.unwrap();

        let summary = agg.aggregate_session(&id).await.unwrap().unwrap();
        assert_eq!(summary.total_events, 4);
        assert_eq!(summary.total_agents_spawned, 4);
        assert_eq!(summary.last_event, Some(at(9)));
    }

    #[tokio::test]
    async fn test_untagged_line_counts_as_event() {
        let tmp = TempDir::new().unwrap();
        let agg = aggregator(&tmp);
        let id = SessionId::parse("sess_1").unwrap();

        fs::create_dir_all(tmp.path().join("sess_1")).unwrap();
        fs::write(
            tmp.path().join("sess_1").join("events.jsonl"),
            "{\"note\":\"x\",\"timestamp\":\"2026-10-17T08:00:00.000Z\"}\n",
        )
        .unwrap();
        agg.store().append_event(&id, &spawn("a", "sonnet", 0)).await.unwrap();

        let summary = agg.aggregate_session(&id).await.unwrap().unwrap();
        assert_eq!(summary.total_events, 2);
        assert_eq!(summary.total_agents_spawned, 1);
        assert_eq!(summary.first_event, Some(Utc.with_ymd_and_hms(2026, 10, 17, 8, 0, 0).unwrap()));
        assert_eq!(summary.last_event, Some(at(0)));
    }

    #[tokio::test]
    async fn test_rerun_differs_only_in_aggregated_at() {
        let tmp = TempDir::new().unwrap();
        let agg = aggregator(&tmp);
        let id = SessionId::parse("sess_1").unwrap();
        agg.store().append_event(&id, &spawn("a", "sonnet", 1)).await.unwrap();
        agg.store().append_event(&id, &spawn("b", "opus", 2)).await.unwrap();

        let path = tmp.path().join("sess_1").join(METRICS_FILE);
        let strip = |raw: String| {
            let mut value: serde_json::Value = serde_json::from_str(&raw).unwrap();
            value.as_object_mut().unwrap().remove("aggregated_at");
            serde_json::to_string(&value).unwrap()
        };

        agg.aggregate_current().await.unwrap().unwrap();
        let first = strip(fs::read_to_string(&path).unwrap());
        agg.aggregate_current().await.unwrap().unwrap();
        let second = strip(fs::read_to_string(&path).unwrap());
        assert_eq!(first, second);

        let stored = agg.store().read_summary(&id).await.unwrap().unwrap();
        assert_eq!(stored.total_agents_spawned, 2);
    }
}
