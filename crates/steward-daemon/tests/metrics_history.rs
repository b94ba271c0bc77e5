//! Metric sample storage: retention pruning and windowed history reads.

mod common;

use chrono::{Duration, Utc};
use common::auth_user;
use steward_core::rbac::Role;
use steward_daemon::metrics;
use steward_daemon::store::{MetricSample, Store};

fn sample_at(ts: i64) -> MetricSample {
    MetricSample {
        ts,
        cpu: 12.5,
        memory: 40.0,
    }
}

#[test]
fn samples_outside_retention_are_pruned_on_write() {
    let store = Store::open_in_memory().unwrap();
    let now = Utc::now();

    let stale = (now - Duration::hours(25)).timestamp_millis();
    let fresh = (now - Duration::hours(1)).timestamp_millis();
    store.insert_metric_sample(&sample_at(stale), now).unwrap();
    store.insert_metric_sample(&sample_at(fresh), now).unwrap();

    let all = store.metric_samples_since(0).unwrap();
    let timestamps: Vec<_> = all.iter().map(|s| s.ts).collect();
    assert_eq!(timestamps, vec![fresh]);
}

#[test]
fn history_is_windowed_clamped_and_ascending() {
    let store = Store::open_in_memory().unwrap();
    let user = auth_user(Role::Viewer, &[]);
    let now = Utc::now();

    let recent = (now - Duration::minutes(30)).timestamp_millis();
    let older = (now - Duration::hours(3)).timestamp_millis();
    store.insert_metric_sample(&sample_at(older), now).unwrap();
    store.insert_metric_sample(&sample_at(recent), now).unwrap();

    // Default window is two hours: only the recent sample.
    let windowed = metrics::history(&store, &user, None).unwrap();
    assert_eq!(windowed.len(), 1);
    assert_eq!(windowed[0].ts, recent);

    // A wider window picks up both, oldest first.
    let wide = metrics::history(&store, &user, Some(6)).unwrap();
    let timestamps: Vec<_> = wide.iter().map(|s| s.ts).collect();
    assert_eq!(timestamps, vec![older, recent]);

    // Requests past retention are clamped to the 24h maximum; zero falls
    // back to the default.
    metrics::history(&store, &user, Some(500)).unwrap();
    let defaulted = metrics::history(&store, &user, Some(0)).unwrap();
    assert_eq!(defaulted.len(), 1);
}

#[test]
fn every_role_holds_metrics_read() {
    let store = Store::open_in_memory().unwrap();
    for role in [Role::Admin, Role::Operator, Role::Viewer] {
        let user = auth_user(role, &[]);
        assert!(metrics::history(&store, &user, None).is_ok());
    }
}

#[test]
fn read_only_does_not_gate_metric_reads() {
    let store = Store::open_in_memory().unwrap();
    let mut settings = store.settings().unwrap();
    settings.read_only = true;
    store.save_settings(&settings).unwrap();

    let user = auth_user(Role::Viewer, &[]);
    let result = metrics::history(&store, &user, None);
    assert!(result.is_ok(), "reads must pass under read-only: {result:?}");
}

#[test]
fn empty_store_yields_an_empty_window() {
    let store = Store::open_in_memory().unwrap();
    let user = auth_user(Role::Viewer, &[]);
    let samples = metrics::history(&store, &user, Some(24)).unwrap();
    assert!(samples.is_empty());
}
