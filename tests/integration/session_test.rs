//! Session store capacity and TTL properties

use chrono::{Duration, Utc};
use netdiff::session::SessionStore;
use netdiff::{AnalysisContext, Config};
use tempfile::TempDir;

use crate::helpers::write_device;

#[test]
fn creating_101_sessions_leaves_100_with_first_evicted() {
    let store = SessionStore::new();

    let mut ids = Vec::new();
    for i in 0..101 {
        let session = store.create(&format!("CHG{}", i));
        ids.push(session.session_id.clone());
        store.publish(session);
    }

    let listed = store.list();
    assert_eq!(listed.len(), 100);
    assert!(store.get(&ids[0]).is_none());
    assert!(store.get(&ids[1]).is_some());
    assert!(store.get(&ids[100]).is_some());
}

#[test]
fn expired_sessions_vanish_on_next_create() {
    let store = SessionStore::new();

    let mut old = store.create("CHG1");
    old.created_at = Utc::now() - Duration::minutes(31);
    let old_id = old.session_id.clone();
    store.publish(old);

    // Access does not rescue an expired session.
    assert!(store.get(&old_id).is_some());
    store.publish(store.create("CHG2"));

    assert!(store.get(&old_id).is_none());
    assert_eq!(store.list().len(), 1);
}

#[test]
fn analyzed_sessions_are_reachable_by_change_id() {
    let tmp = TempDir::new().unwrap();
    write_device(
        tmp.path(),
        "R1",
        "command: show version\nold\n",
        "command: show version\nnew\n",
    );

    let ctx = AnalysisContext::new(Config::default());
    let first = ctx.analyze(tmp.path(), None).unwrap();
    let second = ctx.analyze(tmp.path(), None).unwrap();
    assert_ne!(first.session_id, second.session_id);

    let change_id = tmp.path().file_name().unwrap().to_string_lossy();
    let found = ctx.store().get_by_change(&change_id).unwrap();
    assert_eq!(found.session_id, second.session_id);

    assert!(ctx.store().remove(&first.session_id));
    assert_eq!(ctx.store().list().len(), 1);
}
