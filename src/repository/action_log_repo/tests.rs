use super::ActionLogRepository;
use crate::domain::action_log::{ActionLog, ActionType};
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::Connection;
use serde_json::json;
use std::sync::{Arc, Mutex};

fn setup_test_db() -> Arc<Mutex<Connection>> {
    let conn = Connection::open_in_memory().unwrap();
    crate::db::configure_sqlite_connection(&conn).unwrap();
    crate::db::init_schema(&conn).unwrap();
    Arc::new(Mutex::new(conn))
}

fn ts(h: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 4, 5)
        .unwrap()
        .and_hms_opt(h, 0, 0)
        .unwrap()
}

fn make_test_log(action_type: ActionType, block_id: &str, hour: u32) -> ActionLog {
    ActionLog::new(action_type, "grower@farm", ts(hour))
        .for_block("F1", block_id)
        .with_payload(json!({ "to": "planned" }))
}

#[test]
fn test_insert_and_find_by_id() {
    let repo = ActionLogRepository::new(setup_test_db());

    let log = make_test_log(ActionType::Transition, "B1", 8);
    let id = repo.insert(&log).unwrap();
    assert_eq!(id, log.action_id);

    let found = repo.find_by_id(&id).unwrap().unwrap();
    assert_eq!(found.block_id.as_deref(), Some("B1"));
    assert_eq!(found.typed_action(), Some(ActionType::Transition));
    assert_eq!(found.payload_json, Some(json!({ "to": "planned" })));
    assert_eq!(found.action_ts, ts(8));

    assert!(repo.find_by_id("missing").unwrap().is_none());
}

#[test]
fn test_find_by_block_id_newest_first() {
    let repo = ActionLogRepository::new(setup_test_db());
    repo.insert(&make_test_log(ActionType::Transition, "B1", 8)).unwrap();
    repo.insert(&make_test_log(ActionType::RecordHarvest, "B1", 10)).unwrap();
    repo.insert(&make_test_log(ActionType::Transition, "B2", 9)).unwrap();

    let logs = repo.find_by_block_id("B1", 10).unwrap();
    assert_eq!(logs.len(), 2);
    assert_eq!(logs[0].typed_action(), Some(ActionType::RecordHarvest));

    let limited = repo.find_by_block_id("B1", 1).unwrap();
    assert_eq!(limited.len(), 1);
}

#[test]
fn test_find_by_action_type_and_recent() {
    let repo = ActionLogRepository::new(setup_test_db());
    repo.insert(&make_test_log(ActionType::ForceTransition, "B1", 8)).unwrap();
    repo.insert(&make_test_log(ActionType::Transition, "B1", 9)).unwrap();

    let forced = repo
        .find_by_action_type(ActionType::ForceTransition.as_str(), 10)
        .unwrap();
    assert_eq!(forced.len(), 1);

    let recent = repo.find_recent(10).unwrap();
    assert_eq!(recent.len(), 2);
    assert_eq!(recent[0].action_ts, ts(9));
}
