// ==========================================
// 告警流程集成测试
// ==========================================
// 职责: 验证告警触发/处理/恢复区块状态的完整流程
// ==========================================

#[path = "test_helpers.rs"]
mod test_helpers;

#[cfg(test)]
mod alert_workflow_test {
    use farm_block_lifecycle::api::{
        AlertApi, ApiError, RaiseAlertRequest, ResolveAlertRequest,
    };
    use farm_block_lifecycle::domain::alert::Alert;
    use farm_block_lifecycle::domain::types::{AlertSeverity, BlockState};

    use crate::test_helpers::*;

    fn raise(api: &AlertApi, block_id: &str, severity: AlertSeverity, title: &str, day: u32) -> Alert {
        api.raise_alert(RaiseAlertRequest {
            block_id: block_id.to_string(),
            severity,
            title: title.to_string(),
            actor: OPERATOR.to_string(),
            expected_revision: None,
            raised_at: Some(at(2024, 1, day)),
        })
        .unwrap()
        .alert
    }

    fn resolve_req(alert_id: &str, notes: &str, restore: bool, day: u32) -> ResolveAlertRequest {
        ResolveAlertRequest {
            alert_id: alert_id.to_string(),
            resolution_notes: notes.to_string(),
            restore_block_status: restore,
            actor: OPERATOR.to_string(),
            expected_revision: None,
            resolved_at: Some(at(2024, 1, day)),
        }
    }

    /// growing 区块 (番茄, 2024-01-01 种植)
    fn growing_block(state: &farm_block_lifecycle::app::AppState, code: &str) -> String {
        let api = &state.block_api;
        let b = provision(api, code, 100);
        api.transition_block(transition_req(
            &b.block_id,
            BlockState::Planned,
            farm_block_lifecycle::TransitionPayload {
                target_crop: Some("tomato".into()),
                actual_plant_count: Some(30),
            },
            at(2023, 12, 20),
        ))
        .unwrap();
        go(api, &b.block_id, BlockState::Planted, at(2024, 1, 1));
        go(api, &b.block_id, BlockState::Growing, at(2024, 1, 11));
        b.block_id
    }

    #[test]
    fn test_raise_snapshots_state_without_changing_it() {
        let (_tmp, state) = create_test_state();
        let block_id = growing_block(&state, "B4");
        let before = state.block_api.get_block(&block_id, None).unwrap();

        let resp = state
            .alert_api
            .raise_alert(RaiseAlertRequest {
                block_id: block_id.clone(),
                severity: AlertSeverity::High,
                title: "Pest outbreak".to_string(),
                actor: OPERATOR.to_string(),
                expected_revision: Some(before.revision),
                raised_at: Some(at(2024, 1, 15)),
            })
            .unwrap();

        assert_eq!(resp.alert.pre_block_state, BlockState::Growing);
        assert_eq!(resp.alert.cycle_no, 1);
        assert_eq!(resp.block.state, BlockState::Growing);
        assert_eq!(resp.block.revision, before.revision + 1);

        let view = state.block_api.get_block(&block_id, None).unwrap();
        assert_eq!(view.active_alerts.len(), 1);
        assert_eq!(view.active_alerts[0].title, "Pest outbreak");
    }

    #[test]
    fn test_short_notes_rejected() {
        let (_tmp, state) = create_test_state();
        let block_id = growing_block(&state, "B1");
        let alert = raise(&state.alert_api, &block_id, AlertSeverity::Low, "Leaf spots", 12);

        let err = state
            .alert_api
            .resolve_alert(resolve_req(&alert.alert_id, "ok", false, 13))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));

        let still = state.alert_api.list_alerts(&block_id, false).unwrap();
        assert_eq!(still.len(), 1);
    }

    #[test]
    fn test_unknown_alert_not_found() {
        let (_tmp, state) = create_test_state();
        let err = state
            .alert_api
            .resolve_alert(resolve_req("nope", "Treated with neem oil", true, 13))
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[test]
    fn test_resolve_restores_pre_alert_state() {
        let (_tmp, state) = create_test_state();
        let block_id = growing_block(&state, "B4");
        let alert = raise(&state.alert_api, &block_id, AlertSeverity::High, "Pest outbreak", 15);

        // 告警期间区块被推进
        go(&state.block_api, &block_id, BlockState::Harvesting, at(2024, 1, 16));

        let resp = state
            .alert_api
            .resolve_alert(resolve_req(&alert.alert_id, "Treated with neem oil spray", true, 17))
            .unwrap();
        assert!(resp.block_restored);
        assert_eq!(resp.block.state, BlockState::Growing);
        assert_eq!(resp.alert.resolved_by.as_deref(), Some(OPERATOR));
        assert_eq!(
            resp.alert.resolution_notes.as_deref(),
            Some("Treated with neem oil spray")
        );

        let view = state.block_api.get_block(&block_id, None).unwrap();
        assert!(view.active_alerts.is_empty());
        assert_eq!(view.state, BlockState::Growing);
        let last = view.status_change_history.last().unwrap();
        assert_eq!(last.from_state, BlockState::Harvesting);
        assert_eq!(last.to_state, BlockState::Growing);

        // 已处理告警仍可查询
        let all = state.alert_api.list_alerts(&block_id, true).unwrap();
        assert_eq!(all.len(), 1);
        assert!(!all[0].is_active());
    }

    #[test]
    fn test_restore_never_reverts_into_empty() {
        let (_tmp, state) = create_test_state();
        let api = &state.block_api;
        let b = provision(api, "B7", 100);
        let alert = raise(&state.alert_api, &b.block_id, AlertSeverity::Medium, "Drainage blocked", 2);

        api.transition_block(transition_req(
            &b.block_id,
            BlockState::Planned,
            farm_block_lifecycle::TransitionPayload {
                target_crop: Some("tomato".into()),
                actual_plant_count: Some(30),
            },
            at(2024, 1, 3),
        ))
        .unwrap();

        let resp = state
            .alert_api
            .resolve_alert(resolve_req(&alert.alert_id, "Drain channel cleared", true, 4))
            .unwrap();
        assert!(!resp.block_restored);
        assert!(!resp.alert.is_active());

        let view = api.get_block(&b.block_id, None).unwrap();
        assert_eq!(view.state, BlockState::Planned);
        assert_eq!(view.target_crop.as_deref(), Some("tomato"));
        assert_eq!(view.cycle_no, 1);
        assert_eq!(view.status_change_history.len(), 1);
    }

    #[test]
    fn test_other_active_alert_keeps_state() {
        let (_tmp, state) = create_test_state();
        let block_id = growing_block(&state, "B4");
        let first = raise(&state.alert_api, &block_id, AlertSeverity::High, "Pest outbreak", 15);
        let _second = raise(&state.alert_api, &block_id, AlertSeverity::Medium, "Irrigation leak", 15);

        go(&state.block_api, &block_id, BlockState::Harvesting, at(2024, 1, 16));

        let resp = state
            .alert_api
            .resolve_alert(resolve_req(&first.alert_id, "Treated with neem oil", true, 17))
            .unwrap();
        assert!(!resp.block_restored);
        assert_eq!(resp.block.state, BlockState::Harvesting);

        let view = state.block_api.get_block(&block_id, None).unwrap();
        assert_eq!(view.state, BlockState::Harvesting);
        assert_eq!(view.active_alerts.len(), 1);
        assert_eq!(view.active_alerts[0].title, "Irrigation leak");
    }

    #[test]
    fn test_resolve_twice_rejected() {
        let (_tmp, state) = create_test_state();
        let block_id = growing_block(&state, "B1");
        let alert = raise(&state.alert_api, &block_id, AlertSeverity::Critical, "Frost damage", 12);

        state
            .alert_api
            .resolve_alert(resolve_req(&alert.alert_id, "Covered with frost cloth", false, 13))
            .unwrap();
        let err = state
            .alert_api
            .resolve_alert(resolve_req(&alert.alert_id, "Covered with frost cloth", false, 14))
            .unwrap_err();
        assert!(matches!(err, ApiError::ValidationError(_)));
    }

    #[test]
    fn test_archive_summarizes_cycle_alerts() {
        let (_tmp, state) = create_test_state();
        let api = &state.block_api;
        let b = block_in_harvesting(api, "B1", "lettuce", 10);

        let a1 = state
            .alert_api
            .raise_alert(RaiseAlertRequest {
                block_id: b.block_id.clone(),
                severity: AlertSeverity::Medium,
                title: "Aphids".to_string(),
                actor: OPERATOR.to_string(),
                expected_revision: None,
                raised_at: Some(at(2024, 3, 2)),
            })
            .unwrap()
            .alert;
        state
            .alert_api
            .resolve_alert(ResolveAlertRequest {
                alert_id: a1.alert_id.clone(),
                resolution_notes: "Released ladybugs".to_string(),
                restore_block_status: false,
                actor: OPERATOR.to_string(),
                expected_revision: None,
                resolved_at: Some(at(2024, 3, 3)),
            })
            .unwrap();
        state
            .alert_api
            .raise_alert(RaiseAlertRequest {
                block_id: b.block_id.clone(),
                severity: AlertSeverity::Low,
                title: "Weeds".to_string(),
                actor: OPERATOR.to_string(),
                expected_revision: None,
                raised_at: Some(at(2024, 3, 4)),
            })
            .unwrap();

        go(api, &b.block_id, BlockState::Cleaning, at(2024, 3, 15));
        let reset = go(api, &b.block_id, BlockState::Empty, at(2024, 3, 20));
        assert!(reset.active_alerts.is_empty());
        assert!(state.alert_api.list_alerts(&b.block_id, true).unwrap().is_empty());

        let archive = &state
            .archive_api
            .list_archives(FARM_ID, None, None, None)
            .unwrap()
            .items[0];
        assert_eq!(archive.alerts_summary.total_alerts, 2);
        assert_eq!(archive.alerts_summary.resolved_alerts, 1);
        assert_eq!(archive.alerts_summary.average_resolution_time_hours, 24.0);
    }
}
