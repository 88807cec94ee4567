use crate::common::{TestLadder, worker};

use ladder_common::{AdminCommand, CompetitionStatus, MatchOutcome};
use ladder_engine::LadderError;
use ladder_engine::admin::NewCompetition;

#[tokio::test]
async fn competition_defaults_come_from_settings() {
    let app = TestLadder::spawn().await;
    let comp = app
        .state
        .create_competition(NewCompetition {
            name: "defaults".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(comp.status, CompetitionStatus::Created);
    assert_eq!(comp.n_divisions, 1);
    assert_eq!(comp.starting_elo, 1600);
    assert_eq!(comp.n_placements, 10);

    let custom = app
        .state
        .create_competition(NewCompetition {
            name: "custom".into(),
            starting_elo: Some(1200),
            n_placements: Some(3),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(custom.starting_elo, 1200);
    assert_eq!(custom.n_placements, 3);
}

#[tokio::test]
async fn lifecycle_follows_the_state_table() {
    let app = TestLadder::spawn().await;
    let comp = app
        .state
        .create_competition(NewCompetition {
            name: "lifecycle".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(
        app.state
            .apply_command(comp.id, AdminCommand::Open)
            .await
            .unwrap(),
        CompetitionStatus::Open
    );
    assert_eq!(
        app.state
            .apply_command(comp.id, AdminCommand::Pause)
            .await
            .unwrap(),
        CompetitionStatus::Paused
    );

    // Close is only valid from Open.
    let err = app
        .state
        .apply_command(comp.id, AdminCommand::Close)
        .await
        .unwrap_err();
    assert!(matches!(err, LadderError::InvalidTransition(_)));

    assert_eq!(
        app.state
            .apply_command(comp.id, AdminCommand::Open)
            .await
            .unwrap(),
        CompetitionStatus::Open
    );
    // Nothing to drain: Close lands directly on Closed.
    assert_eq!(
        app.state.finalize_competition(comp.id).await.unwrap(),
        CompetitionStatus::Closed
    );
    assert!(
        app.state
            .apply_command(comp.id, AdminCommand::Open)
            .await
            .is_err()
    );
}

#[tokio::test]
async fn enrollment_rejoin_keeps_history() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;

    let assignment = app.expect_match(&worker(1, false)).await;
    app.submit(assignment.match_id, MatchOutcome::Player1Win)
        .await;

    let p1 = app.participant(comp.id, 1).await;
    assert!(p1.active);
    let elo_before = p1.elo;
    assert_ne!(elo_before, 1600);

    app.state.remove_participant(comp.id, 1).await.unwrap();
    assert!(!app.participant(comp.id, 1).await.active);

    app.state.join_competition(comp.id, 1).await.unwrap();
    let rejoined = app.participant(comp.id, 1).await;
    assert!(rejoined.active);
    assert_eq!(rejoined.elo, elo_before);
    assert_eq!(rejoined.match_count, 1);
}

#[tokio::test]
async fn enrollment_requires_a_known_agent_and_an_open_door() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    let comp = app
        .state
        .create_competition(NewCompetition {
            name: "door".into(),
            ..Default::default()
        })
        .await
        .unwrap();

    let err = app.state.join_competition(comp.id, 99).await.unwrap_err();
    assert!(matches!(err, LadderError::AgentNotFound(99)));

    app.state
        .apply_command(comp.id, AdminCommand::Open)
        .await
        .unwrap();
    app.state.finalize_competition(comp.id).await.unwrap();

    let err = app.state.join_competition(comp.id, 1).await.unwrap_err();
    assert!(matches!(err, LadderError::EnrollmentClosed(_, _)));
}

#[tokio::test]
async fn adhoc_requests_validate_their_inputs() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;
    let map_id = comp.id * 100 + 1;

    let err = app
        .state
        .request_adhoc_match(ladder_engine::admin::AdHocMatchRequest {
            agent_1_id: 1,
            agent_2_id: 1,
            map_id,
            competition_id: None,
            requested_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LadderError::InvariantViolation(_)));

    let err = app
        .state
        .request_adhoc_match(ladder_engine::admin::AdHocMatchRequest {
            agent_1_id: 1,
            agent_2_id: 2,
            map_id: 777,
            competition_id: None,
            requested_by: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LadderError::MapNotFound(777)));
}

#[tokio::test]
async fn unscoped_adhoc_match_is_not_rated() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;
    let map_id = comp.id * 100 + 1;

    let requested = app
        .state
        .request_adhoc_match(ladder_engine::admin::AdHocMatchRequest {
            agent_1_id: 1,
            agent_2_id: 2,
            map_id,
            competition_id: None,
            requested_by: Some("curious-user".into()),
        })
        .await
        .unwrap();

    // Unscoped requests dispatch ahead of the competition scan.
    let assignment = app.expect_match(&worker(1, false)).await;
    assert_eq!(assignment.match_id, requested.id);

    let record = app.submit(requested.id, MatchOutcome::Player1Win).await;
    assert!(record.ratings.is_empty());
    assert_eq!(app.participant(comp.id, 1).await.elo, 1600);
}

#[tokio::test]
async fn administrative_cancel_rewrites_the_outcome() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.open_competition("season-1", &[1, 2]).await;

    let assignment = app.expect_match(&worker(1, false)).await;
    let record = app
        .submit(assignment.match_id, MatchOutcome::Player1Win)
        .await;
    assert_eq!(record.outcome, MatchOutcome::Player1Win);

    app.state.cancel_result(assignment.match_id).await.unwrap();

    use ladder_engine::entity::match_result;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};
    let stored = match_result::Entity::find()
        .filter(match_result::Column::MatchId.eq(assignment.match_id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.outcome, MatchOutcome::MatchCancelled);
    assert_eq!(stored.winner_agent_id, None);

    // The stale rating history is the recompute's job to repair.
    let audit = app
        .state
        .recalculate_ratings(
            app.arena_match(assignment.match_id)
                .await
                .competition_id
                .unwrap(),
            false,
        )
        .await
        .unwrap();
    assert!(!audit.is_clean());
}
