use crate::common::{TestLadder, worker};

use ladder_common::{AdminCommand, LadderSettings, NoWorkReason};
use ladder_engine::admin::AdHocMatchRequest;
use ladder_engine::entity::arena_match;
use sea_orm::EntityTrait;

#[tokio::test]
async fn disabled_ladder_reports_no_work() {
    let app = TestLadder::spawn_with(LadderSettings {
        enabled: false,
        ..Default::default()
    })
    .await;

    let reason = app.expect_no_work(&worker(1, false)).await;
    assert_eq!(reason, NoWorkReason::LadderDisabled);
}

#[tokio::test]
async fn empty_schedule_reports_no_work() {
    let app = TestLadder::spawn().await;
    let reason = app.expect_no_work(&worker(1, false)).await;
    assert_eq!(reason, NoWorkReason::NoMatchesAvailable);
}

#[tokio::test]
async fn dispatch_generates_a_round_and_hands_out_a_match() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;

    let assignment = app.expect_match(&worker(1, false)).await;

    assert_eq!(assignment.agents.len(), 2);
    assert_eq!(assignment.agents[0].participant_number, 1);
    assert_eq!(assignment.agents[1].participant_number, 2);
    assert_ne!(assignment.agents[0].agent_id, assignment.agents[1].agent_id);
    assert!(!assignment.map.location.is_empty());
    assert_eq!(app.round_count(comp.id).await, 1);

    let started = app.arena_match(assignment.match_id).await;
    assert!(started.started.is_some());
    assert_eq!(started.first_started, started.started);
    assert_eq!(started.assigned_worker_id, Some(worker(1, false).id));
}

#[tokio::test]
async fn paused_competition_is_skipped() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("paused", &[1, 2]).await;
    app.state
        .apply_command(comp.id, AdminCommand::Pause)
        .await
        .unwrap();

    let reason = app.expect_no_work(&worker(1, false)).await;
    assert_eq!(reason, NoWorkReason::NoMatchesAvailable);
    assert_eq!(app.round_count(comp.id).await, 0);
}

#[tokio::test]
async fn competition_without_maps_is_skipped_not_fatal() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.add_agent(3, "gamma");
    app.add_agent(4, "delta");

    let starved = app.open_competition("starved", &[1, 2]).await;
    // Disabling the only map makes round generation fail softly.
    app.maps.disable(starved.id, starved.id * 100 + 1);

    let healthy = app.open_competition("healthy", &[3, 4]).await;

    let assignment = app.expect_match(&worker(1, false)).await;
    let started = app.arena_match(assignment.match_id).await;
    assert_eq!(started.competition_id, Some(healthy.id));
    assert_eq!(app.round_count(starved.id).await, 0);
}

#[tokio::test]
async fn lone_agent_is_not_enough() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    let comp = app.open_competition("lonely", &[1]).await;

    let reason = app.expect_no_work(&worker(1, false)).await;
    assert_eq!(reason, NoWorkReason::NoMatchesAvailable);
    assert_eq!(app.round_count(comp.id).await, 0);
}

#[tokio::test]
async fn reissue_returns_the_same_unfinished_match() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.open_competition("season-1", &[1, 2]).await;

    let w = worker(7, false);
    let first = app.expect_match(&w).await;
    let second = app.expect_match(&w).await;
    assert_eq!(
        first.match_id, second.match_id,
        "a restarted worker gets its own match back"
    );

    // A different worker is not handed someone else's match.
    let other = app.expect_match(&worker(8, false)).await;
    assert_ne!(other.match_id, first.match_id);
}

#[tokio::test]
async fn reissue_can_be_disabled() {
    let app = TestLadder::spawn_with(LadderSettings {
        reissue_unfinished: false,
        ..Default::default()
    })
    .await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.add_agent(3, "gamma");
    app.open_competition("season-1", &[1, 2, 3]).await;

    let w = worker(7, false);
    let first = app.expect_match(&w).await;
    let second = app.expect_match(&w).await;
    assert_ne!(first.match_id, second.match_id);
}

#[tokio::test]
async fn requested_matches_dispatch_before_round_matches() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;

    let requested = app
        .state
        .request_adhoc_match(AdHocMatchRequest {
            agent_1_id: 1,
            agent_2_id: 2,
            map_id: comp.id * 100 + 1,
            competition_id: Some(comp.id),
            requested_by: Some("operator".into()),
        })
        .await
        .unwrap();

    let assignment = app.expect_match(&worker(1, false)).await;
    assert_eq!(assignment.match_id, requested.id);

    let started = app.arena_match(requested.id).await;
    assert!(started.round_id.is_none());
}

#[tokio::test]
async fn untrusted_worker_never_receives_a_trusted_match() {
    let app = TestLadder::spawn().await;
    app.add_trusted_agent(1, "secret");
    app.add_agent(2, "beta");
    app.open_competition("season-1", &[1, 2]).await;

    let reason = app.expect_no_work(&worker(1, false)).await;
    assert_eq!(reason, NoWorkReason::NoMatchesAvailable);

    let assignment = app.expect_match(&worker(2, true)).await;
    let started = app.arena_match(assignment.match_id).await;
    assert!(started.require_trusted);
}

#[tokio::test]
async fn concurrent_dispatch_yields_distinct_matches_and_one_round() {
    let app = TestLadder::spawn_with(LadderSettings {
        max_active_rounds: 1,
        ..Default::default()
    })
    .await;
    for (id, name) in [(1, "a"), (2, "b"), (3, "c"), (4, "d")] {
        app.add_agent(id, name);
    }
    let comp = app.open_competition("season-1", &[1, 2, 3, 4]).await;

    let w1 = worker(1, false);
    let w2 = worker(2, false);
    let (r1, r2) = tokio::join!(app.state.request_match(&w1), app.state.request_match(&w2));

    let a1 = match r1.unwrap() {
        ladder_common::NextMatchReply::Match(a) => a,
        other => panic!("worker 1 got {other:?}"),
    };
    let a2 = match r2.unwrap() {
        ladder_common::NextMatchReply::Match(a) => a,
        other => panic!("worker 2 got {other:?}"),
    };

    assert_ne!(a1.match_id, a2.match_id);
    // The generation race serialized on the competition lock: the loser
    // observed the winner's round instead of creating its own.
    assert_eq!(app.round_count(comp.id).await, 1);
}

#[tokio::test]
async fn a_full_division_round_has_all_pairs() {
    let app = TestLadder::spawn_with(LadderSettings {
        max_active_rounds: 1,
        ..Default::default()
    })
    .await;
    for id in 1..=5 {
        app.add_agent(id, &format!("agent-{id}"));
    }
    let comp = app.open_competition("season-1", &[1, 2, 3, 4, 5]).await;

    // Trigger generation.
    app.expect_match(&worker(1, false)).await;

    let matches = arena_match::Entity::find().all(&app.db).await.unwrap();
    // 5 agents, one division: 5 * 4 / 2 pairs.
    assert_eq!(matches.len(), 10);
    assert!(matches.iter().all(|m| m.competition_id == Some(comp.id)));
}
