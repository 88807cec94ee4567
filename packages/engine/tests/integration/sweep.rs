use crate::common::{TestLadder, worker};

use ladder_common::{LadderSettings, MatchOutcome};
use ladder_engine::entity::match_result;
use ladder_engine::{guard, sweep};
use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

fn instant_timeout() -> LadderSettings {
    LadderSettings {
        match_timeout_secs: 0,
        max_active_rounds: 1,
        ..Default::default()
    }
}

#[tokio::test]
async fn sweep_cancels_overdue_matches_and_spares_the_rest() {
    let app = TestLadder::spawn_with(instant_timeout()).await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.add_agent(3, "gamma");
    app.open_competition("season-1", &[1, 2, 3]).await;

    // Two started matches; one already reported.
    let overdue = app.expect_match(&worker(1, false)).await;
    let reported = app.expect_match(&worker(2, false)).await;
    app.submit(reported.match_id, MatchOutcome::Player1Win)
        .await;

    let cancelled = sweep::sweep_once(&app.state).await.unwrap();
    assert_eq!(cancelled, 1);

    let result = match_result::Entity::find()
        .filter(match_result::Column::MatchId.eq(overdue.match_id))
        .one(&app.db)
        .await
        .unwrap()
        .expect("sweep should have produced a result");
    assert_eq!(result.outcome, MatchOutcome::MatchCancelled);
    assert_eq!(result.winner_agent_id, None);

    // The reported match kept its real result.
    let kept = match_result::Entity::find()
        .filter(match_result::Column::MatchId.eq(reported.match_id))
        .one(&app.db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(kept.outcome, MatchOutcome::Player1Win);

    // Unstarted matches are never swept.
    let second_pass = sweep::sweep_once(&app.state).await.unwrap();
    assert_eq!(second_pass, 0);
}

#[tokio::test]
async fn sweep_releases_the_data_blob_hold() {
    let app = TestLadder::spawn_with(instant_timeout()).await;
    app.add_data_agent(1, "alpha");
    app.add_data_agent(2, "beta");
    app.add_data_agent(3, "gamma");
    app.open_competition("season-1", &[1, 2, 3]).await;

    app.expect_match(&worker(1, false)).await;

    // Everything else is blocked on the stuck match's blob holds.
    let blocked = app.expect_no_work(&worker(2, false)).await;
    assert_eq!(blocked, ladder_common::NoWorkReason::NoMatchesAvailable);

    let cancelled = sweep::sweep_once(&app.state).await.unwrap();
    assert_eq!(cancelled, 1);

    // The cancel released both agents; another match can start now.
    let assignment = app.expect_match(&worker(2, false)).await;
    let started = guard::try_start(&app.state, assignment.match_id, &worker(3, false)).await;
    assert!(started.unwrap().is_none(), "already started by worker 2");
}

#[tokio::test]
async fn sweep_completes_a_round_it_empties() {
    let app = TestLadder::spawn_with(instant_timeout()).await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    let comp = app.open_competition("season-1", &[1, 2]).await;

    // Two agents: the round is a single match.
    app.expect_match(&worker(1, false)).await;

    let cancelled = sweep::sweep_once(&app.state).await.unwrap();
    assert_eq!(cancelled, 1);

    let rounds = app.rounds(comp.id).await;
    assert!(rounds[0].complete);
    assert!(rounds[0].finished.is_some());
}

#[tokio::test]
async fn a_generous_ttl_leaves_running_matches_alone() {
    let app = TestLadder::spawn().await;
    app.add_agent(1, "alpha");
    app.add_agent(2, "beta");
    app.open_competition("season-1", &[1, 2]).await;

    app.expect_match(&worker(1, false)).await;

    let cancelled = sweep::sweep_once(&app.state).await.unwrap();
    assert_eq!(cancelled, 0);
}
