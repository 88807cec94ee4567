//! ELO rating computation and the full-history recompute/integrity audit.

use std::collections::HashMap;

use ladder_common::MatchOutcome;
use sea_orm::sea_query::LockType;
use sea_orm::*;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::entity::{
    arena_match, competition, competition_participant, match_participant, match_result,
};
use crate::error::LadderError;
use crate::state::LadderState;

/// Rating change for the first party given its score against the second.
///
/// `score_a` is 1.0 for a win by A, 0.5 for a tie, 0.0 for a loss. The result
/// is rounded to an integer exactly once; the counterparty moves by the exact
/// negation, which keeps every update zero-sum.
pub fn elo_delta(rating_a: i32, rating_b: i32, score_a: f64, k: i32) -> i32 {
    let expected_a = 1.0 / (1.0 + 10f64.powf(f64::from(rating_b - rating_a) / 400.0));
    (f64::from(k) * (score_a - expected_a)).round() as i32
}

/// Rating movement of participant 1 for the given outcome; participant 2
/// moves by the negation. Fails for outcomes that count for rating but define
/// no winner (e.g. an undefined arena-client error).
pub fn delta_for_participant_one(
    elo_1: i32,
    elo_2: i32,
    outcome: MatchOutcome,
    k: i32,
) -> Result<i32, LadderError> {
    let score_1 = if outcome.is_tie() {
        0.5
    } else {
        match outcome.winner_participant() {
            Some(1) => 1.0,
            Some(2) => 0.0,
            _ => return Err(LadderError::NoWinnerMapping(outcome)),
        }
    };
    Ok(elo_delta(elo_1, elo_2, score_1, k))
}

/// One disagreement between stored rating history and a fresh replay.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RatingMismatch {
    /// The match whose stored resultant diverged, or `None` for a
    /// participant's final rating.
    pub match_id: Option<i32>,
    pub agent_id: i32,
    pub stored: Option<i32>,
    pub recomputed: i32,
}

/// Outcome of a full-history recompute.
#[derive(Clone, Debug, Serialize)]
pub struct RatingAudit {
    pub competition_id: i32,
    pub dry_run: bool,
    pub matches_replayed: usize,
    pub mismatches: Vec<RatingMismatch>,
}

impl RatingAudit {
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Replay the competition's entire counted match history from the baseline
/// rating and compare it against the incrementally-maintained values.
///
/// A mismatch is an operator alert, not a hard failure: the audit reports it
/// and, unless `dry_run` is set, the recomputed values are persisted as the
/// new truth.
#[instrument(skip(state))]
pub async fn recalculate_ratings(
    state: &LadderState,
    competition_id: i32,
    dry_run: bool,
) -> Result<RatingAudit, LadderError> {
    let k = state.settings.elo_k;
    let txn = state.db.begin().await?;

    let comp = competition::Entity::find_by_id(competition_id)
        .lock(LockType::Update)
        .one(&txn)
        .await?
        .ok_or(LadderError::CompetitionNotFound(competition_id))?;

    let participants = competition_participant::Entity::find()
        .filter(competition_participant::Column::CompetitionId.eq(competition_id))
        .all(&txn)
        .await?;

    // Everyone restarts from the competition baseline, including participants
    // that were deactivated since: their matches are still in the history.
    let mut replayed_elo: HashMap<i32, i32> = participants
        .iter()
        .map(|p| (p.agent_id, comp.starting_elo))
        .collect();
    let mut replayed_counts: HashMap<i32, i32> = HashMap::new();

    let match_ids: Vec<i32> = arena_match::Entity::find()
        .filter(arena_match::Column::CompetitionId.eq(Some(competition_id)))
        .filter(arena_match::Column::RoundId.is_not_null())
        .select_only()
        .column(arena_match::Column::Id)
        .into_tuple()
        .all(&txn)
        .await?;

    let results = match_result::Entity::find()
        .filter(match_result::Column::MatchId.is_in(match_ids.clone()))
        .order_by_asc(match_result::Column::CreatedAt)
        .order_by_asc(match_result::Column::Id)
        .all(&txn)
        .await?;

    let mut participants_by_match: HashMap<i32, Vec<match_participant::Model>> = HashMap::new();
    for mp in match_participant::Entity::find()
        .filter(match_participant::Column::MatchId.is_in(match_ids))
        .all(&txn)
        .await?
    {
        participants_by_match.entry(mp.match_id).or_default().push(mp);
    }

    let mut mismatches = Vec::new();
    let mut matches_replayed = 0usize;

    for result in &results {
        if !result.outcome.counts_for_rating() {
            continue;
        }
        let mut pair = participants_by_match
            .remove(&result.match_id)
            .unwrap_or_default();
        pair.sort_by_key(|p| p.participant_number);
        if pair.len() != 2 {
            return Err(LadderError::InvariantViolation(format!(
                "match {} has {} participants",
                result.match_id,
                pair.len()
            )));
        }

        let elo_1 = *replayed_elo
            .entry(pair[0].agent_id)
            .or_insert(comp.starting_elo);
        let elo_2 = *replayed_elo
            .entry(pair[1].agent_id)
            .or_insert(comp.starting_elo);
        let delta_1 = delta_for_participant_one(elo_1, elo_2, result.outcome, k)?;

        for (mp, starting, delta) in [(&pair[0], elo_1, delta_1), (&pair[1], elo_2, -delta_1)] {
            let resultant = starting + delta;
            if mp.resultant_elo != Some(resultant) {
                mismatches.push(RatingMismatch {
                    match_id: Some(result.match_id),
                    agent_id: mp.agent_id,
                    stored: mp.resultant_elo,
                    recomputed: resultant,
                });
            }
            if !dry_run {
                let mut active: match_participant::ActiveModel = mp.clone().into();
                active.starting_elo = Set(Some(starting));
                active.elo_delta = Set(Some(delta));
                active.resultant_elo = Set(Some(resultant));
                active.update(&txn).await?;
            }
            replayed_elo.insert(mp.agent_id, resultant);
            *replayed_counts.entry(mp.agent_id).or_insert(0) += 1;
        }
        matches_replayed += 1;
    }

    for p in &participants {
        let recomputed = replayed_elo.get(&p.agent_id).copied().unwrap_or(comp.starting_elo);
        if p.elo != recomputed {
            mismatches.push(RatingMismatch {
                match_id: None,
                agent_id: p.agent_id,
                stored: Some(p.elo),
                recomputed,
            });
        }
        if !dry_run {
            let match_count = replayed_counts.get(&p.agent_id).copied().unwrap_or(0);
            let mut active: competition_participant::ActiveModel = p.clone().into();
            active.elo = Set(recomputed);
            active.match_count = Set(match_count);
            active.in_placement = Set(match_count < comp.n_placements);
            active.update(&txn).await?;
        }
    }

    if dry_run {
        txn.rollback().await?;
    } else {
        txn.commit().await?;
    }

    if mismatches.is_empty() {
        info!(competition_id, matches_replayed, "rating recompute clean");
    } else {
        error!(
            competition_id,
            matches_replayed,
            mismatch_count = mismatches.len(),
            "rating history diverged from replay"
        );
    }

    Ok(RatingAudit {
        competition_id,
        dry_run,
        matches_replayed,
        mismatches,
    })
}
