//! Periodic force-cancel of matches that started but never reported.

use std::collections::HashSet;
use std::time::Duration;

use chrono::Utc;
use ladder_common::{MatchOutcome, ResultSubmission};
use sea_orm::*;
use tracing::{debug, error, info};

use crate::entity::{arena_match, match_result};
use crate::error::LadderError;
use crate::progression;
use crate::state::LadderState;

/// Run the timeout sweep as a background task.
pub async fn run_timeout_sweep(state: LadderState) {
    let scan_interval = Duration::from_secs(state.settings.sweep_interval_secs);

    info!(
        timeout_secs = state.settings.match_timeout_secs,
        scan_interval_secs = state.settings.sweep_interval_secs,
        "Starting match timeout sweep"
    );

    let mut interval = tokio::time::interval(scan_interval);

    loop {
        interval.tick().await;

        if let Err(e) = sweep_once(&state).await {
            error!(error = %e, "Timeout sweep scan failed");
        }
    }
}

/// One sweep pass: cancel every match whose started timestamp exceeded the
/// TTL with no result. Each candidate is handled in its own transaction,
/// through the same match-row lock as a normal result, so one bad row never
/// blocks the batch, and a result racing in ahead of the sweep wins.
pub async fn sweep_once(state: &LadderState) -> Result<usize, LadderError> {
    let cutoff = Utc::now() - chrono::Duration::seconds(state.settings.match_timeout_secs as i64);

    let expired_ids: Vec<i32> = arena_match::Entity::find()
        .filter(arena_match::Column::Started.is_not_null())
        .filter(arena_match::Column::Started.lt(cutoff))
        .select_only()
        .column(arena_match::Column::Id)
        .into_tuple()
        .all(&state.db)
        .await?;
    if expired_ids.is_empty() {
        return Ok(0);
    }

    let resulted: HashSet<i32> = match_result::Entity::find()
        .filter(match_result::Column::MatchId.is_in(expired_ids.clone()))
        .select_only()
        .column(match_result::Column::MatchId)
        .into_tuple::<i32>()
        .all(&state.db)
        .await?
        .into_iter()
        .collect();

    let stuck: Vec<i32> = expired_ids
        .into_iter()
        .filter(|id| !resulted.contains(id))
        .collect();
    if stuck.is_empty() {
        return Ok(0);
    }

    info!(count = stuck.len(), "Found timed-out matches");

    let mut cancelled = 0;
    for match_id in stuck {
        let submission = ResultSubmission {
            match_id,
            outcome: MatchOutcome::MatchCancelled,
            replay_blob: None,
            log_blob: None,
        };
        match progression::submit_result(state, submission).await {
            Ok(_) => {
                cancelled += 1;
                info!(match_id, "Timed-out match cancelled");
            }
            Err(LadderError::ResultAlreadyRecorded(_)) => {
                debug!(match_id, "Result arrived before the sweep, skipping");
            }
            Err(e) => {
                error!(match_id, error = %e, "Failed to cancel timed-out match");
            }
        }
    }

    Ok(cancelled)
}
