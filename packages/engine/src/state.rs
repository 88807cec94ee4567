use std::sync::Arc;

use ladder_common::{
    AdminCommand, CompetitionStatus, LadderSettings, NextMatchReply, ResultRecord,
    ResultSubmission, WorkerContext,
};
use sea_orm::DatabaseConnection;

use crate::admin::{self, AdHocMatchRequest, NewCompetition};
use crate::dispatch;
use crate::entity::{arena_match, competition};
use crate::error::LadderError;
use crate::progression;
use crate::rating::{self, RatingAudit};
use crate::registry::{AgentRegistry, MapRegistry};

/// Shared handle to the engine: the database plus the injected external
/// collaborators and a configuration snapshot.
#[derive(Clone)]
pub struct LadderState {
    pub db: DatabaseConnection,
    pub agents: Arc<dyn AgentRegistry>,
    pub maps: Arc<dyn MapRegistry>,
    pub settings: LadderSettings,
}

impl LadderState {
    pub fn new(
        db: DatabaseConnection,
        agents: Arc<dyn AgentRegistry>,
        maps: Arc<dyn MapRegistry>,
        settings: LadderSettings,
    ) -> Self {
        Self {
            db,
            agents,
            maps,
            settings,
        }
    }

    /// The worker-facing "what should I play next?" call.
    pub async fn request_match(
        &self,
        worker: &WorkerContext,
    ) -> Result<NextMatchReply, LadderError> {
        dispatch::next_match(self, worker).await
    }

    /// The worker-facing outcome report.
    pub async fn submit_result(
        &self,
        submission: ResultSubmission,
    ) -> Result<ResultRecord, LadderError> {
        progression::submit_result(self, submission).await
    }

    /// Full-history rating recompute and integrity audit.
    pub async fn recalculate_ratings(
        &self,
        competition_id: i32,
        dry_run: bool,
    ) -> Result<RatingAudit, LadderError> {
        rating::recalculate_ratings(self, competition_id, dry_run).await
    }

    /// Close a competition: stop generating rounds, drain, then close.
    pub async fn finalize_competition(
        &self,
        competition_id: i32,
    ) -> Result<CompetitionStatus, LadderError> {
        admin::apply_command(self, competition_id, AdminCommand::Close).await
    }

    pub async fn apply_command(
        &self,
        competition_id: i32,
        command: AdminCommand,
    ) -> Result<CompetitionStatus, LadderError> {
        admin::apply_command(self, competition_id, command).await
    }

    pub async fn create_competition(
        &self,
        new: NewCompetition,
    ) -> Result<competition::Model, LadderError> {
        admin::create_competition(self, new).await
    }

    pub async fn join_competition(
        &self,
        competition_id: i32,
        agent_id: i32,
    ) -> Result<(), LadderError> {
        admin::join_competition(self, competition_id, agent_id).await
    }

    pub async fn remove_participant(
        &self,
        competition_id: i32,
        agent_id: i32,
    ) -> Result<(), LadderError> {
        admin::remove_participant(self, competition_id, agent_id).await
    }

    pub async fn request_adhoc_match(
        &self,
        request: AdHocMatchRequest,
    ) -> Result<arena_match::Model, LadderError> {
        admin::request_adhoc_match(self, request).await
    }

    pub async fn cancel_result(&self, match_id: i32) -> Result<(), LadderError> {
        admin::cancel_result(self, match_id).await
    }
}
