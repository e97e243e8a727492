//! Profile / Scenario Query Handlers

use std::sync::Arc;

use crate::application::error::ApplicationError;
use crate::application::ports::{
    MessageRecord, MessageRepositoryPort, ProfileRecord, ProfileRepositoryPort, ScenarioRecord,
    ScenarioRepositoryPort,
};
use crate::application::queries::{GetMessages, GetProfile, GetScenario, ListProfiles, ListScenarios};

/// GetProfile Handler
pub struct GetProfileHandler {
    profile_repo: Arc<dyn ProfileRepositoryPort>,
}

impl GetProfileHandler {
    pub fn new(profile_repo: Arc<dyn ProfileRepositoryPort>) -> Self {
        Self { profile_repo }
    }

    pub async fn handle(&self, query: GetProfile) -> Result<ProfileRecord, ApplicationError> {
        self.profile_repo
            .find_by_id(query.profile_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Profile", query.profile_id))
    }
}

/// ListProfiles Handler
pub struct ListProfilesHandler {
    profile_repo: Arc<dyn ProfileRepositoryPort>,
}

impl ListProfilesHandler {
    pub fn new(profile_repo: Arc<dyn ProfileRepositoryPort>) -> Self {
        Self { profile_repo }
    }

    pub async fn handle(&self, _query: ListProfiles) -> Result<Vec<ProfileRecord>, ApplicationError> {
        Ok(self.profile_repo.find_all().await?)
    }
}

/// GetScenario Handler
pub struct GetScenarioHandler {
    scenario_repo: Arc<dyn ScenarioRepositoryPort>,
}

impl GetScenarioHandler {
    pub fn new(scenario_repo: Arc<dyn ScenarioRepositoryPort>) -> Self {
        Self { scenario_repo }
    }

    pub async fn handle(&self, query: GetScenario) -> Result<ScenarioRecord, ApplicationError> {
        self.scenario_repo
            .find_by_id(query.scenario_id)
            .await?
            .ok_or_else(|| ApplicationError::not_found("Scenario", query.scenario_id))
    }
}

/// ListScenarios Handler
pub struct ListScenariosHandler {
    scenario_repo: Arc<dyn ScenarioRepositoryPort>,
}

impl ListScenariosHandler {
    pub fn new(scenario_repo: Arc<dyn ScenarioRepositoryPort>) -> Self {
        Self { scenario_repo }
    }

    pub async fn handle(&self, query: ListScenarios) -> Result<Vec<ScenarioRecord>, ApplicationError> {
        Ok(self.scenario_repo.find_by_profile(query.profile_id).await?)
    }
}

/// GetMessages Handler
pub struct GetMessagesHandler {
    message_repo: Arc<dyn MessageRepositoryPort>,
}

impl GetMessagesHandler {
    pub fn new(message_repo: Arc<dyn MessageRepositoryPort>) -> Self {
        Self { message_repo }
    }

    pub async fn handle(&self, query: GetMessages) -> Result<Vec<MessageRecord>, ApplicationError> {
        Ok(self.message_repo.find_by_scenario(query.scenario_id).await?)
    }
}
