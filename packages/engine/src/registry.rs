//! Interfaces to the external agent and map registries.
//!
//! Agent identity, trust, enrollment and artifact storage live outside this
//! engine; these traits are the seam. The in-memory implementations exist for
//! tests and for embedders that keep their registry in process.

use std::collections::HashMap;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use ladder_common::ArtifactDescriptor;

/// An agent as the external registry describes it.
#[derive(Clone, Debug)]
pub struct AgentRecord {
    pub id: i32,
    pub name: String,
    /// The agent's artifact may only be shipped to trusted workers.
    pub requires_trusted_worker: bool,
    /// Whether the agent's mutable data blob participates in matches at all.
    pub data_enabled: bool,
    pub package: ArtifactDescriptor,
    pub data: Option<ArtifactDescriptor>,
}

/// A map as the external registry describes it.
#[derive(Clone, Debug)]
pub struct MapRecord {
    pub id: i32,
    pub name: String,
    pub location: String,
}

#[async_trait]
pub trait AgentRegistry: Send + Sync {
    /// Agents currently available to play in the given competition.
    async fn competition_agents(&self, competition_id: i32) -> Result<Vec<AgentRecord>>;

    async fn agent(&self, agent_id: i32) -> Result<Option<AgentRecord>>;
}

#[async_trait]
pub trait MapRegistry: Send + Sync {
    /// Maps enabled for the given competition.
    async fn enabled_maps(&self, competition_id: i32) -> Result<Vec<MapRecord>>;

    async fn map(&self, map_id: i32) -> Result<Option<MapRecord>>;
}

/// In-process agent registry backed by a map of competition memberships.
#[derive(Default)]
pub struct InMemoryAgentRegistry {
    inner: Mutex<InMemoryAgents>,
}

#[derive(Default)]
struct InMemoryAgents {
    agents: HashMap<i32, AgentRecord>,
    memberships: HashMap<i32, Vec<i32>>,
}

impl InMemoryAgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, agent: AgentRecord) {
        self.inner.lock().unwrap().agents.insert(agent.id, agent);
    }

    pub fn enroll(&self, competition_id: i32, agent_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        let members = inner.memberships.entry(competition_id).or_default();
        if !members.contains(&agent_id) {
            members.push(agent_id);
        }
    }

    pub fn withdraw(&self, competition_id: i32, agent_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(members) = inner.memberships.get_mut(&competition_id) {
            members.retain(|id| *id != agent_id);
        }
    }
}

#[async_trait]
impl AgentRegistry for InMemoryAgentRegistry {
    async fn competition_agents(&self, competition_id: i32) -> Result<Vec<AgentRecord>> {
        let inner = self.inner.lock().unwrap();
        let members = inner.memberships.get(&competition_id);
        Ok(members
            .into_iter()
            .flatten()
            .filter_map(|id| inner.agents.get(id).cloned())
            .collect())
    }

    async fn agent(&self, agent_id: i32) -> Result<Option<AgentRecord>> {
        Ok(self.inner.lock().unwrap().agents.get(&agent_id).cloned())
    }
}

/// In-process map registry.
#[derive(Default)]
pub struct InMemoryMapRegistry {
    inner: Mutex<InMemoryMaps>,
}

#[derive(Default)]
struct InMemoryMaps {
    maps: HashMap<i32, MapRecord>,
    enabled: HashMap<i32, Vec<i32>>,
}

impl InMemoryMapRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, map: MapRecord) {
        self.inner.lock().unwrap().maps.insert(map.id, map);
    }

    pub fn enable(&self, competition_id: i32, map_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        let maps = inner.enabled.entry(competition_id).or_default();
        if !maps.contains(&map_id) {
            maps.push(map_id);
        }
    }

    pub fn disable(&self, competition_id: i32, map_id: i32) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(maps) = inner.enabled.get_mut(&competition_id) {
            maps.retain(|id| *id != map_id);
        }
    }
}

#[async_trait]
impl MapRegistry for InMemoryMapRegistry {
    async fn enabled_maps(&self, competition_id: i32) -> Result<Vec<MapRecord>> {
        let inner = self.inner.lock().unwrap();
        let enabled = inner.enabled.get(&competition_id);
        Ok(enabled
            .into_iter()
            .flatten()
            .filter_map(|id| inner.maps.get(id).cloned())
            .collect())
    }

    async fn map(&self, map_id: i32) -> Result<Option<MapRecord>> {
        Ok(self.inner.lock().unwrap().maps.get(&map_id).cloned())
    }
}
