//! Turns faction API payloads into an optimizer [`Snapshot`].
//!
//! Capability is the observed pass rate per (member, task, role) in this
//! faction's history. Participation recorded under other factions becomes
//! [`CapabilityObservation`]s for role-group sharing.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::api::types::{
    HistoryResponse, MemberRecord, MembersResponse, OpenTasksResponse, ParticipationRecord, TaskRecord,
};
use crate::api::{ApiRequest, ResilientClient, Transport};
use crate::clock::Sleeper;
use crate::error::{Error, Result};
use crate::optimizer::{Actor, CapabilityKey, CapabilityObservation, TaskSlot, WORST_EXPERIENCE_RANK};

/// Everything one optimization run needs for one faction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub faction_id: u64,
    /// Reference time for activity scoring.
    pub generated_at: DateTime<Utc>,
    pub actors: Vec<Actor>,
    pub slots: Vec<TaskSlot>,
    #[serde(default)]
    pub observations: Vec<CapabilityObservation>,
}

impl Snapshot {
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Fetches one faction's state through the resilient client.
pub struct FactionLoader<'a, T, S> {
    client: &'a ResilientClient<T, S>,
    base_url: String,
    api_key: String,
}

impl<'a, T: Transport, S: Sleeper> FactionLoader<'a, T, S> {
    pub fn new(client: &'a ResilientClient<T, S>, base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    pub fn client(&self) -> &ResilientClient<T, S> {
        self.client
    }

    fn url(&self, faction_id: u64, path: &str) -> String {
        format!("{}/faction/{faction_id}/{path}", self.base_url)
    }

    /// Members, open tasks and history, in that order. The first failed call
    /// aborts the load.
    pub async fn load(&self, faction_id: u64, now: DateTime<Utc>) -> Result<Snapshot> {
        let members: MembersResponse = self.fetch(self.url(faction_id, "members"), "members").await?;
        let tasks: OpenTasksResponse = self
            .fetch(self.url(faction_id, "tasks?status=open"), "open tasks")
            .await?;
        let history: HistoryResponse = self.fetch(self.url(faction_id, "history"), "history").await?;

        let snapshot = build_snapshot(faction_id, now, &members.members, &tasks.tasks, &history.records);
        debug!(
            faction_id,
            actors = snapshot.actors.len(),
            slots = snapshot.slots.len(),
            observations = snapshot.observations.len(),
            "snapshot built"
        );
        Ok(snapshot)
    }

    async fn fetch<D: DeserializeOwned>(&self, url: String, what: &'static str) -> Result<D> {
        let outcome = self.client.execute(&ApiRequest::new(url, self.api_key.as_str())).await;
        if !outcome.is_success() {
            return Err(Error::from_outcome(&outcome));
        }
        outcome.json().map_err(|source| Error::Decode { what, source })
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Tally {
    successes: u32,
    attempts: u32,
}

impl Tally {
    fn add(&mut self, success: bool) {
        self.attempts += 1;
        if success {
            self.successes += 1;
        }
    }

    fn rate(self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.successes) * 100.0 / f64::from(self.attempts)
        }
    }
}

/// Pure assembly of a snapshot from decoded payloads.
pub fn build_snapshot(
    faction_id: u64,
    now: DateTime<Utc>,
    members: &[MemberRecord],
    tasks: &[TaskRecord],
    history: &[ParticipationRecord],
) -> Snapshot {
    let member_ids: HashSet<u64> = members.iter().map(|m| m.id).collect();

    // (user, task, position) → tally, split by whether it happened here.
    let mut own: BTreeMap<(u64, String, String), Tally> = BTreeMap::new();
    let mut elsewhere: BTreeMap<(u64, String, String), Tally> = BTreeMap::new();
    for record in history.iter().filter(|r| member_ids.contains(&r.user_id)) {
        let table = if record.faction_id == faction_id {
            &mut own
        } else {
            &mut elsewhere
        };
        table
            .entry((record.user_id, record.task_name.clone(), record.position.clone()))
            .or_default()
            .add(record.success);
    }

    let ranks = experience_ranks(members, history);

    let actors = members
        .iter()
        .map(|member| {
            let capabilities = own
                .range((member.id, String::new(), String::new())..)
                .take_while(|((user, _, _), _)| *user == member.id)
                .map(|((_, task, role), tally)| (CapabilityKey::new(task.as_str(), role.as_str()), tally.rate()))
                .collect();
            Actor {
                id: member.id,
                display_name: member.name.clone(),
                capabilities,
                experience_rank: ranks.get(&member.id).copied().unwrap_or(WORST_EXPERIENCE_RANK),
                last_active_at: member.last_action,
            }
        })
        .collect();

    let observations = elsewhere
        .into_iter()
        .map(|((actor_id, task_name, role), tally)| CapabilityObservation {
            actor_id,
            task_name,
            role,
            score: tally.rate(),
        })
        .collect();

    let slots = tasks
        .iter()
        .filter(|task| task.expires_at.is_none_or(|at| at > now))
        .flat_map(|task| {
            task.slots
                .iter()
                .filter(|slot| slot.user_id.is_none())
                .map(move |slot| TaskSlot {
                    task_id: task.id,
                    task_name: task.name.clone(),
                    role_position: slot.position.clone(),
                    position_id: slot.position_id,
                    difficulty: task.difficulty,
                    expires_at: task.expires_at,
                    expected_value: task.reward.expected_value(),
                    priority_weight: priority_weight(task.difficulty),
                })
        })
        .collect();

    Snapshot {
        faction_id,
        generated_at: now,
        actors,
        slots,
        observations,
    }
}

/// `1 + difficulty / 10`, capped at 2.0; 1.0 when unknown.
pub fn priority_weight(difficulty: Option<u32>) -> f64 {
    difficulty.map_or(1.0, |d| (1.0 + f64::from(d) / 10.0).min(2.0))
}

/// Ranks members by total participation anywhere, most first (ties by id),
/// spread over 1..=100. Members with no participation get no rank.
fn experience_ranks(members: &[MemberRecord], history: &[ParticipationRecord]) -> HashMap<u64, u32> {
    let mut counts: HashMap<u64, u32> = members.iter().map(|m| (m.id, 0)).collect();
    for record in history {
        if let Some(count) = counts.get_mut(&record.user_id) {
            *count += 1;
        }
    }

    let mut active: Vec<(u64, u32)> = counts.into_iter().filter(|&(_, c)| c > 0).collect();
    active.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));

    let n = active.len();
    active
        .into_iter()
        .enumerate()
        .map(|(i, (id, _))| {
            let rank = if n <= 1 { 1 } else { 1 + (i * 99 / (n - 1)) as u32 };
            (id, rank)
        })
        .collect()
}
