//! # Agent Presence
//!
//! Presence records travel on `agent_presence` with no ordering guarantee.
//! [`PresenceBoard`] keeps the newest record per agent: an update whose
//! `lastUpdated` is not newer than the one held is discarded.

use std::collections::HashMap;

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::debug;
use vworld_schema::{Fields, SchemaResult};
use vworld_shared::Vector3;

use crate::channel::{Channel, Frame};
use crate::config::PresenceConfig;

const RECORD: &str = "presence";
const VECTOR: &str = "an object with numeric x, y, z";

/// Where an agent is and which way it faces.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentPresence {
    /// Agent id
    pub agent_id: String,
    /// World position
    pub position: Vector3,
    /// Euler orientation
    pub orientation: Vector3,
    /// Sender's clock at the time of the update
    pub last_updated: DateTime<Utc>,
}

impl AgentPresence {
    /// Builds a presence record.
    #[must_use]
    pub fn new(
        agent_id: impl Into<String>,
        position: Vector3,
        orientation: Vector3,
        last_updated: DateTime<Utc>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            position,
            orientation,
            last_updated,
        }
    }

    /// Validates a raw presence message. Unknown keys are ignored.
    ///
    /// # Errors
    ///
    /// `SchemaViolation` naming the first bad field.
    pub fn decode(raw: &Value) -> SchemaResult<Self> {
        let f = Fields::root(RECORD, raw)?;
        Ok(Self {
            agent_id: f.req_non_blank("agentId")?,
            position: f.req_typed("position", VECTOR)?,
            orientation: f.req_typed("orientation", VECTOR)?,
            last_updated: f.req_timestamp("lastUpdated")?,
        })
    }

    /// Wire form; `lastUpdated` is an ISO-8601 string.
    #[must_use]
    pub fn encode(&self) -> Value {
        json!({
            "agentId": self.agent_id,
            "position": self.position,
            "orientation": self.orientation,
            "lastUpdated": self.last_updated.to_rfc3339_opts(SecondsFormat::AutoSi, true),
        })
    }

    /// Frame ready for the presence channel.
    #[must_use]
    pub fn to_frame(&self) -> Frame {
        Frame::new(Channel::Presence, self.encode())
    }
}

/// Outcome of offering a record to the board.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PresenceUpdate {
    /// First record for this agent
    Inserted,
    /// Newer than the held record
    Replaced,
    /// Not newer than the held record; discarded
    Stale,
}

/// Newest known presence per agent.
#[derive(Clone, Debug)]
pub struct PresenceBoard {
    agents: HashMap<String, AgentPresence>,
    stale_after: Duration,
}

impl PresenceBoard {
    /// Empty board.
    #[must_use]
    pub fn new(config: &PresenceConfig) -> Self {
        Self {
            agents: HashMap::new(),
            stale_after: config.stale_after(),
        }
    }

    /// Applies last-write-wins on `lastUpdated`.
    pub fn apply(&mut self, presence: AgentPresence) -> PresenceUpdate {
        match self.agents.get_mut(&presence.agent_id) {
            None => {
                self.agents.insert(presence.agent_id.clone(), presence);
                PresenceUpdate::Inserted
            }
            Some(held) if presence.last_updated > held.last_updated => {
                *held = presence;
                PresenceUpdate::Replaced
            }
            Some(held) => {
                debug!(
                    "discarding presence for {} at {}; holding {}",
                    presence.agent_id, presence.last_updated, held.last_updated
                );
                PresenceUpdate::Stale
            }
        }
    }

    /// Newest record for `agent_id`.
    #[must_use]
    pub fn get(&self, agent_id: &str) -> Option<&AgentPresence> {
        self.agents.get(agent_id)
    }

    /// Forgets an agent, e.g. on disconnect.
    pub fn remove(&mut self, agent_id: &str) -> Option<AgentPresence> {
        self.agents.remove(agent_id)
    }

    /// All held records, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = &AgentPresence> {
        self.agents.values()
    }

    /// Number of agents held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True when no agent is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Drops agents not heard from within the stale window before `now`,
    /// returning their ids sorted.
    pub fn prune(&mut self, now: DateTime<Utc>) -> Vec<String> {
        let Some(cutoff) = now.checked_sub_signed(self.stale_after) else {
            return Vec::new();
        };
        let mut gone: Vec<String> = self
            .agents
            .values()
            .filter(|p| p.last_updated < cutoff)
            .map(|p| p.agent_id.clone())
            .collect();
        for id in &gone {
            self.agents.remove(id);
        }
        gone.sort();
        gone
    }
}

impl Default for PresenceBoard {
    fn default() -> Self {
        Self::new(&PresenceConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 7, 1, 0, 0, 0).unwrap() + Duration::seconds(seconds)
    }

    fn presence(agent: &str, x: f64, seconds: i64) -> AgentPresence {
        AgentPresence::new(agent, Vector3::new(x, 0.0, 0.0), Vector3::ZERO, at(seconds))
    }

    #[test]
    fn test_decode_presence() {
        let raw = json!({
            "agentId": "a-1",
            "position": {"x": 1, "y": 2.5, "z": -3},
            "orientation": {"x": 0, "y": 90, "z": 0},
            "lastUpdated": "2024-07-01T00:00:05.250Z"
        });
        let p = AgentPresence::decode(&raw).unwrap();
        assert_eq!(p.position, Vector3::new(1.0, 2.5, -3.0));
        assert_eq!(p.last_updated, at(5) + Duration::milliseconds(250));
        assert_eq!(AgentPresence::decode(&p.encode()).unwrap(), p);
    }

    #[test]
    fn test_decode_rejections_name_fields() {
        let err = AgentPresence::decode(&json!({
            "agentId": "a-1",
            "position": {"x": 1, "y": 2},
            "orientation": {"x": 0, "y": 0, "z": 0},
            "lastUpdated": "2024-07-01T00:00:00Z"
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("position"));

        let err = AgentPresence::decode(&json!({
            "agentId": "a-1",
            "position": {"x": 1, "y": 2, "z": 3},
            "orientation": {"x": 0, "y": 0, "z": 0},
            "lastUpdated": "yesterday"
        }))
        .unwrap_err();
        assert_eq!(err.field(), Some("lastUpdated"));
    }

    #[test]
    fn test_last_write_wins() {
        let mut board = PresenceBoard::new(&PresenceConfig::default());
        assert_eq!(board.apply(presence("a", 1.0, 10)), PresenceUpdate::Inserted);
        assert_eq!(board.apply(presence("a", 2.0, 5)), PresenceUpdate::Stale);
        assert_eq!(board.apply(presence("a", 3.0, 10)), PresenceUpdate::Stale);
        assert_eq!(board.get("a").unwrap().position.x, 1.0);

        assert_eq!(board.apply(presence("a", 4.0, 11)), PresenceUpdate::Replaced);
        assert_eq!(board.get("a").unwrap().position.x, 4.0);
        assert_eq!(board.len(), 1);
    }

    #[test]
    fn test_prune_stale_agents() {
        let mut board = PresenceBoard::new(&PresenceConfig {
            stale_after_ms: 30_000,
            ..PresenceConfig::default()
        });
        board.apply(presence("old", 0.0, 0));
        board.apply(presence("fresh", 0.0, 50));
        board.apply(presence("edge", 0.0, 30));

        assert_eq!(board.prune(at(60)), vec!["old".to_string()]);
        assert!(board.get("edge").is_some());
        assert_eq!(board.len(), 2);
    }
}
