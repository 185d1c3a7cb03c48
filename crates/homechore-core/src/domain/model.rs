//! Household model: users live in homes, homes have tasks.
//!
//! The JSON shape follows the REST surface (lowercase field names, status as
//! `"pending"` / `"finished"`). Passwords are not modelled here.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::event::Reward;
use super::ids::{HomeId, TaskId, UserId};

/// Task status on the `HAS_TASK` relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Pending,
    Finished,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Finished => "finished",
        }
    }

    pub fn is_finished(self) -> bool {
        matches!(self, TaskStatus::Finished)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub name: TaskId,
    #[serde(default)]
    pub status: TaskStatus,
    pub reward: Reward,
}

impl Task {
    pub fn pending(name: impl Into<String>, reward: Reward) -> Self {
        Self {
            name: TaskId::new(name),
            status: TaskStatus::Pending,
            reward,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub email: UserId,
    #[serde(default)]
    pub score: i64,
}

impl User {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: UserId::new(email),
            score: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Home {
    pub id: HomeId,
    pub name: String,
    #[serde(default)]
    pub residents: Vec<User>,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

/// A task resolved through a resident: `(User)-[:LIVES_IN]->(Home)-[:HAS_TASK]->(Task)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskAssignment {
    pub home_id: HomeId,
    pub task: Task,
}
