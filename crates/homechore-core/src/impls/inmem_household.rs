//! InMemoryHousehold - 開発・テスト用のグラフ DB 代替
//!
//! User / Home / Task と `LIVES_IN` / `HAS_TASK` を HashMap で保持し、
//! [`ScoreStore`] と [`TaskRepository`] の両方を実装します。
//!
//! # 実装詳細
//! - tokio::sync::Mutex で排他制御（await を跨いでロックしない）
//! - `apply_reward` は IdempotencyKey で重複を無視する

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{
    Home, HomeId, IdempotencyKey, StoreError, Task, TaskAssignment, TaskId, TaskStatus, User,
    UserId,
};
use crate::ports::{IdGenerator, ScoreStore, SystemClock, TaskRepository, UlidGenerator};

struct HomeRecord {
    name: String,
    residents: Vec<UserId>,
    tasks: Vec<Task>,
}

#[derive(Default)]
struct HouseholdState {
    users: HashMap<UserId, User>,
    homes: HashMap<HomeId, HomeRecord>,
    applied_keys: HashSet<IdempotencyKey>,
}

impl HouseholdState {
    fn require_user(&self, user_id: &UserId) -> Result<&User, StoreError> {
        self.users
            .get(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))
    }

    fn homes_of<'a>(
        &'a self,
        user_id: &'a UserId,
    ) -> impl Iterator<Item = (&'a HomeId, &'a HomeRecord)> {
        self.homes
            .iter()
            .filter(move |(_, home)| home.residents.contains(user_id))
    }

    /// The oldest home the user lives in (smallest ULID).
    fn first_home_of(&self, user_id: &UserId) -> Result<HomeId, StoreError> {
        self.require_user(user_id)?;
        self.homes_of(user_id)
            .map(|(id, _)| *id)
            .min()
            .ok_or_else(|| StoreError::NotFound(format!("home of user {user_id}")))
    }

    fn to_home(&self, id: HomeId, record: &HomeRecord) -> Home {
        Home {
            id,
            name: record.name.clone(),
            residents: record
                .residents
                .iter()
                .filter_map(|user_id| self.users.get(user_id).cloned())
                .collect(),
            tasks: record.tasks.clone(),
        }
    }
}

/// In-memory household graph.
pub struct InMemoryHousehold {
    state: Mutex<HouseholdState>,
    ids: Arc<dyn IdGenerator>,
}

impl InMemoryHousehold {
    pub fn new() -> Self {
        Self::with_id_generator(Arc::new(UlidGenerator::new(SystemClock)))
    }

    pub fn with_id_generator(ids: Arc<dyn IdGenerator>) -> Self {
        Self {
            state: Mutex::new(HouseholdState::default()),
            ids,
        }
    }

    /// `MERGE (u:User {email})`: creates the user or updates its name.
    /// An existing score is kept.
    pub async fn upsert_user(&self, user: User) -> User {
        let mut state = self.state.lock().await;
        let entry = state
            .users
            .entry(user.email.clone())
            .and_modify(|existing| existing.name = user.name.clone())
            .or_insert(user);
        entry.clone()
    }

    pub async fn user(&self, user_id: &UserId) -> Option<User> {
        self.state.lock().await.users.get(user_id).cloned()
    }

    /// Create a home with `owner` as its first resident.
    pub async fn create_home(
        &self,
        owner: &UserId,
        name: impl Into<String>,
    ) -> Result<HomeId, StoreError> {
        let mut state = self.state.lock().await;
        state.require_user(owner)?;

        let id = self.ids.generate_home_id();
        state.homes.insert(
            id,
            HomeRecord {
                name: name.into(),
                residents: vec![owner.clone()],
                tasks: Vec::new(),
            },
        );
        Ok(id)
    }

    /// Add `new_resident` to every home `resident` lives in.
    /// The new resident is created with an empty name when missing.
    pub async fn add_resident(
        &self,
        resident: &UserId,
        new_resident: &UserId,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let home_ids: Vec<HomeId> = {
            state.require_user(resident)?;
            state.homes_of(resident).map(|(id, _)| *id).collect()
        };
        if home_ids.is_empty() {
            return Err(StoreError::NotFound(format!("home of user {resident}")));
        }

        state
            .users
            .entry(new_resident.clone())
            .or_insert_with(|| User {
                name: String::new(),
                email: new_resident.clone(),
                score: 0,
            });
        for id in home_ids {
            if let Some(home) = state.homes.get_mut(&id)
                && !home.residents.contains(new_resident)
            {
                home.residents.push(new_resident.clone());
            }
        }
        Ok(())
    }

    /// Create or update a task in the user's home. The status is reset to pending.
    pub async fn upsert_task(&self, user_id: &UserId, task: Task) -> Result<Task, StoreError> {
        let mut state = self.state.lock().await;
        let home_id = state.first_home_of(user_id)?;
        let home = state
            .homes
            .get_mut(&home_id)
            .ok_or_else(|| StoreError::NotFound(format!("home {home_id}")))?;

        let task = Task {
            status: TaskStatus::Pending,
            ..task
        };
        match home.tasks.iter_mut().find(|t| t.name == task.name) {
            Some(existing) => *existing = task.clone(),
            None => home.tasks.push(task.clone()),
        }
        Ok(task)
    }

    /// Remove a task from the user's homes. Returns whether anything was removed.
    pub async fn delete_task(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        state.require_user(user_id)?;
        let home_ids: Vec<HomeId> = state.homes_of(user_id).map(|(id, _)| *id).collect();

        let mut removed = false;
        for id in home_ids {
            if let Some(home) = state.homes.get_mut(&id) {
                let before = home.tasks.len();
                home.tasks.retain(|t| &t.name != task_id);
                removed |= home.tasks.len() != before;
            }
        }
        Ok(removed)
    }

    pub async fn home(&self, home_id: HomeId) -> Option<Home> {
        let state = self.state.lock().await;
        state
            .homes
            .get(&home_id)
            .map(|record| state.to_home(home_id, record))
    }

    /// Residents of a home ordered by score (highest first), ties by e-mail.
    pub async fn ranking(&self, home_id: HomeId) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock().await;
        let record = state
            .homes
            .get(&home_id)
            .ok_or_else(|| StoreError::NotFound(format!("home {home_id}")))?;

        let mut residents = state.to_home(home_id, record).residents;
        residents.sort_by(|a, b| b.score.cmp(&a.score).then_with(|| a.email.cmp(&b.email)));
        Ok(residents)
    }
}

impl Default for InMemoryHousehold {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ScoreStore for InMemoryHousehold {
    async fn apply_reward(
        &self,
        user_id: &UserId,
        amount: i64,
        key: &IdempotencyKey,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        if state.applied_keys.contains(key) {
            debug!(%user_id, %key, "duplicate reward ignored");
            return Ok(());
        }

        let user = state
            .users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::NotFound(format!("user {user_id}")))?;
        user.score = user.score.saturating_add(amount);
        state.applied_keys.insert(key.clone());
        Ok(())
    }
}

#[async_trait]
impl TaskRepository for InMemoryHousehold {
    async fn find_task(
        &self,
        user_id: &UserId,
        task_id: &TaskId,
    ) -> Result<Option<TaskAssignment>, StoreError> {
        let state = self.state.lock().await;
        state.require_user(user_id)?;

        let mut found: Vec<TaskAssignment> = state
            .homes_of(user_id)
            .filter_map(|(id, home)| {
                home.tasks
                    .iter()
                    .find(|t| &t.name == task_id)
                    .map(|task| TaskAssignment {
                        home_id: *id,
                        task: task.clone(),
                    })
            })
            .collect();
        found.sort_by_key(|assignment| assignment.home_id);
        Ok(found.into_iter().next())
    }

    async fn mark_finished(
        &self,
        home_id: HomeId,
        task_id: &TaskId,
    ) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        let task = state
            .homes
            .get_mut(&home_id)
            .and_then(|home| home.tasks.iter_mut().find(|t| &t.name == task_id))
            .ok_or_else(|| StoreError::NotFound(format!("task {task_id} in {home_id}")))?;
        if task.status.is_finished() {
            return Ok(false);
        }
        task.status = TaskStatus::Finished;
        Ok(true)
    }
}
