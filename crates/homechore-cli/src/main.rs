use async_trait::async_trait;
use serde::Deserialize;
use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use tokio::time::{Duration, sleep};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use homechore_core::domain::{IdempotencyKey, StoreError, Task, TaskId, User, UserId};
use homechore_core::impls::InMemoryHousehold;
use homechore_core::ports::{ScoreStore, SystemClock, UlidGenerator};
use homechore_core::{ProcessorBuilder, ProcessorConfig, TaskCompletionService};

/// デモ用の初期データ
const SEED: &str = r#"{
    "home": "Casa Verde",
    "owner": { "name": "Ana", "email": "ana@example.com" },
    "residents": [
        { "name": "Ben", "email": "ben@example.com" },
        { "name": "Chloe", "email": "chloe@example.com" }
    ],
    "tasks": [
        { "name": "dishes", "reward": 10 },
        { "name": "laundry", "reward": 15 },
        { "name": "trash", "reward": 5 },
        { "name": "vacuum", "reward": 20 }
    ],
    "completions": [
        { "user": "ana@example.com", "task": "dishes" },
        { "user": "ben@example.com", "task": "laundry" },
        { "user": "chloe@example.com", "task": "trash" },
        { "user": "ben@example.com", "task": "vacuum" },
        { "user": "ben@example.com", "task": "vacuum" }
    ]
}"#;

#[derive(Debug, Deserialize)]
struct Seed {
    home: String,
    owner: User,
    residents: Vec<User>,
    tasks: Vec<Task>,
    completions: Vec<Completion>,
}

#[derive(Debug, Deserialize)]
struct Completion {
    user: UserId,
    task: TaskId,
}

/// 最初の数回だけ Unavailable を返す ScoreStore（retry の様子を見るため）
struct FlakyStore {
    inner: Arc<InMemoryHousehold>,
    remaining_failures: AtomicU32,
}

impl FlakyStore {
    fn new(inner: Arc<InMemoryHousehold>, n: u32) -> Self {
        Self {
            inner,
            remaining_failures: AtomicU32::new(n),
        }
    }
}

#[async_trait]
impl ScoreStore for FlakyStore {
    async fn apply_reward(
        &self,
        user_id: &UserId,
        amount: i64,
        key: &IdempotencyKey,
    ) -> Result<(), StoreError> {
        let left = self.remaining_failures.load(Ordering::Relaxed);
        if left > 0 {
            self.remaining_failures.fetch_sub(1, Ordering::Relaxed);
            return Err(StoreError::Unavailable(format!(
                "intentional failure (left={left})"
            )));
        }
        self.inner.apply_reward(user_id, amount, key).await
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = ProcessorConfig::from_env()?;
    info!(?config, "loaded processor config");

    // (A) household を用意
    let seed: Seed = serde_json::from_str(SEED)?;
    let household = Arc::new(InMemoryHousehold::new());
    let owner = household.upsert_user(seed.owner).await.email;
    let home_id = household.create_home(&owner, seed.home).await?;
    for resident in seed.residents {
        let email = household.upsert_user(resident).await.email;
        household.add_resident(&owner, &email).await?;
    }
    for task in seed.tasks {
        household.upsert_task(&owner, task).await?;
    }

    // (B) processor を起動（store は最初の 2 回だけ失敗する）
    let drain_timeout = config.drain_timeout;
    let mut processor = ProcessorBuilder::new()
        .config(config)
        .score_store(Arc::new(FlakyStore::new(household.clone(), 2)))
        .build()?;
    processor.start()?;

    let clock = Arc::new(SystemClock);
    let service = TaskCompletionService::new(
        household.clone(),
        processor.sender(),
        clock,
        Arc::new(UlidGenerator::new(SystemClock)),
    );

    // (C) タスク完了（enqueue したら即 return）
    let submitted = seed.completions.len();
    let mut queued = 0;
    for c in &seed.completions {
        match service.complete_task(&c.user, &c.task).await {
            Ok(task) => {
                queued += 1;
                info!(user = %c.user, task = %task.name, "completion accepted");
            }
            Err(err) => warn!(user = %c.user, task = %c.task, error = %err, "completion rejected"),
        }
    }
    info!(queued, submitted, "all completions submitted");

    // (D) 適用が落ち着くまで待つ（Ctrl-C で打ち切り）
    tokio::select! {
        _ = tokio::signal::ctrl_c() => warn!("interrupted, shutting down"),
        _ = async {
            while processor.stats().settled() < queued {
                sleep(Duration::from_millis(50)).await;
            }
        } => {}
    }

    // (E) graceful shutdown
    processor.shutdown(drain_timeout).await?;
    info!(stats = ?processor.stats(), "processor stopped");

    let ranking = household.ranking(home_id).await?;
    println!("{}", serde_json::to_string_pretty(&ranking)?);
    Ok(())
}
