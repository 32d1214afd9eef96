#![allow(clippy::unwrap_used)]
//! Two writers racing for one natural key
//!
//! Both requests are authorized against the same pre-write snapshot, so both
//! pass the duplicate check; the store's uniqueness constraint decides.

use async_trait::async_trait;
use meridian_authorization::{AuthorizationService, Command, CommandExecutor, CommandOutcome, DenialReason};
use meridian_core::Resource;
use meridian_core::ResourceType;
use meridian_store::{
    MemoryStore, ResourceStore, StoreResult, StoreSnapshot, StoredVersion, WriteOperation, WriteResult,
};
use meridian_testkit::*;
use std::sync::Arc;
use tokio::sync::Barrier;

/// Holds every snapshot until two requests have opened one
struct LockstepStore {
    inner: Arc<MemoryStore>,
    barrier: Barrier,
}

#[async_trait]
impl ResourceStore for LockstepStore {
    async fn snapshot(&self) -> StoreResult<Box<dyn StoreSnapshot>> {
        let snapshot = self.inner.snapshot().await?;
        self.barrier.wait().await;
        Ok(snapshot)
    }

    async fn read(&self, resource_type: ResourceType, id: &str) -> StoreResult<Option<StoredVersion>> {
        self.inner.read(resource_type, id).await
    }

    async fn apply_atomically(&self, operations: Vec<WriteOperation>) -> StoreResult<Vec<WriteResult>> {
        self.inner.apply_atomically(operations).await
    }
}

fn lockstep_executor(scenario: &Scenario) -> CommandExecutor<LockstepStore> {
    let store = LockstepStore {
        inner: scenario.store.clone(),
        barrier: Barrier::new(2),
    };
    CommandExecutor::new(AuthorizationService::new(Arc::new(store), scenario.config.clone()))
}

async fn race(scenario: &Scenario, resource: Resource) -> (CommandOutcome, CommandOutcome) {
    let executor = lockstep_executor(scenario);
    let identity = local_organization_identity();
    tokio::join!(
        executor.execute(&identity, Command::Create(resource.clone())),
        executor.execute(&identity, Command::Create(resource)),
    )
}

fn assert_one_winner(first: &CommandOutcome, second: &CommandOutcome) {
    let created = [first, second]
        .iter()
        .filter(|o| matches!(o, CommandOutcome::Created(_)))
        .count();
    let rejected = [first, second]
        .iter()
        .filter(|o| ***o == CommandOutcome::Forbidden(DenialReason::AlreadyExists))
        .count();
    assert_eq!((created, rejected), (1, 1), "{first:?} / {second:?}");
}

#[tokio::test]
async fn concurrent_draft_tasks_with_one_identifier() {
    init_test_tracing();
    let scenario = Scenario::new();
    let before = scenario.store.state().live_count();

    let (first, second) = race(&scenario, TaskBuilder::draft("race-1").build()).await;

    assert_one_winner(&first, &second);
    assert_eq!(scenario.store.state().live_count(), before + 1);
}

#[tokio::test]
async fn concurrent_naming_systems_with_one_name() {
    let scenario = Scenario::new();
    let before = scenario.store.state().live_count();

    let (first, second) = race(&scenario, naming_system("race")).await;

    assert_one_winner(&first, &second);
    assert_eq!(scenario.store.state().live_count(), before + 1);
}

#[tokio::test]
async fn different_keys_do_not_collide() {
    let scenario = Scenario::new();
    let before = scenario.store.state().live_count();
    let executor = lockstep_executor(&scenario);
    let identity = local_organization_identity();

    let (first, second) = tokio::join!(
        executor.execute(&identity, Command::Create(TaskBuilder::draft("race-a").build())),
        executor.execute(&identity, Command::Create(TaskBuilder::draft("race-b").build())),
    );

    assert_eq!((first.status_code(), second.status_code()), (201, 201));
    assert_eq!(scenario.store.state().live_count(), before + 2);
}
