#![allow(clippy::unwrap_used)]
//! Task state machine through the command executor

use assert_matches::assert_matches;
use meridian_authorization::{Command, CommandOutcome, DenialReason, ProcessDenial, ValidationFailure};
use meridian_core::constants::BPMN_MESSAGE_BUSINESS_KEY;
use meridian_core::resource::{TaskParameter, TaskStatus};
use meridian_core::{Operation, Resource, ResourceBody, ResourceType, RoleGrant};
use meridian_testkit::*;

async fn requested_task(scenario: &Scenario) -> Resource {
    let outcome = scenario
        .executor()
        .execute(&remote_organization_identity(), Command::Create(TaskBuilder::requested().build()))
        .await;
    match outcome {
        CommandOutcome::Created(task) => task,
        other => panic!("requested task not created: {other:?}"),
    }
}

async fn update(scenario: &Scenario, resource: Resource) -> CommandOutcome {
    scenario
        .executor()
        .execute(&local_organization_identity(), Command::Update(resource))
        .await
}

fn add_business_key(resource: &Resource, key: &str) -> Resource {
    let mut next = resource.clone();
    if let ResourceBody::Task(task) = &mut next.body {
        task.input
            .push(TaskParameter::bpmn_string(BPMN_MESSAGE_BUSINESS_KEY, key));
    }
    next
}

#[tokio::test]
async fn authorized_requester_creates_requested_task() {
    init_test_tracing();
    let scenario = Scenario::new();
    let task = requested_task(&scenario).await;
    assert_eq!(task.version, Some(1));
}

#[tokio::test]
async fn unaffiliated_requester_is_not_authorized() {
    let scenario = Scenario::new();
    let outcome = scenario
        .executor()
        .execute(
            &outsider_organization_identity(),
            Command::Create(TaskBuilder::requested().requester(OUTSIDER_ORG).build()),
        )
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Forbidden(DenialReason::ProcessNotAuthorized(ProcessDenial::Requester))
    );
    assert_eq!(outcome.status_code(), 403);
}

#[tokio::test]
async fn recipient_outside_the_authorization_is_denied() {
    let mut authorization = ping_authorization();
    authorization.recipients = vec![meridian_authorization::ParticipantPredicate::Organization {
        locality: meridian_authorization::Locality::Local,
        organization: organization_identifier("elsewhere.example"),
        practitioner_role: None,
    }];
    let scenario = Scenario::with_authorizations(&[authorization]);

    let remote = scenario
        .executor()
        .execute(&remote_organization_identity(), Command::Create(TaskBuilder::requested().build()))
        .await;
    assert_eq!(
        remote,
        CommandOutcome::Forbidden(DenialReason::ProcessNotAuthorized(ProcessDenial::Recipient))
    );

    let outsider = scenario
        .executor()
        .execute(
            &outsider_organization_identity(),
            Command::Create(TaskBuilder::requested().requester(OUTSIDER_ORG).build()),
        )
        .await;
    assert_eq!(
        outsider,
        CommandOutcome::Forbidden(DenialReason::ProcessNotAuthorized(
            ProcessDenial::RequesterAndRecipient
        ))
    );
}

#[tokio::test]
async fn unknown_process_is_denied() {
    let scenario = Scenario::with_authorizations(&[]);
    let outcome = scenario
        .executor()
        .execute(&remote_organization_identity(), Command::Create(TaskBuilder::requested().build()))
        .await;
    assert_matches!(outcome, CommandOutcome::Forbidden(DenialReason::ProcessNotFound { .. }));
}

#[tokio::test]
async fn unmatched_profile_or_message_finds_no_predicates() {
    let scenario = Scenario::new();
    let executor = scenario.executor();
    let identity = remote_organization_identity();

    for task in [
        TaskBuilder::requested().profile("http://local.example/fhir/StructureDefinition/other|1.0"),
        TaskBuilder::requested().message_name("stopPing"),
    ] {
        let outcome = executor.execute(&identity, Command::Create(task.build())).await;
        assert_eq!(
            outcome,
            CommandOutcome::Forbidden(DenialReason::ProcessNotAuthorized(
                ProcessDenial::RequesterAndRecipient
            ))
        );
    }
}

#[tokio::test]
async fn requester_must_be_the_identity_organization() {
    let scenario = Scenario::new();
    let outcome = scenario
        .executor()
        .execute(
            &remote_organization_identity(),
            Command::Create(TaskBuilder::requested().requester(OUTSIDER_ORG).build()),
        )
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Forbidden(DenialReason::Invalid(vec![
            ValidationFailure::NotIdentityOrganization {
                field: "Task.requester"
            }
        ]))
    );
}

#[tokio::test]
async fn malformed_requested_task_collects_every_failure() {
    let scenario = Scenario::new();
    let task = TaskBuilder::requested()
        .recipient(REMOTE_ORG)
        .canonical("https://local.example/Process/ping")
        .output("result", "42")
        .build();
    let outcome = scenario
        .executor()
        .execute(&remote_organization_identity(), Command::Create(task))
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Forbidden(DenialReason::Invalid(vec![
            ValidationFailure::NotLocalOrganization {
                field: "Task.restriction.recipient"
            },
            ValidationFailure::PatternMismatch {
                field: "Task.instantiatesCanonical"
            },
            ValidationFailure::NotEmpty {
                field: "Task.output"
            },
        ]))
    );
}

#[tokio::test]
async fn missing_create_role_is_cited() {
    let scenario = Scenario::new();
    let identity = local_organization_identity_with(vec![RoleGrant::all_types(Operation::Read)]);
    let outcome = scenario
        .executor()
        .execute(&identity, Command::Create(TaskBuilder::draft("draft-1").build()))
        .await;
    let CommandOutcome::Forbidden(reason) = outcome else {
        panic!("expected a denial");
    };
    assert_eq!(reason.to_string(), "identity lacks role CREATE on Task");
}

#[tokio::test]
async fn tasks_cannot_be_created_in_later_states() {
    let scenario = Scenario::new();
    for status in [TaskStatus::InProgress, TaskStatus::Completed, TaskStatus::Failed] {
        let outcome = scenario
            .executor()
            .execute(
                &local_organization_identity(),
                Command::Create(TaskBuilder::requested().requester(LOCAL_ORG).status(status).build()),
            )
            .await;
        assert_eq!(
            outcome,
            CommandOutcome::Forbidden(DenialReason::IllegalTransition {
                from: "none".into(),
                to: status.as_str().into(),
            })
        );
    }
}

#[tokio::test]
async fn recipient_runs_the_task_to_completion() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;

    let started = add_business_key(&with_task_status(&requested, TaskStatus::InProgress), "bk-1");
    let in_progress = match update(&scenario, started).await {
        CommandOutcome::Updated(task) => task,
        other => panic!("start denied: {other:?}"),
    };

    let completed = with_task_status(&in_progress, TaskStatus::Completed);
    let outcome = update(&scenario, completed).await;
    assert_matches!(outcome, CommandOutcome::Updated(ref task) if task.version == Some(3));
    assert_eq!(outcome.status_code(), 200);
}

#[tokio::test]
async fn in_progress_task_can_fail() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;
    let CommandOutcome::Updated(in_progress) =
        update(&scenario, with_task_status(&requested, TaskStatus::InProgress)).await
    else {
        panic!("start denied");
    };
    let outcome = update(&scenario, with_task_status(&in_progress, TaskStatus::Failed)).await;
    assert!(outcome.is_success());
}

#[tokio::test]
async fn starting_a_task_may_not_rewrite_it() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;

    let mut rewritten = with_task_status(&requested, TaskStatus::InProgress);
    if let ResourceBody::Task(task) = &mut rewritten.body {
        task.requester = Some(organization_reference(OUTSIDER_ORG));
    }
    assert_eq!(
        update(&scenario, rewritten).await,
        CommandOutcome::Forbidden(DenialReason::ImmutableFieldsChanged(vec!["Task.requester"]))
    );

    let two_keys = add_business_key(
        &add_business_key(&with_task_status(&requested, TaskStatus::InProgress), "bk-1"),
        "bk-2",
    );
    assert_eq!(
        update(&scenario, two_keys).await,
        CommandOutcome::Forbidden(DenialReason::ImmutableFieldsChanged(vec!["Task.input"]))
    );

    let mut with_output = with_task_status(&requested, TaskStatus::InProgress);
    if let ResourceBody::Task(task) = &mut with_output.body {
        task.output.push(TaskParameter::bpmn_string("result", "early"));
    }
    assert_matches!(
        update(&scenario, with_output).await,
        CommandOutcome::Forbidden(DenialReason::Invalid(_))
    );
}

const STATUSES: [TaskStatus; 12] = [
    TaskStatus::Draft,
    TaskStatus::Requested,
    TaskStatus::Received,
    TaskStatus::Accepted,
    TaskStatus::Rejected,
    TaskStatus::Ready,
    TaskStatus::Cancelled,
    TaskStatus::InProgress,
    TaskStatus::OnHold,
    TaskStatus::Failed,
    TaskStatus::Completed,
    TaskStatus::EnteredInError,
];

const LEGAL_UPDATES: [(TaskStatus, TaskStatus); 4] = [
    (TaskStatus::Draft, TaskStatus::Draft),
    (TaskStatus::Requested, TaskStatus::InProgress),
    (TaskStatus::InProgress, TaskStatus::Completed),
    (TaskStatus::InProgress, TaskStatus::Failed),
];

#[tokio::test]
async fn skipping_states_is_illegal() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;
    assert_eq!(
        update(&scenario, with_task_status(&requested, TaskStatus::Completed)).await,
        CommandOutcome::Forbidden(DenialReason::IllegalTransition {
            from: "requested".into(),
            to: "completed".into(),
        })
    );
}

#[tokio::test]
async fn every_transition_outside_the_lifecycle_is_illegal() {
    let scenario = Scenario::new();
    let local = local_organization_identity();
    assert!(local.has_role(meridian_core::ServerRole::new(Operation::Update, ResourceType::Task)));

    for from in STATUSES {
        let stored = scenario
            .seed([TaskBuilder::requested().status(from).build()])
            .pop()
            .unwrap();
        for to in STATUSES {
            if LEGAL_UPDATES.contains(&(from, to)) {
                continue;
            }
            assert_eq!(
                update(&scenario, with_task_status(&stored, to)).await,
                CommandOutcome::Forbidden(DenialReason::IllegalTransition {
                    from: from.as_str().into(),
                    to: to.as_str().into(),
                }),
                "{} -> {} allowed",
                from.as_str(),
                to.as_str()
            );
        }
    }
}

#[tokio::test]
async fn remote_identity_cannot_start_a_task() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;
    let mut remote = remote_organization_identity();
    remote.roles.push(RoleGrant::all_types(Operation::Update));
    let outcome = scenario
        .executor()
        .execute(&remote, Command::Update(with_task_status(&requested, TaskStatus::InProgress)))
        .await;
    assert_eq!(outcome, CommandOutcome::Forbidden(DenialReason::NotLocalOrganization));
}

#[tokio::test]
async fn admin_practitioner_acts_for_the_local_organization() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;

    let plain = local_practitioner(vec![practitioner_role("DIC_USER")]);
    let outcome = scenario
        .executor()
        .execute(&plain, Command::Update(with_task_status(&requested, TaskStatus::InProgress)))
        .await;
    assert_eq!(outcome, CommandOutcome::Forbidden(DenialReason::NotLocalOrganization));

    let admin = local_practitioner(vec![scenario.config.admin_role()]);
    let outcome = scenario
        .executor()
        .execute(&admin, Command::Update(with_task_status(&requested, TaskStatus::InProgress)))
        .await;
    assert!(outcome.is_success(), "{outcome:?}");
}

#[tokio::test]
async fn draft_lifecycle_and_duplicate_identifier() {
    let scenario = Scenario::new();
    let executor = scenario.executor();
    let local = local_organization_identity();

    let draft = match executor
        .execute(&local, Command::Create(TaskBuilder::draft("draft-1").build()))
        .await
    {
        CommandOutcome::Created(task) => task,
        other => panic!("draft not created: {other:?}"),
    };

    let duplicate = executor
        .execute(&local, Command::Create(TaskBuilder::draft("draft-1").build()))
        .await;
    let CommandOutcome::Forbidden(reason) = &duplicate else {
        panic!("duplicate draft accepted");
    };
    assert_eq!(reason.to_string(), "unique resource already exists");

    let renamed = {
        let mut next = draft.clone();
        if let ResourceBody::Task(task) = &mut next.body {
            task.identifier[0].value = "draft-2".into();
        }
        next
    };
    assert_eq!(
        executor.execute(&local, Command::Update(renamed)).await,
        CommandOutcome::Forbidden(DenialReason::ImmutableFieldsChanged(vec!["identifier"]))
    );

    assert!(executor.execute(&local, Command::Update(draft.clone())).await.is_success());

    let deleted = executor
        .execute(
            &local,
            Command::Delete {
                resource_type: ResourceType::Task,
                id: draft.id.clone().unwrap(),
            },
        )
        .await;
    assert_eq!(deleted.status_code(), 204);

    let recreated = executor
        .execute(&local, Command::Create(TaskBuilder::draft("draft-1").build()))
        .await;
    assert_eq!(recreated.status_code(), 201);
}

#[tokio::test]
async fn draft_needs_a_local_requester_and_one_identifier() {
    let scenario = Scenario::new();
    let task = TaskBuilder::requested().status(TaskStatus::Draft).build();
    let outcome = scenario
        .executor()
        .execute(&local_organization_identity(), Command::Create(task))
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Forbidden(DenialReason::Invalid(vec![
            ValidationFailure::NotLocalOrganization {
                field: "Task.requester"
            },
            ValidationFailure::NotExactlyOne {
                field: "Task.identifier[task-identifier]"
            },
        ]))
    );
}

#[tokio::test]
async fn only_drafts_can_be_deleted() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;
    let outcome = scenario
        .executor()
        .execute(
            &local_organization_identity(),
            Command::Delete {
                resource_type: ResourceType::Task,
                id: requested.id.clone().unwrap(),
            },
        )
        .await;
    assert_eq!(
        outcome,
        CommandOutcome::Forbidden(DenialReason::IllegalTransition {
            from: "requested".into(),
            to: "deleted".into(),
        })
    );
}

#[tokio::test]
async fn task_is_readable_by_requester_and_local_recipient_only() {
    let scenario = Scenario::new();
    let requested = requested_task(&scenario).await;
    let read = |identity| {
        let executor = scenario.executor();
        let id = requested.id.clone().unwrap();
        async move {
            executor
                .execute(
                    &identity,
                    Command::Read {
                        resource_type: ResourceType::Task,
                        id,
                    },
                )
                .await
        }
    };

    assert!(read(remote_organization_identity()).await.is_success());
    assert!(read(local_organization_identity()).await.is_success());
    assert_eq!(
        read(outsider_organization_identity()).await,
        CommandOutcome::Forbidden(DenialReason::NotTaskParticipant)
    );
}
