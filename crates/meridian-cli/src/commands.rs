//! Request subcommands shared by `decide` and `execute`

use crate::session::{parse_target, read_json, Session};
use anyhow::{bail, Result};
use clap::{Args, Subcommand};
use meridian_authorization::{AuthorizationRequest, Command, CommandOutcome};
use meridian_core::{Resource, ResourceType};
use std::path::{Path, PathBuf};

/// Inputs of one evaluated request
#[derive(Args)]
pub struct RequestArgs {
    /// JSON array of resources stored before the request
    #[arg(long)]
    pub seed: PathBuf,

    /// JSON identity making the request
    #[arg(long)]
    pub identity: PathBuf,

    #[command(subcommand)]
    pub request: RequestCommand,
}

#[derive(Subcommand)]
pub enum RequestCommand {
    /// Create the resource in FILE
    Create { file: PathBuf },
    /// Read TYPE/ID
    Read { target: String },
    /// Replace the stored version with the resource in FILE (matched by id)
    Update { file: PathBuf },
    /// Soft-delete TYPE/ID
    Delete { target: String },
    /// Remove TYPE/ID and its history
    PermanentDelete { target: String },
    /// Search resources of TYPE
    Search { resource_type: ResourceType },
    /// History of TYPE, or of the whole server when omitted
    History { resource_type: Option<ResourceType> },
    /// Websocket subscription on TYPE
    Websocket { resource_type: ResourceType },
}

fn updated_resource(file: &Path) -> Result<(Resource, String)> {
    let resource: Resource = read_json(file)?;
    let Some(id) = resource.id.clone() else {
        bail!("{} has no id", file.display());
    };
    let target = format!("{}/{id}", resource.resource_type());
    Ok((resource, target))
}

/// Print the decision; true when granted
pub async fn decide(session: &Session, request: RequestCommand) -> Result<bool> {
    let decision = match request {
        RequestCommand::Create { file } => {
            let new: Resource = read_json(&file)?;
            session.authorize(AuthorizationRequest::Create(&new)).await?
        }
        RequestCommand::Read { target } => {
            let existing = session.live(&target).await?;
            session.authorize(AuthorizationRequest::Read(&existing)).await?
        }
        RequestCommand::Update { file } => {
            let (new, target) = updated_resource(&file)?;
            let old = session.live(&target).await?;
            session
                .authorize(AuthorizationRequest::Update { old: &old, new: &new })
                .await?
        }
        RequestCommand::Delete { target } => {
            let old = session.live(&target).await?;
            session.authorize(AuthorizationRequest::Delete(&old)).await?
        }
        RequestCommand::PermanentDelete { target } => {
            let old = session.any(&target).await?;
            session.authorize(AuthorizationRequest::PermanentDelete(&old)).await?
        }
        RequestCommand::Search { resource_type } => {
            session.authorize(AuthorizationRequest::Search(resource_type)).await?
        }
        RequestCommand::History {
            resource_type: Some(resource_type),
        } => session.authorize(AuthorizationRequest::History(resource_type)).await?,
        RequestCommand::History { resource_type: None } => {
            session.authorize(AuthorizationRequest::RootHistory).await?
        }
        RequestCommand::Websocket { resource_type } => {
            session.authorize(AuthorizationRequest::Websocket(resource_type)).await?
        }
    };
    println!("{decision}");
    Ok(decision.is_granted())
}

fn command(request: RequestCommand) -> Result<Command> {
    Ok(match request {
        RequestCommand::Create { file } => Command::Create(read_json(&file)?),
        RequestCommand::Update { file } => Command::Update(read_json(&file)?),
        RequestCommand::Read { target } => {
            let (resource_type, id) = parse_target(&target)?;
            Command::Read { resource_type, id }
        }
        RequestCommand::Delete { target } => {
            let (resource_type, id) = parse_target(&target)?;
            Command::Delete { resource_type, id }
        }
        RequestCommand::PermanentDelete { target } => {
            let (resource_type, id) = parse_target(&target)?;
            Command::PermanentDelete { resource_type, id }
        }
        RequestCommand::Search { .. }
        | RequestCommand::History { .. }
        | RequestCommand::Websocket { .. } => {
            bail!("type-level requests have nothing to apply; use `decide`")
        }
    })
}

/// Apply the request, print status code and outcome; true on success
pub async fn execute(session: &Session, request: RequestCommand) -> Result<bool> {
    let outcome = session.executor.execute(&session.identity, command(request)?).await;

    println!("{}", outcome.status_code());
    match &outcome {
        CommandOutcome::Created(resource)
        | CommandOutcome::Updated(resource)
        | CommandOutcome::Read(resource) => {
            println!("{}", serde_json::to_string_pretty(resource)?);
        }
        CommandOutcome::Deleted { resource_type, id } => println!("{resource_type}/{id} deleted"),
        CommandOutcome::Forbidden(reason) => println!("{reason}"),
        CommandOutcome::NotFound { resource_type, id } => println!("{resource_type}/{id} not found"),
        CommandOutcome::Fault(err) => println!("{err}"),
    }
    Ok(outcome.is_success())
}
