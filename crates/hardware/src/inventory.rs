//! GPU inventory for the diagnostics endpoint.
//!
//! Detailed per-GPU readings from `nvidia-smi` and the list of running
//! containers annotated with whether each one can see a GPU.

use std::collections::BTreeMap;

use fold_core::hardware::{parse_container_listing, parse_csv_table, CommandResult};
use serde::Serialize;

use crate::command::DiagnosticCommand;

/// Columns requested for the detailed GPU table.
const DETAILED_QUERY: &str = "--query-gpu=index,name,driver_version,temperature.gpu,\
utilization.gpu,utilization.memory,memory.total,memory.free,memory.used";

/// Errors from inventory commands.
#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("{program} command not found")]
    NotFound { program: String },

    #[error("{program} failed: {detail}")]
    Failed { program: String, detail: String },
}

/// A running container and whether `nvidia-smi` works inside it.
#[derive(Debug, Clone, Serialize)]
pub struct ContainerGpuUsage {
    pub id: String,
    pub name: String,
    pub image: String,
    pub using_gpu: bool,
}

/// Detailed readings keyed `gpu_0`, `gpu_1`, ... with one header -> value
/// map per GPU.
pub async fn detailed_gpu_info() -> Result<BTreeMap<String, BTreeMap<String, String>>, InventoryError>
{
    let cmd = DiagnosticCommand::new("nvidia-smi", [DETAILED_QUERY, "--format=csv"]);
    let stdout = successful_stdout(&cmd).await?;

    Ok(parse_csv_table(&stdout)
        .into_iter()
        .enumerate()
        .map(|(idx, row)| (format!("gpu_{idx}"), row))
        .collect())
}

/// Running containers, each checked with `docker exec <id> nvidia-smi`.
pub async fn docker_containers() -> Result<Vec<ContainerGpuUsage>, InventoryError> {
    let cmd = DiagnosticCommand::new(
        "docker",
        ["ps", "--format", "{{.ID}}\t{{.Names}}\t{{.Image}}"],
    );
    let stdout = successful_stdout(&cmd).await?;

    let mut containers = Vec::new();
    for entry in parse_container_listing(&stdout) {
        let check = DiagnosticCommand::new("docker", ["exec", entry.id.as_str(), "nvidia-smi"]);
        let using_gpu = matches!(check.run().await, CommandResult::Exited { success: true, .. });
        containers.push(ContainerGpuUsage {
            id: entry.id,
            name: entry.name,
            image: entry.image,
            using_gpu,
        });
    }

    Ok(containers)
}

async fn successful_stdout(cmd: &DiagnosticCommand) -> Result<String, InventoryError> {
    match cmd.run().await {
        CommandResult::Exited {
            success: true,
            stdout,
            ..
        } => Ok(stdout),
        CommandResult::Exited { stderr, .. } => Err(InventoryError::Failed {
            program: cmd.program.clone(),
            detail: stderr.trim().to_string(),
        }),
        CommandResult::NotFound => Err(InventoryError::NotFound {
            program: cmd.program.clone(),
        }),
        CommandResult::SpawnFailed(detail) => Err(InventoryError::Failed {
            program: cmd.program.clone(),
            detail,
        }),
        CommandResult::TimedOut { secs } => Err(InventoryError::Failed {
            program: cmd.program.clone(),
            detail: format!("timed out after {secs}s"),
        }),
    }
}
