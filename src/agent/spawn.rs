//! Parallel execution of sub-agent spawn requests.
//!
//! A batch of spawn requests runs concurrently on `tokio` tasks bounded
//! by a semaphore sized `min(batch, parallel_workers)`. Each child is a
//! full [`RecursiveAgent`] with its own transcript and index
//! connections; results are reconciled by `tool_call_id`, so the
//! LLM-visible ordering is independent of completion order. Child run
//! failures become `Error in <label>: ...` strings returned to the
//! parent as the tool result.

use std::sync::Arc;

use futures_util::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::debug;

use super::recursive::{RecursiveAgent, RunOptions};
use super::tool::SpawnRequest;

/// A spawn request deferred during tool processing.
#[derive(Debug, Clone)]
pub struct PendingSpawn {
    /// The originating tool call, used to reconcile the result.
    pub tool_call_id: String,
    /// The parsed request.
    pub request: SpawnRequest,
}

/// One reconciled spawn result.
#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    /// Tool call whose placeholder result gets replaced.
    pub tool_call_id: String,
    /// Sub-agent output (or `Error in ...` string).
    pub content: String,
}

/// Runs one child to completion. Boxed so the recursive agent future
/// type stays finite.
fn run_child(
    mut child: RecursiveAgent,
    task: String,
    label: String,
    semaphore: Arc<Semaphore>,
) -> BoxFuture<'static, String> {
    Box::pin(async move {
        let _permit = match semaphore.acquire().await {
            Ok(permit) => permit,
            Err(e) => return format!("Error in {label}: {e}"),
        };
        match child.run(&task, RunOptions::default()).await {
            Ok(result) => {
                debug!(label = %label, preview = %result.chars().take(80).collect::<String>(),
                       "sub-agent completed");
                format!("[{label}]: {result}")
            }
            Err(e) => format!("Error in {label}: {e}"),
        }
    })
}

/// Executes a batch of spawn requests in parallel.
///
/// Children are constructed synchronously under the parent's
/// mutex-protected counter (unique ids even under parallel spawns),
/// then executed concurrently. The returned outcomes carry the
/// originating `tool_call_id`s.
pub async fn execute_spawns(
    parent: &RecursiveAgent,
    spawns: Vec<PendingSpawn>,
) -> Vec<SpawnOutcome> {
    if spawns.is_empty() {
        return Vec::new();
    }

    let workers = parent.spawn_workers(spawns.len());
    let semaphore = Arc::new(Semaphore::new(workers));

    enum Launched {
        Running(tokio::task::JoinHandle<String>),
        Immediate(String),
    }

    let mut launched = Vec::with_capacity(spawns.len());
    for spawn in spawns {
        match parent.build_child(&spawn.request) {
            Ok((child, task, label)) => {
                let handle =
                    tokio::spawn(run_child(child, task, label, Arc::clone(&semaphore)));
                launched.push((spawn.tool_call_id, Launched::Running(handle)));
            }
            // Unknown predefined agents and similar failures resolve
            // immediately without burning a worker slot.
            Err(message) => launched.push((spawn.tool_call_id, Launched::Immediate(message))),
        }
    }

    let mut outcomes = Vec::with_capacity(launched.len());
    for (tool_call_id, entry) in launched {
        let content = match entry {
            Launched::Running(handle) => match handle.await {
                Ok(content) => content,
                Err(e) => format!("Error in sub-agent: {e}"),
            },
            Launched::Immediate(message) => message,
        };
        outcomes.push(SpawnOutcome {
            tool_call_id,
            content,
        });
    }
    outcomes
}
