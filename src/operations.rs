use std::collections::BTreeMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use tokio::task::JoinSet;

use crate::arrange;
use crate::auth::Identity;
use crate::db;
use crate::error::Result;
use crate::models::{
    CreateGraphPayload, CreateLinkPayload, CreateTaskPayload, CreateWorkflowPayload, Graph,
    GraphId, LinkId, ListByGraphQuery, Position, Task, TaskId, TaskLink, UpdateGraphPayload,
    UpdatePositionPayload, UpdateTaskPayload, Workflow,
};

/// High-level board actions, one variant per store operation plus the
/// arrange pass.
///
/// Callers must provide a trusted `actor` sourced from validated auth/session
/// state, not from client-supplied fields.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum BoardOperation {
    CreateGraph {
        payload: CreateGraphPayload,
    },
    RenameGraph {
        graph_id: GraphId,
        payload: UpdateGraphPayload,
    },
    GetGraph {
        graph_id: GraphId,
    },
    ListGraphs,
    DeleteGraph {
        graph_id: GraphId,
    },
    Arrange {
        graph_id: GraphId,
    },
    CreateTask {
        payload: CreateTaskPayload,
    },
    UpdateTask {
        task_id: TaskId,
        payload: UpdateTaskPayload,
    },
    MoveTask {
        task_id: TaskId,
        payload: UpdatePositionPayload,
    },
    GetTask {
        task_id: TaskId,
    },
    ListTasks {
        query: ListByGraphQuery,
    },
    DeleteTask {
        task_id: TaskId,
    },
    CreateLink {
        payload: CreateLinkPayload,
    },
    ListLinks {
        query: ListByGraphQuery,
    },
    DeleteLink {
        link_id: LinkId,
    },
    CreateWorkflow {
        payload: CreateWorkflowPayload,
    },
    ListWorkflows {
        query: ListByGraphQuery,
    },
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum BoardOperationResult {
    Graph { graph: Graph },
    Graphs { items: Vec<Graph> },
    Task { task: Task },
    Tasks { items: Vec<Task> },
    Link { link: TaskLink },
    Links { items: Vec<TaskLink> },
    Workflow { workflow: Workflow },
    Workflows { items: Vec<Workflow> },
    Arranged { outcome: ArrangeOutcome },
    Deleted,
}

/// Result of a persisted arrange pass.
///
/// `tasks` is the snapshot with new coordinates already applied; any entries
/// in `failed_task_ids` were laid out in memory but could not be written
/// back, so their stored positions are stale until the pass is re-run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArrangeOutcome {
    pub tasks: Vec<Task>,
    pub positions: BTreeMap<TaskId, Position>,
    pub failed_task_ids: Vec<TaskId>,
}

#[derive(Clone)]
pub struct BoardOperations {
    pool: Arc<PgPool>,
}

impl BoardOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn from_pool(pool: &PgPool) -> Self {
        Self {
            pool: Arc::new(pool.clone()),
        }
    }

    pub fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }

    pub async fn execute(
        &self,
        actor: &Identity,
        operation: BoardOperation,
    ) -> Result<BoardOperationResult> {
        match operation {
            BoardOperation::CreateGraph { payload } => {
                let graph = db::create_graph(&self.pool, actor.attribution(), payload).await?;
                Ok(BoardOperationResult::Graph { graph })
            }
            BoardOperation::RenameGraph { graph_id, payload } => {
                let graph = db::rename_graph(&self.pool, graph_id, payload).await?;
                Ok(BoardOperationResult::Graph { graph })
            }
            BoardOperation::GetGraph { graph_id } => {
                let graph = db::get_graph(&self.pool, graph_id).await?;
                Ok(BoardOperationResult::Graph { graph })
            }
            BoardOperation::ListGraphs => {
                let items = db::list_graphs(&self.pool).await?;
                Ok(BoardOperationResult::Graphs { items })
            }
            BoardOperation::DeleteGraph { graph_id } => {
                db::delete_graph(&self.pool, graph_id).await?;
                Ok(BoardOperationResult::Deleted)
            }
            BoardOperation::Arrange { graph_id } => {
                let outcome = self.arrange_graph(actor, graph_id).await?;
                Ok(BoardOperationResult::Arranged { outcome })
            }
            BoardOperation::CreateTask { payload } => {
                let task = db::create_task(&self.pool, actor.attribution(), payload).await?;
                Ok(BoardOperationResult::Task { task })
            }
            BoardOperation::UpdateTask { task_id, payload } => {
                let task =
                    db::update_task(&self.pool, actor.attribution(), task_id, payload).await?;
                Ok(BoardOperationResult::Task { task })
            }
            BoardOperation::MoveTask { task_id, payload } => {
                db::update_task_position(&self.pool, task_id, payload.into()).await?;
                let task = db::get_task(&self.pool, task_id).await?;
                Ok(BoardOperationResult::Task { task })
            }
            BoardOperation::GetTask { task_id } => {
                let task = db::get_task(&self.pool, task_id).await?;
                Ok(BoardOperationResult::Task { task })
            }
            BoardOperation::ListTasks { query } => {
                let items = db::list_tasks(&self.pool, query.graph_id).await?;
                Ok(BoardOperationResult::Tasks { items })
            }
            BoardOperation::DeleteTask { task_id } => {
                db::delete_task(&self.pool, task_id).await?;
                Ok(BoardOperationResult::Deleted)
            }
            BoardOperation::CreateLink { payload } => {
                let link = db::create_link(&self.pool, payload).await?;
                Ok(BoardOperationResult::Link { link })
            }
            BoardOperation::ListLinks { query } => {
                let items = db::list_links(&self.pool, query.graph_id).await?;
                Ok(BoardOperationResult::Links { items })
            }
            BoardOperation::DeleteLink { link_id } => {
                db::delete_link(&self.pool, link_id).await?;
                Ok(BoardOperationResult::Deleted)
            }
            BoardOperation::CreateWorkflow { payload } => {
                let workflow = db::create_workflow(&self.pool, payload).await?;
                Ok(BoardOperationResult::Workflow { workflow })
            }
            BoardOperation::ListWorkflows { query } => {
                let items = db::list_workflows(&self.pool, query.graph_id).await?;
                Ok(BoardOperationResult::Workflows { items })
            }
        }
    }

    /// Runs the full arrange pass for one graph: snapshot, cycle check,
    /// leveling, layout, then one concurrent position write per task.
    ///
    /// Writes fan out and are all awaited before returning. A failed write
    /// does not roll back the in-memory layout; its task id is reported in
    /// [`ArrangeOutcome::failed_task_ids`] and the caller may simply re-run
    /// the pass.
    pub async fn arrange_graph(
        &self,
        actor: &Identity,
        graph_id: GraphId,
    ) -> Result<ArrangeOutcome> {
        let _graph = db::get_graph(&self.pool, graph_id).await?;
        let mut tasks = db::list_tasks(&self.pool, Some(graph_id)).await?;
        if tasks.is_empty() {
            // Nothing to arrange; skip the detector entirely.
            return Ok(ArrangeOutcome {
                tasks,
                positions: BTreeMap::new(),
                failed_task_ids: Vec::new(),
            });
        }

        let links = db::list_links(&self.pool, Some(graph_id)).await?;
        let node_ids: Vec<TaskId> = tasks.iter().map(|task| task.id).collect();

        tracing::debug!(
            actor = %actor.subject,
            graph = %graph_id,
            tasks = node_ids.len(),
            links = links.len(),
            "arranging graph"
        );
        let plan = arrange::plan_arrangement(&node_ids, &links)?;
        arrange::apply_positions(&mut tasks, &plan.positions);

        let mut writes = JoinSet::new();
        for (task_id, position) in &plan.positions {
            let pool = Arc::clone(&self.pool);
            let (task_id, position) = (*task_id, *position);
            writes.spawn(async move {
                let outcome = db::update_task_position(&pool, task_id, position).await;
                (task_id, outcome)
            });
        }

        let mut failed_task_ids = Vec::new();
        while let Some(joined) = writes.join_next().await {
            match joined {
                Ok((_, Ok(()))) => {}
                Ok((task_id, Err(err))) => {
                    tracing::warn!(
                        task = %task_id,
                        error = %err.source,
                        "task position write failed"
                    );
                    failed_task_ids.push(task_id);
                }
                Err(join_err) => {
                    tracing::error!(error = %join_err, "position write task aborted");
                }
            }
        }
        failed_task_ids.sort();

        Ok(ArrangeOutcome {
            tasks,
            positions: plan.positions,
            failed_task_ids,
        })
    }
}
