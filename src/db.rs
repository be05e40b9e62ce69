use anyhow::anyhow;
use once_cell::sync::Lazy;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::{LibError, Result};
use crate::models::{
    CreateGraphPayload, CreateLinkPayload, CreateTaskPayload, CreateWorkflowPayload, Graph,
    GraphId, LinkId, Position, Task, TaskFields, TaskId, TaskLink, TaskStatus,
    UpdateGraphPayload, UpdateTaskPayload, Workflow, WorkflowId,
};

pub static MIGRATOR: Lazy<Migrator> = Lazy::new(|| {
    let mut migrator = sqlx::migrate!("./migrations");
    migrator.set_ignore_missing(true);
    migrator
});

pub async fn create_board_tables(pool: &PgPool) -> std::result::Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[derive(Debug, Clone, FromRow)]
struct GraphRow {
    id: Uuid,
    name: String,
    created_by: String,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct TaskRow {
    id: Uuid,
    graph_id: Uuid,
    workflow_id: Option<Uuid>,
    title: String,
    description: String,
    status: String,
    background_color: String,
    foreground_color: String,
    assigned_to: Option<String>,
    assigned_by: Option<String>,
    created_by: String,
    updated_by: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
    created_at: chrono::NaiveDateTime,
    updated_at: chrono::NaiveDateTime,
}

#[derive(Debug, Clone, FromRow)]
struct LinkRow {
    id: Uuid,
    graph_id: Uuid,
    source_task_id: Uuid,
    target_task_id: Uuid,
}

#[derive(Debug, Clone, FromRow)]
struct WorkflowRow {
    id: Uuid,
    graph_id: Uuid,
    label: String,
}

impl From<GraphRow> for Graph {
    fn from(value: GraphRow) -> Self {
        Self {
            id: GraphId(value.id),
            name: value.name,
            created_by: value.created_by,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<TaskRow> for Task {
    fn from(value: TaskRow) -> Self {
        Self {
            id: TaskId(value.id),
            graph_id: GraphId(value.graph_id),
            workflow_id: value.workflow_id.map(WorkflowId),
            title: value.title,
            description: value.description,
            status: TaskStatus::from_db_value(&value.status).unwrap_or_default(),
            background_color: value.background_color,
            foreground_color: value.foreground_color,
            assigned_to: value.assigned_to,
            assigned_by: value.assigned_by,
            created_by: value.created_by,
            updated_by: value.updated_by,
            x: value.x,
            y: value.y,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

impl From<LinkRow> for TaskLink {
    fn from(value: LinkRow) -> Self {
        Self {
            id: LinkId(value.id),
            graph_id: GraphId(value.graph_id),
            source: TaskId(value.source_task_id),
            target: TaskId(value.target_task_id),
        }
    }
}

impl From<WorkflowRow> for Workflow {
    fn from(value: WorkflowRow) -> Self {
        Self {
            id: WorkflowId(value.id),
            graph_id: GraphId(value.graph_id),
            label: value.label,
        }
    }
}

fn db_err(public: &'static str, err: sqlx::Error) -> LibError {
    LibError::database(public, anyhow!(err))
}

async fn load_graph(pool: &PgPool, graph_id: GraphId) -> Result<GraphRow> {
    let row = sqlx::query_as::<_, GraphRow>(
        r#"
        SELECT id, name, created_by, created_at, updated_at
        FROM board.graphs
        WHERE id = $1
        "#,
    )
    .bind(graph_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query graph", err))?;

    row.ok_or_else(|| {
        LibError::not_found("Graph not found", anyhow!("graph {} not found", graph_id))
    })
}

async fn ensure_task_in_graph(
    pool: &PgPool,
    task_id: TaskId,
    graph_id: GraphId,
    public: &'static str,
) -> Result<()> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM board.tasks
            WHERE id = $1
              AND graph_id = $2
        )
        "#,
    )
    .bind(task_id.0)
    .bind(graph_id.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to query tasks", err))?;

    if exists.0 {
        Ok(())
    } else {
        Err(LibError::invalid(
            public,
            anyhow!("task {} is not in graph {}", task_id, graph_id),
        ))
    }
}

async fn ensure_workflow_in_graph(
    pool: &PgPool,
    workflow_id: WorkflowId,
    graph_id: GraphId,
) -> Result<()> {
    let exists: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM board.workflows
            WHERE id = $1
              AND graph_id = $2
        )
        "#,
    )
    .bind(workflow_id.0)
    .bind(graph_id.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to query workflows", err))?;

    if exists.0 {
        Ok(())
    } else {
        Err(LibError::invalid(
            "Workflow not found in this graph",
            anyhow!("workflow {} is not in graph {}", workflow_id, graph_id),
        ))
    }
}

pub async fn create_graph(
    pool: &PgPool,
    created_by: &str,
    payload: CreateGraphPayload,
) -> Result<Graph> {
    let name = payload.normalize()?;
    let graph_id = GraphId(Uuid::new_v4());

    sqlx::query(
        r#"
        INSERT INTO board.graphs (id, name, created_by)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(graph_id.0)
    .bind(&name)
    .bind(created_by)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to create graph", err))?;

    get_graph(pool, graph_id).await
}

pub async fn get_graph(pool: &PgPool, graph_id: GraphId) -> Result<Graph> {
    load_graph(pool, graph_id).await.map(Graph::from)
}

pub async fn list_graphs(pool: &PgPool) -> Result<Vec<Graph>> {
    let rows = sqlx::query_as::<_, GraphRow>(
        r#"
        SELECT id, name, created_by, created_at, updated_at
        FROM board.graphs
        ORDER BY updated_at DESC, id DESC
        "#,
    )
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list graphs", err))?;

    Ok(rows.into_iter().map(Graph::from).collect())
}

pub async fn rename_graph(
    pool: &PgPool,
    graph_id: GraphId,
    payload: UpdateGraphPayload,
) -> Result<Graph> {
    let name = payload.normalize()?;
    let _graph = load_graph(pool, graph_id).await?;

    sqlx::query(
        r#"
        UPDATE board.graphs
        SET name = $1,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $2
        "#,
    )
    .bind(&name)
    .bind(graph_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to update graph", err))?;

    get_graph(pool, graph_id).await
}

/// Deletes a graph; tasks, links, and workflows in it go with it.
pub async fn delete_graph(pool: &PgPool, graph_id: GraphId) -> Result<()> {
    let _graph = load_graph(pool, graph_id).await?;

    sqlx::query(
        r#"
        DELETE FROM board.graphs
        WHERE id = $1
        "#,
    )
    .bind(graph_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to delete graph", err))?;

    Ok(())
}

pub async fn create_task(
    pool: &PgPool,
    created_by: &str,
    payload: CreateTaskPayload,
) -> Result<Task> {
    let definition = payload.normalize()?;
    let _graph = load_graph(pool, definition.graph_id).await?;
    if let Some(workflow_id) = definition.fields.workflow_id {
        ensure_workflow_in_graph(pool, workflow_id, definition.graph_id).await?;
    }

    let task_id = TaskId(Uuid::new_v4());
    insert_task(pool, task_id, definition.graph_id, created_by, &definition.fields).await?;
    get_task(pool, task_id).await
}

async fn insert_task(
    pool: &PgPool,
    task_id: TaskId,
    graph_id: GraphId,
    created_by: &str,
    fields: &TaskFields,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO board.tasks (
            id,
            graph_id,
            workflow_id,
            title,
            description,
            status,
            background_color,
            foreground_color,
            assigned_to,
            assigned_by,
            created_by,
            x,
            y
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
    )
    .bind(task_id.0)
    .bind(graph_id.0)
    .bind(fields.workflow_id.map(|id| id.0))
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.status.as_db_value())
    .bind(&fields.background_color)
    .bind(&fields.foreground_color)
    .bind(&fields.assigned_to)
    .bind(&fields.assigned_by)
    .bind(created_by)
    .bind(fields.x)
    .bind(fields.y)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to create task", err))?;

    Ok(())
}

pub async fn get_task(pool: &PgPool, task_id: TaskId) -> Result<Task> {
    let row = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT
            id,
            graph_id,
            workflow_id,
            title,
            description,
            status,
            background_color,
            foreground_color,
            assigned_to,
            assigned_by,
            created_by,
            updated_by,
            x,
            y,
            created_at,
            updated_at
        FROM board.tasks
        WHERE id = $1
        "#,
    )
    .bind(task_id.0)
    .fetch_optional(pool)
    .await
    .map_err(|err| db_err("Failed to query task", err))?;

    row.map(Task::from).ok_or_else(|| {
        LibError::not_found("Task not found", anyhow!("task {} not found", task_id))
    })
}

pub async fn list_tasks(pool: &PgPool, graph_id: Option<GraphId>) -> Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, TaskRow>(
        r#"
        SELECT
            id,
            graph_id,
            workflow_id,
            title,
            description,
            status,
            background_color,
            foreground_color,
            assigned_to,
            assigned_by,
            created_by,
            updated_by,
            x,
            y,
            created_at,
            updated_at
        FROM board.tasks
        WHERE $1::uuid IS NULL OR graph_id = $1
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .bind(graph_id.map(|id| id.0))
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list tasks", err))?;

    Ok(rows.into_iter().map(Task::from).collect())
}

pub async fn update_task(
    pool: &PgPool,
    updated_by: &str,
    task_id: TaskId,
    payload: UpdateTaskPayload,
) -> Result<Task> {
    let fields = payload.normalize()?;
    let existing = get_task(pool, task_id).await?;
    if let Some(workflow_id) = fields.workflow_id {
        ensure_workflow_in_graph(pool, workflow_id, existing.graph_id).await?;
    }

    sqlx::query(
        r#"
        UPDATE board.tasks
        SET workflow_id = $1,
            title = $2,
            description = $3,
            status = $4,
            background_color = $5,
            foreground_color = $6,
            assigned_to = $7,
            assigned_by = $8,
            x = $9,
            y = $10,
            updated_by = $11,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $12
        "#,
    )
    .bind(fields.workflow_id.map(|id| id.0))
    .bind(&fields.title)
    .bind(&fields.description)
    .bind(fields.status.as_db_value())
    .bind(&fields.background_color)
    .bind(&fields.foreground_color)
    .bind(&fields.assigned_to)
    .bind(&fields.assigned_by)
    .bind(fields.x)
    .bind(fields.y)
    .bind(updated_by)
    .bind(task_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to update task", err))?;

    get_task(pool, task_id).await
}

/// Idempotent position write: only `x` and `y` change.
pub async fn update_task_position(
    pool: &PgPool,
    task_id: TaskId,
    position: Position,
) -> Result<()> {
    let result = sqlx::query(
        r#"
        UPDATE board.tasks
        SET x = $1,
            y = $2,
            updated_at = CURRENT_TIMESTAMP
        WHERE id = $3
        "#,
    )
    .bind(position.x)
    .bind(position.y)
    .bind(task_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to update task position", err))?;

    if result.rows_affected() == 0 {
        return Err(LibError::not_found(
            "Task not found",
            anyhow!("task {} not found for position update", task_id),
        ));
    }

    Ok(())
}

/// Deletes a task and, via the schema, every link touching it.
pub async fn delete_task(pool: &PgPool, task_id: TaskId) -> Result<()> {
    let _task = get_task(pool, task_id).await?;

    sqlx::query(
        r#"
        DELETE FROM board.tasks
        WHERE id = $1
        "#,
    )
    .bind(task_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to delete task", err))?;

    Ok(())
}

pub async fn create_link(pool: &PgPool, payload: CreateLinkPayload) -> Result<TaskLink> {
    let _graph = load_graph(pool, payload.graph_id).await?;
    ensure_task_in_graph(
        pool,
        payload.source,
        payload.graph_id,
        "Link source task not found in this graph",
    )
    .await?;
    ensure_task_in_graph(
        pool,
        payload.target,
        payload.graph_id,
        "Link target task not found in this graph",
    )
    .await?;

    let duplicate: (bool,) = sqlx::query_as(
        r#"
        SELECT EXISTS(
            SELECT 1
            FROM board.links
            WHERE graph_id = $1
              AND source_task_id = $2
              AND target_task_id = $3
        )
        "#,
    )
    .bind(payload.graph_id.0)
    .bind(payload.source.0)
    .bind(payload.target.0)
    .fetch_one(pool)
    .await
    .map_err(|err| db_err("Failed to query links", err))?;

    if duplicate.0 {
        return Err(LibError::invalid_with_code(
            "link_exists",
            "Link already exists",
            anyhow!(
                "duplicate link {} -> {} in graph {}",
                payload.source,
                payload.target,
                payload.graph_id
            ),
        ));
    }

    let link_id = LinkId(Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO board.links (id, graph_id, source_task_id, target_task_id)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(link_id.0)
    .bind(payload.graph_id.0)
    .bind(payload.source.0)
    .bind(payload.target.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to create link", err))?;

    Ok(TaskLink {
        id: link_id,
        graph_id: payload.graph_id,
        source: payload.source,
        target: payload.target,
    })
}

pub async fn list_links(pool: &PgPool, graph_id: Option<GraphId>) -> Result<Vec<TaskLink>> {
    let rows = sqlx::query_as::<_, LinkRow>(
        r#"
        SELECT id, graph_id, source_task_id, target_task_id
        FROM board.links
        WHERE $1::uuid IS NULL OR graph_id = $1
        ORDER BY source_task_id ASC, target_task_id ASC
        "#,
    )
    .bind(graph_id.map(|id| id.0))
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list links", err))?;

    Ok(rows.into_iter().map(TaskLink::from).collect())
}

pub async fn delete_link(pool: &PgPool, link_id: LinkId) -> Result<()> {
    let result = sqlx::query(
        r#"
        DELETE FROM board.links
        WHERE id = $1
        "#,
    )
    .bind(link_id.0)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to delete link", err))?;

    if result.rows_affected() == 0 {
        return Err(LibError::not_found(
            "Link not found",
            anyhow!("link {} not found", link_id),
        ));
    }

    Ok(())
}

pub async fn create_workflow(pool: &PgPool, payload: CreateWorkflowPayload) -> Result<Workflow> {
    let (graph_id, label) = payload.normalize()?;
    let _graph = load_graph(pool, graph_id).await?;

    let workflow_id = WorkflowId(Uuid::new_v4());
    sqlx::query(
        r#"
        INSERT INTO board.workflows (id, graph_id, label)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(workflow_id.0)
    .bind(graph_id.0)
    .bind(&label)
    .execute(pool)
    .await
    .map_err(|err| db_err("Failed to create workflow", err))?;

    Ok(Workflow {
        id: workflow_id,
        graph_id,
        label,
    })
}

pub async fn list_workflows(pool: &PgPool, graph_id: Option<GraphId>) -> Result<Vec<Workflow>> {
    let rows = sqlx::query_as::<_, WorkflowRow>(
        r#"
        SELECT id, graph_id, label
        FROM board.workflows
        WHERE $1::uuid IS NULL OR graph_id = $1
        ORDER BY label ASC, id ASC
        "#,
    )
    .bind(graph_id.map(|id| id.0))
    .fetch_all(pool)
    .await
    .map_err(|err| db_err("Failed to list workflows", err))?;

    Ok(rows.into_iter().map(Workflow::from).collect())
}
