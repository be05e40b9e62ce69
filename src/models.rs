use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{LibError, Result};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct GraphId(pub Uuid);

impl fmt::Display for GraphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for GraphId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for GraphId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct TaskId(pub Uuid);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for TaskId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct LinkId(pub Uuid);

impl fmt::Display for LinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LinkId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for LinkId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct WorkflowId(pub Uuid);

impl fmt::Display for WorkflowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for WorkflowId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

impl From<Uuid> for WorkflowId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    #[serde(rename = "In Process")]
    InProcess,
    Completed,
}

impl TaskStatus {
    pub const fn as_db_value(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProcess => "in_process",
            TaskStatus::Completed => "completed",
        }
    }

    pub fn from_db_value(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(TaskStatus::Pending),
            "in_process" => Some(TaskStatus::InProcess),
            "completed" => Some(TaskStatus::Completed),
            _ => None,
        }
    }
}

/// A workspace partition; tasks, links, and workflows all hang off one graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Graph {
    pub id: GraphId,
    pub name: String,
    pub created_by: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: TaskId,
    pub graph_id: GraphId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub background_color: String,
    pub foreground_color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_by: Option<String>,
    pub created_by: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<f64>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Directed dependency: `target` depends on `source`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLink {
    pub id: LinkId,
    pub graph_id: GraphId,
    pub source: TaskId,
    pub target: TaskId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub id: WorkflowId,
    pub graph_id: GraphId,
    pub label: String,
}

/// Canvas coordinates in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

pub const DEFAULT_BACKGROUND_COLOR: &str = "#ffffff";
pub const DEFAULT_FOREGROUND_COLOR: &str = "#000000";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateGraphPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGraphPayload {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskPayload {
    pub graph_id: GraphId,
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub background_color: Option<String>,
    pub foreground_color: Option<String>,
    pub workflow_id: Option<WorkflowId>,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskPayload {
    pub title: String,
    pub description: Option<String>,
    pub status: Option<TaskStatus>,
    pub background_color: Option<String>,
    pub foreground_color: Option<String>,
    pub workflow_id: Option<WorkflowId>,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

/// Position-only update issued by drag-stop and by the arrange pass.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePositionPayload {
    pub x: f64,
    pub y: f64,
}

impl From<UpdatePositionPayload> for Position {
    fn from(value: UpdatePositionPayload) -> Self {
        Self {
            x: value.x,
            y: value.y,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateLinkPayload {
    pub graph_id: GraphId,
    pub source: TaskId,
    pub target: TaskId,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWorkflowPayload {
    pub graph_id: GraphId,
    pub label: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListByGraphQuery {
    pub graph_id: Option<GraphId>,
}

/// Validated task fields shared by create and update writes.
#[derive(Debug, Clone)]
pub struct TaskFields {
    pub workflow_id: Option<WorkflowId>,
    pub title: String,
    pub description: String,
    pub status: TaskStatus,
    pub background_color: String,
    pub foreground_color: String,
    pub assigned_to: Option<String>,
    pub assigned_by: Option<String>,
    pub x: Option<f64>,
    pub y: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct TaskDefinition {
    pub graph_id: GraphId,
    pub fields: TaskFields,
}

impl CreateGraphPayload {
    pub fn normalize(self) -> Result<String> {
        normalize_graph_name(self.name)
    }
}

impl UpdateGraphPayload {
    pub fn normalize(self) -> Result<String> {
        normalize_graph_name(self.name)
    }
}

impl CreateTaskPayload {
    pub fn normalize(self) -> Result<TaskDefinition> {
        let fields = normalize_task_fields(
            self.title,
            self.description,
            self.status,
            self.background_color,
            self.foreground_color,
            self.workflow_id,
            self.assigned_to,
            self.assigned_by,
            self.x,
            self.y,
        )?;
        Ok(TaskDefinition {
            graph_id: self.graph_id,
            fields,
        })
    }
}

impl UpdateTaskPayload {
    pub fn normalize(self) -> Result<TaskFields> {
        normalize_task_fields(
            self.title,
            self.description,
            self.status,
            self.background_color,
            self.foreground_color,
            self.workflow_id,
            self.assigned_to,
            self.assigned_by,
            self.x,
            self.y,
        )
    }
}

impl CreateWorkflowPayload {
    pub fn normalize(self) -> Result<(GraphId, String)> {
        let label = self.label.trim().to_string();
        if label.is_empty() {
            return Err(LibError::invalid(
                "Workflow label is required",
                anyhow!("empty workflow label"),
            ));
        }
        Ok((self.graph_id, label))
    }
}

fn normalize_graph_name(name: String) -> Result<String> {
    let name = name.trim().to_string();
    if name.is_empty() {
        return Err(LibError::invalid(
            "Graph name is required",
            anyhow!("empty graph name"),
        ));
    }
    Ok(name)
}

#[allow(clippy::too_many_arguments)]
fn normalize_task_fields(
    title: String,
    description: Option<String>,
    status: Option<TaskStatus>,
    background_color: Option<String>,
    foreground_color: Option<String>,
    workflow_id: Option<WorkflowId>,
    assigned_to: Option<String>,
    assigned_by: Option<String>,
    x: Option<f64>,
    y: Option<f64>,
) -> Result<TaskFields> {
    let title = title.trim().to_string();
    if title.is_empty() {
        return Err(LibError::invalid(
            "Task title is required",
            anyhow!("empty task title"),
        ));
    }

    Ok(TaskFields {
        workflow_id,
        title,
        description: description.unwrap_or_default(),
        status: status.unwrap_or_default(),
        background_color: background_color
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_BACKGROUND_COLOR.to_string()),
        foreground_color: foreground_color
            .filter(|color| !color.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FOREGROUND_COLOR.to_string()),
        assigned_to,
        assigned_by,
        x,
        y,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{
        CreateGraphPayload, CreateTaskPayload, CreateWorkflowPayload, GraphId, TaskStatus,
        WorkflowId,
    };

    fn task_payload(title: &str) -> CreateTaskPayload {
        CreateTaskPayload {
            graph_id: GraphId(uuid::Uuid::new_v4()),
            title: title.to_string(),
            description: None,
            status: None,
            background_color: None,
            foreground_color: None,
            workflow_id: None,
            assigned_to: None,
            assigned_by: None,
            x: None,
            y: None,
        }
    }

    #[test]
    fn normalize_task_applies_defaults() {
        let definition = task_payload("  Ship it  ")
            .normalize()
            .expect("payload should normalize");
        assert_eq!(definition.fields.title, "Ship it");
        assert_eq!(definition.fields.description, "");
        assert_eq!(definition.fields.status, TaskStatus::Pending);
        assert_eq!(definition.fields.background_color, "#ffffff");
        assert_eq!(definition.fields.foreground_color, "#000000");
        assert_eq!(definition.fields.x, None);
    }

    #[test]
    fn normalize_task_rejects_empty_title() {
        let err = task_payload("   ")
            .normalize()
            .expect_err("blank title should fail");
        assert_eq!(err.public, "Task title is required");
    }

    #[test]
    fn normalize_task_keeps_explicit_fields() {
        let workflow_id = WorkflowId(uuid::Uuid::new_v4());
        let mut payload = task_payload("Review");
        payload.status = Some(TaskStatus::Completed);
        payload.background_color = Some("#102030".to_string());
        payload.workflow_id = Some(workflow_id);
        payload.x = Some(12.5);
        payload.y = Some(-4.0);

        let definition = payload.normalize().expect("payload should normalize");
        assert_eq!(definition.fields.status, TaskStatus::Completed);
        assert_eq!(definition.fields.background_color, "#102030");
        assert_eq!(definition.fields.workflow_id, Some(workflow_id));
        assert_eq!(definition.fields.x, Some(12.5));
        assert_eq!(definition.fields.y, Some(-4.0));
    }

    #[test]
    fn normalize_graph_trims_name() {
        let payload = CreateGraphPayload {
            name: "  Roadmap  ".to_string(),
        };
        assert_eq!(payload.normalize().expect("should normalize"), "Roadmap");

        let err = CreateGraphPayload {
            name: " ".to_string(),
        }
        .normalize()
        .expect_err("blank name should fail");
        assert_eq!(err.public, "Graph name is required");
    }

    #[test]
    fn normalize_workflow_requires_label() {
        let graph_id = GraphId(uuid::Uuid::new_v4());
        let (parent, label) = CreateWorkflowPayload {
            graph_id,
            label: " QA ".to_string(),
        }
        .normalize()
        .expect("should normalize");
        assert_eq!(parent, graph_id);
        assert_eq!(label, "QA");

        let err = CreateWorkflowPayload {
            graph_id,
            label: String::new(),
        }
        .normalize()
        .expect_err("empty label should fail");
        assert_eq!(err.public, "Workflow label is required");
    }

    #[test]
    fn task_status_wire_names_match_the_board() {
        assert_eq!(json!(TaskStatus::Pending), json!("Pending"));
        assert_eq!(json!(TaskStatus::InProcess), json!("In Process"));
        assert_eq!(json!(TaskStatus::Completed), json!("Completed"));

        let parsed: TaskStatus =
            serde_json::from_value(json!("In Process")).expect("wire name should parse");
        assert_eq!(parsed, TaskStatus::InProcess);
    }

    #[test]
    fn task_status_db_values_round_trip() {
        for status in [
            TaskStatus::Pending,
            TaskStatus::InProcess,
            TaskStatus::Completed,
        ] {
            assert_eq!(TaskStatus::from_db_value(status.as_db_value()), Some(status));
        }
        assert_eq!(TaskStatus::from_db_value("archived"), None);
    }
}
