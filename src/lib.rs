pub mod algorithms;
#[cfg(feature = "api")]
pub mod api;
pub mod arrange;
pub mod auth;
#[cfg(feature = "sqlx")]
pub mod db;
pub mod error;
pub mod layout;
pub mod models;
#[cfg(feature = "sqlx")]
pub mod operations;

pub mod prelude {
    pub use crate::algorithms::{adjacency_map, compute_levels, detect_cycle};
    #[cfg(feature = "api")]
    pub use crate::api::{BoardApp, HasPool};
    pub use crate::arrange::{ArrangePlan, apply_positions, plan_arrangement};
    pub use crate::auth::{AuthenticatedUser, Identity, VerifiesIdentity, bearer_token};
    #[cfg(feature = "sqlx")]
    pub use crate::db::create_board_tables;
    pub use crate::error::{ApiErrorDetails, ErrorKind, LibError, Result};
    pub use crate::layout::compute_layout;
    pub use crate::models::{
        CreateGraphPayload, CreateLinkPayload, CreateTaskPayload, CreateWorkflowPayload, Graph,
        GraphId, LinkId, ListByGraphQuery, Position, Task, TaskId, TaskLink, TaskStatus,
        UpdateGraphPayload, UpdatePositionPayload, UpdateTaskPayload, Workflow, WorkflowId,
    };
    #[cfg(feature = "sqlx")]
    pub use crate::operations::{
        ArrangeOutcome, BoardOperation, BoardOperationResult, BoardOperations,
    };
}
