use std::sync::Arc;

use anyhow::anyhow;
use axum::{
    Json, Router,
    extract::{FromRequestParts, Path, Query, Request, State},
    http::{StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use serde_json::json;

use crate::auth::{AuthenticatedUser, VerifiesIdentity, bearer_token};
use crate::db;
use crate::error::{ErrorKind, LibError};
use crate::models::{
    CreateGraphPayload, CreateLinkPayload, CreateTaskPayload, CreateWorkflowPayload, GraphId,
    LinkId, ListByGraphQuery, TaskId, UpdateGraphPayload, UpdatePositionPayload,
    UpdateTaskPayload,
};
use crate::operations::BoardOperations;

#[derive(Debug)]
pub struct AppError(pub LibError);

impl From<LibError> for AppError {
    fn from(value: LibError) -> Self {
        Self(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match self.0.kind {
            ErrorKind::Conflict => StatusCode::CONFLICT,
            ErrorKind::Database => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorKind::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorKind::NotFound => StatusCode::NOT_FOUND,
            ErrorKind::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorKind::Unknown => StatusCode::INTERNAL_SERVER_ERROR,
        };

        tracing::error!(kind = ?self.0.kind, error = %self.0.source, "board api request failed");

        let mut body = json!({
            "error": {
                "code": self.0.code,
                "message": self.0.public,
            }
        });
        if let Some(details) = &self.0.details {
            body["error"]["details"] = json!(details);
        }
        (status, Json(body)).into_response()
    }
}

pub trait HasPool {
    fn pool(&self) -> Arc<sqlx::PgPool>;
}

pub trait BoardApp: HasPool + VerifiesIdentity {}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts.extensions.get::<AuthenticatedUser>().cloned().ok_or_else(|| {
            AppError(LibError::unauthorized(
                "Authentication required",
                anyhow!("request reached a handler without a verified identity"),
            ))
        })
    }
}

/// Verifies the bearer token on every request and stashes the resolved
/// identity for the handlers. Wire with
/// `axum::middleware::from_fn_with_state`.
pub async fn require_identity<S>(State(app): State<S>, mut req: Request, next: Next) -> Response
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok());
    let Some(token) = bearer_token(header) else {
        return AppError(LibError::unauthorized(
            "Authentication required",
            anyhow!("missing bearer token"),
        ))
        .into_response();
    };

    let verified = app.verify_token(token).await;
    match verified {
        Ok(identity) => {
            req.extensions_mut().insert(AuthenticatedUser::new(identity));
            next.run(req).await
        }
        Err(err) => AppError(LibError::unauthorized("Invalid credentials", err)).into_response(),
    }
}

async fn create_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<CreateGraphPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let graph =
        db::create_graph(&app.pool(), auth_user.identity().attribution(), payload).await?;
    Ok((StatusCode::CREATED, Json(graph)))
}

async fn list_graphs_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let graphs = db::list_graphs(&app.pool()).await?;
    Ok(Json(graphs))
}

async fn get_graph_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let graph = db::get_graph(&app.pool(), graph_id).await?;
    Ok(Json(graph))
}

async fn rename_graph_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
    Json(payload): Json<UpdateGraphPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let graph = db::rename_graph(&app.pool(), graph_id, payload).await?;
    Ok(Json(graph))
}

async fn delete_graph_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    db::delete_graph(&app.pool(), graph_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn arrange_graph_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(graph_id): Path<GraphId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let operations = BoardOperations::new(app.pool());
    let outcome = operations
        .arrange_graph(auth_user.identity(), graph_id)
        .await?;
    Ok(Json(outcome))
}

async fn create_task_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Json(payload): Json<CreateTaskPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let task = db::create_task(&app.pool(), auth_user.identity().attribution(), payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

async fn list_tasks_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Query(query): Query<ListByGraphQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let tasks = db::list_tasks(&app.pool(), query.graph_id).await?;
    Ok(Json(tasks))
}

async fn get_task_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(task_id): Path<TaskId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let task = db::get_task(&app.pool(), task_id).await?;
    Ok(Json(task))
}

async fn update_task_handler<S>(
    State(app): State<S>,
    auth_user: AuthenticatedUser,
    Path(task_id): Path<TaskId>,
    Json(payload): Json<UpdateTaskPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let task = db::update_task(
        &app.pool(),
        auth_user.identity().attribution(),
        task_id,
        payload,
    )
    .await?;
    Ok(Json(task))
}

async fn move_task_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(task_id): Path<TaskId>,
    Json(payload): Json<UpdatePositionPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    db::update_task_position(&app.pool(), task_id, payload.into()).await?;
    let task = db::get_task(&app.pool(), task_id).await?;
    Ok(Json(task))
}

async fn delete_task_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(task_id): Path<TaskId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    db::delete_task(&app.pool(), task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_link_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Json(payload): Json<CreateLinkPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let link = db::create_link(&app.pool(), payload).await?;
    Ok((StatusCode::CREATED, Json(link)))
}

async fn list_links_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Query(query): Query<ListByGraphQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let links = db::list_links(&app.pool(), query.graph_id).await?;
    Ok(Json(links))
}

async fn delete_link_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Path(link_id): Path<LinkId>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    db::delete_link(&app.pool(), link_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn create_workflow_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Json(payload): Json<CreateWorkflowPayload>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let workflow = db::create_workflow(&app.pool(), payload).await?;
    Ok((StatusCode::CREATED, Json(workflow)))
}

async fn list_workflows_handler<S>(
    State(app): State<S>,
    _auth_user: AuthenticatedUser,
    Query(query): Query<ListByGraphQuery>,
) -> Result<impl IntoResponse, AppError>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    let workflows = db::list_workflows(&app.pool(), query.graph_id).await?;
    Ok(Json(workflows))
}

pub fn routes<S>() -> Router<S>
where
    S: BoardApp + Clone + Send + Sync + 'static,
{
    tracing::info!("Registering route /graphs [GET,POST]");
    tracing::info!("Registering route /graphs/{{graph_id}} [GET,PUT,DELETE]");
    tracing::info!("Registering route /graphs/{{graph_id}}/arrange [POST]");
    tracing::info!("Registering route /tasks [GET,POST]");
    tracing::info!("Registering route /tasks/{{task_id}} [GET,PUT,DELETE]");
    tracing::info!("Registering route /tasks/{{task_id}}/position [PUT]");
    tracing::info!("Registering route /links [GET,POST]");
    tracing::info!("Registering route /links/{{link_id}} [DELETE]");
    tracing::info!("Registering route /workflows [GET,POST]");

    Router::new()
        .route(
            "/graphs",
            get(list_graphs_handler::<S>).post(create_graph_handler::<S>),
        )
        .route(
            "/graphs/{graph_id}",
            get(get_graph_handler::<S>)
                .put(rename_graph_handler::<S>)
                .delete(delete_graph_handler::<S>),
        )
        .route("/graphs/{graph_id}/arrange", post(arrange_graph_handler::<S>))
        .route(
            "/tasks",
            get(list_tasks_handler::<S>).post(create_task_handler::<S>),
        )
        .route(
            "/tasks/{task_id}",
            get(get_task_handler::<S>)
                .put(update_task_handler::<S>)
                .delete(delete_task_handler::<S>),
        )
        .route("/tasks/{task_id}/position", put(move_task_handler::<S>))
        .route(
            "/links",
            get(list_links_handler::<S>).post(create_link_handler::<S>),
        )
        .route("/links/{link_id}", delete(delete_link_handler::<S>))
        .route(
            "/workflows",
            get(list_workflows_handler::<S>).post(create_workflow_handler::<S>),
        )
}
