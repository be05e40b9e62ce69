use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, anyhow};
use axum::middleware::from_fn_with_state;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use taskboard::api::{BoardApp, HasPool};
use taskboard::auth::{AuthenticatedUser, Identity, VerifiesIdentity};

#[derive(Clone)]
struct DevAuthConfig {
    default_subject: Option<String>,
}

#[derive(Clone)]
struct ExampleApp {
    pool: Arc<PgPool>,
    auth: DevAuthConfig,
}

impl HasPool for ExampleApp {
    fn pool(&self) -> Arc<PgPool> {
        Arc::clone(&self.pool)
    }
}

impl BoardApp for ExampleApp {}

impl VerifiesIdentity for ExampleApp {
    /// Dev shim: the token itself carries the identity as
    /// `subject[:email[:display name]]`. The literal token `dev` resolves to
    /// the configured default subject when one is set.
    fn verify_token(
        &self,
        token: &str,
    ) -> impl std::future::Future<Output = anyhow::Result<Identity>> + Send {
        let token = token.to_string();
        let default_subject = self.auth.default_subject.clone();
        async move {
            if token == "dev" {
                let subject = default_subject
                    .ok_or_else(|| anyhow!("no BOARD_EXAMPLE_DEFAULT_SUBJECT configured"))?;
                return Ok(Identity::new(subject));
            }

            let mut parts = token.splitn(3, ':');
            let subject = parts
                .next()
                .filter(|subject| !subject.is_empty())
                .ok_or_else(|| anyhow!("empty dev token"))?;
            let mut identity = Identity::new(subject);
            identity.email = parts.next().map(str::to_string).filter(|s| !s.is_empty());
            identity.display_name =
                parts.next().map(str::to_string).filter(|s| !s.is_empty());
            Ok(identity)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let database_url = env::var("DATABASE_URL")
        .context("DATABASE_URL is required to run demos/board_api_server.rs")?;
    let bind = env::var("BOARD_EXAMPLE_BIND").unwrap_or_else(|_| "127.0.0.1:4020".to_string());
    let bind_addr: SocketAddr = bind
        .parse()
        .with_context(|| format!("invalid BOARD_EXAMPLE_BIND '{}'", bind))?;

    let auth = DevAuthConfig {
        default_subject: env::var("BOARD_EXAMPLE_DEFAULT_SUBJECT").ok(),
    };

    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;

    taskboard::db::create_board_tables(&pool)
        .await
        .context("failed to run board migrations")?;

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("failed to connect to postgres")?;

    let app_state = ExampleApp {
        pool: Arc::new(pool),
        auth,
    };

    let board_routes = Router::new()
        .route("/example/whoami", get(whoami_handler))
        .merge(taskboard::api::routes::<ExampleApp>())
        .layer(from_fn_with_state(
            app_state.clone(),
            taskboard::api::require_identity::<ExampleApp>,
        ));

    let api_v1 = Router::new()
        .route("/healthz", get(health_handler))
        .merge(board_routes);

    let app = Router::new().nest("/api/v1", api_v1).with_state(app_state);

    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind listener on {}", bind_addr))?;

    println!("taskboard example server listening on http://{}", bind_addr);
    println!("api base path: /api/v1");
    println!("auth shim: Authorization: Bearer <subject[:email[:display name]]>");
    println!("set BOARD_EXAMPLE_DEFAULT_SUBJECT to make the literal token 'dev' work");

    axum::serve(listener, app)
        .await
        .context("example server failed")
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(json!({
        "ok": true
    }))
}

async fn whoami_handler(auth_user: AuthenticatedUser) -> Json<serde_json::Value> {
    Json(json!({
        "subject": auth_user.subject(),
        "email": auth_user.identity().email,
        "displayName": auth_user.identity().display_name,
    }))
}
