mod auth;
mod config;
mod error;
mod models;
mod routes;
mod workspace;

use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};
use clap::{Parser, Subcommand};
use config::Config;
use error::AppError;
use sqlx::PgPool;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use workspace::{PgTaskStore, PgWorkspaceStore, WorkspaceService};

#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub config: Arc<Config>,
    pub workspaces: WorkspaceService,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Taskhive backend", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Start the HTTP server (default)
    Serve,
    /// Run database migrations and exit
    Migrate,
    /// Create a user account; the password is read from the terminal
    CreateUser {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
    },
}

async fn health(State(state): State<AppState>) -> Result<Json<serde_json::Value>, AppError> {
    let row: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&state.db).await?;
    Ok(Json(serde_json::json!({ "status": "ok", "db": row.0 == 1 })))
}

pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .merge(routes::api_router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn create_user(db: &PgPool, username: &str, email: &str) -> Result<(), AppError> {
    let password = rpassword::prompt_password("Password: ")
        .map_err(|e| AppError::Internal(format!("Could not read password: {e}")))?;
    auth::password::validate_password(&password)?;
    let password_hash = auth::password::hash_password(&password)?;

    let (id,): (uuid::Uuid,) = sqlx::query_as(
        "INSERT INTO users (username, email, password_hash) VALUES ($1, $2, $3) RETURNING id",
    )
    .bind(username.trim())
    .bind(email.trim().to_lowercase())
    .bind(&password_hash)
    .fetch_one(db)
    .await?;

    tracing::info!(user_id = %id, username, "user created");
    Ok(())
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = Config::from_env();

    let db = PgPool::connect(&config.database_url)
        .await
        .expect("failed to connect to database");

    sqlx::migrate!()
        .run(&db)
        .await
        .expect("failed to run migrations");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {}
        Command::Migrate => {
            tracing::info!("migrations applied");
            return;
        }
        Command::CreateUser { username, email } => {
            if let Err(e) = create_user(&db, &username, &email).await {
                tracing::error!("create-user failed: {e}");
                std::process::exit(1);
            }
            return;
        }
    }

    let state = AppState {
        workspaces: WorkspaceService::new(
            Arc::new(PgWorkspaceStore::new(db.clone())),
            Arc::new(PgTaskStore::new(db.clone())),
        ),
        db,
        config: Arc::new(config.clone()),
    };

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind listener");
    axum::serve(listener, app(state))
        .await
        .expect("server error");
}
