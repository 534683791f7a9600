use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use directories::ProjectDirs;
use kidoo_core::profile::ChildProgress;
use kidoo_core::telemetry::BehavioralMetrics;
use serde::{Deserialize, Serialize};
use sqlx::{sqlite::SqliteConnectOptions, Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

// ── App state ─────────────────────────────────────────────────────────────────

#[derive(Clone)]
struct AppState {
    db: SqlitePool,
}

// ── Request / Response types ──────────────────────────────────────────────────

#[derive(Deserialize)]
struct AuthRequest {
    username: String,
    password: String,
}

#[derive(Serialize)]
struct TokenResponse {
    token: String,
}

#[derive(Deserialize)]
struct NewChildRequest {
    name: String,
    age: u8,
}

#[derive(Serialize)]
struct ChildSummary {
    id: String,
    name: String,
    age: u8,
    fun_time_balance_seconds: u32,
    stars: u32,
    streak: u32,
}

#[derive(Serialize)]
struct ChildDetail {
    id: String,
    name: String,
    age: u8,
    progress: ChildProgress,
}

#[derive(Deserialize)]
struct QuizCompleteRequest {
    score: u32,
    metrics: BehavioralMetrics,
}

#[derive(Deserialize)]
struct FunTimeRequest {
    balance_seconds: u32,
}

// ── Error helpers ─────────────────────────────────────────────────────────────

type AppResult<T> = Result<Json<T>, (StatusCode, String)>;

fn app_err(status: StatusCode, msg: impl ToString) -> (StatusCode, String) {
    (status, msg.to_string())
}

fn internal(msg: impl ToString) -> (StatusCode, String) {
    app_err(StatusCode::INTERNAL_SERVER_ERROR, msg)
}

// ── Auth helpers ──────────────────────────────────────────────────────────────

async fn authenticate(db: &SqlitePool, headers: &HeaderMap) -> Option<i64> {
    let auth = headers.get("Authorization")?.to_str().ok()?;
    let token = auth.strip_prefix("Bearer ")?;
    let now = Utc::now().to_rfc3339();

    let row = sqlx::query("SELECT user_id FROM sessions WHERE token = ? AND expires_at > ?")
        .bind(token)
        .bind(&now)
        .fetch_optional(db)
        .await
        .ok()??;

    row.try_get("user_id").ok()
}

fn generate_token() -> String {
    use rand::RngCore;
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

async fn create_session(db: &SqlitePool, user_id: i64) -> Result<String, (StatusCode, String)> {
    let token = generate_token();
    let expires_at = (Utc::now() + chrono::Duration::days(30)).to_rfc3339();
    sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?, ?, ?)")
        .bind(&token)
        .bind(user_id)
        .bind(&expires_at)
        .execute(db)
        .await
        .map_err(internal)?;
    Ok(token)
}

// ── DB helpers ────────────────────────────────────────────────────────────────

struct ChildRow {
    name: String,
    age: u8,
    progress: ChildProgress,
}

async fn load_child(
    db: &SqlitePool,
    user_id: i64,
    child_id: &str,
) -> Result<ChildRow, (StatusCode, String)> {
    let row = sqlx::query("SELECT name, age, data FROM children WHERE id = ? AND user_id = ?")
        .bind(child_id)
        .bind(user_id)
        .fetch_optional(db)
        .await
        .map_err(internal)?
        .ok_or_else(|| app_err(StatusCode::NOT_FOUND, "Child not found"))?;

    let name: String = row.try_get("name").map_err(internal)?;
    let age: i64 = row.try_get("age").map_err(internal)?;
    let data: String = row.try_get("data").map_err(internal)?;
    let progress = serde_json::from_str(&data).map_err(internal)?;

    Ok(ChildRow {
        name,
        age: age as u8,
        progress,
    })
}

async fn save_child_progress(
    db: &SqlitePool,
    user_id: i64,
    child_id: &str,
    progress: &ChildProgress,
) -> Result<(), (StatusCode, String)> {
    let data = serde_json::to_string(progress).map_err(internal)?;
    sqlx::query("UPDATE children SET data = ? WHERE id = ? AND user_id = ?")
        .bind(&data)
        .bind(child_id)
        .bind(user_id)
        .execute(db)
        .await
        .map_err(internal)?;
    Ok(())
}

// ── API handlers ──────────────────────────────────────────────────────────────

async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> AppResult<TokenResponse> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(app_err(
            StatusCode::BAD_REQUEST,
            "Username and password required",
        ));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(req.password.as_bytes(), &salt)
        .map_err(internal)?
        .to_string();

    let result =
        sqlx::query("INSERT INTO users (username, password_hash) VALUES (?, ?) RETURNING id")
            .bind(req.username.trim())
            .bind(&password_hash)
            .fetch_one(&state.db)
            .await;

    let user_id: i64 = match result {
        Ok(row) => row.try_get("id").map_err(internal)?,
        Err(e) if e.to_string().contains("UNIQUE") => {
            return Err(app_err(StatusCode::CONFLICT, "Username already taken"));
        }
        Err(e) => return Err(internal(e)),
    };

    let token = create_session(&state.db, user_id).await?;
    Ok(Json(TokenResponse { token }))
}

async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<AuthRequest>,
) -> AppResult<TokenResponse> {
    let row = sqlx::query("SELECT id, password_hash FROM users WHERE username = ?")
        .bind(req.username.trim())
        .fetch_optional(&state.db)
        .await
        .map_err(internal)?
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Invalid username or password"))?;

    let user_id: i64 = row.try_get("id").map_err(internal)?;
    let stored_hash: String = row.try_get("password_hash").map_err(internal)?;

    let parsed = PasswordHash::new(&stored_hash).map_err(internal)?;
    Argon2::default()
        .verify_password(req.password.as_bytes(), &parsed)
        .map_err(|_| app_err(StatusCode::UNAUTHORIZED, "Invalid username or password"))?;

    let token = create_session(&state.db, user_id).await?;
    Ok(Json(TokenResponse { token }))
}

async fn logout(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, (StatusCode, String)> {
    if let Some(auth) = headers.get("Authorization").and_then(|v| v.to_str().ok()) {
        if let Some(token) = auth.strip_prefix("Bearer ") {
            sqlx::query("DELETE FROM sessions WHERE token = ?")
                .bind(token)
                .execute(&state.db)
                .await
                .map_err(internal)?;
        }
    }
    Ok(StatusCode::OK)
}

async fn list_children(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> AppResult<Vec<ChildSummary>> {
    let user_id = authenticate(&state.db, &headers)
        .await
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let rows = sqlx::query("SELECT id, name, age, data FROM children WHERE user_id = ?")
        .bind(user_id)
        .fetch_all(&state.db)
        .await
        .map_err(internal)?;

    let mut children = Vec::with_capacity(rows.len());
    for row in rows {
        let id: String = row.try_get("id").map_err(internal)?;
        let name: String = row.try_get("name").map_err(internal)?;
        let age: i64 = row.try_get("age").map_err(internal)?;
        let data: String = row.try_get("data").map_err(internal)?;
        let progress: ChildProgress = serde_json::from_str(&data).map_err(internal)?;
        children.push(ChildSummary {
            id,
            name,
            age: age as u8,
            fun_time_balance_seconds: progress.fun_time_balance_seconds,
            stars: progress.stars,
            streak: progress.streak,
        });
    }
    Ok(Json(children))
}

async fn add_child(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(req): Json<NewChildRequest>,
) -> AppResult<ChildDetail> {
    let user_id = authenticate(&state.db, &headers)
        .await
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    if req.name.trim().is_empty() {
        return Err(app_err(StatusCode::BAD_REQUEST, "Name required"));
    }

    let id = Uuid::new_v4().to_string();
    let progress = ChildProgress::default();
    let data = serde_json::to_string(&progress).map_err(internal)?;

    sqlx::query("INSERT INTO children (id, user_id, name, age, data) VALUES (?, ?, ?, ?, ?)")
        .bind(&id)
        .bind(user_id)
        .bind(req.name.trim())
        .bind(req.age as i64)
        .bind(&data)
        .execute(&state.db)
        .await
        .map_err(internal)?;

    Ok(Json(ChildDetail {
        id,
        name: req.name.trim().to_string(),
        age: req.age,
        progress,
    }))
}

async fn get_child(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(child_id): Path<String>,
) -> AppResult<ChildDetail> {
    let user_id = authenticate(&state.db, &headers)
        .await
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let child = load_child(&state.db, user_id, &child_id).await?;
    Ok(Json(ChildDetail {
        id: child_id,
        name: child.name,
        age: child.age,
        progress: child.progress,
    }))
}

/// The quiz-completion handoff: credits the reward, stars and session
/// streak, and appends the history entry with the behavioral snapshot.
async fn quiz_complete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(child_id): Path<String>,
    Json(req): Json<QuizCompleteRequest>,
) -> AppResult<ChildDetail> {
    let user_id = authenticate(&state.db, &headers)
        .await
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let mut child = load_child(&state.db, user_id, &child_id).await?;
    child
        .progress
        .record_quiz_completion(req.score, &req.metrics, Utc::now());
    save_child_progress(&state.db, user_id, &child_id, &child.progress).await?;

    tracing::info!(child = %child_id, score = req.score, "quiz session recorded");

    Ok(Json(ChildDetail {
        id: child_id,
        name: child.name,
        age: child.age,
        progress: child.progress,
    }))
}

/// Write-back after a reward-game exit or expiry.
async fn set_fun_time(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(child_id): Path<String>,
    Json(req): Json<FunTimeRequest>,
) -> AppResult<ChildDetail> {
    let user_id = authenticate(&state.db, &headers)
        .await
        .ok_or_else(|| app_err(StatusCode::UNAUTHORIZED, "Unauthorized"))?;

    let mut child = load_child(&state.db, user_id, &child_id).await?;
    child.progress.fun_time_balance_seconds = req.balance_seconds;
    save_child_progress(&state.db, user_id, &child_id, &child.progress).await?;

    Ok(Json(ChildDetail {
        id: child_id,
        name: child.name,
        age: child.age,
        progress: child.progress,
    }))
}

// ── DB setup ──────────────────────────────────────────────────────────────────

async fn get_db_pool() -> SqlitePool {
    let dirs = ProjectDirs::from("com", "kidoo", "kidoo_server")
        .expect("Could not determine data directory");
    let data_dir = dirs.data_dir();
    std::fs::create_dir_all(data_dir).expect("Could not create data directory");
    let db_path = data_dir.join("db.sqlite");

    let opts = SqliteConnectOptions::new()
        .filename(&db_path)
        .create_if_missing(true);

    SqlitePool::connect_with(opts)
        .await
        .expect("Could not connect to database")
}

async fn init_db(pool: &SqlitePool) {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .expect("Could not create users table");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            expires_at TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .expect("Could not create sessions table");

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS children (
            id TEXT PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            name TEXT NOT NULL,
            age INTEGER NOT NULL,
            data TEXT NOT NULL
        )",
    )
    .execute(pool)
    .await
    .expect("Could not create children table");
}

// ── Main ──────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let db = get_db_pool().await;
    init_db(&db).await;

    let state = Arc::new(AppState { db });

    let app = Router::new()
        .route("/api/register", post(register))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/children", get(list_children).post(add_child))
        .route("/api/children/:id", get(get_child))
        .route("/api/children/:id/quiz-complete", post(quiz_complete))
        .route("/api/children/:id/fun-time", post(set_fun_time))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Could not bind to port 3000");

    tracing::info!("server running at http://localhost:3000");
    axum::serve(listener, app).await.expect("Server error");
}
