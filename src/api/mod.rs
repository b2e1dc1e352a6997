use axum::{
    extract::{Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db;
use crate::models::{ApiResponse, Group, GroupSummary, ImportOutcome, Match, Participant, Standing};
use crate::services::scoring::{self, GridRow};
use crate::services::transfer::{self, ImportError};
use crate::services::FixtureClient;
use crate::utils::validate_name;

pub async fn serve(port: u16) -> anyhow::Result<()> {
    let pool = db::create_pool().await?;
    db::init_database_with_pool(&pool).await?;

    let app = create_router().with_state(pool);

    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?;
    tracing::info!("matchpool API server listening on port {}", port);

    axum::serve(listener, app).await?;
    Ok(())
}

fn create_router() -> Router<SqlitePool> {
    Router::new()
        .route("/health", get(health_check))
        .route("/groups", get(list_groups_handler).post(create_group_handler))
        .route(
            "/groups/{id}",
            get(group_view_handler).delete(delete_group_handler),
        )
        .route(
            "/groups/{id}/participants",
            get(list_participants_handler).post(add_participant_handler),
        )
        .route(
            "/groups/{id}/participants/{pid}",
            put(rename_participant_handler).delete(delete_participant_handler),
        )
        .route("/groups/{id}/participants/{pid}/export", get(export_handler))
        .route("/groups/{id}/import", post(import_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

fn internal_error(context: &str, e: anyhow::Error) -> StatusCode {
    tracing::error!("{}: {}", context, e);
    StatusCode::INTERNAL_SERVER_ERROR
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("matchpool API is running"))
}

// GET /groups - All groups with their table sizes
async fn list_groups_handler(
    State(pool): State<SqlitePool>,
) -> Result<Json<ApiResponse<Vec<GroupSummary>>>, StatusCode> {
    match db::list_groups(&pool).await {
        Ok(groups) => Ok(Json(ApiResponse::success(groups))),
        Err(e) => Err(internal_error("Failed to list groups", e)),
    }
}

// POST /groups - Create a group and ingest its fixture list
#[derive(Deserialize)]
struct CreateGroupRequest {
    name: String,
}

#[derive(Serialize)]
struct CreatedGroup {
    group: Group,
    matches_ingested: usize,
}

async fn create_group_handler(
    State(pool): State<SqlitePool>,
    Json(request): Json<CreateGroupRequest>,
) -> Result<Json<ApiResponse<CreatedGroup>>, StatusCode> {
    if !validate_name(&request.name) {
        return Ok(Json(ApiResponse::error(
            "Group name must not be empty".to_string(),
        )));
    }

    // best-effort: a provider outage yields an empty schedule, not a failure
    let fixtures = FixtureClient::new().fetch_fixtures().await;
    if fixtures.is_empty() {
        tracing::warn!(
            "No fixtures ingested; creating group '{}' with an empty schedule",
            request.name
        );
    }

    let group = db::insert_group(&pool, &request.name)
        .await
        .map_err(|e| internal_error("Failed to create group", e))?;
    let matches_ingested = db::insert_matches(&pool, &group.id, &fixtures)
        .await
        .map_err(|e| internal_error("Failed to store matches", e))?;

    Ok(Json(ApiResponse::success(CreatedGroup {
        group,
        matches_ingested,
    })))
}

// GET /groups/{id} - Matches, prediction grid and leaderboard
#[derive(Serialize)]
struct GroupView {
    group: Group,
    matches: Vec<Match>,
    rows: Vec<GridRow>,
    leaderboard: Vec<Standing>,
}

async fn group_view_handler(
    State(pool): State<SqlitePool>,
    Path(group_id): Path<String>,
) -> Result<Json<ApiResponse<GroupView>>, StatusCode> {
    let group = match db::get_group(&pool, &group_id).await {
        Ok(Some(group)) => group,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(internal_error("Failed to fetch group", e)),
    };

    let matches = db::matches_for_group(&pool, &group_id)
        .await
        .map_err(|e| internal_error("Failed to fetch matches", e))?;
    let participants = db::participants_for_group(&pool, &group_id)
        .await
        .map_err(|e| internal_error("Failed to fetch participants", e))?;

    let mut rows = Vec::new();
    for participant in &participants {
        let lines = db::prediction_lines(&pool, &participant.id, &group_id)
            .await
            .map_err(|e| internal_error("Failed to fetch predictions", e))?;
        rows.push(scoring::grid_row(participant, &lines));
    }

    let leaderboard = scoring::standings(&rows);

    Ok(Json(ApiResponse::success(GroupView {
        group,
        matches,
        rows,
        leaderboard,
    })))
}

// DELETE /groups/{id}
async fn delete_group_handler(
    State(pool): State<SqlitePool>,
    Path(group_id): Path<String>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    match db::delete_group(&pool, &group_id).await {
        Ok(true) => Ok(Json(ApiResponse::success("Group deleted".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error("Failed to delete group", e)),
    }
}

// GET /groups/{id}/participants
async fn list_participants_handler(
    State(pool): State<SqlitePool>,
    Path(group_id): Path<String>,
) -> Result<Json<ApiResponse<Vec<Participant>>>, StatusCode> {
    match db::participants_for_group(&pool, &group_id).await {
        Ok(participants) => Ok(Json(ApiResponse::success(participants))),
        Err(e) => Err(internal_error("Failed to list participants", e)),
    }
}

// POST /groups/{id}/participants - Add a participant and seed placeholders
#[derive(Deserialize)]
struct ParticipantRequest {
    name: String,
}

async fn add_participant_handler(
    State(pool): State<SqlitePool>,
    Path(group_id): Path<String>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<ApiResponse<Participant>>, StatusCode> {
    if !validate_name(&request.name) {
        return Ok(Json(ApiResponse::error(
            "Participant name must not be empty".to_string(),
        )));
    }

    match db::get_group(&pool, &group_id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(internal_error("Failed to fetch group", e)),
    }

    // a duplicate name is a silent no-op: the existing row comes back
    match db::add_participant(&pool, &group_id, &request.name).await {
        Ok((participant, _created)) => Ok(Json(ApiResponse::success(participant))),
        Err(e) => Err(internal_error("Failed to add participant", e)),
    }
}

// PUT /groups/{id}/participants/{pid}
async fn rename_participant_handler(
    State(pool): State<SqlitePool>,
    Path((_group_id, participant_id)): Path<(String, String)>,
    Json(request): Json<ParticipantRequest>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    if !validate_name(&request.name) {
        return Ok(Json(ApiResponse::error(
            "Participant name must not be empty".to_string(),
        )));
    }

    match db::rename_participant(&pool, &participant_id, &request.name).await {
        Ok(true) => Ok(Json(ApiResponse::success("Participant updated".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error("Failed to update participant", e)),
    }
}

// DELETE /groups/{id}/participants/{pid}
async fn delete_participant_handler(
    State(pool): State<SqlitePool>,
    Path((_group_id, participant_id)): Path<(String, String)>,
) -> Result<Json<ApiResponse<String>>, StatusCode> {
    match db::delete_participant(&pool, &participant_id).await {
        Ok(true) => Ok(Json(ApiResponse::success("Participant deleted".to_string()))),
        Ok(false) => Err(StatusCode::NOT_FOUND),
        Err(e) => Err(internal_error("Failed to delete participant", e)),
    }
}

// GET /groups/{id}/participants/{pid}/export - CSV attachment
async fn export_handler(
    State(pool): State<SqlitePool>,
    Path((group_id, participant_id)): Path<(String, String)>,
) -> Result<impl IntoResponse, StatusCode> {
    let participant = match db::get_participant(&pool, &participant_id).await {
        Ok(Some(participant)) => participant,
        Ok(None) => return Err(StatusCode::NOT_FOUND),
        Err(e) => return Err(internal_error("Failed to fetch participant", e)),
    };

    let lines = db::prediction_lines(&pool, &participant.id, &group_id)
        .await
        .map_err(|e| internal_error("Failed to fetch predictions", e))?;
    let body = transfer::export_csv(&lines)
        .map_err(|e| internal_error("Failed to serialize export", e))?;

    let headers = [
        (header::CONTENT_TYPE, "text/csv".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!(
                "attachment; filename=\"{}\"",
                transfer::export_filename(&participant.name)
            ),
        ),
    ];

    Ok((headers, body))
}

// POST /groups/{id}/import - Multipart prediction upload
async fn import_handler(
    State(pool): State<SqlitePool>,
    Path(group_id): Path<String>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<ImportOutcome>>, StatusCode> {
    let mut upload: Option<(String, String)> = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::warn!("Malformed multipart body: {}", e);
        StatusCode::BAD_REQUEST
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        let body = field.text().await.map_err(|e| {
            tracing::warn!("Failed to read uploaded file: {}", e);
            StatusCode::BAD_REQUEST
        })?;
        upload = Some((filename, body));
        break;
    }

    let Some((filename, body)) = upload else {
        return Ok(Json(ApiResponse::error(ImportError::MissingFile.to_string())));
    };

    match transfer::import_predictions(&pool, &group_id, &filename, &body).await {
        Ok(outcome) => Ok(Json(ApiResponse::success(outcome))),
        Err(ImportError::Store(e)) => Err(internal_error("Import failed", e)),
        // validation failures carry their reason back to the caller
        Err(e) => Ok(Json(ApiResponse::error(e.to_string()))),
    }
}
