use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::auth::middleware::CurrentUser;
use crate::state::AppState;
use crate::tasks::{valid_title, NewTask, Task, TaskChanges};
use crate::ws::Event;

/// Push a task event to connected clients. Delivery problems never fail the request.
fn publish(state: &AppState, event: Result<Event, serde_json::Error>) {
    match event {
        Ok(event) => {
            state.dispatcher.broadcast(&event);
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to serialize task event");
        }
    }
}

/// POST /api/v1/tasks: Create a task owned by the caller. JWT auth required.
pub async fn create_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Json(body): Json<NewTask>,
) -> Result<(StatusCode, Json<Task>), StatusCode> {
    let owner = caller.id;
    if !valid_title(&body.title) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let task = state.tasks.create(owner, body);
    tracing::info!(task_id = task.id, owner_id = %owner, "Task created");

    publish(&state, Event::task_created(&task));
    Ok((StatusCode::CREATED, Json(task)))
}

/// GET /api/v1/tasks: List the caller's tasks. JWT auth required.
pub async fn list_tasks(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
) -> Result<Json<Vec<Task>>, StatusCode> {
    let owner = caller.id;
    Ok(Json(state.tasks.list_for_owner(owner)))
}

/// GET /api/v1/tasks/{id}: JWT auth required.
pub async fn get_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Json<Task>, StatusCode> {
    let owner = caller.id;
    state
        .tasks
        .get(task_id, owner)
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

/// PUT /api/v1/tasks/{id}: Partial update. JWT auth required.
pub async fn update_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<i64>,
    Json(body): Json<TaskChanges>,
) -> Result<Json<Task>, StatusCode> {
    let owner = caller.id;
    if body.title.as_deref().is_some_and(|title| !valid_title(title)) {
        return Err(StatusCode::UNPROCESSABLE_ENTITY);
    }

    let task = state
        .tasks
        .update(task_id, owner, body)
        .ok_or(StatusCode::NOT_FOUND)?;
    tracing::info!(task_id = task.id, owner_id = %owner, "Task updated");

    publish(&state, Event::task_updated(&task));
    Ok(Json(task))
}

/// DELETE /api/v1/tasks/{id}: JWT auth required.
pub async fn delete_task(
    State(state): State<AppState>,
    CurrentUser(caller): CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    let owner = caller.id;
    if !state.tasks.delete(task_id, owner) {
        return Err(StatusCode::NOT_FOUND);
    }
    tracing::info!(task_id, owner_id = %owner, "Task deleted");

    publish(&state, Ok(Event::task_deleted(task_id)));
    Ok(StatusCode::NO_CONTENT)
}
