//! Project endpoints. Projects group stores under an owner; deleting one
//! cascades to its stores and their products.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::db::{CreateProjectRequest, DbPool, Project};
use crate::AppState;

use super::auth::CurrentUser;
use super::error::ApiError;
use super::validation::validate_name;

pub async fn create_project_record(
    db: &DbPool,
    owner_id: &str,
    name: &str,
) -> Result<Project, ApiError> {
    let name = name.trim();
    if let Err(e) = validate_name(name) {
        return Err(ApiError::validation_field("name", e));
    }

    let id = Uuid::new_v4().to_string();
    let now = chrono::Utc::now().to_rfc3339();

    sqlx::query("INSERT INTO projects (id, owner_id, name, created_at) VALUES (?, ?, ?, ?)")
        .bind(&id)
        .bind(owner_id)
        .bind(name)
        .bind(&now)
        .execute(db)
        .await?;

    let project: Project = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(&id)
        .fetch_one(db)
        .await?;
    Ok(project)
}

pub async fn delete_project_record(
    db: &DbPool,
    caller_id: &str,
    project_id: &str,
) -> Result<(), ApiError> {
    let project: Option<Project> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
        .bind(project_id)
        .fetch_optional(db)
        .await?;
    let project = project.ok_or_else(|| ApiError::not_found("Project not found"))?;

    if project.owner_id != caller_id {
        return Err(ApiError::forbidden("Forbidden"));
    }

    // Stores and their products go with the project via FK cascade
    sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(project_id)
        .execute(db)
        .await?;

    tracing::info!(project = %project_id, "Project deleted");
    Ok(())
}

/// GET /api/projects/mine
pub async fn my_projects(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects: Vec<Project> =
        sqlx::query_as("SELECT * FROM projects WHERE owner_id = ? ORDER BY created_at DESC")
            .bind(&user.id)
            .fetch_all(&state.db)
            .await?;
    Ok(Json(projects))
}

/// POST /api/projects
pub async fn create_project(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    let project = create_project_record(&state.db, &user.id, &req.name).await?;
    Ok((StatusCode::CREATED, Json(project)))
}

/// DELETE /api/projects/:id
pub async fn delete_project(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    delete_project_record(&state.db, &user.id, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::stores::{create_store_record, NewStore};
    use crate::api::test_util::{fetch_user, register_test_user, test_db};
    use crate::api::ErrorCode;
    use crate::db::Store;

    #[tokio::test]
    async fn blank_project_name_is_rejected() {
        let (_dir, db) = test_db().await;
        let user = register_test_user(&db, "owner@example.com", "hunter2secret").await;

        let err = create_project_record(&db, &user.id, "   ").await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::ValidationError);
    }

    #[tokio::test]
    async fn delete_is_owner_only() {
        let (_dir, db) = test_db().await;
        let owner = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let intruder = register_test_user(&db, "intruder@example.com", "hunter2secret").await;

        let project = create_project_record(&db, &owner.id, "Launch").await.unwrap();

        let err = delete_project_record(&db, &intruder.id, &project.id)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        delete_project_record(&db, &owner.id, &project.id)
            .await
            .unwrap();
        let remaining: Option<Project> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(&project.id)
            .fetch_optional(&db)
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    async fn delete_cascades_to_stores() {
        let (_dir, db) = test_db().await;
        let created = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let user = fetch_user(&db, &created.id).await;

        let project = create_project_record(&db, &user.id, "Launch").await.unwrap();
        let (store, _) = create_store_record(
            &db,
            &user,
            NewStore {
                name: "Alpha".to_string(),
                slug: "alpha".to_string(),
                project_id: Some(project.id.clone()),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        delete_project_record(&db, &user.id, &project.id)
            .await
            .unwrap();

        let remaining: Option<Store> = sqlx::query_as("SELECT * FROM stores WHERE id = ?")
            .bind(&store.id)
            .fetch_optional(&db)
            .await
            .unwrap();
        assert!(remaining.is_none());
    }

    #[tokio::test]
    async fn store_creation_under_foreign_project_is_forbidden() {
        let (_dir, db) = test_db().await;
        let owner = register_test_user(&db, "owner@example.com", "hunter2secret").await;
        let other = register_test_user(&db, "other@example.com", "hunter2secret").await;
        let other = fetch_user(&db, &other.id).await;

        let project = create_project_record(&db, &owner.id, "Launch").await.unwrap();

        let err = create_store_record(
            &db,
            &other,
            NewStore {
                name: "Alpha".to_string(),
                slug: "alpha".to_string(),
                project_id: Some(project.id),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
