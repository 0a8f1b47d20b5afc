//! Workspaces CRUD endpoints
//!
//! All of them act on behalf of the session [`Identity`], workspaces of other users are
//! reported as missing.

use actix_web::web::{Data, Json, Path};
use actix_web::{HttpResponse, delete, get, post, put};
use serde_json::json;

use crate::model::Model;
use crate::model::workspaces::{WorkspaceDraft, WorkspaceId};
use crate::service::ApiError;
use crate::service::session::Identity;

#[get("/workspaces")]
async fn list_workspaces(model: Data<Model>, identity: Identity) -> Result<HttpResponse, ApiError> {
    let workspaces = model.workspaces().list(identity.user_id).await?;
    Ok(HttpResponse::Ok().json(workspaces))
}

#[post("/workspaces")]
async fn create_workspace(
    model: Data<Model>,
    identity: Identity,
    draft: Json<WorkspaceDraft>,
) -> Result<HttpResponse, ApiError> {
    let id = model.workspaces().create(&draft, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "id": id })))
}

#[get("/workspaces/{id}")]
async fn workspace(
    model: Data<Model>,
    identity: Identity,
    id: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = WorkspaceId::new(id.into_inner());
    let workspace = model.workspaces().get(id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(workspace))
}

#[put("/workspaces/{id}")]
async fn update_workspace(
    model: Data<Model>,
    identity: Identity,
    id: Path<i64>,
    draft: Json<WorkspaceDraft>,
) -> Result<HttpResponse, ApiError> {
    let id = WorkspaceId::new(id.into_inner());
    model
        .workspaces()
        .update(id, &draft, identity.user_id)
        .await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "workspace updated" })))
}

#[delete("/workspaces/{id}")]
async fn delete_workspace(
    model: Data<Model>,
    identity: Identity,
    id: Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let id = WorkspaceId::new(id.into_inner());
    model.workspaces().delete(id, identity.user_id).await?;
    Ok(HttpResponse::Ok().json(json!({ "message": "workspace deleted" })))
}
