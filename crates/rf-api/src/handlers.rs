//! # rf-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core services.

use actix_multipart::Multipart;
use actix_web::{web, HttpResponse};
use uuid::Uuid;

use crate::error::ApiResult;
use crate::extract::CurrentViewer;
use crate::form::SubmissionForm;
use crate::views::{CommentView, NewTopicBody, PostView};
use crate::AppState;

// Posts

pub async fn list_posts(data: web::Data<AppState>, viewer: CurrentViewer) -> ApiResult<HttpResponse> {
    let posts = data.posts.list_posts(&viewer.0).await?;
    let views: Vec<PostView> = posts
        .into_iter()
        .map(|post| PostView::render(post, data.media.as_ref()))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn create_post(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = SubmissionForm::read(payload).await?;
    let post = data.posts.create_post(&viewer.0, form.into_new_post()).await?;
    Ok(HttpResponse::Created().json(PostView::render(post, data.media.as_ref())))
}

pub async fn get_post(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let post = data.posts.get_post(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(PostView::render(post, data.media.as_ref())))
}

pub async fn update_post(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let patch = SubmissionForm::read(payload).await?.into_patch()?;
    let post = data.posts.update_post(&viewer.0, path.into_inner(), patch).await?;
    Ok(HttpResponse::Ok().json(PostView::render(post, data.media.as_ref())))
}

pub async fn delete_post(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.posts.delete_post(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

/// Vote tally and the viewer's three flags without the rest of the post.
pub async fn post_actions(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    let summary = data.posts.post_actions(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(summary))
}

// Interactions: success is an empty 200

pub async fn upvote(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.interactions.upvote(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn downvote(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.interactions.downvote(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn save(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.interactions.save(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

pub async fn unsave(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.interactions.unsave(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::Ok().finish())
}

// Comments

pub async fn list_comments(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult<HttpResponse> {
    let comments = data.posts.list_comments(path.into_inner()).await?;
    let views: Vec<CommentView> = comments
        .into_iter()
        .map(|comment| CommentView::render(comment, data.media.as_ref()))
        .collect();
    Ok(HttpResponse::Ok().json(views))
}

pub async fn create_comment(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
    payload: Multipart,
) -> ApiResult<HttpResponse> {
    let form = SubmissionForm::read(payload).await?;
    let comment = data
        .posts
        .create_comment(&viewer.0, path.into_inner(), form.into_new_comment())
        .await?;
    Ok(HttpResponse::Created().json(CommentView::render(comment, data.media.as_ref())))
}

pub async fn delete_comment(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.posts.delete_comment(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// Topics

pub async fn list_topics(data: web::Data<AppState>) -> ApiResult<HttpResponse> {
    Ok(HttpResponse::Ok().json(data.posts.list_topics().await?))
}

pub async fn create_topic(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    body: web::Json<NewTopicBody>,
) -> ApiResult<HttpResponse> {
    let topic = data.posts.create_topic(&viewer.0, &body.name).await?;
    Ok(HttpResponse::Created().json(topic))
}

pub async fn delete_topic(
    data: web::Data<AppState>,
    viewer: CurrentViewer,
    path: web::Path<Uuid>,
) -> ApiResult<HttpResponse> {
    data.posts.delete_topic(&viewer.0, path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}
