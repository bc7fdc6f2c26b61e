//! # rf-api
//!
//! The web routing and orchestration layer for Rusty-Feed.

pub mod error;
pub mod extract;
pub mod form;
pub mod handlers;
pub mod middleware;
pub mod views;

use std::sync::Arc;

use actix_web::web;
use rf_core::interaction::InteractionController;
use rf_core::service::PostService;
use rf_core::traits::{AuthProvider, MediaStore, PostRepo};

/// State shared across all Actix-web workers.
pub struct AppState {
    pub posts: PostService,
    pub interactions: InteractionController,
    pub auth: Arc<dyn AuthProvider>,
    pub media: Arc<dyn MediaStore>,
}

impl AppState {
    pub fn new(
        repo: Arc<dyn PostRepo>,
        media: Arc<dyn MediaStore>,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            posts: PostService::new(repo.clone(), media.clone()),
            interactions: InteractionController::new(repo),
            auth,
            media,
        }
    }
}

/// Configures the routes for the feed.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API under different paths if needed (e.g., /api/v1/).
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("")
            .service(
                web::resource("/posts")
                    .route(web::get().to(handlers::list_posts))
                    .route(web::post().to(handlers::create_post)),
            )
            .service(
                web::resource("/posts/{id}")
                    .route(web::get().to(handlers::get_post))
                    .route(web::patch().to(handlers::update_post))
                    .route(web::delete().to(handlers::delete_post)),
            )
            .route("/posts/{id}/actions", web::get().to(handlers::post_actions))
            // One toggle route per vote direction
            .route("/posts/{id}/upvote", web::post().to(handlers::upvote))
            .route("/posts/{id}/downvote", web::post().to(handlers::downvote))
            .service(
                web::resource("/posts/{id}/save")
                    .route(web::post().to(handlers::save))
                    .route(web::delete().to(handlers::unsave)),
            )
            .service(
                web::resource("/posts/{id}/comments")
                    .route(web::get().to(handlers::list_comments))
                    .route(web::post().to(handlers::create_comment)),
            )
            .route("/comments/{id}", web::delete().to(handlers::delete_comment))
            .service(
                web::resource("/topics")
                    .route(web::get().to(handlers::list_topics))
                    .route(web::post().to(handlers::create_topic)),
            )
            .route("/topics/{id}", web::delete().to(handlers::delete_topic)),
    );
}
