//! Shared fixtures for the integration test suites.

use std::io::Cursor;
use std::sync::Arc;

use image::{ImageFormat, Rgb, RgbImage};
use rf_core::models::{Upload, Viewer};
use rf_core::traits::PostRepo;
use rf_db_sqlite::SqlitePostRepo;
use uuid::Uuid;

/// Fresh in-memory database with the schema applied.
pub async fn memory_repo() -> Arc<SqlitePostRepo> {
    Arc::new(
        SqlitePostRepo::new("sqlite::memory:")
            .await
            .expect("in-memory SQLite"),
    )
}

pub fn as_port(repo: &Arc<SqlitePostRepo>) -> Arc<dyn PostRepo> {
    repo.clone()
}

pub fn user() -> Viewer {
    Viewer::user(Uuid::now_v7())
}

pub fn admin() -> Viewer {
    Viewer::admin(Uuid::now_v7())
}

/// A tiny valid PNG.
pub fn png_bytes() -> Vec<u8> {
    let img = RgbImage::from_pixel(2, 2, Rgb([10, 120, 200]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png).expect("encode png");
    out.into_inner()
}

pub fn png_upload() -> Upload {
    Upload { file_name: "photo.PNG".to_string(), data: png_bytes() }
}
