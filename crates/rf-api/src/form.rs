//! Multipart form reading for post and comment submissions.
//!
//! Recognised fields: `content`, `topic_ids` (repeatable, each may hold a
//! comma separated list), `author_id` and a single `image` file part.

use actix_multipart::{Field, Multipart};
use futures_util::TryStreamExt;
use rf_core::error::{AppError, Result};
use rf_core::models::{NewComment, NewPost, PostPatch, Upload};
use uuid::Uuid;

/// Upper bound on an uploaded image.
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
/// Upper bound on any text field.
const MAX_TEXT_BYTES: usize = 64 * 1024;

#[derive(Debug, Default)]
pub struct SubmissionForm {
    pub content: Option<String>,
    pub topic_ids: Option<Vec<Uuid>>,
    pub author_id: Option<String>,
    pub image: Option<Upload>,
}

impl SubmissionForm {
    pub async fn read(mut payload: Multipart) -> Result<Self> {
        let mut form = SubmissionForm::default();

        while let Some(mut field) = payload.try_next().await.map_err(bad_form)? {
            let disposition = field.content_disposition();
            let name = disposition.get_name().unwrap_or_default().to_string();
            let file_name = disposition.get_filename().map(str::to_string);

            match name.as_str() {
                "image" => {
                    let data = read_bytes(&mut field, MAX_UPLOAD_BYTES).await?;
                    // Browsers send an empty part when no file was picked.
                    if !data.is_empty() {
                        form.image = Some(Upload {
                            file_name: file_name.unwrap_or_default(),
                            data,
                        });
                    }
                }
                "content" => form.content = Some(read_text(&mut field).await?),
                "author_id" => form.author_id = Some(read_text(&mut field).await?),
                "topic_ids" => {
                    let raw = read_text(&mut field).await?;
                    let ids = form.topic_ids.get_or_insert_with(Vec::new);
                    for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
                        let id = Uuid::parse_str(part)
                            .map_err(|_| AppError::validation(format!("invalid topic id: {part}")))?;
                        ids.push(id);
                    }
                }
                other => {
                    log::debug!("Ignoring unknown form field {:?}", other);
                    read_bytes(&mut field, MAX_UPLOAD_BYTES).await?;
                }
            }
        }

        Ok(form)
    }

    pub fn into_new_post(self) -> NewPost {
        NewPost {
            content: self.content.unwrap_or_default(),
            topic_ids: self.topic_ids.unwrap_or_default(),
            image: self.image,
        }
    }

    pub fn into_new_comment(self) -> NewComment {
        NewComment {
            content: self.content.unwrap_or_default(),
            image: self.image,
        }
    }

    /// Any `author_id` field is carried through so the service can refuse it.
    pub fn into_patch(self) -> Result<PostPatch> {
        let author_id = match self.author_id {
            Some(raw) => Some(
                Uuid::parse_str(raw.trim())
                    .map_err(|_| AppError::validation("a post's author cannot be changed"))?,
            ),
            None => None,
        };
        Ok(PostPatch {
            author_id,
            content: self.content,
            topic_ids: self.topic_ids,
            image: self.image,
        })
    }
}

fn bad_form(err: actix_multipart::MultipartError) -> AppError {
    AppError::validation(format!("malformed multipart body: {err}"))
}

async fn read_bytes(field: &mut Field, limit: usize) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    while let Some(chunk) = field.try_next().await.map_err(bad_form)? {
        if data.len() + chunk.len() > limit {
            return Err(AppError::validation(format!("form field exceeds {limit} bytes")));
        }
        data.extend_from_slice(&chunk);
    }
    Ok(data)
}

async fn read_text(field: &mut Field) -> Result<String> {
    let data = read_bytes(field, MAX_TEXT_BYTES).await?;
    String::from_utf8(data).map_err(|_| AppError::validation("form field is not valid UTF-8"))
}
