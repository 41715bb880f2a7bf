use axum::{
    extract::{Multipart, State},
    response::IntoResponse,
};
use std::path::Path;
use uuid::Uuid;

use crate::{
    auth::jwt,
    config::settings::Settings,
    error::AppError,
    response::ApiResponse,
    uploads::{
        crop::{process_image, CropBox, ImageError},
        ImageKind, UploadResponse,
    },
};

impl From<ImageError> for AppError {
    fn from(e: ImageError) -> Self {
        match e {
            ImageError::Image(_) | ImageError::Empty => {
                AppError::UnprocessableEntity("Unsupported or corrupt image".to_string())
            }
            ImageError::CropOutOfBounds => AppError::UnprocessableEntity(e.to_string()),
            ImageError::Io(io) => {
                tracing::error!("Upload IO error: {:?}", io);
                AppError::InternalServerError
            }
        }
    }
}

/// Parsed multipart form of an image upload
#[derive(Default)]
struct UploadForm {
    file: Option<Vec<u8>>,
    kind: ImageKind,
    x: Option<f64>,
    y: Option<f64>,
    width: Option<f64>,
    height: Option<f64>,
}

impl UploadForm {
    /// The crop box, if the client sent one. Partial boxes are rejected.
    fn crop(&self) -> Result<Option<CropBox>, AppError> {
        match (self.x, self.y, self.width, self.height) {
            (None, None, None, None) => Ok(None),
            (Some(x), Some(y), Some(width), Some(height)) => Ok(Some(CropBox {
                x,
                y,
                width,
                height,
            })),
            _ => Err(AppError::BadRequest(
                "Crop box needs x, y, width and height".to_string(),
            )),
        }
    }
}

/// Upload an image, optionally cropping it first
/// POST /api/uploads/image
pub async fn upload_image(
    State(settings): State<Settings>,
    claims: jwt::Claims,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or("").to_string();

        match name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    if !content_type.starts_with("image/") {
                        return Err(AppError::UnprocessableEntity(
                            "Only image uploads are allowed".to_string(),
                        ));
                    }
                }
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                if bytes.len() > settings.max_upload_bytes {
                    return Err(AppError::PayloadTooLarge(format!(
                        "Image exceeds {} bytes",
                        settings.max_upload_bytes
                    )));
                }
                form.file = Some(bytes.to_vec());
            }
            "kind" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                form.kind = ImageKind::parse(&text).ok_or(AppError::BadRequest(
                    "kind must be avatar or post".to_string(),
                ))?;
            }
            "x" | "y" | "width" | "height" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadRequest(e.to_string()))?;
                let value: f64 = text
                    .trim()
                    .parse()
                    .map_err(|_| AppError::BadRequest(format!("{} must be a number", name)))?;
                match name.as_str() {
                    "x" => form.x = Some(value),
                    "y" => form.y = Some(value),
                    "width" => form.width = Some(value),
                    _ => form.height = Some(value),
                }
            }
            _ => {}
        }
    }

    let crop = form.crop()?;
    let kind = form.kind;
    let file = form
        .file
        .ok_or(AppError::BadRequest("Missing file field".to_string()))?;

    // Decoding and resampling are CPU bound
    let processed = tokio::task::spawn_blocking(move || process_image(&file, kind, crop))
        .await
        .map_err(|e| {
            tracing::error!("Image task failed: {:?}", e);
            AppError::InternalServerError
        })??;

    // Each user's uploads live in their own folder, which records ownership
    let owner_dir = settings.upload_dir.join(claims.sub.to_string());
    tokio::fs::create_dir_all(&owner_dir)
        .await
        .map_err(ImageError::from)?;

    let file_name = format!("{}.jpg", Uuid::new_v4());
    tokio::fs::write(owner_dir.join(&file_name), &processed.jpeg)
        .await
        .map_err(ImageError::from)?;

    tracing::info!(
        user_id = %claims.sub,
        file = %file_name,
        kind = ?kind,
        bytes = processed.jpeg.len(),
        "image stored"
    );

    Ok(ApiResponse::success(UploadResponse {
        url: settings.upload_url(claims.sub, &file_name),
        width: processed.width,
        height: processed.height,
    })
    .created())
}

/// An image stored by this service, as named by its public URL
#[derive(Debug, PartialEq)]
struct StoredImage<'a> {
    owner: Uuid,
    name: &'a str,
}

/// Owner and file name of a stored image, if `url` points at one.
fn stored_image<'a>(settings: &Settings, url: &'a str) -> Option<StoredImage<'a>> {
    let prefix = format!("{}/uploads/", settings.public_url);
    let (owner, name) = url.strip_prefix(prefix.as_str())?.split_once('/')?;
    let owner = Uuid::parse_str(owner).ok()?;
    let safe = !name.is_empty()
        && !name.contains('/')
        && !name.contains('\\')
        && !name.starts_with('.');
    safe.then_some(StoredImage { owner, name })
}

/// Whether `url` points into this service's upload area at all.
fn is_local_upload(settings: &Settings, url: &str) -> bool {
    url.starts_with(&format!("{}/uploads/", settings.public_url))
}

/// Reject a local upload URL that `user` did not upload. External URLs pass.
pub fn ensure_own_image(settings: &Settings, url: &str, user: Uuid) -> Result<(), AppError> {
    if !is_local_upload(settings, url) {
        return Ok(());
    }
    match stored_image(settings, url) {
        Some(image) if image.owner == user => Ok(()),
        _ => Err(AppError::UnprocessableEntity(
            "Image must be one of your own uploads".to_string(),
        )),
    }
}

/// Best-effort removal of an image stored for `owner`. External URLs and
/// other users' files are left alone.
pub async fn remove_stored_image(settings: &Settings, url: &str, owner: Uuid) {
    let Some(image) = stored_image(settings, url) else {
        return;
    };
    if image.owner != owner {
        tracing::warn!(%owner, url, "refusing to remove another user's image");
        return;
    }

    let path = Path::new(&settings.upload_dir)
        .join(image.owner.to_string())
        .join(image.name);
    if let Err(e) = tokio::fs::remove_file(&path).await {
        tracing::warn!("Could not remove {}: {}", path.display(), e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_crop_box_is_rejected() {
        let form = UploadForm {
            x: Some(1.0),
            ..Default::default()
        };
        assert!(form.crop().is_err());
        assert!(UploadForm::default().crop().unwrap().is_none());
    }

    #[test]
    fn only_local_uploads_are_recognised() {
        let settings = Settings::for_tests();
        let owner = Uuid::new_v4();
        assert_eq!(
            stored_image(
                &settings,
                &format!("http://localhost:3000/uploads/{owner}/abc.jpg")
            ),
            Some(StoredImage {
                owner,
                name: "abc.jpg"
            })
        );
        assert_eq!(
            stored_image(
                &settings,
                &format!("https://elsewhere.test/uploads/{owner}/abc.jpg")
            ),
            None
        );
        assert_eq!(
            stored_image(
                &settings,
                &format!("http://localhost:3000/uploads/{owner}/../secret")
            ),
            None
        );
        assert_eq!(
            stored_image(&settings, "http://localhost:3000/uploads/abc.jpg"),
            None
        );
        assert_eq!(
            stored_image(
                &settings,
                &format!("http://localhost:3000/uploads/{owner}/.env")
            ),
            None
        );
    }

    #[test]
    fn foreign_local_images_are_rejected() {
        let settings = Settings::for_tests();
        let (me, other) = (Uuid::new_v4(), Uuid::new_v4());

        assert!(ensure_own_image(&settings, &settings.upload_url(me, "a.jpg"), me).is_ok());
        assert!(ensure_own_image(&settings, "https://cdn.test/a.jpg", me).is_ok());
        assert!(matches!(
            ensure_own_image(&settings, &settings.upload_url(other, "a.jpg"), me),
            Err(AppError::UnprocessableEntity(_))
        ));
        assert!(ensure_own_image(&settings, "http://localhost:3000/uploads/a.jpg", me).is_err());
    }

    #[tokio::test]
    async fn remove_stored_image_deletes_only_the_owners_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut settings = Settings::for_tests();
        settings.upload_dir = dir.path().to_path_buf();

        let (owner, other) = (Uuid::new_v4(), Uuid::new_v4());
        let owner_dir = dir.path().join(owner.to_string());
        std::fs::create_dir_all(&owner_dir).unwrap();
        let path = owner_dir.join("pic.jpg");
        std::fs::write(&path, b"jpeg").unwrap();
        let url = settings.upload_url(owner, "pic.jpg");

        // Someone else's post pointing at the file must not remove it
        remove_stored_image(&settings, &url, other).await;
        assert!(path.exists());

        remove_stored_image(&settings, &url, owner).await;
        assert!(!path.exists());

        // Missing files and foreign URLs are ignored
        remove_stored_image(&settings, &url, owner).await;
        remove_stored_image(&settings, "https://cdn.test/pic.jpg", owner).await;
    }
}
