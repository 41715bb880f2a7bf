use serde::{Deserialize, Serialize};

pub mod crop;
pub mod handler;

/// What an uploaded image will be used for; decides the output canvas.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Avatar,
    #[default]
    Post,
}

impl ImageKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "avatar" => Some(ImageKind::Avatar),
            "post" => Some(ImageKind::Post),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadResponse {
    pub url: String,
    pub width: u32,
    pub height: u32,
}
