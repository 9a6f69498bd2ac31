//! Upload normalization: classify, convert legacy formats, downsize and
//! recompress images, enforce size limits.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView};

use crate::config::MediaConfig;
use crate::db::models::MediaKind;

const MIB: u64 = 1024 * 1024;
const PREVIEW_DIMENSION: u32 = 320;
const MIN_DIMENSION: u32 = 64;
const QUALITY_STEPS: [u8; 5] = [85, 75, 65, 55, 45];

/// Formats browsers can't be trusted to display; converted to JPEG on arrival.
/// HEIC/HEIF is converted by the upload page before it gets here.
const LEGACY_IMAGE_TYPES: &[&str] = &["image/heic", "image/heif", "image/bmp", "image/tiff"];

#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("A file is required.")]
    Empty,

    #[error("Maximum {kind} size is {limit_mb}MB.")]
    TooLarge { kind: &'static str, limit_mb: u64 },

    #[error("Unsupported file type: {0}")]
    Unsupported(String),

    #[error("Could not process your file.")]
    Conversion(#[source] image::ImageError),

    #[error("HEIC photos must be converted to JPEG first. Please upload from the event's upload page.")]
    HeicNotConverted,

    #[error("Could not encode image: {0}")]
    Encode(#[source] image::ImageError),

    #[error("Media worker failed: {0}")]
    Worker(String),
}

#[derive(Debug, Clone, Copy)]
pub struct MediaLimits {
    pub max_image_bytes: u64,
    pub max_video_bytes: u64,
    pub image_target_bytes: u64,
    pub image_max_dimension: u32,
}

impl From<&MediaConfig> for MediaLimits {
    fn from(config: &MediaConfig) -> Self {
        Self {
            max_image_bytes: config.max_image_mb * MIB,
            max_video_bytes: config.max_video_mb * MIB,
            image_target_bytes: config.image_target_kb * 1024,
            image_max_dimension: config.image_max_dimension,
        }
    }
}

impl Default for MediaLimits {
    fn default() -> Self {
        Self::from(&MediaConfig::default())
    }
}

/// A file as received from the client.
#[derive(Debug, Clone)]
pub struct RawUpload {
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

impl RawUpload {
    /// Declared MIME type, or a guess from the file name.
    pub fn mime_type(&self) -> String {
        let declared = self
            .content_type
            .as_deref()
            .map(|ct| ct.split(';').next().unwrap_or("").trim().to_lowercase())
            .filter(|ct| !ct.is_empty() && ct != "application/octet-stream");
        declared
            .or_else(|| {
                self.file_name
                    .as_deref()
                    .and_then(|name| mime_guess::from_path(name).first())
                    .map(|m| m.essence_str().to_string())
            })
            .unwrap_or_else(|| "application/octet-stream".to_string())
    }

    pub fn kind(&self) -> Option<MediaKind> {
        classify(&self.mime_type())
    }
}

#[derive(Debug, Clone)]
pub struct NormalizedMedia {
    pub data: Bytes,
    pub mime_type: String,
    pub extension: String,
    pub kind: MediaKind,
    /// Small JPEG data URI for on-screen confirmation; images only.
    pub preview: Option<String>,
}

impl NormalizedMedia {
    pub fn is_video(&self) -> bool {
        self.kind == MediaKind::Video
    }
}

pub fn classify(mime_type: &str) -> Option<MediaKind> {
    if mime_type.starts_with("video/") {
        Some(MediaKind::Video)
    } else if mime_type.starts_with("image/") {
        Some(MediaKind::Image)
    } else {
        None
    }
}

pub fn is_legacy_image(mime_type: &str) -> bool {
    LEGACY_IMAGE_TYPES.contains(&mime_type)
}

/// Normalize on the blocking pool; image work is CPU-bound.
pub async fn normalize(
    upload: RawUpload,
    limits: MediaLimits,
) -> Result<NormalizedMedia, NormalizeError> {
    tokio::task::spawn_blocking(move || normalize_blocking(&upload, &limits))
        .await
        .map_err(|e| NormalizeError::Worker(e.to_string()))?
}

pub fn normalize_blocking(
    upload: &RawUpload,
    limits: &MediaLimits,
) -> Result<NormalizedMedia, NormalizeError> {
    if upload.data.is_empty() {
        return Err(NormalizeError::Empty);
    }

    let mime_type = upload.mime_type();
    let size = upload.data.len() as u64;
    match classify(&mime_type) {
        Some(MediaKind::Video) => {
            if size > limits.max_video_bytes {
                return Err(NormalizeError::TooLarge {
                    kind: "video",
                    limit_mb: limits.max_video_bytes / MIB,
                });
            }
            Ok(NormalizedMedia {
                data: upload.data.clone(),
                extension: extension_for(&mime_type, upload.file_name.as_deref()),
                mime_type,
                kind: MediaKind::Video,
                preview: None,
            })
        }
        Some(MediaKind::Image) => {
            if size > limits.max_image_bytes {
                return Err(NormalizeError::TooLarge {
                    kind: "image",
                    limit_mb: limits.max_image_bytes / MIB,
                });
            }
            normalize_image(upload, mime_type, limits)
        }
        None => Err(NormalizeError::Unsupported(mime_type)),
    }
}

fn normalize_image(
    upload: &RawUpload,
    mime_type: String,
    limits: &MediaLimits,
) -> Result<NormalizedMedia, NormalizeError> {
    let img = image::load_from_memory(&upload.data).map_err(|e| {
        if matches!(mime_type.as_str(), "image/heic" | "image/heif") {
            NormalizeError::HeicNotConverted
        } else {
            NormalizeError::Conversion(e)
        }
    })?;
    let preview = Some(preview_data_uri(&img)?);

    // Animated GIFs would lose their frames in a re-encode
    if mime_type == "image/gif" {
        return Ok(NormalizedMedia {
            data: upload.data.clone(),
            mime_type,
            extension: "gif".into(),
            kind: MediaKind::Image,
            preview,
        });
    }

    let (width, height) = img.dimensions();
    let within_targets = (upload.data.len() as u64) <= limits.image_target_bytes
        && width.max(height) <= limits.image_max_dimension;
    if within_targets && !is_legacy_image(&mime_type) {
        return Ok(NormalizedMedia {
            data: upload.data.clone(),
            extension: extension_for(&mime_type, upload.file_name.as_deref()),
            mime_type,
            kind: MediaKind::Image,
            preview,
        });
    }

    let data = compress_to_target(img, limits)?;
    tracing::debug!(
        "Recompressed {} from {} to {} bytes",
        mime_type,
        upload.data.len(),
        data.len()
    );
    Ok(NormalizedMedia {
        data,
        mime_type: "image/jpeg".into(),
        extension: "jpg".into(),
        kind: MediaKind::Image,
        preview,
    })
}

/// Re-encode as JPEG, lowering quality and then dimensions until the byte
/// target is met or the image is as small as it sensibly gets.
fn compress_to_target(img: DynamicImage, limits: &MediaLimits) -> Result<Bytes, NormalizeError> {
    let mut current = fit_within(img, limits.image_max_dimension);
    loop {
        let mut smallest: Option<Vec<u8>> = None;
        for quality in QUALITY_STEPS {
            let encoded = encode_jpeg(&current, quality)?;
            if encoded.len() as u64 <= limits.image_target_bytes {
                return Ok(Bytes::from(encoded));
            }
            smallest = Some(encoded);
        }

        let (width, height) = current.dimensions();
        let longest = width.max(height);
        if longest <= MIN_DIMENSION {
            return Ok(Bytes::from(smallest.unwrap_or_default()));
        }
        current = fit_within(current, (longest * 3 / 4).max(MIN_DIMENSION));
    }
}

fn fit_within(img: DynamicImage, max_dimension: u32) -> DynamicImage {
    let (width, height) = img.dimensions();
    if width.max(height) <= max_dimension {
        img
    } else {
        img.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    }
}

fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, NormalizeError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    JpegEncoder::new_with_quality(&mut buf, quality)
        .encode_image(&rgb)
        .map_err(NormalizeError::Encode)?;
    Ok(buf)
}

fn preview_data_uri(img: &DynamicImage) -> Result<String, NormalizeError> {
    let thumb = img.thumbnail(PREVIEW_DIMENSION, PREVIEW_DIMENSION);
    let jpeg = encode_jpeg(&thumb, 70)?;
    Ok(format!("data:image/jpeg;base64,{}", STANDARD.encode(jpeg)))
}

fn extension_for(mime_type: &str, file_name: Option<&str>) -> String {
    let from_name = file_name
        .and_then(|n| n.rsplit_once('.'))
        .map(|(_, ext)| ext.to_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()));
    let known = match mime_type {
        "image/jpeg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    };
    known
        .map(str::to_string)
        .or(from_name)
        .unwrap_or_else(|| "bin".to_string())
}
