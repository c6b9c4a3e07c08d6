//! File Storage
//!
//! Uploaded files live under `<work_dir>/uploads/<category>/<uuid>.<ext>`.
//! Callers keep the returned reference (`receipts/<uuid>.pdf`) and hand it
//! back for reads and deletes.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use shared::error::{AppError, AppResult, ErrorCode};
use uuid::Uuid;

/// JPEG quality for product images
const JPEG_QUALITY: u8 = 85;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileCategory {
    /// Bank-transfer receipts, private to the order owner and admins
    Receipts,
    /// Catalog images, served publicly
    Products,
}

impl FileCategory {
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Receipts => "receipts",
            Self::Products => "products",
        }
    }

    fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Self::Receipts => &["png", "jpg", "jpeg", "webp", "pdf"],
            Self::Products => &["png", "jpg", "jpeg", "webp"],
        }
    }

    fn from_dir_name(name: &str) -> Option<Self> {
        match name {
            "receipts" => Some(Self::Receipts),
            "products" => Some(Self::Products),
            _ => None,
        }
    }
}

/// A file as received from a multipart request
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone)]
pub struct StoredFile {
    /// `<category>/<file name>`
    pub reference: String,
    pub size: usize,
}

impl StoredFile {
    /// Public URL, only meaningful for [`FileCategory::Products`]
    pub fn public_url(&self) -> String {
        format!("/uploads/{}", self.reference)
    }
}

#[async_trait::async_trait]
pub trait FileStorage: Send + Sync {
    async fn store(&self, category: FileCategory, file: UploadedFile) -> AppResult<StoredFile>;
    async fn exists(&self, reference: &str) -> bool;
    async fn read(&self, reference: &str) -> AppResult<Vec<u8>>;
    async fn delete(&self, reference: &str) -> AppResult<()>;
}

/// Local-disk storage
pub struct LocalFileStorage {
    root: PathBuf,
    max_bytes: usize,
}

impl LocalFileStorage {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    /// Map a reference to a path, refusing anything outside the known categories
    fn resolve(&self, reference: &str) -> AppResult<PathBuf> {
        let (dir, name) = reference
            .split_once('/')
            .ok_or_else(|| AppError::validation("Invalid file reference"))?;
        if FileCategory::from_dir_name(dir).is_none() || !is_safe_file_name(name) {
            return Err(AppError::validation("Invalid file reference"));
        }
        Ok(self.root.join(dir).join(name))
    }

    fn validate(&self, category: FileCategory, file: &UploadedFile) -> AppResult<String> {
        if file.data.is_empty() {
            return Err(AppError::new(ErrorCode::EmptyFile));
        }
        if file.data.len() > self.max_bytes {
            return Err(AppError::with_message(
                ErrorCode::FileTooLarge,
                format!(
                    "File too large. Maximum size is {}MB",
                    self.max_bytes / 1024 / 1024
                ),
            ));
        }

        let ext = Path::new(&file.filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .ok_or_else(|| {
                AppError::with_message(
                    ErrorCode::UnsupportedFileFormat,
                    format!("Invalid file extension for: {}", file.filename),
                )
            })?;
        let allowed = category.allowed_extensions();
        if !allowed.contains(&ext.as_str()) {
            return Err(AppError::with_message(
                ErrorCode::UnsupportedFileFormat,
                format!(
                    "Unsupported file format '{}'. Supported: {}",
                    ext,
                    allowed.join(", ")
                ),
            ));
        }

        if ext == "pdf" {
            if !file.data.starts_with(b"%PDF") {
                return Err(AppError::with_message(
                    ErrorCode::InvalidImageFile,
                    "File is not a valid PDF",
                ));
            }
        } else if let Err(e) = image::load_from_memory(&file.data) {
            return Err(AppError::with_message(
                ErrorCode::InvalidImageFile,
                format!("Invalid image file ({ext}): {e}"),
            ));
        }
        Ok(ext)
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Re-encode a catalog image as JPEG
fn compress_image(data: &[u8]) -> AppResult<Vec<u8>> {
    let img = image::load_from_memory(data).map_err(|e| {
        AppError::with_message(ErrorCode::InvalidImageFile, format!("Invalid image: {e}"))
    })?;
    let mut buffer = Vec::new();
    let encoder =
        image::codecs::jpeg::JpegEncoder::new_with_quality(Cursor::new(&mut buffer), JPEG_QUALITY);
    img.to_rgb8().write_with_encoder(encoder).map_err(|e| {
        AppError::with_message(
            ErrorCode::FileStorageFailed,
            format!("Failed to compress image: {e}"),
        )
    })?;
    Ok(buffer)
}

fn storage_error(action: &str, e: std::io::Error) -> AppError {
    AppError::with_message(ErrorCode::FileStorageFailed, format!("Failed to {action}: {e}"))
}

#[async_trait::async_trait]
impl FileStorage for LocalFileStorage {
    async fn store(&self, category: FileCategory, file: UploadedFile) -> AppResult<StoredFile> {
        let ext = self.validate(category, &file)?;

        let (data, ext) = match category {
            FileCategory::Products => (compress_image(&file.data)?, "jpg".to_string()),
            FileCategory::Receipts => (file.data, ext),
        };

        let dir = self.root.join(category.dir_name());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| storage_error("create upload directory", e))?;

        let name = format!("{}.{}", Uuid::new_v4(), ext);
        tokio::fs::write(dir.join(&name), &data)
            .await
            .map_err(|e| storage_error("save file", e))?;

        tracing::info!(
            category = category.dir_name(),
            original_name = %file.filename,
            stored_as = %name,
            size = data.len(),
            "File stored"
        );

        Ok(StoredFile {
            reference: format!("{}/{}", category.dir_name(), name),
            size: data.len(),
        })
    }

    async fn exists(&self, reference: &str) -> bool {
        match self.resolve(reference) {
            Ok(path) => tokio::fs::try_exists(path).await.unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn read(&self, reference: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(reference)?;
        match tokio::fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(AppError::not_found("File")),
            Err(e) => Err(storage_error("read file", e)),
        }
    }

    /// Deleting a missing file is not an error
    async fn delete(&self, reference: &str) -> AppResult<()> {
        let path = self.resolve(reference)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::info!(reference = %reference, "File deleted");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(storage_error("delete file", e)),
        }
    }
}
