//! 照片导入服务 - 业务能力层
//!
//! 从批次 API 拉取批次信息，按序号下载全部照片并校验是否为有效图片

use anyhow::{bail, Context};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{ApiError, AppError, AppResult, FileError};
use crate::workflow::{Importer, PhotoSet};

const API_TIMEOUT: Duration = Duration::from_secs(30);
const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// 批次中的一张照片
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BatchPhoto {
    pub index: u32,
    pub url: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

/// 照片导入服务
pub struct PhotoImporter {
    client: reqwest::Client,
    api_base_url: String,
    token: String,
    output_dir: PathBuf,
}

impl PhotoImporter {
    pub fn new(
        api_base_url: impl Into<String>,
        token: impl Into<String>,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_base_url: api_base_url.into(),
            token: token.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.batch_api_base_url,
            &config.batch_api_token,
            &config.photo_output_dir,
        )
    }

    /// 拉取批次信息
    pub async fn fetch_batch(&self, batch_id: &str) -> AppResult<JsonValue> {
        let url = format!(
            "{}/batches/{}",
            self.api_base_url.trim_end_matches('/'),
            batch_id
        );
        get_json(&self.client, &url, &self.token).await
    }

    async fn import(&self, batch_id: &str) -> anyhow::Result<PhotoSet> {
        let batch = self.fetch_batch(batch_id).await?;
        if batch.get("status").and_then(JsonValue::as_str) != Some("ready") {
            bail!("Batch {} is not ready", batch_id);
        }

        let photos = sorted_photos(&batch)?;
        info!("[批次 {}] 共 {} 张照片待下载", batch_id, photos.len());

        let mut result = PhotoSet::default();
        for photo in photos {
            let path = self.output_dir.join(batch_id).join(photo_file_name(&photo));
            self.download(&photo.url, &path)
                .await
                .with_context(|| format!("下载照片失败: {}", photo.url))?;
            validate_photo(&path).await?;

            result.photo_files.push(path.to_string_lossy().to_string());
            result.photo_urls.push(photo.url);
        }

        Ok(result)
    }

    async fn download(&self, url: &str, path: &Path) -> AppResult<()> {
        debug!("下载 {} → {}", url, path.display());
        let response = self
            .client
            .get(url)
            .timeout(DOWNLOAD_TIMEOUT)
            .send()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        if !response.status().is_success() {
            return Err(AppError::Api(ApiError::BadResponse {
                endpoint: url.to_string(),
                status: response.status().as_u16(),
            }));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| AppError::api_request_failed(url, e))?;

        let path_str = path.to_string_lossy().to_string();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::file_write_failed(&path_str, e))?;
        }
        tokio::fs::write(path, &bytes)
            .await
            .map_err(|e| AppError::file_write_failed(&path_str, e))?;
        Ok(())
    }
}

impl Importer for PhotoImporter {
    async fn import_photos(&self, batch_id: &str) -> anyhow::Result<PhotoSet> {
        self.import(batch_id).await
    }
}

/// GET 一个 JSON 接口（带 Bearer token）
pub(crate) async fn get_json(
    client: &reqwest::Client,
    url: &str,
    token: &str,
) -> AppResult<JsonValue> {
    let mut request = client
        .get(url)
        .timeout(API_TIMEOUT)
        .header(ACCEPT, "application/json");
    if !token.is_empty() {
        request = request.header(AUTHORIZATION, format!("Bearer {}", token));
    }

    let response = request
        .send()
        .await
        .map_err(|e| AppError::api_request_failed(url, e))?;

    if !response.status().is_success() {
        return Err(AppError::Api(ApiError::BadResponse {
            endpoint: url.to_string(),
            status: response.status().as_u16(),
        }));
    }

    let body = response
        .text()
        .await
        .map_err(|e| AppError::api_request_failed(url, e))?;
    serde_json::from_str(&body).map_err(|e| AppError::api_json_failed(url, e))
}

/// 校验并按序号排序照片
///
/// 序号必须唯一且恰好为 1..=n
pub fn sorted_photos(batch: &JsonValue) -> anyhow::Result<Vec<BatchPhoto>> {
    let raw = match batch.get("photos") {
        None | Some(JsonValue::Null) => return Ok(Vec::new()),
        Some(JsonValue::Array(items)) => items,
        Some(_) => bail!("Batch photos must be a list"),
    };

    let mut photos = Vec::with_capacity(raw.len());
    for item in raw {
        let photo: BatchPhoto = serde_json::from_value(item.clone())
            .map_err(|_| anyhow::anyhow!("Each photo must include index and url"))?;
        photos.push(photo);
    }

    let unique: HashSet<u32> = photos.iter().map(|p| p.index).collect();
    if unique.len() != photos.len() {
        bail!("Photo indices must be unique");
    }

    photos.sort_by_key(|p| p.index);
    let consecutive = photos
        .iter()
        .enumerate()
        .all(|(i, p)| p.index as usize == i + 1);
    if !consecutive {
        bail!("Photo indices must be consecutive starting from 1");
    }

    Ok(photos)
}

/// 本地文件名：`{序号:02}_{类型}{扩展名}`
pub fn photo_file_name(photo: &BatchPhoto) -> String {
    let extension = reqwest::Url::parse(&photo.url)
        .ok()
        .and_then(|url| {
            Path::new(url.path())
                .extension()
                .map(|ext| ext.to_string_lossy().to_string())
        })
        .map(|ext| format!(".{}", ext))
        .unwrap_or_else(|| ".jpg".to_string());

    format!(
        "{:02}_{}{}",
        photo.index,
        photo.kind.as_deref().unwrap_or("photo"),
        extension
    )
}

/// 根据文件头判断图片类型
pub fn detect_image_kind(bytes: &[u8]) -> Option<&'static str> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some("jpeg"),
        [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, ..] => Some("png"),
        [b'G', b'I', b'F', b'8', b'7' | b'9', b'a', ..] => Some("gif"),
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P', ..] => Some("webp"),
        [b'B', b'M', ..] => Some("bmp"),
        [b'I', b'I', 0x2A, 0x00, ..] | [b'M', b'M', 0x00, 0x2A, ..] => Some("tiff"),
        _ => None,
    }
}

/// 校验下载后的照片：存在、非空、是图片
pub async fn validate_photo(path: &Path) -> AppResult<()> {
    let path_str = path.to_string_lossy().to_string();
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::File(FileError::NotFound { path: path_str }));
        }
        Err(e) => return Err(AppError::file_read_failed(path_str, e)),
    };

    if bytes.is_empty() {
        return Err(AppError::File(FileError::Empty { path: path_str }));
    }
    if detect_image_kind(&bytes).is_none() {
        return Err(AppError::File(FileError::NotAnImage { path: path_str }));
    }
    Ok(())
}
