use crate::error::{AppError, AppResult, FileError};
use crate::models::template::ListingTemplate;
use std::path::{Path, PathBuf};
use tokio::fs;

/// 模板文件路径
pub fn template_path(templates_dir: &str, template_id: &str) -> PathBuf {
    Path::new(templates_dir).join(format!("{}.toml", template_id))
}

/// 从 TOML 文件加载文案模板
pub async fn load_template(templates_dir: &str, template_id: &str) -> AppResult<ListingTemplate> {
    let path = template_path(templates_dir, template_id);
    let path_str = path.to_string_lossy().to_string();

    if !path.exists() {
        return Err(AppError::File(FileError::NotFound { path: path_str }));
    }

    let content = fs::read_to_string(&path)
        .await
        .map_err(|e| AppError::file_read_failed(&path_str, e))?;

    let template: ListingTemplate = toml::from_str(&content).map_err(|e| {
        AppError::File(FileError::TomlParseFailed {
            path: path_str.clone(),
            source: Box::new(e),
        })
    })?;

    tracing::debug!("已加载模板: {}", path_str);
    Ok(template)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "car_listing_flow_tpl_{}_{}",
            name,
            std::process::id()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[tokio::test]
    async fn test_load_template() {
        let dir = temp_dir("ok");
        std::fs::write(
            dir.join("sale.toml"),
            "name = \"Продажа\"\ntext_template = \"Продаётся {brand} {model}\"\n",
        )
        .unwrap();

        let template = load_template(dir.to_str().unwrap(), "sale").await.unwrap();
        assert_eq!(template.name.as_deref(), Some("Продажа"));
        assert_eq!(template.text_template, "Продаётся {brand} {model}");
    }

    #[tokio::test]
    async fn test_missing_template_is_file_error() {
        let dir = temp_dir("missing");
        let err = load_template(dir.to_str().unwrap(), "nope").await.unwrap_err();
        assert!(matches!(err, AppError::File(FileError::NotFound { .. })));
    }
}
