use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 浏览器 / 指纹浏览器配置文件相关错误
    #[error("浏览器错误: {0}")]
    Browser(#[from] BrowserError),
    /// API 调用错误
    #[error("API错误: {0}")]
    Api(#[from] ApiError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 配置错误
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
}

/// 浏览器相关错误
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("无法连接到浏览器 ({endpoint}): {source}")]
    ConnectionFailed { endpoint: String, source: BoxError },
    #[error("创建页面失败: {source}")]
    PageCreationFailed { source: BoxError },
    #[error("导航到 {url} 失败: {source}")]
    NavigationFailed { url: String, source: BoxError },
    #[error("执行脚本失败: {source}")]
    ScriptExecutionFailed { source: BoxError },
    #[error("截图失败: {source}")]
    ScreenshotFailed { source: BoxError },
    #[error("配置文件 {profile_id} 健康检查超时 ({timeout_secs}秒)")]
    HealthcheckTimeout { profile_id: String, timeout_secs: u64 },
}

/// API 调用错误
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("API请求失败 ({endpoint}): {source}")]
    RequestFailed { endpoint: String, source: BoxError },
    #[error("API返回错误响应 ({endpoint}): status={status}")]
    BadResponse { endpoint: String, status: u16 },
    #[error("JSON解析失败 ({endpoint}): {source}")]
    JsonParseFailed { endpoint: String, source: BoxError },
    #[error("API返回数据格式不符 ({endpoint}): {message}")]
    UnexpectedShape { endpoint: String, message: String },
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    #[error("文件不存在: {path}")]
    NotFound { path: String },
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed { path: String, source: BoxError },
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed { path: String, source: BoxError },
    #[error("TOML解析失败 ({path}): {source}")]
    TomlParseFailed { path: String, source: BoxError },
    #[error("文件为空: {path}")]
    Empty { path: String },
    #[error("不是有效的图片文件: {path}")]
    NotAnImage { path: String },
}

/// LLM 服务错误
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("LLM API调用失败 (模型: {model}): {source}")]
    ApiCallFailed { model: String, source: BoxError },
    #[error("LLM返回结果为空 (模型: {model})")]
    EmptyResponse { model: String },
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("环境变量 {var_name} 不存在")]
    EnvVarNotFound { var_name: String },
}

/// 编排层控制操作错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FlowError {
    #[error("卡片不存在: {card_id}")]
    CardNotFound { card_id: String },
    #[error("卡片 {card_id} 状态为 {status}，只有 NEW 状态可以重新执行")]
    CardNotNew { card_id: String, status: String },
}

// ========== 从常见错误类型转换 ==========

impl From<chromiumoxide::error::CdpError> for AppError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        AppError::Browser(BrowserError::ScriptExecutionFailed {
            source: Box::new(err),
        })
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建浏览器连接错误
    pub fn browser_connection_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Browser(BrowserError::ConnectionFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建API请求失败错误
    pub fn api_request_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::RequestFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建JSON解析错误
    pub fn api_json_failed(
        endpoint: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Api(ApiError::JsonParseFailed {
            endpoint: endpoint.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件读取错误
    pub fn file_read_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(
        path: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source: Box::new(source),
        })
    }

    /// 创建LLM API调用错误
    pub fn llm_api_failed(
        model: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        AppError::Llm(LlmError::ApiCallFailed {
            model: model.into(),
            source: Box::new(source),
        })
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_includes_context() {
        let err = AppError::Api(ApiError::BadResponse {
            endpoint: "https://api.example.com/batches/b1".to_string(),
            status: 503,
        });
        let text = err.to_string();
        assert!(text.contains("batches/b1"));
        assert!(text.contains("503"));
    }

    #[test]
    fn test_flow_error_display() {
        let err = FlowError::CardNotNew {
            card_id: "card_1".to_string(),
            status: "POSTED".to_string(),
        };
        assert!(err.to_string().contains("POSTED"));
    }
}
