//! 发布服务 - 业务能力层
//!
//! 在已启动的浏览器配置文件中填写并提交发布表单。
//! 具体的页面操作由 `FormFiller` 完成，这里只负责把填写结果
//! 归一成 `PostOutcome`，并在需要人工处理或失败时截图留证。

use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::future::{ready, Future};
use std::path::PathBuf;
use tracing::{debug, warn};

use crate::infrastructure::JsExecutor;
use crate::workflow::{PostOutcome, Poster};

const NEED_ACTION_FALLBACK: &str = "Manual action required";
const FAILED_FALLBACK: &str = "Posting failed";

/// 表单填写状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillStatus {
    Posted,
    NeedAction,
    Failed,
}

/// 表单填写结果
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FillReport {
    pub status: FillStatus,
    #[serde(default)]
    pub post_url: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// 填写过程的步骤日志
#[derive(Debug, Clone, Default)]
pub struct StepLog {
    steps: Vec<String>,
}

impl StepLog {
    pub fn push(&mut self, step: impl Into<String>) {
        let step = step.into();
        debug!("📝 {}", step);
        self.steps.push(step);
    }

    pub fn steps(&self) -> &[String] {
        &self.steps
    }
}

/// 表单填写能力
pub trait FormFiller: Send + Sync {
    fn fill(
        &self,
        payload: &JsonValue,
        photo_files: &[String],
        steps: &mut StepLog,
    ) -> impl Future<Output = anyhow::Result<FillReport>> + Send;
}

/// 截图能力，返回截图路径
pub trait Screenshotter: Send + Sync {
    fn capture(&self, reason: &str) -> impl Future<Output = Option<String>> + Send;
}

/// 不截图
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScreenshots;

impl Screenshotter for NoScreenshots {
    fn capture(&self, _reason: &str) -> impl Future<Output = Option<String>> + Send {
        ready(None)
    }
}

/// 发布服务
pub struct ListingPoster<F, S = NoScreenshots> {
    filler: F,
    screenshotter: S,
}

impl<F: FormFiller> ListingPoster<F, NoScreenshots> {
    pub fn new(filler: F) -> Self {
        Self {
            filler,
            screenshotter: NoScreenshots,
        }
    }
}

impl<F: FormFiller, S: Screenshotter> ListingPoster<F, S> {
    pub fn with_screenshotter<S2: Screenshotter>(self, screenshotter: S2) -> ListingPoster<F, S2> {
        ListingPoster {
            filler: self.filler,
            screenshotter,
        }
    }

    async fn post(&self, payload: &JsonValue, photo_files: &[String]) -> PostOutcome {
        let mut steps = StepLog::default();
        steps.push("Starting form fill");

        let report = match self.filler.fill(payload, photo_files, &mut steps).await {
            Ok(report) => report,
            Err(e) => FillReport {
                status: FillStatus::Failed,
                post_url: None,
                error: Some(format!("{:#}", e)),
            },
        };
        debug!("表单填写共 {} 步", steps.steps().len());

        if report.status != FillStatus::Posted {
            let reason = match report.status {
                FillStatus::NeedAction => "need_action",
                _ => "failed",
            };
            if let Some(path) = self.screenshotter.capture(reason).await {
                warn!("📸 已保存截图: {}", path);
            }
        }

        let FillReport {
            status,
            post_url,
            error,
        } = report;

        match (status, post_url) {
            (FillStatus::Posted, Some(url)) => PostOutcome::Posted {
                post_url: Some(url),
            },
            (FillStatus::NeedAction, post_url) => PostOutcome::NeedAction {
                post_url,
                errors: vec![error.unwrap_or_else(|| NEED_ACTION_FALLBACK.to_string())],
            },
            (_, post_url) => PostOutcome::Failed {
                post_url,
                errors: vec![error.unwrap_or_else(|| FAILED_FALLBACK.to_string())],
            },
        }
    }
}

impl<F: FormFiller, S: Screenshotter> Poster for ListingPoster<F, S> {
    async fn post_listing(
        &self,
        mapped_payload: &JsonValue,
        photo_files: &[String],
    ) -> anyhow::Result<PostOutcome> {
        Ok(self.post(mapped_payload, photo_files).await)
    }
}

// ========== 浏览器实现 ==========

/// 通过页面脚本填写发布表单
pub struct BrowserFormFiller {
    executor: JsExecutor,
    form_url: String,
}

impl BrowserFormFiller {
    pub fn new(executor: JsExecutor, form_url: impl Into<String>) -> Self {
        Self {
            executor,
            form_url: form_url.into(),
        }
    }

    async fn run(
        &self,
        payload: &JsonValue,
        photo_files: &[String],
        steps: &mut StepLog,
    ) -> anyhow::Result<FillReport> {
        steps.push(format!("Opening {}", self.form_url));
        self.executor.goto(&self.form_url).await?;

        if !photo_files.is_empty() {
            steps.push(format!("Uploading {} photos", photo_files.len()));
            self.executor
                .set_input_files("input[type=file]", photo_files)
                .await?;
        }

        steps.push("Filling fields and submitting");
        let report: FillReport = self.executor.eval_as(build_fill_script(payload)).await?;
        steps.push(format!("Form result: {:?}", report.status));
        Ok(report)
    }
}

impl FormFiller for BrowserFormFiller {
    async fn fill(
        &self,
        payload: &JsonValue,
        photo_files: &[String],
        steps: &mut StepLog,
    ) -> anyhow::Result<FillReport> {
        self.run(payload, photo_files, steps).await
    }
}

/// 构建表单填写脚本
///
/// 按 `name` 属性填写字段，提交后根据页面状态返回
/// `{status, post_url, error}`
pub fn build_fill_script(payload: &JsonValue) -> String {
    format!(
        r#"
        (async () => {{
            const payload = {payload};
            const captcha = () => document.querySelector('iframe[src*="captcha"], [data-marker*="captcha"]');
            try {{
                for (const [name, value] of Object.entries(payload)) {{
                    if (name === 'photos' || value === null || typeof value === 'object') continue;
                    const field = document.querySelector(`[name="${{name}}"]`);
                    if (!field) continue;
                    field.value = String(value);
                    field.dispatchEvent(new Event('input', {{ bubbles: true }}));
                    field.dispatchEvent(new Event('change', {{ bubbles: true }}));
                }}
                if (captcha()) {{
                    return {{ status: 'need_action', error: 'Captcha required' }};
                }}
                const submit = document.querySelector('[data-marker="submit"], button[type="submit"]');
                if (!submit) {{
                    return {{ status: 'failed', error: 'Submit button not found' }};
                }}
                submit.click();
                await new Promise((resolve) => setTimeout(resolve, 5000));
                if (captcha()) {{
                    return {{ status: 'need_action', error: 'Captcha required' }};
                }}
                const link = document.querySelector('a[href*="/item/"], [data-marker="item-link"]');
                if (link) {{
                    return {{ status: 'posted', post_url: link.href }};
                }}
                return {{ status: 'need_action', error: 'Publication not confirmed' }};
            }} catch (error) {{
                return {{ status: 'failed', error: error.message }};
            }}
        }})()
        "#,
        payload = payload
    )
}

/// 截图保存到目录
pub struct PageScreenshotter {
    executor: JsExecutor,
    output_dir: PathBuf,
}

impl PageScreenshotter {
    pub fn new(executor: JsExecutor, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            output_dir: output_dir.into(),
        }
    }

    async fn save(&self, reason: &str) -> Option<String> {
        let file_name = format!(
            "{}_{}.png",
            chrono::Local::now().format("%Y%m%d_%H%M%S"),
            reason
        );
        let path = self.output_dir.join(file_name);
        match self.executor.screenshot(&path).await {
            Ok(()) => Some(path.to_string_lossy().to_string()),
            Err(e) => {
                warn!("截图失败: {}", e);
                None
            }
        }
    }
}

impl Screenshotter for PageScreenshotter {
    async fn capture(&self, reason: &str) -> Option<String> {
        self.save(reason).await
    }
}
