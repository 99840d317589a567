use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use tokio::time::sleep;
use tracing::{debug, error, info};

use crate::browser::dolphin::ProfileSession;
use crate::error::{AppError, AppResult, BrowserError};

/// 浏览器调试地址
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEndpoint {
    /// 本机调试端口
    Port(u16),
    /// websocket 地址或完整 http 地址
    Url(String),
}

impl BrowserEndpoint {
    /// 根据配置文件会话决定连接方式，缺失时使用默认端口
    pub fn for_session(session: &ProfileSession, fallback_port: u16) -> Self {
        if let Some(ws) = session.ws_endpoint() {
            if ws.starts_with("ws://") || ws.starts_with("wss://") {
                return BrowserEndpoint::Url(ws.to_string());
            }
            if let Some(port) = session.port() {
                return BrowserEndpoint::Url(format!("ws://127.0.0.1:{}{}", port, ws));
            }
        }
        BrowserEndpoint::Port(session.port().unwrap_or(fallback_port))
    }

    pub fn url(&self) -> String {
        match self {
            BrowserEndpoint::Port(port) => format!("http://localhost:{}", port),
            BrowserEndpoint::Url(url) => url.clone(),
        }
    }
}

/// 连接到浏览器并获取页面
///
/// 优先复用 URL 包含 `target_url` 的已有页面，否则新开页面
pub async fn connect_to_browser_and_page(
    endpoint: &BrowserEndpoint,
    target_url: Option<&str>,
) -> AppResult<(Browser, Page)> {
    let browser_url = endpoint.url();
    info!("正在连接到浏览器: {}", browser_url);

    let (browser, mut handler) = Browser::connect(&browser_url).await.map_err(|e| {
        error!("连接浏览器失败: {}", e);
        AppError::browser_connection_failed(&browser_url, e)
    })?;
    debug!("浏览器连接成功");

    // 在后台处理浏览器事件
    tokio::spawn(async move {
        while let Some(h) = handler.next().await {
            if h.is_err() {
                break;
            }
        }
    });

    // 等待浏览器状态同步
    sleep(tokio::time::Duration::from_millis(300)).await;

    let pages = browser.pages().await?;
    debug!("获取到 {} 个页面", pages.len());

    if let Some(url) = target_url {
        for p in pages.iter() {
            if let Ok(Some(page_url)) = p.url().await {
                if page_url.contains(url) {
                    info!("✓ 复用已有页面: {}", page_url);
                    return Ok((browser, p.clone()));
                }
            }
        }
    }

    if let Some(page) = pages.into_iter().next() {
        debug!("复用第一个已有页面");
        return Ok((browser, page));
    }

    debug!("创建空白页面");
    let page = browser.new_page("about:blank").await.map_err(|e| {
        error!("创建空白页面失败: {}", e);
        AppError::Browser(BrowserError::PageCreationFailed {
            source: Box::new(e),
        })
    })?;
    Ok((browser, page))
}
