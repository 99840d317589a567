use anyhow::{Context, Result};
use tracing::{info, warn};

use car_listing_flow::browser::{connect_to_browser_and_page, BrowserEndpoint, DolphinClient};
use car_listing_flow::services::{
    BrowserFormFiller, HttpBatchSource, ListingGenerator, ListingMapper, ListingPoster,
    LlmService, PageScreenshotter, PhotoImporter,
};
use car_listing_flow::utils::logging;
use car_listing_flow::{CardFlow, Config, FlowScheduler, FlowState, JsExecutor};

#[tokio::main]
async fn main() -> Result<()> {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();
    config.validate()?;
    logging::log_startup(&config);

    // 启动 Dolphin 配置文件并连接浏览器
    let dolphin = DolphinClient::from_config(&config);
    let session = dolphin
        .start_profile(&config.dolphin_profile_id)
        .await
        .context("启动 Dolphin 配置文件失败")?;
    let endpoint = BrowserEndpoint::for_session(&session, config.browser_debug_port);
    let (_browser, page) = connect_to_browser_and_page(&endpoint, Some(&config.post_form_url))
        .await
        .context("连接浏览器失败")?;

    // 组装流水线
    let poster = ListingPoster::new(BrowserFormFiller::new(
        JsExecutor::new(page.clone()),
        &config.post_form_url,
    ))
    .with_screenshotter(PageScreenshotter::new(
        JsExecutor::new(page),
        &config.screenshot_dir,
    ));
    let flow = CardFlow::new(
        PhotoImporter::from_config(&config),
        ListingGenerator::new(LlmService::new(&config), &config.templates_dir),
        ListingMapper::new(),
        poster,
    );
    let mut scheduler = FlowScheduler::new(
        config.interval(),
        FlowState::default(),
        HttpBatchSource::from_config(&config),
        flow,
    )
    .with_template(&config.default_template_id);

    match config.cycles {
        Some(cycles) => scheduler.run_cycles(cycles).await,
        None => {
            tokio::select! {
                _ = scheduler.run_forever() => {}
                _ = tokio::signal::ctrl_c() => info!("收到中断信号，停止轮询"),
            }
        }
    }

    logging::print_final_stats(&scheduler.state().summary());

    if let Err(e) = dolphin.stop_profile(&session.profile_id).await {
        warn!("停止配置文件失败: {}", e);
    }

    Ok(())
}
