use causelist_scraper::config::Config;
use causelist_scraper::infrastructure::{first_present, ChromeDriverFactory, DriverFactory};
use causelist_scraper::services::{portal, FormNavigator};
use causelist_scraper::models::FieldKind;
use causelist_scraper::utils::logging;

#[tokio::test]
#[ignore] // 默认忽略，需要本机 Chrome 与网络：cargo test -- --ignored
async fn test_live_portal_lists_states() {
    // 初始化日志
    logging::init();

    // 加载配置
    let config = Config::from_env();

    let driver = ChromeDriverFactory::new(config.clone())
        .acquire()
        .await
        .expect("启动浏览器失败");

    driver.navigate(&config.target_url).await.expect("打开页面失败");
    let state = first_present(&*driver, portal::STATE_SELECT, config.element_timeout())
        .await
        .expect("查找州下拉框失败");
    assert!(state.is_some(), "页面应该有州下拉框");

    let navigator = FormNavigator::new(&config);
    let states = navigator
        .field_options(&*driver, FieldKind::State)
        .await
        .expect("读取州选项失败");
    assert!(!states.is_empty());

    driver.close().await.expect("关闭浏览器失败");
}
