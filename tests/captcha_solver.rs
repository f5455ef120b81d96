mod common;

use causelist_scraper::config::Config;
use causelist_scraper::error::{AppError, ErrorKind};
use causelist_scraper::models::CaseCategory;
use causelist_scraper::services::captcha::{CaptchaMode, CaptchaOutcome, CaptchaSolver};
use common::{test_config, FakeDriver, FakePage, ScriptedOcr};
use std::sync::Arc;

fn solver(ocr: Arc<ScriptedOcr>, max_attempts: usize) -> CaptchaSolver {
    let config = Config {
        captcha_max_attempts: max_attempts,
        ..test_config()
    };
    CaptchaSolver::new(ocr, &config)
}

#[tokio::test]
async fn test_exhausts_after_max_attempts_with_one_refresh_each() {
    let driver = FakeDriver::portal();
    let ocr = Arc::new(ScriptedOcr::always("abc12"));
    let mut solver = solver(ocr.clone(), 4);

    let err = solver
        .solve(&driver, CaptchaMode::Auto(CaseCategory::Civil))
        .await
        .unwrap_err();

    assert_eq!(AppError::classify(&err), ErrorKind::CaptchaExhausted);
    assert!(matches!(
        err.downcast_ref::<AppError>(),
        Some(AppError::CaptchaExhausted { attempts: 4 })
    ));
    assert_eq!(solver.attempts(), 4);
    assert_eq!(solver.refreshes(), 4);
    assert_eq!(ocr.calls(), 16);
    let page = driver.page();
    assert_eq!(page.refresh_clicks, 4);
    assert!(page.category_clicks.is_empty());
}

#[tokio::test]
async fn test_ocr_noise_is_cleaned() {
    let driver = FakeDriver::portal();
    let mut solver = solver(Arc::new(ScriptedOcr::always(" AB-12 cd\n")), 4);

    let outcome = solver
        .solve(&driver, CaptchaMode::Auto(CaseCategory::Criminal))
        .await
        .unwrap();
    assert_eq!(
        outcome,
        CaptchaOutcome::Solved {
            category: CaseCategory::Criminal,
            text: "ab12cd".to_string()
        }
    );
    assert_eq!(solver.attempts(), 1);
    assert_eq!(solver.refreshes(), 0);
    assert_eq!(driver.page().category_clicks, vec![CaseCategory::Criminal]);
}

#[tokio::test]
async fn test_second_attempt_succeeds_after_short_read() {
    let driver = FakeDriver::portal();
    let ocr = Arc::new(ScriptedOcr::sequence(&["abc12", "abc12", "abc12", "abc12", "xy98zq"]));
    let mut solver = solver(ocr, 4);

    let outcome = solver
        .solve(&driver, CaptchaMode::Auto(CaseCategory::Civil))
        .await
        .unwrap();
    assert!(matches!(outcome, CaptchaOutcome::Solved { ref text, .. } if text == "xy98zq"));
    assert_eq!(solver.attempts(), 2);
    assert_eq!(driver.page().refresh_clicks, 1);
}

#[tokio::test]
async fn test_hybrid_waits_then_resumes_in_auto_mode_on_rejection() {
    let mut page = FakePage::portal();
    page.submissions.push_back(false);
    let driver = FakeDriver::new(page);
    let mut solver = solver(Arc::new(ScriptedOcr::always("ab12cd")), 4);

    let outcome = solver.solve(&driver, CaptchaMode::Hybrid).await.unwrap();
    assert_eq!(
        outcome,
        CaptchaOutcome::AwaitingCategory {
            text: "ab12cd".to_string()
        }
    );
    {
        let page = driver.page();
        assert_eq!(page.captcha_value, "ab12cd");
        assert!(page.category_clicks.is_empty());
    }

    let outcome = solver.resume(&driver, CaseCategory::Civil).await.unwrap();
    assert!(matches!(
        outcome,
        CaptchaOutcome::Solved {
            category: CaseCategory::Civil,
            ..
        }
    ));
    assert_eq!(solver.attempts(), 2);
    assert_eq!(solver.refreshes(), 1);
    let page = driver.page();
    assert_eq!(page.category_clicks, vec![CaseCategory::Civil, CaseCategory::Civil]);
    assert!(page.results_shown);
}

#[tokio::test]
async fn test_check_success_rejects_filled_captcha_input() {
    let driver = FakeDriver::portal();
    driver.page().captcha_value = "ab12cd".to_string();
    let solver = solver(Arc::new(ScriptedOcr::always("ab12cd")), 4);
    assert!(!solver.check_success(&driver).await.unwrap());

    {
        let mut page = driver.page();
        page.captcha_value.clear();
        page.results_shown = true;
    }
    assert!(solver.check_success(&driver).await.unwrap());
}
