//! eCourts 排期表页面的定位策略
//!
//! 每个列表按优先级排列，调用方逐个尝试；页面改版时只需要改这里

use crate::infrastructure::Locator;
use crate::models::CaseCategory;

pub static STATE_SELECT: &[Locator] = &[Locator::id("sess_state_code")];

pub static DISTRICT_SELECT: &[Locator] = &[Locator::id("sess_dist_code")];

pub static COMPLEX_SELECT: &[Locator] = &[Locator::id("court_complex_code")];

/// 法院综合体下拉框的 id，法官下拉框查找时需要排除它
pub const COMPLEX_SELECT_ID: &str = "court_complex_code";

/// 法官/法庭名称下拉框，在选择法院综合体之后异步生成
pub static JUDGE_SELECT: &[Locator] = &[
    Locator::id("court_name_code"),
    Locator::id("court_code"),
    Locator::id("court_judge_code"),
    Locator::id("judge_code"),
    Locator::name("court_code"),
    Locator::name("court_name_code"),
    Locator::name("judge_code"),
    Locator::xpath("//select[contains(@id, 'court') and contains(@id,'name')]"),
    Locator::xpath("//select[contains(@id, 'court') and contains(@id,'judge')]"),
    Locator::xpath("//select[(contains(@name,'judge') or contains(@name,'court_name') or contains(@name,'court')) and not(@id='court_complex_code')]"),
    Locator::xpath("//select[not(@id='sess_state_code') and not(@id='sess_dist_code') and not(@id='court_complex_code')]"),
];

pub static DATE_INPUT: &[Locator] = &[
    Locator::id("cause_list_date"),
    Locator::name("cause_list_date"),
    Locator::id("hearing_date"),
    Locator::name("hearing_date"),
    Locator::xpath("//input[contains(@id,'date')]"),
    Locator::xpath("//input[contains(@name,'date')]"),
    Locator::xpath("//input[@type='date']"),
];

pub static CAPTCHA_IMAGE: &[Locator] = &[
    Locator::xpath("//img[contains(@src,'captcha')]"),
    Locator::xpath("//img[contains(@id,'captcha')]"),
    Locator::xpath("//img[contains(@class,'captcha')]"),
    Locator::xpath("//img[@id='captchaImage']"),
    Locator::xpath("//img[contains(@alt,'captcha')]"),
];

pub static CAPTCHA_INPUT: &[Locator] = &[
    Locator::id("cause_list_captcha_code"),
    Locator::name("cause_list_captcha_code"),
    Locator::xpath("//input[contains(@placeholder,'Captcha')]"),
    Locator::xpath("//input[@aria-label='Enter Captcha']"),
];

pub static CAPTCHA_REFRESH: &[Locator] = &[
    Locator::xpath("//a[contains(@onclick,'refreshCaptcha')]"),
    Locator::xpath("//a[contains(text(),'Refresh')]"),
    Locator::xpath("//button[contains(text(),'Refresh')]"),
    Locator::xpath("//img[contains(@onclick,'refresh')]/parent::a"),
];

/// 提交后出现即判定验证码错误
pub static FAILURE_BANNERS: &[Locator] = &[
    Locator::xpath("//div[@class='alert alert-danger']"),
    Locator::xpath("//div[contains(@class,'alert') and contains(text(),'Invalid')]"),
    Locator::xpath("//span[contains(text(),'Invalid Captcha')]"),
    Locator::xpath("//div[@role='alert' and contains(text(),'invalid')]"),
];

/// 提交后出现即判定结果页已加载
pub static SUCCESS_MARKERS: &[Locator] = &[
    Locator::xpath("//table[contains(@class,'table')]"),
    Locator::xpath("//div[contains(text(),'Sr No')]"),
    Locator::xpath("//th[contains(text(),'Cases')]"),
    Locator::xpath("//th[contains(text(),'Party Name')]"),
    Locator::xpath("//div[contains(text(),'Principal District Judge')]"),
    Locator::xpath("//div[contains(text(),'Civil Cases Listed')]"),
    Locator::xpath("//tbody/tr"),
];

pub static RECORD_NOT_FOUND: &[Locator] = &[Locator::xpath("//div[contains(text(),'Record not found')]")];

/// 按钮 onclick 中的类别代码
static CATEGORY_CODES: phf::Map<&'static str, &'static str> = phf::phf_map! {
    "Civil" => "civ",
    "Criminal" => "cri",
};

/// 类别按钮的定位列表
pub fn category_buttons(category: CaseCategory) -> Vec<Locator> {
    let name = category.name();
    let code = CATEGORY_CODES.get(name).copied().unwrap_or_default();
    vec![
        Locator::xpath_owned(format!(
            "//button[@class='btn btn-primary' and contains(@onclick, '{}')]",
            code
        )),
        Locator::xpath_owned(format!(
            "//button[contains(@onclick, 'submit_causelist') and contains(@onclick, '{}')]",
            code
        )),
        Locator::xpath_owned(format!(
            "//button[contains(text(), '{}') and contains(@onclick, 'submit_causelist')]",
            name
        )),
        Locator::xpath_owned(format!("//button[contains(text(), '{}')]", name)),
        Locator::xpath_owned(format!("//input[@value='{}']", name)),
    ]
}
