pub mod chrome_driver;
pub mod driver;
pub mod js_executor;
pub mod locator;

pub use chrome_driver::{ChromeDriver, ChromeDriverFactory};
pub use driver::{first_present, BrowserDriver, DriverFactory, SelectOption};
pub use js_executor::JsExecutor;
pub use locator::{By, Locator};
