//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责会话调度和资源管理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `session_controller` - 会话控制器
//! - 创建会话并为每个会话启动一个工作任务
//! - 独占并保证释放每个会话的浏览器驱动
//! - 在任务顶层捕获错误，写入会话状态
//!
//! ### `session_store` - 会话表
//! - 显式的创建 / 查询 / 清理生命周期
//! - 面向 UI/HTTP 层：轮询、提交选择、取消、获取结果
//!
//! ## 层次关系
//!
//! ```text
//! session_store (多个会话)
//!     ↓
//! session_controller (单个会话的工作任务)
//!     ↓
//! workflow::CauseListFlow (一次抓取的步骤)
//!     ↓
//! services (能力层：表单 / 日期 / 验证码 / 解析 / 导出)
//!     ↓
//! infrastructure (基础设施：BrowserDriver)
//! ```

pub mod session_controller;
pub mod session_store;

pub use session_controller::SessionController;
pub use session_store::SessionStore;
