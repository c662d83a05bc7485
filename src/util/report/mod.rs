//! 报告呈现模块
//!
//! 同一份 [`ReportView`](crate::model::report::ReportView) 的几种呈现：
//! - HTML 页面 (html.rs)
//! - CSS 样式 (styles.rs)
//! - 命令行文本 (text.rs)

pub mod html;
pub mod styles;
pub mod text;

pub use html::HtmlReportGenerator;
pub use styles::CssStyleManager;
pub use text::TextReportGenerator;
