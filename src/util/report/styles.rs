//! CSS样式管理模块

/// CSS样式管理器
pub struct CssStyleManager;

impl CssStyleManager {
    /// 表单页与报告页共用样式
    pub fn get_page_css() -> &'static str {
        r#"
        body {
            font-family: -apple-system, 'Segoe UI', Arial, sans-serif;
            margin: 0 auto;
            padding: 24px;
            max-width: 960px;
            line-height: 1.6;
            color: #262730;
            background-color: #fff;
        }
        h1 {
            margin-top: 0;
            color: #262730;
        }
        .section {
            margin: 24px 0;
        }
        .section h2 {
            font-size: 1.3em;
            border-bottom: 1px solid #e6e6e6;
            padding-bottom: 4px;
        }
        .banner {
            padding: 14px 18px;
            border-radius: 6px;
            margin: 16px 0;
            font-weight: 600;
        }
        .banner-success {
            background: #e8f5e9;
            color: #1b5e20;
            border: 1px solid #a5d6a7;
        }
        .banner-error {
            background: #ffebee;
            color: #b71c1c;
            border: 1px solid #ef9a9a;
        }
        table {
            border-collapse: collapse;
            width: 100%;
            margin: 12px 0;
        }
        th, td {
            padding: 6px 10px;
            border: 1px solid #ddd;
            text-align: left;
            font-size: 0.92em;
        }
        th {
            background-color: #f0f2f6;
            font-weight: 600;
        }
        tr:nth-child(even) { background-color: #fafafa; }
        .note {
            color: #808495;
            font-size: 0.9em;
        }
        .downloads a {
            display: inline-block;
            margin-right: 12px;
            padding: 8px 16px;
            border: 1px solid #d0d0d8;
            border-radius: 6px;
            color: #262730;
            text-decoration: none;
        }
        .downloads a:hover { border-color: #ff4b4b; color: #ff4b4b; }
        .debug-overlay { width: 100%; }
        form .field { margin: 14px 0; }
        form label { display: block; font-weight: 600; margin-bottom: 4px; }
        form .inline { display: inline; font-weight: normal; }
        button {
            padding: 8px 20px;
            border: none;
            border-radius: 6px;
            background: #ff4b4b;
            color: #fff;
            font-size: 1em;
            cursor: pointer;
        }
        #spinner { display: none; margin-left: 12px; color: #808495; }
        "#
    }
}

/// 便捷函数
pub fn get_page_css() -> &'static str {
    CssStyleManager::get_page_css()
}
