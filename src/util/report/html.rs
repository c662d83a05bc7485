//! HTML报告生成模块
//! 负责上传表单页、评分报告页与错误页

use build_html::{Html, HtmlContainer, HtmlPage, Table};

use crate::model::report::{Banner, BannerKind, QuestionTable, ReportView};
use crate::model::AnswerKeyVersion;

const PAGE_TITLE: &str = "OMR Evaluation";

/// HTML报告生成器
pub struct HtmlReportGenerator;

impl HtmlReportGenerator {
    /// 上传表单页
    ///
    /// 未勾选的复选框不会提交，所以先放一个 `debug=false` 隐藏字段，
    /// 勾选时后出现的 `debug=on` 覆盖它。
    pub fn generate_upload_form(allowed_extensions: &[String]) -> String {
        let mut html = Self::page(PAGE_TITLE);
        html.add_raw("<h1>OMR Sheet Evaluation</h1>");
        html.add_raw(&Self::upload_form_html(allowed_extensions));
        html.to_html_string()
    }

    /// 评分成功的报告页
    pub fn generate_report(view: &ReportView, allowed_extensions: &[String]) -> String {
        let mut html = Self::page(PAGE_TITLE);
        html.add_raw("<h1>OMR Sheet Evaluation</h1>");
        html.add_raw(&Self::upload_form_html(allowed_extensions));
        html.add_raw(&Self::banner_html(&view.banner));

        html.add_raw("<div class=\"section\">");
        html.add_raw("<h2>Subject-wise Scores</h2>");
        html.add_table(Self::subject_table(view));
        html.add_raw("</div>");

        html.add_raw("<div class=\"section\">");
        html.add_raw(&format!(
            "<h2>Per-question (first {} rows preview)</h2>",
            view.question_preview.limit
        ));
        html.add_raw(&Self::question_table_html(&view.question_preview));
        html.add_raw("</div>");

        if !view.downloads.is_empty() {
            html.add_raw("<div class=\"section downloads\">");
            for artifact in &view.downloads {
                html.add_raw(&format!(
                    "<a href=\"{}\" download=\"{}\">{}</a>",
                    artifact.data_uri(),
                    escape_html(&artifact.file_name),
                    escape_html(&artifact.label)
                ));
            }
            html.add_raw("</div>");
        }

        if let Some(image) = &view.debug_image {
            html.add_raw("<div class=\"section\">");
            html.add_raw("<h2>Debug Overlay</h2>");
            html.add_raw(&format!(
                "<img class=\"debug-overlay\" style=\"width:100%\" src=\"{}\" alt=\"{}\">",
                image.data_uri(),
                escape_html(&image.file_name)
            ));
            html.add_raw("</div>");
        }

        html.to_html_string()
    }

    /// 失败页：只显示错误横幅，不渲染成功区块
    pub fn generate_error_page(banner: &Banner, allowed_extensions: &[String]) -> String {
        let mut html = Self::page(PAGE_TITLE);
        html.add_raw("<h1>OMR Sheet Evaluation</h1>");
        html.add_raw(&Self::upload_form_html(allowed_extensions));
        html.add_raw(&Self::banner_html(banner));
        html.to_html_string()
    }

    fn page(title: &str) -> HtmlPage {
        HtmlPage::new()
            .with_title(title)
            .with_meta(vec![("charset", "utf-8")])
            .with_style(super::styles::get_page_css())
    }

    fn upload_form_html(allowed_extensions: &[String]) -> String {
        let accept = allowed_extensions
            .iter()
            .map(|ext| format!(".{}", escape_html(ext)))
            .collect::<Vec<_>>()
            .join(",");
        let options = AnswerKeyVersion::ALL
            .iter()
            .map(|version| format!("<option value=\"{0}\">{0}</option>", version))
            .collect::<String>();

        format!(
            r#"<form method="post" action="/evaluate" enctype="multipart/form-data" onsubmit="document.getElementById('spinner').style.display='inline'">
<div class="field"><label for="file">Upload OMR sheet image</label><input type="file" id="file" name="file" accept="{accept}" required></div>
<div class="field"><label for="version">Answer key version</label><select id="version" name="version">{options}</select></div>
<div class="field"><input type="hidden" name="debug" value="false"><input type="checkbox" id="debug" name="debug" value="on" checked> <label class="inline" for="debug">Save debug overlay</label></div>
<button type="submit">Evaluate</button><span id="spinner">Evaluating OMR sheet...</span>
</form>"#
        )
    }

    fn banner_html(banner: &Banner) -> String {
        let class = match banner.kind {
            BannerKind::Success => "banner banner-success",
            BannerKind::Error => "banner banner-error",
        };
        format!("<div class=\"{}\">{}</div>", class, escape_html(&banner.text))
    }

    fn subject_table(view: &ReportView) -> Table {
        let rows: Vec<[String; 2]> = view
            .subject_scores
            .iter()
            .map(|row| [escape_html(&row.subject), escape_html(&row.score)])
            .collect();
        Table::from(rows).with_header_row(["Subject", "score"])
    }

    fn question_table_html(table: &QuestionTable) -> String {
        if table.columns.is_empty() {
            return "<p class=\"note\">No per-question records.</p>".to_string();
        }

        let rows: Vec<Vec<String>> = table
            .rows
            .iter()
            .map(|row| row.iter().map(|cell| escape_html(cell)).collect())
            .collect();
        let header: Vec<String> = table.columns.iter().map(|c| escape_html(c)).collect();
        let mut html = Table::from(rows).with_header_row(header).to_html_string();

        if table.is_truncated() {
            html.push_str(&format!(
                "<p class=\"note\">Showing {} of {} records.</p>",
                table.rows.len(),
                table.total_records
            ));
        }
        html
    }
}

pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}
