//! 报告渲染描述
//!
//! 控制器的输出：描述页面上应该出现什么，不关心具体以 HTML、JSON 还是文本呈现。

use base64::Engine;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::ScoreSheet;

/// 非对象形式的逐题记录放在这一列
const SCALAR_RECORD_COLUMN: &str = "value";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BannerKind {
    Success,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub kind: BannerKind,
    pub text: String,
}

impl Banner {
    pub fn success(sheet: &ScoreSheet) -> Self {
        Self {
            kind: BannerKind::Success,
            text: format!(
                "Done — Total Score: {}/100 ({:.2}%)",
                sheet.total, sheet.percentage
            ),
        }
    }

    pub fn error(message: impl std::fmt::Display) -> Self {
        Self {
            kind: BannerKind::Error,
            text: format!("Evaluation failed: {}", message),
        }
    }

    /// 上传未通过校验，评分程序未被调用
    pub fn rejected(message: impl std::fmt::Display) -> Self {
        Self {
            kind: BannerKind::Error,
            text: format!("Upload rejected: {}", message),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SubjectRow {
    pub subject: String,
    pub score: String,
}

/// 逐题记录的预览表
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// 评分程序返回的记录总数（可能多于预览行数）
    pub total_records: usize,
    /// 预览行数上限
    pub limit: usize,
}

impl QuestionTable {
    /// 列为全部记录键的并集（按首次出现顺序），只保留前 `limit` 行
    pub fn preview(records: &[Value], limit: usize) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            match record.as_object() {
                Some(obj) => {
                    for key in obj.keys() {
                        if !columns.iter().any(|c| c == key) {
                            columns.push(key.clone());
                        }
                    }
                }
                None => {
                    if !columns.iter().any(|c| c == SCALAR_RECORD_COLUMN) {
                        columns.push(SCALAR_RECORD_COLUMN.to_string());
                    }
                }
            }
        }

        let rows = records
            .iter()
            .take(limit)
            .map(|record| {
                columns
                    .iter()
                    .map(|column| match record.as_object() {
                        Some(obj) => obj.get(column).map(cell_text).unwrap_or_default(),
                        None if column == SCALAR_RECORD_COLUMN => cell_text(record),
                        None => String::new(),
                    })
                    .collect()
            })
            .collect();

        Self {
            columns,
            rows,
            total_records: records.len(),
            limit,
        }
    }

    pub fn is_truncated(&self) -> bool {
        self.total_records > self.rows.len()
    }
}

/// 表格单元格文本：字符串不带引号，null 为空
pub fn cell_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// 可下载的评分产物（内容不解析，原样透传）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadArtifact {
    pub label: String,
    pub file_name: String,
    pub mime: String,
    #[serde(rename = "contentBase64", serialize_with = "serialize_base64")]
    pub content: Vec<u8>,
}

impl DownloadArtifact {
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime, &self.content)
    }
}

/// 调试叠加图
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub file_name: String,
    pub mime: String,
    #[serde(rename = "contentBase64", serialize_with = "serialize_base64")]
    pub content: Vec<u8>,
}

impl InlineImage {
    pub fn data_uri(&self) -> String {
        data_uri(&self.mime, &self.content)
    }
}

/// 一次成功评分的完整渲染描述
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportView {
    pub banner: Banner,
    pub version: String,
    pub subject_scores: Vec<SubjectRow>,
    pub question_preview: QuestionTable,
    pub downloads: Vec<DownloadArtifact>,
    pub debug_image: Option<InlineImage>,
}

impl ReportView {
    pub fn subject_rows(sheet: &ScoreSheet) -> Vec<SubjectRow> {
        sheet
            .subject_scores
            .iter()
            .map(|(subject, score)| SubjectRow {
                subject: subject.clone(),
                score: cell_text(score),
            })
            .collect()
    }
}

fn data_uri(mime: &str, content: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime,
        base64::engine::general_purpose::STANDARD.encode(content)
    )
}

fn serialize_base64<S>(content: &[u8], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sheet(total: Value, percentage: f64) -> ScoreSheet {
        serde_json::from_value(json!({
            "total": total,
            "percentage": percentage,
            "subject_scores": {"Python": 18, "Statistics": 16.5},
            "per_question": []
        }))
        .unwrap()
    }

    #[test]
    fn test_success_banner_text() {
        assert_eq!(
            Banner::success(&sheet(json!(87), 87.0)).text,
            "Done — Total Score: 87/100 (87.00%)"
        );
        assert_eq!(
            Banner::success(&sheet(json!(72.5), 72.456)).text,
            "Done — Total Score: 72.5/100 (72.46%)"
        );
    }

    #[test]
    fn test_error_banner_text() {
        let banner = Banner::error("bad image");
        assert_eq!(banner.kind, BannerKind::Error);
        assert_eq!(banner.text, "Evaluation failed: bad image");
    }

    #[test]
    fn test_subject_rows_keep_order() {
        let rows = ReportView::subject_rows(&sheet(json!(1), 1.0));
        assert_eq!(rows[0].subject, "Python");
        assert_eq!(rows[0].score, "18");
        assert_eq!(rows[1].subject, "Statistics");
        assert_eq!(rows[1].score, "16.5");
    }

    #[test]
    fn test_preview_limits_rows_in_order() {
        let records: Vec<Value> = (1..=75)
            .map(|q| json!({"question": q, "marked": "b", "correct": q % 2 == 0}))
            .collect();

        let table = QuestionTable::preview(&records, 50);
        assert_eq!(table.columns, ["question", "marked", "correct"]);
        assert_eq!(table.rows.len(), 50);
        assert_eq!(table.rows[0][0], "1");
        assert_eq!(table.rows[49][0], "50");
        assert_eq!(table.total_records, 75);
        assert!(table.is_truncated());
    }

    #[test]
    fn test_preview_column_union_and_missing_cells() {
        let records = vec![
            json!({"question": 1, "marked": null}),
            json!({"question": 2, "note": "double mark"}),
            json!(3),
        ];

        let table = QuestionTable::preview(&records, 50);
        assert_eq!(table.columns, ["question", "marked", "note", "value"]);
        assert_eq!(table.rows[0], ["1", "", "", ""]);
        assert_eq!(table.rows[1], ["2", "", "double mark", ""]);
        assert_eq!(table.rows[2], ["", "", "", "3"]);
        assert!(!table.is_truncated());
    }

    #[test]
    fn test_artifact_serializes_base64() {
        let artifact = DownloadArtifact {
            label: "Download JSON".to_string(),
            file_name: "sheet.json".to_string(),
            mime: "application/json".to_string(),
            content: b"{}".to_vec(),
        };
        let value = serde_json::to_value(&artifact).unwrap();
        assert_eq!(value["contentBase64"], "e30=");
        assert_eq!(value["fileName"], "sheet.json");
        assert_eq!(artifact.data_uri(), "data:application/json;base64,e30=");
    }
}
