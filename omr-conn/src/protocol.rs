use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// 答案卷版本
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnswerKeyVersion {
    A,
    B,
}

impl AnswerKeyVersion {
    pub const ALL: [AnswerKeyVersion; 2] = [AnswerKeyVersion::A, AnswerKeyVersion::B];

    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerKeyVersion::A => "A",
            AnswerKeyVersion::B => "B",
        }
    }
}

impl Default for AnswerKeyVersion {
    fn default() -> Self {
        AnswerKeyVersion::A
    }
}

impl fmt::Display for AnswerKeyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown answer key version `{0}`, expected A or B")]
pub struct ParseVersionError(pub String);

impl FromStr for AnswerKeyVersion {
    type Err = ParseVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "A" => Ok(AnswerKeyVersion::A),
            "B" => Ok(AnswerKeyVersion::B),
            other => Err(ParseVersionError(other.to_string())),
        }
    }
}

/// 评分结果
///
/// `total` 保留 JSON 原始数值表示，整数分数显示为 `87` 而不是 `87.0`。
/// `total` 与 `percentage` 是否一致由评分程序负责，这里不做校验。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSheet {
    pub total: Number,
    pub percentage: f64,
    /// 科目 -> 分数，保持评分程序返回的顺序
    #[serde(default)]
    pub subject_scores: Map<String, Value>,
    /// 逐题记录，保持原始顺序
    #[serde(default)]
    pub per_question: Vec<Value>,
}

/// 评分程序的完整输出
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationOutput {
    pub result: ScoreSheet,
    pub json_path: PathBuf,
    pub csv_path: PathBuf,
    #[serde(default)]
    pub debug_path: Option<PathBuf>,
}

/// 评分程序输出的原始形态：成功结果或者 `{"error": "..."}`
pub(crate) enum RawOutput {
    Success(EvaluationOutput),
    Failure(String),
}

pub(crate) fn parse_output(stdout: &str) -> Result<RawOutput, String> {
    let value = parse_json_document(stdout)?;

    if let Some(message) = value
        .as_object()
        .filter(|obj| !obj.contains_key("result"))
        .and_then(|obj| obj.get("error"))
        .and_then(Value::as_str)
    {
        return Ok(RawOutput::Failure(message.to_string()));
    }

    serde_json::from_value::<EvaluationOutput>(value)
        .map(RawOutput::Success)
        .map_err(|e| e.to_string())
}

/// 整段 stdout 不是 JSON 时（程序先打印了日志），从后往前找以 `{` 开头的行，
/// 取从该行起的第一个 JSON 值；文档可以跨多行，之后还可以有日志行
fn parse_json_document(stdout: &str) -> Result<Value, String> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err("evaluator produced no output".to_string());
    }

    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => Ok(value),
        Err(whole_err) => object_line_starts(trimmed)
            .into_iter()
            .rev()
            .find_map(|start| {
                serde_json::Deserializer::from_str(&trimmed[start..])
                    .into_iter::<Value>()
                    .next()
                    .and_then(Result::ok)
                    .filter(is_evaluator_reply)
            })
            .ok_or_else(|| whole_err.to_string()),
    }
}

/// 每个以 `{` 开头（忽略缩进）的行中 `{` 的字节偏移
fn object_line_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        let indent = line.len() - line.trim_start().len();
        if line[indent..].starts_with('{') {
            starts.push(offset + indent);
        }
        offset += line.len();
    }
    starts
}

/// 跳过嵌套在文档内部、单独成行的逐题记录
fn is_evaluator_reply(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|obj| obj.contains_key("result") || obj.contains_key("error"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        assert_eq!("A".parse::<AnswerKeyVersion>(), Ok(AnswerKeyVersion::A));
        assert_eq!(" B ".parse::<AnswerKeyVersion>(), Ok(AnswerKeyVersion::B));
        assert!("C".parse::<AnswerKeyVersion>().is_err());
        assert!("a".parse::<AnswerKeyVersion>().is_err());
        assert_eq!(AnswerKeyVersion::B.to_string(), "B");
    }

    #[test]
    fn test_parse_success_output_keeps_order() {
        let stdout = r#"{
            "result": {
                "total": 87,
                "percentage": 87.0,
                "subject_scores": {"Python": 18, "EDA": 17, "SQL": 20},
                "per_question": [{"q": 1, "marked": "a", "correct": true}]
            },
            "json_path": "results/sheet.json",
            "csv_path": "results/sheet.csv",
            "debug_path": null
        }"#;

        let RawOutput::Success(output) = parse_output(stdout).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(output.result.total.to_string(), "87");
        let subjects: Vec<&String> = output.result.subject_scores.keys().collect();
        assert_eq!(subjects, ["Python", "EDA", "SQL"]);
        assert_eq!(output.result.per_question.len(), 1);
        assert_eq!(output.debug_path, None);
    }

    #[test]
    fn test_parse_error_object() {
        let RawOutput::Failure(message) = parse_output(r#"{"error": "bad image"}"#).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(message, "bad image");
    }

    #[test]
    fn test_parse_skips_log_lines() {
        let stdout = "loading answer key A\n{\"result\":{\"total\":1.5,\"percentage\":1.5},\"json_path\":\"a.json\",\"csv_path\":\"a.csv\"}\n";
        let RawOutput::Success(output) = parse_output(stdout).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(output.result.total.to_string(), "1.5");
        assert!(output.result.subject_scores.is_empty());
    }

    #[test]
    fn test_parse_pretty_document_after_log_lines() {
        let stdout = r#"loading answer key B
{"stage": "detect", "bubbles": 200}
{
  "result": {
    "total": 64,
    "percentage": 64.0,
    "per_question": [
      {"q": 1, "marked": "c"},
      {"q": 2, "marked": "a"}
    ]
  },
  "json_path": "out/sheet.json",
  "csv_path": "out/sheet.csv"
}
done in 1.2s
"#;
        let RawOutput::Success(output) = parse_output(stdout).unwrap() else {
            panic!("expected success");
        };
        assert_eq!(output.result.total.to_string(), "64");
        assert_eq!(output.result.per_question.len(), 2);
        assert_eq!(output.csv_path, PathBuf::from("out/sheet.csv"));
    }

    #[test]
    fn test_parse_error_object_after_log_lines() {
        let stdout = "reading image\n{\"error\": \"no bubbles found\"}\n";
        let RawOutput::Failure(message) = parse_output(stdout).unwrap() else {
            panic!("expected failure");
        };
        assert_eq!(message, "no bubbles found");
    }

    #[test]
    fn test_parse_garbage() {
        assert!(parse_output("").is_err());
        assert!(parse_output("Traceback (most recent call last):").is_err());
        assert!(parse_output(r#"{"result": {"total": 1}}"#).is_err());
    }
}
