//! 命令行文本报告

use std::fmt::{self, Write};

use crate::model::report::{Banner, ReportView};

pub struct TextReportGenerator;

impl TextReportGenerator {
    pub fn generate_report(view: &ReportView) -> String {
        let mut out = String::new();
        // 写入 String 不会失败
        let _ = write_report(&mut out, view);
        out
    }

    pub fn generate_error(banner: &Banner) -> String {
        format!("{}\n", banner.text)
    }
}

fn write_report(out: &mut String, view: &ReportView) -> fmt::Result {
    writeln!(out, "{}", view.banner.text)?;
    writeln!(out, "Answer key version: {}", view.version)?;

    writeln!(out, "\nSubject-wise Scores")?;
    let width = view
        .subject_scores
        .iter()
        .map(|row| row.subject.chars().count())
        .max()
        .unwrap_or(0)
        .max("Subject".len());
    writeln!(out, "  {:<width$}  score", "Subject")?;
    for row in &view.subject_scores {
        writeln!(out, "  {:<width$}  {}", row.subject, row.score)?;
    }

    let preview = &view.question_preview;
    writeln!(out, "\nPer-question (first {} rows preview)", preview.limit)?;
    if preview.columns.is_empty() {
        writeln!(out, "  (no records)")?;
    } else {
        writeln!(out, "  {}", preview.columns.join("\t"))?;
        for row in &preview.rows {
            writeln!(out, "  {}", row.join("\t"))?;
        }
        if preview.is_truncated() {
            writeln!(
                out,
                "  ... showing {} of {} records",
                preview.rows.len(),
                preview.total_records
            )?;
        }
    }

    if !view.downloads.is_empty() {
        writeln!(out, "\nArtifacts")?;
        for artifact in &view.downloads {
            writeln!(
                out,
                "  {}: {} ({}, {} bytes)",
                artifact.label,
                artifact.file_name,
                artifact.mime,
                artifact.content.len()
            )?;
        }
    }
    if let Some(image) = &view.debug_image {
        writeln!(out, "\nDebug Overlay: {} ({} bytes)", image.file_name, image.content.len())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::report::{BannerKind, DownloadArtifact, QuestionTable, SubjectRow};
    use serde_json::json;

    #[test]
    fn test_text_report() {
        let records: Vec<_> = (1..=3).map(|q| json!({"question": q, "marked": "a"})).collect();
        let view = ReportView {
            banner: Banner {
                kind: BannerKind::Success,
                text: "Done — Total Score: 87/100 (87.00%)".to_string(),
            },
            version: "B".to_string(),
            subject_scores: vec![SubjectRow {
                subject: "Statistics".to_string(),
                score: "16.5".to_string(),
            }],
            question_preview: QuestionTable::preview(&records, 2),
            downloads: vec![DownloadArtifact {
                label: "Download JSON".to_string(),
                file_name: "sheet.json".to_string(),
                mime: "application/json".to_string(),
                content: b"{}".to_vec(),
            }],
            debug_image: None,
        };

        let text = TextReportGenerator::generate_report(&view);
        assert!(text.starts_with("Done — Total Score: 87/100 (87.00%)\n"));
        assert!(text.contains("Answer key version: B"));
        assert!(text.contains("  Statistics  16.5"));
        assert!(text.contains("  question\tmarked"));
        assert!(text.contains("... showing 2 of 3 records"));
        assert!(text.contains("Download JSON: sheet.json (application/json, 2 bytes)"));
        assert!(!text.contains("Debug Overlay"));
    }

    #[test]
    fn test_text_error() {
        assert_eq!(
            TextReportGenerator::generate_error(&Banner::error("bad image")),
            "Evaluation failed: bad image\n"
        );
    }
}
