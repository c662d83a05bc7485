//! 单次评分命令：`omr-server evaluate <image> [A|B] [--no-debug]`

use anyhow::{anyhow, Context, Result};
use std::path::{Path, PathBuf};

use crate::controller::ReportError;
use crate::model::{AnswerKeyVersion, UploadForm, UploadedImage};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluateCommand {
    pub image: PathBuf,
    pub version: AnswerKeyVersion,
    pub debug: bool,
}

impl EvaluateCommand {
    /// 解析 `evaluate` 之后的参数
    pub fn parse<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut image = None;
        let mut version = AnswerKeyVersion::default();
        let mut debug = true;

        for arg in args {
            match arg.as_ref() {
                "--no-debug" => debug = false,
                "--debug" => debug = true,
                flag if flag.starts_with("--") => return Err(anyhow!("未知参数: {}", flag)),
                value if image.is_none() => image = Some(PathBuf::from(value)),
                value => {
                    version = value.parse().map_err(ReportError::InvalidVersion)?;
                }
            }
        }

        let image = image.ok_or_else(|| anyhow!("用法: omr-server evaluate <image> [A|B] [--no-debug]"))?;
        Ok(Self {
            image,
            version,
            debug,
        })
    }

    /// 读取图片，构造与表单上传相同的输入
    pub async fn to_form(&self) -> Result<UploadForm> {
        let bytes = tokio::fs::read(&self.image)
            .await
            .with_context(|| format!("无法读取图片: {}", self.image.display()))?;
        Ok(UploadForm {
            image: UploadedImage::new(file_name_of(&self.image), bytes),
            version: self.version,
            debug: self.debug,
        })
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
