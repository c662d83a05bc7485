use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;

/// 存储操作trait
#[async_trait]
pub trait Storage: Send + Sync {
    /// 存储文件（同名覆盖）
    async fn put(&self, key: &str, data: &[u8]) -> Result<()>;

    /// 删除文件（不存在时不报错）
    async fn delete(&self, key: &str) -> Result<()>;

    /// 键对应的本地文件路径（评分程序按路径读取）
    fn local_path(&self, key: &str) -> PathBuf;

    /// 健康检查
    async fn health_check(&self) -> Result<bool>;
}
