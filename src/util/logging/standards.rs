//! Centralised logging metadata (event names, shared keys, etc.).

/// Canonical event names used across the service.
pub mod events {
    /// HTTP request lifecycle.
    pub const REQUEST_START: &str = "request.start";
    pub const REQUEST_COMPLETE: &str = "request.complete";
    pub const REQUEST_ERROR: &str = "request.error";
    pub const REQUEST_SLOW: &str = "request.slow";

    /// 上传与暂存。
    pub const UPLOAD_RECEIVED: &str = "upload.received";
    pub const UPLOAD_REJECTED: &str = "upload.rejected";
    pub const STAGING_WRITTEN: &str = "staging.written";
    pub const STAGING_FAILED: &str = "staging.failed";

    /// 评分调用。
    pub const EVALUATION_START: &str = "evaluation.start";
    pub const EVALUATION_COMPLETE: &str = "evaluation.complete";
    pub const EVALUATION_FAILED: &str = "evaluation.failed";

    /// 报告渲染与产物。
    pub const REPORT_RENDERED: &str = "report.rendered";
    pub const ARTIFACT_MISSING: &str = "artifact.missing";
    pub const ARTIFACT_READ_FAILED: &str = "artifact.read_failed";
}
