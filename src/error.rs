//! 全局错误类型定义
use rulesync_engine::{CoreError, Rule, Violation};
use serde_json::Error as SerdeJsonError;
use std::time::Duration;
use thiserror::Error;
use url::ParseError as UrlParseError;

#[derive(Error, Debug)]
pub enum SyncError {
    // 校验相关错误（任何远端调用之前检出，不重试）
    #[error("规则集校验失败：{0}")]
    Validation(#[from] Violation),
    #[error("内核处理失败：{0}")]
    Core(CoreError),

    // 批处理相关错误：中止剩余批次，不自动重试、不自动回滚
    #[error("{operation} 第 {batch}/{batches} 批失败：{source}")]
    Batch {
        operation: &'static str,
        batch: usize,
        batches: usize,
        #[source]
        source: Box<SyncError>,
    },

    // 网络相关错误
    #[error("远端返回状态码 {status}：{body}")]
    Status { status: http::StatusCode, body: String },
    #[cfg(feature = "remote-client")]
    #[error("网络请求失败：{0}")]
    HttpError(#[from] reqwest::Error),
    #[error("Header 构造失败：{0}")]
    HeaderError(#[from] http::header::InvalidHeaderValue),
    #[error("远端数据异常：{0}")]
    RemoteError(String),

    // 等待/轮询
    #[error("等待{what}超时：{elapsed:?} 内共探测 {attempts} 次")]
    Timeout {
        what: String,
        elapsed: Duration,
        attempts: usize,
    },

    // 序列化/反序列化错误
    #[error("JSON解析失败：{0}")]
    JsonError(#[from] SerdeJsonError),

    // 基础错误
    #[error("URL解析失败：{0}")]
    UrlError(#[from] UrlParseError),
    #[error("无效配置：{0}")]
    InvalidConfig(String),
    #[error("无效输入：{0}")]
    InvalidInput(String),
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Validation(violation) => SyncError::Validation(violation),
            other => SyncError::Core(other),
        }
    }
}

impl SyncError {
    /// 把单次远端调用的错误包装为批次错误（批次编号从 1 开始）
    pub(crate) fn batch(operation: &'static str, index: usize, batches: usize, source: SyncError) -> Self {
        SyncError::Batch {
            operation,
            batch: index + 1,
            batches,
            source: Box::new(source),
        }
    }

    /// 是否为校验错误
    pub fn is_validation(&self) -> bool {
        matches!(self, SyncError::Validation(_))
    }
}

/// 批量创建失败：已经生效的批次不会回滚，随错误一并返回，便于调用方清理
#[derive(Error, Debug)]
#[error("{error}（失败前已创建 {} 条规则）", .applied.len())]
pub struct CreateFailure {
    pub applied: Vec<Rule>,
    #[source]
    pub error: SyncError,
}

// 全局Result类型
pub type SyncResult<T> = Result<T, SyncError>;
