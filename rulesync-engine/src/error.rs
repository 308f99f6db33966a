//! rulesync-engine 内核错误定义
//! 封装内核层所有核心错误，与业务层错误解耦，基于thiserror实现类型安全处理
use thiserror::Error;

use crate::validator::Violation;

/// 内核核心错误枚举
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// 规则集校验失败（在任何远端调用之前检出，不重试）
    #[error("Validation failed: {0}")]
    Validation(#[from] Violation),

    /// 无效输入参数（批次上限为0、单个值超过编码长度上限等）
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// 远端数据无法映射到内核模型
    #[error("Malformed remote data: {0}")]
    MalformedRemote(String),
}

/// 内核层全局Result类型别名
pub type CoreResult<T> = Result<T, CoreError>;
