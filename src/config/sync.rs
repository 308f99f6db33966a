//! 全局同步配置管理

use std::time::Duration;

use crate::error::{SyncError, SyncResult};
use crate::pipeline::retry::PollPolicy;

/// 远端默认（Global）域的 UUID
pub const FMC_GLOBAL_DOMAIN: &str = "e276abec-e0f2-11e3-8169-6d9ed49b625f";

/// 批量删除后的一致性等待策略
#[derive(Debug, Clone)]
pub enum SettleStrategy {
    /// 固定等待（远端批量删除相对其 HTTP 响应是异步完成的）
    FixedDelay(Duration),
    /// 轮询直到被删除的 id 不再可见
    PollUntilAbsent(PollPolicy),
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::FixedDelay(Duration::from_secs(3))
    }
}

/// 网络访问相关选项（HTTP 客户端使用）
#[derive(Debug, Clone)]
pub struct RemoteOptions {
    pub base_url: String,     // 管理中心地址，例如 https://fmc.example.com
    pub domain: String,       // 域 UUID
    pub timeout: Duration,    // HTTP 超时
    pub access_token: String, // 认证令牌（认证流程由调用方负责）
}

impl RemoteOptions {
    pub fn new(base_url: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            domain: FMC_GLOBAL_DOMAIN.to_string(),
            timeout: Duration::from_secs(30),
            access_token: access_token.into(),
        }
    }
}

/// 完整同步配置
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 单次批量创建的最大规则数
    pub bulk_size_create: usize,
    /// 单次批量删除的最大 id 数
    pub bulk_size_delete: usize,
    /// 过滤参数编码后的长度上限（远端 URL 长度限制）
    pub max_url_param_length: usize,
    /// 列表分页大小
    pub page_size: usize,
    /// 批量删除后的等待策略
    pub settle: SettleStrategy,
    pub remote: Option<RemoteOptions>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            bulk_size_create: 1000,
            bulk_size_delete: 1000,
            max_url_param_length: 7000,
            page_size: 1000,
            settle: SettleStrategy::default(),
            remote: None,
        }
    }
}

impl SyncConfig {
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::new()
    }

    /// 校验配置项取值
    pub fn validate(&self) -> SyncResult<()> {
        let sizes = [
            ("bulk_size_create", self.bulk_size_create),
            ("bulk_size_delete", self.bulk_size_delete),
            ("max_url_param_length", self.max_url_param_length),
            ("page_size", self.page_size),
        ];
        if let Some((name, _)) = sizes.iter().find(|(_, value)| *value == 0) {
            return Err(SyncError::InvalidConfig(format!("{} must be greater than zero", name)));
        }

        if let SettleStrategy::PollUntilAbsent(policy) = &self.settle {
            if policy.interval.is_zero() {
                return Err(SyncError::InvalidConfig("poll interval must be greater than zero".into()));
            }
        }

        if let Some(remote) = &self.remote {
            if remote.base_url.trim().is_empty() {
                return Err(SyncError::InvalidConfig("remote base_url is empty".into()));
            }
            if remote.domain.trim().is_empty() {
                return Err(SyncError::InvalidConfig("remote domain is empty".into()));
            }
        }
        Ok(())
    }
}

/// 自定义构建器（链式 API）
#[derive(Debug, Clone, Default)]
pub struct SyncConfigBuilder {
    config: SyncConfig,
}

impl SyncConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bulk_size_create(mut self, size: usize) -> Self {
        self.config.bulk_size_create = size;
        self
    }

    pub fn bulk_size_delete(mut self, size: usize) -> Self {
        self.config.bulk_size_delete = size;
        self
    }

    pub fn max_url_param_length(mut self, length: usize) -> Self {
        self.config.max_url_param_length = length;
        self
    }

    pub fn page_size(mut self, size: usize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn settle(mut self, strategy: SettleStrategy) -> Self {
        self.config.settle = strategy;
        self
    }

    pub fn remote_options(mut self, remote: RemoteOptions) -> Self {
        self.config.remote = Some(remote);
        self
    }

    pub fn build(self) -> SyncConfig {
        self.config
    }
}
