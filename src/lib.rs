//! rulesync - 把有序声明的访问规则集同步到远端防火墙策略存储

// 导出全局错误类型
pub use self::error::{CreateFailure, SyncError, SyncResult};

// 导出配置模块
pub use self::config::{RemoteOptions, SettleStrategy, SyncConfig, SyncConfigBuilder, FMC_GLOBAL_DOMAIN};

// 导出远端接口
pub use self::api::{FilterKey, ListQuery, Page, PolicyApi, RemoteRule, RuleMetadata};
#[cfg(feature = "remote-client")]
pub use self::api::FmcClient;

// 导出批处理流水线
pub use self::pipeline::{
    poll_until, BatchDeleter, BatchWriter, ConsistencyWait, Fetched, FilterLimits, FixedDelay, LeaseRegistry,
    PollPolicy, PollUntilAbsent, ResourceKind, StateReader,
};

// 导出同步门面
pub use self::sync::{SyncOutcome, Synchronizer};

// 导出内核模型与算法
pub use rulesync_engine::{
    needs_replacement, Action, Category, Destination, Placement, RankValidator, ReconcileMode, Rule, RuleSet,
    Section, Violation,
};

// 声明所有子模块
pub mod api;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;
