//! 资源类型级别的排他租约
//! 远端严格按收到调用的顺序把规则追加到分类/区段末尾；
//! 两个逻辑创建操作的 HTTP 调用若交错，它们的规则在远端也会交错。
//! 因此整个多批次创建过程必须持有按资源类型（而非单个策略实例）划分的排他租约。

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// 租约作用的资源类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    AccessRule,
    Category,
}

impl Display for ResourceKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceKind::AccessRule => f.write_str("access rule"),
            ResourceKind::Category => f.write_str("category"),
        }
    }
}

/// 进程级默认租约表
static GLOBAL_LEASES: Lazy<Arc<LeaseRegistry>> = Lazy::new(|| Arc::new(LeaseRegistry::new()));

/// 按资源类型索引的租约表
#[derive(Debug, Default)]
pub struct LeaseRegistry {
    locks: Mutex<FxHashMap<ResourceKind, Arc<AsyncMutex<()>>>>,
}

/// 已持有的租约，离开作用域时释放（包括错误路径）
#[derive(Debug)]
pub struct Lease {
    kind: ResourceKind,
    _guard: OwnedMutexGuard<()>,
}

impl Lease {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        log::debug!("released {} lease", self.kind);
    }
}

impl LeaseRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 进程级共享实例
    pub fn global() -> Arc<LeaseRegistry> {
        Arc::clone(&GLOBAL_LEASES)
    }

    /// 获取指定资源类型的租约，已被占用时异步等待
    pub async fn acquire(&self, kind: ResourceKind) -> Lease {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(locks.entry(kind).or_insert_with(|| Arc::new(AsyncMutex::new(()))))
        };

        log::debug!("waiting for {} lease", kind);
        let guard = lock.lock_owned().await;
        log::debug!("acquired {} lease", kind);

        Lease { kind, _guard: guard }
    }
}
