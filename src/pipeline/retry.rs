//! 通用轮询原语
//! 按固定间隔探测，直到条件满足或总超时到期

use std::future::Future;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::{SyncError, SyncResult};

/// 轮询策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// 两次探测之间的间隔
    pub interval: Duration,
    /// 总超时
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// 轮询直到探测返回 `Some`
///
/// # 参数
/// - `policy`: 间隔与总超时
/// - `what`: 等待对象的描述（用于日志与超时错误）
/// - `probe`: 异步探测闭包；`Ok(None)` 表示条件未满足，`Err` 立即中止轮询
///
/// # 返回值
/// - `Ok(T)`: 条件满足时探测返回的值
/// - `Err(SyncError::Timeout)`: 总超时内条件始终未满足
pub async fn poll_until<T, F, Fut>(policy: &PollPolicy, what: &str, mut probe: F) -> SyncResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = SyncResult<Option<T>>>,
{
    let started = Instant::now();
    let deadline = started + policy.timeout;
    let mut attempts = 0usize;

    loop {
        attempts += 1;
        if let Some(value) = probe().await? {
            log::debug!("{} reached after {} attempt(s)", what, attempts);
            return Ok(value);
        }

        if Instant::now() + policy.interval > deadline {
            return Err(SyncError::Timeout {
                what: what.to_string(),
                elapsed: started.elapsed(),
                attempts,
            });
        }

        log::debug!("{} not reached yet (attempt {}), retrying in {:?}", what, attempts, policy.interval);
        tokio::time::sleep(policy.interval).await;
    }
}
