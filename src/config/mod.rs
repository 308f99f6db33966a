pub mod sync;

pub use sync::{RemoteOptions, SettleStrategy, SyncConfig, SyncConfigBuilder, FMC_GLOBAL_DOMAIN};
