//! 日志初始化

use tracing_subscriber::EnvFilter;

/// 未设置 `RUST_LOG` 时使用的过滤规则（前缀匹配所有 `jacq_*` crate）
pub const DEFAULT_FILTER: &str = "jacq=info";

/// 安装全局 fmt subscriber
///
/// 过滤规则取自 `RUST_LOG`，未设置时为 [`DEFAULT_FILTER`]。重复调用无效果。
pub fn init_logger() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
