//! 로깅 설정

use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// 로그 필터 환경 변수. 설정되어 있으면 `--debug`보다 우선한다.
pub const STANDARD_ENV_VAR: &str = "RUST_LOG";

/// 기본 필터 지시어
pub fn default_directive(debug: bool) -> &'static str {
    if debug {
        "info,cft=debug"
    } else {
        "info"
    }
}

/// 전역 subscriber 설치 (프로세스당 한 번)
pub fn init(debug: bool) -> Result<(), SetGlobalDefaultError> {
    let filter = EnvFilter::try_from_env(STANDARD_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "info");
        assert_eq!(default_directive(true), "info,cft=debug");
    }
}
