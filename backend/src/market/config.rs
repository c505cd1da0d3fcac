use super::adapter::EnvAdapter;
use rust_decimal::Decimal;
use std::str::FromStr;
use tripfin_shared::finance::{DEFAULT_MATURITY_DAYS, PLATFORM_FEE_PERCENT};

pub const DEFAULT_SESSION_TTL_HOURS: i64 = 168;
pub const DEFAULT_SWEEP_INTERVAL_HOURS: u64 = 24;
/// PBKDF2 迭代次数
pub const DEFAULT_PASSWORD_HASH_ROUNDS: u32 = 100_000;

/// Durable Object 内读取的业务配置
#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    /// 注册时自动成为 super_admin 的邮箱（小写）
    pub super_admin_email: Option<String>,
    pub platform_fee_percent: Decimal,
    pub session_ttl_hours: i64,
    pub default_maturity_days: u32,
    pub sweep_interval_hours: u64,
    pub password_hash_rounds: u32,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            super_admin_email: None,
            platform_fee_percent: PLATFORM_FEE_PERCENT,
            session_ttl_hours: DEFAULT_SESSION_TTL_HOURS,
            default_maturity_days: DEFAULT_MATURITY_DAYS,
            sweep_interval_hours: DEFAULT_SWEEP_INTERVAL_HOURS,
            password_hash_rounds: DEFAULT_PASSWORD_HASH_ROUNDS,
        }
    }
}

fn parsed<T: FromStr>(env: &impl EnvAdapter, name: &str, valid: impl Fn(&T) -> bool) -> Option<T> {
    let raw = env.var(name)?;
    match raw.trim().parse::<T>() {
        Ok(v) if valid(&v) => Some(v),
        _ => {
            log_warn!("[config] ignoring invalid {}={:?}, using default", name, raw);
            None
        }
    }
}

impl MarketConfig {
    pub fn from_env(env: &impl EnvAdapter) -> Self {
        let defaults = Self::default();
        Self {
            super_admin_email: env
                .var("SUPER_ADMIN_EMAIL")
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty()),
            platform_fee_percent: parsed(env, "PLATFORM_FEE_PERCENT", |p: &Decimal| {
                !p.is_sign_negative() && *p < Decimal::ONE_HUNDRED
            })
            .unwrap_or(defaults.platform_fee_percent),
            session_ttl_hours: parsed(env, "SESSION_TTL_HOURS", |h: &i64| *h > 0)
                .unwrap_or(defaults.session_ttl_hours),
            default_maturity_days: parsed(env, "DEFAULT_MATURITY_DAYS", |d: &u32| *d > 0)
                .unwrap_or(defaults.default_maturity_days),
            sweep_interval_hours: parsed(env, "SWEEP_INTERVAL_HOURS", |h: &u64| *h > 0)
                .unwrap_or(defaults.sweep_interval_hours),
            password_hash_rounds: parsed(env, "PASSWORD_HASH_ROUNDS", |r: &u32| *r >= 1_000)
                .unwrap_or(defaults.password_hash_rounds),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::adapter::tests::MockEnv;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn defaults_when_env_is_empty() {
        let cfg = MarketConfig::from_env(&MockEnv::new());
        assert_eq!(cfg, MarketConfig::default());
        assert_eq!(cfg.platform_fee_percent, dec!(0.5));
    }

    #[test]
    fn reads_and_validates_vars() {
        let env = MockEnv::new()
            .with_var("SUPER_ADMIN_EMAIL", "  Root@TripFin.in ")
            .with_var("PLATFORM_FEE_PERCENT", "1.25")
            .with_var("SESSION_TTL_HOURS", "-3")
            .with_var("DEFAULT_MATURITY_DAYS", "45")
            .with_var("PASSWORD_HASH_ROUNDS", "10");
        let cfg = MarketConfig::from_env(&env);
        assert_eq!(cfg.super_admin_email.as_deref(), Some("root@tripfin.in"));
        assert_eq!(cfg.platform_fee_percent, dec!(1.25));
        assert_eq!(cfg.session_ttl_hours, DEFAULT_SESSION_TTL_HOURS);
        assert_eq!(cfg.default_maturity_days, 45);
        // 过低的迭代次数被拒绝
        assert_eq!(cfg.password_hash_rounds, DEFAULT_PASSWORD_HASH_ROUNDS);
    }
}
