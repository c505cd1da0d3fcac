//! 单利计算：还款流程、出价弹窗与借款方计算器共用

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub const MIN_LOAN_AMOUNT: Decimal = Decimal::from_parts(20_000, 0, 0, false, 0);
pub const MAX_LOAN_AMOUNT: Decimal = Decimal::from_parts(80_000, 0, 0, false, 0);
pub const MIN_INTEREST_RATE: Decimal = Decimal::from_parts(8, 0, 0, false, 0);
pub const MAX_INTEREST_RATE: Decimal = Decimal::from_parts(18, 0, 0, false, 0);

/// 0.5 %
pub const PLATFORM_FEE_PERCENT: Decimal = Decimal::from_parts(5, 0, 0, false, 1);

pub const DEFAULT_MATURITY_DAYS: u32 = 30;
const DAYS_PER_YEAR: Decimal = Decimal::from_parts(365, 0, 0, false, 0);
const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

/// 金额保留到 paise (两位小数)
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `principal × (rate / 365) × days / 100`, rounded to paise.
///
/// `rate` 为年化百分比；天数为负时不计息
pub fn simple_interest(principal: Decimal, rate: Decimal, days: i64) -> Decimal {
    let days = Decimal::from(days.max(0));
    round_money(principal * (rate / DAYS_PER_YEAR) * days / HUNDRED)
}

/// `from` 到 `to` 的整日数，不会为负
pub fn elapsed_days(from: NaiveDate, to: NaiveDate) -> i64 {
    (to - from).num_days().max(0)
}

/// 投资跑满期限的预期收益
pub fn expected_return(amount: Decimal, rate: Decimal, maturity_days: u32) -> Decimal {
    simple_interest(amount, rate, i64::from(maturity_days))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepaymentQuote {
    pub principal: Decimal,
    #[serde(alias = "interest_rate")]
    pub interest_rate: Decimal,
    pub days: i64,
    pub interest: Decimal,
    pub total: Decimal,
}

pub fn quote(principal: Decimal, rate: Decimal, days: i64) -> RepaymentQuote {
    let days = days.max(0);
    let interest = simple_interest(principal, rate, days);
    RepaymentQuote {
        principal,
        interest_rate: rate,
        days,
        interest,
        total: principal + interest,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeSplit {
    pub fee: Decimal,
    pub net: Decimal,
}

/// 放款拆成平台费与借款方实收，`fee + net == amount` 严格成立
pub fn platform_fee(amount: Decimal, percent: Decimal) -> FeeSplit {
    let fee = round_money(amount * percent / HUNDRED);
    FeeSplit {
        fee,
        net: amount - fee,
    }
}

pub fn validate_loan_amount(amount: Decimal) -> Result<(), String> {
    if amount < MIN_LOAN_AMOUNT || amount > MAX_LOAN_AMOUNT {
        return Err(format!(
            "Loan amount must be between ₹{} and ₹{}",
            MIN_LOAN_AMOUNT, MAX_LOAN_AMOUNT
        ));
    }
    Ok(())
}

pub fn validate_interest_rate(rate: Decimal) -> Result<(), String> {
    if rate < MIN_INTEREST_RATE || rate > MAX_INTEREST_RATE {
        return Err(format!(
            "Interest rate must be between {}% and {}%",
            MIN_INTEREST_RATE, MAX_INTEREST_RATE
        ));
    }
    Ok(())
}

/// Indian digit grouping, e.g. `₹1,25,000.50`.
pub fn format_inr(amount: Decimal) -> String {
    let rounded = round_money(amount);
    let negative = rounded.is_sign_negative() && !rounded.is_zero();
    let text = rounded.abs().to_string();
    let (int_part, frac_part) = match text.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (text, None),
    };

    let grouped = if int_part.len() <= 3 {
        int_part
    } else {
        let (head, tail) = int_part.split_at(int_part.len() - 3);
        let mut groups: Vec<String> = Vec::new();
        let mut rest = head;
        while rest.len() > 2 {
            let (h, t) = rest.split_at(rest.len() - 2);
            groups.push(t.to_string());
            rest = h;
        }
        if !rest.is_empty() {
            groups.push(rest.to_string());
        }
        groups.reverse();
        format!("{},{}", groups.join(","), tail)
    };

    let sign = if negative { "-" } else { "" };
    match frac_part {
        Some(f) if f.trim_end_matches('0').is_empty() => format!("{}₹{}", sign, grouped),
        Some(f) => format!("{}₹{}.{:0<2}", sign, grouped, f),
        None => format!("{}₹{}", sign, grouped),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn interest_for_thirty_days() {
        // 50,000 × 12/365 × 30 / 100 = 493.150684...
        assert_eq!(simple_interest(dec!(50000), dec!(12), 30), dec!(493.15));
        assert_eq!(simple_interest(dec!(50000), dec!(12), 0), Decimal::ZERO);
        assert_eq!(simple_interest(dec!(50000), dec!(12), -4), Decimal::ZERO);
    }

    #[test]
    fn full_year_interest_equals_rate() {
        assert_eq!(simple_interest(dec!(40000), dec!(10), 365), dec!(4000));
    }

    #[test]
    fn total_is_monotonic_in_days() {
        let principal = dec!(37500);
        let rate = dec!(13.75);
        let mut previous = quote(principal, rate, 0).total;
        assert_eq!(previous, principal);
        for days in 1..=400 {
            let q = quote(principal, rate, days);
            assert_eq!(q.total, q.principal + q.interest);
            assert!(q.total >= previous, "day {} decreased", days);
            previous = q.total;
        }
    }

    #[test]
    fn early_repayment_costs_less() {
        let early = quote(dec!(60000), dec!(15), 10);
        let at_maturity = quote(dec!(60000), dec!(15), 30);
        assert!(early.interest < at_maturity.interest);
        assert_eq!(expected_return(dec!(60000), dec!(15), 30), at_maturity.interest);
    }

    #[test]
    fn elapsed_days_is_clamped() {
        let a = NaiveDate::from_ymd_opt(2024, 1, 10).unwrap();
        let b = NaiveDate::from_ymd_opt(2024, 2, 9).unwrap();
        assert_eq!(elapsed_days(a, b), 30);
        assert_eq!(elapsed_days(b, a), 0);
    }

    #[test]
    fn fee_split_adds_up() {
        let split = platform_fee(dec!(45000), PLATFORM_FEE_PERCENT);
        assert_eq!(split.fee, dec!(225));
        assert_eq!(split.net, dec!(44775));

        let odd = platform_fee(dec!(33333.33), PLATFORM_FEE_PERCENT);
        assert_eq!(odd.fee + odd.net, dec!(33333.33));
        assert_eq!(odd.fee, dec!(166.67));
    }

    #[test]
    fn loan_bounds_are_inclusive() {
        assert!(validate_loan_amount(dec!(20000)).is_ok());
        assert!(validate_loan_amount(dec!(80000)).is_ok());
        assert!(validate_loan_amount(dec!(19999.99)).is_err());
        assert!(validate_interest_rate(dec!(8)).is_ok());
        assert!(validate_interest_rate(dec!(18.5)).is_err());
    }

    #[test]
    fn inr_grouping() {
        assert_eq!(format_inr(dec!(950)), "₹950");
        assert_eq!(format_inr(dec!(45000)), "₹45,000");
        assert_eq!(format_inr(dec!(125000.5)), "₹1,25,000.50");
        assert_eq!(format_inr(dec!(10000000)), "₹1,00,00,000");
    }
}
