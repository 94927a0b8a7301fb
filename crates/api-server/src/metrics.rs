//! Derived numbers computed from aggregate query results.

use database::models::cents_to_yuan;

/// Days in the baseline year used for growth rates.
const DAYS_PER_YEAR: f64 = 365.0;

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Cents to yuan, two decimals.
pub fn yuan(cents: i64) -> f64 {
    round_to(cents_to_yuan(cents), 2)
}

/// Average amount in yuan, 0 for an empty set.
pub fn average_yuan(total_cents: i64, count: i64) -> f64 {
    if count == 0 {
        return 0.0;
    }
    round_to(cents_to_yuan(total_cents) / count as f64, 2)
}

/// Percentage of successes, one decimal.
pub fn success_rate(successes: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    round_to(successes as f64 / total as f64 * 100.0, 1)
}

/// Daily average over `days` compared with the yearly daily average of
/// `total_cents`, as a percentage with one decimal.
pub fn growth_rate(period_cents: i64, days: u32, total_cents: i64) -> f64 {
    if total_cents <= 0 || days == 0 {
        return 0.0;
    }
    let period_daily = period_cents as f64 / f64::from(days);
    let yearly_daily = total_cents as f64 / DAYS_PER_YEAR;
    round_to(period_daily / yearly_daily * 100.0, 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_averages_and_rates() {
        assert_eq!(yuan(888), 8.88);
        assert_eq!(average_yuan(1000, 3), 3.33);
        assert_eq!(average_yuan(1000, 0), 0.0);
        assert_eq!(success_rate(2, 3), 66.7);
        assert_eq!(success_rate(0, 0), 0.0);
    }

    #[test]
    fn test_growth_rate() {
        assert_eq!(growth_rate(0, 7, 0), 0.0);
        // A week that earned everything: (x / 7) / (x / 365) * 100.
        assert_eq!(growth_rate(700, 7, 700), 5214.3);
        assert_eq!(growth_rate(3650, 30, 36500), 121.7);
    }
}
