use serde::{Deserialize, Serialize};

/// Basis points in 100%.
pub const BPS_PER_UNIT: i64 = 10_000;

/// `amount * bps / 10_000`, rounded half away from zero to the nearest cent.
pub fn percent_of(amount_cents: i64, bps: i64) -> i64 {
    let scaled = amount_cents as i128 * bps as i128;
    let denom = BPS_PER_UNIT as i128;
    let rounded = if scaled >= 0 {
        (scaled + denom / 2) / denom
    } else {
        (scaled - denom / 2) / denom
    };
    rounded as i64
}

/// Whole percent (e.g. 10) or fractional percent (e.g. 2.5) to basis points.
pub fn percent_to_bps(percent: f64) -> i64 {
    (percent * 100.0).round() as i64
}

/// Gateway fee model: a percentage of the charged amount plus a fixed amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FeeModel {
    pub percent_bps: i64,
    pub fixed_cents: i64,
}

impl FeeModel {
    pub fn new(percent_bps: i64, fixed_cents: i64) -> Self {
        Self {
            percent_bps,
            fixed_cents,
        }
    }

    /// Fee for a charge, never larger than the charge itself.
    pub fn fee_for(&self, amount_cents: i64) -> i64 {
        let fee = percent_of(amount_cents, self.percent_bps) + self.fixed_cents;
        fee.clamp(0, amount_cents.max(0))
    }

    /// `(fee, net_amount)` for a charge.
    pub fn split(&self, amount_cents: i64) -> (i64, i64) {
        let fee = self.fee_for(amount_cents);
        (fee, amount_cents - fee)
    }
}

/// Cents as Brazilian real, e.g. `R$ 1.234,56`.
pub fn format_brl(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let abs = cents.unsigned_abs();
    let reais = abs / 100;
    let centavos = abs % 100;

    let digits = reais.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }

    format!("{}R$ {},{:02}", sign, grouped, centavos)
}

/// Cents to a provider decimal amount (`100.5`).
pub fn cents_to_decimal(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Provider decimal amount to cents.
pub fn decimal_to_cents(value: f64) -> i64 {
    (value * 100.0).round() as i64
}
