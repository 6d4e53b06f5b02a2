//! Pre-built test data for common entities

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use core_kernel::{Currency, Money};

/// Common monetary values
pub struct MoneyFixtures;

impl MoneyFixtures {
    /// A USD amount
    pub fn usd(amount: Decimal) -> Money {
        Money::new(amount, Currency::USD)
    }

    /// The canonical invoice total used across scenario tests
    pub fn usd_invoice_total() -> Money {
        Money::new(dec!(1000.00), Currency::USD)
    }

    /// Half of the canonical invoice total
    pub fn usd_half_total() -> Money {
        Money::new(dec!(500.00), Currency::USD)
    }
}

/// Common timestamps
pub struct TemporalFixtures;

impl TemporalFixtures {
    /// A due date safely in the future
    pub fn due_date() -> DateTime<Utc> {
        Utc::now() + Duration::days(30)
    }

    /// A due date in the past, for validation tests
    pub fn past_due_date() -> DateTime<Utc> {
        Utc::now() - Duration::days(7)
    }

    /// A fixed processor-side creation timestamp (unix seconds)
    pub fn processor_created() -> i64 {
        1_700_000_000
    }
}

/// Common string values
pub struct StringFixtures;

impl StringFixtures {
    /// A payer email
    pub fn payer_email() -> &'static str {
        "payer@example.com"
    }

    /// A processor intent id
    pub fn intent_id() -> &'static str {
        "pi_test_0001"
    }

    /// A processor refund id
    pub fn refund_id() -> &'static str {
        "re_test_0001"
    }

    /// The webhook shared secret used in tests
    pub fn webhook_secret() -> &'static str {
        "whsec_test_secret"
    }
}
