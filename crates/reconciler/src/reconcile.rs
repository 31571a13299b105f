use rust_decimal::Decimal;
use types::{
    BalanceSnapshot, CreditInstruction, Currency, CurrencyDelta, PriceTable, RefreshError, UserId,
};

/// Outcome of comparing two balance snapshots.
#[derive(Debug, Clone, PartialEq)]
pub enum ReconciliationResult {
    NoDeposit,
    Deposit(CreditInstruction),
}

/// Pure deposit-detection core: two snapshots plus a price table in, a
/// credit instruction out. All I/O lives at the edges.
#[derive(Debug, Clone)]
pub struct DepositReconciler {
    currencies: Vec<Currency>,
    fee_rate: Decimal,
}

impl DepositReconciler {
    #[must_use]
    pub const fn new(currencies: Vec<Currency>, fee_rate: Decimal) -> Self {
        Self {
            currencies,
            fee_rate,
        }
    }

    #[must_use]
    pub fn currencies(&self) -> &[Currency] {
        &self.currencies
    }

    /// Compares `old` and `new` and values the net increase in USD.
    ///
    /// One pass over the supported currency set; each delta is priced
    /// against its own currency's entry, an indexed join keyed by currency.
    /// A currency that decreased contributes zero to the gross value, so
    /// funds moving out can never produce negative credit. A currency with
    /// a nonzero balance and no price entry aborts the whole attempt with
    /// `PricingGap` before any credit is produced.
    pub fn reconcile(
        &self,
        user_id: &UserId,
        old: &BalanceSnapshot,
        new: &BalanceSnapshot,
        prices: &PriceTable,
    ) -> Result<ReconciliationResult, RefreshError> {
        let mut gross_usd = Decimal::ZERO;
        let mut breakdown = Vec::new();

        for &currency in &self.currencies {
            let previous = old.amount(currency);
            let current = new.amount(currency);

            // Inactive currency: nothing to value, no price required.
            if previous.is_zero() && current.is_zero() {
                continue;
            }

            let price = prices.price(currency)?;
            let delta = current - previous;
            let credited_usd = if delta > Decimal::ZERO {
                delta * price
            } else {
                Decimal::ZERO
            };

            gross_usd += credited_usd;

            if previous != current {
                breakdown.push(CurrencyDelta {
                    currency,
                    previous,
                    current,
                    credited_usd,
                });
            }
        }

        if gross_usd <= Decimal::ZERO {
            return Ok(ReconciliationResult::NoDeposit);
        }

        let net_usd = gross_usd * (Decimal::ONE - self.fee_rate);

        Ok(ReconciliationResult::Deposit(CreditInstruction {
            user_id: user_id.clone(),
            new_snapshot: new.clone(),
            gross_usd,
            net_usd,
            breakdown,
        }))
    }
}
