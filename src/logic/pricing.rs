//! Gross-up price derivation.
//!
//! Margin is applied on cost; commission and tax are fractions of the final
//! price, so the price is solved as
//!
//! ```text
//! final = cost * (1 + m) / ((1 - c) * (1 - t))
//! ```
//!
//! All arithmetic is exact decimal. Money is rounded to cents half away from
//! zero; the list and floor bands are applied to the quoted (rounded) final
//! price.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

use crate::error::PricingError;
use crate::model::{PriceResult, PricingInput, PricingRequest, TaxRate};

/// List price sits this factor above the final price.
pub const LIST_PRICE_FACTOR: Decimal = dec!(1.05);

/// Floor price sits this factor below the final price.
pub const FLOOR_PRICE_FACTOR: Decimal = dec!(0.95);

const HUNDRED: Decimal = dec!(100);

const MONEY_DECIMALS: u32 = 2;

fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_DECIMALS, RoundingStrategy::MidpointAwayFromZero)
}

fn overflow(what: &str) -> PricingError {
    PricingError::InvalidInput(format!("{} is too large to price", what))
}

fn non_negative(value: Decimal, field: &str) -> Result<(), PricingError> {
    if value < Decimal::ZERO {
        return Err(PricingError::InvalidInput(format!(
            "{} must not be negative (got {})",
            field, value
        )));
    }
    Ok(())
}

/// Derive final, list and floor prices from a production cost.
pub fn derive_price(
    cost: Decimal,
    margin_pct: Decimal,
    commission_pct: Decimal,
    tax_pct: Decimal,
) -> Result<PriceResult, PricingError> {
    non_negative(cost, "cost")?;
    non_negative(margin_pct, "margin_pct")?;
    non_negative(commission_pct, "commission_pct")?;
    non_negative(tax_pct, "tax_pct")?;

    let margin_rate = margin_pct / HUNDRED;
    let commission_rate = commission_pct / HUNDRED;
    let tax_rate = tax_pct / HUNDRED;

    // Each factor must stay positive on its own: two rates above 100% would
    // otherwise multiply back into a positive denominator.
    if commission_rate >= Decimal::ONE || tax_rate >= Decimal::ONE {
        return Err(PricingError::InvalidParameters(format!(
            "commission ({}%) and tax ({}%) must each be below 100%",
            commission_pct, tax_pct
        )));
    }

    let cost_with_margin = cost
        .checked_mul(Decimal::ONE + margin_rate)
        .ok_or_else(|| overflow("cost with margin"))?;
    let denominator = (Decimal::ONE - commission_rate) * (Decimal::ONE - tax_rate);
    if denominator <= Decimal::ZERO {
        return Err(PricingError::InvalidParameters(format!(
            "commission ({}%) and tax ({}%) leave no room for a positive price",
            commission_pct, tax_pct
        )));
    }

    let final_price = round_money(
        cost_with_margin
            .checked_div(denominator)
            .ok_or_else(|| overflow("final price"))?,
    );
    let list_price = round_money(
        final_price
            .checked_mul(LIST_PRICE_FACTOR)
            .ok_or_else(|| overflow("list price"))?,
    );
    let floor_price = round_money(final_price * FLOOR_PRICE_FACTOR);

    Ok(PriceResult {
        cost,
        cost_with_margin: round_money(cost_with_margin),
        final_price,
        list_price,
        floor_price,
        margin_rate,
        commission_rate,
        tax_rate,
    })
}

impl PricingInput {
    pub fn derive(&self) -> Result<PriceResult, PricingError> {
        derive_price(self.cost, self.margin_pct, self.commission_pct, self.tax_pct)
    }
}

/// Tax percentages keyed by billing entity
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxTable {
    rates: BTreeMap<String, Decimal>,
}

impl TaxTable {
    pub fn new(rates: &HashMap<String, Decimal>) -> Self {
        Self {
            rates: rates
                .iter()
                .map(|(entity, pct)| (entity.to_lowercase(), *pct))
                .collect(),
        }
    }

    pub fn rate_for(&self, billing_entity: &str) -> Option<Decimal> {
        self.rates.get(&billing_entity.to_lowercase()).copied()
    }

    pub fn rates(&self) -> Vec<TaxRate> {
        self.rates
            .iter()
            .map(|(entity, pct)| TaxRate {
                billing_entity: entity.clone(),
                tax_pct: *pct,
            })
            .collect()
    }

    /// Turn a request into a pricing input, resolving the tax rate.
    ///
    /// An explicit `tax_pct` wins over `billing_entity`.
    pub fn resolve(&self, request: &PricingRequest) -> Result<PricingInput, PricingError> {
        let tax_pct = match (&request.tax_pct, &request.billing_entity) {
            (Some(pct), _) => *pct,
            (None, Some(entity)) => self.rate_for(entity).ok_or_else(|| {
                PricingError::InvalidInput(format!("Unknown billing entity '{}'", entity))
            })?,
            (None, None) => {
                return Err(PricingError::InvalidInput(
                    "Either tax_pct or billing_entity is required".to_string(),
                ))
            }
        };

        Ok(PricingInput {
            cost: request.cost,
            margin_pct: request.margin_pct,
            commission_pct: request.commission_pct,
            tax_pct,
        })
    }
}
