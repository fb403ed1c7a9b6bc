use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost plus the percentage parameters of one price calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingInput {
    pub cost: Decimal,
    pub margin_pct: Decimal,
    pub commission_pct: Decimal,
    pub tax_pct: Decimal,
}

/// Output of the gross-up calculation.
///
/// Monetary fields are rounded to cents; the fractional rates are kept exact
/// for audit and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceResult {
    pub cost: Decimal,
    pub cost_with_margin: Decimal,
    pub final_price: Decimal,
    pub list_price: Decimal,
    pub floor_price: Decimal,
    pub margin_rate: Decimal,
    pub commission_rate: Decimal,
    pub tax_rate: Decimal,
}

/// Pricing request as received from proposal screens.
///
/// Tax is given either directly or through a billing entity whose rate is
/// looked up in the configured tax table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricingRequest {
    pub cost: Decimal,
    #[serde(default)]
    pub margin_pct: Decimal,
    #[serde(default)]
    pub commission_pct: Decimal,
    #[serde(default)]
    pub tax_pct: Option<Decimal>,
    #[serde(default)]
    pub billing_entity: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxRate {
    pub billing_entity: String,
    pub tax_pct: Decimal,
}
