//! Per-token pricing for the models we know about. Used for cost logging only.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

/// Input/output price per token in USD for `model`, or zero when unknown.
pub fn model_cost(model: &str) -> (Decimal, Decimal) {
    // Prices are per million tokens.
    let (input, output) = match model {
        m if m.starts_with("gpt-4o-mini") => (dec!(0.15), dec!(0.60)),
        m if m.starts_with("gpt-4o") => (dec!(2.50), dec!(10.00)),
        m if m.starts_with("gpt-4.1-mini") => (dec!(0.40), dec!(1.60)),
        m if m.starts_with("gpt-4.1") => (dec!(2.00), dec!(8.00)),
        m if m.starts_with("gpt-3.5-turbo") => (dec!(0.50), dec!(1.50)),
        m if m.contains("haiku") => (dec!(0.80), dec!(4.00)),
        m if m.contains("sonnet") => (dec!(3.00), dec!(15.00)),
        m if m.contains("opus") => (dec!(15.00), dec!(75.00)),
        _ => (Decimal::ZERO, Decimal::ZERO),
    };
    let per_million = dec!(1_000_000);
    (input / per_million, output / per_million)
}

/// Estimated USD cost of a call.
pub fn estimate(cost: (Decimal, Decimal), input_tokens: u32, output_tokens: u32) -> Decimal {
    cost.0 * Decimal::from(input_tokens) + cost.1 * Decimal::from(output_tokens)
}
