//! Trade amount calculator
//!
//! Price is collateral per one synthetic unit. Fees are always charged in collateral:
//! taken from the input on open, from the output on close. Every derived amount is
//! truncated toward zero to its token's decimals, so rounding never favours the trader.

use std::str::FromStr;

use rust_decimal::Decimal;

use crate::domain::{
    truncate, AccountContext, ComputedAmounts, PrimaryError, TradeDirection, TypedField,
};
use crate::error::AmountError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TradeAmountCalculator {
    pub collateral_decimals: u32,
    pub synthetic_decimals: u32,
}

impl TradeAmountCalculator {
    pub fn new(collateral_decimals: u32, synthetic_decimals: u32) -> Self {
        Self {
            collateral_decimals,
            synthetic_decimals,
        }
    }

    /// Decimals of the (input, output) legs for a direction
    pub fn leg_decimals(&self, direction: TradeDirection) -> (u32, u32) {
        match direction {
            TradeDirection::Open => (self.collateral_decimals, self.synthetic_decimals),
            TradeDirection::Close => (self.synthetic_decimals, self.collateral_decimals),
        }
    }

    /// Derive the untyped leg from the typed one
    pub fn compute(
        &self,
        direction: TradeDirection,
        typed_field: TypedField,
        typed_value: &str,
        price: &str,
        fee: Decimal,
    ) -> Result<ComputedAmounts, AmountError> {
        let (in_decimals, out_decimals) = self.leg_decimals(direction);
        let cdec = self.collateral_decimals;
        let sdec = self.synthetic_decimals;

        let typed_decimals = match typed_field {
            TypedField::Input => in_decimals,
            TypedField::Output => out_decimals,
        };
        let typed = parse_amount(typed_value, typed_decimals)?;
        let price = parse_price(price, cdec)?;

        if fee.is_sign_negative() || fee >= Decimal::ONE {
            return Err(AmountError::InvalidFee(fee));
        }
        let keep = Decimal::ONE - fee;

        let (amount_in, amount_out, fee_amount) = match (direction, typed_field) {
            (TradeDirection::Open, TypedField::Input) => {
                let fee_amount = truncate(mul(typed, fee)?, cdec);
                let net = typed - fee_amount;
                let out = truncate(div(net, price)?, sdec);
                (typed, out, fee_amount)
            }
            (TradeDirection::Open, TypedField::Output) => {
                let gross = truncate(mul(typed, price)?, cdec);
                let input = truncate(div(gross, keep)?, cdec);
                (input, typed, input - gross)
            }
            (TradeDirection::Close, TypedField::Input) => {
                let gross = truncate(mul(typed, price)?, cdec);
                let fee_amount = truncate(mul(gross, fee)?, cdec);
                (typed, gross - fee_amount, fee_amount)
            }
            (TradeDirection::Close, TypedField::Output) => {
                let units = div(typed, price)?;
                let input = truncate(div(units, keep)?, sdec);
                let gross = truncate(mul(input, price)?, cdec);
                let fee_amount = (gross - typed).max(Decimal::ZERO);
                (input, typed, fee_amount)
            }
        };

        Ok(ComputedAmounts {
            direction,
            typed_field,
            amount_in,
            amount_out,
            fee_amount,
            in_decimals,
            out_decimals,
        })
    }
}

/// Classify whether the computed trade can be submitted. First match wins.
pub fn classify(ctx: &AccountContext, amounts: &ComputedAmounts) -> PrimaryError {
    if ctx.account.is_none() || ctx.chain_id.is_none() {
        return PrimaryError::Account;
    }
    if amounts.amount_in.is_zero() {
        return PrimaryError::Amount;
    }
    if amounts.amount_in > ctx.balance {
        return PrimaryError::Balance;
    }
    PrimaryError::Valid
}

/// Parse a typed amount; blank input means zero
pub fn parse_amount(raw: &str, decimals: u32) -> Result<Decimal, AmountError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "." {
        return Ok(Decimal::ZERO);
    }

    let value =
        Decimal::from_str(trimmed).map_err(|_| AmountError::InvalidAmount(raw.to_string()))?;
    if value.is_sign_negative() && !value.is_zero() {
        return Err(AmountError::InvalidAmount(raw.to_string()));
    }
    Ok(truncate(value, decimals))
}

fn parse_price(raw: &str, decimals: u32) -> Result<Decimal, AmountError> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|_| AmountError::InvalidPrice(raw.to_string()))?;
    let value = truncate(value, decimals);
    if value <= Decimal::ZERO {
        return Err(AmountError::InvalidPrice(raw.to_string()));
    }
    Ok(value)
}

fn mul(a: Decimal, b: Decimal) -> Result<Decimal, AmountError> {
    a.checked_mul(b).ok_or(AmountError::Overflow("multiplication"))
}

fn div(a: Decimal, b: Decimal) -> Result<Decimal, AmountError> {
    a.checked_div(b).ok_or(AmountError::Overflow("division"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::Address;
    use rust_decimal_macros::dec;

    fn calc() -> TradeAmountCalculator {
        TradeAmountCalculator::new(18, 18)
    }

    fn connected(balance: Decimal) -> AccountContext {
        AccountContext {
            account: Some(Address::repeat_byte(7)),
            chain_id: Some(250),
            balance,
        }
    }

    #[test]
    fn open_with_collateral_typed_takes_fee_from_input() {
        let amounts = calc()
            .compute(TradeDirection::Open, TypedField::Input, "100", "50", dec!(0.01))
            .unwrap();
        assert_eq!(amounts.amount_in, dec!(100));
        assert_eq!(amounts.fee_amount, dec!(1));
        assert_eq!(amounts.amount_out, dec!(1.98));
    }

    #[test]
    fn open_with_synthetic_typed_grosses_up_input() {
        let amounts = calc()
            .compute(TradeDirection::Open, TypedField::Output, "1.98", "50", dec!(0.01))
            .unwrap();
        assert_eq!(amounts.amount_out, dec!(1.98));
        assert_eq!(amounts.amount_in, dec!(100));
        assert_eq!(amounts.fee_amount, dec!(1));
    }

    #[test]
    fn close_with_synthetic_typed_takes_fee_from_output() {
        let amounts = calc()
            .compute(TradeDirection::Close, TypedField::Input, "2", "50", dec!(0.01))
            .unwrap();
        assert_eq!(amounts.amount_in, dec!(2));
        assert_eq!(amounts.fee_amount, dec!(1));
        assert_eq!(amounts.amount_out, dec!(99));
    }

    #[test]
    fn close_with_collateral_typed_grosses_up_input() {
        let amounts = calc()
            .compute(TradeDirection::Close, TypedField::Output, "99", "50", dec!(0.01))
            .unwrap();
        assert_eq!(amounts.amount_out, dec!(99));
        assert_eq!(amounts.amount_in, dec!(2));
        assert_eq!(amounts.fee_amount, dec!(1));
    }

    #[test]
    fn derived_amounts_truncate_to_token_decimals() {
        let calc = TradeAmountCalculator::new(6, 18);
        let amounts = calc
            .compute(TradeDirection::Open, TypedField::Input, "1", "3", Decimal::ZERO)
            .unwrap();
        assert_eq!(amounts.amount_out, dec!(0.333333333333333333));

        let amounts = calc
            .compute(TradeDirection::Close, TypedField::Input, "1", "0.3333333", Decimal::ZERO)
            .unwrap();
        // Price is fixed to collateral precision before use
        assert_eq!(amounts.amount_out, dec!(0.333333));

        let amounts = calc
            .compute(TradeDirection::Open, TypedField::Input, "1.1234567", "1", Decimal::ZERO)
            .unwrap();
        assert_eq!(amounts.amount_in, dec!(1.123456));
    }

    #[test]
    fn fees_never_add_value_on_round_trip() {
        let prices = ["50", "0.37", "1234.5678", "3"];
        let fees = [dec!(0), dec!(0.001), dec!(0.01), dec!(0.05)];
        let inputs = ["100", "0.000001", "7", "12345.678901"];

        for price in prices {
            for fee in fees {
                for input in inputs {
                    let opened = calc()
                        .compute(TradeDirection::Open, TypedField::Input, input, price, fee)
                        .unwrap();
                    let closed = calc()
                        .compute(
                            TradeDirection::Close,
                            TypedField::Input,
                            &opened.amount_out.to_string(),
                            price,
                            fee,
                        )
                        .unwrap();

                    let original = Decimal::from_str(input).unwrap();
                    assert!(
                        closed.amount_out <= original,
                        "{input} @ {price} fee {fee} came back as {}",
                        closed.amount_out
                    );
                    if !fee.is_zero() {
                        assert!(closed.amount_out < original);
                    }
                }
            }
        }
    }

    #[test]
    fn zero_fee_round_trip_is_exact_for_clean_prices() {
        let opened = calc()
            .compute(TradeDirection::Open, TypedField::Input, "100", "50", Decimal::ZERO)
            .unwrap();
        let closed = calc()
            .compute(
                TradeDirection::Close,
                TypedField::Input,
                &opened.amount_out.to_string(),
                "50",
                Decimal::ZERO,
            )
            .unwrap();
        assert_eq!(closed.amount_out, dec!(100));
    }

    #[test]
    fn rejects_bad_inputs() {
        let c = calc();
        assert!(matches!(
            c.compute(TradeDirection::Open, TypedField::Input, "abc", "50", dec!(0.01)),
            Err(AmountError::InvalidAmount(_))
        ));
        assert!(matches!(
            c.compute(TradeDirection::Open, TypedField::Input, "-1", "50", dec!(0.01)),
            Err(AmountError::InvalidAmount(_))
        ));
        assert!(matches!(
            c.compute(TradeDirection::Open, TypedField::Input, "1", "0", dec!(0.01)),
            Err(AmountError::InvalidPrice(_))
        ));
        assert!(matches!(
            c.compute(TradeDirection::Open, TypedField::Output, "1", "50", dec!(1)),
            Err(AmountError::InvalidFee(_))
        ));
    }

    #[test]
    fn blank_input_is_zero_amount() {
        let amounts = calc()
            .compute(TradeDirection::Open, TypedField::Input, "", "50", dec!(0.01))
            .unwrap();
        assert!(amounts.amount_in.is_zero());
        assert!(amounts.amount_out.is_zero());
    }

    #[test]
    fn classification_priority() {
        let zero = calc()
            .compute(TradeDirection::Open, TypedField::Input, "0", "50", dec!(0.01))
            .unwrap();
        let hundred = calc()
            .compute(TradeDirection::Open, TypedField::Input, "100", "50", dec!(0.01))
            .unwrap();

        assert_eq!(classify(&AccountContext::default(), &zero), PrimaryError::Account);
        // Zero amount wins over a balance that is also insufficient
        assert_eq!(classify(&connected(dec!(-1)), &zero), PrimaryError::Amount);
        assert_eq!(classify(&connected(dec!(99.99)), &hundred), PrimaryError::Balance);
        assert_eq!(classify(&connected(dec!(100)), &hundred), PrimaryError::Valid);
    }
}
