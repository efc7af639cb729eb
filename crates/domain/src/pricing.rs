//! Shipping fee and discount policy applied at checkout.

use common::{Money, UserId};

/// Fees and reductions added on top of an order's subtotal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Charges {
    pub shipping_fee: Money,
    pub discount: Money,
}

impl Charges {
    pub fn new(shipping_fee: Money, discount: Money) -> Self {
        Self {
            shipping_fee,
            discount,
        }
    }

    /// Total payable for `subtotal`. The discount never drives it below zero.
    ///
    /// `None` if the total does not fit in a money amount.
    pub fn total_for(&self, subtotal: Money) -> Option<Money> {
        subtotal
            .checked_add(self.shipping_fee)?
            .checked_sub(self.effective_discount(subtotal))
    }

    /// Discount actually applied to `subtotal`.
    pub fn effective_discount(&self, subtotal: Money) -> Money {
        let ceiling = subtotal + self.shipping_fee;
        if self.discount.is_negative() {
            Money::zero()
        } else {
            self.discount.min(ceiling)
        }
    }
}

/// Decides the shipping fee and discount for a checkout.
pub trait PricingPolicy: Send + Sync + 'static {
    fn charges(&self, user_id: Option<UserId>, subtotal: Money) -> Charges;
}

/// A flat shipping fee, waived at or above a subtotal threshold. No discount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlatRatePricing {
    pub shipping_fee: Money,
    /// `None` disables free shipping.
    pub free_shipping_threshold: Option<Money>,
}

impl FlatRatePricing {
    pub fn new(shipping_fee: Money, free_shipping_threshold: Option<Money>) -> Self {
        Self {
            shipping_fee,
            free_shipping_threshold,
        }
    }

    /// No fees at all.
    pub fn free() -> Self {
        Self::new(Money::zero(), None)
    }
}

impl Default for FlatRatePricing {
    fn default() -> Self {
        Self::new(Money::from_cents(3_000), Some(Money::from_cents(50_000)))
    }
}

impl PricingPolicy for FlatRatePricing {
    fn charges(&self, _user_id: Option<UserId>, subtotal: Money) -> Charges {
        let shipping_fee = match self.free_shipping_threshold {
            Some(threshold) if subtotal >= threshold => Money::zero(),
            _ => self.shipping_fee,
        };
        Charges::new(shipping_fee, Money::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_fee_below_threshold() {
        let pricing = FlatRatePricing::new(Money::from_cents(500), Some(Money::from_cents(10_000)));
        let charges = pricing.charges(None, Money::from_cents(2_500));
        assert_eq!(charges.shipping_fee, Money::from_cents(500));
        assert_eq!(charges.discount, Money::zero());
        assert_eq!(
            charges.total_for(Money::from_cents(2_500)),
            Some(Money::from_cents(3_000))
        );
    }

    #[test]
    fn test_free_shipping_at_threshold() {
        let pricing = FlatRatePricing::new(Money::from_cents(500), Some(Money::from_cents(10_000)));
        let charges = pricing.charges(None, Money::from_cents(10_000));
        assert_eq!(charges.shipping_fee, Money::zero());
    }

    #[test]
    fn test_no_threshold_always_charges() {
        let pricing = FlatRatePricing::new(Money::from_cents(500), None);
        let charges = pricing.charges(None, Money::from_cents(1_000_000));
        assert_eq!(charges.shipping_fee, Money::from_cents(500));
    }

    #[test]
    fn test_discount_is_clamped() {
        let charges = Charges::new(Money::from_cents(100), Money::from_cents(10_000));
        let subtotal = Money::from_cents(250);
        assert_eq!(charges.effective_discount(subtotal), Money::from_cents(350));
        assert_eq!(charges.total_for(subtotal), Some(Money::zero()));
    }

    #[test]
    fn test_negative_discount_is_ignored() {
        let charges = Charges::new(Money::zero(), Money::from_cents(-50));
        assert_eq!(
            charges.total_for(Money::from_cents(250)),
            Some(Money::from_cents(250))
        );
    }
}
