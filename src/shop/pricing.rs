//! Money arithmetic for carts and orders.
//!
//! Pure functions - no database access.

use rust_decimal::prelude::*;
use rust_decimal::Decimal;

use crate::models::Product;

/// Round to specified decimal places using banker's rounding (ROUND_HALF_EVEN).
///
/// # Examples
/// ```
/// use rust_decimal_macros::dec;
/// use courseshop_web::shop::pricing::round_money;
///
/// assert_eq!(round_money(dec!(2.5), 0), dec!(2));   // rounds to even
/// assert_eq!(round_money(dec!(3.5), 0), dec!(4));   // rounds to even
/// assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
/// ```
pub fn round_money(amount: Decimal, places: u32) -> Decimal {
    amount.round_dp_with_strategy(places, RoundingStrategy::MidpointNearestEven)
}

/// Sum of the current prices of the given products, two decimal places.
///
/// Each distinct product counts once: cart lines carry no quantity.
pub fn cart_total(products: &[Product]) -> Decimal {
    let total: Decimal = products.iter().map(|p| p.price).sum();
    round_money(total, 2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(id: i64, price: Decimal) -> Product {
        Product {
            id,
            name: format!("Course {}", id),
            slug: format!("course-{}", id),
            description: String::new(),
            price,
            in_sale: true,
            image: None,
        }
    }

    #[test]
    fn test_round_money_bankers_rounding_to_even() {
        assert_eq!(round_money(dec!(2.5), 0), dec!(2));
        assert_eq!(round_money(dec!(3.5), 0), dec!(4));
        assert_eq!(round_money(dec!(2.25), 1), dec!(2.2));
        assert_eq!(round_money(dec!(2.35), 1), dec!(2.4));
    }

    #[test]
    fn test_round_money_normal_rounding() {
        assert_eq!(round_money(dec!(1.234), 2), dec!(1.23));
        assert_eq!(round_money(dec!(1.236), 2), dec!(1.24));
        assert_eq!(round_money(dec!(999999.995), 2), dec!(1000000.00));
    }

    #[test]
    fn test_cart_total_sums_prices() {
        let products = vec![product(1, dec!(10.00)), product(2, dec!(15.00))];
        assert_eq!(cart_total(&products), dec!(25.00));
    }

    #[test]
    fn test_cart_total_empty_is_zero() {
        assert_eq!(cart_total(&[]), dec!(0));
    }

    #[test]
    fn test_cart_total_keeps_cents() {
        let products = vec![product(1, dec!(0.10)), product(2, dec!(0.20))];
        assert_eq!(cart_total(&products), dec!(0.30));
    }
}
