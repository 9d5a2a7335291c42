//! Greedy allocation of a promotional credit balance across cart lines.

use crate::cart::{Cart, LineKey};
use crate::catalog::Catalog;
use crate::credit::{is_eligible, PromotionalCredit};
use crate::money::Money;
use chrono::{DateTime, Utc};

/// Distribute `credit` across the lines of `cart`.
///
/// Recomputed from scratch on every call; the credit already on the input
/// lines is ignored. With the toggle off, no credit, an exhausted balance,
/// or a credit in another currency, every line gets zero. Otherwise lines are
/// visited by effective subtotal, largest first, ties broken by key; each
/// eligible line takes `min(remaining, subtotal)` until the balance runs out.
///
/// Guarantees: the sum of allocations never exceeds `credit.amount`, and no
/// line is allocated more than its effective subtotal.
pub fn allocate(
    cart: &Cart,
    credit: Option<&PromotionalCredit>,
    apply_credit: bool,
    catalog: &dyn Catalog,
    now: DateTime<Utc>,
) -> Cart {
    let mut allocated = cart.clone();
    allocated.clear_credit();

    if !apply_credit {
        return allocated;
    }
    let Some(credit) = credit.filter(|c| !c.is_exhausted()) else {
        return allocated;
    };
    if credit.currency() != cart.currency() {
        return allocated;
    }

    let cart_total = cart.subtotal();
    let mut remaining = credit.amount;

    for (key, subtotal) in allocation_order(cart) {
        if !remaining.is_positive() {
            break;
        }
        let Some(line) = allocated.get_mut(&key) else {
            continue;
        };
        let product = catalog.find_product(&key.product_id);
        if !is_eligible(Some(credit), line, product.as_ref(), cart_total, now) {
            continue;
        }
        let share = remaining.min_amount(&subtotal.floor_zero());
        line.credit_allocated = share;
        remaining = remaining.saturating_sub(&share);
    }

    allocated
}

/// Keys ordered by effective subtotal descending, then by key.
pub fn allocation_order(cart: &Cart) -> Vec<(LineKey, Money)> {
    let mut order: Vec<(LineKey, Money)> = cart
        .lines()
        .map(|line| (line.key.clone(), line.effective_subtotal()))
        .collect();
    order.sort_by(|(key_a, sub_a), (key_b, sub_b)| {
        sub_b
            .amount_cents
            .cmp(&sub_a.amount_cents)
            .then_with(|| key_a.cmp(key_b))
    });
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cart::{CartLine, LineDisplay, PriceSnapshot};
    use crate::catalog::{InMemoryCatalog, ProductMeta};
    use crate::ids::CategoryId;
    use crate::money::Currency;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 6, 15, 12, 0, 0).unwrap()
    }

    fn usd(cents: i64) -> Money {
        Money::new(cents, Currency::USD)
    }

    fn line(product: &str, quantity: u32, cents: i64) -> CartLine {
        CartLine::new(
            LineKey::product(product),
            quantity,
            PriceSnapshot::list(usd(cents)),
            LineDisplay::named(product),
        )
    }

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new()
            .with_product(ProductMeta::new("line1").with_category(CategoryId::new("shoes")))
            .with_product(ProductMeta::new("line2").with_category(CategoryId::new("hats")))
            .with_product(ProductMeta::new("line3").with_category(CategoryId::new("shoes")))
    }

    fn credit(cents: i64) -> PromotionalCredit {
        PromotionalCredit::unrestricted(usd(cents), now() - Duration::days(1))
    }

    fn credit_of(cart: &Cart, product: &str) -> i64 {
        cart.get(&LineKey::product(product))
            .map(|l| l.credit_allocated.amount_cents)
            .unwrap_or(-1)
    }

    #[test]
    fn test_reference_scenario() {
        // 100 of credit, minimum 50, lines of 80 and 40.
        let cart = Cart::from_lines(
            Currency::USD,
            vec![line("line1", 1, 8000), line("line2", 1, 4000)],
        );
        let credit = credit(10_000).with_minimum(usd(5000));

        let allocated = allocate(&cart, Some(&credit), true, &catalog(), now());

        assert_eq!(credit_of(&allocated, "line1"), 8000);
        assert_eq!(credit_of(&allocated, "line2"), 2000);
        assert_eq!(allocated.total(true).amount_cents, 2000);
    }

    #[test]
    fn test_toggle_off_zeroes_credit() {
        let mut cart = Cart::from_lines(Currency::USD, vec![line("line1", 1, 8000)]);
        if let Some(l) = cart.get_mut(&LineKey::product("line1")) {
            l.credit_allocated = usd(3000);
        }

        let allocated = allocate(&cart, Some(&credit(10_000)), false, &catalog(), now());
        assert!(allocated.lines().all(|l| l.credit_allocated.is_zero()));
    }

    #[test]
    fn test_no_or_exhausted_credit_zeroes() {
        let cart = Cart::from_lines(Currency::USD, vec![line("line1", 1, 8000)]);
        assert!(allocate(&cart, None, true, &catalog(), now())
            .credit_total()
            .is_zero());
        assert!(allocate(&cart, Some(&credit(0)), true, &catalog(), now())
            .credit_total()
            .is_zero());
    }

    #[test]
    fn test_cart_below_minimum_gets_nothing() {
        let cart = Cart::from_lines(Currency::USD, vec![line("line1", 1, 4000)]);
        let credit = credit(10_000).with_minimum(usd(5000));
        assert!(allocate(&cart, Some(&credit), true, &catalog(), now())
            .credit_total()
            .is_zero());
    }

    #[test]
    fn test_ineligible_lines_are_skipped_not_charged() {
        let cart = Cart::from_lines(
            Currency::USD,
            vec![
                line("line1", 1, 3000),
                line("line2", 1, 9000),
                line("line3", 1, 2000),
            ],
        );
        let shoes_only = credit(4000).for_category(CategoryId::new("shoes"));

        let allocated = allocate(&cart, Some(&shoes_only), true, &catalog(), now());

        assert_eq!(credit_of(&allocated, "line2"), 0);
        assert_eq!(credit_of(&allocated, "line1"), 3000);
        assert_eq!(credit_of(&allocated, "line3"), 1000);
    }

    #[test]
    fn test_unknown_product_gets_nothing() {
        let cart = Cart::from_lines(
            Currency::USD,
            vec![line("ghost", 1, 9000), line("line1", 1, 1000)],
        );
        let allocated = allocate(&cart, Some(&credit(5000)), true, &catalog(), now());
        assert_eq!(credit_of(&allocated, "ghost"), 0);
        assert_eq!(credit_of(&allocated, "line1"), 1000);
    }

    #[test]
    fn test_ties_broken_by_key() {
        let cart = Cart::from_lines(
            Currency::USD,
            vec![line("line3", 1, 5000), line("line1", 1, 5000)],
        );
        let allocated = allocate(&cart, Some(&credit(6000)), true, &catalog(), now());
        assert_eq!(credit_of(&allocated, "line1"), 5000);
        assert_eq!(credit_of(&allocated, "line3"), 1000);
    }

    #[test]
    fn test_allocation_bounds_and_determinism() {
        let cart = Cart::from_lines(
            Currency::USD,
            vec![
                line("line1", 3, 1999),
                line("line2", 2, 4550),
                line("line3", 7, 125),
            ],
        );
        for balance in [0, 1, 500, 6000, 9999, 14_000, 100_000] {
            let credit = credit(balance);
            let first = allocate(&cart, Some(&credit), true, &catalog(), now());
            let second = allocate(&cart, Some(&credit), true, &catalog(), now());
            assert_eq!(first, second);

            assert!(first.credit_total().amount_cents <= balance);
            for l in first.lines() {
                assert!(l.credit_allocated.amount_cents >= 0);
                assert!(l.credit_allocated.amount_cents <= l.effective_subtotal().amount_cents);
            }
        }
    }

    #[test]
    fn test_currency_mismatch_allocates_nothing() {
        let cart = Cart::from_lines(Currency::USD, vec![line("line1", 1, 8000)]);
        let euros =
            PromotionalCredit::unrestricted(Money::new(5000, Currency::EUR), now() - Duration::days(1));
        assert!(allocate(&cart, Some(&euros), true, &catalog(), now())
            .credit_total()
            .is_zero());
    }
}
