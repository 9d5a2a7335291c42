//! Whether a cart line may receive promotional credit.

use crate::cart::CartLine;
use crate::catalog::{CategoryRef, ProductMeta};
use crate::credit::PromotionalCredit;
use crate::money::Money;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;

/// Decide whether `line` may receive `credit`.
///
/// `cart_total` is the pre-credit sum of effective subtotals across the
/// whole cart. All of the following must hold:
///
/// 1. a credit is present and is neither used nor expired;
/// 2. `now` lies within `[start_date, end_date]`;
/// 3. `cart_total` reaches the credit's minimum qualifying total;
/// 4. unless the credit applies to all products, the product's category
///    (and sub-category, when the credit sets one) matches.
///
/// Missing product metadata or a currency mismatch makes the line
/// ineligible. This function never fails.
pub fn is_eligible(
    credit: Option<&PromotionalCredit>,
    line: &CartLine,
    product: Option<&ProductMeta>,
    cart_total: Money,
    now: DateTime<Utc>,
) -> bool {
    let Some(credit) = credit else {
        return false;
    };
    let Some(product) = product else {
        return false;
    };
    if !credit.is_active_at(now) {
        return false;
    }
    if line.unit_price.currency != credit.currency() {
        return false;
    }
    match cart_total.try_cmp(&credit.minimum_cart_total) {
        Some(Ordering::Greater | Ordering::Equal) => {}
        _ => return false,
    }
    credit.applies_to_all_products || matches_restriction(credit, product)
}

fn matches_restriction(credit: &PromotionalCredit, product: &ProductMeta) -> bool {
    // A restricted credit with no category names nothing it applies to.
    if !same(credit.category.as_ref(), product.category.as_ref()) {
        return false;
    }
    match &credit.sub_category {
        Some(required) => same(Some(required), product.sub_category.as_ref()),
        None => true,
    }
}

fn same(required: Option<&CategoryRef>, actual: Option<&CategoryRef>) -> bool {
    matches!((required, actual), (Some(r), Some(a)) if r.same_category(a))
}
