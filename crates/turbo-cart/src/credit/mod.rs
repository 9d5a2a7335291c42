//! Promotional credit: descriptor, eligibility, and allocation.

mod allocator;
mod eligibility;
mod promotional;

pub use allocator::{allocate, allocation_order};
pub use eligibility::is_eligible;
pub use promotional::PromotionalCredit;
