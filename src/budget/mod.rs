//! Monthly spending limits per category.

mod core;
mod endpoints;

pub use core::{count_budgets, create_budget_table, find_budget_for_period};
pub use endpoints::{
    create_budget_endpoint, delete_budget_endpoint, get_budget_endpoint, list_budgets_endpoint,
    update_budget_endpoint,
};

#[cfg(test)]
pub use core::{NewBudget, create_budget};
