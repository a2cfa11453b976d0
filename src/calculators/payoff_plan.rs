//! Multi-debt payoff planning
//!
//! Simulates a fixed monthly budget across several debts under an ordering
//! strategy: minimums to every active debt, surplus to the current priority,
//! and cleared debts roll their minimums back into the surplus.

use crate::error::{CoachError, Result};
use serde::{Deserialize, Serialize};

/// Months simulated before giving up on a budget that never clears the
/// debts. Hitting the cap is reported, not treated as an error.
const MAX_PLAN_MONTHS: u32 = 600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PayoffStrategy {
    /// Highest interest rate first; minimizes total interest.
    Avalanche,
    /// Smallest balance first; fastest first win.
    Snowball,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DebtInput {
    pub name: String,
    pub balance: f64,
    pub annual_rate: f64,
    pub min_payment: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PayoffPlanArgs {
    pub debts: Vec<DebtInput>,
    pub monthly_budget: f64,
    pub strategy: PayoffStrategy,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtOutcome {
    pub name: String,
    /// Month (1-based) in which the balance reached zero, if it did.
    pub cleared_in_month: Option<u32>,
    pub interest_paid: f64,
    pub remaining_balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct PayoffPlan {
    pub strategy: PayoffStrategy,
    pub months: u32,
    pub total_interest: f64,
    pub total_paid: f64,
    /// False when the simulation stopped at the cap with balances left.
    pub debt_free: bool,
    pub debts: Vec<DebtOutcome>,
}

struct DebtState {
    balance: f64,
    annual_rate: f64,
    min_payment: f64,
    interest_paid: f64,
    cleared_in_month: Option<u32>,
}

impl DebtState {
    fn active(&self) -> bool {
        self.balance > 0.0
    }
}

/// Runs the month-by-month simulation. Ties in the ordering keep the
/// caller's debt order.
pub fn simulate(args: &PayoffPlanArgs) -> Result<PayoffPlan> {
    if args.debts.is_empty() {
        return Err(CoachError::Validation(
            "at least one debt is required".to_string(),
        ));
    }
    if !args.monthly_budget.is_finite() || args.monthly_budget <= 0.0 {
        return Err(CoachError::Validation(
            "monthly_budget must be a positive number".to_string(),
        ));
    }
    let mut min_total = 0.0;
    for debt in &args.debts {
        if !debt.balance.is_finite() || debt.balance <= 0.0 {
            return Err(CoachError::Validation(format!(
                "debt '{}' must have a positive balance",
                debt.name
            )));
        }
        if !debt.annual_rate.is_finite() || debt.annual_rate < 0.0 {
            return Err(CoachError::Validation(format!(
                "debt '{}' must have a non-negative rate",
                debt.name
            )));
        }
        if !debt.min_payment.is_finite() || debt.min_payment < 0.0 {
            return Err(CoachError::Validation(format!(
                "debt '{}' must have a non-negative minimum payment",
                debt.name
            )));
        }
        min_total += debt.min_payment;
    }
    if args.monthly_budget < min_total {
        return Err(CoachError::Validation(format!(
            "monthly budget {:.2} does not cover the {:.2} in minimum payments",
            args.monthly_budget, min_total
        )));
    }

    let mut states: Vec<DebtState> = args
        .debts
        .iter()
        .map(|d| DebtState {
            balance: d.balance,
            annual_rate: d.annual_rate,
            min_payment: d.min_payment,
            interest_paid: 0.0,
            cleared_in_month: None,
        })
        .collect();

    let mut months = 0u32;
    let mut total_interest = 0.0;
    let mut total_paid = 0.0;

    while states.iter().any(DebtState::active) && months < MAX_PLAN_MONTHS {
        months += 1;

        // Interest accrues on every open balance before any payment lands.
        for state in states.iter_mut().filter(|s| s.active()) {
            let interest = state.balance * state.annual_rate / 12.0;
            state.balance += interest;
            state.interest_paid += interest;
            total_interest += interest;
        }

        // Minimums first; whatever each debt does not need stays in the pot.
        let mut remaining = args.monthly_budget;
        for state in states.iter_mut().filter(|s| s.active()) {
            let payment = state.min_payment.min(state.balance).min(remaining);
            state.balance -= payment;
            remaining -= payment;
            total_paid += payment;
        }

        // Surplus walks the priority order, spilling over as debts clear.
        for index in priority_order(&states, args.strategy) {
            if remaining <= 0.0 {
                break;
            }
            let state = &mut states[index];
            if !state.active() {
                continue;
            }
            let payment = state.balance.min(remaining);
            state.balance -= payment;
            remaining -= payment;
            total_paid += payment;
        }

        for state in states.iter_mut() {
            if !state.active() && state.cleared_in_month.is_none() {
                state.cleared_in_month = Some(months);
            }
        }
    }

    let debt_free = states.iter().all(|s| !s.active());
    let debts = args
        .debts
        .iter()
        .zip(states.iter())
        .map(|(input, state)| DebtOutcome {
            name: input.name.clone(),
            cleared_in_month: state.cleared_in_month,
            interest_paid: state.interest_paid,
            remaining_balance: state.balance.max(0.0),
        })
        .collect();

    Ok(PayoffPlan {
        strategy: args.strategy,
        months,
        total_interest,
        total_paid,
        debt_free,
        debts,
    })
}

fn priority_order(states: &[DebtState], strategy: PayoffStrategy) -> Vec<usize> {
    let mut order: Vec<usize> = (0..states.len()).filter(|&i| states[i].active()).collect();
    match strategy {
        PayoffStrategy::Avalanche => {
            order.sort_by(|&a, &b| {
                states[b]
                    .annual_rate
                    .partial_cmp(&states[a].annual_rate)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
        PayoffStrategy::Snowball => {
            order.sort_by(|&a, &b| {
                states[a]
                    .balance
                    .partial_cmp(&states[b].balance)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_card_args(strategy: PayoffStrategy) -> PayoffPlanArgs {
        PayoffPlanArgs {
            debts: vec![
                DebtInput {
                    name: "visa".to_string(),
                    balance: 5000.0,
                    annual_rate: 0.22,
                    min_payment: 100.0,
                },
                DebtInput {
                    name: "car loan".to_string(),
                    balance: 3000.0,
                    annual_rate: 0.05,
                    min_payment: 50.0,
                },
            ],
            monthly_budget: 400.0,
            strategy,
        }
    }

    #[test]
    fn test_avalanche_never_pays_more_interest_than_snowball() {
        let avalanche = simulate(&two_card_args(PayoffStrategy::Avalanche)).unwrap();
        let snowball = simulate(&two_card_args(PayoffStrategy::Snowball)).unwrap();

        assert!(avalanche.debt_free);
        assert!(snowball.debt_free);
        assert!(avalanche.total_interest <= snowball.total_interest);
    }

    #[test]
    fn test_snowball_clears_smallest_balance_first() {
        let plan = simulate(&two_card_args(PayoffStrategy::Snowball)).unwrap();
        let visa = plan.debts.iter().find(|d| d.name == "visa").unwrap();
        let car = plan.debts.iter().find(|d| d.name == "car loan").unwrap();
        assert!(car.cleared_in_month.unwrap() <= visa.cleared_in_month.unwrap());
    }

    #[test]
    fn test_single_debt_matches_direct_payoff() {
        let plan = simulate(&PayoffPlanArgs {
            debts: vec![DebtInput {
                name: "loan".to_string(),
                balance: 10_000.0,
                annual_rate: 0.18,
                min_payment: 500.0,
            }],
            monthly_budget: 500.0,
            strategy: PayoffStrategy::Avalanche,
        })
        .unwrap();

        let direct = crate::calculators::debt_payoff(&crate::calculators::DebtPayoffArgs {
            principal: 10_000.0,
            annual_rate: 0.18,
            monthly_payment: 500.0,
        })
        .unwrap();

        assert_eq!(plan.months, direct.months);
        assert!((plan.total_interest - direct.total_interest).abs() < 0.01);
    }

    #[test]
    fn test_budget_below_minimums_rejected() {
        let mut args = two_card_args(PayoffStrategy::Avalanche);
        args.monthly_budget = 100.0;
        assert!(matches!(
            simulate(&args),
            Err(CoachError::Validation(_))
        ));
    }

    #[test]
    fn test_cap_reports_instead_of_erroring() {
        // Budget equals the minimum but interest outruns it; the plan stops
        // at the cap and says so.
        let plan = simulate(&PayoffPlanArgs {
            debts: vec![DebtInput {
                name: "runaway".to_string(),
                balance: 100_000.0,
                annual_rate: 0.30,
                min_payment: 10.0,
            }],
            monthly_budget: 10.0,
            strategy: PayoffStrategy::Avalanche,
        })
        .unwrap();

        assert_eq!(plan.months, 600);
        assert!(!plan.debt_free);
        assert!(plan.debts[0].remaining_balance > 100_000.0);
    }

    #[test]
    fn test_freed_minimum_rolls_into_surplus() {
        // After the small debt clears, its minimum joins the surplus, so the
        // big debt finishes sooner than paying 350/month alone would.
        let plan = simulate(&two_card_args(PayoffStrategy::Snowball)).unwrap();

        let alone = crate::calculators::debt_payoff(&crate::calculators::DebtPayoffArgs {
            principal: 5000.0,
            annual_rate: 0.22,
            monthly_payment: 350.0,
        })
        .unwrap();

        assert!(plan.months <= alone.months + 12);
        assert!(plan.debt_free);
    }
}
