//! Deterministic financial calculators
//!
//! Pure arithmetic over caller-supplied numbers; no I/O, no model calls.
//! The tool layer wraps these for providers, and the payoff planner in
//! [`payoff_plan`] builds on the same conventions.

pub mod payoff_plan;

use crate::error::{CoachError, Result};
use serde::{Deserialize, Serialize};

const MONTHS_PER_YEAR: f64 = 12.0;

/// Longest timeline any calculator will report. Realistic plans finish
/// far below this; needing more months means the inputs were degenerate.
const MAX_TIMELINE_MONTHS: u32 = 1200;

fn ensure_non_negative(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(CoachError::Validation(format!(
            "{} must be a non-negative number",
            name
        )))
    }
}

fn ensure_positive(name: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(CoachError::Validation(format!(
            "{} must be a positive number",
            name
        )))
    }
}

fn months_within_timeline(months: f64) -> Result<u32> {
    if months.is_finite() && months <= f64::from(MAX_TIMELINE_MONTHS) {
        Ok(months as u32)
    } else {
        Err(CoachError::Validation(format!(
            "plan needs {:.0} months, past the {}-month limit",
            months, MAX_TIMELINE_MONTHS
        )))
    }
}

//
// ================= Future Value =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct FutureValueArgs {
    pub current_savings: f64,
    pub monthly_deposit: f64,
    /// Annual rate as a fraction, e.g. 0.05 for 5%.
    pub annual_rate: f64,
    pub years: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct FutureValueOutcome {
    pub future_value: f64,
    pub total_contributed: f64,
    pub growth: f64,
}

/// Projects savings forward: the current balance compounds monthly while a
/// fixed deposit lands at the end of each month.
pub fn future_value(args: &FutureValueArgs) -> Result<FutureValueOutcome> {
    ensure_non_negative("current_savings", args.current_savings)?;
    ensure_non_negative("monthly_deposit", args.monthly_deposit)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    ensure_positive("years", args.years)?;

    let n = args.years * MONTHS_PER_YEAR;
    let r = args.annual_rate / MONTHS_PER_YEAR;

    let fv = if r == 0.0 {
        args.current_savings + args.monthly_deposit * n
    } else {
        let factor = (1.0 + r).powf(n);
        args.current_savings * factor + args.monthly_deposit * ((factor - 1.0) / r)
    };

    let total_contributed = args.current_savings + args.monthly_deposit * n;
    Ok(FutureValueOutcome {
        future_value: fv,
        total_contributed,
        growth: fv - total_contributed,
    })
}

//
// ================= Monthly Payment =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct MonthlyPaymentArgs {
    pub target_amount: f64,
    pub years: f64,
    pub annual_rate: f64,
    #[serde(default)]
    pub current_savings: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyPaymentOutcome {
    pub monthly_payment: f64,
    pub months: u32,
}

/// The deposit needed each month to hit a target. Exact inverse of
/// [`future_value`]: existing savings grow at the same rate, so feeding the
/// result back through the projection reproduces the target.
pub fn monthly_payment(args: &MonthlyPaymentArgs) -> Result<MonthlyPaymentOutcome> {
    ensure_positive("target_amount", args.target_amount)?;
    ensure_positive("years", args.years)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    ensure_non_negative("current_savings", args.current_savings)?;

    let n = args.years * MONTHS_PER_YEAR;
    let r = args.annual_rate / MONTHS_PER_YEAR;

    let payment = if r == 0.0 {
        (args.target_amount - args.current_savings) / n
    } else {
        let factor = (1.0 + r).powf(n);
        (args.target_amount - args.current_savings * factor) * r / (factor - 1.0)
    };

    Ok(MonthlyPaymentOutcome {
        // Savings already outgrowing the target means nothing more to deposit.
        monthly_payment: payment.max(0.0),
        months: months_within_timeline(n.round())?,
    })
}

//
// ================= Time To Goal =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct TimeToGoalArgs {
    pub target_amount: f64,
    #[serde(default)]
    pub current_savings: f64,
    pub monthly_deposit: f64,
    pub annual_rate: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GoalTimeline {
    Reachable { months: u32 },
    Unreachable,
}

/// Months until the balance first reaches the target, or `Unreachable` when
/// nothing is being deposited and the goal is still ahead.
pub fn time_to_goal(args: &TimeToGoalArgs) -> Result<GoalTimeline> {
    ensure_positive("target_amount", args.target_amount)?;
    ensure_non_negative("current_savings", args.current_savings)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    if !args.monthly_deposit.is_finite() {
        return Err(CoachError::Validation(
            "monthly_deposit must be a number".to_string(),
        ));
    }

    if args.current_savings >= args.target_amount {
        return Ok(GoalTimeline::Reachable { months: 0 });
    }
    if args.monthly_deposit <= 0.0 {
        return Ok(GoalTimeline::Unreachable);
    }

    let r = args.annual_rate / MONTHS_PER_YEAR;
    let months = if r == 0.0 {
        ((args.target_amount - args.current_savings) / args.monthly_deposit).ceil()
    } else {
        let pmt_over_r = args.monthly_deposit / r;
        let numerator = ((args.target_amount + pmt_over_r) / (args.current_savings + pmt_over_r)).ln();
        (numerator / (1.0 + r).ln()).ceil()
    };

    Ok(GoalTimeline::Reachable {
        months: months_within_timeline(months)?,
    })
}

//
// ================= Debt Payoff =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct DebtPayoffArgs {
    pub principal: f64,
    pub annual_rate: f64,
    pub monthly_payment: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DebtPayoffOutcome {
    pub months: u32,
    pub total_interest: f64,
    pub total_paid: f64,
}

/// Walks the balance month by month until it clears. Payments that do not
/// cover the first month's interest are rejected up front, since the
/// balance would only grow.
pub fn debt_payoff(args: &DebtPayoffArgs) -> Result<DebtPayoffOutcome> {
    ensure_positive("principal", args.principal)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    ensure_positive("monthly_payment", args.monthly_payment)?;

    let r = args.annual_rate / MONTHS_PER_YEAR;
    if args.monthly_payment <= args.principal * r {
        return Err(CoachError::Validation(format!(
            "monthly payment {:.2} does not cover interest on the balance; \
             it must exceed {:.2}",
            args.monthly_payment,
            args.principal * r
        )));
    }

    let mut balance = args.principal;
    let mut months = 0u32;
    let mut total_interest = 0.0;
    let mut total_paid = 0.0;

    while balance > 0.0 {
        if months >= MAX_TIMELINE_MONTHS {
            return Err(CoachError::Validation(
                "monthly payment is too small to retire this balance".to_string(),
            ));
        }
        let interest = balance * r;
        total_interest += interest;
        let due = balance + interest;
        // Final month pays only what is left.
        let payment = args.monthly_payment.min(due);
        total_paid += payment;
        balance = due - payment;
        months += 1;
    }

    Ok(DebtPayoffOutcome {
        months,
        total_interest,
        total_paid,
    })
}

//
// ================= Loan Payment =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct LoanPaymentArgs {
    pub principal: f64,
    pub annual_rate: f64,
    pub years: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct LoanPaymentOutcome {
    pub monthly_payment: f64,
    pub total_paid: f64,
    pub total_interest: f64,
}

/// Standard amortized loan payment over a fixed term.
pub fn loan_payment(args: &LoanPaymentArgs) -> Result<LoanPaymentOutcome> {
    ensure_positive("principal", args.principal)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    ensure_positive("years", args.years)?;

    let n = args.years * MONTHS_PER_YEAR;
    let r = args.annual_rate / MONTHS_PER_YEAR;

    let payment = if r == 0.0 {
        args.principal / n
    } else {
        args.principal * r / (1.0 - (1.0 + r).powf(-n))
    };

    let total_paid = payment * n;
    Ok(LoanPaymentOutcome {
        monthly_payment: payment,
        total_paid,
        total_interest: total_paid - args.principal,
    })
}

//
// ================= Compound Interest =================
//

#[derive(Debug, Clone, Deserialize)]
pub struct CompoundInterestArgs {
    pub principal: f64,
    pub annual_rate: f64,
    pub years: f64,
    /// Compounding periods per year; monthly when omitted.
    #[serde(default = "default_compounds_per_year")]
    pub compounds_per_year: f64,
}

fn default_compounds_per_year() -> f64 {
    MONTHS_PER_YEAR
}

#[derive(Debug, Clone, Serialize)]
pub struct CompoundInterestOutcome {
    pub final_amount: f64,
    pub interest_earned: f64,
}

/// Lump-sum growth at a fixed rate with a caller-chosen compounding
/// frequency. No recurring deposits; that is [`future_value`]'s job.
pub fn compound_interest(args: &CompoundInterestArgs) -> Result<CompoundInterestOutcome> {
    ensure_positive("principal", args.principal)?;
    ensure_non_negative("annual_rate", args.annual_rate)?;
    ensure_positive("years", args.years)?;
    ensure_positive("compounds_per_year", args.compounds_per_year)?;

    let amount = args.principal
        * (1.0 + args.annual_rate / args.compounds_per_year)
            .powf(args.compounds_per_year * args.years);

    Ok(CompoundInterestOutcome {
        final_amount: amount,
        interest_earned: amount - args.principal,
    })
}
