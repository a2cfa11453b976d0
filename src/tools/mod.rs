//! Tool trait and registry
//!
//! Tools are deterministic, side-effect-free wrappers over the calculator
//! library, plus the JSON Schemas providers need to call them. Argument
//! parsing failures surface as tool errors so the loop can feed them back
//! to the model instead of aborting.

use crate::calculators::{
    self, CompoundInterestArgs, DebtPayoffArgs, FutureValueArgs, LoanPaymentArgs,
    MonthlyPaymentArgs, TimeToGoalArgs,
};
use crate::error::{CoachError, Result};
use crate::providers::ToolSpec;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// Trait for a single tool (deterministic execution)
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// JSON Schema for the arguments object.
    fn parameters(&self) -> Value;
    async fn execute(&self, arguments: &Value) -> Result<Value>;
}

/// Tool registry for looking up and executing tools
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub fn list(&self) -> Vec<&str> {
        self.tools.keys().map(|s| s.as_str()).collect()
    }

    /// Provider-neutral declarations for every registered tool.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .values()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_args<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| CoachError::ToolExecution(format!("invalid arguments for {}: {}", tool, e)))
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn number_property(description: &str) -> Value {
    json!({ "type": "number", "description": description })
}

pub struct FutureValueTool;

#[async_trait::async_trait]
impl Tool for FutureValueTool {
    fn name(&self) -> &'static str {
        "future_value"
    }

    fn description(&self) -> &'static str {
        "Project savings growth from a starting balance, a fixed monthly deposit, and an annual rate"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "current_savings": number_property("Starting balance in dollars"),
                "monthly_deposit": number_property("Deposit added at the end of each month"),
                "annual_rate": number_property("Annual growth rate as a fraction, e.g. 0.05"),
                "years": number_property("Projection horizon in years"),
            },
            "required": ["current_savings", "monthly_deposit", "annual_rate", "years"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: FutureValueArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::future_value(&args)?;
        Ok(json!({
            "future_value": round2(outcome.future_value),
            "total_contributed": round2(outcome.total_contributed),
            "growth": round2(outcome.growth),
        }))
    }
}

pub struct MonthlyPaymentTool;

#[async_trait::async_trait]
impl Tool for MonthlyPaymentTool {
    fn name(&self) -> &'static str {
        "monthly_payment"
    }

    fn description(&self) -> &'static str {
        "Monthly deposit needed to reach a savings target by a deadline, accounting for growth of existing savings"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_amount": number_property("Savings goal in dollars"),
                "years": number_property("Years until the deadline"),
                "annual_rate": number_property("Annual growth rate as a fraction"),
                "current_savings": number_property("Already-saved balance; defaults to 0"),
            },
            "required": ["target_amount", "years", "annual_rate"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: MonthlyPaymentArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::monthly_payment(&args)?;
        Ok(json!({
            "monthly_payment": round2(outcome.monthly_payment),
            "months": outcome.months,
        }))
    }
}

pub struct TimeToGoalTool;

#[async_trait::async_trait]
impl Tool for TimeToGoalTool {
    fn name(&self) -> &'static str {
        "time_to_goal"
    }

    fn description(&self) -> &'static str {
        "Months until a savings target is reached at the current deposit pace, or unreachable if nothing is being saved"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "target_amount": number_property("Savings goal in dollars"),
                "current_savings": number_property("Already-saved balance; defaults to 0"),
                "monthly_deposit": number_property("Deposit added each month"),
                "annual_rate": number_property("Annual growth rate as a fraction"),
            },
            "required": ["target_amount", "monthly_deposit", "annual_rate"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: TimeToGoalArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::time_to_goal(&args)?;
        Ok(serde_json::to_value(outcome)?)
    }
}

pub struct DebtPayoffTool;

#[async_trait::async_trait]
impl Tool for DebtPayoffTool {
    fn name(&self) -> &'static str {
        "debt_payoff"
    }

    fn description(&self) -> &'static str {
        "Months and total interest to clear a single debt at a fixed monthly payment"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": number_property("Current balance in dollars"),
                "annual_rate": number_property("APR as a fraction, e.g. 0.22"),
                "monthly_payment": number_property("Fixed payment per month"),
            },
            "required": ["principal", "annual_rate", "monthly_payment"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: DebtPayoffArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::debt_payoff(&args)?;
        Ok(json!({
            "months": outcome.months,
            "total_interest": round2(outcome.total_interest),
            "total_paid": round2(outcome.total_paid),
        }))
    }
}

pub struct LoanPaymentTool;

#[async_trait::async_trait]
impl Tool for LoanPaymentTool {
    fn name(&self) -> &'static str {
        "loan_payment"
    }

    fn description(&self) -> &'static str {
        "Standard amortized monthly payment for a loan of a given principal, rate, and term"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": number_property("Loan amount in dollars"),
                "annual_rate": number_property("APR as a fraction, e.g. 0.06"),
                "years": number_property("Loan term in years"),
            },
            "required": ["principal", "annual_rate", "years"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: LoanPaymentArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::loan_payment(&args)?;
        Ok(json!({
            "monthly_payment": round2(outcome.monthly_payment),
            "total_paid": round2(outcome.total_paid),
            "total_interest": round2(outcome.total_interest),
        }))
    }
}

pub struct CompoundInterestTool;

#[async_trait::async_trait]
impl Tool for CompoundInterestTool {
    fn name(&self) -> &'static str {
        "compound_interest"
    }

    fn description(&self) -> &'static str {
        "Growth of a lump sum at a fixed rate with a chosen compounding frequency, no recurring deposits"
    }

    fn parameters(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "principal": number_property("Starting amount in dollars"),
                "annual_rate": number_property("Annual rate as a fraction"),
                "years": number_property("Years invested"),
                "compounds_per_year": number_property("Compounding periods per year; defaults to 12"),
            },
            "required": ["principal", "annual_rate", "years"]
        })
    }

    async fn execute(&self, arguments: &Value) -> Result<Value> {
        let args: CompoundInterestArgs = parse_args(self.name(), arguments)?;
        let outcome = calculators::compound_interest(&args)?;
        Ok(json!({
            "final_amount": round2(outcome.final_amount),
            "interest_earned": round2(outcome.interest_earned),
        }))
    }
}

/// Registry with the six calculator tools providers may call. The
/// multi-debt payoff planner stays a library API and is deliberately not
/// registered.
pub fn create_default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(FutureValueTool));
    registry.register(Arc::new(MonthlyPaymentTool));
    registry.register(Arc::new(TimeToGoalTool));
    registry.register(Arc::new(DebtPayoffTool));
    registry.register(Arc::new(LoanPaymentTool));
    registry.register(Arc::new(CompoundInterestTool));
    registry
}
