//! Progressive tax brackets.
//!
//! Brackets are data: one stepwise-marginal function walks any validated
//! table, and the corporate and personal regimes differ only in their tables.

use std::fmt;
use std::path::Path;

use anyhow::Context;
use log::{debug, warn};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{BracketConfigurationError, Result, ValidationError};

/// Tax regime, selecting which bracket table applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaxType {
    Corporate,
    Personal,
}

impl fmt::Display for TaxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaxType::Corporate => f.write_str("corporate"),
            TaxType::Personal => f.write_str("personal"),
        }
    }
}

/// A single bracket of a progressive table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxBracket {
    /// Inclusive upper bound of the bracket. `None` for an open top bracket.
    /// The last bracket of a table extends past its bound either way.
    pub upper_bound: Option<Decimal>,
    /// Marginal rate as a fraction (e.g., 0.10 for 10%).
    pub rate: Decimal,
}

impl TaxBracket {
    pub fn new(upper_bound: Decimal, rate: Decimal) -> Self {
        TaxBracket {
            upper_bound: Some(upper_bound),
            rate,
        }
    }

    pub fn open(rate: Decimal) -> Self {
        TaxBracket {
            upper_bound: None,
            rate,
        }
    }
}

/// An ordered, validated list of brackets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<TaxBracket>", into = "Vec<TaxBracket>")]
pub struct BracketTable {
    brackets: Vec<TaxBracket>,
}

impl BracketTable {
    /// Builds a table after checking that bounds strictly increase, only the
    /// last bracket is open-ended and every rate lies within 0..=1.
    ///
    /// A finite bound on the last bracket is accepted; income above it is
    /// still taxed at the last bracket's rate.
    pub fn new(brackets: Vec<TaxBracket>) -> std::result::Result<Self, BracketConfigurationError> {
        if brackets.is_empty() {
            return Err(BracketConfigurationError::Empty);
        }

        let last = brackets.len() - 1;
        let mut previous = Decimal::ZERO;
        for (index, bracket) in brackets.iter().enumerate() {
            if bracket.rate < Decimal::ZERO || bracket.rate > Decimal::ONE {
                return Err(BracketConfigurationError::RateOutOfRange {
                    index,
                    rate: bracket.rate,
                });
            }
            match bracket.upper_bound {
                Some(bound) if bound <= Decimal::ZERO => {
                    return Err(BracketConfigurationError::NonPositiveBound { index, bound });
                }
                Some(bound) if index > 0 && bound <= previous => {
                    return Err(BracketConfigurationError::NonMonotonic {
                        index,
                        bound,
                        previous,
                    });
                }
                Some(bound) => previous = bound,
                None if index != last => {
                    return Err(BracketConfigurationError::OpenEndedNotLast { index });
                }
                None => {}
            }
        }

        Ok(BracketTable { brackets })
    }

    /// Brackets in ascending order.
    pub fn brackets(&self) -> &[TaxBracket] {
        &self.brackets
    }

    /// Built-in corporate table.
    pub fn corporate() -> Self {
        BracketTable {
            brackets: vec![
                TaxBracket::new(dec!(300000), dec!(0.15)),
                TaxBracket::new(dec!(3000000), dec!(0.20)),
                TaxBracket::open(dec!(0.20)),
            ],
        }
    }

    /// Built-in personal table, starting with a zero-rate band.
    pub fn personal() -> Self {
        BracketTable {
            brackets: vec![
                TaxBracket::new(dec!(150000), dec!(0)),
                TaxBracket::new(dec!(300000), dec!(0.05)),
                TaxBracket::new(dec!(500000), dec!(0.10)),
                TaxBracket::new(dec!(750000), dec!(0.15)),
                TaxBracket::new(dec!(1000000), dec!(0.20)),
                TaxBracket::new(dec!(2000000), dec!(0.25)),
                TaxBracket::open(dec!(0.30)),
            ],
        }
    }
}

impl TryFrom<Vec<TaxBracket>> for BracketTable {
    type Error = BracketConfigurationError;

    fn try_from(brackets: Vec<TaxBracket>) -> std::result::Result<Self, Self::Error> {
        BracketTable::new(brackets)
    }
}

impl From<BracketTable> for Vec<TaxBracket> {
    fn from(table: BracketTable) -> Self {
        table.brackets
    }
}

/// Bracket tables per regime.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxConfig {
    /// Table for `TaxType::Corporate`.
    pub corporate: BracketTable,
    /// Table for `TaxType::Personal`.
    pub personal: BracketTable,
}

impl Default for TaxConfig {
    fn default() -> Self {
        TaxConfig {
            corporate: BracketTable::corporate(),
            personal: BracketTable::personal(),
        }
    }
}

impl TaxConfig {
    pub fn table(&self, tax_type: TaxType) -> &BracketTable {
        match tax_type {
            TaxType::Corporate => &self.corporate,
            TaxType::Personal => &self.personal,
        }
    }

    /// Parses a JSON configuration. Both tables are validated while parsing.
    pub fn from_json_str(json: &str) -> anyhow::Result<Self> {
        serde_json::from_str(json).context("Invalid tax configuration")
    }

    /// Reads a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tax configuration {}", path.display()))?;
        Self::from_json_str(&contents).inspect_err(|e| {
            warn!("Rejected tax configuration {}: {:#}", path.display(), e);
        })
    }
}

/// Inputs for one period's calculation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxInput {
    /// Label of the reporting period (e.g., "2024-Q4").
    pub period: String,
    /// Regime whose bracket table applies.
    pub tax_type: TaxType,
    /// Gross revenue for the period. Must not be negative.
    pub revenue: Decimal,
    /// Deductible operating expenses. Must not be negative.
    pub expenses: Decimal,
    /// Further allowed deductions. Must not be negative.
    pub deductions: Decimal,
}

/// Tax owed on the part of income inside one bracket.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketSlice {
    /// Income already covered by lower brackets.
    pub lower_bound: Decimal,
    /// Upper bound of the bracket, `None` for the top bracket.
    pub upper_bound: Option<Decimal>,
    /// Marginal rate as a fraction.
    pub rate: Decimal,
    /// Income falling inside this bracket.
    pub taxable: Decimal,
    /// `taxable * rate`.
    pub tax: Decimal,
}

/// Stepwise marginal tax on an income.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BracketResult {
    /// Sum of the tax of every slice.
    pub tax_amount: Decimal,
    /// Rate of the highest bracket reached.
    pub marginal_rate: Decimal,
    /// One entry per bracket reached, lowest first.
    pub slices: Vec<BracketSlice>,
}

/// Result of a tax calculation for one period. Not persisted by this crate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaxCalculation {
    /// Period label copied from the input.
    pub period: String,
    /// Regime used.
    pub tax_type: TaxType,
    /// Gross revenue from the input.
    pub revenue: Decimal,
    /// Expenses from the input.
    pub expenses: Decimal,
    /// Deductions from the input.
    pub deductions: Decimal,
    /// May be negative; no tax is owed then.
    pub taxable_income: Decimal,
    /// Total tax owed, never negative.
    pub tax_amount: Decimal,
    /// Marginal rate of the top bracket reached.
    pub tax_rate: Decimal,
    /// `tax_amount / taxable_income`, or zero without positive income.
    pub effective_rate: Decimal,
    /// Per-bracket slices, for reports.
    pub breakdown: Vec<BracketSlice>,
}

/// Walks the table, taxing each bracket's slice of `income` at its rate.
pub fn apply_brackets(table: &BracketTable, income: Decimal) -> BracketResult {
    let mut result = BracketResult::default();
    if income <= Decimal::ZERO {
        return result;
    }

    let mut lower = Decimal::ZERO;
    let last = table.brackets().len() - 1;
    for (index, bracket) in table.brackets().iter().enumerate() {
        let upper_bound = if index == last {
            None
        } else {
            bracket.upper_bound
        };
        let top = match upper_bound {
            Some(bound) => income.min(bound),
            None => income,
        };
        let taxable = top - lower;
        let tax = taxable * bracket.rate;
        result.tax_amount += tax;
        result.marginal_rate = bracket.rate;
        result.slices.push(BracketSlice {
            lower_bound: lower,
            upper_bound,
            rate: bracket.rate,
            taxable,
            tax,
        });

        match upper_bound {
            Some(bound) if income > bound => lower = bound,
            _ => break,
        }
    }

    result
}

/// Calculator bound to a validated configuration.
#[derive(Debug, Clone, Default)]
pub struct TaxCalculator {
    config: TaxConfig,
}

impl TaxCalculator {
    pub fn new(config: TaxConfig) -> Self {
        TaxCalculator { config }
    }

    /// Computes taxable income and the tax owed on it.
    ///
    /// # Errors
    ///
    /// Returns `NegativeInput` if revenue, expenses or deductions are negative.
    pub fn calculate(&self, input: TaxInput) -> Result<TaxCalculation> {
        for (field, value) in [
            ("revenue", input.revenue),
            ("expenses", input.expenses),
            ("deductions", input.deductions),
        ] {
            if value < Decimal::ZERO {
                return Err(ValidationError::NegativeInput { field, value }.into());
            }
        }

        let taxable_income = input.revenue - input.expenses - input.deductions;
        let brackets = apply_brackets(self.config.table(input.tax_type), taxable_income);
        let effective_rate = if taxable_income > Decimal::ZERO {
            brackets.tax_amount / taxable_income
        } else {
            Decimal::ZERO
        };

        debug!(
            "{} tax for {}: taxable {}, tax {}, marginal {}",
            input.tax_type, input.period, taxable_income, brackets.tax_amount, brackets.marginal_rate
        );

        Ok(TaxCalculation {
            period: input.period,
            tax_type: input.tax_type,
            revenue: input.revenue,
            expenses: input.expenses,
            deductions: input.deductions,
            taxable_income,
            tax_amount: brackets.tax_amount,
            tax_rate: brackets.marginal_rate,
            effective_rate,
            breakdown: brackets.slices,
        })
    }
}

/// Calculates tax with the built-in tables.
pub fn calculate_tax(input: TaxInput) -> Result<TaxCalculation> {
    TaxCalculator::default().calculate(input)
}
