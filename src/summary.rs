//! Portfolio-level totals over a set of loans.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::loan::{Loan, LoanStatus};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub current: usize,
    pub overdue: usize,
    pub paid: usize,
    pub default: usize,
}

impl StatusCounts {
    fn record(&mut self, status: LoanStatus) {
        match status {
            LoanStatus::Current => self.current += 1,
            LoanStatus::Overdue => self.overdue += 1,
            LoanStatus::Paid => self.paid += 1,
            LoanStatus::Default => self.default += 1,
        }
    }
}

/// Read-side totals for the loans dashboard.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoanPortfolioSummary {
    pub as_of: Option<NaiveDate>,
    pub loan_count: usize,
    pub status_counts: StatusCounts,
    pub total_original_amount: Decimal,
    pub total_outstanding: Decimal,
    pub total_principal_paid: Decimal,
    pub total_interest_paid: Decimal,
    /// Simple mean of the annual rates, in percent.
    pub average_interest_rate: Decimal,
    /// Share of all original amounts already repaid, in percent.
    pub progress_percent: Decimal,
    /// Scheduled installments of loans that are still open.
    pub monthly_obligation: Decimal,
}

impl LoanPortfolioSummary {
    pub fn from_loans(loans: &[Loan], as_of: NaiveDate) -> Self {
        let mut summary = LoanPortfolioSummary {
            as_of: Some(as_of),
            loan_count: loans.len(),
            ..Default::default()
        };
        if loans.is_empty() {
            return summary;
        }

        let mut rate_sum = dec!(0);
        for loan in loans {
            let status = loan.status_on(as_of);
            summary.status_counts.record(status);
            summary.total_original_amount += loan.original_amount;
            summary.total_outstanding += loan.remaining_balance;
            summary.total_principal_paid += loan.total_principal_paid();
            summary.total_interest_paid += loan.total_interest_paid();
            rate_sum += loan.interest_rate;
            if !status.is_terminal() {
                summary.monthly_obligation += loan.monthly_payment;
            }
        }

        summary.average_interest_rate = rate_sum / Decimal::from(loans.len());
        if summary.total_original_amount > Decimal::ZERO {
            summary.progress_percent = (summary.total_original_amount - summary.total_outstanding)
                / summary.total_original_amount
                * dec!(100);
        }

        summary
    }
}
