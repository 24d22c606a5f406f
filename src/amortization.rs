//! Principal/interest splitting and payment application.
//!
//! Interest for a period is simple interest on the outstanding balance at the
//! nominal monthly rate (`annual / 100 / 12`), rounded up to cents. No sub-monthly
//! compounding and no day-count convention is applied.

use chrono::{Months, NaiveDate};
use log::{debug, info, warn};
use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};
use crate::loan::{Loan, LoanStatus, Payment, PaymentType};

/// How a payment amount divides between interest and principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Split {
    pub principal: Decimal,
    pub interest: Decimal,
}

/// A payment as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub date: NaiveDate,
    pub amount: Decimal,
    #[serde(default)]
    pub payment_type: PaymentType,
    #[serde(default)]
    pub notes: String,
}

impl PaymentRequest {
    pub fn new(date: NaiveDate, amount: Decimal, payment_type: PaymentType) -> Self {
        PaymentRequest {
            date,
            amount,
            payment_type,
            notes: String::new(),
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }
}

/// Upper limit on a single payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind", content = "value")]
pub enum PaymentCeiling {
    /// Balance plus interest accrued now.
    #[default]
    Payoff,
    /// Payoff plus a fixed allowance. A negative allowance counts as zero.
    Tolerance(Decimal),
    /// Any positive amount.
    Unbounded,
}

impl PaymentCeiling {
    fn limit(&self, loan: &Loan) -> Option<Decimal> {
        match self {
            PaymentCeiling::Payoff => Some(payoff_amount(loan)),
            PaymentCeiling::Tolerance(extra) => Some(payoff_amount(loan) + (*extra).max(Decimal::ZERO)),
            PaymentCeiling::Unbounded => None,
        }
    }
}

/// Nominal monthly rate as a fraction for an annual percentage.
pub fn monthly_rate(annual_percent: Decimal) -> Decimal {
    annual_percent / dec!(100) / dec!(12)
}

/// Decimal places kept for interest amounts.
pub const INTEREST_SCALE: u32 = 2;

/// Interest accrued on the current balance for one period.
///
/// Rounded up to cents, so it is never below the exact figure and a payment
/// smaller than the exact interest never reaches principal.
pub fn accrued_interest(loan: &Loan) -> Decimal {
    (loan.remaining_balance * monthly_rate(loan.interest_rate))
        .round_dp_with_strategy(INTEREST_SCALE, RoundingStrategy::AwayFromZero)
}

/// Amount that clears the loan today.
pub fn payoff_amount(loan: &Loan) -> Decimal {
    loan.remaining_balance + accrued_interest(loan)
}

/// Splits `amount` against the loan's current balance without changing it.
///
/// A payment below the accrued interest goes entirely to interest. Principal
/// never exceeds the remaining balance.
pub fn compute_split(loan: &Loan, amount: Decimal) -> Result<Split> {
    if amount <= Decimal::ZERO {
        return Err(Error::invalid_amount(amount, "payment must be positive"));
    }

    let accrued = accrued_interest(loan).max(Decimal::ZERO);
    let interest = accrued.min(amount);
    let principal = (amount - accrued)
        .min(loan.remaining_balance)
        .max(Decimal::ZERO);

    debug!(
        "Split {} against {} on {}: principal {}, interest {}",
        amount, loan.remaining_balance, loan.loan_number, principal, interest
    );

    Ok(Split {
        principal,
        interest,
    })
}

/// Applies a payment with the default payoff ceiling.
pub fn apply_payment(loan: &Loan, request: PaymentRequest) -> Result<Loan> {
    apply_payment_with_ceiling(loan, request, PaymentCeiling::default())
}

/// Applies a payment and returns the updated loan.
///
/// The input loan is never modified, so a failure leaves nothing half-written.
pub fn apply_payment_with_ceiling(
    loan: &Loan,
    request: PaymentRequest,
    ceiling: PaymentCeiling,
) -> Result<Loan> {
    if loan.status.is_terminal() {
        warn!(
            "Rejected payment of {} on {} loan {}",
            request.amount, loan.status, loan.loan_number
        );
        return Err(Error::LoanClosed {
            loan_number: loan.loan_number.clone(),
            status: loan.status,
        });
    }
    if request.amount <= Decimal::ZERO {
        warn!(
            "Rejected non-positive payment {} on loan {}",
            request.amount, loan.loan_number
        );
        return Err(Error::invalid_amount(
            request.amount,
            "payment must be positive",
        ));
    }
    if let Some(limit) = ceiling.limit(loan) {
        if request.amount > limit {
            warn!(
                "Rejected payment {} on loan {}: exceeds ceiling {}",
                request.amount, loan.loan_number, limit
            );
            return Err(Error::invalid_amount(
                request.amount,
                format!("exceeds the maximum allowed payment of {}", limit.round_dp(2)),
            ));
        }
    }

    let next_payment_date = request
        .date
        .checked_add_months(Months::new(1))
        .ok_or_else(|| ValidationError::InvalidDate(format!("{} plus one month", request.date)))?;
    let split = compute_split(loan, request.amount)?;

    let mut updated = loan.clone();
    updated.remaining_balance -= split.principal;
    updated.next_payment_date = next_payment_date;
    updated.payments.push(Payment {
        date: request.date,
        amount: request.amount,
        principal: split.principal,
        interest: split.interest,
        payment_type: request.payment_type,
        notes: request.notes,
    });

    if updated.remaining_balance <= Decimal::ZERO {
        updated.remaining_balance = Decimal::ZERO;
        updated.status = LoanStatus::Paid;
        info!("Loan {} paid off on {}", updated.loan_number, request.date);
    } else {
        updated.status = LoanStatus::Current;
        info!(
            "Applied {} to loan {}: balance {}, next payment {}",
            request.amount, updated.loan_number, updated.remaining_balance, next_payment_date
        );
    }

    Ok(updated)
}
