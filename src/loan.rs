//! Loan and payment records.

use std::fmt;

use chrono::{Months, NaiveDate};
use log::info;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result, ValidationError};
use crate::schedule::scheduled_installment;

/// Lifecycle state of a loan.
///
/// `Paid` and `Default` are terminal. `Overdue` is never written by this crate;
/// it is derived from the payment date by [`Loan::status_on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Current,
    Overdue,
    Paid,
    Default,
}

impl LoanStatus {
    /// Whether the loan can no longer change state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, LoanStatus::Paid | LoanStatus::Default)
    }

    /// Lowercase name, as serialized.
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Current => "current",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Paid => "paid",
            LoanStatus::Default => "default",
        }
    }
}

impl fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classification of a payment. Does not affect how it is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentType {
    #[default]
    Regular,
    Extra,
    Partial,
    Late,
}

/// A payment applied to a loan. Only the amortization engine creates these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    pub date: NaiveDate,
    /// Gross cash amount received.
    pub amount: Decimal,
    /// Portion that reduced the balance.
    pub principal: Decimal,
    /// Portion that covered interest accrued for the period.
    pub interest: Decimal,
    pub payment_type: PaymentType,
    pub notes: String,
}

/// Input for creating a loan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewLoan {
    pub lender: String,
    pub loan_type: String,
    pub purpose: String,
    pub collateral: String,
    pub notes: String,
    pub original_amount: Decimal,
    /// Annual nominal rate as a percentage (e.g., 4.5 for 4.5%).
    pub interest_rate: Decimal,
    /// Term in months.
    pub term: u32,
    pub start_date: Option<NaiveDate>,
    /// Defaults to one month after the start date.
    pub first_payment_date: Option<NaiveDate>,
    /// Defaults to the level installment for the amount, rate and term.
    pub monthly_payment: Option<Decimal>,
}

/// A loan and its payment history.
///
/// `remaining_balance` always equals `original_amount` minus the principal of
/// every payment. Only the amortization engine changes it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Loan {
    /// Opaque unique identifier.
    pub id: String,
    /// Human-readable number such as `LN-0001`.
    pub loan_number: String,
    pub lender: String,
    pub loan_type: String,
    pub purpose: String,
    pub collateral: String,
    pub notes: String,
    /// Amount borrowed. Fixed at creation.
    pub original_amount: Decimal,
    /// Principal still owed.
    pub remaining_balance: Decimal,
    /// Annual nominal rate as a percentage. Fixed at creation.
    pub interest_rate: Decimal,
    /// Term in months. Informational only.
    pub term: u32,
    pub start_date: NaiveDate,
    /// Due date of the next installment, moved forward by each payment.
    pub next_payment_date: NaiveDate,
    /// Scheduled installment, used as a default amount.
    pub monthly_payment: Decimal,
    /// Stored state. Use [`Loan::status_on`] for the effective status.
    pub status: LoanStatus,
    /// Payments in the order they were applied.
    pub payments: Vec<Payment>,
}

impl Loan {
    /// Validates `new` and builds a loan with a full balance and no payments.
    pub fn create(new: NewLoan, id: String, loan_number: String) -> Result<Loan> {
        if new.original_amount <= Decimal::ZERO {
            return Err(Error::invalid_amount(
                new.original_amount,
                "original amount must be positive",
            ));
        }
        if new.interest_rate <= Decimal::ZERO {
            return Err(ValidationError::InvalidRate(new.interest_rate).into());
        }
        if new.term == 0 {
            return Err(ValidationError::InvalidTerm(new.term).into());
        }
        let start_date = new
            .start_date
            .ok_or_else(|| ValidationError::MissingField("startDate".to_string()))?;

        let monthly_payment = match new.monthly_payment {
            Some(payment) if payment <= Decimal::ZERO => {
                return Err(Error::invalid_amount(
                    payment,
                    "monthly payment must be positive",
                ));
            }
            Some(payment) => payment,
            None => scheduled_installment(new.original_amount, new.interest_rate, new.term)?
                .round_dp(2),
        };

        let next_payment_date = match new.first_payment_date {
            Some(date) => date,
            None => start_date.checked_add_months(Months::new(1)).ok_or_else(|| {
                ValidationError::InvalidDate(format!("{start_date} plus one month"))
            })?,
        };

        info!(
            "Created loan {} from {} for {} at {}% over {} months",
            loan_number, new.lender, new.original_amount, new.interest_rate, new.term
        );

        Ok(Loan {
            id,
            loan_number,
            lender: new.lender,
            loan_type: new.loan_type,
            purpose: new.purpose,
            collateral: new.collateral,
            notes: new.notes,
            original_amount: new.original_amount,
            remaining_balance: new.original_amount,
            interest_rate: new.interest_rate,
            term: new.term,
            start_date,
            next_payment_date,
            monthly_payment,
            status: LoanStatus::Current,
            payments: Vec::new(),
        })
    }

    /// Effective status at `as_of`.
    ///
    /// Terminal stored states win, a zero balance is paid, and a payment date
    /// strictly before `as_of` is overdue.
    pub fn status_on(&self, as_of: NaiveDate) -> LoanStatus {
        if self.status.is_terminal() {
            return self.status;
        }
        if self.remaining_balance <= Decimal::ZERO {
            return LoanStatus::Paid;
        }
        if self.next_payment_date < as_of {
            LoanStatus::Overdue
        } else {
            LoanStatus::Current
        }
    }

    /// Administrative write-off. Only open loans can default.
    pub fn mark_default(&mut self) -> Result<()> {
        if self.status.is_terminal() || self.remaining_balance <= Decimal::ZERO {
            let from = if self.status.is_terminal() {
                self.status
            } else {
                LoanStatus::Paid
            };
            return Err(Error::InvalidStatusTransition {
                from,
                to: LoanStatus::Default,
            });
        }
        info!(
            "Loan {} marked as default with {} outstanding",
            self.loan_number, self.remaining_balance
        );
        self.status = LoanStatus::Default;
        Ok(())
    }

    /// Principal repaid across all payments.
    pub fn total_principal_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.principal).sum()
    }

    /// Interest paid across all payments.
    pub fn total_interest_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.interest).sum()
    }

    /// Gross cash received across all payments.
    pub fn total_paid(&self) -> Decimal {
        self.payments.iter().map(|p| p.amount).sum()
    }

    /// Share of the original amount already repaid, in percent.
    pub fn progress_percent(&self) -> Decimal {
        if self.original_amount <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (self.original_amount - self.remaining_balance) / self.original_amount * dec!(100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn new_loan() -> NewLoan {
        NewLoan {
            lender: "First Clinic Bank".to_string(),
            loan_type: "equipment".to_string(),
            purpose: "Refraction units".to_string(),
            original_amount: dec!(150000),
            interest_rate: dec!(4.5),
            term: 60,
            start_date: Some(date(2024, 1, 31)),
            monthly_payment: Some(dec!(2800)),
            ..Default::default()
        }
    }

    #[test]
    fn test_create_starts_with_full_balance() {
        let loan = Loan::create(new_loan(), "id-1".to_string(), "LN-0001".to_string()).unwrap();

        assert_eq!(loan.remaining_balance, dec!(150000));
        assert_eq!(loan.status, LoanStatus::Current);
        assert!(loan.payments.is_empty());
        // End-of-month start clamps into February.
        assert_eq!(loan.next_payment_date, date(2024, 2, 29));
    }

    #[test]
    fn test_create_defaults_monthly_payment_to_level_installment() {
        let mut new = new_loan();
        new.original_amount = dec!(12000);
        new.interest_rate = dec!(12);
        new.term = 12;
        new.monthly_payment = None;

        let loan = Loan::create(new, "id".to_string(), "LN-0002".to_string()).unwrap();

        assert_eq!(loan.monthly_payment, dec!(1066.19));
    }

    #[rstest]
    #[case::zero_amount(dec!(0), dec!(4.5), 60)]
    #[case::negative_amount(dec!(-10), dec!(4.5), 60)]
    #[case::zero_rate(dec!(1000), dec!(0), 60)]
    #[case::negative_rate(dec!(1000), dec!(-1), 60)]
    #[case::zero_term(dec!(1000), dec!(4.5), 0)]
    fn test_create_rejects_invalid_terms(
        #[case] amount: Decimal,
        #[case] rate: Decimal,
        #[case] term: u32,
    ) {
        let mut new = new_loan();
        new.original_amount = amount;
        new.interest_rate = rate;
        new.term = term;

        let result = Loan::create(new, "id".to_string(), "LN-0003".to_string());

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_create_requires_start_date() {
        let mut new = new_loan();
        new.start_date = None;

        let err = Loan::create(new, "id".to_string(), "LN-0004".to_string()).unwrap_err();

        assert_eq!(
            err,
            Error::Validation(ValidationError::MissingField("startDate".to_string()))
        );
    }

    #[rstest]
    #[case::before_due(date(2024, 2, 28), LoanStatus::Current)]
    #[case::on_due_date(date(2024, 2, 29), LoanStatus::Current)]
    #[case::after_due(date(2024, 3, 1), LoanStatus::Overdue)]
    fn test_status_is_derived_from_next_payment_date(
        #[case] as_of: NaiveDate,
        #[case] expected: LoanStatus,
    ) {
        let loan = Loan::create(new_loan(), "id".to_string(), "LN-0005".to_string()).unwrap();
        assert_eq!(loan.status_on(as_of), expected);
    }

    #[test]
    fn test_terminal_status_is_not_overridden_by_dates() {
        let mut loan = Loan::create(new_loan(), "id".to_string(), "LN-0006".to_string()).unwrap();
        loan.mark_default().unwrap();

        assert_eq!(loan.status_on(date(2030, 1, 1)), LoanStatus::Default);
    }

    #[test]
    fn test_mark_default_from_terminal_fails() {
        let mut loan = Loan::create(new_loan(), "id".to_string(), "LN-0007".to_string()).unwrap();
        loan.status = LoanStatus::Paid;
        loan.remaining_balance = Decimal::ZERO;

        let err = loan.mark_default().unwrap_err();

        assert_eq!(
            err,
            Error::InvalidStatusTransition {
                from: LoanStatus::Paid,
                to: LoanStatus::Default
            }
        );
        assert_eq!(loan.status, LoanStatus::Paid);
    }

    #[test]
    fn test_serializes_with_camel_case_fields() {
        let loan = Loan::create(new_loan(), "id".to_string(), "LN-0008".to_string()).unwrap();
        let json = serde_json::to_value(&loan).unwrap();

        assert_eq!(json["loanNumber"], "LN-0008");
        assert_eq!(json["status"], "current");
        assert!(json.get("remainingBalance").is_some());
    }
}
