//! Level installments and payoff projections.
//!
//! The projection walks forward one month at a time with the same split the
//! ledger uses for real payments, so projected and recorded figures agree.

use chrono::{Months, NaiveDate};
use log::debug;
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::amortization::{accrued_interest, compute_split, monthly_rate};
use crate::errors::{Error, Result, ValidationError};
use crate::loan::Loan;

/// Longest projection produced, in months.
pub const MAX_PROJECTION_MONTHS: usize = 1200;

/// One projected month.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectedInstallment {
    pub date: NaiveDate,
    pub payment: Decimal,
    pub principal: Decimal,
    pub interest: Decimal,
    /// Balance after this installment.
    pub balance: Decimal,
}

/// Result of projecting a loan to payoff at a fixed installment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoffProjection {
    pub installment: Decimal,
    pub months_remaining: u32,
    pub total_interest: Decimal,
    pub total_paid: Decimal,
    pub payoff_date: NaiveDate,
    pub schedule: Vec<ProjectedInstallment>,
}

/// Fixed monthly installment that repays `amount` over `term` months.
///
/// PMT = P * [r(1 + r)^n] / [(1 + r)^n - 1] with the nominal monthly rate r.
pub fn scheduled_installment(amount: Decimal, annual_rate: Decimal, term: u32) -> Result<Decimal> {
    if term == 0 {
        return Err(ValidationError::InvalidTerm(term).into());
    }
    let rate = monthly_rate(annual_rate);
    if rate.is_zero() {
        return Ok(amount / Decimal::from(term));
    }

    let growth = (dec!(1) + rate).powu(term.into());
    Ok(amount * (rate * growth) / (growth - dec!(1)))
}

/// Projects the remaining payments when paying `installment` every month from
/// the loan's next payment date.
pub fn project_payoff(loan: &Loan, installment: Decimal) -> Result<PayoffProjection> {
    if installment <= Decimal::ZERO {
        return Err(Error::invalid_amount(installment, "installment must be positive"));
    }
    let first_interest = accrued_interest(loan);
    if loan.remaining_balance > Decimal::ZERO && installment <= first_interest {
        return Err(Error::invalid_amount(
            installment,
            format!(
                "does not cover the monthly interest of {}",
                first_interest.round_dp(2)
            ),
        ));
    }

    let mut projected = loan.clone();
    let mut date = loan.next_payment_date;
    let mut total_interest = dec!(0);
    let mut total_paid = dec!(0);
    let mut schedule = Vec::new();

    while projected.remaining_balance > Decimal::ZERO {
        if schedule.len() >= MAX_PROJECTION_MONTHS {
            return Err(Error::invalid_amount(
                installment,
                format!("loan is not repaid within {MAX_PROJECTION_MONTHS} months"),
            ));
        }

        let split = compute_split(&projected, installment)?;
        let payment = split.principal + split.interest;
        projected.remaining_balance -= split.principal;
        total_interest += split.interest;
        total_paid += payment;
        schedule.push(ProjectedInstallment {
            date,
            payment,
            principal: split.principal,
            interest: split.interest,
            balance: projected.remaining_balance,
        });

        date = date
            .checked_add_months(Months::new(1))
            .ok_or_else(|| ValidationError::InvalidDate(format!("{date} plus one month")))?;
    }

    let payoff_date = schedule
        .last()
        .map(|row| row.date)
        .unwrap_or(loan.next_payment_date);

    debug!(
        "Projected loan {} to payoff in {} months at {}",
        loan.loan_number,
        schedule.len(),
        installment
    );

    Ok(PayoffProjection {
        installment,
        months_remaining: schedule.len() as u32,
        total_interest: total_interest.round_dp(2),
        total_paid: total_paid.round_dp(2),
        payoff_date,
        schedule,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loan::NewLoan;
    use rstest::rstest;

    fn loan(amount: Decimal, rate: Decimal, term: u32) -> Loan {
        Loan::create(
            NewLoan {
                lender: "Optical Credit Union".to_string(),
                original_amount: amount,
                interest_rate: rate,
                term,
                start_date: NaiveDate::from_ymd_opt(2024, 1, 10),
                ..Default::default()
            },
            "loan".to_string(),
            "LN-0001".to_string(),
        )
        .unwrap()
    }

    #[rstest]
    #[case(dec!(12000), dec!(12), 12, dec!(1066.19))]
    #[case(dec!(24000), dec!(12), 24, dec!(1129.76))]
    #[case(dec!(10000), dec!(12), 1, dec!(10100))]
    fn test_scheduled_installment(
        #[case] amount: Decimal,
        #[case] rate: Decimal,
        #[case] term: u32,
        #[case] expected: Decimal,
    ) {
        let installment = scheduled_installment(amount, rate, term).unwrap();
        assert_eq!(installment.round_dp(2), expected);
    }

    #[test]
    fn test_zero_rate_installment_is_straight_line() {
        assert_eq!(scheduled_installment(dec!(1200), dec!(0), 12).unwrap(), dec!(100));
    }

    #[test]
    fn test_zero_term_error() {
        assert!(scheduled_installment(dec!(1000), dec!(5), 0).is_err());
    }

    #[test]
    fn test_level_installment_repays_within_term() {
        let loan = loan(dec!(12000), dec!(12), 12);

        let projection = project_payoff(&loan, loan.monthly_payment).unwrap();

        assert_eq!(projection.months_remaining, 12);
        assert_eq!(projection.schedule.last().unwrap().balance, Decimal::ZERO);
        assert_eq!(projection.payoff_date, NaiveDate::from_ymd_opt(2025, 1, 10).unwrap());
        let principal: Decimal = projection.schedule.iter().map(|r| r.principal).sum();
        assert_eq!(principal, dec!(12000));
        assert!(projection.total_interest > dec!(780) && projection.total_interest < dec!(800));
    }

    #[test]
    fn test_larger_installment_pays_off_sooner() {
        let loan = loan(dec!(12000), dec!(12), 12);

        let regular = project_payoff(&loan, loan.monthly_payment).unwrap();
        let accelerated = project_payoff(&loan, dec!(2000)).unwrap();

        assert!(accelerated.months_remaining < regular.months_remaining);
        assert!(accelerated.total_interest < regular.total_interest);
    }

    #[test]
    fn test_installment_below_interest_never_amortizes() {
        let loan = loan(dec!(120000), dec!(4.5), 60);

        let result = project_payoff(&loan, dec!(450));

        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_paid_loan_projects_empty_schedule() {
        let mut loan = loan(dec!(12000), dec!(12), 12);
        loan.remaining_balance = Decimal::ZERO;

        let projection = project_payoff(&loan, dec!(100)).unwrap();

        assert_eq!(projection.months_remaining, 0);
        assert!(projection.schedule.is_empty());
        assert_eq!(projection.payoff_date, loan.next_payment_date);
    }
}
