//! `clinic_ledger` is the computational core of a clinic back-office: loan
//! tracking with principal/interest splitting, and progressive tax estimates
//! for financial reports.
//!
//! It provides:
//! - **Amortization engine**: splits a payment into interest (simple interest
//!   on the balance at the nominal monthly rate) and principal, applies it to a
//!   loan and rolls the next payment date forward by one calendar month.
//! - **Payoff projection**: level installments and month-by-month payoff
//!   schedules using the same split as recorded payments.
//! - **Progressive tax calculator**: stepwise marginal brackets for corporate
//!   and personal regimes, with bracket tables supplied as data.
//! - **Loan store**: a repository interface, an in-memory implementation and a
//!   service that serializes payments per loan.
//!
//! ## Usage
//!
//! ```rust
//! use chrono::NaiveDate;
//! use clinic_ledger::{
//!     apply_payment, calculate_tax, Loan, NewLoan, PaymentRequest, PaymentType, TaxInput, TaxType,
//! };
//! use rust_decimal_macros::dec;
//!
//! fn main() {
//!     let new_loan = NewLoan {
//!         lender: "Metro Savings".to_string(),
//!         original_amount: dec!(120_000),
//!         interest_rate: dec!(4.5),
//!         term: 60,
//!         start_date: NaiveDate::from_ymd_opt(2024, 1, 15),
//!         ..Default::default()
//!     };
//!     let loan = Loan::create(new_loan, "loan-1".to_string(), "LN-0001".to_string())
//!         .expect("valid loan");
//!
//!     let date = NaiveDate::from_ymd_opt(2024, 2, 15).unwrap();
//!     match apply_payment(&loan, PaymentRequest::new(date, dec!(2800), PaymentType::Regular)) {
//!         Ok(updated) => {
//!             println!("Remaining balance: {:.2}", updated.remaining_balance);
//!             println!("Next payment:      {}", updated.next_payment_date);
//!         }
//!         Err(e) => eprintln!("Payment rejected: {}", e),
//!     }
//!
//!     let tax = calculate_tax(TaxInput {
//!         period: "2024".to_string(),
//!         tax_type: TaxType::Personal,
//!         revenue: dec!(500_000),
//!         expenses: dec!(0),
//!         deductions: dec!(0),
//!     })
//!     .expect("non-negative inputs");
//!     assert_eq!(tax.tax_amount, dec!(27_500));
//! }
//! ```

pub mod amortization;
pub mod errors;
pub mod loan;
pub mod schedule;
pub mod store;
pub mod summary;
pub mod tax;

pub use amortization::{
    PaymentCeiling, PaymentRequest, Split, apply_payment, apply_payment_with_ceiling,
    compute_split, payoff_amount,
};
pub use errors::{BracketConfigurationError, Error, Result, ValidationError};
pub use loan::{Loan, LoanStatus, NewLoan, Payment, PaymentType};
pub use schedule::{PayoffProjection, ProjectedInstallment, project_payoff, scheduled_installment};
pub use store::{InMemoryLoanRepository, LoanRepositoryTrait, LoanService};
pub use summary::{LoanPortfolioSummary, StatusCounts};
pub use tax::{
    BracketTable, TaxBracket, TaxCalculation, TaxCalculator, TaxConfig, TaxInput, TaxType,
    apply_brackets, calculate_tax,
};
