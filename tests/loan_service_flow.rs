use std::sync::Arc;
use std::thread;

use chrono::NaiveDate;
use clinic_ledger::{
    Error, InMemoryLoanRepository, LoanRepositoryTrait, LoanService, LoanStatus, NewLoan,
    PaymentCeiling, PaymentRequest, PaymentType, ValidationError, project_payoff,
};
use rstest::{fixture, rstest};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[fixture]
fn service() -> LoanService {
    LoanService::new(Arc::new(InMemoryLoanRepository::new()))
}

fn practice_loan() -> NewLoan {
    NewLoan {
        lender: "Eastside Commercial Bank".to_string(),
        loan_type: "business".to_string(),
        purpose: "Second clinic fit-out".to_string(),
        collateral: "Diagnostic equipment".to_string(),
        notes: String::new(),
        original_amount: dec!(150000),
        interest_rate: dec!(4.5),
        term: 60,
        start_date: Some(date(2024, 1, 15)),
        first_payment_date: Some(date(2024, 2, 15)),
        monthly_payment: Some(dec!(2800)),
    }
}

#[rstest]
fn test_payment_history_keeps_balance_in_step(service: LoanService) {
    let loan = service.create_loan(practice_loan()).unwrap();

    let mut current = loan.clone();
    for month in 2..=7 {
        current = service
            .record_payment(
                &loan.id,
                PaymentRequest::new(date(2024, month, 15), dec!(2800), PaymentType::Regular),
            )
            .unwrap();
    }

    assert_eq!(current.payments.len(), 6);
    assert_eq!(
        current.remaining_balance,
        current.original_amount - current.total_principal_paid()
    );
    assert_eq!(
        current.total_paid(),
        current.total_principal_paid() + current.total_interest_paid()
    );
    assert_eq!(current.next_payment_date, date(2024, 8, 15));
    assert_eq!(current.status_on(date(2024, 8, 1)), LoanStatus::Current);
    assert_eq!(current.status_on(date(2024, 8, 16)), LoanStatus::Overdue);
}

#[rstest]
fn test_payoff_flow(service: LoanService) {
    let loan = service.create_loan(practice_loan()).unwrap();
    let payoff = clinic_ledger::payoff_amount(&loan);

    let paid = service
        .record_payment(
            &loan.id,
            PaymentRequest::new(date(2024, 2, 15), payoff, PaymentType::Extra)
                .with_notes("Refinanced"),
        )
        .unwrap();

    assert_eq!(paid.remaining_balance, Decimal::ZERO);
    assert_eq!(paid.status, LoanStatus::Paid);
    let again = service.record_payment(
        &loan.id,
        PaymentRequest::new(date(2024, 3, 15), dec!(1), PaymentType::Regular),
    );
    assert!(matches!(again, Err(Error::LoanClosed { .. })));
    assert!(matches!(
        service.mark_default(&loan.id),
        Err(Error::InvalidStatusTransition { .. })
    ));
}

#[rstest]
#[case::ceiling_payoff(PaymentCeiling::Payoff, false)]
#[case::ceiling_generous(PaymentCeiling::Tolerance(dec!(1000)), true)]
fn test_service_honours_configured_ceiling(
    #[case] ceiling: PaymentCeiling,
    #[case] accepted: bool,
) {
    let repository = Arc::new(InMemoryLoanRepository::new());
    let service = LoanService::with_ceiling(repository.clone(), ceiling);
    let loan = service.create_loan(practice_loan()).unwrap();
    // 150000 + 562.50 interest, plus 100 over.
    let amount = dec!(150662.50);

    let result = service.record_payment(
        &loan.id,
        PaymentRequest::new(date(2024, 2, 15), amount, PaymentType::Extra),
    );

    assert_eq!(result.is_ok(), accepted);
    if !accepted {
        assert!(matches!(
            result,
            Err(Error::Validation(ValidationError::InvalidAmount { .. }))
        ));
        assert_eq!(repository.get(&loan.id).unwrap(), loan);
    }
}

#[rstest]
fn test_concurrent_payments_do_not_lose_updates(service: LoanService) {
    let service = Arc::new(service);
    let loan = service.create_loan(practice_loan()).unwrap();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            let id = loan.id.clone();
            thread::spawn(move || {
                service
                    .record_payment(
                        &id,
                        PaymentRequest::new(date(2024, 2, 1 + i), dec!(1000), PaymentType::Extra),
                    )
                    .unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let stored = service.get_loan(&loan.id).unwrap();
    assert_eq!(stored.payments.len(), 8);
    assert_eq!(
        stored.remaining_balance,
        stored.original_amount - stored.total_principal_paid()
    );
}

#[rstest]
fn test_summary_reflects_store(service: LoanService) {
    let first = service.create_loan(practice_loan()).unwrap();
    let mut second_input = practice_loan();
    second_input.original_amount = dec!(50000);
    second_input.interest_rate = dec!(6.5);
    let second = service.create_loan(second_input).unwrap();
    service
        .record_payment(
            &first.id,
            PaymentRequest::new(date(2024, 2, 15), dec!(2800), PaymentType::Regular),
        )
        .unwrap();
    service.mark_default(&second.id).unwrap();

    let summary = service.summary(date(2024, 3, 1)).unwrap();

    assert_eq!(summary.loan_count, 2);
    assert_eq!(summary.status_counts.current, 1);
    assert_eq!(summary.status_counts.default, 1);
    assert_eq!(summary.total_outstanding, dec!(197762.50));
    assert_eq!(summary.average_interest_rate, dec!(5.5));
    assert_eq!(summary.monthly_obligation, dec!(2800));
}

#[rstest]
fn test_projection_from_stored_loan(service: LoanService) {
    let loan = service.create_loan(practice_loan()).unwrap();

    let projection = project_payoff(&loan, loan.monthly_payment).unwrap();

    // 2800 a month is slightly above the 60-month level installment.
    assert!(projection.months_remaining <= 60);
    assert!(projection.months_remaining >= 58);
    assert_eq!(projection.schedule[0].date, date(2024, 2, 15));
    assert_eq!(projection.schedule[0].interest, dec!(562.50));
}
