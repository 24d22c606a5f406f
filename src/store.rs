//! Loan record storage and the service that owns loan mutations.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use chrono::NaiveDate;
use log::{debug, info};
use uuid::Uuid;

use crate::amortization::{PaymentCeiling, PaymentRequest, apply_payment_with_ceiling};
use crate::errors::{Error, Result};
use crate::loan::{Loan, NewLoan};
use crate::summary::LoanPortfolioSummary;

/// Storage for loan records.
pub trait LoanRepositoryTrait: Send + Sync {
    /// Loads a loan by id, failing with `NotFound` if it is absent.
    fn get(&self, id: &str) -> Result<Loan>;
    /// Inserts or replaces the loan with the same id.
    fn save(&self, loan: Loan) -> Result<Loan>;
    /// All loans, ordered by loan number.
    fn list(&self) -> Result<Vec<Loan>>;
    /// Removes a loan, failing with `NotFound` if it is absent.
    fn delete(&self, id: &str) -> Result<()>;
}

/// Process-local repository.
#[derive(Debug, Default)]
pub struct InMemoryLoanRepository {
    loans: RwLock<HashMap<String, Loan>>,
}

impl InMemoryLoanRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<T>(_: T) -> Error {
    Error::Repository("loan store lock poisoned".to_string())
}

impl LoanRepositoryTrait for InMemoryLoanRepository {
    fn get(&self, id: &str) -> Result<Loan> {
        self.loans
            .read()
            .map_err(poisoned)?
            .get(id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    fn save(&self, loan: Loan) -> Result<Loan> {
        self.loans
            .write()
            .map_err(poisoned)?
            .insert(loan.id.clone(), loan.clone());
        Ok(loan)
    }

    fn list(&self) -> Result<Vec<Loan>> {
        let mut loans: Vec<Loan> = self.loans.read().map_err(poisoned)?.values().cloned().collect();
        loans.sort_by(|a, b| a.loan_number.cmp(&b.loan_number));
        Ok(loans)
    }

    fn delete(&self, id: &str) -> Result<()> {
        self.loans
            .write()
            .map_err(poisoned)?
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }
}

/// Entry point for loan mutations.
///
/// Payments against the same loan are serialized so that concurrent callers
/// cannot lose each other's balance updates.
pub struct LoanService {
    repository: Arc<dyn LoanRepositoryTrait>,
    ceiling: PaymentCeiling,
    next_number: AtomicU64,
    loan_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl LoanService {
    pub fn new(repository: Arc<dyn LoanRepositoryTrait>) -> Self {
        Self::with_ceiling(repository, PaymentCeiling::default())
    }

    pub fn with_ceiling(repository: Arc<dyn LoanRepositoryTrait>, ceiling: PaymentCeiling) -> Self {
        LoanService {
            repository,
            ceiling,
            next_number: AtomicU64::new(1),
            loan_locks: Mutex::new(HashMap::new()),
        }
    }

    fn next_loan_number(&self) -> String {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        format!("LN-{number:04}")
    }

    fn lock_for(&self, id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.loan_locks.lock().map_err(poisoned)?;
        Ok(locks.entry(id.to_string()).or_default().clone())
    }

    /// Validates and stores a new loan under a fresh id and loan number.
    pub fn create_loan(&self, new_loan: NewLoan) -> Result<Loan> {
        let id = Uuid::new_v4().to_string();
        let loan = Loan::create(new_loan, id, self.next_loan_number())?;
        self.repository.save(loan)
    }

    pub fn get_loan(&self, id: &str) -> Result<Loan> {
        self.repository.get(id)
    }

    pub fn list_loans(&self) -> Result<Vec<Loan>> {
        self.repository.list()
    }

    /// Applies a payment and persists the result. Nothing is saved on failure.
    pub fn record_payment(&self, id: &str, request: PaymentRequest) -> Result<Loan> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let loan = self.repository.get(id)?;
        let updated = apply_payment_with_ceiling(&loan, request, self.ceiling)?;
        self.repository.save(updated)
    }

    pub fn mark_default(&self, id: &str) -> Result<Loan> {
        let lock = self.lock_for(id)?;
        let _guard = lock.lock().map_err(poisoned)?;

        let mut loan = self.repository.get(id)?;
        loan.mark_default()?;
        self.repository.save(loan)
    }

    /// Removes the record. Its loan number is not handed out again.
    pub fn delete_loan(&self, id: &str) -> Result<()> {
        let lock = self.lock_for(id)?;
        {
            let _guard = lock.lock().map_err(poisoned)?;
            self.repository.delete(id)?;
        }
        self.loan_locks.lock().map_err(poisoned)?.remove(id);
        info!("Deleted loan {}", id);
        Ok(())
    }

    pub fn summary(&self, as_of: NaiveDate) -> Result<LoanPortfolioSummary> {
        let loans = self.repository.list()?;
        debug!("Summarizing {} loans as of {}", loans.len(), as_of);
        Ok(LoanPortfolioSummary::from_loans(&loans, as_of))
    }
}
