// src/purchase.rs
use crate::models::Stock;
use serde::Serialize;
use std::fmt;

/// Modal presentation of the buy form.
pub trait PurchaseSheet: Send + Sync {
    fn present(&self, stock: &Stock);
    fn dismiss(&self);
}

pub struct LoggingSheet;

impl PurchaseSheet for LoggingSheet {
    fn present(&self, stock: &Stock) {
        log::debug!("Presenting purchase sheet for {}", stock.symbol);
    }

    fn dismiss(&self) {
        log::debug!("Dismissing purchase sheet");
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "stock", rename_all = "camelCase")]
pub enum PurchaseState {
    Idle,
    Selecting(Stock),
    Submitting(Stock),
}

#[derive(Debug, Clone, PartialEq)]
pub enum PurchaseError {
    NotOpen,
    AlreadySubmitting,
    InvalidAmount(f64),
}

impl fmt::Display for PurchaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurchaseError::NotOpen => write!(f, "no purchase in progress"),
            PurchaseError::AlreadySubmitting => write!(f, "a purchase is already being submitted"),
            PurchaseError::InvalidAmount(amount) => write!(f, "invalid amount {}", amount),
        }
    }
}

impl std::error::Error for PurchaseError {}

/// Selection, presentation and submission of a single buy action.
#[derive(Debug, Clone, PartialEq)]
pub struct PurchaseFlow {
    state: PurchaseState,
    // Ticket of the write currently in flight, if any.
    in_flight: Option<u64>,
    next_ticket: u64,
}

impl Default for PurchaseFlow {
    fn default() -> Self {
        PurchaseFlow {
            state: PurchaseState::Idle,
            in_flight: None,
            next_ticket: 0,
        }
    }
}

impl PurchaseFlow {
    pub fn state(&self) -> &PurchaseState {
        &self.state
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.state, PurchaseState::Idle)
    }

    pub fn selected(&self) -> Option<&Stock> {
        match &self.state {
            PurchaseState::Idle => None,
            PurchaseState::Selecting(stock) | PurchaseState::Submitting(stock) => Some(stock),
        }
    }

    // Returns false when the sheet is already open; nothing changes then.
    pub fn open(&mut self, stock: Stock) -> bool {
        if self.is_open() {
            return false;
        }
        self.state = PurchaseState::Selecting(stock);
        true
    }

    /// Selecting -> Submitting. The returned ticket identifies this write;
    /// only a matching ticket can finish it.
    pub fn begin_submit(&mut self, amount: f64) -> Result<(u64, Stock), PurchaseError> {
        match &self.state {
            PurchaseState::Idle => Err(PurchaseError::NotOpen),
            PurchaseState::Submitting(_) => Err(PurchaseError::AlreadySubmitting),
            PurchaseState::Selecting(_) if !(amount.is_finite() && amount > 0.0) => {
                Err(PurchaseError::InvalidAmount(amount))
            }
            PurchaseState::Selecting(stock) => {
                let stock = stock.clone();
                self.next_ticket += 1;
                self.in_flight = Some(self.next_ticket);
                self.state = PurchaseState::Submitting(stock.clone());
                Ok((self.next_ticket, stock))
            }
        }
    }

    fn owns(&self, ticket: u64) -> bool {
        self.in_flight == Some(ticket) && matches!(self.state, PurchaseState::Submitting(_))
    }

    // Submitting -> Idle. A stale ticket leaves the flow untouched.
    pub fn complete(&mut self, ticket: u64) -> bool {
        if !self.owns(ticket) {
            return false;
        }
        self.in_flight = None;
        self.state = PurchaseState::Idle;
        true
    }

    // Submitting -> Selecting, keeping the sheet open for another try.
    pub fn fail(&mut self, ticket: u64) -> bool {
        if !self.owns(ticket) {
            return false;
        }
        self.in_flight = None;
        if let PurchaseState::Submitting(stock) = &self.state {
            self.state = PurchaseState::Selecting(stock.clone());
        }
        true
    }

    // Any open state -> Idle. Returns false when already idle.
    pub fn close(&mut self) -> bool {
        if !self.is_open() {
            return false;
        }
        self.in_flight = None;
        self.state = PurchaseState::Idle;
        true
    }
}
