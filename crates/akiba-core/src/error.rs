//! Error types for Akiba core primitives

use thiserror::Error;

use crate::money::Money;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("Allocation must sum to 100% (main {main_pct}% + savings {savings_pct}%)")]
    InvalidAllocation { main_pct: u8, savings_pct: u8 },

    #[error("Basis points out of range: {0} (expected 0-10000)")]
    InvalidBasisPoints(u32),

    #[error("Invalid round-up increment: {0}")]
    InvalidIncrement(String),

    #[error("{0} must not be negative (got {1})")]
    NegativeAmount(&'static str, Money),

    #[error("Amount overflow while composing charge")]
    AmountOverflow,

    #[error("Invalid lockout table: {0}")]
    InvalidLockoutTable(String),
}
