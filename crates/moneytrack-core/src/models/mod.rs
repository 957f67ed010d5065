//! Data models for the finance backend.
//!
//! These mirror the JSON shapes the backend sends and accepts. Field names
//! follow the wire format via serde attributes (`type`, `categoryBreakdown`).

pub mod analytics;
pub mod transaction;
pub mod user;

pub use analytics::{
    month_key, AnalyticsReport, CategoryBreakdown, CategoryFilter, CategoryPoint, MonthPoint,
    PeriodTotals,
};
pub use transaction::{Transaction, TransactionInput, TransactionKind};
pub use user::{PasswordResetTicket, User};
