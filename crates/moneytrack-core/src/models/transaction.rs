//! Transactions and categories.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Income,
    #[default]
    Expense,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Income => "income",
            TransactionKind::Expense => "expense",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "income" => Ok(TransactionKind::Income),
            "expense" => Ok(TransactionKind::Expense),
            other => Err(format!("Unknown transaction type: {}", other)),
        }
    }
}

/// A transaction as stored by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Transaction {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`, as the backend sends it.
    pub date: String,
}

impl Transaction {
    pub fn is_expense(&self) -> bool {
        self.kind == TransactionKind::Expense
    }
}

/// Body of a create/update request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct TransactionInput {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub category: String,
    pub amount: f64,
    pub description: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub is_recurring: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recurrence_months: Option<u32>,
}

impl TransactionInput {
    pub fn new(kind: TransactionKind, category: &str, amount: f64, date: NaiveDate) -> Self {
        Self {
            kind,
            category: category.trim().to_string(),
            amount,
            description: String::new(),
            date,
            is_recurring: false,
            recurrence_months: None,
        }
    }

    pub fn description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    /// Repeat monthly for `months` months. One month means no recurrence.
    pub fn recurring(mut self, months: u32) -> Self {
        if months > 1 {
            self.is_recurring = true;
            self.recurrence_months = Some(months);
        } else {
            self.is_recurring = false;
            self.recurrence_months = None;
        }
        self
    }

    /// Client-side checks before anything is sent.
    pub fn validate(&self) -> Result<(), String> {
        if self.category.is_empty() {
            return Err("Category is required".to_string());
        }
        if !self.amount.is_finite() || self.amount <= 0.0 {
            return Err("Amount must be a positive number".to_string());
        }
        Ok(())
    }
}

/// Prefill an edit form from a stored transaction.
impl TryFrom<&Transaction> for TransactionInput {
    type Error = chrono::ParseError;

    fn try_from(tx: &Transaction) -> Result<Self, Self::Error> {
        let date = NaiveDate::parse_from_str(tx.date.get(..10).unwrap_or(&tx.date), "%Y-%m-%d")?;
        Ok(Self {
            kind: tx.kind,
            category: tx.category.clone(),
            amount: tx.amount,
            description: tx.description.clone(),
            date,
            is_recurring: false,
            recurrence_months: None,
        })
    }
}

/// Body of `POST /api/categories`.
#[derive(Debug, Clone, Serialize)]
pub(crate) struct NewCategory<'a> {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub name: &'a str,
}
