//! Analytics as returned by `GET /api/analytics`.
//!
//! The backend does all aggregation. The helpers here only reshape the
//! already aggregated maps for display: yearly and monthly totals, chart
//! series, and filtered expense lists.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::transaction::Transaction;

const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PeriodTotals {
    #[serde(default)]
    pub income: f64,
    #[serde(default)]
    pub expense: f64,
}

impl PeriodTotals {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CategoryBreakdown {
    #[serde(default)]
    pub income: BTreeMap<String, f64>,
    #[serde(default)]
    pub expense: BTreeMap<String, f64>,
}

/// Keys of every map are periods (`YYYY-MM`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct AnalyticsReport {
    #[serde(default)]
    pub summary: BTreeMap<String, PeriodTotals>,
    #[serde(default, rename = "categoryBreakdown")]
    pub category_breakdown: BTreeMap<String, CategoryBreakdown>,
    #[serde(default)]
    pub details: BTreeMap<String, Vec<Transaction>>,
}

/// Category filter as the backend understands it (`all` or one name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    #[default]
    All,
    Only(String),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        let value = value.trim();
        if value.is_empty() || value.eq_ignore_ascii_case("all") {
            CategoryFilter::All
        } else {
            CategoryFilter::Only(value.to_string())
        }
    }

    pub fn as_query(&self) -> &str {
        match self {
            CategoryFilter::All => "all",
            CategoryFilter::Only(name) => name,
        }
    }

    pub fn matches(&self, category: &str) -> bool {
        match self {
            CategoryFilter::All => true,
            CategoryFilter::Only(name) => name == category,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthPoint {
    pub label: &'static str,
    pub expense: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryPoint {
    pub category: String,
    pub expense: f64,
}

/// `YYYY-MM` key for a month (1-based).
pub fn month_key(year: i32, month: u32) -> String {
    format!("{}-{:02}", year, month)
}

impl AnalyticsReport {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.details.is_empty()
    }

    /// Income and expense summed over every month of `year`.
    pub fn year_totals(&self, year: i32) -> PeriodTotals {
        let prefix = format!("{}-", year);
        self.summary
            .iter()
            .filter(|(period, _)| period.starts_with(&prefix))
            .fold(PeriodTotals::default(), |acc, (_, totals)| PeriodTotals {
                income: acc.income + totals.income,
                expense: acc.expense + totals.expense,
            })
    }

    pub fn month_totals(&self, period: &str) -> PeriodTotals {
        self.summary.get(period).copied().unwrap_or_default()
    }

    /// Twelve points, January first. With a category filter the per-month
    /// breakdown is used instead of the summary.
    pub fn yearly_expense_series(&self, year: i32, filter: &CategoryFilter) -> Vec<MonthPoint> {
        (1..=12u32)
            .zip(MONTH_LABELS)
            .map(|(month, label)| {
                let key = month_key(year, month);
                let expense = match filter {
                    CategoryFilter::All => self.month_totals(&key).expense,
                    CategoryFilter::Only(name) => self
                        .category_breakdown
                        .get(&key)
                        .and_then(|b| b.expense.get(name))
                        .copied()
                        .unwrap_or_default(),
                };
                MonthPoint { label, expense }
            })
            .collect()
    }

    /// Expense per category for one month.
    pub fn monthly_category_series(&self, period: &str, filter: &CategoryFilter) -> Vec<CategoryPoint> {
        let expenses = self.category_breakdown.get(period).map(|b| &b.expense);
        match filter {
            CategoryFilter::All => expenses
                .into_iter()
                .flatten()
                .map(|(category, amount)| CategoryPoint {
                    category: category.clone(),
                    expense: *amount,
                })
                .collect(),
            CategoryFilter::Only(name) => vec![CategoryPoint {
                category: name.clone(),
                expense: expenses.and_then(|e| e.get(name)).copied().unwrap_or_default(),
            }],
        }
    }

    /// Expense transactions of `year`, newest first.
    pub fn yearly_expenses(&self, year: i32, filter: &CategoryFilter) -> Vec<&Transaction> {
        let prefix = format!("{}-", year);
        let mut expenses: Vec<&Transaction> = self
            .details
            .iter()
            .filter(|(period, _)| period.starts_with(&prefix))
            .flat_map(|(_, txs)| txs.iter())
            .filter(|tx| tx.is_expense() && filter.matches(&tx.category))
            .collect();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        expenses
    }

    /// Expense transactions of one month, newest first.
    pub fn monthly_expenses(&self, period: &str, filter: &CategoryFilter) -> Vec<&Transaction> {
        let mut expenses: Vec<&Transaction> = self
            .details
            .get(period)
            .into_iter()
            .flatten()
            .filter(|tx| tx.is_expense() && filter.matches(&tx.category))
            .collect();
        expenses.sort_by(|a, b| b.date.cmp(&a.date));
        expenses
    }

    /// Every category that has expenses in any month, sorted.
    pub fn expense_categories(&self) -> Vec<String> {
        self.category_breakdown
            .values()
            .flat_map(|b| b.expense.keys().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}
