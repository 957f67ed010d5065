//! Plain-text rendering for command output.

use std::fmt::Write;

use moneytrack_core::models::{
    AnalyticsReport, CategoryFilter, PasswordResetTicket, Transaction, TransactionKind,
};
use moneytrack_core::utils::{format_currency, format_date, format_period, truncate_string};

/// Width of the longest bar in the monthly chart
const BAR_WIDTH: usize = 30;

const CATEGORY_WIDTH: usize = 18;
const DESCRIPTION_WIDTH: usize = 32;

pub fn category_list(kind: TransactionKind, categories: &[String]) -> String {
    let mut out = String::new();
    if categories.is_empty() {
        let _ = writeln!(out, "No {} categories yet.", kind);
        return out;
    }
    let _ = writeln!(out, "{} categories:", capitalize(kind.as_str()));
    for name in categories {
        let _ = writeln!(out, "  {}", name);
    }
    out
}

pub fn reset_ticket(ticket: &PasswordResetTicket) -> String {
    let mut out = String::new();
    if !ticket.message.is_empty() {
        let _ = writeln!(out, "{}", ticket.message);
    }
    if let Some(ref token) = ticket.reset_token {
        let _ = writeln!(out, "Reset token: {}", token);
        let _ = writeln!(out, "Use it with `moneytrack reset-password --token <token>`.");
    }
    out
}

pub fn transaction_detail(tx: &Transaction) -> String {
    let mut out = String::new();
    if let Some(id) = tx.id {
        let _ = writeln!(out, "Transaction #{}", id);
    }
    let _ = writeln!(out, "  Type:        {}", tx.kind);
    let _ = writeln!(out, "  Category:    {}", tx.category);
    let _ = writeln!(out, "  Amount:      {:.2}", tx.amount);
    let _ = writeln!(out, "  Date:        {}", format_date(&tx.date));
    if !tx.description.is_empty() {
        let _ = writeln!(out, "  Description: {}", tx.description);
    }
    out
}

fn expense_rows(out: &mut String, expenses: &[&Transaction], currency: &str) {
    if expenses.is_empty() {
        let _ = writeln!(out, "  No expenses.");
        return;
    }
    for tx in expenses {
        let _ = writeln!(
            out,
            "  {:>6}  {:<12}  {:<cw$}  {:>14}  {}",
            tx.id.map(|id| id.to_string()).unwrap_or_default(),
            format_date(&tx.date),
            truncate_string(&tx.category, CATEGORY_WIDTH),
            format_currency(tx.amount, currency),
            truncate_string(&tx.description, DESCRIPTION_WIDTH),
            cw = CATEGORY_WIDTH,
        );
    }
}

fn bar(value: f64, max: f64) -> String {
    if max <= 0.0 || value <= 0.0 {
        return String::new();
    }
    let len = ((value / max) * BAR_WIDTH as f64).round().max(1.0) as usize;
    "#".repeat(len.min(BAR_WIDTH))
}

pub fn year_report(
    report: &AnalyticsReport,
    year: i32,
    filter: &CategoryFilter,
    currency: &str,
) -> String {
    let mut out = String::new();
    let totals = report.year_totals(year);

    let _ = writeln!(out, "{} overview", year);
    let _ = writeln!(out, "  Income   {:>16}", format_currency(totals.income, currency));
    let _ = writeln!(out, "  Expense  {:>16}", format_currency(totals.expense, currency));
    let _ = writeln!(out, "  Net      {:>16}", format_currency(totals.net(), currency));

    let series = report.yearly_expense_series(year, filter);
    let max = series.iter().map(|p| p.expense).fold(0.0, f64::max);
    let _ = writeln!(out);
    let _ = writeln!(out, "Monthly expenses ({})", filter.as_query());
    for point in &series {
        let _ = writeln!(
            out,
            "  {}  {:>14}  {}",
            point.label,
            format_currency(point.expense, currency),
            bar(point.expense, max)
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Expenses");
    expense_rows(&mut out, &report.yearly_expenses(year, filter), currency);
    out
}

pub fn month_report(
    report: &AnalyticsReport,
    period: &str,
    filter: &CategoryFilter,
    currency: &str,
) -> String {
    let mut out = String::new();
    let totals = report.month_totals(period);

    let _ = writeln!(out, "{} overview", format_period(period));
    let _ = writeln!(out, "  Income   {:>16}", format_currency(totals.income, currency));
    let _ = writeln!(out, "  Expense  {:>16}", format_currency(totals.expense, currency));
    let _ = writeln!(out, "  Net      {:>16}", format_currency(totals.net(), currency));

    let series = report.monthly_category_series(period, filter);
    let max = series.iter().map(|p| p.expense).fold(0.0, f64::max);
    let _ = writeln!(out);
    let _ = writeln!(out, "By category");
    if series.is_empty() {
        let _ = writeln!(out, "  No expenses.");
    }
    for point in &series {
        let _ = writeln!(
            out,
            "  {:<cw$}  {:>14}  {}",
            truncate_string(&point.category, CATEGORY_WIDTH),
            format_currency(point.expense, currency),
            bar(point.expense, max),
            cw = CATEGORY_WIDTH,
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Expenses");
    expense_rows(&mut out, &report.monthly_expenses(period, filter), currency);

    let categories = report.expense_categories();
    if !categories.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "Categories: {}", categories.join(", "));
    }
    out
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
