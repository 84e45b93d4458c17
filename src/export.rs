// 📤 Export - CSV and JSON renditions of a user's transactions

use std::collections::HashMap;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::models::{Category, Transaction};

/// Flat record written to exports; category resolved to its display name
#[derive(Debug, Serialize)]
pub struct ExportRow {
    pub date: String,
    pub description: String,
    pub kind: String,
    pub amount: f64,
    pub category: String,
    pub notes: String,
}

fn export_rows(transactions: &[Transaction], categories: &[Category]) -> Vec<ExportRow> {
    let names: HashMap<&str, &str> = categories.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();

    transactions
        .iter()
        .map(|tx| ExportRow {
            date: tx.date.to_string(),
            description: tx.description.clone(),
            kind: tx.kind.as_str().to_string(),
            amount: tx.amount,
            category: tx
                .category_id
                .as_deref()
                .and_then(|id| names.get(id).copied())
                .unwrap_or("")
                .to_string(),
            notes: tx.notes.clone().unwrap_or_default(),
        })
        .collect()
}

/// Render transactions as CSV with a stable header row
pub fn transactions_to_csv(transactions: &[Transaction], categories: &[Category]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());

    for row in export_rows(transactions, categories) {
        writer.serialize(row).context("Failed to write CSV row")?;
    }

    let bytes = writer.into_inner().context("Failed to flush CSV")?;
    String::from_utf8(bytes).context("CSV output was not UTF-8")
}

/// Render transactions as a JSON array
pub fn transactions_to_json(transactions: &[Transaction], categories: &[Category]) -> Result<String> {
    serde_json::to_string_pretty(&export_rows(transactions, categories))
        .context("Failed to serialize transactions")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{CategoryKind, TransactionKind};
    use chrono::NaiveDate;

    fn fixtures() -> (Vec<Transaction>, Vec<Category>) {
        let mut cat = Category::new("u1".to_string(), "Food".to_string(), CategoryKind::Expense);
        cat.id = "c1".to_string();

        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        let t1 = Transaction::new(
            "u1".to_string(),
            Some("c1".to_string()),
            TransactionKind::Expense,
            12.5,
            "Lunch".to_string(),
            date,
        )
        .with_notes("with team".to_string());
        let t2 = Transaction::new(
            "u1".to_string(),
            None,
            TransactionKind::Income,
            1000.0,
            "Salary".to_string(),
            date,
        );

        (vec![t1, t2], vec![cat])
    }

    #[test]
    fn test_csv_header_and_rows() {
        let (txs, cats) = fixtures();
        let csv = transactions_to_csv(&txs, &cats).unwrap();

        let lines: Vec<&str> = csv.trim_end().lines().collect();
        assert_eq!(lines.len(), 3); // header + 2 rows
        assert_eq!(lines[0], "date,description,kind,amount,category,notes");
        assert!(lines[1].contains("Lunch"));
        assert!(lines[1].contains("Food"));
        assert!(lines[2].contains("Salary"));
    }

    #[test]
    fn test_json_resolves_category_names() {
        let (txs, cats) = fixtures();
        let json = transactions_to_json(&txs, &cats).unwrap();
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed.as_array().unwrap().len(), 2);
        assert_eq!(parsed[0]["category"], "Food");
        assert_eq!(parsed[1]["category"], "");
        assert_eq!(parsed[1]["amount"], 1000.0);
    }
}
