// Cash Compass - Admin CLI
// init / seed / stats / export, for local development and operations

use anyhow::{bail, Context, Result};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use std::env;

use cash_compass::models::category::default_categories;
use cash_compass::{
    auth, budget_performance, category_breakdown, db, export, overview, setup_database,
    Budget, BudgetPeriod, Transaction, TransactionFilter, TransactionKind,
};

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let args: Vec<String> = env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    match command {
        "init" => run_init(),
        "seed" => run_seed(args.get(2).map(String::as_str)),
        "stats" => run_stats(args.get(2).map(String::as_str)),
        "export" => run_export(args.get(2).map(String::as_str), args.get(3).map(String::as_str)),
        _ => {
            println!("Cash Compass v{}", cash_compass::VERSION);
            println!();
            println!("Usage:");
            println!("  cash-compass init                      create the database");
            println!("  cash-compass seed <email>              create a demo user with sample data");
            println!("  cash-compass stats <email>             print a spending overview");
            println!("  cash-compass export <email> <out.csv>  export transactions to CSV");
            println!();
            println!("  compass-server                         run the REST API (server feature)");
            Ok(())
        }
    }
}

fn open_db() -> Result<Connection> {
    let path = cash_compass::database_path();
    let conn = Connection::open(&path).with_context(|| format!("Failed to open database {}", path))?;
    setup_database(&conn)?;
    Ok(conn)
}

fn require_user(conn: &Connection, email: Option<&str>) -> Result<cash_compass::User> {
    let email = match email {
        Some(e) => e,
        None => bail!("Missing <email> argument"),
    };
    match db::get_user_by_email(conn, &email.to_lowercase())? {
        Some(user) => Ok(user),
        None => bail!("No user with email {} - run: cash-compass seed {}", email, email),
    }
}

fn run_init() -> Result<()> {
    let conn = open_db()?;
    drop(conn);
    println!("✓ Database ready at {}", cash_compass::database_path());
    Ok(())
}

fn run_seed(email: Option<&str>) -> Result<()> {
    let email = email.unwrap_or("demo@cashcompass.local");
    let conn = open_db()?;

    if db::get_user_by_email(&conn, email)?.is_some() {
        bail!("User {} already exists", email);
    }

    println!("🌱 Seeding demo data for {}...", email);

    let user = auth::register_user(&conn, email, "demo-password", "Demo User")?;
    println!("✓ User created (password: demo-password)");

    let categories = default_categories(&user.id);
    for category in &categories {
        db::create_category(&conn, category)?;
    }
    println!("✓ {} categories", categories.len());

    let groceries = &categories[1];
    let transport = &categories[2];
    let salary = &categories[7];

    let today = Utc::now().date_naive();
    let mut count = 0;

    // Three months of history: salary plus a steady drip of expenses
    for month_back in 0..3 {
        let payday = cash_compass::periods::month_start(cash_compass::periods::add_months(today, -month_back));
        let tx = Transaction::new(
            user.id.clone(),
            Some(salary.id.clone()),
            TransactionKind::Income,
            3200.0,
            "Salary".to_string(),
            payday,
        );
        db::create_transaction(&conn, &tx)?;
        count += 1;

        for (offset, amount, what, category) in [
            (2, 84.30, "Groceries", groceries),
            (6, 22.00, "Bus pass", transport),
            (9, 61.75, "Groceries", groceries),
            (15, 45.10, "Fuel", transport),
            (21, 92.40, "Groceries", groceries),
        ] {
            let date = payday + Duration::days(offset);
            if date > today {
                continue;
            }
            let tx = Transaction::new(
                user.id.clone(),
                Some(category.id.clone()),
                TransactionKind::Expense,
                amount,
                what.to_string(),
                date,
            );
            db::create_transaction(&conn, &tx)?;
            count += 1;
        }
    }
    println!("✓ {} transactions", count);

    let budget = Budget::new(user.id.clone(), Some(groceries.id.clone()), 250.0, BudgetPeriod::Monthly);
    db::create_budget(&conn, &budget)?;
    let overall = Budget::new(user.id.clone(), None, 600.0, BudgetPeriod::Monthly);
    db::create_budget(&conn, &overall)?;
    println!("✓ 2 budgets");

    println!("\n🎉 Done. Try: cash-compass stats {}", email);
    Ok(())
}

fn run_stats(email: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = require_user(&conn, email)?;

    let transactions = db::list_transactions(&conn, &user.id, &TransactionFilter::default())?;
    let categories = db::list_categories(&conn, &user.id)?;
    let budgets = db::list_budgets(&conn, &user.id)?;
    let today = Utc::now().date_naive();

    let o = overview(&transactions);
    println!("📊 Overview for {}", user.email);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("  Transactions: {}", o.transaction_count);
    println!("  Income:       {:>12.2}", o.income);
    println!("  Expenses:     {:>12.2}", o.expenses);
    println!("  Net:          {:>12.2}", o.net);
    println!("  Savings rate: {:>11.1}%", o.savings_rate * 100.0);

    let breakdown = category_breakdown(&transactions, &categories);
    if !breakdown.is_empty() {
        println!("\n🏷️  By category:");
        for slice in breakdown.iter().take(8) {
            println!("  {:<24} {:>10.2}  ({:.1}%)", slice.category_name, slice.total, slice.percent);
        }
    }

    let reports = budget_performance(&transactions, &budgets, &categories, today);
    if !reports.is_empty() {
        println!("\n🎯 Budgets:");
        for report in &reports {
            println!(
                "  {:<24} {:>8.2} / {:<8.2} ({:.0}%) {:?}",
                report.category_name, report.spent, report.limit, report.percent_used, report.status
            );
        }
    }

    Ok(())
}

fn run_export(email: Option<&str>, out: Option<&str>) -> Result<()> {
    let conn = open_db()?;
    let user = require_user(&conn, email)?;
    let out = out.unwrap_or("transactions.csv");

    let transactions = db::list_transactions(&conn, &user.id, &TransactionFilter::default())?;
    let categories = db::list_categories(&conn, &user.id)?;

    let csv = export::transactions_to_csv(&transactions, &categories)?;
    std::fs::write(out, csv).with_context(|| format!("Failed to write {}", out))?;

    println!("✓ Exported {} transactions to {}", transactions.len(), out);
    Ok(())
}
