//! schoolcache - command line dashboards over the school store.
//!
//! Reads go through the core's query cache; every figure shown is computed
//! by the core's derivation functions.

mod demo;
mod format;

use std::io;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use schoolcache_core::metrics;
use schoolcache_core::models::{Announcement, Attendance, Fee, Grade, Student};
use schoolcache_core::queries::{self, DEFAULT_RECENT_PAYMENTS};
use schoolcache_core::{Config, QueryKey, SchoolClient, StudentDashboard};

use format::{format_date, format_money, format_optional, truncate_string};

const USAGE: &str = "\
Usage: schoolcache [--demo] [--json] <command>

Commands:
  dashboard [student-id]   Student dashboard (defaults to the last student shown)
  unpaid                   Students with pending or overdue fees
  payments [n]             Most recent payments (default 10)

Options:
  --demo    Use built-in sample data instead of the configured store
  --json    Print records as JSON";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

#[derive(Debug, Default)]
struct Options {
    demo: bool,
    json: bool,
    command: Vec<String>,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Options {
    let mut options = Options::default();
    for arg in args {
        match arg.as_str() {
            "--demo" => options.demo = true,
            "--json" => options.json = true,
            _ => options.command.push(arg),
        }
    }
    options
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let options = parse_args(std::env::args().skip(1));
    let mut config = Config::load()?;

    let client = if options.demo {
        info!("Using demo data");
        demo::client()
    } else {
        SchoolClient::from_config(&config)?
    };

    let command: Vec<&str> = options.command.iter().map(String::as_str).collect();
    match command.as_slice() {
        ["dashboard"] => {
            let id = config
                .last_student_id
                .clone()
                .context("No student given and none shown before")?;
            show_dashboard(&client, &id).await?;
        }
        ["dashboard", id] => {
            show_dashboard(&client, id).await?;
            if !options.demo {
                config.last_student_id = Some(id.to_string());
                if let Err(e) = config.save() {
                    warn!(error = %e, "Failed to save config");
                }
            }
        }
        ["unpaid"] => show_unpaid(&client, options.json).await?,
        ["payments"] => show_payments(&client, DEFAULT_RECENT_PAYMENTS, options.json).await?,
        ["payments", n] => {
            let limit: usize = n.parse().with_context(|| format!("Invalid count '{}'", n))?;
            show_payments(&client, limit, options.json).await?;
        }
        ["help"] | [] => println!("{}", USAGE),
        _ => bail!("Unknown command\n\n{}", USAGE),
    }
    Ok(())
}

async fn show_dashboard(client: &SchoolClient, id: &str) -> Result<()> {
    let students_spec = queries::students::all();
    let grades_spec = queries::grades::for_student(id)?;
    let attendance_spec = queries::attendance::for_student(id)?;
    let announcements_spec = queries::announcements::all();

    let (students, grades, attendance, announcements) = tokio::try_join!(
        client.fetch_list::<Student>(&students_spec),
        client.fetch_list::<Grade>(&grades_spec),
        client.fetch_list::<Attendance>(&attendance_spec),
        client.fetch_list::<Announcement>(&announcements_spec),
    )?;

    let student = students
        .iter()
        .find(|s| s.id == id)
        .with_context(|| format!("Student profile not found: {}", id))?;
    let dashboard = StudentDashboard::build(student, &grades, &attendance, &announcements, Utc::now());
    print_dashboard(&dashboard, &fetched_age(client, &grades_spec.key));
    Ok(())
}

/// How long ago the cached data for `key` was fetched, e.g. "5m ago"
fn fetched_age(client: &SchoolClient, key: &QueryKey) -> String {
    client
        .cache()
        .peek(key)
        .map(|entry| entry.age_display())
        .unwrap_or_else(|| "never".to_string())
}

fn print_dashboard(dashboard: &StudentDashboard, fetched: &str) {
    println!("{}", dashboard.full_name);
    println!(
        "{}  |  ID: {}",
        dashboard.class_label,
        format_optional(dashboard.school_id.as_deref(), "-")
    );
    println!();
    println!("  GPA          {}", dashboard.gpa_display());
    println!("  Attendance   {}", dashboard.attendance_display());
    println!(
        "  Fees         {} ({} outstanding)",
        dashboard.fee_status,
        format_money(dashboard.outstanding_balance)
    );
    println!("  Fetched      {}", fetched);

    println!();
    println!("Recent grades");
    if dashboard.recent_grades.is_empty() {
        println!("  No grades yet");
    }
    for line in &dashboard.recent_grades {
        println!(
            "  {:<20} {:>8}  {:>5.1}%  {}",
            truncate_string(&line.subject, 20),
            line.score,
            line.percentage,
            format_date(line.exam_date)
        );
    }

    println!();
    println!("Announcements");
    if dashboard.recent_announcements.is_empty() {
        println!("  No announcements");
    }
    for announcement in &dashboard.recent_announcements {
        println!(
            "  {:<7} {:<30} {}",
            announcement.posted_on().unwrap_or_default(),
            truncate_string(&announcement.title, 30),
            format_optional(announcement.author_name(), "")
        );
    }
}

async fn show_unpaid(client: &SchoolClient, json: bool) -> Result<()> {
    let students: Vec<Student> = client.fetch_list(&queries::students::unpaid_fees()).await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&students)?);
        return Ok(());
    }

    let now = Utc::now();
    println!("{} students with unpaid fees", students.len());
    for student in &students {
        println!(
            "  {:<24} {:<10} {:>12}  {}",
            truncate_string(&student.full_name, 24),
            student.class_label(),
            format_money(metrics::outstanding_balance(student.fees())),
            metrics::fee_status(student.fees(), now)
        );
    }
    Ok(())
}

async fn show_payments(client: &SchoolClient, limit: usize, json: bool) -> Result<()> {
    let payments: Vec<Fee> = client
        .fetch_list(&queries::fees::recent_payments(limit))
        .await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&payments)?);
        return Ok(());
    }

    println!("Recent payments");
    for fee in &payments {
        let student = fee.students.as_deref().map(|s| s.full_name.as_str());
        println!(
            "  {:<14} {:<24} {:>12}  {}",
            format_date(fee.paid_date),
            truncate_string(&format_optional(student, "Unknown"), 24),
            format_money(fee.amount),
            format_optional(fee.description.as_deref(), "")
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_args_flags_anywhere() {
        let options = parse_args(args(&["payments", "--demo", "5", "--json"]));
        assert!(options.demo);
        assert!(options.json);
        assert_eq!(options.command, vec!["payments", "5"]);
    }

    #[tokio::test]
    async fn test_demo_dashboard_figures() {
        let client = demo::client();
        let students: Vec<Student> = client
            .fetch_list(&queries::students::all())
            .await
            .unwrap();
        let ada = students.iter().find(|s| s.id == "s1").unwrap();
        let grades: Vec<Grade> = client
            .fetch_list(&queries::grades::for_student("s1").unwrap())
            .await
            .unwrap();
        let attendance: Vec<Attendance> = client
            .fetch_list(&queries::attendance::for_student("s1").unwrap())
            .await
            .unwrap();

        let dashboard = StudentDashboard::build(ada, &grades, &attendance, &[], Utc::now());
        // (80 + 90 + 88) / 3 = 86% -> 3.44
        assert_eq!(dashboard.gpa, 3.4);
        assert_eq!(dashboard.attendance_display(), "75%");
        assert_eq!(dashboard.fee_status.as_str(), "overdue");
        assert_eq!(dashboard.outstanding_balance, 450.0);
    }

    #[tokio::test]
    async fn test_fetched_age_reflects_cache() {
        let client = demo::client();
        let spec = queries::grades::for_student("s1").unwrap();
        assert_eq!(fetched_age(&client, &spec.key), "never");

        client.fetch(&spec).await.unwrap();
        assert_eq!(fetched_age(&client, &spec.key), "just now");
    }

    #[tokio::test]
    async fn test_demo_unpaid_excludes_fully_paid() {
        let client = demo::client();
        let students: Vec<Student> = client
            .fetch_list(&queries::students::unpaid_fees())
            .await
            .unwrap();
        let ids: Vec<&str> = students.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["s1", "s4", "s3"]);
    }
}
