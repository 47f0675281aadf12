//! report-runner: headless recurring-metrics report builder.
//!
//! Usage:
//!   report-runner --db metrics.db --months 12
//!   report-runner --seed 12345 --customers 200 --months 6 --json
//!   report-runner --db metrics.db --config report.json --rebuild

mod seed;

use anyhow::Result;
use chrono::Utc;
use recurring_metrics_core::{
    clock::SystemClock,
    config::ReportConfig,
    report::{Collaborators, Report, ReportBuilder},
    store::MetricsStore,
};
use rust_decimal::Decimal;
use std::env;

const DEFAULT_STORAGE_KEY: &str = "recurring_metrics_report";

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let db = flag_value(&args, "--db").unwrap_or(":memory:");
    let seed = flag_value(&args, "--seed").and_then(|s| s.parse::<u64>().ok());
    let customers = parse_arg(&args, "--customers", 100usize);
    let json = args.iter().any(|a| a == "--json");

    let mut config = match flag_value(&args, "--config") {
        Some(path) => ReportConfig::load(path)?,
        None => ReportConfig {
            storage_key: Some(DEFAULT_STORAGE_KEY.to_string()),
            ..ReportConfig::default()
        },
    };
    config.months = parse_arg(&args, "--months", config.months);
    if args.iter().any(|a| a == "--rebuild") {
        config.rebuild_data = true;
    }

    if !json {
        println!("report-runner");
        println!("  db:        {db}");
        println!("  months:    {}", config.months);
        println!("  cache key: {}", config.storage_key().unwrap_or("(none)"));
        println!("  rebuild:   {}", config.rebuild_forced());
        println!();
    }

    let store = MetricsStore::open(db)?;
    store.migrate()?;

    if let Some(seed) = seed {
        if store.subscription_count()? == 0 && store.license_count()? == 0 {
            let population = seed::Population::generate(seed, customers, Utc::now());
            population.write(&store)?;
            log::info!(
                "seeded {} subscription(s) and {} license(s) with seed {seed}",
                population.subscriptions.len(),
                population.licenses.len()
            );
        } else {
            log::warn!("database already holds records, ignoring --seed {seed}");
        }
    }

    let rates = store.rate_provider(&config.default_currency)?;
    let clock = SystemClock;
    let mut builder = ReportBuilder::new(
        config,
        Collaborators::from_store(&store, rates.as_ref(), &clock),
    )?;
    let report = builder.build()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }
    Ok(())
}

fn print_summary(report: &Report) {
    if report.is_empty() {
        println!("  (No months reported)");
        return;
    }

    println!("=== SUBSCRIPTIONS ===");
    println!("  month   | cust start   new  lost   end  churn% |  mrr start       new      lost       end  churn%");
    for (month, m) in report {
        match &m.sub {
            Ok(s) => println!(
                "  {month} | {:>10} {:>5} {:>5} {:>5} {:>7} | {:>10} {:>9} {:>9} {:>9} {:>7}",
                s.customers.customers_active_start,
                s.customers.customers_new,
                s.customers.customers_lost,
                s.customers.customers_active_end,
                pct(s.customers.customers_churn_rate),
                s.mrr_start,
                s.mrr_new,
                s.mrr_lost,
                s.mrr_end,
                pct(s.mrr_churn),
            ),
            Err(e) => println!("  {month} | unavailable: {e}"),
        }
    }

    println!();
    println!("=== LICENSES ===");
    println!("  month   | cust start   new  lost   end  churn% |  lic start   new  lost   end  churn%");
    for (month, m) in report {
        let l = &m.lic;
        println!(
            "  {month} | {:>10} {:>5} {:>5} {:>5} {:>7} | {:>10} {:>5} {:>5} {:>5} {:>7}",
            l.customers.customers_active_start,
            l.customers.customers_new,
            l.customers.customers_lost,
            l.customers.customers_active_end,
            pct(l.customers.customers_churn_rate),
            l.licenses_start,
            l.licenses_new,
            l.licenses_lost,
            l.licenses_end,
            pct(l.licenses_churn),
        );
    }
}

fn pct(rate: Option<Decimal>) -> String {
    rate.map(|r| r.to_string()).unwrap_or_else(|| "n/a".to_string())
}

fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    flag_value(args, flag)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
