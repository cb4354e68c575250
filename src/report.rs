use crate::db::Stats;
use crate::error::CycleError;
use crate::export::TIMESTAMP_FORMAT;
use crate::pipeline::CycleResult;
use crate::reconcile::ExportRow;

pub fn print_cycle(result: &Result<CycleResult, CycleError>) {
    match result {
        Ok(r) if r.records_extracted == 0 => {
            println!("No price data on the page this cycle.");
        }
        Ok(r) => println!(
            "Extracted {} records, persisted {}, exported {} rows.",
            r.records_extracted, r.records_persisted, r.export_row_count
        ),
        Err(e) => {
            println!("Cycle failed [{}]: {}", e.kind(), e);
            match e {
                CycleError::Fetch(_) => println!("Check the network or whether the site is reachable; the next cycle will retry."),
                CycleError::Parse(_) => println!("The page layout may have changed."),
                CycleError::Persistence(_) => println!("This cycle's records were not saved."),
                CycleError::Export(_) => println!("History is intact; run 'export' to retry."),
            }
        }
    }
}

pub fn print_rows(rows: &[ExportRow]) {
    if rows.is_empty() {
        println!("No history yet.");
        return;
    }

    println!(
        "{:>3} | {:<24} | {:>10} | {:<8} | {:<6} | {:<12} | {:<19}",
        "#", "Name", "Price", "Unit", "Purity", "Updated", "Scraped"
    );
    println!("{}", "-".repeat(100));

    for (i, r) in rows.iter().enumerate() {
        println!(
            "{:>3} | {:<24} | {:>10} | {:<8} | {:<6} | {:<12} | {:<19}",
            i + 1,
            truncate(&r.name, 24),
            truncate(&r.latest_price, 10),
            truncate(&r.unit, 8),
            truncate(&r.purity, 6),
            truncate(&r.update_date, 12),
            r.scraped_at.format(TIMESTAMP_FORMAT),
        );
    }
    println!("\n{} rows", rows.len());
}

pub fn print_stats(s: &Stats) {
    println!("Records:  {}", s.records);
    println!("Items:    {}", s.distinct_items);
    println!("Cycles:   {}", s.cycles);
    println!(
        "Last run: {}",
        s.last_scraped_at
            .map(|t| t.format(TIMESTAMP_FORMAT).to_string())
            .unwrap_or_else(|| "-".into())
    );
}

pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

pub fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
