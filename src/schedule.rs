use std::ops::ControlFlow;
use std::str::FromStr;

use anyhow::{anyhow, bail, Result};
use chrono::{Duration, Local, NaiveDateTime, NaiveTime};
use reqwest::Client;
use rusqlite::Connection;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use crate::db;
use crate::pipeline;
use crate::report;
use crate::settings::{parse_time_of_day, Settings};

/// Fires once a day at a fixed local time of day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scheduler {
    daily_at: NaiveTime,
}

impl Scheduler {
    pub fn new(daily_at: NaiveTime) -> Self {
        Scheduler { daily_at }
    }

    pub fn daily_at(&self) -> NaiveTime {
        self.daily_at
    }

    pub fn set_daily_at(&mut self, daily_at: NaiveTime) {
        self.daily_at = daily_at;
    }

    /// Strictly after `now`: today's slot if still ahead, else tomorrow's.
    pub fn next_trigger(&self, now: NaiveDateTime) -> NaiveDateTime {
        let today = now.date().and_time(self.daily_at);
        if today > now {
            today
        } else {
            today + Duration::days(1)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Run,
    At(NaiveTime),
    List(usize),
    Export,
    Stats,
    Help,
    Stop,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut parts = line.split_whitespace();
        let cmd = parts.next().unwrap_or("").to_lowercase();
        let arg = parts.next();
        let command = match cmd.as_str() {
            "run" => Command::Run,
            "at" | "time" => {
                let arg = arg.ok_or_else(|| anyhow!("usage: at HH:MM"))?;
                Command::At(parse_time_of_day(arg).map_err(|e| anyhow!("bad time '{}': {}", arg, e))?)
            }
            "list" | "ls" => match arg {
                Some(n) => Command::List(n.parse().map_err(|_| anyhow!("bad count '{}'", n))?),
                None => Command::List(DEFAULT_LIST_LIMIT),
            },
            "export" => Command::Export,
            "stats" => Command::Stats,
            "help" | "?" => Command::Help,
            "stop" | "quit" | "exit" | "q" => Command::Stop,
            "" => bail!("empty command"),
            other => bail!("unknown command '{}'", other),
        };
        Ok(command)
    }
}

pub const DEFAULT_LIST_LIMIT: usize = 20;

const HELP: &str = "Commands:
  run          scrape now
  at HH:MM     change the daily trigger time
  list [n]     show the n most recent export rows
  export       rewrite the export file from history
  stats        history statistics
  stop         leave watch mode";

/// Wait for the daily trigger or a typed command, whichever comes first.
/// Cycles are awaited in place, so two never overlap.
pub async fn watch(
    client: &Client,
    conn: &Connection,
    settings: &Settings,
    mut scheduler: Scheduler,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    println!("{}", HELP);

    loop {
        let now = Local::now().naive_local();
        let next = scheduler.next_trigger(now);
        let wait = (next - now).to_std().unwrap_or_default();
        info!("Next cycle at {}", next.format("%Y-%m-%d %H:%M:%S"));

        tokio::select! {
            _ = tokio::time::sleep(wait) => {
                info!("Daily trigger fired");
                let result = pipeline::run_cycle(client, conn, settings).await;
                report::print_cycle(&result);
            }
            line = lines.next_line(), if stdin_open => {
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        info!("stdin closed; running on schedule only");
                        stdin_open = false;
                        continue;
                    }
                    Err(e) => {
                        warn!("stdin read failed: {}", e);
                        stdin_open = false;
                        continue;
                    }
                };
                if line.trim().is_empty() {
                    continue;
                }
                match line.parse::<Command>() {
                    Ok(cmd) => {
                        if handle(cmd, client, conn, settings, &mut scheduler).await.is_break() {
                            break;
                        }
                    }
                    Err(e) => println!("{} (type 'help')", e),
                }
            }
        }
    }

    println!("Stopped.");
    Ok(())
}

/// Run one typed command. `Break` means leave watch mode.
async fn handle(
    cmd: Command,
    client: &Client,
    conn: &Connection,
    settings: &Settings,
    scheduler: &mut Scheduler,
) -> ControlFlow<()> {
    match cmd {
        Command::Run => {
            let result = pipeline::run_cycle(client, conn, settings).await;
            report::print_cycle(&result);
        }
        Command::At(t) => {
            scheduler.set_daily_at(t);
            println!("Daily trigger set to {}", t.format("%H:%M"));
        }
        Command::List(n) => match pipeline::recent_rows(conn, n) {
            Ok(rows) => report::print_rows(&rows),
            Err(e) => println!("List failed: {}", e),
        },
        Command::Export => match pipeline::re_export(conn, &settings.export_path) {
            Ok(0) => println!("No history to export."),
            Ok(n) => println!("Exported {} rows to {}", n, settings.export_path.display()),
            Err(e) => println!("Export failed: {}", e),
        },
        Command::Stats => match db::get_stats(conn) {
            Ok(s) => report::print_stats(&s),
            Err(e) => println!("Stats failed: {}", e),
        },
        Command::Help => println!("{}", HELP),
        Command::Stop => return ControlFlow::Break(()),
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn on(day: u32, h: u32, m: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 3, day).unwrap().and_time(t(h, m))
    }

    #[test]
    fn next_trigger_later_today() {
        assert_eq!(Scheduler::new(t(9, 0)).next_trigger(on(15, 8, 59)), on(15, 9, 0));
    }

    #[test]
    fn next_trigger_rolls_to_tomorrow() {
        let s = Scheduler::new(t(9, 0));
        assert_eq!(s.next_trigger(on(15, 9, 0)), on(16, 9, 0));
        assert_eq!(s.next_trigger(on(15, 23, 0)), on(16, 9, 0));
    }

    #[test]
    fn changing_time_moves_trigger() {
        let mut s = Scheduler::new(t(9, 0));
        s.set_daily_at(t(18, 30));
        assert_eq!(s.daily_at(), t(18, 30));
        assert_eq!(s.next_trigger(on(15, 10, 0)), on(15, 18, 30));
    }

    #[tokio::test]
    async fn stop_ends_watch_and_others_continue() {
        let conn = db::memory();
        let dir = std::env::temp_dir().join(format!("gold_price_schedule_{}", std::process::id()));
        let settings = crate::settings::for_tests("http://127.0.0.1:9/", &dir);
        let client = Client::new();
        let mut scheduler = Scheduler::new(t(9, 0));

        let flow = handle(Command::At(t(18, 30)), &client, &conn, &settings, &mut scheduler).await;
        assert!(flow.is_continue());
        assert_eq!(scheduler.daily_at(), t(18, 30));

        let flow = handle(Command::Stats, &client, &conn, &settings, &mut scheduler).await;
        assert!(flow.is_continue());

        let flow = handle(Command::Stop, &client, &conn, &settings, &mut scheduler).await;
        assert!(flow.is_break());
    }

    #[test]
    fn parse_commands() {
        assert_eq!("run".parse::<Command>().unwrap(), Command::Run);
        assert_eq!(" AT 07:15 ".parse::<Command>().unwrap(), Command::At(t(7, 15)));
        assert_eq!("list".parse::<Command>().unwrap(), Command::List(DEFAULT_LIST_LIMIT));
        assert_eq!("list 5".parse::<Command>().unwrap(), Command::List(5));
        assert_eq!("quit".parse::<Command>().unwrap(), Command::Stop);
        assert!("at".parse::<Command>().is_err());
        assert!("at 7pm".parse::<Command>().is_err());
        assert!("list many".parse::<Command>().is_err());
        assert!("dance".parse::<Command>().is_err());
    }
}
