//! Colorful console output for solver manager events.
//!
//! Provides a custom `tracing` layer that renders job lifecycle events
//! emitted by `jobforge-manager`, one line per event.
//!
//! ## Log Levels
//!
//! - **INFO**: Manager and job lifecycle (submitted, started, stopped, shutdown)
//! - **DEBUG**: Best solution changes
//! - **WARN/ERROR**: Rejected regressions, failed jobs, shutdown timeouts

use num_format::{Locale, ToFormattedString};
use owo_colors::OwoColorize;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::Context;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

static INIT: OnceLock<()> = OnceLock::new();
static EPOCH: OnceLock<Instant> = OnceLock::new();

/// Package version for banner display.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default filter directive when `RUST_LOG` is unset.
pub const DEFAULT_DIRECTIVE: &str = "jobforge_manager=info";

/// Initializes the console output.
///
/// Safe to call multiple times - only the first call has effect.
/// Prints the banner and installs an `EnvFilter` plus [`JobConsoleLayer`].
pub fn init() {
    INIT.get_or_init(|| {
        EPOCH.get_or_init(Instant::now);
        print_banner();

        let default_directive = DEFAULT_DIRECTIVE
            .parse::<Directive>()
            .unwrap_or_else(|_| Level::INFO.into());
        let filter = EnvFilter::builder()
            .with_default_directive(default_directive)
            .from_env_lossy();

        let _ = tracing_subscriber::registry()
            .with(filter)
            .with(JobConsoleLayer)
            .try_init();
    });
}

// Returns elapsed time since init.
fn elapsed_secs() -> f64 {
    EPOCH.get().map_or(0.0, |epoch| epoch.elapsed().as_secs_f64())
}

fn print_banner() {
    let banner = r#"
     _       _     _____
    | | ___ | |__ |  ___|__  _ __ __ _  ___
 _  | |/ _ \| '_ \| |_ / _ \| '__/ _` |/ _ \
| |_| | (_) | |_) |  _| (_) | | | (_| |  __/
 \___/ \___/|_.__/|_|  \___/|_|  \__, |\___|
                                 |___/
"#;

    let version_line = format!("              v{} - Concurrent Solver Jobs\n", VERSION);

    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{}", banner.bright_cyan());
    let _ = writeln!(stdout, "{}", version_line.bright_white().bold());
    let _ = stdout.flush();
}

/// A tracing layer that formats solver manager events with colors.
pub struct JobConsoleLayer;

impl<S: Subscriber> Layer<S> for JobConsoleLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        if !metadata.target().starts_with("jobforge") {
            return;
        }

        let mut visitor = EventVisitor::default();
        event.record(&mut visitor);

        let output = format_event(&visitor, *metadata.level());
        if !output.is_empty() {
            let _ = writeln!(io::stdout(), "{}", output);
        }
    }
}

#[derive(Default)]
struct EventVisitor {
    event: Option<String>,
    problem_id: Option<String>,
    unit: Option<String>,
    score: Option<String>,
    message: Option<String>,
    best: Option<String>,
    candidate: Option<String>,
    callback: Option<String>,
    pool: Option<String>,
    solving_threads: Option<u64>,
    listeners: Option<u64>,
    queued: Option<u64>,
    queued_ms: Option<u64>,
    improvements: Option<u64>,
    duration_ms: Option<u64>,
    active_jobs: Option<u64>,
    grace_ms: Option<u64>,
    in_flight: Option<u64>,
    jobs: Option<u64>,
    terminated_early: Option<bool>,
    started: Option<bool>,
}

impl EventVisitor {
    fn record_text(&mut self, name: &str, value: String) {
        match name {
            "event" => self.event = Some(value),
            "problem_id" => self.problem_id = Some(value),
            "unit" => self.unit = Some(value),
            "score" => self.score = Some(value),
            "message" => self.message = Some(value),
            "best" => self.best = Some(value),
            "candidate" => self.candidate = Some(value),
            "callback" => self.callback = Some(value),
            "pool" => self.pool = Some(value),
            _ => {}
        }
    }
}

impl Visit for EventVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        let s = format!("{:?}", value);
        self.record_text(field.name(), s.trim_matches('"').to_string());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.record_text(field.name(), value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "solving_threads" => self.solving_threads = Some(value),
            "listeners" => self.listeners = Some(value),
            "queued" => self.queued = Some(value),
            "queued_ms" => self.queued_ms = Some(value),
            "improvements" => self.improvements = Some(value),
            "duration_ms" => self.duration_ms = Some(value),
            "active_jobs" => self.active_jobs = Some(value),
            "grace_ms" => self.grace_ms = Some(value),
            "in_flight" => self.in_flight = Some(value),
            "jobs" => self.jobs = Some(value),
            _ => {}
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.record_u64(field, value.max(0) as u64);
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        match field.name() {
            "terminated_early" => self.terminated_early = Some(value),
            "started" => self.started = Some(value),
            _ => {}
        }
    }
}

fn format_event(v: &EventVisitor, level: Level) -> String {
    let event = v.event.as_deref().unwrap_or("");

    match event {
        "manager_start" => format_manager_start(v),
        "job_submitted" => format_job_submitted(v),
        "job_started" => format_job_started(v),
        "job_skipped" => format_job_skipped(v),
        "best_solution_changed" => format_best_solution(v),
        "stop_requested" => format_stop_requested(v),
        "job_stopped" => format_job_stopped(v),
        "job_failed" => format_job_failed(v),
        "job_evicted" => format_line("⌫".bright_black().to_string(), v, "evicted".to_string()),
        "shutdown_start" => format_shutdown_start(v),
        "shutdown_timeout" => format_shutdown_timeout(v),
        "shutdown_end" => format_shutdown_end(v),
        _ if level <= Level::WARN => format_problem(v, level),
        _ => String::new(),
    }
}

fn format_elapsed() -> String {
    format!("{:>7.3}s", elapsed_secs())
        .bright_black()
        .to_string()
}

fn format_count(n: u64) -> String {
    n.to_formatted_string(&Locale::en)
}

fn problem_label(v: &EventVisitor) -> String {
    v.problem_id
        .as_deref()
        .unwrap_or("?")
        .bright_white()
        .bold()
        .to_string()
}

// Common "<elapsed> <icon> <problem> │ <detail>" line.
fn format_line(icon: String, v: &EventVisitor, detail: String) -> String {
    format!(
        "{} {} {} │ {}",
        format_elapsed(),
        icon,
        problem_label(v),
        detail
    )
}

fn format_manager_start(v: &EventVisitor) -> String {
    let threads = v.solving_threads.unwrap_or(0);
    let grace = v.grace_ms.unwrap_or(0);
    format!(
        "{} {} Solver manager │ {} solving threads │ {} grace",
        format_elapsed(),
        "●".bright_green().bold(),
        format_count(threads).bright_yellow(),
        format_duration_ms(grace).yellow()
    )
}

fn format_job_submitted(v: &EventVisitor) -> String {
    let mut detail = "submitted".to_string();
    if let Some(listeners) = v.listeners.filter(|n| *n > 0) {
        detail.push_str(&format!(" │ {} listeners", format_count(listeners)));
    }
    if let Some(queued) = v.queued {
        detail.push_str(&format!(" │ {} in flight", format_count(queued).bright_yellow()));
    }
    format_line("+".bright_blue().to_string(), v, detail)
}

fn format_job_started(v: &EventVisitor) -> String {
    let unit = v.unit.as_deref().unwrap_or("SolvingUnit");
    let waited = v.queued_ms.unwrap_or(0);
    format_line(
        "▶".bright_green().bold().to_string(),
        v,
        format!(
            "{} started │ queued {}",
            unit.white().bold(),
            format_duration_ms(waited).yellow()
        ),
    )
}

fn format_job_skipped(v: &EventVisitor) -> String {
    format_line(
        "↷".bright_black().to_string(),
        v,
        "stopped before start".bright_black().to_string(),
    )
}

fn format_best_solution(v: &EventVisitor) -> String {
    let improvements = v.improvements.unwrap_or(0);
    let score = v.score.as_deref().unwrap_or("N/A");
    format_line(
        "⚡".bright_cyan().to_string(),
        v,
        format!(
            "#{:>8} │ {}",
            format_count(improvements).white(),
            format_score(score)
        ),
    )
}

fn format_stop_requested(v: &EventVisitor) -> String {
    let detail = if v.started.unwrap_or(false) {
        "terminating early"
    } else {
        "terminating before start"
    };
    format_line("■".yellow().to_string(), v, detail.yellow().to_string())
}

fn format_job_stopped(v: &EventVisitor) -> String {
    let duration = v.duration_ms.unwrap_or(0);
    let improvements = v.improvements.unwrap_or(0);
    let score = v.score.as_deref().unwrap_or("N/A");
    let how = if v.terminated_early.unwrap_or(false) {
        "terminated early".yellow().to_string()
    } else {
        "finished".bright_green().to_string()
    };
    format_line(
        "◀".bright_cyan().bold().to_string(),
        v,
        format!(
            "{} │ {} │ {} improvements │ {}",
            how,
            format_duration_ms(duration).yellow(),
            format_count(improvements).white(),
            format_score(score)
        ),
    )
}

fn format_job_failed(v: &EventVisitor) -> String {
    let duration = v.duration_ms.unwrap_or(0);
    let message = v.message.as_deref().unwrap_or("unknown fault");
    format_line(
        "✗".bright_red().bold().to_string(),
        v,
        format!(
            "{} after {}",
            message.bright_red(),
            format_duration_ms(duration).yellow()
        ),
    )
}

fn format_shutdown_start(v: &EventVisitor) -> String {
    let active = v.active_jobs.unwrap_or(0);
    let grace = v.grace_ms.unwrap_or(0);
    format!(
        "{} {} Shutting down │ {} active jobs │ {} grace",
        format_elapsed(),
        "▼".bright_magenta().bold(),
        format_count(active).bright_yellow(),
        format_duration_ms(grace).yellow()
    )
}

fn format_shutdown_timeout(v: &EventVisitor) -> String {
    let grace = v.grace_ms.unwrap_or(0);
    let in_flight = v.in_flight.unwrap_or(0);
    format!(
        "{} {} Shutdown grace of {} elapsed │ {} jobs still running",
        format_elapsed(),
        "!".bright_red().bold(),
        format_duration_ms(grace).yellow(),
        format_count(in_flight).bright_red()
    )
}

fn format_shutdown_end(v: &EventVisitor) -> String {
    let jobs = v.jobs.unwrap_or(0);
    format!(
        "{} {} Shut down │ {} jobs retained",
        format_elapsed(),
        "●".bright_magenta().bold(),
        format_count(jobs).bright_yellow()
    )
}

// Warnings and errors without a dedicated layout.
fn format_problem(v: &EventVisitor, level: Level) -> String {
    let event = v.event.as_deref().unwrap_or("event");
    let mut detail = event.to_string();
    if let (Some(best), Some(candidate)) = (&v.best, &v.candidate) {
        detail.push_str(&format!(" │ {} < {}", format_score(candidate), format_score(best)));
    }
    if let Some(callback) = &v.callback {
        detail.push_str(&format!(" │ {}", callback));
    }
    if let Some(pool) = &v.pool {
        detail.push_str(&format!(" │ {} pool", pool));
    }
    if let Some(message) = &v.message {
        detail.push_str(&format!(" │ {}", message));
    }
    let icon = if level == Level::ERROR {
        "✗".bright_red().bold().to_string()
    } else {
        "!".yellow().bold().to_string()
    };
    format_line(icon, v, detail)
}

fn format_duration_ms(ms: u64) -> String {
    if ms < 1000 {
        format!("{}ms", ms)
    } else if ms < 60_000 {
        format!("{:.2}s", ms as f64 / 1000.0)
    } else {
        let mins = ms / 60_000;
        let secs = (ms % 60_000) / 1000;
        format!("{}m {}s", mins, secs)
    }
}

fn format_score(score: &str) -> String {
    if score.contains("hard") {
        let parts: Vec<&str> = score.split('/').collect();
        if parts.len() == 2 {
            let hard = parts[0].trim_end_matches("hard");
            let soft = parts[1].trim_end_matches("soft");

            let hard_num: i64 = hard.parse().unwrap_or(0);
            let soft_num: i64 = soft.parse().unwrap_or(0);

            let hard_str = if hard_num < 0 {
                format!("{}hard", hard).bright_red().to_string()
            } else {
                format!("{}hard", hard).bright_green().to_string()
            };

            let soft_str = if soft_num < 0 {
                format!("{}soft", soft).yellow().to_string()
            } else if soft_num > 0 {
                format!("{}soft", soft).bright_green().to_string()
            } else {
                format!("{}soft", soft).white().to_string()
            };

            return format!("{}/{}", hard_str, soft_str);
        }
    }

    if let Ok(n) = score.parse::<i64>() {
        if n < 0 {
            return score.bright_red().to_string();
        } else if n > 0 {
            return score.bright_green().to_string();
        }
    }

    score.white().to_string()
}
