use chrono::Utc;
use serde::Serialize;
use voyage_core::config::{AppConfig, LoadOptions};
use voyage_db::repositories::{
    BookingRepository, OfferRepository, SqlBookingRepository, SqlOfferRepository,
};
use voyage_db::{connect_with_config, migrations, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

impl DoctorCheck {
    fn pass(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Pass, details: details.into() }
    }

    fn fail(name: &'static str, details: impl Into<String>) -> Self {
        Self { name, status: CheckStatus::Fail, details: details.into() }
    }

    fn skipped(name: &'static str, reason: &str) -> Self {
        Self { name, status: CheckStatus::Skipped, details: format!("skipped because {reason}") }
    }
}

const DATABASE_CHECKS: [&str; 3] = ["database_connectivity", "schema_migrations", "sweep_backlog"];

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let failing = checks.iter().filter(|check| check.status != CheckStatus::Pass).count();
        let (overall_status, summary) = if failing == 0 {
            (CheckStatus::Pass, "doctor: all readiness checks passed".to_string())
        } else {
            let summary = format!("doctor: {failing} of {} checks did not pass", checks.len());
            (CheckStatus::Fail, summary)
        };
        Self { overall_status, summary, checks }
    }

    fn render(&self) -> String {
        let mut lines = vec![self.summary.clone()];
        lines.extend(self.checks.iter().map(|check| {
            let marker = match check.status {
                CheckStatus::Pass => "ok",
                CheckStatus::Fail => "fail",
                CheckStatus::Skipped => "skip",
            };
            format!("- [{marker}] {}: {}", check.name, check.details)
        }));
        lines.join("\n")
    }
}

pub fn run(options: &LoadOptions, json_output: bool) -> String {
    let report = DoctorReport::from_checks(collect_checks(options));

    if !json_output {
        return report.render();
    }
    serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
        serde_json::json!({
            "overall_status": "fail",
            "summary": "doctor serialization failed",
            "error": error.to_string(),
        })
        .to_string()
    })
}

fn collect_checks(options: &LoadOptions) -> Vec<DoctorCheck> {
    let config = match AppConfig::load(options.clone()) {
        Ok(config) => config,
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail("config_validation", error.to_string())];
            checks.extend(
                DATABASE_CHECKS
                    .iter()
                    .map(|&name| DoctorCheck::skipped(name, "configuration did not load")),
            );
            return checks;
        }
    };

    let mut checks =
        vec![DoctorCheck::pass("config_validation", "configuration loaded and validated")];
    match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => checks.extend(runtime.block_on(database_checks(&config))),
        Err(error) => {
            checks.push(DoctorCheck::fail(
                "database_connectivity",
                format!("failed to initialize async runtime: {error}"),
            ));
            checks.extend(
                DATABASE_CHECKS[1..]
                    .iter()
                    .map(|&name| DoctorCheck::skipped(name, "no async runtime")),
            );
        }
    }
    checks
}

async fn database_checks(config: &AppConfig) -> Vec<DoctorCheck> {
    let pool = match connect_with_config(&config.database).await {
        Ok(pool) => pool,
        Err(error) => {
            let mut checks = vec![DoctorCheck::fail(
                "database_connectivity",
                format!("failed to connect to database: {error}"),
            )];
            checks.extend(
                DATABASE_CHECKS[1..]
                    .iter()
                    .map(|&name| DoctorCheck::skipped(name, "the database is unreachable")),
            );
            return checks;
        }
    };

    let mut checks = vec![DoctorCheck::pass(
        "database_connectivity",
        format!("connected using `{}`", config.database.url),
    )];
    let schema = schema_check(&pool).await;
    let migrated = schema.status == CheckStatus::Pass;
    checks.push(schema);
    checks.push(if migrated {
        backlog_check(&pool).await
    } else {
        DoctorCheck::skipped("sweep_backlog", "the schema is not current")
    });

    pool.close().await;
    checks
}

async fn schema_check(pool: &DbPool) -> DoctorCheck {
    match migrations::schema_status(pool).await {
        Ok(schema) if schema.is_current() => DoctorCheck::pass(
            "schema_migrations",
            format!("{} of {} migrations applied", schema.applied, schema.expected),
        ),
        Ok(schema) => DoctorCheck::fail(
            "schema_migrations",
            format!(
                "{} of {} migrations applied; run `voyage migrate`",
                schema.applied, schema.expected
            ),
        ),
        Err(_) => DoctorCheck::fail(
            "schema_migrations",
            "schema is not initialized; run `voyage migrate`",
        ),
    }
}

/// Records the sweeps would transition right now. A backlog is reported, not failed:
/// the server's scheduler drains it on its next tick.
async fn backlog_check(pool: &DbPool) -> DoctorCheck {
    let now = Utc::now();
    let lapsed = SqlOfferRepository::new(pool.clone()).list_lapsed(now).await;
    let finished =
        SqlBookingRepository::new(pool.clone()).list_due_for_completion(now.date_naive()).await;

    match (lapsed, finished) {
        (Ok(lapsed), Ok(finished)) if lapsed.is_empty() && finished.is_empty() => {
            DoctorCheck::pass("sweep_backlog", "no lapsed offers or finished bookings")
        }
        (Ok(lapsed), Ok(finished)) => DoctorCheck::pass(
            "sweep_backlog",
            format!(
                "{} lapsed offers and {} finished bookings await `voyage sweep`",
                lapsed.len(),
                finished.len()
            ),
        ),
        (Err(error), _) | (_, Err(error)) => {
            DoctorCheck::fail("sweep_backlog", format!("backlog query failed: {error}"))
        }
    }
}
