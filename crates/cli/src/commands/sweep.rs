use voyage_core::config::LoadOptions;
use voyage_workflow::{MarketplaceService, SweepSummary};

use crate::commands::{conclude, migrated_pool, prepare, CommandResult, Prepared};

/// Runs offer expiry and booking completion once against the configured database.
pub fn run(options: &LoadOptions) -> CommandResult {
    let Prepared { config, runtime } = match prepare("sweep", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let outcome = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let service = MarketplaceService::sqlite(pool.clone()).configured(&config.workflow);
        let summary = service.run_sweeps(service.now()).await;
        pool.close().await;
        summary.map_err(|error| ("sweep_execution", error.to_string(), 7u8))
    });

    conclude("sweep", outcome, |summary| summary_message(&summary))
}

fn summary_message(summary: &SweepSummary) -> String {
    let failures = summary.offers_expired.failed + summary.bookings_completed.failed;
    let mut message = format!(
        "{}: expired {} of {} lapsed offers, completed {} of {} finished bookings",
        summary.correlation_id,
        summary.offers_expired.transitioned,
        summary.offers_expired.examined,
        summary.bookings_completed.transitioned,
        summary.bookings_completed.examined,
    );
    if failures > 0 {
        message.push_str(&format!("; {failures} records skipped and left for the next sweep"));
    }
    message
}
