use voyage_core::clock::{Clock, SystemClock};
use voyage_core::config::LoadOptions;
use voyage_db::repositories::SqlHotelRepository;
use voyage_db::{DemoCatalog, HotelSeedInfo};

use crate::commands::{conclude, migrated_pool, prepare, CommandResult, Prepared, StepFailure};

pub fn run(options: &LoadOptions) -> CommandResult {
    let Prepared { config, runtime } = match prepare("seed", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let outcome = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        let loaded = seed_catalog(&SqlHotelRepository::new(pool.clone())).await;
        pool.close().await;
        loaded
    });

    conclude("seed", outcome, |hotels| success_message(&hotels))
}

async fn seed_catalog(hotels: &SqlHotelRepository) -> Result<Vec<HotelSeedInfo>, StepFailure> {
    let seeded = DemoCatalog::load(hotels, SystemClock.now())
        .await
        .map_err(|error| ("seed_execution", error.to_string(), 5u8))?;
    let verification = DemoCatalog::verify(hotels)
        .await
        .map_err(|error| ("seed_verification", error.to_string(), 6u8))?;

    if verification.all_present {
        return Ok(seeded.hotels_seeded);
    }
    let failed = verification
        .checks
        .iter()
        .filter_map(|(check, passed)| (!passed).then_some(*check))
        .collect::<Vec<_>>();
    Err(("seed_verification", verification_message(&failed), 6u8))
}

fn success_message(hotels: &[HotelSeedInfo]) -> String {
    let lines = hotels
        .iter()
        .map(|hotel| {
            format!("  - {} ({}, owner {})", hotel.hotel_id, hotel.city, hotel.dmc_agent_id)
        })
        .collect::<Vec<_>>();
    format!("demo catalog loaded with {} hotels:\n{}", hotels.len(), lines.join("\n"))
}

fn verification_message(failed: &[&str]) -> String {
    if failed.is_empty() {
        "some demo hotels failed to load".to_string()
    } else {
        format!("demo catalog verification failed for: {}", failed.join(", "))
    }
}
