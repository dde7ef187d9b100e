use voyage_core::config::LoadOptions;

use crate::commands::{conclude, migrated_pool, prepare, CommandResult, Prepared, StepFailure};

pub fn run(options: &LoadOptions) -> CommandResult {
    let Prepared { config, runtime } = match prepare("migrate", options) {
        Ok(prepared) => prepared,
        Err(failure) => return failure,
    };

    let outcome = runtime.block_on(async {
        let pool = migrated_pool(&config).await?;
        pool.close().await;
        Ok::<(), StepFailure>(())
    });

    conclude("migrate", outcome, |()| {
        format!("applied pending migrations to `{}`", config.database.url)
    })
}
