use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::{DateTime, Utc};
use serde::Serialize;
use voyage_db::{migrations, DbPool};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Probe {
    Up,
    Down,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProbeResult {
    pub probe: Probe,
    pub detail: String,
}

impl ProbeResult {
    fn up(detail: impl Into<String>) -> Self {
        Self { probe: Probe::Up, detail: detail.into() }
    }

    fn down(detail: impl Into<String>) -> Self {
        Self { probe: Probe::Down, detail: detail.into() }
    }
}

/// Body of `GET /health`. The marketplace is ready only when the schema is current and
/// the catalog table answers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Readiness {
    pub ready: bool,
    pub schema: ProbeResult,
    pub catalog: ProbeResult,
    pub checked_at: DateTime<Utc>,
}

pub fn router(db_pool: DbPool) -> Router {
    Router::new().route("/health", get(readiness)).with_state(db_pool)
}

pub async fn readiness(State(pool): State<DbPool>) -> (StatusCode, Json<Readiness>) {
    let schema = match migrations::schema_status(&pool).await {
        Ok(status) if status.is_current() => {
            ProbeResult::up(format!("{}/{} migrations", status.applied, status.expected))
        }
        Ok(status) => ProbeResult::down(format!(
            "{}/{} migrations; pending migrations must run before serving traffic",
            status.applied, status.expected
        )),
        Err(error) => ProbeResult::down(format!("migration state unavailable: {error}")),
    };

    let catalog = match sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM hotel WHERE active = 1")
        .fetch_one(&pool)
        .await
    {
        Ok(active) => ProbeResult::up(format!("{active} active hotels")),
        Err(error) => ProbeResult::down(format!("catalog query failed: {error}")),
    };

    let ready = schema.probe == Probe::Up && catalog.probe == Probe::Up;
    let code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (code, Json(Readiness { ready, schema, catalog, checked_at: Utc::now() }))
}

#[cfg(test)]
mod tests {
    use axum::{extract::State, http::StatusCode, Json};
    use chrono::Utc;
    use voyage_db::repositories::SqlHotelRepository;
    use voyage_db::{connect_with_settings, migrations, DemoCatalog};

    use super::{readiness, Probe};

    #[tokio::test]
    async fn ready_once_migrated_and_counts_active_hotels() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");
        migrations::run_pending(&pool).await.expect("migrations");

        let (code, Json(body)) = readiness(State(pool.clone())).await;
        assert_eq!(code, StatusCode::OK);
        assert!(body.ready);
        assert_eq!(body.catalog.detail, "0 active hotels");

        let seeded = DemoCatalog::load(&SqlHotelRepository::new(pool.clone()), Utc::now())
            .await
            .expect("seed");
        let (_, Json(body)) = readiness(State(pool.clone())).await;
        assert_eq!(body.catalog.detail, format!("{} active hotels", seeded.hotels_seeded.len()));

        pool.close().await;
    }

    #[tokio::test]
    async fn unmigrated_database_is_not_ready() {
        let pool = connect_with_settings("sqlite::memory:", 1, 5).await.expect("pool");

        let (code, Json(body)) = readiness(State(pool.clone())).await;
        assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(!body.ready);
        assert_eq!(body.schema.probe, Probe::Down);
        assert_eq!(body.catalog.probe, Probe::Down);

        pool.close().await;
    }
}
