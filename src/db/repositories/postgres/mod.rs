//! Postgres repository implementation using Diesel.
//!
//! Rules, slots, the reservation ledger and bookings live in four tables;
//! every multi-step mutation (supersede+insert, batch status changes,
//! ledger reservation) runs inside a single transaction.
//!
//! ## Features
//!
//! - Connection pooling with r2d2
//! - Automatic retry for transient failures
//! - Connection health monitoring
//! - Automatic migration execution
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
//! - `PG_POOL_MAX`: Maximum pool size (default: 10)
//! - `PG_POOL_MIN`: Minimum pool size (default: 1)
//! - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
//! - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
//! - `PG_MAX_RETRIES`: Maximum retry attempts for transient failures (default: 3)
//! - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)

use async_trait::async_trait;
use chrono::NaiveDate;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_query;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::task;

use crate::api::{BookingId, RuleId, SlotId, VendorId};
use crate::db::repository::{
    AvailabilityRepository, BookingRepository, ErrorContext, RepositoryError, RepositoryResult,
    SlotFilter, SlotRepository, TemplateCleanup,
};
use crate::models::{Booking, DayOfWeek, RecurringAvailability, SlotInstance, SlotStatus};

mod models;
mod schema;

use models::*;
use schema::{bookings, recurring_availabilities, slot_instances, slot_reservations};

type PgPool = Pool<ConnectionManager<PgConnection>>;

const MIGRATIONS: EmbeddedMigrations = embed_migrations!("src/db/repositories/postgres/migrations");

/// Configuration for connecting to Postgres.
#[derive(Debug, Clone)]
pub struct PostgresConfig {
    /// Database connection URL
    pub database_url: String,
    /// Maximum number of connections in the pool
    pub max_pool_size: u32,
    /// Minimum number of connections in the pool
    pub min_pool_size: u32,
    /// Connection timeout in seconds
    pub connection_timeout_sec: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_sec: u64,
    /// Maximum number of retry attempts for transient failures
    pub max_retries: u32,
    /// Initial retry delay in milliseconds (doubles with each retry)
    pub retry_delay_ms: u64,
}

impl Default for PostgresConfig {
    fn default() -> Self {
        Self {
            database_url: String::new(),
            max_pool_size: 10,
            min_pool_size: 1,
            connection_timeout_sec: 30,
            idle_timeout_sec: 600,
            max_retries: 3,
            retry_delay_ms: 100,
        }
    }
}

impl PostgresConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    /// - `DATABASE_URL` or `PG_DATABASE_URL`: Connection string (required)
    /// - `PG_POOL_MAX`: Maximum pool size (default: 10)
    /// - `PG_POOL_MIN`: Minimum pool size (default: 1)
    /// - `PG_CONN_TIMEOUT_SEC`: Connection timeout in seconds (default: 30)
    /// - `PG_IDLE_TIMEOUT_SEC`: Idle connection timeout in seconds (default: 600)
    /// - `PG_MAX_RETRIES`: Maximum retry attempts (default: 3)
    /// - `PG_RETRY_DELAY_MS`: Initial retry delay in milliseconds (default: 100)
    pub fn from_env() -> Result<Self, String> {
        let database_url = std::env::var("DATABASE_URL")
            .or_else(|_| std::env::var("PG_DATABASE_URL"))
            .map_err(|_| "DATABASE_URL or PG_DATABASE_URL must be set".to_string())?;

        let max_pool_size = std::env::var("PG_POOL_MAX")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(10);

        let min_pool_size = std::env::var("PG_POOL_MIN")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(1);

        let connection_timeout_sec = std::env::var("PG_CONN_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(30);

        let idle_timeout_sec = std::env::var("PG_IDLE_TIMEOUT_SEC")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(600);

        let max_retries = std::env::var("PG_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(3);

        let retry_delay_ms = std::env::var("PG_RETRY_DELAY_MS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(100);

        Ok(Self {
            database_url,
            max_pool_size,
            min_pool_size,
            connection_timeout_sec,
            idle_timeout_sec,
            max_retries,
            retry_delay_ms,
        })
    }

    /// Create a new configuration with a database URL.
    pub fn with_url(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            ..Default::default()
        }
    }
}

/// Pool health statistics.
#[derive(Debug, Clone, Default)]
pub struct PoolStats {
    /// Number of connections currently in use
    pub connections_in_use: u32,
    /// Number of idle connections
    pub idle_connections: u32,
    /// Total number of connections in the pool
    pub total_connections: u32,
    /// Maximum pool size
    pub max_size: u32,
    /// Total successful queries executed
    pub total_queries: u64,
    /// Total failed queries
    pub failed_queries: u64,
    /// Total retried operations
    pub retried_operations: u64,
}

/// Diesel-backed repository for Postgres.
///
/// This repository implementation provides:
/// - Connection pooling with configurable limits
/// - Automatic retry for transient failures
/// - Health monitoring and statistics
/// - Automatic schema migrations
#[derive(Clone, Debug)]
pub struct PostgresRepository {
    pool: PgPool,
    config: PostgresConfig,
    // Metrics counters
    total_queries: std::sync::Arc<AtomicU64>,
    failed_queries: std::sync::Arc<AtomicU64>,
    retried_operations: std::sync::Arc<AtomicU64>,
}

impl PostgresRepository {
    /// Create a new repository and run pending migrations.
    ///
    /// # Arguments
    /// * `config` - Database configuration
    ///
    /// # Returns
    /// * `Ok(PostgresRepository)` on success
    /// * `Err(RepositoryError)` if connection or migration fails
    pub fn new(config: PostgresConfig) -> RepositoryResult<Self> {
        let manager = ConnectionManager::<PgConnection>::new(&config.database_url);

        let pool = Pool::builder()
            .max_size(config.max_pool_size)
            .min_idle(Some(config.min_pool_size))
            .connection_timeout(Duration::from_secs(config.connection_timeout_sec))
            .idle_timeout(Some(Duration::from_secs(config.idle_timeout_sec)))
            .test_on_check_out(true) // Validate connections before use
            .build(manager)
            .map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("create_pool")
                        .with_details(format!("max_size={}", config.max_pool_size)),
                )
            })?;

        // Run migrations once during initialization
        {
            let mut conn = pool.get().map_err(|e| {
                RepositoryError::connection_with_context(
                    e.to_string(),
                    ErrorContext::new("get_connection_for_migrations"),
                )
            })?;
            Self::run_migrations(&mut conn)?;
        }

        Ok(Self {
            pool,
            config,
            total_queries: std::sync::Arc::new(AtomicU64::new(0)),
            failed_queries: std::sync::Arc::new(AtomicU64::new(0)),
            retried_operations: std::sync::Arc::new(AtomicU64::new(0)),
        })
    }

    /// Run pending database migrations.
    fn run_migrations(conn: &mut PgConnection) -> RepositoryResult<()> {
        conn.run_pending_migrations(MIGRATIONS).map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Migration failed: {}", e),
                ErrorContext::new("run_migrations"),
            )
        })?;

        Ok(())
    }

    /// Execute a database operation with automatic retry for transient failures.
    ///
    /// This method will retry the operation up to `max_retries` times if a
    /// retryable error occurs (connection errors, timeouts, serialization failures).
    async fn with_conn<T, F>(&self, f: F) -> RepositoryResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> RepositoryResult<T> + Send + 'static + Clone,
    {
        let pool = self.pool.clone();
        let max_retries = self.config.max_retries;
        let retry_delay_ms = self.config.retry_delay_ms;
        let total_queries = self.total_queries.clone();
        let failed_queries = self.failed_queries.clone();
        let retried_operations = self.retried_operations.clone();

        task::spawn_blocking(move || {
            let mut last_error = None;
            let mut retry_delay = Duration::from_millis(retry_delay_ms);

            for attempt in 0..=max_retries {
                if attempt > 0 {
                    retried_operations.fetch_add(1, Ordering::Relaxed);
                    std::thread::sleep(retry_delay);
                    retry_delay *= 2; // Exponential backoff
                }

                // Get connection
                let mut conn = match pool.get() {
                    Ok(c) => c,
                    Err(e) => {
                        let err = RepositoryError::connection_with_context(
                            e.to_string(),
                            ErrorContext::new("get_connection")
                                .with_details(format!("attempt={}", attempt + 1))
                                .retryable(),
                        );
                        if attempt < max_retries {
                            last_error = Some(err);
                            continue;
                        }
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(err);
                    }
                };

                // Execute the operation
                total_queries.fetch_add(1, Ordering::Relaxed);
                match f.clone()(&mut conn) {
                    Ok(result) => return Ok(result),
                    Err(e) if e.is_retryable() && attempt < max_retries => {
                        last_error = Some(e);
                        continue;
                    }
                    Err(e) => {
                        failed_queries.fetch_add(1, Ordering::Relaxed);
                        return Err(e);
                    }
                }
            }

            failed_queries.fetch_add(1, Ordering::Relaxed);
            Err(last_error.unwrap_or_else(|| {
                RepositoryError::internal("Max retries exceeded with no error captured")
            }))
        })
        .await
        .map_err(|e| {
            RepositoryError::internal_with_context(
                format!("Task join error: {}", e),
                ErrorContext::new("spawn_blocking"),
            )
        })?
    }

    /// Get pool health statistics.
    ///
    /// Returns current pool state and query statistics for monitoring.
    pub fn get_pool_stats(&self) -> PoolStats {
        let state = self.pool.state();
        PoolStats {
            connections_in_use: state.connections - state.idle_connections,
            idle_connections: state.idle_connections,
            total_connections: state.connections,
            max_size: self.config.max_pool_size,
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            retried_operations: self.retried_operations.load(Ordering::Relaxed),
        }
    }

    /// Check if the database connection is healthy.
    ///
    /// Performs a simple query to verify connectivity.
    pub async fn is_healthy(&self) -> bool {
        self.health_check().await.unwrap_or(false)
    }

    /// Get detailed health information.
    ///
    /// Returns a tuple of (is_healthy, latency_ms, error_message).
    pub async fn health_check_detailed(&self) -> (bool, Option<u64>, Option<String>) {
        let start = Instant::now();
        match self.health_check().await {
            Ok(true) => (true, Some(start.elapsed().as_millis() as u64), None),
            Ok(false) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some("Health check returned false".to_string()),
            ),
            Err(e) => (
                false,
                Some(start.elapsed().as_millis() as u64),
                Some(e.to_string()),
            ),
        }
    }
}

/// Verify a batch of rule ids all exist and belong to the vendor.
fn check_rule_ownership(
    conn: &mut PgConnection,
    vendor: VendorId,
    ids: &[i64],
) -> RepositoryResult<()> {
    let distinct: HashSet<i64> = ids.iter().copied().collect();
    let owned: i64 = recurring_availabilities::table
        .filter(recurring_availabilities::vendor_id.eq(vendor.value()))
        .filter(recurring_availabilities::rule_id.eq_any(&distinct))
        .count()
        .get_result(conn)?;
    if owned as usize != distinct.len() {
        return Err(RepositoryError::not_found_with_context(
            "one or more rules do not exist for this vendor",
            ErrorContext::new("check_rule_ownership")
                .with_entity("availability_rule")
                .with_entity_id(vendor.value()),
        ));
    }
    Ok(())
}

/// Verify a batch of slot ids all exist and belong to the vendor.
fn check_slot_ownership(
    conn: &mut PgConnection,
    vendor: VendorId,
    ids: &[i64],
) -> RepositoryResult<()> {
    let distinct: HashSet<i64> = ids.iter().copied().collect();
    let owned: i64 = slot_instances::table
        .filter(slot_instances::vendor_id.eq(vendor.value()))
        .filter(slot_instances::slot_id.eq_any(&distinct))
        .count()
        .get_result(conn)?;
    if owned as usize != distinct.len() {
        return Err(RepositoryError::not_found_with_context(
            "one or more slots do not exist for this vendor",
            ErrorContext::new("check_slot_ownership")
                .with_entity("slot_instance")
                .with_entity_id(vendor.value()),
        ));
    }
    Ok(())
}

#[async_trait]
impl AvailabilityRepository for PostgresRepository {
    async fn health_check(&self) -> RepositoryResult<bool> {
        self.with_conn(|conn| {
            sql_query("SELECT 1").execute(conn)?;
            Ok(true)
        })
        .await
    }

    async fn insert_rules(
        &self,
        rules: &[RecurringAvailability],
        supersede_ongoing: bool,
    ) -> RepositoryResult<Vec<RuleId>> {
        let rules = rules.to_vec();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                if supersede_ongoing {
                    // Deactivate the current ongoing rule for every
                    // (vendor, day) an ongoing input rule targets.
                    let mut superseded: HashSet<(i64, i16)> = HashSet::new();
                    for rule in rules.iter().filter(|r| r.is_ongoing()) {
                        let key = (rule.vendor_id.value(), rule.day_of_week.index() as i16);
                        if !superseded.insert(key) {
                            continue;
                        }
                        diesel::update(
                            recurring_availabilities::table
                                .filter(recurring_availabilities::vendor_id.eq(key.0))
                                .filter(recurring_availabilities::day_of_week.eq(key.1))
                                .filter(recurring_availabilities::is_active.eq(true))
                                .filter(recurring_availabilities::effective_until.is_null()),
                        )
                        .set(recurring_availabilities::is_active.eq(false))
                        .execute(conn)?;
                    }
                }

                let new_rows = rules
                    .iter()
                    .map(NewRuleRow::from_domain)
                    .collect::<RepositoryResult<Vec<_>>>()?;

                // The unique index on (vendor, day, effective window)
                // turns duplicates into a Conflict via the From impl.
                let ids: Vec<i64> = diesel::insert_into(recurring_availabilities::table)
                    .values(&new_rows)
                    .returning(recurring_availabilities::rule_id)
                    .get_results(conn)?;

                Ok(ids.into_iter().map(RuleId).collect())
            })
        })
        .await
        .map_err(|e| e.with_operation("insert_rules"))
    }

    async fn get_rule(
        &self,
        vendor_id: VendorId,
        rule_id: RuleId,
    ) -> RepositoryResult<RecurringAvailability> {
        self.with_conn(move |conn| {
            let row: Option<RuleRow> = recurring_availabilities::table
                .filter(recurring_availabilities::rule_id.eq(rule_id.value()))
                .filter(recurring_availabilities::vendor_id.eq(vendor_id.value()))
                .select(RuleRow::as_select())
                .first(conn)
                .optional()?;

            row.ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Rule {} not found", rule_id),
                    ErrorContext::new("get_rule")
                        .with_entity("availability_rule")
                        .with_entity_id(rule_id.value()),
                )
            })?
            .try_into()
        })
        .await
    }

    async fn update_rule(
        &self,
        vendor_id: VendorId,
        rule: &RecurringAvailability,
    ) -> RepositoryResult<()> {
        let rule = rule.clone();
        self.with_conn(move |conn| {
            let id = rule.id.ok_or_else(|| {
                RepositoryError::validation("Cannot update a rule that has no id")
            })?;
            let changes = NewRuleRow::from_domain(&rule)?;

            let updated = diesel::update(
                recurring_availabilities::table
                    .filter(recurring_availabilities::rule_id.eq(id.value()))
                    .filter(recurring_availabilities::vendor_id.eq(vendor_id.value())),
            )
            .set(&changes)
            .execute(conn)?;

            if updated == 0 {
                return Err(RepositoryError::not_found_with_context(
                    format!("Rule {} not found", id),
                    ErrorContext::new("update_rule")
                        .with_entity("availability_rule")
                        .with_entity_id(id.value()),
                ));
            }
            Ok(())
        })
        .await
    }

    async fn list_rules(&self, vendor_id: VendorId) -> RepositoryResult<Vec<RecurringAvailability>> {
        self.with_conn(move |conn| {
            let rows: Vec<RuleRow> = recurring_availabilities::table
                .filter(recurring_availabilities::vendor_id.eq(vendor_id.value()))
                .order(recurring_availabilities::rule_id.asc())
                .select(RuleRow::as_select())
                .load(conn)?;
            rows.into_iter().map(TryInto::try_into).collect()
        })
        .await
    }

    async fn list_active_rules_for_day(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
    ) -> RepositoryResult<Vec<RecurringAvailability>> {
        self.with_conn(move |conn| {
            let rows: Vec<RuleRow> = recurring_availabilities::table
                .filter(recurring_availabilities::vendor_id.eq(vendor_id.value()))
                .filter(recurring_availabilities::day_of_week.eq(day.index() as i16))
                .filter(recurring_availabilities::is_active.eq(true))
                .order(recurring_availabilities::rule_id.asc())
                .select(RuleRow::as_select())
                .load(conn)?;
            rows.into_iter().map(TryInto::try_into).collect()
        })
        .await
    }

    async fn set_rules_active(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
        active: bool,
    ) -> RepositoryResult<usize> {
        let ids: Vec<i64> = rule_ids.iter().map(|r| r.value()).collect();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                check_rule_ownership(conn, vendor_id, &ids)?;
                let updated = diesel::update(
                    recurring_availabilities::table
                        .filter(recurring_availabilities::vendor_id.eq(vendor_id.value()))
                        .filter(recurring_availabilities::rule_id.eq_any(&ids)),
                )
                .set(recurring_availabilities::is_active.eq(active))
                .execute(conn)?;
                Ok(updated)
            })
        })
        .await
        .map_err(|e| e.with_operation("set_rules_active"))
    }

    async fn delete_rules(
        &self,
        vendor_id: VendorId,
        rule_ids: &[RuleId],
    ) -> RepositoryResult<usize> {
        let ids: Vec<i64> = rule_ids.iter().map(|r| r.value()).collect();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                check_rule_ownership(conn, vendor_id, &ids)?;
                let deleted = diesel::delete(
                    recurring_availabilities::table
                        .filter(recurring_availabilities::vendor_id.eq(vendor_id.value()))
                        .filter(recurring_availabilities::rule_id.eq_any(&ids)),
                )
                .execute(conn)?;
                Ok(deleted)
            })
        })
        .await
        .map_err(|e| e.with_operation("delete_rules"))
    }
}

#[async_trait]
impl SlotRepository for PostgresRepository {
    async fn insert_slots(&self, slots: &[SlotInstance]) -> RepositoryResult<Vec<SlotId>> {
        let new_rows: Vec<NewSlotRow> = slots.iter().map(NewSlotRow::from_domain).collect();
        self.with_conn(move |conn| {
            let ids: Vec<i64> = diesel::insert_into(slot_instances::table)
                .values(&new_rows)
                .returning(slot_instances::slot_id)
                .get_results(conn)?;
            Ok(ids.into_iter().map(SlotId).collect())
        })
        .await
        .map_err(|e| e.with_operation("insert_slots"))
    }

    async fn get_slot(
        &self,
        vendor_id: VendorId,
        slot_id: SlotId,
    ) -> RepositoryResult<SlotInstance> {
        self.with_conn(move |conn| {
            let row: Option<SlotRow> = slot_instances::table
                .filter(slot_instances::slot_id.eq(slot_id.value()))
                .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                .select(SlotRow::as_select())
                .first(conn)
                .optional()?;

            row.ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Slot {} not found", slot_id),
                    ErrorContext::new("get_slot")
                        .with_entity("slot_instance")
                        .with_entity_id(slot_id.value()),
                )
            })?
            .into_domain(0)
        })
        .await
    }

    async fn list_available_slots(
        &self,
        vendor_id: VendorId,
        filter: SlotFilter,
    ) -> RepositoryResult<Vec<SlotInstance>> {
        self.with_conn(move |conn| {
            let mut query = slot_instances::table
                .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                .filter(slot_instances::is_available.eq(true))
                .into_boxed();

            let day = filter
                .date
                .map(DayOfWeek::of_date)
                .or(filter.day_of_week);
            if let Some(day) = day {
                query = query.filter(slot_instances::day_of_week.eq(day.index() as i16));
            }

            let rows: Vec<SlotRow> = query
                .order((
                    slot_instances::day_of_week.asc(),
                    slot_instances::start_time.asc(),
                    slot_instances::slot_id.asc(),
                ))
                .select(SlotRow::as_select())
                .load(conn)?;

            // With a date in hand, join the ledger so callers see real
            // remaining capacity rather than zeros.
            let counts: HashMap<i64, i32> = match filter.date {
                Some(date) => {
                    let ids: Vec<i64> = rows.iter().map(|r| r.slot_id).collect();
                    slot_reservations::table
                        .filter(slot_reservations::slot_id.eq_any(&ids))
                        .filter(slot_reservations::reserved_date.eq(date))
                        .select((slot_reservations::slot_id, slot_reservations::reserved_count))
                        .load::<(i64, i32)>(conn)?
                        .into_iter()
                        .collect()
                }
                None => HashMap::new(),
            };

            rows.into_iter()
                .map(|row| {
                    let count = counts.get(&row.slot_id).copied().unwrap_or(0);
                    row.into_domain(count)
                })
                .collect()
        })
        .await
    }

    async fn find_slot(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        start_time: chrono::NaiveTime,
    ) -> RepositoryResult<Option<SlotInstance>> {
        self.with_conn(move |conn| {
            let row: Option<SlotRow> = slot_instances::table
                .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                .filter(slot_instances::day_of_week.eq(day.index() as i16))
                .filter(slot_instances::start_time.eq(start_time))
                .order(slot_instances::slot_id.asc())
                .select(SlotRow::as_select())
                .first(conn)
                .optional()?;
            row.map(|r| r.into_domain(0)).transpose()
        })
        .await
    }

    async fn bulk_set_status(
        &self,
        vendor_id: VendorId,
        slot_ids: &[SlotId],
        status: SlotStatus,
        force: bool,
    ) -> RepositoryResult<usize> {
        let ids: Vec<i64> = slot_ids.iter().map(|s| s.value()).collect();
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                check_slot_ownership(conn, vendor_id, &ids)?;

                match status {
                    SlotStatus::Active | SlotStatus::Inactive => {
                        let available = status == SlotStatus::Active;
                        let updated = diesel::update(
                            slot_instances::table
                                .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                                .filter(slot_instances::slot_id.eq_any(&ids)),
                        )
                        .set(slot_instances::is_available.eq(available))
                        .execute(conn)?;
                        Ok(updated)
                    }
                    SlotStatus::Deleted => {
                        if !force {
                            let booked: i64 = slot_reservations::table
                                .filter(slot_reservations::slot_id.eq_any(&ids))
                                .filter(slot_reservations::reserved_count.gt(0))
                                .count()
                                .get_result(conn)?;
                            if booked > 0 {
                                return Err(RepositoryError::conflict_with_context(
                                    "cannot delete slots with live reservations",
                                    ErrorContext::new("bulk_set_status")
                                        .with_entity("slot_instance")
                                        .with_details(format!("booked_dates={}", booked)),
                                ));
                            }
                        }
                        diesel::delete(
                            slot_reservations::table
                                .filter(slot_reservations::slot_id.eq_any(&ids)),
                        )
                        .execute(conn)?;
                        let deleted = diesel::delete(
                            slot_instances::table
                                .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                                .filter(slot_instances::slot_id.eq_any(&ids)),
                        )
                        .execute(conn)?;
                        Ok(deleted)
                    }
                }
            })
        })
        .await
        .map_err(|e| e.with_operation("bulk_set_status"))
    }

    async fn delete_unbooked_template_slots(
        &self,
        vendor_id: VendorId,
        day: DayOfWeek,
        cutoff: NaiveDate,
    ) -> RepositoryResult<TemplateCleanup> {
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let candidates: Vec<i64> = slot_instances::table
                    .filter(slot_instances::vendor_id.eq(vendor_id.value()))
                    .filter(slot_instances::day_of_week.eq(day.index() as i16))
                    .select(slot_instances::slot_id)
                    .load(conn)?;

                // A slot is kept when a future-dated ledger entry still
                // holds capacity against it.
                let booked: HashSet<i64> = slot_reservations::table
                    .filter(slot_reservations::slot_id.eq_any(&candidates))
                    .filter(slot_reservations::reserved_date.ge(cutoff))
                    .filter(slot_reservations::reserved_count.gt(0))
                    .select(slot_reservations::slot_id)
                    .distinct()
                    .load::<i64>(conn)?
                    .into_iter()
                    .collect();

                let to_delete: Vec<i64> = candidates
                    .iter()
                    .copied()
                    .filter(|id| !booked.contains(id))
                    .collect();

                diesel::delete(
                    slot_reservations::table
                        .filter(slot_reservations::slot_id.eq_any(&to_delete)),
                )
                .execute(conn)?;
                let deleted = diesel::delete(
                    slot_instances::table.filter(slot_instances::slot_id.eq_any(&to_delete)),
                )
                .execute(conn)?;

                let mut kept: Vec<SlotId> = candidates
                    .into_iter()
                    .filter(|id| booked.contains(id))
                    .map(SlotId)
                    .collect();
                kept.sort_by_key(|s| s.value());

                Ok(TemplateCleanup { deleted, kept })
            })
        })
        .await
        .map_err(|e| e.with_operation("delete_unbooked_template_slots"))
    }

    async fn reserve(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32> {
        self.with_conn(move |conn| {
            conn.transaction::<_, RepositoryError, _>(|conn| {
                let slot: Option<SlotRow> = slot_instances::table
                    .filter(slot_instances::slot_id.eq(slot_id.value()))
                    .select(SlotRow::as_select())
                    .first(conn)
                    .optional()?;

                let slot = match slot {
                    Some(s) if s.is_available => s,
                    _ => {
                        return Err(RepositoryError::no_availability_with_context(
                            format!("Slot {} is not open for booking", slot_id),
                            ErrorContext::new("reserve")
                                .with_entity("slot_instance")
                                .with_entity_id(slot_id.value()),
                        ))
                    }
                };

                // Seed the ledger row, then take the unit with a guarded
                // increment. Concurrent callers serialize on the row lock
                // and re-evaluate the capacity predicate, so at most
                // `max_bookings` increments ever succeed per date.
                diesel::insert_into(slot_reservations::table)
                    .values(ReservationRow {
                        slot_id: slot_id.value(),
                        reserved_date: date,
                        reserved_count: 0,
                    })
                    .on_conflict((slot_reservations::slot_id, slot_reservations::reserved_date))
                    .do_nothing()
                    .execute(conn)?;

                let new_count: Option<i32> = diesel::update(
                    slot_reservations::table
                        .filter(slot_reservations::slot_id.eq(slot_id.value()))
                        .filter(slot_reservations::reserved_date.eq(date))
                        .filter(slot_reservations::reserved_count.lt(slot.max_bookings)),
                )
                .set(
                    slot_reservations::reserved_count
                        .eq(slot_reservations::reserved_count + 1),
                )
                .returning(slot_reservations::reserved_count)
                .get_result(conn)
                .optional()?;

                new_count.ok_or_else(|| {
                    RepositoryError::capacity_exceeded_with_context(
                        format!(
                            "Slot {} is fully booked on {} ({} of {})",
                            slot_id, date, slot.max_bookings, slot.max_bookings
                        ),
                        ErrorContext::new("reserve")
                            .with_entity("slot_instance")
                            .with_entity_id(slot_id.value()),
                    )
                })
            })
        })
        .await
    }

    async fn release(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<()> {
        self.with_conn(move |conn| {
            // Floored decrement; a missing or empty ledger row is a no-op.
            diesel::update(
                slot_reservations::table
                    .filter(slot_reservations::slot_id.eq(slot_id.value()))
                    .filter(slot_reservations::reserved_date.eq(date))
                    .filter(slot_reservations::reserved_count.gt(0)),
            )
            .set(slot_reservations::reserved_count.eq(slot_reservations::reserved_count - 1))
            .execute(conn)?;
            Ok(())
        })
        .await
        .map_err(|e| e.with_operation("release"))
    }

    async fn reservation_count(&self, slot_id: SlotId, date: NaiveDate) -> RepositoryResult<i32> {
        self.with_conn(move |conn| {
            let count: Option<i32> = slot_reservations::table
                .filter(slot_reservations::slot_id.eq(slot_id.value()))
                .filter(slot_reservations::reserved_date.eq(date))
                .select(slot_reservations::reserved_count)
                .first(conn)
                .optional()?;
            Ok(count.unwrap_or(0))
        })
        .await
    }
}

#[async_trait]
impl BookingRepository for PostgresRepository {
    async fn insert_booking(&self, booking: &Booking) -> RepositoryResult<BookingId> {
        let new_row = NewBookingRow::from_domain(booking);
        self.with_conn(move |conn| {
            let id: i64 = diesel::insert_into(bookings::table)
                .values(&new_row)
                .returning(bookings::booking_id)
                .get_result(conn)?;
            Ok(BookingId(id))
        })
        .await
        .map_err(|e| e.with_operation("insert_booking"))
    }

    async fn get_booking(&self, booking_id: BookingId) -> RepositoryResult<Booking> {
        self.with_conn(move |conn| {
            let row: Option<BookingRow> = bookings::table
                .filter(bookings::booking_id.eq(booking_id.value()))
                .select(BookingRow::as_select())
                .first(conn)
                .optional()?;

            row.ok_or_else(|| {
                RepositoryError::not_found_with_context(
                    format!("Booking {} not found", booking_id),
                    ErrorContext::new("get_booking")
                        .with_entity("booking")
                        .with_entity_id(booking_id.value()),
                )
            })?
            .try_into()
        })
        .await
    }

    async fn update_booking(&self, booking: &Booking) -> RepositoryResult<()> {
        let booking = booking.clone();
        self.with_conn(move |conn| {
            let id = booking.id.ok_or_else(|| {
                RepositoryError::validation("Cannot update a booking that has no id")
            })?;
            let changes = NewBookingRow::from_domain(&booking);

            let updated = diesel::update(
                bookings::table.filter(bookings::booking_id.eq(id.value())),
            )
            .set(&changes)
            .execute(conn)?;

            if updated == 0 {
                return Err(RepositoryError::not_found_with_context(
                    format!("Booking {} not found", id),
                    ErrorContext::new("update_booking")
                        .with_entity("booking")
                        .with_entity_id(id.value()),
                ));
            }
            Ok(())
        })
        .await
    }
}
