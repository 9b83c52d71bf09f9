//! Postgres persistence for the event pipeline.
//!
//! One [`Store`] wraps the shared `PgPool`. Every write is a parameterised
//! upsert on the natural key of its table, so ingestors stay idempotent and a
//! crash loses at most the record in flight. Historical-case similarity uses
//! the pgvector L2 operator through raw SQL.

pub mod embeddings;
pub mod seeds;

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use meridian_core::{
    CentralBankComm, DailyDigest, EconomicCalendarEvent, EventAnalysisUpdate, HistoricalCase,
    HistoricalCaseSummary, HistoricalMatch, MacroEventRecord, MarketContextRecord, MatchMethod,
    MeridianError, MetalsKnowledgeEntry, NewMacroEvent, PriceBar, PriorityEventSummary,
    RatioEntry, ScoreUpdate, ThesisSummary,
};

use crate::embeddings::format_embedding;
use crate::seeds::HistoricalCaseSeed;

pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

const READINESS_TIMEOUT_SECS: u64 = 2;

pub type Result<T> = std::result::Result<T, MeridianError>;

fn db_err(err: sqlx::Error) -> MeridianError {
    MeridianError::Database(err.to_string())
}

#[derive(Clone)]
pub struct Store {
    pool: PgPool,
}

impl Store {
    /// Connect and probe readiness with a short timeout.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(READINESS_TIMEOUT_SECS))
            .connect(database_url)
            .await
            .map_err(db_err)?;
        sqlx::query("SELECT 1").execute(&pool).await.map_err(db_err)?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|err| MeridianError::Database(err.to_string()))
    }

    // ------------------------------------------------------------------
    // Macro events
    // ------------------------------------------------------------------

    /// Insert new macro events, ignoring duplicates of the natural key.
    /// Returns the number of rows actually inserted.
    pub async fn insert_macro_events(&self, entries: &[NewMacroEvent]) -> Result<u64> {
        let query = r#"
            INSERT INTO macro_events (source, headline, url, published_at, status)
            VALUES ($1, $2, $3, $4, 'new')
            ON CONFLICT (source, headline, published_at) DO NOTHING
        "#;
        let mut inserted = 0u64;
        for entry in entries {
            let result = sqlx::query(query)
                .bind(&entry.source)
                .bind(&entry.headline)
                .bind(&entry.url)
                .bind(entry.published_at)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    /// Events awaiting significance scoring, oldest first.
    pub async fn fetch_events_to_score(&self, limit: Option<i64>) -> Result<Vec<MacroEventRecord>> {
        let mut query = String::from(
            r#"
            SELECT id, source, headline, full_text, published_at,
                   event_type, regions, entities, significance_score
            FROM macro_events
            WHERE significance_score IS NULL
            ORDER BY published_at NULLS LAST, created_at
        "#,
        );
        if limit.is_some() {
            query.push_str(" LIMIT $1");
        }
        let mut q = sqlx::query(&query);
        if let Some(limit) = limit {
            q = q.bind(limit);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(map_macro_event).collect()
    }

    pub async fn update_event_score(&self, id: Uuid, update: &ScoreUpdate) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE macro_events
            SET significance_score = $2,
                score_components = $3,
                priority_flag = $4
            WHERE id = $1
        "#,
        )
        .bind(id)
        .bind(update.significance_score)
        .bind(&update.score_components)
        .bind(update.priority_flag)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    /// Priority events for the analysis pass, most recent first. Unless
    /// `include_analyzed`, only events with no structured interpretation yet.
    pub async fn fetch_priority_events_for_analysis(
        &self,
        limit: Option<i64>,
        include_analyzed: bool,
    ) -> Result<Vec<MacroEventRecord>> {
        let mut query = String::from(
            r#"
            SELECT id, source, headline, full_text, published_at,
                   event_type, regions, entities, significance_score
            FROM macro_events
            WHERE priority_flag = true
        "#,
        );
        if !include_analyzed {
            query.push_str(
                r#"
              AND raw_facts IS NULL
              AND metal_impacts IS NULL
              AND historical_precedent IS NULL
              AND counter_case IS NULL
              AND crypto_transmission IS NULL
            "#,
            );
        }
        query.push_str(" ORDER BY published_at DESC NULLS LAST, created_at DESC");
        if limit.is_some() {
            query.push_str(" LIMIT $1");
        }
        let mut q = sqlx::query(&query);
        if let Some(limit) = limit {
            q = q.bind(limit);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter().map(map_macro_event).collect()
    }

    pub async fn fetch_event_by_id(&self, id: Uuid) -> Result<Option<MacroEventRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, source, headline, full_text, published_at,
                   event_type, regions, entities, significance_score
            FROM macro_events
            WHERE id = $1
        "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_macro_event).transpose()
    }

    /// Attach structured analysis. Without `overwrite`, only events whose
    /// analysis columns are all null are updated; returns whether a row
    /// actually changed.
    pub async fn update_event_analysis(
        &self,
        id: Uuid,
        analysis: &EventAnalysisUpdate,
        overwrite: bool,
    ) -> Result<bool> {
        let mut query = String::from(
            r#"
            UPDATE macro_events
            SET raw_facts = $2,
                metal_impacts = $3,
                historical_precedent = $4,
                counter_case = $5,
                crypto_transmission = $6
            WHERE id = $1
        "#,
        );
        if !overwrite {
            query.push_str(
                r#"
              AND raw_facts IS NULL
              AND metal_impacts IS NULL
              AND historical_precedent IS NULL
              AND counter_case IS NULL
              AND crypto_transmission IS NULL
            "#,
            );
        }
        let result = sqlx::query(&query)
            .bind(id)
            .bind(&analysis.raw_facts)
            .bind(&analysis.metal_impacts)
            .bind(&analysis.historical_precedent)
            .bind(&analysis.counter_case)
            .bind(&analysis.crypto_transmission)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(result.rows_affected() > 0)
    }

    /// Priority events in a digest window, highest significance then most
    /// recent. `published_at` windows the event; `created_at` substitutes
    /// when it is null.
    pub async fn fetch_priority_events_window(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        limit: i64,
    ) -> Result<Vec<PriorityEventSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, source, headline, published_at, significance_score,
                   raw_facts, metal_impacts, historical_precedent,
                   counter_case, crypto_transmission, created_at
            FROM macro_events
            WHERE priority_flag = true
              AND (
                (published_at >= $1 AND published_at < $2)
                OR (published_at IS NULL AND created_at >= $1 AND created_at < $2)
              )
            ORDER BY significance_score DESC NULLS LAST,
                     published_at DESC NULLS LAST,
                     created_at DESC,
                     id DESC
            LIMIT $3
        "#,
        )
        .bind(start)
        .bind(end)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.iter()
            .map(|row| {
                let published_at: Option<DateTime<Utc>> =
                    row.try_get("published_at").map_err(db_err)?;
                let created_at: DateTime<Utc> = row.try_get("created_at").map_err(db_err)?;
                let raw_facts: Option<Vec<String>> = row.try_get("raw_facts").map_err(db_err)?;
                let metal_impacts: Option<serde_json::Value> =
                    row.try_get("metal_impacts").map_err(db_err)?;
                let precedent: Option<String> =
                    row.try_get("historical_precedent").map_err(db_err)?;
                let counter: Option<String> = row.try_get("counter_case").map_err(db_err)?;
                let crypto: Option<serde_json::Value> =
                    row.try_get("crypto_transmission").map_err(db_err)?;
                let analysis_ready = raw_facts.is_some()
                    || metal_impacts.is_some()
                    || precedent.is_some()
                    || counter.is_some()
                    || crypto.is_some();
                Ok(PriorityEventSummary {
                    id: row.try_get("id").map_err(db_err)?,
                    source: row.try_get("source").map_err(db_err)?,
                    headline: row.try_get("headline").map_err(db_err)?,
                    published_at: published_at.or(Some(created_at)),
                    score: row.try_get("significance_score").map_err(db_err)?,
                    analysis_ready,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Prices and ratios
    // ------------------------------------------------------------------

    pub async fn upsert_prices(&self, bars: &[PriceBar], source: &str) -> Result<u64> {
        let query = r#"
            INSERT INTO daily_prices (symbol, price_date, open, high, low, close,
                                      adj_close, volume, source)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (symbol, price_date)
            DO UPDATE SET
                open = EXCLUDED.open,
                high = EXCLUDED.high,
                low = EXCLUDED.low,
                close = EXCLUDED.close,
                adj_close = EXCLUDED.adj_close,
                volume = EXCLUDED.volume,
                source = EXCLUDED.source
        "#;
        let mut written = 0u64;
        for bar in bars {
            let result = sqlx::query(query)
                .bind(&bar.symbol)
                .bind(bar.price_date)
                .bind(bar.open)
                .bind(bar.high)
                .bind(bar.low)
                .bind(bar.close)
                .bind(bar.adj_close)
                .bind(bar.volume)
                .bind(source)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    pub async fn upsert_price_ratios(&self, entries: &[RatioEntry]) -> Result<u64> {
        let query = r#"
            INSERT INTO price_ratios (ratio_name, price_date, value, base_symbol, quote_symbol)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (ratio_name, price_date)
            DO UPDATE SET
                value = EXCLUDED.value,
                base_symbol = EXCLUDED.base_symbol,
                quote_symbol = EXCLUDED.quote_symbol
        "#;
        let mut written = 0u64;
        for entry in entries {
            let result = sqlx::query(query)
                .bind(&entry.ratio_name)
                .bind(entry.price_date)
                .bind(entry.value)
                .bind(&entry.base_symbol)
                .bind(&entry.quote_symbol)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    /// Latest `limit` non-null closes for a symbol at or before `as_of`,
    /// newest first.
    pub async fn latest_closes(
        &self,
        symbol: &str,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<(NaiveDate, Decimal)>> {
        let rows = sqlx::query(
            r#"
            SELECT price_date, close
            FROM daily_prices
            WHERE symbol = $1 AND price_date <= $2 AND close IS NOT NULL
            ORDER BY price_date DESC
            LIMIT $3
        "#,
        )
        .bind(symbol)
        .bind(as_of)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("price_date").map_err(db_err)?,
                    row.try_get("close").map_err(db_err)?,
                ))
            })
            .collect()
    }

    pub async fn latest_ratio_values(
        &self,
        ratio_name: &str,
        as_of: NaiveDate,
        limit: i64,
    ) -> Result<Vec<(NaiveDate, Decimal)>> {
        let rows = sqlx::query(
            r#"
            SELECT price_date, value
            FROM price_ratios
            WHERE ratio_name = $1 AND price_date <= $2
            ORDER BY price_date DESC
            LIMIT $3
        "#,
        )
        .bind(ratio_name)
        .bind(as_of)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok((
                    row.try_get("price_date").map_err(db_err)?,
                    row.try_get("value").map_err(db_err)?,
                ))
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Economic calendar
    // ------------------------------------------------------------------

    pub async fn upsert_economic_events(&self, events: &[EconomicCalendarEvent]) -> Result<u64> {
        let query = r#"
            INSERT INTO economic_events (event_name, event_date, region, impact_level,
                                         expected_value, actual_value, previous_value,
                                         surprise_direction, surprise_magnitude)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (event_name, event_date, region)
            DO UPDATE SET
                impact_level = EXCLUDED.impact_level,
                expected_value = EXCLUDED.expected_value,
                actual_value = EXCLUDED.actual_value,
                previous_value = EXCLUDED.previous_value,
                surprise_direction = EXCLUDED.surprise_direction,
                surprise_magnitude = EXCLUDED.surprise_magnitude
        "#;
        let mut written = 0u64;
        for event in events {
            let result = sqlx::query(query)
                .bind(&event.event_name)
                .bind(event.event_date)
                .bind(&event.region)
                .bind(&event.impact_level)
                .bind(&event.expected_value)
                .bind(&event.actual_value)
                .bind(&event.previous_value)
                .bind(&event.surprise_direction)
                .bind(event.surprise_magnitude)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    pub async fn fetch_economic_events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        high_impact_only: bool,
    ) -> Result<Vec<EconomicCalendarEvent>> {
        let mut query = String::from(
            r#"
            SELECT event_name, event_date, region, impact_level,
                   expected_value, actual_value, previous_value,
                   surprise_direction, surprise_magnitude
            FROM economic_events
            WHERE event_date >= $1 AND event_date < $2
        "#,
        );
        if high_impact_only {
            query.push_str(" AND impact_level = 'high'");
        }
        query.push_str(" ORDER BY event_date ASC, event_name ASC");
        let rows = sqlx::query(&query)
            .bind(start)
            .bind(end)
            .fetch_all(&self.pool)
            .await
            .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(EconomicCalendarEvent {
                    event_name: row.try_get("event_name").map_err(db_err)?,
                    event_date: row.try_get("event_date").map_err(db_err)?,
                    region: row
                        .try_get::<Option<String>, _>("region")
                        .map_err(db_err)?
                        .unwrap_or_else(|| "unknown".to_string()),
                    impact_level: row
                        .try_get::<Option<String>, _>("impact_level")
                        .map_err(db_err)?
                        .unwrap_or_default(),
                    expected_value: row.try_get("expected_value").map_err(db_err)?,
                    actual_value: row.try_get("actual_value").map_err(db_err)?,
                    previous_value: row.try_get("previous_value").map_err(db_err)?,
                    surprise_direction: row.try_get("surprise_direction").map_err(db_err)?,
                    surprise_magnitude: row.try_get("surprise_magnitude").map_err(db_err)?,
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Central bank communications
    // ------------------------------------------------------------------

    pub async fn comm_exists(
        &self,
        bank: &str,
        comm_type: &str,
        published_at: DateTime<Utc>,
    ) -> Result<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS present
            FROM central_bank_comms
            WHERE bank = $1 AND comm_type = $2 AND published_at = $3
            LIMIT 1
        "#,
        )
        .bind(bank)
        .bind(comm_type)
        .bind(published_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(row.is_some())
    }

    /// Full text of the most recent prior comm of the same `(bank, comm_type)`.
    pub async fn previous_comm_text(
        &self,
        bank: &str,
        comm_type: &str,
        published_at: DateTime<Utc>,
    ) -> Result<Option<String>> {
        let row = sqlx::query(
            r#"
            SELECT full_text
            FROM central_bank_comms
            WHERE bank = $1 AND comm_type = $2 AND published_at < $3
            ORDER BY published_at DESC
            LIMIT 1
        "#,
        )
        .bind(bank)
        .bind(comm_type)
        .bind(published_at)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.map(|r| r.try_get("full_text").map_err(db_err)).transpose()
    }

    pub async fn insert_comm(
        &self,
        comm: &CentralBankComm,
        change_vs_previous: Option<&str>,
    ) -> Result<u64> {
        let result = sqlx::query(
            r#"
            INSERT INTO central_bank_comms (bank, comm_type, published_at, full_text,
                                            change_vs_previous)
            VALUES ($1, $2, $3, $4, $5)
        "#,
        )
        .bind(&comm.bank)
        .bind(&comm.comm_type)
        .bind(comm.published_at)
        .bind(&comm.full_text)
        .bind(change_vs_previous)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Market context
    // ------------------------------------------------------------------

    pub async fn upsert_market_context(&self, record: &MarketContextRecord) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO market_context (
                context_date, volatility_regime, dollar_regime, curve_regime,
                credit_regime, vix_level, dxy_level, us10y_level, us2y_level,
                gold_level, oil_level, spx_level, btc_level, spread_2s10s,
                hy_spread, gold_silver_ratio, copper_gold_ratio,
                vix_term_structure, spy_rsp_ratio, suggested_size_multiplier,
                raw_prices, raw_fred
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16, $17, $18, $19, $20, $21, $22)
            ON CONFLICT (context_date)
            DO UPDATE SET
                volatility_regime = EXCLUDED.volatility_regime,
                dollar_regime = EXCLUDED.dollar_regime,
                curve_regime = EXCLUDED.curve_regime,
                credit_regime = EXCLUDED.credit_regime,
                vix_level = EXCLUDED.vix_level,
                dxy_level = EXCLUDED.dxy_level,
                us10y_level = EXCLUDED.us10y_level,
                us2y_level = EXCLUDED.us2y_level,
                gold_level = EXCLUDED.gold_level,
                oil_level = EXCLUDED.oil_level,
                spx_level = EXCLUDED.spx_level,
                btc_level = EXCLUDED.btc_level,
                spread_2s10s = EXCLUDED.spread_2s10s,
                hy_spread = EXCLUDED.hy_spread,
                gold_silver_ratio = EXCLUDED.gold_silver_ratio,
                copper_gold_ratio = EXCLUDED.copper_gold_ratio,
                vix_term_structure = EXCLUDED.vix_term_structure,
                spy_rsp_ratio = EXCLUDED.spy_rsp_ratio,
                suggested_size_multiplier = EXCLUDED.suggested_size_multiplier,
                raw_prices = EXCLUDED.raw_prices,
                raw_fred = EXCLUDED.raw_fred
        "#,
        )
        .bind(record.context_date)
        .bind(&record.volatility_regime)
        .bind(&record.dollar_regime)
        .bind(&record.curve_regime)
        .bind(&record.credit_regime)
        .bind(record.vix_level)
        .bind(record.dxy_level)
        .bind(record.us10y_level)
        .bind(record.us2y_level)
        .bind(record.gold_level)
        .bind(record.oil_level)
        .bind(record.spx_level)
        .bind(record.btc_level)
        .bind(record.spread_2s10s)
        .bind(record.hy_spread)
        .bind(record.gold_silver_ratio)
        .bind(record.copper_gold_ratio)
        .bind(record.vix_term_structure)
        .bind(record.spy_rsp_ratio)
        .bind(record.suggested_size_multiplier)
        .bind(&record.raw_prices)
        .bind(&record.raw_fred)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    pub async fn fetch_latest_market_context(&self) -> Result<Option<MarketContextRecord>> {
        let row = sqlx::query(
            r#"
            SELECT context_date, volatility_regime, dollar_regime, curve_regime,
                   credit_regime, vix_level, dxy_level, us10y_level, us2y_level,
                   gold_level, oil_level, spx_level, btc_level, spread_2s10s,
                   hy_spread, gold_silver_ratio, copper_gold_ratio,
                   vix_term_structure, spy_rsp_ratio, suggested_size_multiplier,
                   raw_prices, raw_fred
            FROM market_context
            ORDER BY context_date DESC
            LIMIT 1
        "#,
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        row.as_ref().map(map_market_context).transpose()
    }

    // ------------------------------------------------------------------
    // Daily digests
    // ------------------------------------------------------------------

    pub async fn load_digest(&self, digest_date: NaiveDate) -> Result<Option<DailyDigest>> {
        let row = sqlx::query(
            r#"
            SELECT digest_date, created_at, priority_events, metals_snapshot,
                   economic_calendar, active_theses, full_digest
            FROM daily_digests
            WHERE digest_date = $1
        "#,
        )
        .bind(digest_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(|row| {
            let date: NaiveDate = row.try_get("digest_date").map_err(db_err)?;
            let window_start = date.and_time(chrono::NaiveTime::MIN).and_utc();
            Ok(DailyDigest {
                digest_date: date,
                window_start,
                window_end: window_start + chrono::Duration::days(1),
                generated_at: row.try_get("created_at").map_err(db_err)?,
                priority_events: json_array(
                    row.try_get("priority_events").map_err(db_err)?,
                ),
                metals_snapshot: row
                    .try_get::<Option<serde_json::Value>, _>("metals_snapshot")
                    .map_err(db_err)?
                    .unwrap_or(serde_json::Value::Null),
                economic_calendar: json_array(
                    row.try_get("economic_calendar").map_err(db_err)?,
                ),
                active_theses: json_array(row.try_get("active_theses").map_err(db_err)?),
                full_digest: row
                    .try_get::<Option<String>, _>("full_digest")
                    .map_err(db_err)?
                    .unwrap_or_default(),
                timezone: "UTC".to_string(),
            })
        })
        .transpose()
    }

    pub async fn cache_digest(&self, digest: &DailyDigest) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO daily_digests (digest_date, priority_events, metals_snapshot,
                                       economic_calendar, active_theses, full_digest)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (digest_date)
            DO UPDATE SET
                priority_events = EXCLUDED.priority_events,
                metals_snapshot = EXCLUDED.metals_snapshot,
                economic_calendar = EXCLUDED.economic_calendar,
                active_theses = EXCLUDED.active_theses,
                full_digest = EXCLUDED.full_digest
        "#,
        )
        .bind(digest.digest_date)
        .bind(serde_json::Value::Array(digest.priority_events.clone()))
        .bind(&digest.metals_snapshot)
        .bind(serde_json::Value::Array(digest.economic_calendar.clone()))
        .bind(serde_json::Value::Array(digest.active_theses.clone()))
        .bind(&digest.full_digest)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Theses (read-only collaborator)
    // ------------------------------------------------------------------

    pub async fn fetch_active_theses(&self, limit: i64) -> Result<Vec<ThesisSummary>> {
        let rows = sqlx::query(
            r#"
            SELECT id, title, asset_type, asset_symbol, status,
                   price_change_percent, updated_at, created_at
            FROM theses
            WHERE status IS NULL
               OR status NOT IN ('closed', 'dismissed', 'archived')
            ORDER BY updated_at DESC NULLS LAST, created_at DESC, id DESC
            LIMIT $1
        "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                let updated_at: Option<DateTime<Utc>> =
                    row.try_get("updated_at").map_err(db_err)?;
                let created_at: Option<DateTime<Utc>> =
                    row.try_get("created_at").map_err(db_err)?;
                Ok(ThesisSummary {
                    id: row.try_get("id").map_err(db_err)?,
                    title: row.try_get("title").map_err(db_err)?,
                    asset_type: row.try_get("asset_type").map_err(db_err)?,
                    asset_symbol: row.try_get("asset_symbol").map_err(db_err)?,
                    status: row.try_get("status").map_err(db_err)?,
                    price_change_percent: row.try_get("price_change_percent").map_err(db_err)?,
                    updated_at: updated_at.or(created_at),
                })
            })
            .collect()
    }

    // ------------------------------------------------------------------
    // Historical cases
    // ------------------------------------------------------------------

    pub async fn fetch_historical_cases(&self) -> Result<Vec<HistoricalCase>> {
        let rows = sqlx::query(
            r#"
            SELECT event_name, date_range, event_type, significance_score,
                   structural_drivers, lessons, counter_examples,
                   traditional_market_reaction
            FROM historical_cases
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(HistoricalCase {
                    event_name: row.try_get("event_name").map_err(db_err)?,
                    date_range: row.try_get("date_range").map_err(db_err)?,
                    event_type: row.try_get("event_type").map_err(db_err)?,
                    significance_score: row.try_get("significance_score").map_err(db_err)?,
                    structural_drivers: row.try_get("structural_drivers").map_err(db_err)?,
                    lessons: row.try_get("lessons").map_err(db_err)?,
                    counter_examples: row.try_get("counter_examples").map_err(db_err)?,
                    traditional_market_reaction: row
                        .try_get("traditional_market_reaction")
                        .map_err(db_err)?,
                })
            })
            .collect()
    }

    /// Top cases by significance, optionally restricted to an event type.
    pub async fn fetch_case_summaries(
        &self,
        event_type: Option<&str>,
        limit: i64,
    ) -> Result<Vec<HistoricalCaseSummary>> {
        let mut query = String::from(
            r#"
            SELECT id, event_name, date_range, event_type, significance_score,
                   metal_impacts, crypto_transmission, quantitative_impacts,
                   time_horizon_behavior, transmission_channels, lessons,
                   counter_examples
            FROM historical_cases
        "#,
        );
        if event_type.is_some() {
            query.push_str(" WHERE event_type = $2");
        }
        query.push_str(" ORDER BY significance_score DESC NULLS LAST LIMIT $1");
        let mut q = sqlx::query(&query).bind(limit);
        if let Some(event_type) = event_type {
            q = q.bind(event_type);
        }
        let rows = q.fetch_all(&self.pool).await.map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(HistoricalCaseSummary {
                    id: row.try_get("id").map_err(db_err)?,
                    event_name: row.try_get("event_name").map_err(db_err)?,
                    date_range: row.try_get("date_range").map_err(db_err)?,
                    event_type: row.try_get("event_type").map_err(db_err)?,
                    significance_score: row.try_get("significance_score").map_err(db_err)?,
                    metal_impacts: row.try_get("metal_impacts").map_err(db_err)?,
                    crypto_transmission: row.try_get("crypto_transmission").map_err(db_err)?,
                    quantitative_impacts: row.try_get("quantitative_impacts").map_err(db_err)?,
                    time_horizon_behavior: row
                        .try_get("time_horizon_behavior")
                        .map_err(db_err)?,
                    transmission_channels: row
                        .try_get("transmission_channels")
                        .map_err(db_err)?,
                    lessons: row.try_get("lessons").map_err(db_err)?,
                    counter_examples: row.try_get("counter_examples").map_err(db_err)?,
                })
            })
            .collect()
    }

    /// Exact nearest neighbours under L2 against the case embeddings.
    pub async fn find_similar_cases(
        &self,
        embedding: &[f32],
        limit: i64,
    ) -> Result<Vec<HistoricalMatch>> {
        let formatted = format_embedding(embedding)?;
        let rows = sqlx::query(
            r#"
            SELECT event_name, date_range, event_type, significance_score,
                   embedding <-> $1::vector AS distance
            FROM historical_cases
            WHERE embedding IS NOT NULL
            ORDER BY embedding <-> $1::vector
            LIMIT $2
        "#,
        )
        .bind(&formatted)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(HistoricalMatch {
                    event_name: row.try_get("event_name").map_err(db_err)?,
                    date_range: row.try_get("date_range").map_err(db_err)?,
                    event_type: row.try_get("event_type").map_err(db_err)?,
                    significance_score: row.try_get("significance_score").map_err(db_err)?,
                    match_method: MatchMethod::Embedding,
                    distance: Some(row.try_get("distance").map_err(db_err)?),
                    match_score: None,
                })
            })
            .collect()
    }

    pub async fn apply_embedding(
        &self,
        event_name: &str,
        date_range: &str,
        embedding: &[f32],
    ) -> Result<u64> {
        let formatted = format_embedding(embedding)?;
        let result = sqlx::query(
            r#"
            UPDATE historical_cases
            SET embedding = $3::vector
            WHERE event_name = $1 AND date_range = $2
        "#,
        )
        .bind(event_name)
        .bind(date_range)
        .bind(&formatted)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    pub async fn upsert_historical_case(&self, case: &HistoricalCaseSeed) -> Result<u64> {
        let embedding = case
            .embedding
            .as_deref()
            .map(format_embedding)
            .transpose()?;
        let result = sqlx::query(
            r#"
            INSERT INTO historical_cases (
                event_name, date_range, event_type, significance_score,
                structural_drivers, metal_impacts, traditional_market_reaction,
                crypto_reaction, crypto_transmission, time_delays, lessons,
                counter_examples, quantitative_impacts, time_horizon_behavior,
                transmission_channels, embedding
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                    $14, $15, $16::vector)
            ON CONFLICT (event_name, date_range)
            DO UPDATE SET
                event_type = EXCLUDED.event_type,
                significance_score = EXCLUDED.significance_score,
                structural_drivers = EXCLUDED.structural_drivers,
                metal_impacts = EXCLUDED.metal_impacts,
                traditional_market_reaction = EXCLUDED.traditional_market_reaction,
                crypto_reaction = EXCLUDED.crypto_reaction,
                crypto_transmission = EXCLUDED.crypto_transmission,
                time_delays = EXCLUDED.time_delays,
                lessons = EXCLUDED.lessons,
                counter_examples = EXCLUDED.counter_examples,
                quantitative_impacts = EXCLUDED.quantitative_impacts,
                time_horizon_behavior = EXCLUDED.time_horizon_behavior,
                transmission_channels = EXCLUDED.transmission_channels,
                embedding = COALESCE(EXCLUDED.embedding, historical_cases.embedding)
        "#,
        )
        .bind(&case.event_name)
        .bind(&case.date_range)
        .bind(&case.event_type)
        .bind(case.significance_score)
        .bind(&case.structural_drivers)
        .bind(&case.metal_impacts)
        .bind(&case.traditional_market_reaction)
        .bind(&case.crypto_reaction)
        .bind(&case.crypto_transmission)
        .bind(&case.time_delays)
        .bind(&case.lessons)
        .bind(&case.counter_examples)
        .bind(&case.quantitative_impacts)
        .bind(&case.time_horizon_behavior)
        .bind(&case.transmission_channels)
        .bind(embedding)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(result.rows_affected())
    }

    // ------------------------------------------------------------------
    // Metals knowledge
    // ------------------------------------------------------------------

    pub async fn upsert_metals_knowledge(&self, entries: &[MetalsKnowledgeEntry]) -> Result<u64> {
        let query = r#"
            INSERT INTO metals_knowledge (metal, category, content, updated_at)
            VALUES ($1, $2, $3, now())
            ON CONFLICT (metal, category)
            DO UPDATE SET content = EXCLUDED.content, updated_at = now()
        "#;
        let mut written = 0u64;
        for entry in entries {
            let result = sqlx::query(query)
                .bind(&entry.metal)
                .bind(&entry.category)
                .bind(&entry.content)
                .execute(&self.pool)
                .await
                .map_err(db_err)?;
            written += result.rows_affected();
        }
        Ok(written)
    }

    pub async fn fetch_metals_knowledge(&self) -> Result<Vec<MetalsKnowledgeEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT metal, category, content
            FROM metals_knowledge
            ORDER BY metal, category
        "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;
        rows.iter()
            .map(|row| {
                Ok(MetalsKnowledgeEntry {
                    metal: row.try_get("metal").map_err(db_err)?,
                    category: row.try_get("category").map_err(db_err)?,
                    content: row.try_get("content").map_err(db_err)?,
                })
            })
            .collect()
    }
}

fn map_macro_event(row: &PgRow) -> Result<MacroEventRecord> {
    Ok(MacroEventRecord {
        id: row.try_get("id").map_err(db_err)?,
        source: row.try_get("source").map_err(db_err)?,
        headline: row.try_get("headline").map_err(db_err)?,
        full_text: row.try_get("full_text").map_err(db_err)?,
        published_at: row.try_get("published_at").map_err(db_err)?,
        event_type: row.try_get("event_type").map_err(db_err)?,
        regions: row.try_get("regions").map_err(db_err)?,
        entities: row.try_get("entities").map_err(db_err)?,
        significance_score: row.try_get("significance_score").map_err(db_err)?,
    })
}

fn map_market_context(row: &PgRow) -> Result<MarketContextRecord> {
    Ok(MarketContextRecord {
        context_date: row.try_get("context_date").map_err(db_err)?,
        volatility_regime: row.try_get("volatility_regime").map_err(db_err)?,
        dollar_regime: row.try_get("dollar_regime").map_err(db_err)?,
        curve_regime: row.try_get("curve_regime").map_err(db_err)?,
        credit_regime: row.try_get("credit_regime").map_err(db_err)?,
        vix_level: row.try_get("vix_level").map_err(db_err)?,
        dxy_level: row.try_get("dxy_level").map_err(db_err)?,
        us10y_level: row.try_get("us10y_level").map_err(db_err)?,
        us2y_level: row.try_get("us2y_level").map_err(db_err)?,
        gold_level: row.try_get("gold_level").map_err(db_err)?,
        oil_level: row.try_get("oil_level").map_err(db_err)?,
        spx_level: row.try_get("spx_level").map_err(db_err)?,
        btc_level: row.try_get("btc_level").map_err(db_err)?,
        spread_2s10s: row.try_get("spread_2s10s").map_err(db_err)?,
        hy_spread: row.try_get("hy_spread").map_err(db_err)?,
        gold_silver_ratio: row.try_get("gold_silver_ratio").map_err(db_err)?,
        copper_gold_ratio: row.try_get("copper_gold_ratio").map_err(db_err)?,
        vix_term_structure: row.try_get("vix_term_structure").map_err(db_err)?,
        spy_rsp_ratio: row.try_get("spy_rsp_ratio").map_err(db_err)?,
        suggested_size_multiplier: row
            .try_get("suggested_size_multiplier")
            .map_err(db_err)?,
        raw_prices: row
            .try_get::<Option<serde_json::Value>, _>("raw_prices")
            .map_err(db_err)?
            .unwrap_or(serde_json::Value::Null),
        raw_fred: row
            .try_get::<Option<serde_json::Value>, _>("raw_fred")
            .map_err(db_err)?
            .unwrap_or(serde_json::Value::Null),
    })
}

fn json_array(value: Option<serde_json::Value>) -> Vec<serde_json::Value> {
    match value {
        Some(serde_json::Value::Array(items)) => items,
        _ => Vec::new(),
    }
}
