//! Persistence store (C13, spec.md §4.13).
//!
//! Relational schema — brands, scenarios, runs, content_assets,
//! dimension_scores, truststack_summary — with foreign-key cascades, backed
//! by `sqlx`'s runtime query API (no compile-time `query!` macros, since
//! there is no live database to check them against in this environment).
//! Grounded in `original_source/data/store.py` and `original_source/data/
//! models.py` for the table shape and helper-function set; translated from
//! SQLAlchemy ORM sessions to explicit `sqlx::SqlitePool` queries, matching
//! `dashflow-sql-database`'s use of `sqlx::{Row, Column}` for row access.

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::{Row, SqlitePool};

use crate::error::{Error, Result};
use crate::models::{AssetSourceType, Brand, ContentAsset, DimensionScores, Modality, Run, RunStatus, Scenario, TrustStackSummary};

pub async fn connect(database_url: &str) -> Result<SqlitePool> {
    SqlitePoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(Error::Persistence)
}

/// Create every table if it does not already exist. Idempotent, safe to call
/// on every process startup (spec.md §4.13: "relational schema ... with
/// foreign-key cascades").
pub async fn init_db(pool: &SqlitePool) -> Result<()> {
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS brands (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            industry TEXT,
            primary_domains TEXT NOT NULL DEFAULT '[]',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS scenarios (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            slug TEXT NOT NULL UNIQUE,
            name TEXT NOT NULL,
            description TEXT,
            config TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS runs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            external_id TEXT NOT NULL UNIQUE,
            brand_id INTEGER NOT NULL REFERENCES brands(id) ON DELETE CASCADE,
            scenario_id INTEGER NOT NULL REFERENCES scenarios(id) ON DELETE CASCADE,
            status TEXT NOT NULL,
            started_at TEXT NOT NULL,
            finished_at TEXT,
            config TEXT NOT NULL DEFAULT '{}',
            error_message TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS content_assets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL REFERENCES runs(id) ON DELETE CASCADE,
            source_type TEXT NOT NULL,
            channel TEXT,
            url TEXT,
            external_id TEXT,
            title TEXT,
            raw_content TEXT,
            normalized_content TEXT,
            modality TEXT NOT NULL,
            language TEXT,
            screenshot_path TEXT,
            visual_analysis TEXT,
            meta_info TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS dimension_scores (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            asset_id INTEGER NOT NULL REFERENCES content_assets(id) ON DELETE CASCADE,
            provenance REAL NOT NULL,
            verification REAL NOT NULL,
            transparency REAL NOT NULL,
            coherence REAL NOT NULL,
            resonance REAL NOT NULL,
            overall_score REAL NOT NULL,
            classification TEXT NOT NULL,
            rationale TEXT NOT NULL DEFAULT '{}',
            flags TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS truststack_summary (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            run_id INTEGER NOT NULL UNIQUE REFERENCES runs(id) ON DELETE CASCADE,
            avg_provenance REAL,
            avg_verification REAL,
            avg_transparency REAL,
            avg_coherence REAL,
            avg_resonance REAL,
            authenticity_ratio REAL,
            overall_trust_stack_score REAL,
            insights TEXT NOT NULL DEFAULT '{}'
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn modality_as_str(modality: Modality) -> &'static str {
    match modality {
        Modality::Text => "text",
        Modality::Image => "image",
        Modality::Video => "video",
        Modality::Audio => "audio",
    }
}

fn modality_from_str(s: &str) -> Modality {
    match s {
        "image" => Modality::Image,
        "video" => Modality::Video,
        "audio" => Modality::Audio,
        _ => Modality::Text,
    }
}

fn asset_source_type_as_str(source_type: AssetSourceType) -> &'static str {
    match source_type {
        AssetSourceType::Web => "web",
        AssetSourceType::Reddit => "reddit",
        AssetSourceType::Youtube => "youtube",
        AssetSourceType::Brave => "brave",
        AssetSourceType::Serper => "serper",
        AssetSourceType::Social => "social",
    }
}

fn asset_source_type_from_str(s: &str) -> AssetSourceType {
    match s {
        "reddit" => AssetSourceType::Reddit,
        "youtube" => AssetSourceType::Youtube,
        "brave" => AssetSourceType::Brave,
        "serper" => AssetSourceType::Serper,
        "social" => AssetSourceType::Social,
        _ => AssetSourceType::Web,
    }
}

pub async fn get_or_create_brand(pool: &SqlitePool, slug: &str, name: Option<&str>, primary_domains: &[String]) -> Result<Brand> {
    if let Some(row) = sqlx::query("SELECT id, slug, name, industry, primary_domains, created_at FROM brands WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
    {
        return Ok(row_to_brand(&row)?);
    }

    let now = Utc::now();
    let domains_json = serde_json::to_string(primary_domains)?;
    let id = sqlx::query("INSERT INTO brands (slug, name, industry, primary_domains, created_at) VALUES (?, ?, NULL, ?, ?)")
        .bind(slug)
        .bind(name.unwrap_or(slug))
        .bind(&domains_json)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Brand {
        id,
        slug: slug.to_string(),
        name: name.unwrap_or(slug).to_string(),
        industry: None,
        primary_domains: primary_domains.to_vec(),
        created_at: now,
    })
}

fn row_to_brand(row: &sqlx::sqlite::SqliteRow) -> Result<Brand> {
    let primary_domains_raw: String = row.try_get("primary_domains")?;
    Ok(Brand {
        id: row.try_get("id")?,
        slug: row.try_get("slug")?,
        name: row.try_get("name")?,
        industry: row.try_get("industry")?,
        primary_domains: serde_json::from_str(&primary_domains_raw).unwrap_or_default(),
        created_at: parse_rfc3339(row.try_get("created_at")?),
    })
}

pub async fn get_or_create_scenario(
    pool: &SqlitePool,
    slug: &str,
    name: Option<&str>,
    description: Option<&str>,
    config: serde_json::Value,
) -> Result<Scenario> {
    if let Some(row) = sqlx::query("SELECT id, slug, name, description, config FROM scenarios WHERE slug = ?")
        .bind(slug)
        .fetch_optional(pool)
        .await?
    {
        return Ok(Scenario {
            id: row.try_get("id")?,
            slug: row.try_get("slug")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            config: serde_json::from_str(&row.try_get::<String, _>("config")?).unwrap_or_default(),
        });
    }

    let config_json = serde_json::to_string(&config)?;
    let id = sqlx::query("INSERT INTO scenarios (slug, name, description, config) VALUES (?, ?, ?, ?)")
        .bind(slug)
        .bind(name.unwrap_or(slug))
        .bind(description)
        .bind(&config_json)
        .execute(pool)
        .await?
        .last_insert_rowid();

    Ok(Scenario { id, slug: slug.to_string(), name: name.unwrap_or(slug).to_string(), description: description.map(str::to_string), config })
}

pub async fn create_run(pool: &SqlitePool, brand_id: i64, scenario_id: i64, external_id: &str, config: serde_json::Value) -> Result<Run> {
    let now = Utc::now();
    let config_json = serde_json::to_string(&config)?;
    let id = sqlx::query(
        "INSERT INTO runs (external_id, brand_id, scenario_id, status, started_at, config) VALUES (?, ?, ?, 'pending', ?, ?)",
    )
    .bind(external_id)
    .bind(brand_id)
    .bind(scenario_id)
    .bind(now.to_rfc3339())
    .bind(&config_json)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(Run {
        id,
        external_id: external_id.to_string(),
        brand_id,
        scenario_id,
        status: RunStatus::Pending,
        started_at: now,
        finished_at: None,
        config,
        error_message: None,
    })
}

pub async fn update_run_status(pool: &SqlitePool, run_id: i64, status: RunStatus, error_message: Option<&str>) -> Result<()> {
    let finished_at = matches!(status, RunStatus::Completed | RunStatus::Failed).then(|| Utc::now().to_rfc3339());

    let result = sqlx::query("UPDATE runs SET status = ?, finished_at = COALESCE(?, finished_at), error_message = COALESCE(?, error_message) WHERE id = ?")
        .bind(status.as_str())
        .bind(finished_at)
        .bind(error_message)
        .bind(run_id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(Error::RunNotFound(run_id.to_string()));
    }
    Ok(())
}

/// One asset to insert; callers build this from a [`crate::models::NormalizedContent`]
/// plus fetch outcome before persisting.
pub struct NewAsset {
    pub source_type: AssetSourceType,
    pub channel: Option<String>,
    pub url: Option<String>,
    pub external_id: Option<String>,
    pub title: Option<String>,
    pub raw_content: Option<String>,
    pub normalized_content: Option<String>,
    pub modality: Modality,
    pub language: Option<String>,
    pub screenshot_path: Option<String>,
    pub visual_analysis: Option<serde_json::Value>,
    pub meta_info: serde_json::Value,
}

pub async fn bulk_insert_assets(pool: &SqlitePool, run_id: i64, assets: Vec<NewAsset>) -> Result<Vec<ContentAsset>> {
    let mut out = Vec::with_capacity(assets.len());
    let now = Utc::now();

    for asset in assets {
        let visual_analysis_json = asset.visual_analysis.as_ref().map(serde_json::to_string).transpose()?;
        let meta_info_json = serde_json::to_string(&asset.meta_info)?;

        let id = sqlx::query(
            r#"INSERT INTO content_assets
               (run_id, source_type, channel, url, external_id, title, raw_content, normalized_content,
                modality, language, screenshot_path, visual_analysis, meta_info, created_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(run_id)
        .bind(asset_source_type_as_str(asset.source_type))
        .bind(&asset.channel)
        .bind(&asset.url)
        .bind(&asset.external_id)
        .bind(&asset.title)
        .bind(&asset.raw_content)
        .bind(&asset.normalized_content)
        .bind(modality_as_str(asset.modality))
        .bind(&asset.language)
        .bind(&asset.screenshot_path)
        .bind(&visual_analysis_json)
        .bind(&meta_info_json)
        .bind(now.to_rfc3339())
        .execute(pool)
        .await?
        .last_insert_rowid();

        out.push(ContentAsset {
            id,
            run_id,
            source_type: asset.source_type,
            channel: asset.channel,
            url: asset.url,
            external_id: asset.external_id,
            title: asset.title,
            raw_content: asset.raw_content,
            normalized_content: asset.normalized_content,
            modality: asset.modality,
            language: asset.language,
            screenshot_path: asset.screenshot_path,
            visual_analysis: asset.visual_analysis,
            meta_info: asset.meta_info,
            created_at: now,
        });
    }

    Ok(out)
}

pub struct NewDimensionScores {
    pub asset_id: i64,
    pub provenance: f64,
    pub verification: f64,
    pub transparency: f64,
    pub coherence: f64,
    pub resonance: f64,
    pub overall_score: f64,
    pub classification: String,
    pub rationale: serde_json::Value,
    pub flags: serde_json::Value,
}

pub async fn insert_dimension_scores(pool: &SqlitePool, scores: NewDimensionScores) -> Result<DimensionScores> {
    let now = Utc::now();
    let rationale_json = serde_json::to_string(&scores.rationale)?;
    let flags_json = serde_json::to_string(&scores.flags)?;

    let id = sqlx::query(
        r#"INSERT INTO dimension_scores
           (asset_id, provenance, verification, transparency, coherence, resonance, overall_score, classification, rationale, flags, created_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(scores.asset_id)
    .bind(scores.provenance)
    .bind(scores.verification)
    .bind(scores.transparency)
    .bind(scores.coherence)
    .bind(scores.resonance)
    .bind(scores.overall_score)
    .bind(&scores.classification)
    .bind(&rationale_json)
    .bind(&flags_json)
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(DimensionScores {
        id,
        asset_id: scores.asset_id,
        provenance: scores.provenance,
        verification: scores.verification,
        transparency: scores.transparency,
        coherence: scores.coherence,
        resonance: scores.resonance,
        overall_score: scores.overall_score,
        classification: scores.classification,
        rationale: scores.rationale,
        flags: scores.flags,
        created_at: now,
    })
}

pub async fn create_truststack_summary(pool: &SqlitePool, summary: TrustStackSummary) -> Result<TrustStackSummary> {
    let insights_json = serde_json::to_string(&summary.insights)?;

    let id = sqlx::query(
        r#"INSERT INTO truststack_summary
           (run_id, avg_provenance, avg_verification, avg_transparency, avg_coherence, avg_resonance,
            authenticity_ratio, overall_trust_stack_score, insights)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(summary.run_id)
    .bind(summary.avg_provenance)
    .bind(summary.avg_verification)
    .bind(summary.avg_transparency)
    .bind(summary.avg_coherence)
    .bind(summary.avg_resonance)
    .bind(summary.authenticity_ratio)
    .bind(summary.overall_trust_stack_score)
    .bind(&insights_json)
    .execute(pool)
    .await?
    .last_insert_rowid();

    Ok(TrustStackSummary { id, ..summary })
}

/// Smart-reuse query (spec.md §4.12 step 3 / §4.13): assets for `brand_slug`
/// whose owning run started within `max_age_hours`, the run did not fail,
/// and the asset actually carries content.
pub async fn find_recent_assets_by_brand(pool: &SqlitePool, brand_slug: &str, max_age_hours: i64) -> Result<Vec<ContentAsset>> {
    let cutoff = (Utc::now() - chrono::Duration::hours(max_age_hours)).to_rfc3339();

    let rows = sqlx::query(
        r#"
        SELECT ca.* FROM content_assets ca
        JOIN runs r ON ca.run_id = r.id
        JOIN brands b ON r.brand_id = b.id
        WHERE b.slug = ?
          AND r.started_at >= ?
          AND r.status != 'failed'
          AND ca.raw_content IS NOT NULL
          AND ca.raw_content != ''
        "#,
    )
    .bind(brand_slug)
    .bind(&cutoff)
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_content_asset).collect()
}

fn row_to_content_asset(row: &sqlx::sqlite::SqliteRow) -> Result<ContentAsset> {
    let meta_info_raw: String = row.try_get("meta_info")?;
    let visual_analysis_raw: Option<String> = row.try_get("visual_analysis")?;

    Ok(ContentAsset {
        id: row.try_get("id")?,
        run_id: row.try_get("run_id")?,
        source_type: asset_source_type_from_str(&row.try_get::<String, _>("source_type")?),
        channel: row.try_get("channel")?,
        url: row.try_get("url")?,
        external_id: row.try_get("external_id")?,
        title: row.try_get("title")?,
        raw_content: row.try_get("raw_content")?,
        normalized_content: row.try_get("normalized_content")?,
        modality: modality_from_str(&row.try_get::<String, _>("modality")?),
        language: row.try_get("language")?,
        screenshot_path: row.try_get("screenshot_path")?,
        visual_analysis: visual_analysis_raw.and_then(|s| serde_json::from_str(&s).ok()),
        meta_info: serde_json::from_str(&meta_info_raw).unwrap_or_default(),
        created_at: parse_rfc3339(row.try_get("created_at")?),
    })
}

/// Delete runs older than `days_to_keep`; foreign-key cascades remove their
/// assets, dimension scores and summary (spec.md §4.13).
pub async fn prune_old_runs(pool: &SqlitePool, days_to_keep: i64) -> Result<u64> {
    let cutoff = (Utc::now() - chrono::Duration::days(days_to_keep)).to_rfc3339();
    let result = sqlx::query("DELETE FROM runs WHERE started_at < ?").bind(&cutoff).execute(pool).await?;
    Ok(result.rows_affected())
}

fn parse_rfc3339(s: String) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(&s).map(|dt| dt.with_timezone(&Utc)).unwrap_or_else(|_| Utc::now())
}
