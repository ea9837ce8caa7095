//! End-to-end report pipeline: window → fetch → normalize → assemble →
//! split → publish → record.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use chrono::Utc;
use tracing::{info, instrument, warn};

use reportcast_connectors::build_connectors;
use reportcast_normalize::{Order, normalize_orders};
use reportcast_publish::KbPublisher;
use reportcast_report::{
    composite_chunks, composite_title, detail_document, order_chunk, orders_summary_section,
    text_section,
};
use reportcast_shared::{
    Chunk, KnowledgeBaseConfig, ReportDocument, ReportcastError, ReportingWindow, Result, RunId,
    Section, SourceConfig, SourceResult, SourceStatus, resolve_kb_credentials,
};
use reportcast_storage::Storage;

/// Configuration for one `run` invocation, after CLI/file merging.
#[derive(Debug, Clone)]
pub struct RunConfig {
    /// Resolved reporting window (before per-source lag adjustment).
    pub window: ReportingWindow,
    /// Sources to fetch, in report order.
    pub sources: Vec<SourceConfig>,
    /// KB endpoint settings.
    pub knowledge_base: KnowledgeBaseConfig,
    /// Directory for generated report files.
    pub output_dir: PathBuf,
    /// Path to the run-history database.
    pub db_path: PathBuf,
    /// Generate reports but push nothing.
    pub skip_publish: bool,
}

/// Result of one pipeline run.
#[derive(Debug)]
pub struct RunSummary {
    /// Run identifier (also the storage key).
    pub run_id: RunId,
    /// Timestamp token embedded in file names and chunk labels.
    pub run_stamp: String,
    /// The window the run reported on.
    pub window: ReportingWindow,
    /// Per-source statuses, in fetch order.
    pub source_statuses: Vec<(String, SourceStatus)>,
    /// Normalized order records across all record sources.
    pub order_count: usize,
    /// Written composite report file, when the run got that far.
    pub report_path: Option<PathBuf>,
    /// Written order detail file, when orders were present.
    pub detail_path: Option<PathBuf>,
    /// Chunks prepared for publishing.
    pub chunks_total: usize,
    /// Chunks the KB acknowledged.
    pub published_ok: usize,
    /// Chunks that failed to publish.
    pub published_failed: usize,
    /// Set when publishing was skipped entirely, with the reason.
    pub publish_skipped: Option<String>,
    /// Set when a shutdown request stopped the run early.
    pub interrupted: bool,
    /// Total elapsed time.
    pub elapsed: std::time::Duration,
}

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each source fetch completes.
    fn source_fetched(&self, source: &str, status: SourceStatus);
    /// Called after each chunk publish attempt.
    fn chunk_published(&self, label: &str, success: bool, current: usize, total: usize);
    /// Called when the pipeline completes.
    fn done(&self, summary: &RunSummary);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn source_fetched(&self, _source: &str, _status: SourceStatus) {}
    fn chunk_published(&self, _label: &str, _success: bool, _current: usize, _total: usize) {}
    fn done(&self, _summary: &RunSummary) {}
}

/// Timestamp token for file names and composite chunk labels.
pub fn run_stamp() -> String {
    Utc::now().format("%Y-%m-%d_%H-%M-%S").to_string()
}

/// Run the full report pipeline.
///
/// 1. Fetch every configured source (lag-adjusted window, fail closed)
/// 2. Normalize record sources into orders
/// 3. Assemble the composite report (+ order detail document)
/// 4. Split into labeled chunks
/// 5. Publish chunks to the KB, rate limited
/// 6. Persist the run, source statuses, and publish outcomes
///
/// The shutdown flag is checked between phases and between publish calls;
/// when set, the run records itself as interrupted and returns what it has.
#[instrument(skip_all, fields(window_start = %config.window.start, window_end = %config.window.end))]
pub async fn run_report(
    config: &RunConfig,
    progress: &dyn ProgressReporter,
    shutdown: Arc<AtomicBool>,
) -> Result<RunSummary> {
    let start = Instant::now();
    let run_id = RunId::new();
    let stamp = run_stamp();

    info!(%run_id, run_stamp = %stamp, "starting report run");

    // Connector misconfiguration (unknown kind) is fatal before any work.
    let connectors = build_connectors(&config.sources)?;

    progress.phase("Opening run history");
    let storage = Storage::open(&config.db_path).await?;
    storage
        .insert_run(
            &run_id,
            &stamp,
            &config.window.start.to_string(),
            &config.window.end.to_string(),
        )
        .await?;

    let mut summary = RunSummary {
        run_id: run_id.clone(),
        run_stamp: stamp.clone(),
        window: config.window,
        source_statuses: Vec::new(),
        order_count: 0,
        report_path: None,
        detail_path: None,
        chunks_total: 0,
        published_ok: 0,
        published_failed: 0,
        publish_skipped: None,
        interrupted: false,
        elapsed: start.elapsed(),
    };

    // --- Phase 1: Fetch ---
    progress.phase("Fetching sources");
    let mut sections: Vec<Section> = Vec::new();
    let mut all_orders: Vec<Order> = Vec::new();

    for connector in &connectors {
        if shutdown.load(Ordering::Relaxed) {
            return interrupt(&storage, &run_id, summary, start, progress).await;
        }

        let source_window = config.window.for_lag(connector.lag_days());
        let name = connector.name().to_string();
        let result = connector.fetch(&source_window).await;

        let (section, status, detail) = match result {
            SourceResult::Text(ts) => {
                let status = ts.status;
                let detail = status.is_degraded().then(|| ts.body.clone());
                (text_section(ts), status, detail)
            }
            SourceResult::Records(records) => {
                let orders = normalize_orders(&records);
                let section = orders_summary_section(&name, &orders);
                let status = section.status;
                summary.order_count += orders.len();
                all_orders.extend(orders);
                (section, status, None)
            }
        };

        progress.source_fetched(&name, status);
        storage
            .insert_source_result(&run_id, &name, status, detail.as_deref())
            .await?;
        summary.source_statuses.push((name, status));
        sections.push(section);
    }

    // --- Phase 2: Assemble ---
    progress.phase("Assembling report");
    let mut document = ReportDocument::new(composite_title(config.window.end));
    for section in &sections {
        document.push(section.clone());
    }

    if document.all_degraded() {
        warn!("every source failed or was empty, skipping report emission");
        storage
            .finish_run(&run_id, "skipped", Some("all sources degraded"))
            .await?;
        summary.publish_skipped = Some("all sources degraded".into());
        summary.elapsed = start.elapsed();
        progress.done(&summary);
        return Ok(summary);
    }

    std::fs::create_dir_all(&config.output_dir)
        .map_err(|e| ReportcastError::io(&config.output_dir, e))?;

    let report_path = config.output_dir.join(format!("report_main_{stamp}.md"));
    std::fs::write(&report_path, document.render())
        .map_err(|e| ReportcastError::io(&report_path, e))?;
    info!(path = %report_path.display(), "wrote composite report");
    summary.report_path = Some(report_path);

    if !all_orders.is_empty() {
        let detail_path = config
            .output_dir
            .join(format!("woo_orders_detail_{stamp}.md"));
        let detail = detail_document("WooCommerce Order Details", &config.window, &all_orders);
        std::fs::write(&detail_path, detail)
            .map_err(|e| ReportcastError::io(&detail_path, e))?;
        info!(path = %detail_path.display(), "wrote order detail report");
        summary.detail_path = Some(detail_path);
    }

    // --- Phase 3: Split ---
    let mut chunks: Vec<Chunk> = Vec::new();
    for (idx, section) in sections.iter().enumerate() {
        chunks.extend(composite_chunks(&section.render(), idx, &stamp));
    }
    for order in &all_orders {
        chunks.push(order_chunk(&format!("Order {}", order.id), order));
    }
    summary.chunks_total = chunks.len();
    info!(chunks = chunks.len(), "report split into chunks");

    // --- Phase 4: Publish ---
    if shutdown.load(Ordering::Relaxed) {
        return interrupt(&storage, &run_id, summary, start, progress).await;
    }

    let skip_reason = if config.skip_publish {
        Some("publishing disabled (--skip-publish)".to_string())
    } else {
        match resolve_kb_credentials(&config.knowledge_base) {
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "KB credentials unavailable, skipping publish");
                Some(format!("KB credentials unavailable: {e}"))
            }
        }
    };

    if let Some(reason) = skip_reason {
        storage
            .finish_run(&run_id, "completed", Some(&format!("publish skipped: {reason}")))
            .await?;
        summary.publish_skipped = Some(reason);
        summary.elapsed = start.elapsed();
        progress.done(&summary);
        return Ok(summary);
    }

    progress.phase("Publishing to knowledge base");
    // Credentials were just verified; resolve again to move them in.
    let credentials = resolve_kb_credentials(&config.knowledge_base)?;
    let publisher = KbPublisher::new(&config.knowledge_base, credentials)?;

    let total = chunks.len();
    for (i, chunk) in chunks.into_iter().enumerate() {
        if shutdown.load(Ordering::Relaxed) {
            return interrupt(&storage, &run_id, summary, start, progress).await;
        }

        let label = chunk.label.clone();
        let outcome = publisher.publish(chunk).await;
        publisher.throttle().await;

        progress.chunk_published(&label, outcome.success, i + 1, total);
        if outcome.success {
            summary.published_ok += 1;
        } else {
            summary.published_failed += 1;
        }
        storage.insert_publish_outcome(&run_id, &outcome).await?;
    }

    // --- Phase 5: Record ---
    let detail = format!("{}/{} chunks published", summary.published_ok, total);
    storage.finish_run(&run_id, "completed", Some(&detail)).await?;

    summary.elapsed = start.elapsed();
    info!(
        published_ok = summary.published_ok,
        published_failed = summary.published_failed,
        elapsed_ms = summary.elapsed.as_millis() as u64,
        "report run finished"
    );
    progress.done(&summary);
    Ok(summary)
}

/// Record an interrupted run and hand back the partial summary.
async fn interrupt(
    storage: &Storage,
    run_id: &RunId,
    mut summary: RunSummary,
    start: Instant,
    progress: &dyn ProgressReporter,
) -> Result<RunSummary> {
    warn!(%run_id, "shutdown requested, stopping run");
    storage.finish_run(run_id, "interrupted", None).await?;
    summary.interrupted = true;
    summary.elapsed = start.elapsed();
    progress.done(&summary);
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reportcast_shared::SourceConfig;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn temp_dir(tag: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("rc_core_{tag}_{}", Uuid::now_v7()));
        std::fs::create_dir_all(&dir).expect("create temp dir");
        dir
    }

    fn clarity_source(dir: &PathBuf, content: Option<&str>) -> SourceConfig {
        let file = dir.join("insights.txt");
        if let Some(content) = content {
            std::fs::write(&file, content).expect("write insights");
        }
        SourceConfig {
            name: "Clarity Insights".into(),
            kind: "clarity".into(),
            lag_days: 0,
            endpoint: None,
            key_env: None,
            secret_env: None,
            path: Some(file.to_string_lossy().into_owned()),
        }
    }

    fn run_config(dir: &PathBuf, sources: Vec<SourceConfig>) -> RunConfig {
        RunConfig {
            window: ReportingWindow::trailing("2026-08-29".parse().unwrap(), 7),
            sources,
            knowledge_base: KnowledgeBaseConfig::default(),
            output_dir: dir.join("out"),
            db_path: dir.join("runs.db"),
            skip_publish: true,
        }
    }

    fn no_shutdown() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn run_stamp_is_sortable_and_filename_safe() {
        let stamp = run_stamp();
        assert_eq!(stamp.len(), "2026-08-29_10-00-00".len());
        assert!(stamp.chars().all(|c| c.is_ascii_digit() || c == '-' || c == '_'));
    }

    #[tokio::test]
    async fn run_writes_report_and_records_history() {
        let dir = temp_dir("report");
        let config = run_config(&dir, vec![clarity_source(&dir, Some("- Insight one\n"))]);

        let summary = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .expect("run");

        assert!(!summary.interrupted);
        assert_eq!(summary.source_statuses.len(), 1);
        assert_eq!(summary.source_statuses[0].1, SourceStatus::Ok);
        assert!(summary.publish_skipped.is_some());

        let report_path = summary.report_path.expect("report written");
        let report = std::fs::read_to_string(&report_path).expect("read report");
        assert!(report.starts_with("# Combined Data Report - 2026-08-29"));
        assert!(report.contains("### Clarity Insights"));
        assert!(report.contains("- Insight one"));
        // No record source, no detail file.
        assert!(summary.detail_path.is_none());

        let storage = Storage::open(&config.db_path).await.expect("open db");
        let runs = storage.list_runs(10).await.expect("list runs");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status, "completed");
        assert_eq!(runs[0].window_end, "2026-08-29");
    }

    #[tokio::test]
    async fn mixed_status_sources_keep_order_and_tally() {
        let dir = temp_dir("mixed");
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        // SAFETY: test-only, unique var name.
        unsafe { std::env::set_var("RC_CORE_TEST_MC_KEY", "mc-key") };

        let ok = clarity_source(&dir, Some("- Insight one\n"));
        let warning = SourceConfig {
            name: "Missing Insights".into(),
            kind: "clarity".into(),
            lag_days: 0,
            endpoint: None,
            key_env: None,
            secret_env: None,
            path: Some(dir.join("absent.txt").to_string_lossy().into_owned()),
        };
        let error = SourceConfig {
            name: "Mailchimp Data".into(),
            kind: "mailchimp".into(),
            lag_days: 0,
            endpoint: Some(server.uri()),
            key_env: Some("RC_CORE_TEST_MC_KEY".into()),
            secret_env: None,
            path: None,
        };
        let config = run_config(&dir, vec![ok, warning, error]);

        let summary = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .expect("run");

        assert_eq!(summary.source_statuses.len(), 3);
        assert_eq!(summary.source_statuses[0].1, SourceStatus::Ok);
        assert_eq!(summary.source_statuses[1].1, SourceStatus::Warning);
        assert_eq!(summary.source_statuses[2].1, SourceStatus::Error);

        // One healthy source is enough to emit, degraded sections included.
        let report_path = summary.report_path.expect("report written");
        let report = std::fs::read_to_string(&report_path).expect("read report");
        let first = report.find("### Clarity Insights").expect("ok section");
        let second = report
            .find("### Missing Insights (warning)")
            .expect("warning section");
        let third = report
            .find("### Mailchimp Data (error)")
            .expect("error section");
        assert!(first < second && second < third);
        assert_eq!(report.matches("\n\n---\n\n").count(), 2);

        let storage = Storage::open(&config.db_path).await.expect("open db");
        let sources = storage
            .source_results_for_run(&summary.run_id)
            .await
            .expect("source results");
        let statuses: Vec<&str> = sources.iter().map(|(_, s, _)| s.as_str()).collect();
        assert_eq!(statuses, ["ok", "warning", "error"]);
    }

    #[tokio::test]
    async fn all_degraded_run_skips_emission() {
        let dir = temp_dir("degraded");
        // File never written: the only source comes back as a warning.
        let config = run_config(&dir, vec![clarity_source(&dir, None)]);

        let summary = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .expect("run");

        assert!(summary.report_path.is_none());
        assert_eq!(summary.chunks_total, 0);
        assert_eq!(summary.publish_skipped.as_deref(), Some("all sources degraded"));

        let storage = Storage::open(&config.db_path).await.expect("open db");
        let runs = storage.list_runs(10).await.expect("list runs");
        assert_eq!(runs[0].status, "skipped");
        // The degraded fetch itself is still on record.
        let sources = storage
            .source_results_for_run(&summary.run_id)
            .await
            .expect("source results");
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0].1, "warning");
    }

    #[tokio::test]
    async fn shutdown_flag_interrupts_before_fetch() {
        let dir = temp_dir("shutdown");
        let config = run_config(&dir, vec![clarity_source(&dir, Some("- x\n"))]);

        let summary = run_report(&config, &SilentProgress, Arc::new(AtomicBool::new(true)))
            .await
            .expect("run");

        assert!(summary.interrupted);
        assert!(summary.source_statuses.is_empty());
        let storage = Storage::open(&config.db_path).await.expect("open db");
        assert_eq!(storage.list_runs(10).await.expect("runs")[0].status, "interrupted");
    }

    #[tokio::test]
    async fn publishes_chunks_and_tallies_outcomes() {
        let dir = temp_dir("publish");
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/core/dataset/data/push"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"data": {"insertLen": 1}})),
            )
            .mount(&server)
            .await;

        // SAFETY: test-only, unique var names.
        unsafe {
            std::env::set_var("RC_CORE_TEST_KB_KEY", "kb-key");
            std::env::set_var("RC_CORE_TEST_KB_COLLECTION", "col-1");
        }

        let mut config = run_config(&dir, vec![clarity_source(&dir, Some("- Insight one\n"))]);
        config.skip_publish = false;
        config.knowledge_base = KnowledgeBaseConfig {
            base_url: server.uri(),
            api_key_env: "RC_CORE_TEST_KB_KEY".into(),
            collection_id_env: "RC_CORE_TEST_KB_COLLECTION".into(),
            rate_limit_ms: 1,
            ..Default::default()
        };

        let summary = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .expect("run");

        assert!(summary.publish_skipped.is_none());
        assert_eq!(summary.chunks_total, 1);
        assert_eq!(summary.published_ok, 1);
        assert_eq!(summary.published_failed, 0);

        let storage = Storage::open(&config.db_path).await.expect("open db");
        let outcomes = storage
            .outcomes_for_run(&summary.run_id)
            .await
            .expect("outcomes");
        assert_eq!(outcomes.len(), 1);
        assert!(outcomes[0].success);
        assert!(outcomes[0].label.starts_with("main_part1_section1_"));
    }

    #[tokio::test]
    async fn missing_kb_credentials_skip_publish_but_keep_report() {
        let dir = temp_dir("nocreds");
        let mut config = run_config(&dir, vec![clarity_source(&dir, Some("- x\n"))]);
        config.skip_publish = false;
        // base_url set but env vars absent.
        config.knowledge_base = KnowledgeBaseConfig {
            base_url: "https://kb.example.com".into(),
            api_key_env: "RC_CORE_TEST_UNSET_KEY".into(),
            ..Default::default()
        };

        let summary = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .expect("run");

        assert!(summary.report_path.is_some());
        assert_eq!(summary.published_ok + summary.published_failed, 0);
        assert!(
            summary
                .publish_skipped
                .expect("skip reason")
                .contains("RC_CORE_TEST_UNSET_KEY")
        );
    }

    #[tokio::test]
    async fn unknown_source_kind_fails_before_any_work() {
        let dir = temp_dir("badkind");
        let config = run_config(
            &dir,
            vec![SourceConfig {
                name: "Mystery".into(),
                kind: "telepathy".into(),
                lag_days: 0,
                endpoint: None,
                key_env: None,
                secret_env: None,
                path: None,
            }],
        );

        let err = run_report(&config, &SilentProgress, no_shutdown())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("telepathy"));
        // Nothing was recorded.
        assert!(!config.db_path.exists());
    }
}
