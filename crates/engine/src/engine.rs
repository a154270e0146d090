//! The scan engine. Fingerprints the unit, consults the cache, runs both
//! analyzers side by side, reconciles and scores their findings, then
//! records the outcome. Model trouble degrades a scan; only broken
//! configuration refuses one.

use crate::cache::{CacheStats, ScanCache};
use crate::config::EngineConfig;
use crate::core::{ScanResult, ScanUnit, SynonymMap, UnitIdentity};
use crate::error::EngineError;
use crate::fingerprint::{Fingerprint, Fingerprinter};
use crate::history::{HistoryEntry, HistorySink, NullSink};
use crate::merge::reconcile;
use crate::model::{CancelToken, ModelAnalysis, ModelAnalyzer, ModelProvider};
use crate::risk::RiskScorer;
use crate::static_analysis;
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;
use tokio::sync::Semaphore;
use tracing::debug;

pub struct ScanEngineBuilder {
    config: EngineConfig,
    provider: Option<Arc<dyn ModelProvider>>,
    cache: Option<ScanCache>,
    history: Option<Arc<dyn HistorySink>>,
}

impl ScanEngineBuilder {
    pub fn with_provider(mut self, provider: Arc<dyn ModelProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    pub fn with_cache(mut self, cache: ScanCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_history(mut self, history: Arc<dyn HistorySink>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn build(self) -> Result<ScanEngine, EngineError> {
        self.config.validate()?;

        let model_enabled = self.provider.is_some();
        let fingerprinter = Fingerprinter::new(&self.config.analysis_key(model_enabled))?;
        let cache = match self.cache {
            Some(cache) => cache,
            None => match &self.config.cache.snapshot_path {
                Some(path) => ScanCache::load(path, self.config.cache.capacity),
                None => ScanCache::new(self.config.cache.capacity),
            },
        };
        let model = self
            .provider
            .map(|provider| ModelAnalyzer::new(provider, self.config.model.clone()));
        if model.is_none() {
            debug!("no model provider configured, every scan will be degraded");
        }

        Ok(ScanEngine {
            synonyms: self.config.rules.synonym_map(),
            scorer: RiskScorer::new(self.config.scoring.clone()),
            semaphore: Semaphore::new(self.config.max_concurrent_scans),
            history: self.history.unwrap_or_else(|| Arc::new(NullSink)),
            fingerprinter,
            model,
            cache,
            inflight: Mutex::new(HashMap::new()),
            sequence: AtomicU64::new(0),
            config: self.config,
        })
    }
}

pub struct ScanEngine {
    config: EngineConfig,
    fingerprinter: Fingerprinter,
    synonyms: SynonymMap,
    scorer: RiskScorer,
    model: Option<ModelAnalyzer>,
    cache: ScanCache,
    history: Arc<dyn HistorySink>,
    semaphore: Semaphore,
    inflight: Mutex<HashMap<Fingerprint, Weak<tokio::sync::Mutex<()>>>>,
    sequence: AtomicU64,
}

impl ScanEngine {
    pub fn builder(config: EngineConfig) -> ScanEngineBuilder {
        ScanEngineBuilder {
            config,
            provider: None,
            cache: None,
            history: None,
        }
    }

    pub async fn scan(&self, unit: &ScanUnit) -> Result<Arc<ScanResult>, EngineError> {
        self.scan_with_cancel(unit, &CancelToken::new()).await
    }

    pub async fn scan_with_cancel(
        &self,
        unit: &ScanUnit,
        cancel: &CancelToken,
    ) -> Result<Arc<ScanResult>, EngineError> {
        let started = Instant::now();
        let fingerprint = self.fingerprinter.fingerprint(&unit.source);

        // Identical in-flight units queue here; the loser of the race
        // finds the winner's result in the cache.
        let flight = self.flight_lock(&fingerprint);
        let _flight_guard = flight.lock().await;

        if self.config.cache.enabled {
            if let Some(result) = self.cache.get(&fingerprint) {
                self.record_history(&result, true);
                return Ok(result);
            }
        }

        let permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| EngineError::Internal("scan semaphore closed".to_string()))?;

        // tree-sitter parsing is CPU-bound, so the static pass runs on a
        // blocking thread while the model pass waits on the network.
        let path = unit.path.clone();
        let source = unit.source.clone();
        let rules = self.config.rules.clone();
        let static_task =
            tokio::task::spawn_blocking(move || static_analysis::analyze(&path, &source, &rules));

        let model_future = async {
            match &self.model {
                Some(analyzer) => analyzer.analyze(&unit.path, &unit.source, cancel).await,
                None => ModelAnalysis::disabled(),
            }
        };

        let (static_pass, model_analysis) = tokio::join!(static_task, model_future);
        drop(permit);
        let static_pass = static_pass
            .map_err(|e| EngineError::Internal(format!("static analysis task failed: {e}")))?;

        let findings = reconcile(
            static_pass.findings,
            model_analysis.findings,
            &static_pass.statements,
            &self.config.merge,
            &self.synonyms,
        );
        let risk_score = self.scorer.score(&findings);

        let result = Arc::new(ScanResult::new(
            UnitIdentity {
                path: unit.path.clone(),
                fingerprint: fingerprint.clone(),
            },
            findings,
            risk_score,
            model_analysis.degraded,
            model_analysis.summary,
            started.elapsed().as_millis() as u64,
        ));

        if self.config.cache.enabled && !model_analysis.transient {
            self.cache.put(
                fingerprint,
                Arc::clone(&result),
                chrono::Duration::hours(self.config.cache.ttl_hours as i64),
            );
        } else if model_analysis.transient {
            debug!(path = %unit.path, "transient degradation, result not cached");
        }

        self.record_history(&result, false);
        Ok(result)
    }

    /// Writes the cache snapshot if one is configured.
    pub fn flush(&self) -> anyhow::Result<()> {
        if let Some(path) = &self.config.cache.snapshot_path {
            self.cache.persist(path)?;
        }
        Ok(())
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn model_enabled(&self) -> bool {
        self.model.is_some()
    }

    fn record_history(&self, result: &Arc<ScanResult>, cache_hit: bool) {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let scan_id = format!("scan-{}-{sequence}", Utc::now().timestamp_millis());
        self.history
            .record(HistoryEntry::from_result(sequence, scan_id, result, cache_hit));
    }

    fn flight_lock(&self, fingerprint: &Fingerprint) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = self.inflight.lock();
        if let Some(weak) = inflight.get(fingerprint) {
            if let Some(existing) = weak.upgrade() {
                return existing;
            }
        }
        let lock = Arc::new(tokio::sync::Mutex::new(()));
        inflight.insert(fingerprint.clone(), Arc::downgrade(&lock));
        if inflight.len() > 64 {
            inflight.retain(|_, weak| weak.strong_count() > 0);
        }
        lock
    }
}
