//! Self-diagnosis: health checks, recommendations, and canned test queries.
//!
//! [`diagnose`] probes each collaborator independently (index, embedding
//! model, generation backend, retrieval) so one failure does not hide the
//! state of the others. [`run_full_diagnosis`] adds four canned questions
//! and an overall assessment; [`save_report`] writes the result as a
//! timestamped JSON file.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Local;
use serde::Serialize;

use marks_rag_core::stats::QueryStatistics;

use crate::pipeline::{Pipeline, QueryOptions, SystemStats};
use crate::retrieval::{retrieve, RetrievalOptions};

/// Canned questions and their marks, run by [`run_full_diagnosis`].
pub const TEST_QUERIES: [(&str, u32); 4] = [
    ("What is software engineering?", 5),
    ("Explain software testing methodologies", 8),
    ("Define software quality assurance", 3),
    ("What are design patterns?", 10),
];

/// Question used by [`quick_test`].
pub const QUICK_TEST_QUERY: &str = "What is software quality?";

/// Score filter used for canned questions.
const TEST_MIN_SCORE: f32 = 0.1;

/// Relevance above which a successful test query counts as a pass.
const PASS_SCORE: f32 = 0.3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Working,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub status: CheckStatus,
    pub detail: String,
}

impl CheckResult {
    fn working(detail: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Working,
            detail: detail.into(),
        }
    }

    fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            status: CheckStatus::Failed,
            detail: format!("Failed: {}", error),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    pub index_connection: CheckResult,
    pub embedding_generation: CheckResult,
    pub generation_backend: CheckResult,
    pub document_retrieval: CheckResult,
}

impl HealthChecks {
    /// `(label, result)` pairs in display order.
    pub fn entries(&self) -> [(&'static str, &CheckResult); 4] {
        [
            ("Index Connection", &self.index_connection),
            ("Embedding Generation", &self.embedding_generation),
            ("Generation Backend", &self.generation_backend),
            ("Document Retrieval", &self.document_retrieval),
        ]
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ModelScore {
    pub name: String,
    pub score: f32,
}

impl ModelScore {
    /// Qualitative band for a benchmark score.
    pub fn status(&self) -> &'static str {
        if self.score > 0.7 {
            "Excellent"
        } else if self.score > 0.4 {
            "Good"
        } else if self.score > 0.2 {
            "Fair"
        } else {
            "Poor"
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryPerformance {
    pub success_rate: f64,
    pub avg_response_time: f64,
    pub total_queries: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosisReport {
    pub timestamp: String,
    pub system_stats: SystemStats,
    pub health_checks: HealthChecks,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index_stats: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub best_performing_model: Option<ModelScore>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_performance: Option<QueryPerformance>,
    pub recommendations: Vec<String>,
}

/// Probe every collaborator and collect recommendations.
pub async fn diagnose(pipeline: &Pipeline) -> DiagnosisReport {
    let active = pipeline.active();
    let index = pipeline.index();

    let (index_connection, index_stats) = match index.describe_index_stats().await {
        Ok(stats) => (CheckResult::working("Connected"), Some(stats)),
        Err(e) => (CheckResult::failed(e), None),
    };

    let embedding_generation = match active.embedder.embed("test query").await {
        Ok(v) => CheckResult::working(format!("Working - {} dimensions", v.len())),
        Err(e) => CheckResult::failed(e),
    };

    let generation_backend = match pipeline.synthesizer().ping().await {
        Ok(_) => CheckResult::working("Working"),
        Err(e) => CheckResult::failed(e),
    };

    let probe = RetrievalOptions {
        top_k: 3,
        min_score: 0.0,
        ..pipeline.retrieval_options()
    };
    let document_retrieval =
        match retrieve(active.embedder.as_ref(), index.as_ref(), "test query", probe).await {
            Ok(docs) => CheckResult::working(format!("Working - Found {} documents", docs.len())),
            Err(e) => CheckResult::failed(e),
        };

    let best_performing_model = pipeline
        .selector()
        .scores()
        .into_iter()
        .fold(None, |best: Option<ModelScore>, (name, score)| match best {
            Some(b) if b.score >= score => Some(b),
            _ => Some(ModelScore { name, score }),
        });

    let counters = pipeline.statistics();
    let query_performance = counters.success_rate().map(|rate| QueryPerformance {
        success_rate: rate,
        avg_response_time: counters.avg_response_time,
        total_queries: counters.total_queries,
    });

    let mut recommendations =
        recommendations(best_performing_model.as_ref().map(|m| m.score), &counters);
    if let CheckStatus::Failed = index_connection.status {
        recommendations.push(format!(
            "System error detected: {}",
            index_connection.detail
        ));
    }

    DiagnosisReport {
        timestamp: Local::now().to_rfc3339(),
        system_stats: pipeline.system_stats(),
        health_checks: HealthChecks {
            index_connection,
            embedding_generation,
            generation_backend,
            document_retrieval,
        },
        index_stats,
        best_performing_model,
        query_performance,
        recommendations,
    }
}

/// Advice derived from the best benchmark score and the success rate.
pub fn recommendations(best_score: Option<f32>, stats: &QueryStatistics) -> Vec<String> {
    let mut out = Vec::new();

    if let Some(score) = best_score {
        out.push(
            if score < 0.2 {
                "Critical: Very low similarity scores detected. Strong indication of embedding \
                 model mismatch. Consider re-indexing."
            } else if score < 0.4 {
                "Warning: Low similarity scores. Consider testing additional models or \
                 re-indexing with current model."
            } else if score > 0.7 {
                "Excellent: High similarity scores indicate good embedding model match."
            } else {
                "Good: Moderate similarity scores. System should work adequately."
            }
            .to_string(),
        );
    }

    if let Some(rate) = stats.success_rate() {
        if rate < 70.0 {
            out.push(format!(
                "Low query success rate ({:.1}%). Check embedding model and document indexing.",
                rate
            ));
        }
    }

    out
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Verdict {
    Pass,
    Warn,
    Fail,
}

impl Verdict {
    pub fn of(success: bool, score: f32) -> Self {
        match (success, score > PASS_SCORE) {
            (true, true) => Verdict::Pass,
            (true, false) => Verdict::Warn,
            (false, _) => Verdict::Fail,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Verdict::Pass => "PASS",
            Verdict::Warn => "WARN",
            Verdict::Fail => "FAIL",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestQueryResult {
    pub query: String,
    pub marks: u32,
    pub verdict: Verdict,
    pub score: f32,
    pub sources: usize,
    pub success: bool,
    pub time: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TestSummary {
    pub successful_tests: usize,
    pub total_tests: usize,
    pub avg_score: f32,
    pub avg_time: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Assessment {
    Excellent,
    Good,
    Fair,
    Poor,
}

impl Assessment {
    pub fn of(summary: &TestSummary) -> Self {
        let total = summary.total_tests as f64;
        let ok = summary.successful_tests as f64;
        if summary.total_tests > 0 && summary.successful_tests == summary.total_tests && summary.avg_score > 0.6 {
            Assessment::Excellent
        } else if ok >= total * 0.75 && summary.avg_score > 0.4 {
            Assessment::Good
        } else if ok >= total * 0.5 {
            Assessment::Fair
        } else {
            Assessment::Poor
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            Assessment::Excellent => "EXCELLENT: System is working optimally",
            Assessment::Good => "GOOD: System is working well with minor issues",
            Assessment::Fair => "FAIR: System has moderate issues, consider improvements",
            Assessment::Poor => "POOR: System has significant issues, requires attention",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FullReport {
    pub diagnosis: DiagnosisReport,
    pub test_results: Vec<TestQueryResult>,
    pub summary: TestSummary,
    pub assessment: Assessment,
}

/// Run one canned question and grade it.
pub async fn run_test_query(pipeline: &Pipeline, query: &str, marks: u32) -> TestQueryResult {
    let options = QueryOptions {
        marks,
        min_score: TEST_MIN_SCORE,
        ..QueryOptions::default()
    };
    let result = pipeline.answer(query, &options).await;
    TestQueryResult {
        query: query.to_string(),
        marks,
        verdict: Verdict::of(result.success, result.relevance_score),
        score: result.relevance_score,
        sources: result.total_sources,
        success: result.success,
        time: result.query_time,
    }
}

pub fn summarize(results: &[TestQueryResult]) -> TestSummary {
    let total = results.len();
    let (avg_score, avg_time) = if total == 0 {
        (0.0, 0.0)
    } else {
        (
            results.iter().map(|r| r.score).sum::<f32>() / total as f32,
            results.iter().map(|r| r.time).sum::<f64>() / total as f64,
        )
    };
    TestSummary {
        successful_tests: results.iter().filter(|r| r.success).count(),
        total_tests: total,
        avg_score,
        avg_time,
    }
}

/// [`diagnose`] followed by the canned test queries.
pub async fn run_full_diagnosis(pipeline: &Pipeline) -> FullReport {
    let diagnosis = diagnose(pipeline).await;

    let mut test_results = Vec::with_capacity(TEST_QUERIES.len());
    for (query, marks) in TEST_QUERIES {
        test_results.push(run_test_query(pipeline, query, marks).await);
    }

    let summary = summarize(&test_results);
    let assessment = Assessment::of(&summary);
    FullReport {
        diagnosis,
        test_results,
        summary,
        assessment,
    }
}

/// Single canned question, for a fast smoke check.
pub async fn quick_test(pipeline: &Pipeline) -> marks_rag_core::models::QueryResult {
    let options = QueryOptions {
        marks: 5,
        min_score: TEST_MIN_SCORE,
        ..QueryOptions::default()
    };
    pipeline.answer(QUICK_TEST_QUERY, &options).await
}

/// Write `report` to `dir/rag_diagnosis_report_YYYYMMDD_HHMMSS.json`.
pub fn save_report<T: Serialize>(report: &T, dir: &Path) -> Result<PathBuf> {
    let name = format!(
        "rag_diagnosis_report_{}.json",
        Local::now().format("%Y%m%d_%H%M%S")
    );
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write report: {}", path.display()))?;
    Ok(path)
}

/// Human-readable rendering of a report, printed by `mrag diagnose`.
pub fn print_diagnosis(report: &DiagnosisReport) {
    let info = &report.system_stats.index_info;
    println!("SYSTEM INFORMATION");
    println!("{}", "-".repeat(40));
    println!("  Index:          {}", info.name);
    println!("  Dimension:      {} ({:?})", info.dimension, info.dimension_source);
    println!("  Current model:  {}", report.system_stats.embedding_model.current);

    if let Some(stats) = &report.index_stats {
        let vectors = stats
            .get("totalVectorCount")
            .or_else(|| stats.get("total_vector_count"))
            .and_then(|v| v.as_u64())
            .unwrap_or(0);
        let namespaces = stats
            .get("namespaces")
            .and_then(|n| n.as_object())
            .map_or(0, |n| n.len());
        println!("  Vector count:   {}", vectors);
        println!("  Namespaces:     {}", namespaces);
    }

    println!();
    println!("HEALTH CHECKS");
    println!("{}", "-".repeat(40));
    for (label, check) in report.health_checks.entries() {
        println!("  {:<22} {}", label, check.detail);
    }

    if let Some(best) = &report.best_performing_model {
        println!();
        println!("BEST MODEL PERFORMANCE");
        println!("{}", "-".repeat(40));
        println!("  Model:  {}", best.name);
        println!("  Score:  {:.4}", best.score);
        println!("  Status: {}", best.status());
    }

    if let Some(perf) = &report.query_performance {
        println!();
        println!("QUERY PERFORMANCE");
        println!("{}", "-".repeat(40));
        println!("  Success rate:       {:.1}%", perf.success_rate);
        println!("  Avg response time:  {:.2}s", perf.avg_response_time);
        println!("  Total queries:      {}", perf.total_queries);
    }

    println!();
    println!("RECOMMENDATIONS");
    println!("{}", "-".repeat(40));
    for (i, rec) in report.recommendations.iter().enumerate() {
        println!("  {}. {}", i + 1, rec);
    }
}

pub fn print_full_report(report: &FullReport) {
    print_diagnosis(&report.diagnosis);

    println!();
    println!("TEST QUERIES");
    println!("{}", "-".repeat(40));
    for r in &report.test_results {
        println!("  {} ({} marks)", r.query, r.marks);
        println!(
            "    {} - Score: {:.4} | Sources: {} | Time: {:.2}s",
            r.verdict.label(),
            r.score,
            r.sources,
            r.time
        );
    }

    let s = &report.summary;
    println!();
    println!("TEST SUMMARY");
    println!("{}", "-".repeat(40));
    println!("  Successful tests:   {}/{}", s.successful_tests, s.total_tests);
    println!("  Average score:      {:.4}", s.avg_score);
    println!("  Avg response time:  {:.2}s", s.avg_time);

    println!();
    println!("OVERALL ASSESSMENT");
    println!("{}", "-".repeat(40));
    println!("  {}", report.assessment.description());
}
