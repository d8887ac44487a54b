//! System statistics overview.
//!
//! Prints what the running pipeline knows about itself: the index and how
//! its dimension was found, the active embedding model, benchmark scores,
//! and query counters. Used by `mrag stats`.

use crate::pipeline::SystemStats;

/// Print a human-readable summary of `stats`.
pub fn print_stats(stats: &SystemStats) {
    let index = &stats.index_info;
    let model = &stats.embedding_model;
    let q = &stats.query_statistics;

    println!("marks-rag System Stats");
    println!("========================");
    println!();
    println!("  Index:         {}", index.name);
    println!(
        "  Dimension:     {} ({})",
        index.dimension,
        format!("{:?}", index.dimension_source).to_lowercase()
    );
    println!();
    println!("  Active model:  {} ({:?}, {} dims)", model.current, model.backend, model.dimension);
    println!("  Generation:    {}", stats.generation_model);
    println!("  Cached models: {}", model.model_cache_size);

    if !model.performance_scores.is_empty() {
        println!();
        println!("  Benchmark scores:");
        println!("  {:<42} {:>8}", "MODEL", "SCORE");
        println!("  {}", "-".repeat(51));
        let mut scores: Vec<_> = model.performance_scores.iter().collect();
        scores.sort_by(|a, b| b.1.total_cmp(a.1));
        for (name, score) in scores {
            println!("  {:<42} {:>8.4}", name, score);
        }
    }

    println!();
    println!("  Queries:       {}", q.counters.total_queries);
    println!("  Successful:    {}", q.counters.successful_queries);
    println!("  Failed:        {}", q.counters.failed_queries);
    println!(
        "  Success rate:  {}",
        q.success_rate
            .map(|r| format!("{:.1}%", r))
            .unwrap_or_else(|| "n/a".to_string())
    );
    println!("  Avg response:  {}", format_secs(q.counters.avg_response_time));

    let status = &stats.system_status;
    println!();
    println!("  Components:");
    println!("    index        {}", up_down(status.index_connected));
    println!("    generation   {}", up_down(status.generation_configured));
    println!("    embedding    {}", up_down(status.embedding_model_loaded));
    println!();
}

fn up_down(ok: bool) -> &'static str {
    if ok {
        "ok"
    } else {
        "unavailable"
    }
}

/// Format seconds as `850 ms` or `2.31 s`.
pub fn format_secs(secs: f64) -> String {
    if secs < 1.0 {
        format!("{:.0} ms", secs * 1000.0)
    } else {
        format!("{:.2} s", secs)
    }
}
