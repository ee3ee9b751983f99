//! Statistics reporting
//!
//! Two views: what the database holds (for `--stats`) and what a finished
//! crawl did (printed at the end of a run).

use crate::crawler::CrawlSnapshot;
use crate::storage::{RunRecord, SqliteStorage, StorageResult};

/// Summary of the stored records
#[derive(Debug, Clone)]
pub struct DatabaseStatistics {
    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,

    /// Rows in `code_data`
    pub total_rows: u64,

    /// Distinct pages stored
    pub total_pages: u64,

    /// Rows per source type
    pub by_source_type: Vec<(String, u64)>,

    /// Code blocks per language
    pub by_language: Vec<(String, u64)>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(DatabaseStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteStorage) -> StorageResult<DatabaseStatistics> {
    Ok(DatabaseStatistics {
        latest_run: storage.get_latest_run()?,
        total_rows: storage.count_rows()?,
        total_pages: storage.count_pages()?,
        by_source_type: storage.count_by_source_type()?,
        by_language: storage.count_by_language()?,
    })
}

fn percentage(count: u64, total: u64) -> f64 {
    if total > 0 {
        (count as f64 / total as f64) * 100.0
    } else {
        0.0
    }
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &DatabaseStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Overview:");
    println!("  Pages stored: {}", stats.total_pages);
    println!("  Rows: {}", stats.total_rows);
    println!();

    if let Some(run) = &stats.latest_run {
        println!("Latest Run:");
        println!("  ID: {}", run.id);
        println!("  Started: {}", run.started_at);
        if let Some(finished) = &run.finished_at {
            println!("  Finished: {}", finished);
        }
        println!("  Status: {}", run.status.to_db_string());
        println!("  Records written: {}", run.records_written);
        println!();
    }

    if !stats.by_source_type.is_empty() {
        println!("Rows by Source Type:");
        for (source_type, count) in &stats.by_source_type {
            println!(
                "  {}: {} ({:.1}%)",
                source_type,
                count,
                percentage(*count, stats.total_rows)
            );
        }
        println!();
    }

    if !stats.by_language.is_empty() {
        let blocks: u64 = stats.by_language.iter().map(|(_, c)| c).sum();
        println!("Code Blocks by Language ({} total):", blocks);
        for (language, count) in &stats.by_language {
            println!(
                "  {}: {} ({:.1}%)",
                language,
                count,
                percentage(*count, blocks)
            );
        }
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_run_summary(snapshot: &CrawlSnapshot) {
    println!("\n=== Crawl Complete ===");
    println!("  Pages visited: {}", snapshot.pages_visited);
    println!("  Records stored: {}", snapshot.records_stored);
    println!("  Duplicates skipped: {}", snapshot.duplicates);
    println!("  Empty pages: {}", snapshot.empty_pages);
    println!("  Failed pages: {}", snapshot.failed);
    println!("  Abandoned after retries: {}", snapshot.abandoned);
    println!("  Load retries: {}", snapshot.retries);
    println!("  Links enqueued: {}", snapshot.links_enqueued);
    if snapshot.disallowed > 0 {
        println!("  Blocked by robots.txt: {}", snapshot.disallowed);
    }
    if snapshot.limit_warnings > 0 {
        println!("  Resource limit warnings: {}", snapshot.limit_warnings);
    }
    println!(
        "  Store rate: {:.1}%",
        percentage(snapshot.records_stored, snapshot.pages_visited)
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{ExtractionRecord, SourceType};
    use crate::storage::Sink;

    #[test]
    fn test_percentage() {
        assert_eq!(percentage(1, 4), 25.0);
        assert_eq!(percentage(3, 0), 0.0);
    }

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage.create_run("hash").unwrap();
        storage
            .write(&ExtractionRecord {
                url: "https://docs.example.com/a".to_string(),
                title: "A".to_string(),
                content: "text".to_string(),
                code_blocks: Vec::new(),
                source_type: SourceType::Documentation,
            })
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.total_rows, 1);
        assert_eq!(stats.total_pages, 1);
        assert_eq!(stats.by_source_type, vec![("documentation".to_string(), 1)]);
        assert!(stats.by_language.is_empty());
        assert!(stats.latest_run.is_some());
    }
}
