//! Output formatting for CLI operations.

use serde_json::json;
use zipsession::timestamp::format_utc;
use zipsession::{CommitResult, EntryRecord};

/// Summary of an archive for the `info` command.
pub struct ArchiveSummary {
    pub entry_count: usize,
    pub directory_count: usize,
    pub total_size: u64,
    pub packed_size: u64,
    pub encrypted_entries: usize,
    pub methods: Vec<String>,
    pub comment: String,
}

impl ArchiveSummary {
    /// Builds a summary from catalog records.
    pub fn from_records(records: &[EntryRecord], comment: &[u8]) -> Self {
        let mut methods: Vec<String> = Vec::new();
        for record in records {
            let name = record.compression.name().to_string();
            if !methods.contains(&name) {
                methods.push(name);
            }
        }
        Self {
            entry_count: records.len(),
            directory_count: records.iter().filter(|r| r.is_dir()).count(),
            total_size: records.iter().map(|r| r.size).sum(),
            packed_size: records.iter().map(|r| r.compressed_size).sum(),
            encrypted_entries: records.iter().filter(|r| r.is_encrypted()).count(),
            methods,
            comment: String::from_utf8_lossy(comment).into_owned(),
        }
    }

    /// Packed size as a fraction of the total size.
    pub fn compression_ratio(&self) -> f64 {
        if self.total_size == 0 {
            return 1.0;
        }
        self.packed_size as f64 / self.total_size as f64
    }
}

/// Outcome of testing every selected entry.
#[derive(Default)]
pub struct TestReport {
    pub entries_tested: usize,
    pub entries_passed: usize,
    pub failures: Vec<(String, String)>,
}

impl TestReport {
    /// Returns true if no entry failed.
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Trait for output formatting
pub trait OutputFormatter {
    /// Formats a list of entries
    fn format_list(&self, entries: &[EntryRecord], technical: bool) -> String;

    /// Formats archive information
    fn format_info(&self, info: &ArchiveSummary) -> String;

    /// Formats a commit result
    fn format_commit(&self, result: &CommitResult) -> String;

    /// Formats test results
    fn format_test_result(&self, result: &TestReport) -> String;
}

/// Human-readable output formatter
pub struct HumanFormatter;

impl OutputFormatter for HumanFormatter {
    fn format_list(&self, entries: &[EntryRecord], technical: bool) -> String {
        let mut output = String::new();

        if technical {
            output.push_str(&format!(
                "{:>12} {:>12} {:>19} {:>10} {:>8} {:>7} {}\n",
                "Size", "Packed", "Modified", "CRC", "Method", "Crypt", "Name"
            ));
        } else {
            output.push_str(&format!("{:>12} {:>19} {}\n", "Size", "Modified", "Name"));
        }
        output.push_str(&"-".repeat(70));
        output.push('\n');

        let mut total_size: u64 = 0;
        let mut file_count = 0;
        let mut dir_count = 0;

        for entry in entries {
            let is_dir = entry.is_dir();
            if is_dir {
                dir_count += 1;
            } else {
                file_count += 1;
                total_size += entry.size;
            }

            let size_str = if is_dir {
                String::new()
            } else {
                humanize_bytes(entry.size)
            };
            let mtime_str = format_utc(entry.mtime);

            if technical {
                output.push_str(&format!(
                    "{:>12} {:>12} {:>19} {:>10} {:>8} {:>7} {}\n",
                    size_str,
                    humanize_bytes(entry.compressed_size),
                    mtime_str,
                    format!("{:08X}", entry.crc32),
                    entry.compression.name(),
                    encryption_label(entry),
                    entry.name_lossy()
                ));
            } else {
                output.push_str(&format!(
                    "{:>12} {:>19} {}\n",
                    size_str,
                    mtime_str,
                    entry.name_lossy()
                ));
            }
        }

        output.push_str(&"-".repeat(70));
        output.push('\n');
        output.push_str(&format!(
            "{} files, {} directories, {} total\n",
            file_count,
            dir_count,
            humanize_bytes(total_size)
        ));

        output
    }

    fn format_info(&self, info: &ArchiveSummary) -> String {
        let mut output = String::new();

        output.push_str("Archive Information:\n");
        output.push_str(&"-".repeat(40));
        output.push('\n');
        output.push_str(&format!("  Entries:        {}\n", info.entry_count));
        output.push_str(&format!("  Directories:    {}\n", info.directory_count));
        output.push_str(&format!(
            "  Total size:     {}\n",
            humanize_bytes(info.total_size)
        ));
        output.push_str(&format!(
            "  Packed size:    {}\n",
            humanize_bytes(info.packed_size)
        ));
        output.push_str(&format!(
            "  Ratio:          {:.1}%\n",
            info.compression_ratio() * 100.0
        ));
        if !info.methods.is_empty() {
            output.push_str(&format!("  Methods:        {}\n", info.methods.join(", ")));
        }
        if info.encrypted_entries > 0 {
            output.push_str(&format!("  Encrypted:      {}\n", info.encrypted_entries));
        }
        if !info.comment.is_empty() {
            output.push_str(&format!("  Comment:        {}\n", info.comment));
        }

        output
    }

    fn format_commit(&self, result: &CommitResult) -> String {
        if !result.rewritten {
            return "No changes\n".to_string();
        }
        let mut output = format!(
            "Wrote {} entries ({})\n",
            result.entries_written,
            humanize_bytes(result.archive_size)
        );
        if result.entries_added > 0 {
            output.push_str(&format!("  Added:     {}\n", result.entries_added));
        }
        if result.entries_removed > 0 {
            output.push_str(&format!("  Removed:   {}\n", result.entries_removed));
        }
        if result.entries_recoded > 0 {
            output.push_str(&format!("  Recoded:   {}\n", result.entries_recoded));
        }
        output
    }

    fn format_test_result(&self, result: &TestReport) -> String {
        let mut output = String::new();

        if result.is_ok() {
            output.push_str(&format!(
                "OK - {} files tested, all passed\n",
                result.entries_tested
            ));
        } else {
            output.push_str("Test completed with errors:\n");
            output.push_str(&format!("  Tested: {}\n", result.entries_tested));
            output.push_str(&format!("  Passed: {}\n", result.entries_passed));
            output.push_str(&format!("  Failed: {}\n", result.failures.len()));

            output.push_str("\nFailures:\n");
            for (path, error) in &result.failures {
                output.push_str(&format!("  {}: {}\n", path, error));
            }
        }

        output
    }
}

/// JSON output formatter
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format_list(&self, entries: &[EntryRecord], _technical: bool) -> String {
        let items: Vec<_> = entries
            .iter()
            .map(|e| {
                json!({
                    "index": e.index,
                    "name": e.name_lossy(),
                    "size": e.size,
                    "compressed_size": e.compressed_size,
                    "modified": e.mtime,
                    "crc32": e.crc32,
                    "method": e.compression.name(),
                    "encryption": encryption_label(e),
                    "is_directory": e.is_dir(),
                    "comment": e.comment.as_deref().map(String::from_utf8_lossy),
                })
            })
            .collect();

        serde_json::to_string_pretty(&items).unwrap_or_else(|_| "[]".to_string())
    }

    fn format_info(&self, info: &ArchiveSummary) -> String {
        let obj = json!({
            "entry_count": info.entry_count,
            "directory_count": info.directory_count,
            "total_size": info.total_size,
            "packed_size": info.packed_size,
            "compression_ratio": info.compression_ratio(),
            "encrypted_entries": info.encrypted_entries,
            "compression_methods": info.methods,
            "comment": info.comment,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_commit(&self, result: &CommitResult) -> String {
        let obj = json!({
            "rewritten": result.rewritten,
            "entries_written": result.entries_written,
            "entries_copied": result.entries_copied,
            "entries_recoded": result.entries_recoded,
            "entries_added": result.entries_added,
            "entries_removed": result.entries_removed,
            "archive_size": result.archive_size,
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }

    fn format_test_result(&self, result: &TestReport) -> String {
        let obj = json!({
            "success": result.is_ok(),
            "entries_tested": result.entries_tested,
            "entries_passed": result.entries_passed,
            "entries_failed": result.failures.len(),
            "failures": result.failures.iter().map(|(p, e)| json!({"path": p, "error": e})).collect::<Vec<_>>(),
        });

        serde_json::to_string_pretty(&obj).unwrap_or_else(|_| "{}".to_string())
    }
}

/// Creates the appropriate formatter based on output format
pub fn create_formatter(format: super::OutputFormat) -> Box<dyn OutputFormatter> {
    match format {
        super::OutputFormat::Human => Box::new(HumanFormatter),
        super::OutputFormat::Json => Box::new(JsonFormatter),
    }
}

fn encryption_label(entry: &EntryRecord) -> &'static str {
    use zipsession::EncryptionMethod;
    match entry.encryption {
        EncryptionMethod::None => "-",
        EncryptionMethod::Traditional => "zip",
        EncryptionMethod::Aes128 => "aes128",
        EncryptionMethod::Aes192 => "aes192",
        EncryptionMethod::Aes256 => "aes256",
        _ => "?",
    }
}

/// Converts bytes to a human-readable string
pub fn humanize_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_humanize_bytes() {
        assert_eq!(humanize_bytes(512), "512 B");
        assert_eq!(humanize_bytes(2048), "2.0 KB");
        assert_eq!(humanize_bytes(3 * 1024 * 1024), "3.0 MB");
    }

    #[test]
    fn test_summary_ratio() {
        let summary = ArchiveSummary {
            entry_count: 1,
            directory_count: 0,
            total_size: 200,
            packed_size: 50,
            encrypted_entries: 0,
            methods: vec!["deflate".into()],
            comment: String::new(),
        };
        assert!((summary.compression_ratio() - 0.25).abs() < f64::EPSILON);
    }
}
