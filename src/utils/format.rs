use crate::models::FailureRecord;

/// Human readable size with a 1024 base: `1536` -> `1.5 KB`
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    let unit = ['K', 'M', 'G', 'T', 'P', 'E'][exp];
    format!("{:.1} {}B", bytes as f64 / div as f64, unit)
}

/// Comma separated failed item names, at most `max_shown` of them
pub fn summarize_failures(failures: &[FailureRecord], max_shown: usize) -> String {
    let names: Vec<&str> = failures
        .iter()
        .take(max_shown)
        .map(|f| f.item_name.as_str())
        .collect();
    let mut summary = names.join(", ");
    if failures.len() > max_shown {
        summary.push_str(&format!(" and {} more", failures.len() - max_shown));
    }
    summary
}
