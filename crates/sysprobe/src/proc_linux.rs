use std::fs;
use std::time::Duration;

/// Kernel clock ticks per second for `/proc` CPU time fields (USER_HZ).
const TICKS_PER_SEC: f64 = 100.0;

/// Resident set size from `/proc/self/status` (`VmRSS`, reported in kB).
pub fn rss_bytes() -> Option<u64> {
    let status = fs::read_to_string("/proc/self/status").ok()?;
    for line in status.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            let kb: u64 = rest.trim().trim_end_matches("kB").trim().parse().ok()?;
            return Some(kb * 1024);
        }
    }
    None
}

/// Total consumed CPU time (user + system) from `/proc/self/stat`.
pub fn cpu_time() -> Option<Duration> {
    let stat = fs::read_to_string("/proc/self/stat").ok()?;
    // The comm field is parenthesized and may contain spaces; split on the
    // closing paren and count fields from there. utime and stime are stat
    // fields 14 and 15, which land at indices 11 and 12 of the remainder.
    let rest = stat.rsplit_once(')')?.1;
    let fields: Vec<&str> = rest.split_whitespace().collect();
    let utime: u64 = fields.get(11)?.parse().ok()?;
    let stime: u64 = fields.get(12)?.parse().ok()?;
    Some(Duration::from_secs_f64(
        (utime + stime) as f64 / TICKS_PER_SEC,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_proc_self() {
        assert!(rss_bytes().is_some());
        assert!(cpu_time().is_some());
    }
}
