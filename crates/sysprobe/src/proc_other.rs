use std::time::Duration;

/// No portable resident-memory source on this platform.
pub fn rss_bytes() -> Option<u64> {
    None
}

/// No portable process CPU time source on this platform.
pub fn cpu_time() -> Option<Duration> {
    None
}
