//! Cache key builders for every LegiSync cache entry.
//!
//! Keys are namespaced by record category so that a sync of one category
//! can invalidate its entries with a single pattern.

/// Cached legislator roster (the full list, used by expense fan-out).
pub fn legislator_roster() -> String {
    "legislators:roster".to_string()
}

/// Pattern covering every legislator entry.
pub fn legislators_pattern() -> String {
    "legislators:*".to_string()
}

/// Cached bill listing for a year.
pub fn bills_for_year(year: i32) -> String {
    format!("bills:year:{year}")
}

/// Pattern covering every bill entry.
pub fn bills_pattern() -> String {
    "bills:*".to_string()
}

/// Pattern covering every expense entry.
pub fn expenses_pattern() -> String {
    "expenses:*".to_string()
}

/// Pattern covering every vote entry.
pub fn votes_pattern() -> String {
    "votes:*".to_string()
}

/// Pattern covering derived analytics.
pub fn analytics_pattern() -> String {
    "analytics:*".to_string()
}

/// Glob match supporting `*` (any run of characters) and `?` (one
/// character), the subset of Redis `KEYS`/`SCAN` patterns the in-process
/// tiers honor.
pub fn matches_pattern(pattern: &str, key: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let k: Vec<char> = key.chars().collect();
    let (mut pi, mut ki) = (0usize, 0usize);
    let mut star: Option<(usize, usize)> = None;

    while ki < k.len() {
        if pi < p.len() && (p[pi] == '?' || p[pi] == k[ki]) {
            pi += 1;
            ki += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some((pi, ki));
            pi += 1;
        } else if let Some((sp, sk)) = star {
            pi = sp + 1;
            ki = sk + 1;
            star = Some((sp, sk + 1));
        } else {
            return false;
        }
    }
    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }
    pi == p.len()
}
