use super::types::Severity;

/// Assigns a severity to a captured payload.
///
/// The heuristic is intentionally blunt: anything that smells like command
/// injection or a published exploit is flagged high, everything else low.
/// Matching is case-insensitive and runs on every capture, so it stays a
/// plain substring scan.
///
/// # Examples
///
/// ```
/// use rucher::capture::classifier::classify;
/// use rucher::capture::types::Severity;
///
/// assert_eq!(classify("CVE-2023-1234 exploit triggered"), Severity::High);
/// assert_eq!(classify("hello world"), Severity::Low);
/// ```
pub fn classify(payload: &str) -> Severity {
    let lowered = payload.to_lowercase();
    if lowered.contains("exploit") || lowered.contains("cmd") {
        Severity::High
    } else {
        Severity::Low
    }
}
