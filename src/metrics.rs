//! Scoring statistics for one interactive session.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use tracing::info;

/// Latencies kept for statistics; the oldest half is dropped past this.
const MAX_SCORING_TIMES: usize = 10_000;

/// Metrics collector for a scoring session
#[derive(Debug)]
pub struct SessionMetrics {
    /// Submissions scored successfully
    pub submissions_scored: AtomicU64,
    /// Scored submissions above the threshold
    pub submissions_flagged: AtomicU64,
    /// Submissions whose scoring failed
    pub submissions_failed: AtomicU64,
    /// Map-and-score latencies (in microseconds)
    scoring_times: RwLock<Vec<u64>>,
    /// Probability distribution buckets
    probability_buckets: RwLock<[u64; 10]>,
    started: Instant,
}

impl SessionMetrics {
    pub fn new() -> Self {
        Self {
            submissions_scored: AtomicU64::new(0),
            submissions_flagged: AtomicU64::new(0),
            submissions_failed: AtomicU64::new(0),
            scoring_times: RwLock::new(Vec::new()),
            probability_buckets: RwLock::new([0; 10]),
            started: Instant::now(),
        }
    }

    /// Record a scored submission
    pub fn record_score(&self, scoring_time: Duration, probability: f64, flagged: bool) {
        self.submissions_scored.fetch_add(1, Ordering::Relaxed);
        if flagged {
            self.submissions_flagged.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut times) = self.scoring_times.write() {
            times.push(scoring_time.as_micros() as u64);
            if times.len() > MAX_SCORING_TIMES {
                times.drain(0..MAX_SCORING_TIMES / 2);
            }
        }

        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.probability_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Record a submission that could not be scored
    pub fn record_failure(&self) {
        self.submissions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn scored(&self) -> u64 {
        self.submissions_scored.load(Ordering::Relaxed)
    }

    pub fn flagged(&self) -> u64 {
        self.submissions_flagged.load(Ordering::Relaxed)
    }

    pub fn failed(&self) -> u64 {
        self.submissions_failed.load(Ordering::Relaxed)
    }

    /// Latency statistics over every scored submission
    pub fn scoring_stats(&self) -> ScoringStats {
        let Ok(times) = self.scoring_times.read() else {
            return ScoringStats::default();
        };
        if times.is_empty() {
            return ScoringStats::default();
        }

        let mut sorted = times.clone();
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();

        ScoringStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: sorted[count / 2],
            max_us: sorted[count - 1],
        }
    }

    pub fn probability_distribution(&self) -> [u64; 10] {
        self.probability_buckets
            .read()
            .map(|b| *b)
            .unwrap_or_default()
    }

    /// Log the session summary
    pub fn print_summary(&self) {
        let scored = self.scored();
        let flagged = self.flagged();
        let failed = self.failed();
        let flag_rate = if scored > 0 {
            (flagged as f64 / scored as f64) * 100.0
        } else {
            0.0
        };
        let stats = self.scoring_stats();
        let elapsed = self.started.elapsed().as_secs();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             SMART FRAUD DETECTOR - SESSION SUMMARY           ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Submissions Scored: {:>6}  │  Flagged: {:>6} ({:>5.1}%)     ║",
            scored, flagged, flag_rate
        );
        info!(
            "║ Scoring Failures:   {:>6}  │  Session: {:>6}s             ║",
            failed, elapsed
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Scoring Time (μs): mean={:>6} p50={:>6} max={:>6}         ║",
            stats.mean_us, stats.p50_us, stats.max_us
        );

        if scored == 0 {
            info!("╚══════════════════════════════════════════════════════════════╝");
            return;
        }

        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Fraud Probability Distribution:                              ║");
        for (i, &count) in self.probability_distribution().iter().enumerate() {
            let pct = (count as f64 / scored as f64) * 100.0;
            let bar = "█".repeat(((pct / 5.0) as usize).min(20));
            info!(
                "║   {:.1}-{:.1}: {:>6} ({:>5.1}%) {}",
                i as f64 / 10.0,
                (i + 1) as f64 / 10.0,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");
    }
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoring latency statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ScoringStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub max_us: u64,
}
