//! Per-frame performance metrics.

/// Timing and resource metrics collected during a single frame.
///
/// Populated by the executor after each frame; the host folds them into
/// throttled health snapshots on the event stream.
#[derive(Clone, Debug, Default)]
pub struct FrameMetrics {
    /// Wall-clock time for the whole frame, in microseconds.
    pub total_us: u64,
    /// Schedule steps executed.
    pub steps: usize,
    /// NaN/±∞ writes detected this frame.
    pub anomalies: u64,
    /// Lane buffers acquired from the pool this frame.
    pub buffers_acquired: u64,
    /// `(instance label, lane count)` pairs solved this frame.
    pub instance_counts: Vec<(String, u32)>,
    /// Bytes held by persistent state after the frame.
    pub state_bytes: usize,
    /// Bytes parked in the buffer pool after the frame.
    pub pool_bytes: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_metrics_are_zero() {
        let m = FrameMetrics::default();
        assert_eq!(m.total_us, 0);
        assert_eq!(m.steps, 0);
        assert_eq!(m.anomalies, 0);
        assert_eq!(m.buffers_acquired, 0);
        assert!(m.instance_counts.is_empty());
        assert_eq!(m.state_bytes, 0);
        assert_eq!(m.pool_bytes, 0);
    }
}
