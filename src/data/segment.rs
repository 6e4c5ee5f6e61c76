use log::debug;

use super::model::{Locus, SegmentRange, SweepMetadata};

/// Shortest run the locus strategy accepts as a sweep.
pub const MIN_SEGMENT_LEN: usize = 3;

// ---------------------------------------------------------------------------
// Split request
// ---------------------------------------------------------------------------

/// Everything the splitter knows about a concatenated sample stream besides
/// the samples themselves.
#[derive(Debug, Clone, Copy)]
pub struct SplitRequest<'a> {
    pub metadata: &'a SweepMetadata,
    /// Number of sweeps the file claims to contain.
    pub expected: Option<usize>,
    /// Samples per sweep, from a nearby `dimension1` record.
    pub samples_per_segment: Option<usize>,
}

impl<'a> SplitRequest<'a> {
    pub fn new(metadata: &'a SweepMetadata) -> Self {
        SplitRequest {
            metadata,
            expected: metadata.expected_segments(),
            samples_per_segment: None,
        }
    }

    pub fn with_samples_per_segment(mut self, hint: Option<usize>) -> Self {
        self.samples_per_segment = hint;
        self
    }

    pub fn with_expected(mut self, expected: Option<usize>) -> Self {
        self.expected = expected.filter(|&n| n > 0);
        self
    }

    fn expected_reached(&self, found: usize) -> bool {
        self.expected.is_some_and(|n| found >= n)
    }
}

// ---------------------------------------------------------------------------
// Strategies
// ---------------------------------------------------------------------------

/// One way of locating sweep boundaries.  Each returns `None` when it has
/// nothing to offer, and the next one in [`CASCADE`] is tried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitStrategy {
    /// Contiguous chunks of the hinted per-sweep sample count.
    FixedChunks,
    /// Boundaries where the stream returns from the stop to the start voltage.
    LocusBoundaries,
    /// A new sweep wherever the voltage drops.
    MonotonicReset,
}

pub const CASCADE: [SplitStrategy; 3] = [
    SplitStrategy::FixedChunks,
    SplitStrategy::LocusBoundaries,
    SplitStrategy::MonotonicReset,
];

impl SplitStrategy {
    pub fn apply(self, stream: &[f64], req: &SplitRequest<'_>) -> Option<Vec<SegmentRange>> {
        let segments = match self {
            SplitStrategy::FixedChunks => fixed_chunks(stream, req),
            SplitStrategy::LocusBoundaries => locus_boundaries(stream, req),
            SplitStrategy::MonotonicReset => Some(monotonic_reset(stream)),
        }?;
        (!segments.is_empty()).then_some(segments)
    }
}

fn fixed_chunks(stream: &[f64], req: &SplitRequest<'_>) -> Option<Vec<SegmentRange>> {
    let size = req
        .samples_per_segment
        .filter(|&k| k > 2 && stream.len() >= k)?;

    let mut count = stream.len() / size;
    if let Some(expected) = req.expected {
        count = count.min(expected);
    }
    Some(
        (0..count)
            .map(|k| SegmentRange::new(k * size, (k + 1) * size))
            .collect(),
    )
}

fn locus_boundaries(stream: &[f64], req: &SplitRequest<'_>) -> Option<Vec<SegmentRange>> {
    let meta = req.metadata;
    let (start, stop) = (meta.start_voltage?, meta.stop_voltage?);
    let tol = (0.01 * (stop - start).abs()).max(1e-9);
    let near = |v: f64, target: f64| (v - target).abs() <= tol;

    let mut segments = Vec::new();
    let mut seg_start = 0;

    match meta.locus {
        Locus::Double => {
            let mut seen_stop = false;
            for (k, &v) in stream.iter().enumerate() {
                if !seen_stop && near(v, stop) {
                    seen_stop = true;
                } else if seen_stop && near(v, start) {
                    close_segment(k, &mut seg_start, &mut segments);
                    seen_stop = false;
                    if req.expected_reached(segments.len()) {
                        break;
                    }
                }
            }
        }
        Locus::Single => {
            for k in 1..stream.len() {
                if near(stream[k - 1], stop) && near(stream[k], start) {
                    close_segment(k, &mut seg_start, &mut segments);
                    if req.expected_reached(segments.len()) {
                        break;
                    }
                }
            }
        }
    }

    // Whatever follows the last boundary is a sweep of its own.
    let tail = SegmentRange::new(seg_start, stream.len());
    if !req.expected_reached(segments.len()) && tail.len() >= MIN_SEGMENT_LEN {
        segments.push(tail);
    }
    Some(segments)
}

fn close_segment(k: usize, seg_start: &mut usize, segments: &mut Vec<SegmentRange>) {
    let seg = SegmentRange::new(*seg_start, k);
    if seg.len() >= MIN_SEGMENT_LEN {
        segments.push(seg);
    }
    *seg_start = k;
}

fn monotonic_reset(stream: &[f64]) -> Vec<SegmentRange> {
    let mut segments = Vec::new();
    let mut seg_start = 0;
    for k in 1..stream.len() {
        if stream[k] < stream[k - 1] {
            segments.push(SegmentRange::new(seg_start, k));
            seg_start = k;
        }
    }
    segments.push(SegmentRange::new(seg_start, stream.len()));
    segments
}

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Partition a concatenated voltage stream into per-sweep index ranges.
///
/// Strategies from [`CASCADE`] are tried in order; the first that yields at
/// least one range wins.  The result never holds more than the expected
/// segment count.  A single-sample stream comes back as one range.
///
/// An empty stream yields no ranges at all, not one range spanning it:
/// a [`SegmentRange`] always holds at least one sample.
pub fn split_segments(stream: &[f64], req: &SplitRequest<'_>) -> Vec<SegmentRange> {
    let whole = SegmentRange::new(0, stream.len());
    if whole.is_empty() {
        return Vec::new();
    }
    if whole.len() < 2 {
        return vec![whole];
    }

    let (strategy, mut segments) = CASCADE
        .iter()
        .find_map(|s| s.apply(stream, req).map(|segs| (*s, segs)))
        .unwrap_or_else(|| {
            (
                SplitStrategy::MonotonicReset,
                vec![whole],
            )
        });

    if let Some(expected) = req.expected {
        segments.truncate(expected);
    }
    debug!(
        "split {} samples into {} segments via {:?}",
        stream.len(),
        segments.len(),
        strategy
    );
    segments
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ramp(from: f64, to: f64, n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| from + (to - from) * i as f64 / (n - 1) as f64)
            .collect()
    }

    fn meta(locus: Locus, start: f64, stop: f64) -> SweepMetadata {
        SweepMetadata {
            locus,
            start_voltage: Some(start),
            stop_voltage: Some(stop),
            frequencies: Vec::new(),
        }
    }

    #[test]
    fn empty_and_single_sample_streams() {
        let m = SweepMetadata::default();
        let req = SplitRequest::new(&m);
        assert!(split_segments(&[], &req).is_empty());
        assert_eq!(split_segments(&[1.0], &req), vec![SegmentRange::new(0, 1)]);
    }

    #[test]
    fn fixed_chunks_honour_expected_count() {
        let m = SweepMetadata::default();
        let stream = vec![0.0; 30];
        let req = SplitRequest::new(&m)
            .with_samples_per_segment(Some(10))
            .with_expected(Some(2));
        assert_eq!(
            split_segments(&stream, &req),
            vec![SegmentRange::new(0, 10), SegmentRange::new(10, 20)]
        );
    }

    #[test]
    fn tiny_hint_is_ignored() {
        let m = SweepMetadata::default();
        let req = SplitRequest::new(&m).with_samples_per_segment(Some(2));
        assert_eq!(SplitStrategy::FixedChunks.apply(&[0.0, 1.0, 2.0], &req), None);
    }

    #[test]
    fn hint_longer_than_stream_falls_through() {
        let m = SweepMetadata::default();
        let req = SplitRequest::new(&m).with_samples_per_segment(Some(50));
        let stream = [0.0, 1.0, 2.0, 0.0, 1.0, 2.0];
        assert_eq!(
            split_segments(&stream, &req),
            vec![SegmentRange::new(0, 3), SegmentRange::new(3, 6)]
        );
    }

    #[test]
    fn single_locus_splits_on_stop_to_start_jump() {
        let m = meta(Locus::Single, -1.0, 1.0);
        let mut stream = ramp(-1.0, 1.0, 11);
        stream.extend(ramp(-1.0, 1.0, 11));
        stream.extend(ramp(-1.0, 1.0, 11));
        let req = SplitRequest::new(&m);
        assert_eq!(
            SplitStrategy::LocusBoundaries.apply(&stream, &req),
            Some(vec![
                SegmentRange::new(0, 11),
                SegmentRange::new(11, 22),
                SegmentRange::new(22, 33),
            ])
        );
    }

    #[test]
    fn double_locus_splits_full_loops() {
        let m = meta(Locus::Double, 0.0, 2.0);
        let mut one_loop = ramp(0.0, 2.0, 5);
        one_loop.extend(ramp(2.0, 0.25, 4).into_iter().skip(1));
        let mut stream = one_loop.clone();
        stream.extend(one_loop.iter());
        stream.extend(one_loop.iter());
        let n = one_loop.len();

        let req = SplitRequest::new(&m);
        assert_eq!(
            split_segments(&stream, &req),
            vec![
                SegmentRange::new(0, n),
                SegmentRange::new(n, 2 * n),
                SegmentRange::new(2 * n, 3 * n),
            ]
        );
    }

    #[test]
    fn double_locus_without_stop_keeps_whole_stream() {
        let m = meta(Locus::Double, 0.0, 5.0);
        let stream = ramp(0.0, 2.0, 8);
        let req = SplitRequest::new(&m);
        assert_eq!(split_segments(&stream, &req), vec![SegmentRange::new(0, 8)]);
    }

    #[test]
    fn locus_stops_at_expected_count() {
        let m = meta(Locus::Single, 0.0, 1.0);
        let mut stream = Vec::new();
        for _ in 0..4 {
            stream.extend(ramp(0.0, 1.0, 6));
        }
        let req = SplitRequest::new(&m).with_expected(Some(2));
        let segs = split_segments(&stream, &req);
        assert_eq!(segs, vec![SegmentRange::new(0, 6), SegmentRange::new(6, 12)]);
    }

    #[test]
    fn monotonic_reset_is_truncated_to_expected() {
        let m = SweepMetadata::default();
        let stream = [0.0, 1.0, 0.0, 1.0, 0.0, 1.0];
        let req = SplitRequest::new(&m).with_expected(Some(2));
        assert_eq!(split_segments(&stream, &req).len(), 2);
    }

    proptest! {
        #[test]
        fn concatenated_ramps_split_back(lengths in prop::collection::vec(2usize..20, 1..8)) {
            let mut stream = Vec::new();
            let mut bounds = Vec::new();
            for &n in &lengths {
                let start = stream.len();
                stream.extend(ramp(-1.0, 1.0, n));
                bounds.push(SegmentRange::new(start, stream.len()));
            }
            let m = SweepMetadata::default();
            let segs = split_segments(&stream, &SplitRequest::new(&m));
            prop_assert_eq!(segs, bounds);
        }

        #[test]
        fn hint_gives_equal_chunks(k in 3usize..20, m in 1usize..10, seed in any::<u64>()) {
            let stream: Vec<f64> = (0..k * m)
                .map(|i| ((i as u64).wrapping_mul(seed | 1) % 97) as f64 / 10.0)
                .collect();
            let meta = meta(Locus::Double, 0.0, 9.0);
            let req = SplitRequest::new(&meta).with_samples_per_segment(Some(k));
            let segs = split_segments(&stream, &req);
            prop_assert_eq!(segs.len(), m);
            for (i, s) in segs.iter().enumerate() {
                prop_assert_eq!(*s, SegmentRange::new(i * k, (i + 1) * k));
            }
        }
    }
}
