//! Equi-width histograms over int and string fields.

use limestone::tuple::CompareOp;

/// Default (and minimum expected) number of buckets for a standalone
/// histogram.
pub const NUM_HIST_BINS: usize = 100;

/// A fixed-width histogram over `[min, max]` (both inclusive). Adds and
/// probes are constant-time; no raw values are retained.
#[derive(Debug, Clone)]
pub struct IntHistogram {
    buckets: Vec<usize>,
    min: i32,
    max: i32,
    width: f64,
    ntups: usize,
}

impl IntHistogram {
    pub fn new(buckets: usize, min: i32, max: i32) -> Self {
        let buckets = buckets.max(1);
        let width = (max as f64 - min as f64 + 1.0) / buckets as f64;
        Self {
            buckets: vec![0; buckets],
            min,
            max,
            width,
            ntups: 0,
        }
    }

    fn bucket_of(&self, v: i32) -> usize {
        let idx = ((v as f64 - self.min as f64) / self.width).floor() as i64;
        idx.clamp(0, self.buckets.len() as i64 - 1) as usize
    }

    /// Values outside `[min, max]` are dropped.
    pub fn add_value(&mut self, v: i32) {
        if v < self.min || v > self.max {
            return;
        }
        let b = self.bucket_of(v);
        self.buckets[b] += 1;
        self.ntups += 1;
    }

    pub fn total(&self) -> usize {
        self.ntups
    }

    /// Estimated fraction of recorded values satisfying `value op v`.
    /// `Like` has no meaning over plain ints and yields a negative
    /// sentinel; the string histogram maps it before delegating here.
    pub fn estimate_selectivity(&self, op: CompareOp, v: i32) -> f64 {
        if self.ntups == 0 {
            return 0.0;
        }
        match op {
            CompareOp::Eq => self.eq_selectivity(v),
            CompareOp::Gt => self.gt_selectivity(v),
            CompareOp::Lt => self.lt_selectivity(v),
            CompareOp::Le => self.lt_selectivity(v) + self.eq_selectivity(v),
            CompareOp::Ge => self.gt_selectivity(v) + self.eq_selectivity(v),
            CompareOp::Ne => self.lt_selectivity(v) + self.gt_selectivity(v),
            CompareOp::Like => -1.0,
        }
    }

    fn eq_selectivity(&self, v: i32) -> f64 {
        if v < self.min || v > self.max {
            return 0.0;
        }
        let h = self.buckets[self.bucket_of(v)] as f64;
        h / self.width / self.ntups as f64
    }

    fn gt_selectivity(&self, v: i32) -> f64 {
        if v > self.max {
            return 0.0;
        }
        if v < self.min {
            return 1.0;
        }
        let b = self.bucket_of(v);
        let h = self.buckets[b] as f64;
        // last value covered by bucket b
        let right = self.min as f64 + (b as f64 + 1.0) * self.width - 1.0;
        let mut sel = (right - v as f64) / self.width * (h / self.ntups as f64);
        for count in &self.buckets[b + 1..] {
            sel += *count as f64 / self.ntups as f64;
        }
        sel
    }

    fn lt_selectivity(&self, v: i32) -> f64 {
        if v < self.min {
            return 0.0;
        }
        if v > self.max {
            return 1.0;
        }
        let b = self.bucket_of(v);
        let h = self.buckets[b] as f64;
        let left = self.min as f64 + b as f64 * self.width;
        let mut sel = (v as f64 - left) / self.width * (h / self.ntups as f64);
        for count in &self.buckets[..b] {
            sel += *count as f64 / self.ntups as f64;
        }
        sel
    }
}

/// Packs the first four characters of each string into a base-128 int
/// and keeps an `IntHistogram` over the packed range.
#[derive(Debug, Clone)]
pub struct StringHistogram {
    hist: IntHistogram,
}

impl StringHistogram {
    pub fn new(buckets: usize) -> Self {
        Self {
            hist: IntHistogram::new(buckets, pack(""), pack("zzzz")),
        }
    }

    pub fn add_value(&mut self, s: &str) {
        self.hist.add_value(pack(s));
    }

    pub fn total(&self) -> usize {
        self.hist.total()
    }

    pub fn estimate_selectivity(&self, op: CompareOp, s: &str) -> f64 {
        // substring matching is approximated as a prefix point lookup
        let op = if op == CompareOp::Like {
            CompareOp::Eq
        } else {
            op
        };
        self.hist.estimate_selectivity(op, pack(s))
    }
}

fn pack(s: &str) -> i32 {
    let bytes = s.as_bytes();
    let mut v: i32 = 0;
    for i in 0..4 {
        let c = bytes.get(i).copied().unwrap_or(0).min(0x7f) as i32;
        v = (v << 7) | c;
    }
    v
}
