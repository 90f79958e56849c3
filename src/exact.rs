//! Pattern-based exact solver.
//!
//! Solves the integer program
//!
//! ```text
//!   min  sum_p x_p
//!   s.t. sum_p a_ip * x_p >= d_i   for every distinct length i
//!        x_p in N
//! ```
//!
//! where each pattern `p` is a way of cutting one stock bar (`a_ip` pieces of
//! length `i`). Patterns are enumerated up front per candidate stock length by
//! a bounded depth-first search; only maximal patterns are kept. The program is
//! then solved by depth-first branch and bound, always branching on the
//! longest length with outstanding demand. Ties on bar count are broken by the
//! total stock length consumed.
//!
//! The best heuristic plan seeds the incumbent, so the solver never returns
//! more bars than `min-bar-count` would. When the wall-clock budget runs out
//! the incumbent is returned as is. A result is only reported optimal when no
//! pattern was dropped by `min_pattern_efficiency`.

use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use crate::config::ExactConfig;
use crate::error::{Error, Result};
use crate::packer::{BarBin, sorted_descending};
use crate::strategy::{
    FlexibleMultiLength, MinBarCount, PackOutcome, Strategy, ascending_stock_lengths,
};
use crate::types::{Kerf, LENGTH_EPSILON, SolveStatus};

/// Enumeration visits at most this many DFS nodes per allowed pattern.
const NODES_PER_PATTERN: usize = 64;

/// Upper bound on demand counts held by memo keys, summed over all entries.
const MEMO_CELL_LIMIT: usize = 1 << 22;

/// Memo entries allowed when each key holds `key_len` counts.
fn memo_capacity(key_len: usize) -> usize {
    MEMO_CELL_LIMIT / key_len.max(1)
}

#[derive(Debug, Clone)]
struct Pattern {
    stock_length: f64,
    /// Pieces of each distinct length, indexed like the solver's size list.
    counts: Vec<u32>,
    used: f64,
}

impl Pattern {
    fn efficiency(&self) -> f64 {
        self.used / self.stock_length
    }
}

/// Wall-clock budget polled every `CLOCK_CHECK_MASK + 1` steps.
struct Deadline {
    start: Instant,
    limit: Option<Duration>,
    steps: u64,
    expired: bool,
}

impl Deadline {
    const CLOCK_CHECK_MASK: u64 = 0x3FF;

    /// A limit of zero means no limit.
    fn new(limit_ms: u64) -> Self {
        Self {
            start: Instant::now(),
            limit: (limit_ms > 0).then(|| Duration::from_millis(limit_ms)),
            steps: 0,
            expired: false,
        }
    }

    #[inline]
    fn tick(&mut self) -> bool {
        self.steps = self.steps.wrapping_add(1);
        if !self.expired
            && (self.steps & Self::CLOCK_CHECK_MASK) == 0
            && let Some(limit) = self.limit
        {
            self.expired = self.start.elapsed() >= limit;
        }
        self.expired
    }

    fn elapsed_ms(&self) -> u64 {
        self.start.elapsed().as_millis() as u64
    }
}

struct PatternEnumerator<'a> {
    profile_code: &'a str,
    sizes: &'a [f64],
    demand: &'a [u32],
    kerf: Kerf,
    config: &'a ExactConfig,
    stock_length: f64,
    nodes: usize,
    seen: HashSet<Vec<u32>>,
    patterns: Vec<Pattern>,
    /// Maximal patterns dropped by `min_pattern_efficiency`.
    pruned: usize,
}

impl PatternEnumerator<'_> {
    fn fits(&self, used: f64, pieces: usize) -> bool {
        pieces <= self.config.max_pieces_per_pattern
            && used + self.kerf.gaps(pieces) <= self.stock_length + LENGTH_EPSILON
    }

    fn is_maximal(&self, counts: &[u32], used: f64, pieces: usize) -> bool {
        (0..self.sizes.len()).all(|j| {
            counts[j] >= self.demand[j] || !self.fits(used + self.sizes[j], pieces + 1)
        })
    }

    fn capacity_exceeded(&self, message: String) -> Error {
        Error::CapacityExceeded {
            profile_code: self.profile_code.to_string(),
            message,
        }
    }

    fn extend(
        &mut self,
        idx: usize,
        used: f64,
        pieces: usize,
        counts: &mut [u32],
    ) -> Result<()> {
        self.nodes += 1;
        let node_limit = self.config.max_patterns.saturating_mul(NODES_PER_PATTERN);
        if self.nodes > node_limit {
            return Err(self.capacity_exceeded(format!(
                "pattern enumeration visited more than {node_limit} combinations"
            )));
        }

        if idx == self.sizes.len() {
            if pieces == 0 || !self.is_maximal(counts, used, pieces) {
                return Ok(());
            }
            if used / self.stock_length + LENGTH_EPSILON < self.config.min_pattern_efficiency {
                self.pruned += 1;
                return Ok(());
            }
            // Stock lengths are visited shortest first, so a repeat is dominated.
            if self.seen.insert(counts.to_vec()) {
                self.patterns.push(Pattern {
                    stock_length: self.stock_length,
                    counts: counts.to_vec(),
                    used,
                });
                if self.patterns.len() > self.config.max_patterns {
                    return Err(self.capacity_exceeded(format!(
                        "more than {} cutting patterns",
                        self.config.max_patterns
                    )));
                }
            }
            return Ok(());
        }

        let size = self.sizes[idx];
        for c in (0..=self.demand[idx]).rev() {
            let added = c as usize;
            let next_used = used + size * c as f64;
            if added > 0 && !self.fits(next_used, pieces + added) {
                continue;
            }
            counts[idx] = c;
            self.extend(idx + 1, next_used, pieces + added, counts)?;
        }
        counts[idx] = 0;
        Ok(())
    }
}

struct Search<'a> {
    sizes: &'a [f64],
    patterns: &'a [Pattern],
    /// Pattern indices containing each size, most efficient first.
    covering: Vec<Vec<usize>>,
    longest_stock: f64,
    deadline: Deadline,
    memo: HashMap<Vec<u32>, (usize, f64)>,
    memo_capacity: usize,
    best_count: usize,
    best_stock: f64,
    best: Option<Vec<usize>>,
    chosen: Vec<usize>,
}

impl Search<'_> {
    fn lower_bound(&self, remaining: &[u32]) -> usize {
        let length: f64 = remaining
            .iter()
            .zip(self.sizes)
            .map(|(&d, &s)| d as f64 * s)
            .sum();
        (length / self.longest_stock - LENGTH_EPSILON).ceil().max(0.0) as usize
    }

    fn improves(&self, count: usize, stock: f64) -> bool {
        count < self.best_count
            || (count == self.best_count && stock < self.best_stock - LENGTH_EPSILON)
    }

    fn recurse(&mut self, remaining: &mut Vec<u32>, count: usize, stock: f64) {
        if self.deadline.tick() {
            return;
        }

        let Some(i) = remaining.iter().position(|&d| d > 0) else {
            if self.improves(count, stock) {
                self.best_count = count;
                self.best_stock = stock;
                self.best = Some(self.chosen.clone());
            }
            return;
        };

        let bound = count + self.lower_bound(remaining);
        if bound > self.best_count
            || (bound == self.best_count && stock >= self.best_stock - LENGTH_EPSILON)
        {
            return;
        }

        if let Some(&(c, s)) = self.memo.get(remaining.as_slice())
            && (c < count || (c == count && s <= stock + LENGTH_EPSILON))
        {
            return;
        }
        if self.memo.len() < self.memo_capacity {
            self.memo.insert(remaining.clone(), (count, stock));
        }

        let patterns = self.patterns;
        for k in 0..self.covering[i].len() {
            let p = self.covering[i][k];
            let pattern = &patterns[p];
            let taken: Vec<u32> = pattern
                .counts
                .iter()
                .zip(remaining.iter())
                .map(|(&c, &d)| c.min(d))
                .collect();
            for (d, t) in remaining.iter_mut().zip(&taken) {
                *d -= t;
            }
            self.chosen.push(p);

            self.recurse(remaining, count + 1, stock + pattern.stock_length);

            self.chosen.pop();
            for (d, t) in remaining.iter_mut().zip(&taken) {
                *d += t;
            }
            if self.deadline.expired {
                return;
            }
        }
    }
}

fn plan_cost(bins: &[BarBin]) -> (usize, f64) {
    (bins.len(), bins.iter().map(|b| b.stock_length).sum())
}

/// Distinct lengths, longest first, with how many of each are needed.
fn distinct_lengths(lengths: &[f64]) -> (Vec<f64>, Vec<u32>) {
    let mut sizes: Vec<f64> = Vec::new();
    let mut demand: Vec<u32> = Vec::new();
    for length in sorted_descending(lengths) {
        match sizes.last() {
            Some(&last) if last == length => {
                if let Some(d) = demand.last_mut() {
                    *d += 1;
                }
            }
            _ => {
                sizes.push(length);
                demand.push(1);
            }
        }
    }
    (sizes, demand)
}

/// Exact bar-count minimization over enumerated cutting patterns.
#[derive(Debug, Clone, Default)]
pub struct ExactSolver {
    config: ExactConfig,
}

impl ExactSolver {
    pub fn new(config: ExactConfig) -> Self {
        Self { config }
    }

    fn incumbent(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<Vec<BarBin>> {
        let single = MinBarCount.pack(profile_code, lengths, kerf, stock_lengths)?.bins;
        let mixed = FlexibleMultiLength.pack(profile_code, lengths, kerf, stock_lengths)?.bins;
        let (sc, ss) = plan_cost(&single);
        let (mc, ms) = plan_cost(&mixed);
        if mc < sc || (mc == sc && ms < ss - LENGTH_EPSILON) {
            Ok(mixed)
        } else {
            Ok(single)
        }
    }

    fn enumerate_patterns(
        &self,
        profile_code: &str,
        sizes: &[f64],
        demand: &[u32],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<(Vec<Pattern>, usize)> {
        let mut enumerator = PatternEnumerator {
            profile_code,
            sizes,
            demand,
            kerf,
            config: &self.config,
            stock_length: 0.0,
            nodes: 0,
            seen: HashSet::new(),
            patterns: Vec::new(),
            pruned: 0,
        };
        let mut counts = vec![0; sizes.len()];
        for &stock in stock_lengths {
            enumerator.stock_length = stock;
            enumerator.extend(0, 0.0, 0, &mut counts)?;
        }
        Ok((enumerator.patterns, enumerator.pruned))
    }

    fn patterns_to_bins(
        patterns: &[Pattern],
        chosen: &[usize],
        sizes: &[f64],
        demand: &[u32],
        kerf: Kerf,
    ) -> Vec<BarBin> {
        let mut left = demand.to_vec();
        let mut bins = Vec::with_capacity(chosen.len());
        for &p in chosen {
            let pattern = &patterns[p];
            let mut bin = BarBin::new(pattern.stock_length);
            for (j, &c) in pattern.counts.iter().enumerate() {
                let take = c.min(left[j]);
                left[j] -= take;
                for _ in 0..take {
                    bin.place(sizes[j], kerf);
                }
            }
            if !bin.lengths.is_empty() {
                bins.push(bin);
            }
        }
        bins
    }
}

impl Strategy for ExactSolver {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn pack(
        &self,
        profile_code: &str,
        lengths: &[f64],
        kerf: Kerf,
        stock_lengths: &[f64],
    ) -> Result<PackOutcome> {
        if lengths.len() > self.config.max_items {
            return Err(Error::CapacityExceeded {
                profile_code: profile_code.to_string(),
                message: format!(
                    "{} pieces exceed the limit of {}",
                    lengths.len(),
                    self.config.max_items
                ),
            });
        }
        if lengths.is_empty() {
            return Ok(PackOutcome {
                status: SolveStatus::Optimal,
                ..PackOutcome::default()
            });
        }

        let stocks = ascending_stock_lengths(stock_lengths)?;
        let longest_piece = lengths.iter().copied().fold(0.0, f64::max);
        let longest_stock = stocks.last().copied().unwrap_or(0.0);
        if kerf.requirement(longest_piece) > longest_stock + LENGTH_EPSILON {
            return Err(Error::Configuration(format!(
                "profile '{profile_code}': no stock length holds a {longest_piece} piece"
            )));
        }

        let deadline = Deadline::new(self.config.time_limit_ms);
        let incumbent = self.incumbent(profile_code, lengths, kerf, &stocks)?;
        let (sizes, demand) = distinct_lengths(lengths);
        let (patterns, pruned) =
            self.enumerate_patterns(profile_code, &sizes, &demand, kerf, &stocks)?;

        let mut covering: Vec<Vec<usize>> = vec![Vec::new(); sizes.len()];
        for (p, pattern) in patterns.iter().enumerate() {
            for (i, &c) in pattern.counts.iter().enumerate() {
                if c > 0 {
                    covering[i].push(p);
                }
            }
        }
        for list in &mut covering {
            list.sort_by(|&a, &b| patterns[b].efficiency().total_cmp(&patterns[a].efficiency()));
        }

        let (best_count, best_stock) = plan_cost(&incumbent);
        let mut search = Search {
            sizes: &sizes,
            patterns: &patterns,
            covering,
            longest_stock,
            deadline,
            memo: HashMap::new(),
            memo_capacity: memo_capacity(sizes.len()),
            best_count,
            best_stock,
            best: None,
            chosen: Vec::new(),
        };
        let mut remaining = demand.clone();
        search.recurse(&mut remaining, 0, 0.0);

        let timed_out = search.deadline.expired;
        let elapsed_ms = search.deadline.elapsed_ms();
        let bins = match &search.best {
            Some(chosen) => Self::patterns_to_bins(&patterns, chosen, &sizes, &demand, kerf),
            None => incumbent,
        };

        tracing::info!(
            profile_code,
            patterns = patterns.len(),
            incumbent_bars = best_count,
            bars = bins.len(),
            improved = search.best.is_some(),
            pruned,
            timed_out,
            elapsed_ms,
            "exact search finished"
        );

        Ok(PackOutcome {
            bins,
            status: if timed_out {
                SolveStatus::TimeLimitReached
            } else if pruned > 0 {
                // Optimality only holds over the patterns that were kept.
                SolveStatus::Heuristic
            } else {
                SolveStatus::Optimal
            },
            elapsed_ms: timed_out.then_some(elapsed_ms),
        })
    }
}
