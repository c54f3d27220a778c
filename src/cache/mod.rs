//! Kernel column cache
//!
//! Caches a prefix `[0, len)` of each Q-matrix row as `f32`. Rows live in an
//! LRU list with a budget counted in floats. When a row has to grow, space is
//! reclaimed from the least recently used rows, truncating a row's suffix
//! when that alone frees enough, so only the needed amount is given back.

use lru::LruCache;

/// Bytes charged per row for bookkeeping
const ROW_OVERHEAD_BYTES: usize = 16;

/// LRU cache of kernel matrix row prefixes
pub struct KernelCache {
    rows: LruCache<usize, Vec<f32>>,
    /// Budget in floats
    capacity: usize,
    /// Floats still available
    free: usize,
    hits: u64,
    misses: u64,
}

impl KernelCache {
    /// Create a cache for `l` rows with a budget of `size_bytes`
    ///
    /// The budget never drops below two full rows.
    pub fn new(l: usize, size_bytes: usize) -> Self {
        let capacity = (size_bytes / 4)
            .saturating_sub(l * (ROW_OVERHEAD_BYTES / 4))
            .max(2 * l);
        Self {
            rows: LruCache::unbounded(),
            capacity,
            free: capacity,
            hits: 0,
            misses: 0,
        }
    }

    /// Create a cache from a size in megabytes
    pub fn with_megabytes(l: usize, megabytes: f64) -> Self {
        Self::new(l, (megabytes * (1 << 20) as f64) as usize)
    }

    /// Request columns `[0, len)` of row `index`
    ///
    /// Returns the row buffer together with the first position that still
    /// has to be computed; it equals `len` when nothing is missing. The row
    /// becomes the most recently used one.
    pub fn get_data(&mut self, index: usize, len: usize) -> (&mut [f32], usize) {
        let mut row = self.rows.pop(&index).unwrap_or_default();
        let cached = row.len();

        let fill_from = if len > cached {
            let more = len - cached;
            self.reclaim(more);
            row.resize(len, 0.0);
            self.free = self.free.saturating_sub(more);
            self.misses += 1;
            cached
        } else {
            self.hits += 1;
            len
        };

        let row = self.rows.get_or_insert_mut(index, || row);
        (row.as_mut_slice(), fill_from)
    }

    /// Free space from the LRU end until `more` floats are available
    fn reclaim(&mut self, more: usize) {
        while self.free < more {
            let needed = more - self.free;
            let (victim, victim_len) = match self.rows.peek_lru() {
                Some((&k, row)) => (k, row.len()),
                None => break,
            };

            if victim_len <= needed {
                self.rows.pop(&victim);
                self.free += victim_len;
            } else if let Some(row) = self.rows.peek_mut(&victim) {
                row.truncate(victim_len - needed);
                row.shrink_to_fit();
                self.free += needed;
            }
        }
    }

    /// Follow a swap of examples `i` and `j` in the solver's ordering
    ///
    /// The rows are exchanged, and entries `i` and `j` are exchanged inside
    /// every row long enough to hold both. A row covering only the smaller
    /// position is dropped.
    pub fn swap_index(&mut self, i: usize, j: usize) {
        if i == j {
            return;
        }

        let row_i = self.rows.pop(&i);
        let row_j = self.rows.pop(&j);
        if let Some(row) = row_j {
            self.rows.put(i, row);
        }
        if let Some(row) = row_i {
            self.rows.put(j, row);
        }

        let (lo, hi) = if i < j { (i, j) } else { (j, i) };
        let mut dropped = Vec::new();
        for (&k, row) in self.rows.iter_mut() {
            if row.len() > lo {
                if row.len() > hi {
                    row.swap(lo, hi);
                } else {
                    dropped.push(k);
                }
            }
        }
        for k in dropped {
            if let Some(row) = self.rows.pop(&k) {
                self.free += row.len();
            }
        }
    }

    /// Number of columns currently cached for a row
    pub fn cached_len(&self, index: usize) -> usize {
        self.rows.peek(&index).map_or(0, Vec::len)
    }

    /// Get cache hit rate
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Get cache statistics
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            capacity: self.capacity,
            used: self.capacity - self.free,
            rows: self.rows.len(),
        }
    }
}

/// Cache statistics; sizes are in floats
#[derive(Debug, Clone)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub capacity: usize,
    pub used: usize,
    pub rows: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fill(cache: &mut KernelCache, index: usize, len: usize) -> usize {
        let (row, start) = cache.get_data(index, len);
        for (j, slot) in row.iter_mut().enumerate().take(len).skip(start) {
            *slot = (index * 100 + j) as f32;
        }
        start
    }

    #[test]
    fn test_budget_floor() {
        // 64 bytes minus overhead of 4 rows is 0 floats; the floor is 2 rows
        let cache = KernelCache::new(4, 64);
        assert_eq!(cache.stats().capacity, 8);

        let cache = KernelCache::new(4, 4000);
        assert_eq!(cache.stats().capacity, 1000 - 16);
    }

    #[test]
    fn test_growth_reports_uncached_suffix() {
        let mut cache = KernelCache::new(10, 1 << 20);

        assert_eq!(fill(&mut cache, 3, 4), 0);
        assert_eq!(fill(&mut cache, 3, 4), 4);
        assert_eq!(fill(&mut cache, 3, 7), 4);
        assert_eq!(fill(&mut cache, 3, 2), 2);

        let (row, _) = cache.get_data(3, 7);
        assert_eq!(row[..7], [300.0f32, 301.0, 302.0, 303.0, 304.0, 305.0, 306.0]);

        let stats = cache.stats();
        assert_eq!(stats.misses, 2);
        assert_eq!(stats.hits, 3);
        assert_eq!(stats.used, 7);
    }

    #[test]
    fn test_eviction_truncates_lru_row() {
        let mut cache = KernelCache::new(4, 64);

        fill(&mut cache, 0, 4);
        fill(&mut cache, 1, 4);
        assert_eq!(cache.stats().used, 8);

        // Row 0 is least recently used and only gives up two columns
        assert_eq!(fill(&mut cache, 2, 2), 0);
        assert_eq!(cache.cached_len(0), 2);
        assert_eq!(cache.cached_len(1), 4);

        // Growing row 0 again recomputes only its lost suffix, at row 1's expense
        assert_eq!(fill(&mut cache, 0, 4), 2);
        assert_eq!(cache.cached_len(1), 2);
        assert_eq!(cache.cached_len(2), 2);
        assert_eq!(cache.stats().used, 8);

        let (row, _) = cache.get_data(0, 4);
        assert_eq!(row[..4], [0.0f32, 1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_eviction_drops_whole_rows() {
        let mut cache = KernelCache::new(4, 64);
        fill(&mut cache, 0, 2);
        fill(&mut cache, 1, 2);
        fill(&mut cache, 2, 4);

        assert_eq!(fill(&mut cache, 3, 4), 0);
        assert_eq!(cache.cached_len(0), 0);
        assert_eq!(cache.cached_len(1), 0);
        assert_eq!(cache.cached_len(2), 4);
        assert_eq!(cache.stats().rows, 2);
    }

    #[test]
    fn test_swap_index() {
        let mut cache = KernelCache::new(6, 1 << 20);
        fill(&mut cache, 0, 6);
        fill(&mut cache, 4, 6);
        fill(&mut cache, 5, 1);
        fill(&mut cache, 2, 2);

        cache.swap_index(4, 1);

        // Row 4 moved to key 1 and, like every full row, had entries 1 and 4 exchanged
        assert_eq!(cache.cached_len(4), 0);
        let (row, start) = cache.get_data(1, 6);
        assert_eq!(start, 6);
        assert_eq!(row[..6], [400.0f32, 404.0, 402.0, 403.0, 401.0, 405.0]);
        let (row, _) = cache.get_data(0, 6);
        assert_eq!(row[..6], [0.0f32, 4.0, 2.0, 3.0, 1.0, 5.0]);

        // Row 2 covers position 1 but not 4, so it is dropped
        assert_eq!(cache.cached_len(2), 0);
        // Row 5 covers neither position and is kept
        assert_eq!(cache.cached_len(5), 1);
        assert_eq!(cache.stats().used, 13);
    }
}
