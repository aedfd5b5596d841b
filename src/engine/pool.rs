use super::trade::MatchResult;
use std::cell::RefCell;

/// A memory pool for reusing fill vectors, keeping the matcher to a single
/// transient allocation per incoming order after warmup.
#[derive(Debug)]
pub struct MatchingPool {
    results_pool: RefCell<Vec<Vec<MatchResult>>>,
    ids_pool: RefCell<Vec<Vec<String>>>,
}

impl MatchingPool {
    /// Creates a new, empty matching pool.
    #[must_use]
    pub fn new() -> Self {
        MatchingPool {
            results_pool: RefCell::new(Vec::with_capacity(4)),
            ids_pool: RefCell::new(Vec::with_capacity(4)),
        }
    }

    /// Retrieves a fill vector from the pool.
    pub fn get_results_vec(&self) -> Vec<MatchResult> {
        self.results_pool
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(16))
    }

    /// Returns a fill vector to the pool for reuse.
    pub fn return_results_vec(&self, mut vec: Vec<MatchResult>) {
        vec.clear();
        self.results_pool.borrow_mut().push(vec);
    }

    /// Retrieves a vector for drained maker ids from the pool.
    pub fn get_ids_vec(&self) -> Vec<String> {
        self.ids_pool
            .borrow_mut()
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(16))
    }

    /// Returns a drained-maker vector to the pool for reuse.
    pub fn return_ids_vec(&self, mut vec: Vec<String>) {
        vec.clear();
        self.ids_pool.borrow_mut().push(vec);
    }
}

impl Default for MatchingPool {
    fn default() -> Self {
        Self::new()
    }
}
