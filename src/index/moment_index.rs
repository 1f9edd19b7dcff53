//! Moment index: sorted (sequence, moment_id) pairs for ordering and
//! duplicate-sequence detection.

/// Sorted list of (sequence, moment_id) pairs. Sequences are unique and finite.
pub struct MomentIndex {
    /// Sorted by sequence ascending.
    entries: Vec<(f64, String)>,
}

impl MomentIndex {
    /// Create a new, empty moment index.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    fn search(&self, sequence: f64) -> Result<usize, usize> {
        let sequence = sequence + 0.0;
        self.entries
            .binary_search_by(|(seq, _)| seq.total_cmp(&sequence))
    }

    /// The moment id at an exact sequence.
    pub fn id_at(&self, sequence: f64) -> Option<&str> {
        self.search(sequence)
            .ok()
            .map(|pos| self.entries[pos].1.as_str())
    }

    /// All moment ids in ascending sequence order.
    pub fn ordered_ids(&self) -> Vec<&str> {
        self.entries.iter().map(|(_, id)| id.as_str()).collect()
    }

    /// Incrementally add a moment. Returns `false` if the sequence is taken.
    pub fn insert(&mut self, sequence: f64, id: &str) -> bool {
        match self.search(sequence) {
            Ok(_) => false,
            Err(pos) => {
                self.entries.insert(pos, (sequence + 0.0, id.to_string()));
                true
            }
        }
    }

    /// Remove the moment at `sequence`.
    pub fn remove(&mut self, sequence: f64) {
        if let Ok(pos) = self.search(sequence) {
            self.entries.remove(pos);
        }
    }
}

impl Default for MomentIndex {
    fn default() -> Self {
        Self::new()
    }
}
