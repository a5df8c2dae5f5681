//! Request path decomposition.
//!
//! # Responsibilities
//! - Split a request path into its non-empty segments
//! - Hand segments out leftmost first
//! - Rewind to the original decomposition on demand
//!
//! # Design Decisions
//! - Segments are opaque names; no decoding beyond what hyper guarantees
//! - Consumption is an index into the parsed segments, so reset is O(1)

/// An ordered, rewindable stack of path segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathStack {
    segments: Vec<String>,
    cursor: usize,
}

impl PathStack {
    /// Build a stack from a request path (query strings are ignored).
    pub fn build(raw: &str) -> Self {
        let path = raw.split(['?', '#']).next().unwrap_or_default();
        let segments = path
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        Self { segments, cursor: 0 }
    }

    /// Remove and return the next segment, or an empty string once exhausted.
    pub fn pop(&mut self) -> String {
        match self.segments.get(self.cursor) {
            Some(segment) => {
                self.cursor += 1;
                segment.clone()
            }
            None => String::new(),
        }
    }

    /// Number of segments not yet popped.
    pub fn remaining_depth(&self) -> usize {
        self.segments.len() - self.cursor
    }

    /// Restore the stack to the state produced by [`PathStack::build`].
    pub fn reset(&mut self) {
        self.cursor = 0;
    }

    /// Segments not yet popped.
    pub fn remaining(&self) -> &[String] {
        &self.segments[self.cursor..]
    }
}
