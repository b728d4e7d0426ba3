//! Batching contract (spec.md §4.5 "Batching contract"): a page stops
//! growing at the first of a byte cap, a caller-supplied `batchSize`, or
//! source exhaustion.

/// Wire-response size cap a single batch must not exceed (spec.md §4.5,
/// §8 boundary conditions).
pub const BSON_OUTPUT_LIMIT_BYTES: usize = 16 * 1024 * 1024;

/// Accumulates rows for one `find`/`getMore` response, enforcing the
/// batching contract as rows are offered one at a time.
pub struct BatchWriter {
    batch_size_limit: Option<i64>,
    byte_limit: usize,
    accumulated_bytes: usize,
    rows: Vec<crate::bson::Document>,
}

impl BatchWriter {
    pub fn new(batch_size_limit: Option<i64>) -> Self {
        Self {
            batch_size_limit,
            byte_limit: BSON_OUTPUT_LIMIT_BYTES,
            accumulated_bytes: 0,
            rows: Vec::new(),
        }
    }

    /// Offer one more row, already BSON-encoded length known to the
    /// caller. Returns `false` when the batch is full and the caller
    /// should stop pulling from the source without consuming this row.
    /// A batch that is still empty always accepts its first row, even if
    /// that row alone exceeds the byte cap (spec.md §4.5: the cap bounds
    /// further growth, not a single oversized document).
    pub fn try_push(&mut self, row: crate::bson::Document, encoded_len: usize) -> bool {
        if self.is_full() {
            return false;
        }
        if !self.rows.is_empty() && self.accumulated_bytes + encoded_len > self.byte_limit {
            return false;
        }
        self.accumulated_bytes += encoded_len;
        self.rows.push(row);
        true
    }

    pub fn is_full(&self) -> bool {
        match self.batch_size_limit {
            Some(limit) => self.rows.len() as i64 >= limit,
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<crate::bson::Document> {
        self.rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bson::Document;

    #[test]
    fn batch_size_stops_the_batch_at_the_limit() {
        let mut writer = BatchWriter::new(Some(2));
        assert!(writer.try_push(Document::new(), 10));
        assert!(writer.try_push(Document::new(), 10));
        assert!(!writer.try_push(Document::new(), 10));
        assert_eq!(writer.len(), 2);
    }

    #[test]
    fn byte_cap_stops_growth_but_always_admits_the_first_row() {
        let mut writer = BatchWriter::new(None);
        assert!(writer.try_push(Document::new(), BSON_OUTPUT_LIMIT_BYTES + 1));
        assert!(!writer.try_push(Document::new(), 1));
        assert_eq!(writer.len(), 1);
    }

    #[test]
    fn unbounded_batch_accepts_until_exhaustion() {
        let mut writer = BatchWriter::new(None);
        for _ in 0..100 {
            assert!(writer.try_push(Document::new(), 1));
        }
        assert_eq!(writer.len(), 100);
    }
}
