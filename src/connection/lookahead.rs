/// Holds the most recently decoded value until the value after it decodes as well.
///
/// A corrupt record can damage the bytes right before it, so a value is only released once its
/// successor is known to be sound, or at the clean end of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lookahead<T> {
    held: Option<T>,
}

impl<T> Default for Lookahead<T> {
    fn default() -> Self {
        Lookahead { held: None }
    }
}

impl<T> Lookahead<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Holds `next` and releases the value it confirms.
    pub fn advance(&mut self, next: T) -> Option<T> {
        self.held.replace(next)
    }

    /// Drops the held value, returning it for logging.
    pub fn discard(&mut self) -> Option<T> {
        self.held.take()
    }

    /// Releases the held value at the end of the stream.
    pub fn finish(&mut self) -> Option<T> {
        self.held.take()
    }

    pub fn held(&self) -> Option<&T> {
        self.held.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_release_order() {
        let mut lookahead = Lookahead::new();
        assert_eq!(lookahead.advance(1), None);
        assert_eq!(lookahead.advance(2), Some(1));
        assert_eq!(lookahead.held(), Some(&2));

        // record 3 failed: 2 goes with it
        assert_eq!(lookahead.discard(), Some(2));
        assert_eq!(lookahead.advance(4), None);
        assert_eq!(lookahead.finish(), Some(4));
        assert!(lookahead.is_empty());
    }
}
