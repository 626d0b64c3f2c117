//! Fixed-capacity staging buffers

/// Append-only arena with a hard capacity.
///
/// The batch stages vertices, indices and uniform blocks here between
/// flushes. Capacity never grows; callers check [`FixedBuffer::remaining`]
/// and flush when a push would not fit.
#[derive(Clone, Debug)]
pub struct FixedBuffer<T: Copy> {
    data: Vec<T>,
    capacity: usize,
}

impl<T: Copy> FixedBuffer<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.data.len() == self.capacity
    }

    pub fn remaining(&self) -> usize {
        self.capacity - self.data.len()
    }

    /// Append one element and return its slot.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is full.
    pub fn push(&mut self, value: T) -> usize {
        assert!(!self.is_full(), "fixed buffer overflow (capacity {})", self.capacity);
        self.data.push(value);
        self.data.len() - 1
    }

    /// Append a slice.
    ///
    /// # Panics
    ///
    /// Panics if the slice does not fit.
    pub fn extend_from_slice(&mut self, values: &[T]) {
        assert!(
            values.len() <= self.remaining(),
            "fixed buffer overflow: {} more into {} remaining",
            values.len(),
            self.remaining()
        );
        self.data.extend_from_slice(values);
    }

    /// Overwrite an existing slot
    pub fn set(&mut self, index: usize, value: T) {
        self.data[index] = value;
    }

    pub fn reset(&mut self) {
        self.data.clear();
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_and_reset() {
        let mut buf = FixedBuffer::new(3);
        assert_eq!(buf.push(1u32), 0);
        buf.extend_from_slice(&[2, 3]);
        assert!(buf.is_full());
        assert_eq!(buf.remaining(), 0);
        assert_eq!(buf.as_slice(), &[1, 2, 3]);
        buf.reset();
        assert!(buf.is_empty());
        assert_eq!(buf.capacity(), 3);
    }

    #[test]
    #[should_panic(expected = "overflow")]
    fn test_overflow_panics() {
        let mut buf = FixedBuffer::new(1);
        buf.push(0u8);
        buf.push(1u8);
    }

    #[test]
    #[should_panic(expected = "non-zero")]
    fn test_zero_capacity_panics() {
        let _ = FixedBuffer::<u8>::new(0);
    }
}
