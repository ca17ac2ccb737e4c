//! Input ring shared between the USB receive path and the reader.

use heapless::spsc::{Consumer, Producer, Queue};

/// Byte ring with one producer and one consumer, holding up to `N - 1`
/// bytes.
///
/// Created once and [`split`](Self::split) into an [`RxProducer`] for the
/// USB receive-complete context and an [`RxConsumer`] for the application.
pub struct RxRing<const N: usize> {
    queue: Queue<u8, N>,
}

impl<const N: usize> RxRing<N> {
    pub const fn new() -> Self {
        Self { queue: Queue::new() }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    /// Hand out the two ends. Exclusive access guarantees there is only
    /// ever one of each.
    pub fn split(&mut self) -> (RxProducer<'_>, RxConsumer<'_>) {
        let (producer, consumer) = self.queue.split();
        (RxProducer { inner: producer }, RxConsumer { inner: consumer })
    }
}

impl<const N: usize> Default for RxRing<N> {
    fn default() -> Self {
        Self::new()
    }
}

/// Writing end, owned by the USB receive path.
pub struct RxProducer<'r> {
    inner: Producer<'r, u8>,
}

impl RxProducer<'_> {
    /// Free space right now.
    pub fn free(&self) -> usize {
        self.inner.capacity() - self.inner.len()
    }

    /// Store a received chunk. A chunk that does not fit is dropped as a
    /// whole and `false` returned; a partial line is worse than none.
    pub fn put_rx_data(&mut self, chunk: &[u8]) -> bool {
        if chunk.len() > self.free() {
            return false;
        }
        // only this end adds bytes, so the room checked above stays
        for &byte in chunk {
            if self.inner.enqueue(byte).is_err() {
                return false;
            }
        }
        true
    }
}

/// Reading end, owned by the application.
pub struct RxConsumer<'r> {
    inner: Consumer<'r, u8>,
}

impl RxConsumer<'_> {
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    pub fn peek(&self) -> Option<u8> {
        self.inner.peek().copied()
    }

    pub fn pop(&mut self) -> Option<u8> {
        self.inner.dequeue()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_around() {
        let mut ring = RxRing::<5>::new();
        assert_eq!(ring.capacity(), 4);
        let (mut tx, mut rx) = ring.split();

        assert!(tx.put_rx_data(&[1, 2, 3]));
        assert_eq!(rx.pop(), Some(1));
        assert_eq!(rx.pop(), Some(2));
        assert!(tx.put_rx_data(&[4, 5, 6]));
        assert_eq!(rx.len(), 4);
        assert_eq!(tx.free(), 0);

        let mut out = [0u8; 4];
        for slot in out.iter_mut() {
            *slot = rx.pop().unwrap();
        }
        assert_eq!(out, [3, 4, 5, 6]);
        assert_eq!(rx.pop(), None);
    }

    #[test]
    fn oversized_chunk_is_rejected_whole() {
        let mut ring = RxRing::<5>::new();
        let (mut tx, rx) = ring.split();

        assert!(tx.put_rx_data(&[7, 8]));
        assert!(!tx.put_rx_data(&[1, 2, 3]));
        assert_eq!(rx.len(), 2);
        assert_eq!(rx.peek(), Some(7));
    }
}
