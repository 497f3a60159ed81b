//! Ring buffer between the playback thread and the realtime output callback
//!
//! - Producer: the playback engine, pushing one converted period per write
//! - Consumer: the audio output source, pulling samples as the device asks
//!
//! Memory consumption is fixed at `capacity * sizeof(f32)`.
//! Uses mutex-based synchronization with atomic position tracking for visibility.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Error type for ring buffer construction
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct RingBufferError(pub String);

/// Ring buffer for streaming f32 samples
///
/// Read and write positions are free-running counters; the occupied length is
/// their wrapping difference and the storage index is `pos & mask`.
#[derive(Debug)]
pub struct RingBuffer {
    buffer: Mutex<Vec<f32>>,
    write_pos: AtomicUsize,
    read_pos: AtomicUsize,
    /// Power of two
    capacity: usize,
    mask: usize,
}

impl RingBuffer {
    /// Create a ring buffer holding at least `requested_capacity` samples
    ///
    /// Capacity is rounded up to the next power of two.
    ///
    /// # Errors
    ///
    /// Fails if the requested capacity is 0 or exceeds 512 MB of samples.
    pub fn new(requested_capacity: usize) -> Result<Self, RingBufferError> {
        if requested_capacity == 0 {
            return Err(RingBufferError(
                "Ring buffer capacity must be greater than 0".into(),
            ));
        }

        const MAX_CAPACITY: usize = 512 * 1024 * 1024 / std::mem::size_of::<f32>();
        let capacity = requested_capacity.next_power_of_two();
        if capacity > MAX_CAPACITY {
            return Err(RingBufferError(format!(
                "Ring buffer capacity {capacity} exceeds maximum safe size {MAX_CAPACITY}"
            )));
        }

        Ok(RingBuffer {
            buffer: Mutex::new(vec![0.0; capacity]),
            write_pos: AtomicUsize::new(0),
            read_pos: AtomicUsize::new(0),
            capacity,
            mask: capacity - 1,
        })
    }

    /// Capacity in samples
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples available to read
    pub fn available_read(&self) -> usize {
        let write = self.write_pos.load(Ordering::Acquire);
        let read = self.read_pos.load(Ordering::Acquire);
        write.wrapping_sub(read)
    }

    /// Free space in samples
    #[cfg(test)]
    pub fn available_write(&self) -> usize {
        self.capacity - self.available_read()
    }

    /// Write samples (producer); returns how many fit
    pub fn write(&self, samples: &[f32]) -> usize {
        let mut buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let free = self.capacity - write_pos.wrapping_sub(read_pos);

        let to_write = samples.len().min(free);
        if to_write == 0 {
            return 0;
        }

        let start = write_pos & self.mask;
        let first = to_write.min(self.capacity - start);
        buf[start..start + first].copy_from_slice(&samples[..first]);
        buf[..to_write - first].copy_from_slice(&samples[first..to_write]);

        drop(buf);

        self.write_pos
            .store(write_pos.wrapping_add(to_write), Ordering::Release);

        to_write
    }

    /// Read samples (consumer); returns how many were copied into `dest`
    pub fn read(&self, dest: &mut [f32]) -> usize {
        let buf = self.buffer.lock();

        let write_pos = self.write_pos.load(Ordering::Acquire);
        let read_pos = self.read_pos.load(Ordering::Acquire);
        let available = write_pos.wrapping_sub(read_pos);

        let to_read = dest.len().min(available);
        if to_read == 0 {
            return 0;
        }

        let start = read_pos & self.mask;
        let first = to_read.min(self.capacity - start);
        dest[..first].copy_from_slice(&buf[start..start + first]);
        dest[first..to_read].copy_from_slice(&buf[..to_read - first]);

        drop(buf);

        self.read_pos
            .store(read_pos.wrapping_add(to_read), Ordering::Release);

        to_read
    }

    /// Whether nothing is left to read
    pub fn is_empty(&self) -> bool {
        self.available_read() == 0
    }

    /// Fill level (0.0 to 1.0)
    #[cfg(test)]
    pub fn fill_percentage(&self) -> f32 {
        (self.available_read() as f32) / (self.capacity as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ring_buffer_creation() {
        let rb = RingBuffer::new(1024).unwrap();
        assert_eq!(rb.capacity(), 1024);
        assert!(rb.is_empty());
        assert_eq!(rb.available_write(), 1024);
    }

    #[test]
    fn test_ring_buffer_power_of_two() {
        let rb = RingBuffer::new(1000).unwrap();
        assert_eq!(rb.capacity(), 1024);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(RingBuffer::new(0).is_err());
    }

    #[test]
    fn test_write_and_read() {
        let rb = RingBuffer::new(16).unwrap();
        let samples = vec![0.1, 0.2, 0.3, 0.4];

        assert_eq!(rb.write(&samples), 4);
        assert_eq!(rb.available_read(), 4);

        let mut dest = vec![0.0; 4];
        assert_eq!(rb.read(&mut dest), 4);
        assert_eq!(dest, samples);
        assert!(rb.is_empty());
    }

    #[test]
    fn test_write_stops_when_full() {
        let rb = RingBuffer::new(8).unwrap();
        assert_eq!(rb.write(&[1.0; 6]), 6);
        assert_eq!(rb.write(&[2.0; 6]), 2);
        assert_eq!(rb.write(&[3.0; 1]), 0);
        assert_eq!(rb.available_write(), 0);
        approx::assert_relative_eq!(rb.fill_percentage(), 1.0);
    }

    #[test]
    fn test_wrap_around_preserves_order() {
        let rb = RingBuffer::new(8).unwrap();
        let mut dest = [0.0f32; 8];

        assert_eq!(rb.write(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 6);
        assert_eq!(rb.read(&mut dest[..5]), 5);

        assert_eq!(rb.write(&[7.0, 8.0, 9.0, 10.0, 11.0]), 5);
        assert_eq!(rb.available_read(), 6);

        let read = rb.read(&mut dest);
        assert_eq!(read, 6);
        assert_eq!(&dest[..6], &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }
}
