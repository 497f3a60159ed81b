//! Output buffer pair
//!
//! Two equally sized device-sample buffers and the `cycle` flag selecting
//! which one is loaded from the file and which one is played:
//!
//! | `cycle` | load target | play source |
//! |---|---|---|
//! | `false` | buffer 0 | buffer 1 |
//! | `true`  | buffer 1 | buffer 0 |
//!
//! The flag starts `false`, so the priming load fills buffer 0 and the first
//! flip makes it the first play source.

/// Double buffer with alternating load/play roles
#[derive(Debug)]
pub struct BufferPair<S> {
    buffers: [Vec<S>; 2],
    cycle: bool,
    flips: u64,
}

impl<S: Copy + Default> BufferPair<S> {
    /// Allocate two zeroed buffers of `len` samples each
    pub fn new(len: usize) -> Self {
        BufferPair {
            buffers: [vec![S::default(); len], vec![S::default(); len]],
            cycle: false,
            flips: 0,
        }
    }

    /// Samples per buffer
    pub fn len(&self) -> usize {
        self.buffers[0].len()
    }

    /// Whether the buffers hold no samples
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current value of the cycle flag
    pub fn cycle(&self) -> bool {
        self.cycle
    }

    /// Index of the current load target
    pub fn load_index(&self) -> usize {
        usize::from(self.cycle)
    }

    /// Index of the current play source
    pub fn play_index(&self) -> usize {
        1 - self.load_index()
    }

    /// Swap the roles of the two buffers
    pub fn flip(&mut self) {
        self.cycle = !self.cycle;
        self.flips += 1;
    }

    /// Number of flips so far
    pub fn flips(&self) -> u64 {
        self.flips
    }

    /// The current play source
    pub fn play(&self) -> &[S] {
        &self.buffers[self.play_index()]
    }

    /// The current load target
    pub fn load_mut(&mut self) -> &mut [S] {
        let index = self.load_index();
        &mut self.buffers[index]
    }

    /// Borrow the play source and the load target at the same time
    pub fn split_roles(&mut self) -> (&[S], &mut [S]) {
        let [buffer0, buffer1] = &mut self.buffers;
        if self.cycle {
            (buffer0.as_slice(), buffer1.as_mut_slice())
        } else {
            (buffer1.as_slice(), buffer0.as_mut_slice())
        }
    }

    /// Address of buffer `index` (identity checks)
    pub fn buffer_ptr(&self, index: usize) -> *const S {
        self.buffers[index].as_ptr()
    }
}
