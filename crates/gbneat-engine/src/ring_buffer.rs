use crate::Frame;

/// A fixed-capacity ring buffer that overwrites the oldest entry when full.
///
/// Storage is allocated once. Pushing moves a write cursor instead of shifting
/// elements, so the buffer never reallocates after construction.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    slots: Vec<T>,
    capacity: usize,
    // index of the slot the next push writes to
    head: usize,
}

impl<T> RingBuffer<T> {
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            head: 0,
        }
    }

    /// Creates a buffer and pushes every item from `items` into it.
    ///
    /// Only the last `capacity` items are retained.
    #[must_use]
    pub fn filled<I>(capacity: usize, items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut buf = Self::with_capacity(capacity);
        for item in items {
            buf.push(item);
        }
        buf
    }

    pub fn push(&mut self, item: T) {
        if self.capacity == 0 {
            return;
        }
        if self.slots.len() < self.capacity {
            self.slots.push(item);
        } else {
            self.slots[self.head] = item;
        }
        self.head = (self.head + 1) % self.capacity;
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Iterates from the oldest entry to the newest.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let (newer, older) = if self.slots.len() < self.capacity {
            (&self.slots[..], &self.slots[..0])
        } else {
            let (newer, older) = self.slots.split_at(self.head);
            (newer, older)
        };
        older.iter().chain(newer)
    }

    /// Returns the most recently pushed entry.
    #[must_use]
    pub fn newest(&self) -> Option<&T> {
        if self.slots.is_empty() {
            return None;
        }
        let idx = (self.head + self.capacity - 1) % self.capacity;
        self.slots.get(idx)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }
}

/// A fixed number of equally sized frames kept in one contiguous arena.
///
/// All slots start black. [`push`](Self::push) copies a frame into the oldest slot,
/// so the history always holds exactly `capacity` frames.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    width: usize,
    height: usize,
    capacity: usize,
    arena: Vec<u8>,
    // slot holding the newest frame
    newest: usize,
}

impl FrameHistory {
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    #[must_use]
    pub fn new(width: usize, height: usize, capacity: usize) -> Self {
        assert!(capacity > 0, "frame history needs at least one slot");
        Self {
            width,
            height,
            capacity,
            arena: vec![0; width * height * capacity],
            newest: 0,
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn frame_len(&self) -> usize {
        self.width * self.height
    }

    /// Number of values written by [`write_normalized`](Self::write_normalized).
    #[must_use]
    pub fn len(&self) -> usize {
        self.arena.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Overwrites the oldest slot with `frame`.
    ///
    /// # Panics
    ///
    /// Panics if the frame dimensions differ from the history's.
    pub fn push(&mut self, frame: &Frame) {
        assert_eq!(
            (frame.width(), frame.height()),
            (self.width, self.height),
            "frame size mismatch"
        );
        self.newest = (self.newest + 1) % self.capacity;
        let len = self.frame_len();
        let start = self.newest * len;
        self.arena[start..start + len].copy_from_slice(frame.pixels());
    }

    /// Returns slot `age`, where 0 is the newest frame.
    #[must_use]
    pub fn frame(&self, age: usize) -> Option<&[u8]> {
        if age >= self.capacity {
            return None;
        }
        let slot = (self.newest + self.capacity - age) % self.capacity;
        let len = self.frame_len();
        Some(&self.arena[slot * len..(slot + 1) * len])
    }

    /// Appends all frames scaled to `[0, 1]`.
    ///
    /// Values are interleaved per pixel, newest frame first:
    /// `[p0(age 0), p0(age 1), .., p1(age 0), ..]`.
    pub fn write_normalized(&self, out: &mut Vec<f64>) {
        out.reserve(self.len());
        let frames = (0..self.capacity)
            .filter_map(|age| self.frame(age))
            .collect::<Vec<_>>();
        for i in 0..self.frame_len() {
            for frame in &frames {
                out.push(f64::from(frame[i]) / 255.0);
            }
        }
    }
}
