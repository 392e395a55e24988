//! Frame slot ring.

/// Per-frame resources cycled across frames in flight.
#[derive(Debug)]
pub struct FrameRing<T> {
    slots: Vec<T>,
    current: usize,
}

impl<T> FrameRing<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            current: 0,
        }
    }

    pub fn push(&mut self, slot: T) {
        self.slots.push(slot);
    }

    /// Resources of the current frame, if any slot exists.
    pub fn current(&self) -> Option<&T> {
        self.slots.get(self.current)
    }

    pub fn current_mut(&mut self) -> Option<&mut T> {
        self.slots.get_mut(self.current)
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Advance to the next frame slot.
    pub fn advance(&mut self) {
        if !self.slots.is_empty() {
            self.current = (self.current + 1) % self.slots.len();
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every slot, newest first.
    pub fn drain(&mut self) -> impl Iterator<Item = T> + '_ {
        self.current = 0;
        self.slots.drain(..).rev()
    }
}

impl<T> Default for FrameRing<T> {
    fn default() -> Self {
        Self::new()
    }
}
