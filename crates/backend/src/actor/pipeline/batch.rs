//! Buffer-and-flush accumulator owned by a single stage handler

/// Append-only buffer that hands back its contents every `size` items
#[derive(Debug)]
pub struct Batch<T> {
  items: Vec<T>,
  size: usize,
}

impl<T> Batch<T> {
  /// `size` is clamped to at least one
  pub fn new(size: usize) -> Self {
    let size = size.max(1);
    Self {
      items: Vec::with_capacity(size),
      size,
    }
  }

  /// Append `item`; returns the full batch (emptying the buffer) once it
  /// reaches `size`
  pub fn push(&mut self, item: T) -> Option<Vec<T>> {
    self.items.push(item);
    if self.items.len() >= self.size {
      Some(self.take())
    } else {
      None
    }
  }

  /// Empty the buffer, returning whatever it held
  pub fn take(&mut self) -> Vec<T> {
    std::mem::replace(&mut self.items, Vec::with_capacity(self.size))
  }

  pub fn len(&self) -> usize {
    self.items.len()
  }

  pub fn is_empty(&self) -> bool {
    self.items.is_empty()
  }

  pub fn size(&self) -> usize {
    self.size
  }
}
