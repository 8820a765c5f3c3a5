//! Generational arena of audio buffers

use super::AudioBuffer;

/// Non-owning reference to a buffer in a [`BufferPool`]
///
/// Ids carry a generation, so an id kept after its buffer was freed never
/// resolves to a later buffer that reused the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferId {
    index: u32,
    generation: u32,
}

impl BufferId {
    pub fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug)]
struct Entry {
    generation: u32,
    buffer: Option<AudioBuffer>,
}

/// Arena owning every buffer created through the engine
#[derive(Debug, Default)]
pub struct BufferPool {
    entries: Vec<Entry>,
    free: Vec<u32>,
    len: usize,
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take ownership of `buffer` and return its id
    pub fn insert(&mut self, buffer: AudioBuffer) -> BufferId {
        self.len += 1;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.buffer = Some(buffer);
            return BufferId {
                index,
                generation: entry.generation,
            };
        }

        let index = self.entries.len() as u32;
        self.entries.push(Entry {
            generation: 0,
            buffer: Some(buffer),
        });
        BufferId {
            index,
            generation: 0,
        }
    }

    /// Release a buffer; the id (and any copy of it) becomes stale
    pub fn remove(&mut self, id: BufferId) -> Option<AudioBuffer> {
        let entry = self.entries.get_mut(id.index as usize)?;
        if entry.generation != id.generation {
            return None;
        }
        let buffer = entry.buffer.take()?;
        entry.generation = entry.generation.wrapping_add(1);
        self.free.push(id.index);
        self.len -= 1;
        Some(buffer)
    }

    pub fn get(&self, id: BufferId) -> Option<&AudioBuffer> {
        self.entries
            .get(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.buffer.as_ref())
    }

    pub fn get_mut(&mut self, id: BufferId) -> Option<&mut AudioBuffer> {
        self.entries
            .get_mut(id.index as usize)
            .filter(|e| e.generation == id.generation)
            .and_then(|e| e.buffer.as_mut())
    }

    pub fn contains(&self, id: BufferId) -> bool {
        self.get(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}
