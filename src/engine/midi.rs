//! MIDI bus multiplexer
//!
//! Events for all sixteen buses share one append-only byte log. Each record
//! is a 12-byte header (`bus`, `offset`, `size`, little-endian `u32`s)
//! followed by `size` payload bytes.
//!
//! Two read disciplines exist: one global cursor that walks every event in
//! order, or one cursor per bus. A buffer must be read with only one of them
//! within a cycle.

/// Number of MIDI buses
pub const MAX_MIDI_BUSES: usize = 16;

/// Largest payload accepted for one event (16 MiB)
pub const MAX_MIDI_MESSAGE_SIZE: usize = 1 << 24;

const HEADER_SIZE: usize = 12;

/// One event read from or written to a [`MidiBuffer`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MidiEvent<'a> {
    pub bus: u32,
    /// Frame offset within the current block
    pub offset: u32,
    pub data: &'a [u8],
}

impl<'a> MidiEvent<'a> {
    pub fn new(bus: u32, offset: u32, data: &'a [u8]) -> Self {
        Self { bus, offset, data }
    }
}

/// In-progress incremental write started by [`MidiBuffer::push_begin`]
#[derive(Debug)]
#[must_use = "an incremental push must be finished with push_end"]
pub struct MidiPush {
    start: usize,
    size: usize,
    eob: bool,
}

impl MidiPush {
    /// True once the write has failed; `push_end` will roll it back
    pub fn is_eob(&self) -> bool {
        self.eob
    }

    /// Payload bytes appended so far
    pub fn size(&self) -> usize {
        self.size
    }
}

/// Append-only event log shared by all buses
#[derive(Debug, Clone)]
pub struct MidiBuffer {
    data: Vec<u8>,
    capacity: usize,
    extensible: bool,
    read_pos: usize,
    bus_read_pos: [usize; MAX_MIDI_BUSES],
}

impl MidiBuffer {
    /// Create a buffer reserving `capacity` bytes
    ///
    /// A non-extensible buffer never grows past `capacity`.
    pub fn new(capacity: usize, extensible: bool) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
            extensible,
            read_pos: 0,
            bus_read_pos: [0; MAX_MIDI_BUSES],
        }
    }

    /// Drop all events and rewind the cursors
    pub fn clear(&mut self) {
        self.data.clear();
        self.rewind();
    }

    /// Move every read cursor back to the first event
    pub fn rewind(&mut self) {
        self.read_pos = 0;
        self.bus_read_pos = [0; MAX_MIDI_BUSES];
    }

    /// Size of the log in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Raw log contents
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn is_extensible(&self) -> bool {
        self.extensible
    }

    fn has_room(&self, extra: usize) -> bool {
        self.extensible || self.data.len() + extra <= self.capacity
    }

    fn write_header(&mut self, bus: u32, offset: u32, size: u32) {
        self.data.extend_from_slice(&bus.to_le_bytes());
        self.data.extend_from_slice(&offset.to_le_bytes());
        self.data.extend_from_slice(&size.to_le_bytes());
    }

    /// Append one complete event
    ///
    /// Returns false, leaving the buffer untouched, for an invalid bus, an
    /// oversized payload or a full non-extensible buffer.
    pub fn push(&mut self, event: &MidiEvent<'_>) -> bool {
        if event.bus as usize >= MAX_MIDI_BUSES || event.data.len() > MAX_MIDI_MESSAGE_SIZE {
            return false;
        }
        if !self.has_room(HEADER_SIZE + event.data.len()) {
            return false;
        }
        self.write_header(event.bus, event.offset, event.data.len() as u32);
        self.data.extend_from_slice(event.data);
        true
    }

    /// Start an event whose payload is appended piecewise
    pub fn push_begin(&mut self, bus: u32, offset: u32) -> MidiPush {
        let start = self.data.len();
        let mut push = MidiPush {
            start,
            size: 0,
            eob: false,
        };
        if bus as usize >= MAX_MIDI_BUSES || !self.has_room(HEADER_SIZE) {
            push.eob = true;
            return push;
        }
        self.write_header(bus, offset, 0);
        push
    }

    /// Append payload bytes to an incremental event
    pub fn push_data(&mut self, push: &mut MidiPush, bytes: &[u8]) -> bool {
        if push.eob {
            return false;
        }
        if push.size + bytes.len() > MAX_MIDI_MESSAGE_SIZE || !self.has_room(bytes.len()) {
            push.eob = true;
            return false;
        }
        self.data.extend_from_slice(bytes);
        push.size += bytes.len();
        true
    }

    /// Finish an incremental event
    ///
    /// On failure the buffer is truncated back to its size before
    /// `push_begin`.
    pub fn push_end(&mut self, push: MidiPush) -> bool {
        if push.eob {
            self.data.truncate(push.start);
            return false;
        }
        let size_at = push.start + 8;
        self.data[size_at..size_at + 4].copy_from_slice(&(push.size as u32).to_le_bytes());
        true
    }

    fn event_at(&self, pos: usize) -> Option<(MidiEvent<'_>, usize)> {
        let header = self.data.get(pos..pos + HEADER_SIZE)?;
        let field = |i: usize| u32::from_le_bytes([header[i], header[i + 1], header[i + 2], header[i + 3]]);
        let (bus, offset, size) = (field(0), field(4), field(8) as usize);
        let body = pos + HEADER_SIZE;
        let data = self.data.get(body..body + size)?;
        Some((MidiEvent { bus, offset, data }, body + size))
    }

    /// Next event on any bus, using the global cursor
    pub fn next_event(&mut self) -> Option<MidiEvent<'_>> {
        let pos = self.read_pos;
        let (_, next) = self.event_at(pos)?;
        self.read_pos = next;
        self.event_at(pos).map(|(event, _)| event)
    }

    /// Next event on `bus`, using that bus's cursor
    pub fn next_event_from_bus(&mut self, bus: u32) -> Option<MidiEvent<'_>> {
        let slot = bus as usize;
        if slot >= MAX_MIDI_BUSES {
            return None;
        }
        let mut pos = self.bus_read_pos[slot];
        let found = loop {
            let (event, next) = self.event_at(pos)?;
            if event.bus == bus {
                break pos;
            }
            pos = next;
        };
        let (_, next) = self.event_at(found)?;
        self.bus_read_pos[slot] = next;
        self.event_at(found).map(|(event, _)| event)
    }

    /// Iterate over all events without moving any cursor
    pub fn iter(&self) -> MidiIter<'_> {
        MidiIter { buffer: self, pos: 0 }
    }
}

impl Default for MidiBuffer {
    fn default() -> Self {
        Self::new(0, true)
    }
}

/// Cursor-free iterator over a [`MidiBuffer`]
pub struct MidiIter<'a> {
    buffer: &'a MidiBuffer,
    pos: usize,
}

impl<'a> Iterator for MidiIter<'a> {
    type Item = MidiEvent<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (event, next) = self.buffer.event_at(self.pos)?;
        self.pos = next;
        Some(event)
    }
}
