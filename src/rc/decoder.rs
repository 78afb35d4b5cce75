//! # Streaming Frame Decoder
//!
//! Turns an arbitrarily chunked byte stream into validated [`Frame`]s.
//!
//! Both protocol variants share the same resynchronization strategy: every
//! byte offset of the accumulation buffer is tried as a frame start once a
//! full frame's worth of bytes is available from it. A rejected offset
//! advances the scan by one byte only, never by a whole frame length, so a
//! corrupted packet cannot take the following valid packet down with it.
//!
//! Offsets that were tried and rejected are discarded from the buffer. This
//! keeps the buffer below one frame length between calls and makes the
//! decoded frame sequence independent of how the input was chunked.

use bytes::{Buf, Bytes, BytesMut};

use super::ibus::IbusDecoder;
use super::protocol::{Frame, Protocol, DEFAULT_BUFFER_CAP};
use super::sbus::SbusDecoder;
use crate::error::FrameError;

/// Running counters of a decoder.
///
/// The decoder itself never logs; the caller reads these to report drops.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DecoderStats {
    /// Frames that passed validation
    pub frames: u64,
    /// Candidate frames whose header matched but which failed validation
    pub rejected: u64,
    /// Bytes discarded while resynchronizing
    pub bytes_discarded: u64,
    /// Bytes dropped because the buffer exceeded its cap
    pub bytes_overflowed: u64,
}

/// A stateful parser extracting frames from a byte stream.
pub trait FrameDecoder {
    /// Framing variant handled by this decoder.
    fn protocol(&self) -> Protocol;

    /// Appends bytes to the accumulation buffer.
    ///
    /// If the buffer grows beyond its cap the oldest bytes are dropped.
    fn push(&mut self, bytes: &[u8]);

    /// Extracts the next valid frame from the buffer, if one is complete.
    fn next_frame(&mut self) -> Option<Frame>;

    /// Number of unconsumed bytes currently buffered.
    fn buffered(&self) -> usize;

    /// Maximum number of bytes retained between calls.
    fn capacity(&self) -> usize;

    /// Counters since construction.
    fn stats(&self) -> DecoderStats;

    /// Feeds `bytes` and returns a lazy iterator over the frames they
    /// complete.
    ///
    /// Input is moved into the buffer only as fast as frames are extracted,
    /// so draining the iterator never overflows the buffer cap. Bytes left
    /// over when the iterator is dropped early are kept for the next call.
    ///
    /// # Examples
    ///
    /// ```
    /// use rc_rover::rc::decoder::FrameDecoder;
    /// use rc_rover::rc::encoder::encode_ibus_packet;
    /// use rc_rover::rc::ibus::IbusDecoder;
    ///
    /// let mut decoder = IbusDecoder::new();
    /// let packet = encode_ibus_packet(&[1500; 14]);
    ///
    /// assert_eq!(decoder.feed(&packet[..10]).count(), 0);
    /// let frames: Vec<_> = decoder.feed(&packet[10..]).collect();
    /// assert_eq!(frames.len(), 1);
    /// assert_eq!(frames[0].channels.get(1), Some(1500));
    /// ```
    fn feed<'a>(&'a mut self, bytes: &'a [u8]) -> Frames<'a, Self>
    where
        Self: Sized,
    {
        Frames {
            decoder: self,
            pending: bytes,
        }
    }
}

/// Lazy iterator over frames produced by [`FrameDecoder::feed`].
pub struct Frames<'a, D: FrameDecoder> {
    decoder: &'a mut D,
    pending: &'a [u8],
}

impl<D: FrameDecoder> Iterator for Frames<'_, D> {
    type Item = Frame;

    fn next(&mut self) -> Option<Frame> {
        loop {
            if let Some(frame) = self.decoder.next_frame() {
                return Some(frame);
            }
            if self.pending.is_empty() {
                return None;
            }

            let room = self
                .decoder
                .capacity()
                .saturating_sub(self.decoder.buffered())
                .max(1);
            let take = room.min(self.pending.len());
            let (chunk, rest) = self.pending.split_at(take);
            self.decoder.push(chunk);
            self.pending = rest;
        }
    }
}

impl<D: FrameDecoder> Drop for Frames<'_, D> {
    fn drop(&mut self) {
        if !self.pending.is_empty() {
            self.decoder.push(self.pending);
            self.pending = &[];
        }
    }
}

/// Capped accumulation buffer with the shared scanning logic.
#[derive(Debug)]
pub(crate) struct FrameBuffer {
    buf: BytesMut,
    cap: usize,
    stats: DecoderStats,
}

impl FrameBuffer {
    pub(crate) fn new(cap: usize) -> Self {
        let cap = cap.max(1);
        Self {
            buf: BytesMut::with_capacity(cap),
            cap,
            stats: DecoderStats::default(),
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
        if self.buf.len() > self.cap {
            let excess = self.buf.len() - self.cap;
            self.buf.advance(excess);
            self.stats.bytes_overflowed += excess as u64;
        }
    }

    /// Scans for the first offset whose `frame_len` window passes
    /// `validate`, consuming everything up to and including that window.
    pub(crate) fn extract<F>(&mut self, frame_len: usize, validate: F) -> Option<Bytes>
    where
        F: Fn(&[u8]) -> Result<(), FrameError>,
    {
        let mut offset = 0;
        while offset + frame_len <= self.buf.len() {
            match validate(&self.buf[offset..offset + frame_len]) {
                Ok(()) => {
                    self.discard(offset);
                    self.stats.frames += 1;
                    return Some(self.buf.split_to(frame_len).freeze());
                }
                Err(FrameError::BadHeader(_)) => offset += 1,
                Err(_) => {
                    self.stats.rejected += 1;
                    offset += 1;
                }
            }
        }
        self.discard(offset);
        None
    }

    fn discard(&mut self, count: usize) {
        if count > 0 {
            self.buf.advance(count);
            self.stats.bytes_discarded += count as u64;
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.buf.len()
    }

    pub(crate) fn cap(&self) -> usize {
        self.cap
    }

    pub(crate) fn stats(&self) -> DecoderStats {
        self.stats
    }
}

/// Decoder selected at runtime from configuration.
#[derive(Debug)]
pub enum Decoder {
    /// Interval-framed iBUS decoder
    Ibus(IbusDecoder),
    /// Parity-framed S-Bus decoder
    Sbus(SbusDecoder),
}

impl Decoder {
    /// Creates a decoder for `protocol` with the default buffer cap.
    #[must_use]
    pub fn new(protocol: Protocol) -> Self {
        Self::with_capacity(protocol, DEFAULT_BUFFER_CAP)
    }

    /// Creates a decoder for `protocol` retaining at most `cap` bytes.
    #[must_use]
    pub fn with_capacity(protocol: Protocol, cap: usize) -> Self {
        match protocol {
            Protocol::Ibus => Decoder::Ibus(IbusDecoder::with_capacity(cap)),
            Protocol::Sbus => Decoder::Sbus(SbusDecoder::with_capacity(cap)),
        }
    }
}

impl FrameDecoder for Decoder {
    fn protocol(&self) -> Protocol {
        match self {
            Decoder::Ibus(d) => d.protocol(),
            Decoder::Sbus(d) => d.protocol(),
        }
    }

    fn push(&mut self, bytes: &[u8]) {
        match self {
            Decoder::Ibus(d) => d.push(bytes),
            Decoder::Sbus(d) => d.push(bytes),
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        match self {
            Decoder::Ibus(d) => d.next_frame(),
            Decoder::Sbus(d) => d.next_frame(),
        }
    }

    fn buffered(&self) -> usize {
        match self {
            Decoder::Ibus(d) => d.buffered(),
            Decoder::Sbus(d) => d.buffered(),
        }
    }

    fn capacity(&self) -> usize {
        match self {
            Decoder::Ibus(d) => d.capacity(),
            Decoder::Sbus(d) => d.capacity(),
        }
    }

    fn stats(&self) -> DecoderStats {
        match self {
            Decoder::Ibus(d) => d.stats(),
            Decoder::Sbus(d) => d.stats(),
        }
    }
}
