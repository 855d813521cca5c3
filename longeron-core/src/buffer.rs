//! Fixed-capacity cursor buffer for network I/O.
//!
//! A [`Buffer`] owns a zero-filled byte region of immutable capacity and a
//! pair of cursors, `position` and `limit`, with the invariant
//! `0 <= position <= limit <= capacity` holding before and after every
//! operation, including failed ones. Typed accessors read and write
//! fixed-width values in network byte order at `position`; [`Buffer::flip`]
//! converts a just-filled buffer into a readable one.
//!
//! Every fallible operation is fail-atomic: on error the buffer is left
//! exactly as it was.

use thiserror::Error;

/// Errors raised by [`Buffer`] operations.
///
/// Bounds errors ([`Overflow`](BufferError::Overflow) and
/// [`Underflow`](BufferError::Underflow)) leave the buffer unmodified so the
/// caller can recover locally, e.g. by closing the connection that produced
/// the data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    /// A write needed more room than `limit - position` offers.
    #[error("buffer overflow: needed {needed} bytes, {remaining} remaining")]
    Overflow { needed: usize, remaining: usize },

    /// A read needed more data than `limit - position` offers.
    #[error("buffer underflow: needed {needed} bytes, {remaining} remaining")]
    Underflow { needed: usize, remaining: usize },

    /// A cursor or argument was outside its legal range.
    #[error("invalid {field} {value} (bound: {bound})")]
    InvalidArgument {
        field: &'static str,
        value: usize,
        bound: usize,
    },

    /// The requested capacity could not be reserved.
    #[error("cannot allocate {requested} bytes")]
    OutOfMemory { requested: usize },
}

/// Fixed-capacity byte container with `position`/`limit` cursor semantics.
///
/// # Examples
///
/// ```
/// use longeron_core::buffer::Buffer;
///
/// let mut buf = Buffer::allocate(16).unwrap();
/// buf.put_i32(42).unwrap();
/// buf.flip();
/// assert_eq!(buf.get_i32().unwrap(), 42);
/// assert!(!buf.has_remaining());
/// ```
#[derive(Debug)]
pub struct Buffer {
    data: Box<[u8]>,
    position: usize,
    limit: usize,
}

impl Buffer {
    /// Allocate a buffer of `capacity` bytes, zero-filled, with
    /// `position = 0` and `limit = capacity`.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] when `capacity` is zero, and
    /// [`BufferError::OutOfMemory`] when the storage cannot be reserved.
    pub fn allocate(capacity: usize) -> Result<Self, BufferError> {
        if capacity == 0 {
            return Err(BufferError::InvalidArgument {
                field: "capacity",
                value: 0,
                bound: 0,
            });
        }

        let mut storage = Vec::new();
        storage
            .try_reserve_exact(capacity)
            .map_err(|_| BufferError::OutOfMemory {
                requested: capacity,
            })?;
        storage.resize(capacity, 0);

        Ok(Self {
            data: storage.into_boxed_slice(),
            position: 0,
            limit: capacity,
        })
    }

    /// This buffer's fixed capacity.
    #[inline]
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Current read/write position.
    #[inline]
    #[must_use]
    pub const fn position(&self) -> usize {
        self.position
    }

    /// Current limit.
    #[inline]
    #[must_use]
    pub const fn limit(&self) -> usize {
        self.limit
    }

    /// Bytes available between `position` and `limit`.
    #[inline]
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.limit - self.position
    }

    /// `true` while `position < limit`.
    #[inline]
    #[must_use]
    pub const fn has_remaining(&self) -> bool {
        self.position < self.limit
    }

    /// Set the position.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] when `position` exceeds the current
    /// limit; the buffer is not mutated on failure.
    pub fn set_position(&mut self, position: usize) -> Result<(), BufferError> {
        if position > self.limit {
            return Err(BufferError::InvalidArgument {
                field: "position",
                value: position,
                bound: self.limit,
            });
        }
        self.position = position;
        Ok(())
    }

    /// Set the limit. A limit below the current position pulls the position
    /// down with it, keeping `position <= limit`.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] when `limit` exceeds the capacity;
    /// the buffer is not mutated on failure.
    pub fn set_limit(&mut self, limit: usize) -> Result<(), BufferError> {
        if limit > self.capacity() {
            return Err(BufferError::InvalidArgument {
                field: "limit",
                value: limit,
                bound: self.capacity(),
            });
        }
        self.limit = limit;
        if self.position > limit {
            self.position = limit;
        }
        Ok(())
    }

    /// Flip for reading: `limit = position; position = 0`.
    pub fn flip(&mut self) {
        self.limit = self.position;
        self.position = 0;
    }

    /// Full reinitialization: zero-fill the storage and restore
    /// `position = 0, limit = capacity`.
    pub fn reset(&mut self) {
        self.data.fill(0);
        self.position = 0;
        self.limit = self.data.len();
    }

    /// Copy out the bytes between `position` and `limit`.
    ///
    /// The cursors are left untouched; the returned bytes are a copy and can
    /// be empty.
    #[must_use]
    pub fn array(&self) -> Vec<u8> {
        self.data[self.position..self.limit].to_vec()
    }

    /// Copy `bytes` in at `position`, advancing it by the bytes copied.
    ///
    /// Input past `remaining()` is silently truncated; the number of bytes
    /// actually copied is returned.
    pub fn fill_from(&mut self, bytes: &[u8]) -> usize {
        let n = bytes.len().min(self.remaining());
        self.data[self.position..self.position + n].copy_from_slice(&bytes[..n]);
        self.position += n;
        n
    }

    fn take(&mut self, n: usize) -> Result<&[u8], BufferError> {
        let remaining = self.remaining();
        if n > remaining {
            return Err(BufferError::Underflow {
                needed: n,
                remaining,
            });
        }
        let start = self.position;
        self.position += n;
        Ok(&self.data[start..start + n])
    }

    fn put(&mut self, bytes: &[u8]) -> Result<(), BufferError> {
        let remaining = self.remaining();
        if bytes.len() > remaining {
            return Err(BufferError::Overflow {
                needed: bytes.len(),
                remaining,
            });
        }
        self.data[self.position..self.position + bytes.len()].copy_from_slice(bytes);
        self.position += bytes.len();
        Ok(())
    }

    /// Read one byte at `position`.
    pub fn get_u8(&mut self) -> Result<u8, BufferError> {
        Ok(self.take(1)?[0])
    }

    /// Read a 16-bit integer in network byte order.
    pub fn get_i16(&mut self) -> Result<i16, BufferError> {
        let b = self.take(2)?;
        Ok(i16::from_be_bytes(b.try_into().expect("width checked")))
    }

    /// Read a 32-bit integer in network byte order.
    pub fn get_i32(&mut self) -> Result<i32, BufferError> {
        let b = self.take(4)?;
        Ok(i32::from_be_bytes(b.try_into().expect("width checked")))
    }

    /// Read a 64-bit integer in network byte order.
    pub fn get_i64(&mut self) -> Result<i64, BufferError> {
        let b = self.take(8)?;
        Ok(i64::from_be_bytes(b.try_into().expect("width checked")))
    }

    /// Read a 32-bit float in network byte order.
    pub fn get_f32(&mut self) -> Result<f32, BufferError> {
        let b = self.take(4)?;
        Ok(f32::from_be_bytes(b.try_into().expect("width checked")))
    }

    /// Read a 64-bit float in network byte order.
    pub fn get_f64(&mut self) -> Result<f64, BufferError> {
        let b = self.take(8)?;
        Ok(f64::from_be_bytes(b.try_into().expect("width checked")))
    }

    /// Write one byte at `position`.
    pub fn put_u8(&mut self, v: u8) -> Result<(), BufferError> {
        self.put(&[v])
    }

    /// Write a 16-bit integer in network byte order.
    pub fn put_i16(&mut self, v: i16) -> Result<(), BufferError> {
        self.put(&v.to_be_bytes())
    }

    /// Write a 32-bit integer in network byte order.
    pub fn put_i32(&mut self, v: i32) -> Result<(), BufferError> {
        self.put(&v.to_be_bytes())
    }

    /// Write a 64-bit integer in network byte order.
    pub fn put_i64(&mut self, v: i64) -> Result<(), BufferError> {
        self.put(&v.to_be_bytes())
    }

    /// Write a 32-bit float in network byte order.
    pub fn put_f32(&mut self, v: f32) -> Result<(), BufferError> {
        self.put(&v.to_be_bytes())
    }

    /// Write a 64-bit float in network byte order.
    pub fn put_f64(&mut self, v: f64) -> Result<(), BufferError> {
        self.put(&v.to_be_bytes())
    }

    /// Read a compact-encoded string at `position`.
    ///
    /// The compact encoding stores ASCII code points and the NUL terminator
    /// as one byte each and code points up to U+07FF as two bytes (the
    /// two-byte UTF-8 form). Reading is lenient by contract:
    ///
    /// - terminator found before `limit`: the string up to it is returned
    ///   and `position` moves past the terminator;
    /// - bytes remaining but no terminator: the characters present are
    ///   returned and `position` moves to `limit` (a terminator is
    ///   synthesized when the string is written back, not required here);
    /// - nothing remaining: an empty string, cursors untouched.
    #[must_use]
    pub fn get_string(&mut self) -> String {
        if !self.has_remaining() {
            return String::new();
        }

        let window = &self.data[self.position..self.limit];
        let (bytes, consumed) = match window.iter().position(|&b| b == 0) {
            Some(idx) => (&window[..idx], idx + 1),
            None => (window, window.len()),
        };
        let s = String::from_utf8_lossy(bytes).into_owned();
        self.position += consumed;
        s
    }

    /// Write `s` in the compact encoding, including the one-byte terminator.
    ///
    /// # Errors
    ///
    /// [`BufferError::InvalidArgument`] for code points above U+07FF (they
    /// have no two-byte form) and [`BufferError::Overflow`] when the encoded
    /// string plus terminator does not fit; the buffer is unchanged on
    /// failure.
    pub fn put_string(&mut self, s: &str) -> Result<(), BufferError> {
        if let Some(wide) = s.chars().find(|&c| c as u32 > 0x07FF) {
            return Err(BufferError::InvalidArgument {
                field: "code point",
                value: wide as usize,
                bound: 0x07FF,
            });
        }

        // All code points are <= U+07FF, so the UTF-8 bytes are exactly the
        // compact form: one byte for ASCII, two otherwise.
        let needed = s.len() + 1;
        let remaining = self.remaining();
        if needed > remaining {
            return Err(BufferError::Overflow { needed, remaining });
        }

        self.put(s.as_bytes()).expect("room checked");
        self.put(&[0]).expect("room checked");
        Ok(())
    }

    /// Read a wide-encoded string at `position`.
    ///
    /// The wide encoding stores every UTF-16 code unit, terminator included,
    /// as two little-endian bytes. The read policy matches
    /// [`Buffer::get_string`]: a missing terminator yields the characters
    /// present (consuming through `limit`), an empty window yields an empty
    /// string with the cursors untouched.
    #[must_use]
    pub fn get_wide_string(&mut self) -> String {
        if !self.has_remaining() {
            return String::new();
        }

        let window = &self.data[self.position..self.limit];
        let mut units = Vec::with_capacity(window.len() / 2);
        let mut consumed = window.len();
        let mut terminated = false;

        for pair in window.chunks_exact(2) {
            let unit = u16::from_le_bytes([pair[0], pair[1]]);
            if unit == 0 {
                consumed = (units.len() + 1) * 2;
                terminated = true;
                break;
            }
            units.push(unit);
        }
        if !terminated {
            // No terminator before the limit: everything up to it is
            // consumed, including a dangling odd byte.
            consumed = window.len();
        }

        self.position += consumed;
        String::from_utf16_lossy(&units)
    }

    /// Write `s` in the wide encoding, including the two-byte terminator.
    ///
    /// # Errors
    ///
    /// [`BufferError::Overflow`] when the encoded string plus terminator
    /// does not fit; the buffer is unchanged on failure.
    pub fn put_wide_string(&mut self, s: &str) -> Result<(), BufferError> {
        let units: Vec<u16> = s.encode_utf16().collect();
        let needed = (units.len() + 1) * 2;
        let remaining = self.remaining();
        if needed > remaining {
            return Err(BufferError::Overflow { needed, remaining });
        }

        for unit in units {
            self.put(&unit.to_le_bytes()).expect("room checked");
        }
        self.put(&0u16.to_le_bytes()).expect("room checked");
        Ok(())
    }
}
