//! The byte-oriented input/output sink a [`BmpReader`](crate::bmp::BmpReader)
//! or [`BmpWriter`](crate::bmp::BmpWriter) is bound to.
//!
//! The core never assumes ownership of the sink, and never trusts the sink
//! for its own position — `bytes_read` / `bytes_written` counters are kept on
//! the handle itself (see [`crate::bmp::reader::BmpReader`]). Seeking is
//! optional: it's only required to fetch an embedded ICC profile or to
//! back-patch the size fields after an RLE/Huffman `save` (§4.4's "Size
//! fix-up").

use crate::error::BmpError;

/// A source of bytes a [`BmpReader`](crate::bmp::BmpReader) pulls a bitmap
/// out of.
///
/// Implement this directly for custom transports; the `alloc`/`std` features
/// provide the usual impls (`&[u8]`, `std::io::Read + Seek`).
pub trait ByteSource {
  /// Fills `buf` completely or returns an error. Short reads without an
  /// explicit end-of-input are folded into [`BmpError::UnexpectedEof`].
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BmpError>;

  /// Reads a single byte, distinguishing a clean end-of-input from a hard
  /// I/O failure so the decode engine can latch `truncated` instead of
  /// aborting outright.
  fn read_byte(&mut self) -> Result<Option<u8>, BmpError> {
    let mut one = [0_u8; 1];
    match self.read_exact(&mut one) {
      Ok(()) => Ok(Some(one[0])),
      Err(BmpError::UnexpectedEof) => Ok(None),
      Err(e) => Err(e),
    }
  }

  /// Whether this source supports [`Self::seek_from_start`]. ICC profile
  /// retrieval is the only read-side feature that requires it.
  fn can_seek(&self) -> bool {
    false
  }

  /// Seeks to an absolute byte offset from the start of the stream.
  fn seek_from_start(&mut self, _pos: u64) -> Result<(), BmpError> {
    Err(BmpError::SeekUnsupported)
  }
}

/// A destination of bytes a [`BmpWriter`](crate::bmp::BmpWriter) emits a
/// bitmap into.
pub trait ByteSink {
  /// Writes all of `buf` or returns an error.
  fn write_all(&mut self, buf: &[u8]) -> Result<(), BmpError>;

  /// Whether this sink supports [`Self::seek_from_start`]. Only needed for
  /// the RLE/Huffman size back-patch (§4.4); an unseekable sink just leaves
  /// those fields at zero, which is not an error.
  fn can_seek(&self) -> bool {
    false
  }

  /// Seeks to an absolute byte offset from the start of the stream.
  fn seek_from_start(&mut self, _pos: u64) -> Result<(), BmpError> {
    Err(BmpError::SeekUnsupported)
  }
}

impl ByteSource for &[u8] {
  #[inline]
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BmpError> {
    if buf.len() > self.len() {
      return Err(BmpError::UnexpectedEof);
    }
    let (head, tail) = self.split_at(buf.len());
    buf.copy_from_slice(head);
    *self = tail;
    Ok(())
  }

  #[inline]
  fn can_seek(&self) -> bool {
    true
  }
}

/// A `&[u8]` source that additionally knows its own start, so it can seek.
///
/// Plain `&[u8]` can't seek backwards (it has already forgotten the bytes it
/// consumed), so callers who need ICC-profile random access should wrap their
/// buffer in this instead of a bare slice.
#[derive(Debug, Clone, Copy)]
pub struct SliceSource<'b> {
  full: &'b [u8],
  pos: usize,
}
impl<'b> SliceSource<'b> {
  /// Wraps a full in-memory buffer for random-access reading.
  #[inline]
  #[must_use]
  pub const fn new(full: &'b [u8]) -> Self {
    Self { full, pos: 0 }
  }

  /// How many bytes have been consumed so far.
  #[inline]
  #[must_use]
  pub const fn position(&self) -> usize {
    self.pos
  }
}
impl<'b> ByteSource for SliceSource<'b> {
  #[inline]
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BmpError> {
    let end = self.pos.checked_add(buf.len()).ok_or(BmpError::UnexpectedEof)?;
    let src = self.full.get(self.pos..end).ok_or(BmpError::UnexpectedEof)?;
    buf.copy_from_slice(src);
    self.pos = end;
    Ok(())
  }

  #[inline]
  fn can_seek(&self) -> bool {
    true
  }

  #[inline]
  fn seek_from_start(&mut self, pos: u64) -> Result<(), BmpError> {
    let pos: usize = pos.try_into().map_err(|_| BmpError::SeekUnsupported)?;
    if pos > self.full.len() {
      return Err(BmpError::UnexpectedEof);
    }
    self.pos = pos;
    Ok(())
  }
}

#[cfg(feature = "alloc")]
mod alloc_impls {
  use super::*;
  use alloc::vec::Vec;

  /// A growable in-memory sink, the write-side counterpart of
  /// [`SliceSource`].
  #[derive(Debug, Clone, Default)]
  pub struct VecSink {
    buf: Vec<u8>,
    pos: usize,
  }
  impl VecSink {
    /// Makes a new, empty sink.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
      Self { buf: Vec::new(), pos: 0 }
    }

    /// Consumes the sink, returning the bytes written.
    #[inline]
    #[must_use]
    pub fn into_inner(self) -> Vec<u8> {
      self.buf
    }

    /// Borrows the bytes written so far.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
      &self.buf
    }
  }
  impl ByteSink for VecSink {
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), BmpError> {
      let end = self.pos + buf.len();
      if end > self.buf.len() {
        self.buf.resize(end, 0);
      }
      self.buf[self.pos..end].copy_from_slice(buf);
      self.pos = end;
      Ok(())
    }

    #[inline]
    fn can_seek(&self) -> bool {
      true
    }

    #[inline]
    fn seek_from_start(&mut self, pos: u64) -> Result<(), BmpError> {
      self.pos = pos.try_into().map_err(|_| BmpError::SeekUnsupported)?;
      Ok(())
    }
  }
}
#[cfg(feature = "alloc")]
pub use alloc_impls::VecSink;

#[cfg(feature = "std")]
mod std_impls {
  use super::*;
  use std::io::{Read, Seek, SeekFrom, Write};

  /// Adapts any `std::io::Read` into a non-seekable [`ByteSource`].
  #[derive(Debug)]
  pub struct StdReader<R>(pub R);
  impl<R: Read> ByteSource for StdReader<R> {
    #[inline]
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BmpError> {
      self.0.read_exact(buf).map_err(|_| BmpError::UnexpectedEof)
    }
  }

  /// Adapts any `std::io::Read + Seek` into a seekable [`ByteSource`], which
  /// is required for ICC-profile retrieval.
  #[derive(Debug)]
  pub struct SeekableStdReader<R>(pub R);
  impl<R: Read + Seek> ByteSource for SeekableStdReader<R> {
    #[inline]
    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), BmpError> {
      self.0.read_exact(buf).map_err(|_| BmpError::UnexpectedEof)
    }

    #[inline]
    fn can_seek(&self) -> bool {
      true
    }

    #[inline]
    fn seek_from_start(&mut self, pos: u64) -> Result<(), BmpError> {
      self.0.seek(SeekFrom::Start(pos)).map(|_| ()).map_err(|_| BmpError::SeekUnsupported)
    }
  }

  /// Adapts any `std::io::Write` into a non-seekable [`ByteSink`].
  #[derive(Debug)]
  pub struct StdWriter<W>(pub W);
  impl<W: Write> ByteSink for StdWriter<W> {
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), BmpError> {
      self.0.write_all(buf).map_err(|_| BmpError::WriteFailed)
    }
  }

  /// Adapts any `std::io::Write + Seek` into a seekable [`ByteSink`], which
  /// is required for the RLE/Huffman size back-patch.
  #[derive(Debug)]
  pub struct SeekableStdWriter<W>(pub W);
  impl<W: Write + Seek> ByteSink for SeekableStdWriter<W> {
    #[inline]
    fn write_all(&mut self, buf: &[u8]) -> Result<(), BmpError> {
      self.0.write_all(buf).map_err(|_| BmpError::WriteFailed)
    }

    #[inline]
    fn can_seek(&self) -> bool {
      true
    }

    #[inline]
    fn seek_from_start(&mut self, pos: u64) -> Result<(), BmpError> {
      self.0.seek(SeekFrom::Start(pos)).map(|_| ()).map_err(|_| BmpError::SeekUnsupported)
    }
  }
}
#[cfg(feature = "std")]
pub use std_impls::{SeekableStdReader, SeekableStdWriter, StdReader, StdWriter};
