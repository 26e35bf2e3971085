//! Newline-terminated writes to a stream.

/// Separator written after each line.
pub const LINE_SEP: u8 = b'\n';

/// Write the data to the stream plus the separator, then flush.
///
/// The flush happens on every call, so the reader sees the line before the
/// caller does anything else.  Errors are returned unchanged.
pub fn write_line<W: std::io::Write + ?Sized>(
    out: &mut W,
    data: &[u8],
) -> Result<(), std::io::Error> {
    out.write_all(data)?;
    out.write_all(&[LINE_SEP])?;
    out.flush()
}
