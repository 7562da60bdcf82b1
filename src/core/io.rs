//! Input abstraction layer
//!
//! Opens delta and record files transparently whether they are plain text,
//! gzip (including bgzip) or bzip2 compressed. Large plain files are memory
//! mapped.

use memmap2::Mmap;
use std::fs::File;
use std::io::{self, BufRead, BufReader, Read};
use std::path::Path;

/// Buffer size for line readers (128KB)
pub const DEFAULT_BUFFER_SIZE: usize = 128 * 1024;

/// Plain files at least this large are memory mapped (100MB)
pub const MMAP_THRESHOLD: u64 = 100 * 1024 * 1024;

/// Compression format of an input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// Plain text (uncompressed)
    Plain,
    /// Gzip compressed (.gz)
    Gzip,
    /// Bzip2 compressed (.bz2)
    Bzip2,
}

impl CompressionFormat {
    /// Detect from the leading bytes of a file
    pub fn from_magic(magic: &[u8]) -> Self {
        if magic.len() >= 2 && magic[0] == 0x1f && magic[1] == 0x8b {
            CompressionFormat::Gzip
        } else if magic.len() >= 3 && magic[..3] == *b"BZh" {
            CompressionFormat::Bzip2
        } else {
            CompressionFormat::Plain
        }
    }
}

/// Detect compression format from file extension, then magic bytes
pub fn detect_compression(path: &Path) -> io::Result<CompressionFormat> {
    match path.extension().and_then(|e| e.to_str()) {
        Some("gz") | Some("bgz") => return Ok(CompressionFormat::Gzip),
        Some("bz2") => return Ok(CompressionFormat::Bzip2),
        _ => {}
    }

    let mut file = File::open(path)?;
    let mut magic = [0u8; 3];
    let bytes_read = file.read(&mut magic)?;
    Ok(CompressionFormat::from_magic(&magic[..bytes_read]))
}

/// Reader for an uncompressed input
///
/// Files at or above [`MMAP_THRESHOLD`] are memory mapped, smaller ones
/// are read through a `BufReader`.
pub enum PlainReader {
    Buffered(BufReader<File>),
    Mapped(MappedReader),
}

/// Memory-mapped file reader
pub struct MappedReader {
    mmap: Mmap,
    position: usize,
}

impl MappedReader {
    pub fn new(file: &File) -> io::Result<Self> {
        // SAFETY: inputs are not modified while a mapping is being decoded
        let mmap = unsafe { Mmap::map(file)? };
        Ok(Self { mmap, position: 0 })
    }
}

impl Read for MappedReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = &self.mmap[self.position..];
        let to_read = std::cmp::min(buf.len(), remaining.len());
        buf[..to_read].copy_from_slice(&remaining[..to_read]);
        self.position += to_read;
        Ok(to_read)
    }
}

impl BufRead for MappedReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        Ok(&self.mmap[self.position..])
    }

    fn consume(&mut self, amt: usize) {
        self.position = std::cmp::min(self.position + amt, self.mmap.len());
    }
}

impl PlainReader {
    /// Open a plain file, mapping it when it reaches [`MMAP_THRESHOLD`]
    pub fn open<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        Self::open_with_threshold(path.as_ref(), MMAP_THRESHOLD)
    }

    fn open_with_threshold(path: &Path, mmap_threshold: u64) -> io::Result<Self> {
        let file = File::open(path)?;
        let file_size = file.metadata()?.len();

        if file_size >= mmap_threshold {
            log::debug!("Memory mapping {:?} ({} bytes)", path, file_size);
            Ok(PlainReader::Mapped(MappedReader::new(&file)?))
        } else {
            Ok(PlainReader::Buffered(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, file)))
        }
    }

    pub fn is_mapped(&self) -> bool {
        matches!(self, PlainReader::Mapped(_))
    }
}

impl Read for PlainReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            PlainReader::Buffered(reader) => reader.read(buf),
            PlainReader::Mapped(reader) => reader.read(buf),
        }
    }
}

impl BufRead for PlainReader {
    fn fill_buf(&mut self) -> io::Result<&[u8]> {
        match self {
            PlainReader::Buffered(reader) => reader.fill_buf(),
            PlainReader::Mapped(reader) => reader.fill_buf(),
        }
    }

    fn consume(&mut self, amt: usize) {
        match self {
            PlainReader::Buffered(reader) => reader.consume(amt),
            PlainReader::Mapped(reader) => reader.consume(amt),
        }
    }
}

/// Open any supported input file as a buffered line source
pub fn open_input<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let format = detect_compression(path)?;
    log::debug!("Opening {:?} as {:?}", path, format);

    Ok(match format {
        CompressionFormat::Gzip => {
            let decoder = flate2::read::MultiGzDecoder::new(File::open(path)?);
            Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, decoder))
        }
        CompressionFormat::Bzip2 => {
            let decoder = bzip2::read::BzDecoder::new(File::open(path)?);
            Box::new(BufReader::with_capacity(DEFAULT_BUFFER_SIZE, decoder))
        }
        CompressionFormat::Plain => Box::new(PlainReader::open(path)?),
    })
}

/// Line iterator that reuses a buffer to avoid allocations
///
/// Tracks the 1-based number of the last line returned.
pub struct LineIterator<R: BufRead> {
    reader: R,
    buffer: String,
    line_number: usize,
}

impl<R: BufRead> LineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: String::with_capacity(1024),
            line_number: 0,
        }
    }

    /// Read the next line into the internal buffer
    /// Returns None at EOF, Some(Ok(&str)) on success, Some(Err) on error
    pub fn next_line(&mut self) -> Option<io::Result<&str>> {
        self.buffer.clear();
        match self.reader.read_line(&mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                if self.buffer.ends_with('\n') {
                    self.buffer.pop();
                    if self.buffer.ends_with('\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }

    /// Number of the line last returned by [`next_line`](Self::next_line)
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

/// Byte line iterator for zero-copy parsing
pub struct ByteLineIterator<R: BufRead> {
    reader: R,
    buffer: Vec<u8>,
    line_number: usize,
}

impl<R: BufRead> ByteLineIterator<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buffer: Vec::with_capacity(4096),
            line_number: 0,
        }
    }

    /// Read the next line as bytes, without its line terminator
    pub fn next_line(&mut self) -> Option<io::Result<&[u8]>> {
        self.buffer.clear();
        match self.reader.read_until(b'\n', &mut self.buffer) {
            Ok(0) => None,
            Ok(_) => {
                self.line_number += 1;
                if self.buffer.last() == Some(&b'\n') {
                    self.buffer.pop();
                    if self.buffer.last() == Some(&b'\r') {
                        self.buffer.pop();
                    }
                }
                Some(Ok(&self.buffer))
            }
            Err(e) => Some(Err(e)),
        }
    }

    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_magic_detection() {
        assert_eq!(CompressionFormat::from_magic(&[0x1f, 0x8b, 0x08]), CompressionFormat::Gzip);
        assert_eq!(CompressionFormat::from_magic(b"BZh"), CompressionFormat::Bzip2);
        assert_eq!(CompressionFormat::from_magic(b">r1"), CompressionFormat::Plain);
        assert_eq!(CompressionFormat::from_magic(&[]), CompressionFormat::Plain);
    }

    #[test]
    fn test_plain_reader_small_file_is_buffered() -> io::Result<()> {
        let mut temp = NamedTempFile::new()?;
        writeln!(temp, ">chr1 ctg1")?;

        let reader = PlainReader::open(temp.path())?;
        assert!(!reader.is_mapped());
        Ok(())
    }

    #[test]
    fn test_line_iterator_counts_lines() -> io::Result<()> {
        let data: &[u8] = b"line1\r\nline2\n\nline4";
        let mut iter = LineIterator::new(data);

        assert_eq!(iter.next_line().unwrap()?, "line1");
        assert_eq!(iter.next_line().unwrap()?, "line2");
        assert_eq!(iter.next_line().unwrap()?, "");
        assert_eq!(iter.next_line().unwrap()?, "line4");
        assert_eq!(iter.line_number(), 4);
        assert!(iter.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_byte_line_iterator() -> io::Result<()> {
        let data: &[u8] = b"chr1\t5\t\xff\nchr2\t6\r\n";
        let mut iter = ByteLineIterator::new(data);

        assert_eq!(iter.next_line().unwrap()?, b"chr1\t5\t\xff");
        assert_eq!(iter.next_line().unwrap()?, b"chr2\t6");
        assert_eq!(iter.line_number(), 2);
        assert!(iter.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_open_input_gzip_by_magic() -> io::Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"chr1\t10\n")?;
        let gz_data = encoder.finish()?;

        let mut temp = NamedTempFile::new()?;
        temp.write_all(&gz_data)?;
        temp.flush()?;

        assert_eq!(detect_compression(temp.path())?, CompressionFormat::Gzip);
        let mut content = String::new();
        open_input(temp.path())?.read_to_string(&mut content)?;
        assert_eq!(content, "chr1\t10\n");
        Ok(())
    }

    #[test]
    fn test_plain_reader_maps_at_threshold() -> io::Result<()> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(b"chr1\t5\nchr1\t6\n")?;
        temp.flush()?;

        let mut reader = PlainReader::open_with_threshold(temp.path(), 14)?;
        assert!(reader.is_mapped());

        let mut lines = ByteLineIterator::new(&mut reader);
        assert_eq!(lines.next_line().unwrap()?, b"chr1\t5");
        assert_eq!(lines.next_line().unwrap()?, b"chr1\t6");
        assert!(lines.next_line().is_none());
        Ok(())
    }

    #[test]
    fn test_plain_reader_below_threshold_is_buffered() -> io::Result<()> {
        let mut temp = NamedTempFile::new()?;
        temp.write_all(b"chr1\t5\nchr1\t6\n")?;
        temp.flush()?;

        let mut reader = PlainReader::open_with_threshold(temp.path(), 15)?;
        assert!(!reader.is_mapped());

        let mut content = String::new();
        reader.read_to_string(&mut content)?;
        assert_eq!(content, "chr1\t5\nchr1\t6\n");
        Ok(())
    }
}
