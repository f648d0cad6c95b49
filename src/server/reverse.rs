use std::io::{self, SeekFrom};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncSeek, AsyncSeekExt};

/// Bytes read per seek when walking a file backward
pub const READ_BLOCK_SIZE: usize = 64 * 1024;

/// Yields the lines of a seekable reader from last to first.
///
/// The reader is consumed in fixed-size blocks starting at its end, so only
/// the blocks holding the lines actually requested are read. Line endings
/// follow `str::lines`: `\n` or `\r\n`, with one trailing newline ignored.
#[derive(Debug)]
pub struct ReverseLines<R> {
    reader: R,
    /// Offset of the first byte already loaded into `pending`
    pos: u64,
    block_size: usize,
    /// Loaded bytes not yet returned; starts with a partial line unless `pos == 0`
    pending: Vec<u8>,
    at_end: bool,
    exhausted: bool,
}

impl<R: AsyncRead + AsyncSeek + Unpin> ReverseLines<R> {
    pub async fn new(mut reader: R, block_size: usize) -> io::Result<Self> {
        let len = reader.seek(SeekFrom::End(0)).await?;
        Ok(Self {
            reader,
            pos: len,
            block_size: block_size.max(1),
            pending: Vec::new(),
            at_end: true,
            exhausted: len == 0,
        })
    }

    /// True once the first line of the file has been returned
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        loop {
            if self.exhausted {
                return Ok(None);
            }

            if let Some(newline) = self.pending.iter().rposition(|&b| b == b'\n') {
                let line = self.pending.split_off(newline + 1);
                self.pending.truncate(newline);
                return Ok(Some(decode(line)));
            }

            if self.pos == 0 {
                self.exhausted = true;
                let line = std::mem::take(&mut self.pending);
                return Ok(Some(decode(line)));
            }

            self.load_block().await?;
        }
    }

    async fn load_block(&mut self) -> io::Result<()> {
        let read = self.pos.min(self.block_size as u64) as usize;
        self.pos -= read as u64;
        self.reader.seek(SeekFrom::Start(self.pos)).await?;

        let mut block = vec![0; read];
        self.reader.read_exact(&mut block).await?;
        block.extend_from_slice(&self.pending);
        self.pending = block;

        if self.at_end {
            self.at_end = false;
            if self.pending.last() == Some(&b'\n') {
                self.pending.pop();
            }
        }
        Ok(())
    }
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(line) => line,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
