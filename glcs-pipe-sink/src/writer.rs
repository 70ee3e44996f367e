//! Frame writer: "std" writes a frame linearly, "invert"
//! gathers it row-by-row in reverse order via `writev`. Both share a
//! restartable gather-write cursor so a partial write (the pipe went
//! non-blocking-full mid-frame) resumes exactly where it left off
//! instead of re-sending already-accepted bytes.

use std::io::IoSlice;
use std::os::fd::RawFd;

use nix::errno::Errno;
use nix::sys::uio::writev;

use crate::error::PipeError;

/// Split `frame` into `rows` chunks of `row_bytes`, reversing row order
/// when `invert` is set.
pub fn split_rows(frame: &[u8], row_bytes: usize, invert: bool) -> Vec<Vec<u8>> {
    if row_bytes == 0 {
        return vec![frame.to_vec()];
    }
    let mut rows: Vec<Vec<u8>> = frame.chunks(row_bytes).map(|c| c.to_vec()).collect();
    if invert {
        rows.reverse();
    }
    rows
}

/// Restartable gather-write cursor over a sequence of owned row
/// buffers.
pub struct GatherWriter {
    rows: Vec<Vec<u8>>,
    row: usize,
    offset: usize,
}

impl GatherWriter {
    pub fn new(rows: Vec<Vec<u8>>) -> Self {
        Self { rows, row: 0, offset: 0 }
    }

    pub fn is_done(&self) -> bool {
        self.row >= self.rows.len()
    }

    /// Attempt to advance the cursor with one `writev`. Returns
    /// `Err(PipeError::WouldBlock)` on `EAGAIN`/`EWOULDBLOCK` so the
    /// caller can wait on the edge-triggered epoll registration before
    /// retrying.
    pub fn attempt(&mut self, fd: RawFd) -> Result<(), PipeError> {
        if self.is_done() {
            return Ok(());
        }
        let slices: Vec<IoSlice> = self.rows[self.row..]
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let start = if i == 0 { self.offset } else { 0 };
                IoSlice::new(&row[start..])
            })
            .collect();

        match writev(fd, &slices) {
            Ok(n) => {
                self.advance(n);
                Ok(())
            }
            Err(Errno::EAGAIN) => Err(PipeError::WouldBlock),
            Err(e) => Err(PipeError::Io(std::io::Error::from(e))),
        }
    }

    fn advance(&mut self, mut n: usize) {
        while n > 0 && self.row < self.rows.len() {
            let remaining = self.rows[self.row].len() - self.offset;
            if n < remaining {
                self.offset += n;
                n = 0;
            } else {
                n -= remaining;
                self.row += 1;
                self.offset = 0;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invert_reverses_row_order() {
        let frame: Vec<u8> = (0..12u8).collect();
        let rows = split_rows(&frame, 4, true);
        assert_eq!(rows, vec![vec![8, 9, 10, 11], vec![4, 5, 6, 7], vec![0, 1, 2, 3]]);
    }

    #[test]
    fn std_order_keeps_rows_in_place() {
        let frame: Vec<u8> = (0..12u8).collect();
        let rows = split_rows(&frame, 4, false);
        assert_eq!(rows, vec![vec![0, 1, 2, 3], vec![4, 5, 6, 7], vec![8, 9, 10, 11]]);
    }

    #[test]
    fn gather_writer_tracks_partial_progress_across_rows() {
        let mut w = GatherWriter::new(vec![vec![1, 2, 3], vec![4, 5, 6]]);
        w.advance(2);
        assert_eq!(w.row, 0);
        assert_eq!(w.offset, 2);
        w.advance(4);
        assert_eq!(w.row, 2);
        assert!(w.is_done());
    }
}
