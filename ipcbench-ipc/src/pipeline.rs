//! Pipelined double-buffered shared transport
//!
//! The `mmap` and `shm` bandwidth probes move the payload through a shared
//! region laid out as a small header (two slot lengths) followed by two
//! chunk-sized slots. Sender and receiver advance in lockstep, one barrier
//! wait per tick: at tick `i` the sender fills slot `i % 2` while the
//! receiver drains slot `(i + 1) % 2`, so one slot is always being filled
//! while the other is being drained. The tick count is
//! `ceil(payload / chunk) + 1`; the extra tick covers the initial fill,
//! where the receiver's slot is still empty, and symmetrically the final
//! drain.

use crate::barrier::ProcessBarrier;
use crate::error::IpcError;
use std::ptr::addr_of_mut;

/// Slot-length header at the start of the shared region. Flat data; the
/// region is mapped at different addresses in sender and receiver.
#[repr(C)]
struct SlotHeader {
    len: [u64; 2],
}

/// View of a shared region as a double-buffered chunk pipeline.
///
/// The region must span at least [`DoubleBuffer::region_len`] bytes. Only
/// one side writes a given slot per tick; the barrier supplies both the
/// "slot is full" and "slot is free" edges.
pub struct DoubleBuffer {
    base: *mut u8,
    chunk: usize,
}

impl DoubleBuffer {
    /// Bytes of shared region needed for a given chunk size.
    pub const fn region_len(chunk: usize) -> usize {
        std::mem::size_of::<SlotHeader>() + 2 * chunk
    }

    /// Number of barrier-bracketed ticks needed to move `payload` bytes.
    pub fn ticks(payload: usize, chunk: usize) -> usize {
        payload.div_ceil(chunk) + 1
    }

    /// Wrap a mapped region.
    ///
    /// # Safety
    /// `base` must point to at least [`Self::region_len`] writable bytes
    /// that stay mapped for the lifetime of the returned value, shared with
    /// exactly one peer driving the opposite side of the pipeline.
    pub unsafe fn from_raw(base: *mut u8, chunk: usize) -> Self {
        Self { base, chunk }
    }

    fn header(&self) -> *mut SlotHeader {
        self.base.cast()
    }

    fn slot_data(&self, slot: usize) -> *mut u8 {
        // SAFETY: slot is 0 or 1; the region spans header + 2 chunks.
        unsafe {
            self.base
                .add(std::mem::size_of::<SlotHeader>() + slot * self.chunk)
        }
    }

    /// Drive the sender side: copy `payload` through the pipeline, one
    /// chunk per tick. The final tick carries zero bytes.
    pub fn send(
        &mut self,
        barrier: &mut ProcessBarrier,
        payload: &[u8],
    ) -> Result<(), IpcError> {
        let ticks = Self::ticks(payload.len(), self.chunk);
        let mut sent = 0usize;
        for i in 0..ticks {
            barrier.wait()?;
            let slot = i % 2;
            let take = self.chunk.min(payload.len() - sent);
            // SAFETY: the peer only touches the opposite slot this tick.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    payload.as_ptr().add(sent),
                    self.slot_data(slot),
                    take,
                );
                addr_of_mut!((*self.header()).len[slot]).write_volatile(take as u64);
            }
            sent += take;
        }
        Ok(())
    }

    /// Drive the receiver side: reassemble `payload_len` bytes from the
    /// pipeline. The first tick reads the not-yet-filled slot, which the
    /// creator zero-initialized, and contributes nothing.
    pub fn recv(
        &mut self,
        barrier: &mut ProcessBarrier,
        payload_len: usize,
    ) -> Result<Vec<u8>, IpcError> {
        let ticks = Self::ticks(payload_len, self.chunk);
        let mut out = vec![0u8; payload_len];
        let mut received = 0usize;
        for i in 0..ticks {
            barrier.wait()?;
            let slot = (i + 1) % 2;
            // SAFETY: the peer only touches the opposite slot this tick.
            let len = unsafe { addr_of_mut!((*self.header()).len[slot]).read_volatile() } as usize;
            let take = len.min(payload_len - received);
            // SAFETY: take is clamped to both the slot and the remaining output.
            unsafe {
                std::ptr::copy_nonoverlapping(
                    self.slot_data(slot),
                    out.as_mut_ptr().add(received),
                    take,
                );
            }
            received += take;
        }
        out.truncate(received);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::unique_name;
    use crate::region::ShmRegion;

    #[test]
    fn tick_count_includes_pipeline_fill() {
        assert_eq!(DoubleBuffer::ticks(1024, 1024), 2);
        assert_eq!(DoubleBuffer::ticks(1025, 1024), 3);
        assert_eq!(DoubleBuffer::ticks(4096, 1024), 5);
        assert_eq!(DoubleBuffer::ticks(1, 1024), 2);
    }

    #[test]
    fn region_len_covers_header_and_slots() {
        assert_eq!(DoubleBuffer::region_len(1024), 16 + 2048);
    }

    // Full pipeline between two threads sharing one named region, ticked by
    // the same barrier the real probes use.
    #[test]
    fn payload_survives_the_pipeline() {
        let shm = unique_name("/ipcbench_pipeline_test");
        let barrier_id = unique_name("/ipcbench_pipeline_test_barrier");
        ShmRegion::unlink(&shm);
        ProcessBarrier::clear(&barrier_id);

        let chunk = 256usize;
        let payload: Vec<u8> = (0..2000u32).map(|i| (i * 7) as u8).collect();
        let expected = payload.clone();

        let region = ShmRegion::create(&shm, DoubleBuffer::region_len(chunk)).unwrap();

        let sender_shm = shm.clone();
        let sender_barrier = barrier_id.clone();
        let sender = std::thread::spawn(move || {
            let region = ShmRegion::open(&sender_shm, DoubleBuffer::region_len(chunk)).unwrap();
            let mut barrier = ProcessBarrier::new(&sender_barrier, 2).unwrap();
            // SAFETY: region spans region_len(chunk) bytes, peer drives recv.
            let mut pipe = unsafe { DoubleBuffer::from_raw(region.as_ptr(), chunk) };
            pipe.send(&mut barrier, &payload).unwrap();
        });

        let mut barrier = ProcessBarrier::new(&barrier_id, 2).unwrap();
        // SAFETY: region spans region_len(chunk) bytes, peer drives send.
        let mut pipe = unsafe { DoubleBuffer::from_raw(region.as_ptr(), chunk) };
        let received = pipe.recv(&mut barrier, expected.len()).unwrap();

        sender.join().unwrap();
        assert_eq!(received, expected);

        drop(barrier);
        drop(region);
        ShmRegion::unlink(&shm);
    }
}
