//! Sense-reversing cross-process barrier
//!
//! N independently started processes each construct a [`ProcessBarrier`]
//! under the same textual id; construction rendezvouses until all N have
//! joined, after which `wait()` is a reusable N-party barrier. The signal is
//! a single sense bit that flips once per round, which avoids the count-reset
//! race of a centralized count-down barrier and needs no second
//! synchronization object.
//!
//! Backing state is a flat POD record in a named shared-memory object,
//! guarded by a named binary semaphore. Both names derive from the id, so a
//! parent can fork first and let both sides construct independently.

use crate::error::IpcError;
use crate::region::ShmRegion;
use crate::sem::NamedSemaphore;
use std::ptr::addr_of_mut;

/// Process-shared barrier state. Mapped at different addresses in different
/// processes; plain data only, no pointers. All fields are guarded by the
/// named semaphore.
#[repr(C)]
struct BarrierState {
    /// Required participant count; written by the first joiner.
    n_required: u64,
    /// Participants that have completed construction.
    n_joined: u64,
    /// Participants currently blocked in `wait()`.
    count_waiting: u64,
    /// The shared sense bit (0 or 1); flips once per completed round.
    sense: u64,
    /// Live handles to the backing objects; the last one out unlinks.
    ref_count: u64,
}

/// A reusable N-process sense-reversing barrier.
pub struct ProcessBarrier {
    sem: NamedSemaphore,
    region: ShmRegion,
    id: String,
    my_sense: bool,
    registered: bool,
}

// SAFETY: the shared state is only touched under the named semaphore, and
// the mapping itself is process-shared by construction.
unsafe impl Send for ProcessBarrier {}

fn sem_name(id: &str) -> String {
    format!("{id}_shm_sem")
}

fn shm_name(id: &str) -> String {
    format!("{id}_shm")
}

impl ProcessBarrier {
    /// Construct a participant of the `n`-party barrier `id`.
    ///
    /// Blocks until all `n` participants have constructed. Any participant
    /// may be the one that creates the backing objects; creation is
    /// serialized by the semaphore.
    pub fn new(id: &str, n: u64) -> Result<Self, IpcError> {
        assert!(n >= 1, "a barrier needs at least one participant");

        let sem = NamedSemaphore::create(&sem_name(id), 1)?;

        // Critical section: exactly one participant creates and zeroes the
        // state record, everyone else maps the existing one.
        sem.wait()?;
        let region = match ShmRegion::open_or_create(
            &shm_name(id),
            std::mem::size_of::<BarrierState>(),
        ) {
            Ok((region, _created)) => region,
            Err(e) => {
                let _ = sem.post();
                return Err(e);
            }
        };
        sem.post()?;

        let mut barrier = Self {
            sem,
            region,
            id: id.to_string(),
            my_sense: false,
            registered: false,
        };

        barrier.sem.wait()?;
        // SAFETY: state access under the semaphore.
        let (mismatch, joined) = unsafe {
            let st = barrier.state();
            let required = addr_of_mut!((*st).n_required).read_volatile();
            if required == 0 {
                addr_of_mut!((*st).n_required).write_volatile(n);
            }
            if required != 0 && required != n {
                (Some(required), 0)
            } else {
                addr_of_mut!((*st).ref_count)
                    .write_volatile(addr_of_mut!((*st).ref_count).read_volatile() + 1);
                addr_of_mut!((*st).n_joined)
                    .write_volatile(addr_of_mut!((*st).n_joined).read_volatile() + 1);
                (None, addr_of_mut!((*st).n_joined).read_volatile())
            }
        };
        barrier.registered = mismatch.is_none();
        barrier.sem.post()?;

        if let Some(got) = mismatch {
            return Err(IpcError::ParticipantMismatch {
                id: id.to_string(),
                expected: n,
                got,
            });
        }

        tracing::debug!(id, n, joined, "joined barrier, waiting for peers");

        // Spin-yield until every participant has joined.
        loop {
            barrier.sem.wait()?;
            // SAFETY: state access under the semaphore.
            let joined = unsafe { addr_of_mut!((*barrier.state()).n_joined).read_volatile() };
            barrier.sem.post()?;
            if joined >= n {
                break;
            }
            std::thread::yield_now();
        }

        tracing::debug!(id, "all participants joined");
        Ok(barrier)
    }

    fn state(&self) -> *mut BarrierState {
        self.region.as_ptr().cast()
    }

    /// Block until every participant has entered `wait()` this round.
    ///
    /// The last arriver flips the shared sense bit and resets the waiting
    /// count; everyone else spin-checks the bit under the semaphore,
    /// yielding between checks.
    pub fn wait(&mut self) -> Result<(), IpcError> {
        self.sem.wait()?;
        // SAFETY: state access under the semaphore.
        let released = unsafe {
            let st = self.state();
            let waiting = addr_of_mut!((*st).count_waiting).read_volatile() + 1;
            if waiting == addr_of_mut!((*st).n_required).read_volatile() {
                let sense = addr_of_mut!((*st).sense).read_volatile();
                addr_of_mut!((*st).sense).write_volatile(sense ^ 1);
                addr_of_mut!((*st).count_waiting).write_volatile(0);
                true
            } else {
                addr_of_mut!((*st).count_waiting).write_volatile(waiting);
                false
            }
        };
        self.sem.post()?;

        if !released {
            loop {
                self.sem.wait()?;
                // SAFETY: state access under the semaphore.
                let sense = unsafe { addr_of_mut!((*self.state()).sense).read_volatile() != 0 };
                self.sem.post()?;
                if sense != self.my_sense {
                    break;
                }
                std::thread::yield_now();
            }
        }

        self.my_sense = !self.my_sense;
        Ok(())
    }

    /// Unlink the named objects backing barrier `id`.
    ///
    /// Used to clear stale state left by a crashed prior run; callers invoke
    /// it before constructing a fresh barrier and after the last participant
    /// has exited.
    pub fn clear(id: &str) {
        NamedSemaphore::unlink(&sem_name(id));
        ShmRegion::unlink(&shm_name(id));
    }

    /// Whether the named objects for barrier `id` currently exist.
    pub fn resources_exist(id: &str) -> bool {
        ShmRegion::exists(&shm_name(id))
    }
}

impl Drop for ProcessBarrier {
    fn drop(&mut self) {
        // A participant that never registered (mismatched count) only closes
        // its handles; it holds no reference on the shared state.
        if !self.registered {
            return;
        }
        if self.sem.wait().is_err() {
            return;
        }
        // SAFETY: state access under the semaphore.
        let remaining = unsafe {
            let st = self.state();
            let before = addr_of_mut!((*st).ref_count).read_volatile();
            addr_of_mut!((*st).ref_count).write_volatile(before.saturating_sub(1));
            before
        };
        let _ = self.sem.post();

        if remaining == 1 {
            tracing::debug!(id = %self.id, "last participant, unlinking barrier resources");
            NamedSemaphore::unlink(&sem_name(&self.id));
            ShmRegion::unlink(&shm_name(&self.id));
        } else {
            tracing::debug!(
                id = %self.id,
                remaining = remaining.saturating_sub(1),
                "participant left barrier"
            );
        }
        // Field drops close the semaphore handle and unmap the region.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::names::unique_name;

    // Two threads construct the same named barrier; named objects make this
    // equivalent to the two-process case without forking inside the test
    // runner. Cross-process behavior is covered by the probe integration
    // tests.
    #[test]
    fn two_participants_pass_many_rounds() {
        let id = unique_name("/ipcbench_barrier_test");
        ProcessBarrier::clear(&id);

        let peer_id = id.clone();
        let peer = std::thread::spawn(move || {
            let mut barrier = ProcessBarrier::new(&peer_id, 2).unwrap();
            for _ in 0..50 {
                barrier.wait().unwrap();
            }
        });

        let mut barrier = ProcessBarrier::new(&id, 2).unwrap();
        for _ in 0..50 {
            barrier.wait().unwrap();
        }

        peer.join().unwrap();
        drop(barrier);
        assert!(!ProcessBarrier::resources_exist(&id));
    }

    #[test]
    fn wait_orders_sides() {
        // After wait() returns on one side, the other side must have
        // entered the same wait at least once: publish a value before the
        // barrier, observe it after.
        let id = unique_name("/ipcbench_barrier_test");
        ProcessBarrier::clear(&id);

        let flag = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
        let peer_flag = flag.clone();
        let peer_id = id.clone();
        let peer = std::thread::spawn(move || {
            let mut barrier = ProcessBarrier::new(&peer_id, 2).unwrap();
            for round in 1..=10u32 {
                peer_flag.store(round, std::sync::atomic::Ordering::SeqCst);
                barrier.wait().unwrap();
                barrier.wait().unwrap();
            }
        });

        let mut barrier = ProcessBarrier::new(&id, 2).unwrap();
        for round in 1..=10u32 {
            barrier.wait().unwrap();
            assert_eq!(flag.load(std::sync::atomic::Ordering::SeqCst), round);
            barrier.wait().unwrap();
        }

        peer.join().unwrap();
        drop(barrier);
        ProcessBarrier::clear(&id);
    }

    #[test]
    fn participant_count_mismatch_is_rejected() {
        let id = unique_name("/ipcbench_barrier_test");
        ProcessBarrier::clear(&id);

        let peer_id = id.clone();
        let peer = std::thread::spawn(move || {
            let mut barrier = ProcessBarrier::new(&peer_id, 2).unwrap();
            barrier.wait().unwrap();
        });

        // Complete the two-party rendezvous so n_required is settled, then
        // try to join as a third participant expecting a different count.
        let mut barrier = ProcessBarrier::new(&id, 2).unwrap();
        let err = ProcessBarrier::new(&id, 3);
        assert!(matches!(err, Err(IpcError::ParticipantMismatch { .. })));

        barrier.wait().unwrap();
        peer.join().unwrap();
        drop(barrier);
        ProcessBarrier::clear(&id);
    }

    #[test]
    fn clear_removes_stale_names() {
        let id = unique_name("/ipcbench_barrier_test");
        // Simulate a crashed run: create the backing objects by hand.
        let _sem = NamedSemaphore::create(&sem_name(&id), 1).unwrap();
        let _shm = ShmRegion::create(&shm_name(&id), 64).unwrap();
        assert!(ProcessBarrier::resources_exist(&id));

        ProcessBarrier::clear(&id);
        assert!(!ProcessBarrier::resources_exist(&id));
    }
}
