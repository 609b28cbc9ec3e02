//! POSIX message queue bandwidth
//!
//! The OS enforces a per-message size limit, so the chunk is capped at 8192
//! bytes and the queue is created with that message size and a 10-message
//! backlog. `EAGAIN`/`ETIMEDOUT` on receive means the sender finished; no
//! further receives are attempted in that round.

use super::GIB;
use anyhow::bail;
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, IpcError, ProcessBarrier};
use std::ffi::CString;

/// Kernel-enforced ceiling for one message, and the cap on `chunk_bytes`.
const MAX_MSG_SIZE: u64 = 8192;
/// Maximum queued-but-unreceived messages.
const MAX_MSG_BACKLOG: libc::c_long = 10;

fn os_err(call: &'static str) -> IpcError {
    IpcError::Os {
        call,
        source: std::io::Error::last_os_error(),
    }
}

struct MessageQueue {
    mqd: libc::mqd_t,
}

impl MessageQueue {
    fn create(name: &CString, msg_size: usize) -> Result<Self, IpcError> {
        // SAFETY: attr is plain data; the pad fields stay zeroed.
        let mut attr: libc::mq_attr = unsafe { std::mem::zeroed() };
        attr.mq_flags = 0;
        attr.mq_maxmsg = MAX_MSG_BACKLOG;
        attr.mq_msgsize = msg_size as libc::c_long;
        attr.mq_curmsgs = 0;

        // SAFETY: name is NUL-terminated; this is the 4-argument create form.
        let mqd = unsafe {
            libc::mq_open(
                name.as_ptr(),
                libc::O_CREAT | libc::O_EXCL | libc::O_RDWR,
                0o644 as libc::c_uint,
                &mut attr as *mut libc::mq_attr,
            )
        };
        if mqd == -1 {
            return Err(os_err("mq_open"));
        }
        Ok(Self { mqd })
    }

    fn open(name: &CString, flags: libc::c_int) -> Result<Self, IpcError> {
        // SAFETY: name is NUL-terminated.
        let mqd = unsafe { libc::mq_open(name.as_ptr(), flags) };
        if mqd == -1 {
            return Err(os_err("mq_open"));
        }
        Ok(Self { mqd })
    }

    fn send(&self, bytes: &[u8]) -> Result<(), IpcError> {
        // SAFETY: bytes spans len valid bytes.
        if unsafe { libc::mq_send(self.mqd, bytes.as_ptr().cast(), bytes.len(), 0) } == -1 {
            return Err(os_err("mq_send"));
        }
        Ok(())
    }

    /// Receive one message into `scratch`. `None` means the queue reported
    /// sender-finished (`EAGAIN`/`ETIMEDOUT`).
    fn receive(&self, scratch: &mut [u8]) -> Result<Option<usize>, IpcError> {
        // SAFETY: scratch spans len writable bytes, at least mq_msgsize.
        let n = unsafe {
            libc::mq_receive(
                self.mqd,
                scratch.as_mut_ptr().cast(),
                scratch.len(),
                std::ptr::null_mut(),
            )
        };
        if n >= 0 {
            return Ok(Some(n as usize));
        }
        let err = std::io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EAGAIN) | Some(libc::ETIMEDOUT) => Ok(None),
            _ => Err(IpcError::Os {
                call: "mq_receive",
                source: err,
            }),
        }
    }

    fn unlink(name: &CString) {
        // SAFETY: name is NUL-terminated.
        if unsafe { libc::mq_unlink(name.as_ptr()) } != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ENOENT) {
                tracing::error!(%err, "mq_unlink failed");
            }
        }
    }
}

impl Drop for MessageQueue {
    fn drop(&mut self) {
        // SAFETY: mqd is a live descriptor; closed exactly once.
        unsafe { libc::mq_close(self.mqd) };
    }
}

fn send_process(
    name: &CString,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload = generate(payload_bytes as usize);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |_, _| {
        let queue = MessageQueue::open(name, libc::O_WRONLY)?;
        barrier.wait()?;

        let timer = Timer::start();
        let mut sent = 0usize;
        while sent < payload.len() {
            let take = chunk.min(payload.len() - sent);
            queue.send(&payload[sent..sent + take])?;
            sent += take;
        }
        let elapsed = timer.elapsed();

        barrier.wait()?;
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "mq send bandwidth");
    Ok(())
}

fn receive_process(
    name: &CString,
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<BenchmarkResult> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload_len = payload_bytes as usize;
    let mut scratch = vec![0u8; chunk];

    let result = run_bandwidth(iterations, warmups, payload_bytes, |i, _| {
        let queue = MessageQueue::open(name, libc::O_RDONLY)?;
        let mut received = Vec::with_capacity(payload_len);
        barrier.wait()?;

        let timer = Timer::start();
        while received.len() < payload_len {
            match queue.receive(&mut scratch)? {
                Some(0) | None => break,
                Some(n) => received.extend_from_slice(&scratch[..n]),
            }
        }
        let elapsed = timer.elapsed();

        if received.len() < payload_len {
            bail!(
                "mq delivered {} of {} bytes (iteration {i})",
                received.len(),
                payload_len
            );
        }
        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("mq payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "mq receive bandwidth");
    Ok(result)
}

/// POSIX message queue bandwidth between a forked sender and the receiving
/// parent.
pub fn run(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let name = unique_name("/ipcbench_mq");
    let cname = CString::new(name.as_str()).map_err(|_| IpcError::InvalidName(name.clone()))?;
    let barrier_id = unique_name("/ipcbench_mq_barrier");
    ProcessBarrier::clear(&barrier_id);
    MessageQueue::unlink(&cname);

    let chunk = chunk_bytes.min(MAX_MSG_SIZE) as usize;
    // Create the queue up front so both sides can open it after the fork.
    drop(MessageQueue::create(&cname, chunk)?);

    match fork()? {
        Fork::Child => {
            let code = match send_process(
                &cname,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "mq sender failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            let result = receive_process(
                &cname,
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk,
            );
            let result = child.finish(result);
            MessageQueue::unlink(&cname);
            ProcessBarrier::clear(&barrier_id);
            result
        }
    }
}
