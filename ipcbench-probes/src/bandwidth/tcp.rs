//! TCP loopback bandwidth
//!
//! A fresh listener, connection and accept per round on a fixed loopback
//! port. Two barrier waits bracket connection establishment so neither
//! side's timed window includes the handshake.

use super::streaming::{recv_chunks, send_chunks};
use super::GIB;
use anyhow::{bail, Context};
use ipcbench_core::{generate, run_bandwidth, verify, BenchmarkResult, Timer};
use ipcbench_ipc::{exit_child, fork, unique_name, Fork, IpcError, ProcessBarrier};
use std::net::{Ipv4Addr, TcpListener, TcpStream};
use std::os::fd::FromRawFd;

const LOOPBACK: &str = "127.0.0.1";
const PORT: u16 = 12345;

fn os_err(call: &'static str) -> IpcError {
    IpcError::Os {
        call,
        source: std::io::Error::last_os_error(),
    }
}

/// Bind the loopback listener with `SO_REUSEADDR` set. The receiver
/// rebinds the same fixed port every round; without the option, the
/// previous round's connection sitting in TIME_WAIT would fail the next
/// bind with EADDRINUSE. `std::net::TcpListener::bind` does not set it.
fn bind_listener() -> anyhow::Result<TcpListener> {
    // SAFETY: plain socket creation.
    let fd = unsafe { libc::socket(libc::AF_INET, libc::SOCK_STREAM, 0) };
    if fd < 0 {
        return Err(os_err("socket").into());
    }

    let one: libc::c_int = 1;
    // SAFETY: fd is a live socket; the option value spans one c_int.
    let rc = unsafe {
        libc::setsockopt(
            fd,
            libc::SOL_SOCKET,
            libc::SO_REUSEADDR,
            &one as *const libc::c_int as *const libc::c_void,
            std::mem::size_of::<libc::c_int>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        let err = os_err("setsockopt");
        // SAFETY: fd is live and not yet owned by a TcpListener.
        unsafe { libc::close(fd) };
        return Err(err.into());
    }

    let addr = libc::sockaddr_in {
        sin_family: libc::AF_INET as libc::sa_family_t,
        sin_port: PORT.to_be(),
        sin_addr: libc::in_addr {
            s_addr: u32::from(Ipv4Addr::LOCALHOST).to_be(),
        },
        sin_zero: [0; 8],
    };
    // SAFETY: addr is a fully initialized sockaddr_in of the given length.
    let rc = unsafe {
        libc::bind(
            fd,
            &addr as *const libc::sockaddr_in as *const libc::sockaddr,
            std::mem::size_of::<libc::sockaddr_in>() as libc::socklen_t,
        )
    };
    if rc != 0 {
        let err = os_err("bind");
        // SAFETY: fd is live and not yet owned by a TcpListener.
        unsafe { libc::close(fd) };
        return Err(err.into());
    }

    // SAFETY: fd is a bound socket.
    if unsafe { libc::listen(fd, 5) } != 0 {
        let err = os_err("listen");
        // SAFETY: fd is live and not yet owned by a TcpListener.
        unsafe { libc::close(fd) };
        return Err(err.into());
    }

    // SAFETY: fd is a listening socket owned by the TcpListener from here on.
    Ok(unsafe { TcpListener::from_raw_fd(fd) })
}

fn send_process(
    barrier_id: &str,
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk: usize,
) -> anyhow::Result<()> {
    let mut barrier = ProcessBarrier::new(barrier_id, 2)?;
    let payload = generate(payload_bytes as usize);

    let result = run_bandwidth(iterations, warmups, payload_bytes, |_, _| {
        // Receiver is listening once the first wait returns.
        barrier.wait()?;
        let mut stream =
            TcpStream::connect((LOOPBACK, PORT)).context("connect to receiver")?;
        barrier.wait()?;

        let timer = Timer::start();
        send_chunks(&mut stream, &payload, chunk)?;
        let elapsed = timer.elapsed();

        barrier.wait()?;
        Ok::<_, anyhow::Error>(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "tcp send bandwidth");
    Ok(())
}

fn receive_process(
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
        let listener = bind_listener().context("bind listener")?;
        barrier.wait()?;
        let (mut conn, peer) = listener.accept().context("accept sender")?;
        tracing::debug!(%peer, "sender connected");

        let mut received = Vec::with_capacity(payload_len);
        barrier.wait()?;

        let timer = Timer::start();
        recv_chunks(&mut conn, &mut received, &mut scratch, payload_len)?;
        let elapsed = timer.elapsed();

        if received.len() < payload_len {
            bail!(
                "tcp stream ended after {} of {} bytes (iteration {i})",
                received.len(),
                payload_len
            );
        }
        barrier.wait()?;
        if !verify(&received, payload_len) {
            bail!("tcp payload verification failed (iteration {i})");
        }
        Ok(elapsed)
    })?;

    tracing::info!(gib_per_sec = result.average / GIB, "tcp receive bandwidth");
    Ok(result)
}

/// TCP bandwidth over loopback between a forked sender and the receiving
/// parent.
pub fn run(
    iterations: u32,
    warmups: u32,
    payload_bytes: u64,
    chunk_bytes: u64,
) -> anyhow::Result<BenchmarkResult> {
    let barrier_id = unique_name("/ipcbench_tcp");
    ProcessBarrier::clear(&barrier_id);

    match fork()? {
        Fork::Child => {
            let code = match send_process(
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            ) {
                Ok(()) => 0,
                Err(e) => {
                    tracing::error!(error = %e, "tcp sender failed");
                    1
                }
            };
            exit_child(code)
        }
        Fork::Parent(child) => {
            let result = receive_process(
                &barrier_id,
                iterations,
                warmups,
                payload_bytes,
                chunk_bytes as usize,
            );
            let result = child.finish(result);
            ProcessBarrier::clear(&barrier_id);
            result
        }
    }
}
