//! TCP socket knobs used by the engine.
//!
//! # Safety
//!
//! This module uses unsafe code to access raw file descriptors/sockets for
//! TCP socket configuration. The unsafe operations are encapsulated and safe
//! to use from the public API.

#![allow(unsafe_code)]

use std::io;
use std::net::Shutdown;

#[cfg(unix)]
fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    use std::os::unix::io::{AsRawFd, FromRawFd};
    let fd = stream.as_raw_fd();
    let sock = unsafe { socket2::Socket::from_raw_fd(fd) };
    let result = f(&sock);
    std::mem::forget(sock); // Don't close the fd
    result
}

#[cfg(windows)]
fn with_socket<T>(
    stream: &compio::net::TcpStream,
    f: impl FnOnce(&socket2::Socket) -> io::Result<T>,
) -> io::Result<T> {
    use std::os::windows::io::{AsRawSocket, FromRawSocket};
    let raw = stream.as_raw_socket();
    let sock = unsafe { socket2::Socket::from_raw_socket(raw) };
    let result = f(&sock);
    std::mem::forget(sock); // Don't close the socket
    result
}

/// Enable TCP_NODELAY for minimal latency.
///
/// This disables Nagle's algorithm, trading bandwidth efficiency for lower
/// latency on small callback-driven writes.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn enable_tcp_nodelay(stream: &compio::net::TcpStream) -> io::Result<()> {
    #[cfg(any(unix, windows))]
    {
        with_socket(stream, |sock| sock.set_nodelay(true))
    }

    #[cfg(not(any(unix, windows)))]
    {
        // Unsupported platform - just continue without TCP_NODELAY
        let _ = stream;
        Ok(())
    }
}

/// Arm an abortive close: SO_LINGER with a zero timeout makes the next
/// close reset the connection (RST) instead of running the orderly FIN
/// sequence, discarding unflushed output.
///
/// # Errors
///
/// Returns an error if the socket option cannot be set.
#[inline]
pub fn set_linger_zero(stream: &compio::net::TcpStream) -> io::Result<()> {
    #[cfg(any(unix, windows))]
    {
        with_socket(stream, |sock| {
            sock.set_linger(Some(std::time::Duration::ZERO))
        })
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = stream;
        Ok(())
    }
}

/// Shut down one or both halves of the connection.
///
/// Shutting down the write half sends the FIN that starts the orderly
/// close sequence; shutting down both also wakes a pump blocked in a read.
///
/// # Errors
///
/// Returns an error if the shutdown call fails.
#[inline]
pub fn shutdown(stream: &compio::net::TcpStream, how: Shutdown) -> io::Result<()> {
    #[cfg(any(unix, windows))]
    {
        with_socket(stream, |sock| sock.shutdown(how))
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = (stream, how);
        Ok(())
    }
}
