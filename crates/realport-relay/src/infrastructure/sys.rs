//! Thin wrappers over the few raw system calls the daemon needs.

use std::io;
use std::os::fd::RawFd;

use realport_core::LinkConfig;

/// `ioctl` request that loads link parameters into a RealPort tty.
const DIGI_SETLINK: libc::c_ulong = ((b'e' as libc::c_ulong) << 8) | 112;

/// Driver-side layout of the link parameters.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
struct LinkStruct {
    fast_rate: libc::c_int,
    fast_delay: libc::c_int,
    slow_rate: libc::c_int,
    slow_delay: libc::c_int,
    header_size: libc::c_int,
}

impl From<&LinkConfig> for LinkStruct {
    fn from(link: &LinkConfig) -> Self {
        // Every field is range-checked far below `c_int::MAX`.
        let [fast_rate, fast_delay, slow_rate, slow_delay, header_size] =
            link.fields().map(|v| v as libc::c_int);
        Self {
            fast_rate,
            fast_delay,
            slow_rate,
            slow_delay,
            header_size,
        }
    }
}

/// Pushes `link` to the device open on `fd`.
pub fn set_link(fd: RawFd, link: &LinkConfig) -> io::Result<()> {
    let arg = LinkStruct::from(link);
    // SAFETY: `fd` is an open descriptor owned by the caller for the
    // duration of the call, and `arg` outlives it.
    let rc = unsafe { libc::ioctl(fd, DIGI_SETLINK as _, &arg as *const LinkStruct) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Shuts a socket down in both directions without closing it.
pub fn shutdown_both(fd: RawFd) -> io::Result<()> {
    // SAFETY: plain syscall on a descriptor the caller keeps open.
    let rc = unsafe { libc::shutdown(fd, libc::SHUT_RDWR) };
    if rc < 0 {
        Err(io::Error::last_os_error())
    } else {
        Ok(())
    }
}

/// Whether a socket creation error means the host is out of descriptors or
/// memory, as opposed to a transient condition.
pub fn is_resource_exhaustion(err: &io::Error) -> bool {
    matches!(
        err.raw_os_error(),
        Some(libc::EMFILE | libc::ENFILE | libc::ENOBUFS | libc::ENOMEM)
    )
}
