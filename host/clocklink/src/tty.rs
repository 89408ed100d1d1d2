use nix::poll::{PollFd, PollFlags, PollTimeout};
use nix::sys::termios::{
    self, BaudRate, ControlFlags, FlushArg, InputFlags, SetArg, SpecialCharacterIndices,
};
use std::fs::{DirEntry, File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::{AsFd, AsRawFd};
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::{FileTypeExt, OpenOptionsExt};
use std::path::{Path, PathBuf};
use std::time::Duration;

nix::ioctl_read_bad!(fionread, libc::FIONREAD, libc::c_int);

/// Device name prefixes under `/dev` that look like a USB or on-board UART.
pub static PATTERNS: [&str; 9] = [
    "ttyUSB",
    "ttyACM",
    "ttyS",
    "ttyAMA",
    "tty.usbserial",
    "cu.usbserial",
    "tty.SLAB_USB",
    "cu.SLAB_USB",
    "tty.usbmodem",
];

/// A raw 8N1 serial line opened non-blocking.
#[derive(Debug)]
pub struct Tty {
    file: File,
    read_timeout: Duration,
    path: PathBuf,
}
impl Tty {
    pub fn new<P: AsRef<Path>>(path: P, baud: u32, read_timeout: Duration) -> io::Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            // don't become the controlling terminal, don't block on open or for data
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK | libc::O_CLOEXEC)
            .open(path.as_ref())?;
        let this = Self {
            file,
            read_timeout,
            path: path.as_ref().to_path_buf(),
        };
        this.set_raw(baud)?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn set_raw(&self, baud: u32) -> io::Result<()> {
        let mut tios = termios::tcgetattr(&self.file)?;
        termios::cfmakeraw(&mut tios);

        // 8N1, no hardware flow control
        tios.control_flags &= !(ControlFlags::CSIZE
            | ControlFlags::PARENB
            | ControlFlags::CSTOPB
            | ControlFlags::CRTSCTS);
        tios.control_flags |= ControlFlags::CS8;
        // enable receiver & ignore modem control lines
        tios.control_flags |= ControlFlags::CREAD | ControlFlags::CLOCAL;
        // no XON/XOFF in either direction: 0x11 and 0x13 are perfectly good clock values
        tios.input_flags &= !(InputFlags::IXON | InputFlags::IXOFF | InputFlags::IXANY);
        tios.input_flags |= InputFlags::IGNBRK;

        // MIN=0 TIME=0: read returns whatever is there, possibly nothing
        tios.control_chars[SpecialCharacterIndices::VMIN as usize] = 0;
        tios.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;

        termios::cfsetspeed(&mut tios, baud_rate(baud)?)?;
        termios::tcsetattr(&self.file, SetArg::TCSADRAIN, &tios)?;
        Ok(())
    }

    /// Number of bytes waiting in the kernel's receive buffer.
    pub fn bytes_to_read(&self) -> io::Result<usize> {
        let mut n: libc::c_int = 0;
        unsafe { fionread(self.file.as_raw_fd(), &mut n) }?;
        Ok(n.max(0) as usize)
    }

    /// Append everything currently pending to `buf` without waiting for more to arrive.
    pub fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let pending = self.bytes_to_read()?;
        if pending == 0 {
            return Ok(0);
        }
        if !self.wait(PollFlags::POLLIN, Some(self.read_timeout))? {
            return Ok(0);
        }
        let start = buf.len();
        buf.resize(start + pending, 0);
        let n = loop {
            match self.file.read(&mut buf[start..]) {
                Ok(n) => break n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break 0,
                Err(e) => {
                    buf.truncate(start);
                    return Err(e);
                }
            }
        };
        buf.truncate(start + n);
        Ok(n)
    }

    /// Discard anything received but not yet read.
    pub fn clear_input(&self) -> io::Result<()> {
        termios::tcflush(&self.file, FlushArg::TCIFLUSH)?;
        Ok(())
    }

    /// Wait until the line is readable/writable. `Ok(false)` on timeout; `None` waits forever.
    fn wait(&self, flags: PollFlags, timeout: Option<Duration>) -> io::Result<bool> {
        let timeout = match timeout {
            Some(t) => PollTimeout::from(u16::try_from(t.as_millis()).unwrap_or(u16::MAX)),
            None => PollTimeout::NONE,
        };
        let mut fds = [PollFd::new(self.file.as_fd(), flags)];
        let ready = nix::poll::poll(&mut fds, timeout)?;
        if ready == 0 {
            return Ok(false);
        }
        match fds[0].revents() {
            Some(e) if e.intersects(flags) => Ok(true),
            // hangup or invalid request
            Some(e) if e.intersects(PollFlags::POLLHUP | PollFlags::POLLNVAL) => Err(
                io::Error::new(io::ErrorKind::BrokenPipe, "serial device hung up"),
            ),
            _ => Err(io::Error::new(io::ErrorKind::Other, "poll reported an error")),
        }
    }
}

impl Write for Tty {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            match self.file.write(buf) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "write() returned 0",
                    ))
                }
                Ok(n) => return Ok(n),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                // non-blocking fd: wait for room in the output queue, however long that takes
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    self.wait(PollFlags::POLLOUT, None)?;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Block until everything written has gone out on the wire.
    fn flush(&mut self) -> io::Result<()> {
        termios::tcdrain(&self.file)?;
        Ok(())
    }
}

fn baud_rate(baud: u32) -> io::Result<BaudRate> {
    Ok(match baud {
        1200 => BaudRate::B1200,
        2400 => BaudRate::B2400,
        4800 => BaudRate::B4800,
        9600 => BaudRate::B9600,
        19200 => BaudRate::B19200,
        38400 => BaudRate::B38400,
        57600 => BaudRate::B57600,
        115200 => BaudRate::B115200,
        230400 => BaudRate::B230400,
        other => {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unsupported baud rate {other}"),
            ))
        }
    })
}

fn is_serial_name(file_name: &[u8]) -> bool {
    std::str::from_utf8(file_name)
        .map(|f| PATTERNS.iter().any(|pattern| f.starts_with(pattern)))
        .unwrap_or(false)
}

fn char_devices(dir: &Path) -> impl Iterator<Item = (DirEntry, std::fs::Metadata)> {
    std::fs::read_dir(dir)
        .inspect_err(|e| tracing::debug!("failed to open {}: {e}", dir.display()))
        .into_iter()
        .flatten()
        .filter_map(|entry| {
            let e = entry.ok()?;
            if !e.file_type().ok()?.is_char_device() {
                return None;
            }
            let metadata = e.metadata().ok()?;
            Some((e, metadata))
        })
}

/// Serial ports present on this machine: character devices under `/dev` whose names match
/// [`PATTERNS`], followed by numbered pseudo-terminals under `/dev/pts`.
pub fn available_ports() -> Vec<PathBuf> {
    let mut ports: Vec<PathBuf> = char_devices(Path::new("/dev"))
        .filter(|(e, _)| is_serial_name(e.file_name().as_bytes()))
        .map(|(e, _)| e.path())
        .collect();
    ports.sort();
    let mut ptys: Vec<(u32, PathBuf)> = char_devices(Path::new("/dev/pts"))
        .filter_map(|(e, _)| {
            let n = e.file_name().to_str()?.parse::<u32>().ok()?;
            Some((n, e.path()))
        })
        .collect();
    ptys.sort();
    ports.extend(ptys.into_iter().map(|(_, p)| p));
    ports
}

/// The serial device that appeared most recently, which is usually the one just plugged in.
pub fn most_recent_port() -> Option<PathBuf> {
    char_devices(Path::new("/dev"))
        .filter(|(e, _)| is_serial_name(e.file_name().as_bytes()))
        .filter_map(|(e, m)| Some((e, m.modified().ok()?)))
        .max_by_key(|(_, modified)| *modified)
        .map(|(e, _)| e.path())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nix::pty::openpty;
    use std::os::fd::OwnedFd;

    fn pty() -> (OwnedFd, PathBuf) {
        let pty = openpty(None, None).expect("openpty");
        let path = std::fs::read_link(format!("/proc/self/fd/{}", pty.slave.as_raw_fd()))
            .expect("slave path");
        // keep the slave open so the master doesn't see a hangup before Tty opens it
        std::mem::forget(pty.slave);
        (pty.master, path)
    }

    #[test]
    fn test_serial_names() {
        assert!(is_serial_name(b"ttyUSB0"));
        assert!(is_serial_name(b"ttyACM12"));
        assert!(is_serial_name(b"cu.usbserial-1420"));
        assert!(!is_serial_name(b"tty0"));
        assert!(!is_serial_name(b"null"));
    }

    #[test]
    fn test_baud_rates() {
        assert!(baud_rate(9600).is_ok());
        assert_eq!(
            baud_rate(9601).unwrap_err().kind(),
            io::ErrorKind::InvalidInput
        );
    }

    #[test]
    fn test_pty_roundtrip() {
        let (master, path) = pty();
        let mut master = File::from(master);
        let mut tty = Tty::new(&path, 9600, Duration::from_millis(10)).expect("open pty slave");

        let mut buf = vec![];
        assert_eq!(tty.read_available(&mut buf).unwrap(), 0);

        master.write_all(&[0xB0, 5, 0xB1, 6]).unwrap();
        let deadline = std::time::Instant::now() + Duration::from_secs(2);
        while buf.len() < 4 && std::time::Instant::now() < deadline {
            tty.read_available(&mut buf).unwrap();
            std::thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(buf, [0xB0, 5, 0xB1, 6]);

        tty.write_all(&[0xBB, 7, 15]).unwrap();
        let mut out = [0u8; 3];
        master.read_exact(&mut out).unwrap();
        assert_eq!(out, [0xBB, 7, 15]);
    }

    #[test]
    fn test_pty_is_listed() {
        let (_master, path) = pty();
        assert!(available_ports().contains(&path));
    }
}
