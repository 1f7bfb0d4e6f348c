//! The shell: current-device selection and command dispatch.
//!
//! Each handler parses its argument shape, calls into the registry, and
//! formats a one-line (occasionally multi-line for `info`) response.
//! Failures come back as [`CmdError`]; its `Display` is the failure text
//! a console would print.

use alloc::format;
use alloc::string::{String, ToString};
use alloc::vec::Vec;
use core::fmt::{self, Write as _};

use blkmap::{BLOCK_SIZE, BlkmapError, DeviceId, DeviceRegistry};

use crate::args::{parse_hex, parse_id};

const USAGE: &str = "\
create [<dev>] - create device
destroy <dev> - destroy device
dev [<dev>] - show or set current device
info - list configured devices
map <dev> <blknr> <blkcnt> mem <addr> - memory mapping
map <dev> <blknr> <blkcnt> linear blkmap <dev> <blknr> - device mapping
read <addr> <blknr> <blkcnt> - read from current device
write <addr> <blknr> <blkcnt> - write to current device";

const MAP_USAGE: &str =
    "map <dev> <blknr> <blkcnt> mem <addr> | linear blkmap <dev> <blknr>";

/// Why a command line was rejected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CmdError {
    /// Wrong argument shape; carries the expected synopsis.
    Usage(&'static str),
    /// The first token names no command.
    Unknown(String),
    /// A numeric argument failed to parse.
    BadNumber(String),
    /// `read`/`write` issued with no device selected.
    NoCurrentDevice,
    /// The underlying device operation failed.
    Device(BlkmapError),
}

impl fmt::Display for CmdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Usage(synopsis) => write!(f, "usage: {synopsis}"),
            Self::Unknown(name) => write!(f, "unknown command \"{name}\""),
            Self::BadNumber(token) => write!(f, "bad number \"{token}\""),
            Self::NoCurrentDevice => f.write_str("no current device"),
            Self::Device(err) => write!(f, "{err}"),
        }
    }
}

impl From<BlkmapError> for CmdError {
    fn from(err: BlkmapError) -> Self {
        Self::Device(err)
    }
}

/// Transfer direction for the shared `read`/`write` handler.
#[derive(Clone, Copy)]
enum Dir {
    Read,
    Write,
}

/// Interprets command lines against an owned device registry.
pub struct Shell {
    registry: DeviceRegistry,
    current: Option<DeviceId>,
}

impl Default for Shell {
    fn default() -> Self {
        Self::new()
    }
}

impl Shell {
    /// Creates a shell with an empty registry and no current device.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registry: DeviceRegistry::new(),
            current: None,
        }
    }

    /// The registry driven by this shell.
    #[must_use]
    pub fn registry(&self) -> &DeviceRegistry {
        &self.registry
    }

    /// The currently selected device, if any.
    #[must_use]
    pub fn current(&self) -> Option<DeviceId> {
        self.current
    }

    /// Runs one command line and returns the response text.
    ///
    /// # Errors
    ///
    /// [`CmdError`] for malformed lines and failed operations; the
    /// error's `Display` is the failure text.
    ///
    /// # Safety
    ///
    /// `map … mem`, `read`, and `write` dereference operator-supplied
    /// byte addresses. The caller must only feed the shell addresses
    /// valid for the implied lengths, staying valid for as long as the
    /// mappings they establish are in use.
    pub unsafe fn run(&mut self, line: &str) -> Result<String, CmdError> {
        let mut tokens = line.split_whitespace();
        let Some(cmd) = tokens.next() else {
            return Err(CmdError::Usage(USAGE));
        };
        let args: Vec<&str> = tokens.collect();
        match cmd {
            "create" => self.create(&args),
            "destroy" => self.destroy(&args),
            "dev" => self.dev(&args),
            "info" => self.info(&args),
            // SAFETY: forwarded operator-address contract.
            "map" => unsafe { self.map(&args) },
            // SAFETY: forwarded operator-address contract.
            "read" => unsafe { self.transfer(&args, Dir::Read) },
            // SAFETY: forwarded operator-address contract.
            "write" => unsafe { self.transfer(&args, Dir::Write) },
            other => Err(CmdError::Unknown(other.to_string())),
        }
    }

    fn create(&mut self, args: &[&str]) -> Result<String, CmdError> {
        let id = match args {
            [] => self.registry.create_auto()?,
            [token] => {
                let id = parse_id(token)?;
                self.registry.create(id)?;
                id
            }
            _ => return Err(CmdError::Usage("create [<dev>]")),
        };
        Ok(format!("Created device {id}"))
    }

    fn destroy(&mut self, args: &[&str]) -> Result<String, CmdError> {
        let [token] = args else {
            return Err(CmdError::Usage("destroy <dev>"));
        };
        let id = parse_id(token)?;
        self.registry.destroy(id)?;
        if self.current == Some(id) {
            self.current = None;
        }
        Ok(format!("Destroyed device {id}"))
    }

    fn dev(&mut self, args: &[&str]) -> Result<String, CmdError> {
        match args {
            [] => {
                let id = self.current.ok_or(CmdError::NoCurrentDevice)?;
                Ok(format!("Current device: {id}"))
            }
            [token] => {
                let id = parse_id(token)?;
                self.registry.device(id)?;
                self.current = Some(id);
                Ok(format!("Device {id} is now current device"))
            }
            _ => Err(CmdError::Usage("dev [<dev>]")),
        }
    }

    fn info(&mut self, args: &[&str]) -> Result<String, CmdError> {
        if !args.is_empty() {
            return Err(CmdError::Usage("info"));
        }
        if self.registry.is_empty() {
            return Ok(String::from("No devices available"));
        }
        let mut out = String::new();
        for device in self.registry.devices() {
            let _ = writeln!(
                out,
                "Device {}: {:#x} blocks, {} slices",
                device.id(),
                device.block_count(),
                device.slice_count()
            );
        }
        out.pop(); // trailing newline
        Ok(out)
    }

    /// `map <dev> <blknr> <blkcnt> mem <addr>`
    /// `map <dev> <blknr> <blkcnt> linear blkmap <dev> <blknr>`
    unsafe fn map(&mut self, args: &[&str]) -> Result<String, CmdError> {
        let [dev, blknr, blkcnt, kind, rest @ ..] = args else {
            return Err(CmdError::Usage(MAP_USAGE));
        };
        let id = parse_id(dev)?;
        let blknr = parse_hex(blknr)?;
        let blkcnt = parse_hex(blkcnt)?;
        match (*kind, rest) {
            ("mem", [addr]) => {
                let addr = parse_hex(addr)? as usize;
                // SAFETY: operator-supplied backing region — see `run`.
                unsafe {
                    self.registry.map_mem(id, blknr, blkcnt, addr)?;
                }
                Ok(format!(
                    "Block {blknr:#x}+{blkcnt:#x} mapped to {addr:#x}"
                ))
            }
            ("linear", ["blkmap", target, target_blknr]) => {
                let target = parse_id(target)?;
                let target_blknr = parse_hex(target_blknr)?;
                self.registry
                    .map_device(id, blknr, blkcnt, target, target_blknr)?;
                Ok(format!(
                    "Block {blknr:#x}+{blkcnt:#x} mapped to block {target_blknr:#x} of device {target}"
                ))
            }
            _ => Err(CmdError::Usage(MAP_USAGE)),
        }
    }

    /// `read|write <addr> <blknr> <blkcnt>` on the current device.
    unsafe fn transfer(&mut self, args: &[&str], dir: Dir) -> Result<String, CmdError> {
        let [addr, blknr, blkcnt] = args else {
            return Err(CmdError::Usage("read|write <addr> <blknr> <blkcnt>"));
        };
        let id = self.current.ok_or(CmdError::NoCurrentDevice)?;
        let addr = parse_hex(addr)? as usize;
        let blknr = parse_hex(blknr)?;
        let blkcnt = parse_hex(blkcnt)?;
        let len = usize::try_from(blkcnt)
            .ok()
            .and_then(|cnt| cnt.checked_mul(BLOCK_SIZE))
            .ok_or(CmdError::Device(BlkmapError::InvalidRange))?;

        let (name, done_verb) = match dir {
            Dir::Read => ("read", "read"),
            Dir::Write => ("write", "written"),
        };
        let done = match dir {
            Dir::Read if len == 0 => self.registry.read(id, blknr, &mut [])?,
            Dir::Write if len == 0 => self.registry.write(id, blknr, &[])?,
            Dir::Read => {
                // SAFETY: operator-supplied destination — see `run`.
                let buf = unsafe { core::slice::from_raw_parts_mut(addr as *mut u8, len) };
                self.registry.read(id, blknr, buf)?
            }
            Dir::Write => {
                // SAFETY: operator-supplied source — see `run`.
                let buf = unsafe { core::slice::from_raw_parts(addr as *const u8, len) };
                self.registry.write(id, blknr, buf)?
            }
        };
        Ok(format!(
            "blkmap {name}: device {id} block # {blknr:#x}, count {blkcnt:#x} ... {done} blocks {done_verb}: OK"
        ))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
