//! `embedded_hal::i2c::I2c` over a Linux i2c-dev character device.
//!
//! The target address is selected with the `I2C_SLAVE` ioctl before each
//! transaction; reads and writes are then plain `read(2)`/`write(2)` calls
//! on the device file.  Operations in one transaction are issued back to
//! back with a stop between them, which the hold-master sensor commands
//! tolerate.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};

use embedded_hal::i2c::{self, ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation, SevenBitAddress};
use log::debug;

const I2C_SLAVE: u16 = 0x0703;

nix::ioctl_write_int_bad!(set_slave_address, I2C_SLAVE);

#[derive(Debug)]
pub struct I2cError(pub io::Error);

impl fmt::Display for I2cError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl i2c::Error for I2cError {
    fn kind(&self) -> ErrorKind {
        match self.0.raw_os_error() {
            Some(nix::libc::ENXIO | nix::libc::EREMOTEIO) => {
                ErrorKind::NoAcknowledge(NoAcknowledgeSource::Unknown)
            }
            Some(nix::libc::EAGAIN) => ErrorKind::ArbitrationLoss,
            _ => ErrorKind::Other,
        }
    }
}

pub struct LinuxI2c {
    path: PathBuf,
    file: File,
    address: Option<u8>,
}

impl LinuxI2c {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        debug!("opened I2C bus {}", path.display());
        Ok(Self {
            path: path.to_path_buf(),
            file,
            address: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn select(&mut self, address: u8) -> io::Result<()> {
        if self.address == Some(address) {
            return Ok(());
        }
        // SAFETY: the fd is owned by `self.file` and open for the whole
        // call; I2C_SLAVE takes the address by value.
        unsafe { set_slave_address(self.file.as_raw_fd(), i32::from(address)) }
            .map_err(io::Error::from)?;
        self.address = Some(address);
        Ok(())
    }
}

impl ErrorType for LinuxI2c {
    type Error = I2cError;
}

impl I2c<SevenBitAddress> for LinuxI2c {
    fn transaction(
        &mut self,
        address: SevenBitAddress,
        operations: &mut [Operation<'_>],
    ) -> Result<(), I2cError> {
        self.select(address).map_err(I2cError)?;
        for op in operations {
            match op {
                Operation::Read(buf) => self.file.read_exact(buf),
                Operation::Write(bytes) => self.file.write_all(bytes),
            }
            .map_err(I2cError)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::Error as _;

    #[test]
    fn nack_errnos_map_to_no_acknowledge() {
        let err = I2cError(io::Error::from_raw_os_error(nix::libc::EREMOTEIO));
        assert!(matches!(err.kind(), ErrorKind::NoAcknowledge(_)));
        let err = I2cError(io::Error::other("x"));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn missing_bus_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(LinuxI2c::open(&dir.path().join("i2c-9")).is_err());
    }
}
