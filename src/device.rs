use crate::codec::{self, ZIO_CONTROL_SIZE};
use crate::control::ControlBlock;
use crate::descriptor::ControlDescription;
use crate::error::{Result, ZioError};
use log::{debug, info};
use std::{
    fs::{self, File, OpenOptions},
    io::{ErrorKind, Read, Write},
    path::{Path, PathBuf},
};

pub const CONTROL_DESCRIPTION: &str = "control-description";
pub const AVAILABLE_TRIGGERS: &str = "/sys/bus/zio/available_triggers";

/// Reads one control block from `reader`.
///
/// A control device hands out a whole block per read, but sysfs files
/// and pipes may split it, so keep reading until the block is complete
/// or the source is exhausted.
pub fn read_block(reader: &mut impl Read, path: &Path) -> Result<ControlBlock> {
    let mut buf = [0u8; ZIO_CONTROL_SIZE];
    let mut got = 0;
    while got < buf.len() {
        match reader.read(&mut buf[got..]) {
            Ok(0) => break,
            Ok(n) => got += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(ZioError::io(path, e)),
        }
    }
    debug!("{}: read {} control bytes", path.display(), got);
    codec::decode(&buf[..got])
}

pub fn read_control(path: impl AsRef<Path>) -> Result<ControlBlock> {
    let path = path.as_ref();
    let mut file = File::open(path).map_err(|e| ZioError::io(path, e))?;
    read_block(&mut file, path)
}

/// Encodes `ctrl` and writes the whole block in a single write.
pub fn write_control(path: impl AsRef<Path>, ctrl: &ControlBlock) -> Result<()> {
    let path = path.as_ref();
    let buf = codec::encode(ctrl)?;
    let mut file = OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|e| ZioError::io(path, e))?;
    file.write_all(&buf).map_err(|e| ZioError::io(path, e))?;
    info!(
        "{}: wrote control seq {} ({} bytes)",
        path.display(),
        ctrl.seq_num,
        buf.len()
    );
    Ok(())
}

pub fn read_description(sysfs_dir: impl AsRef<Path>) -> Result<ControlDescription> {
    let path = sysfs_dir.as_ref().join(CONTROL_DESCRIPTION);
    let text = fs::read_to_string(&path).map_err(|e| ZioError::io(&path, e))?;
    let desc = ControlDescription::parse(&text)?;
    debug!("{}: {} attribute descriptors", path.display(), desc.len());
    Ok(desc)
}

/// Trigger names, one per line; blank lines are dropped.
pub fn available_triggers(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|e| ZioError::io(path, e))?;
    Ok(text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// A control file plus the attribute descriptions of its device.
///
/// The descriptions belong to the device the session points at; moving
/// the session to another device drops them.
#[derive(Debug)]
pub struct Session {
    control: PathBuf,
    sysfs_dir: Option<PathBuf>,
    description: ControlDescription,
}

impl Session {
    pub fn open(control: impl Into<PathBuf>, sysfs_dir: Option<PathBuf>) -> Result<Self> {
        let mut session = Self {
            control: control.into(),
            sysfs_dir: None,
            description: ControlDescription::default(),
        };
        session.retarget(session.control.clone(), sysfs_dir)?;
        Ok(session)
    }

    /// Points the session at another device, replacing its descriptions.
    pub fn retarget(&mut self, control: PathBuf, sysfs_dir: Option<PathBuf>) -> Result<()> {
        self.description = match &sysfs_dir {
            Some(dir) => read_description(dir)?,
            None => ControlDescription::default(),
        };
        self.control = control;
        self.sysfs_dir = sysfs_dir;
        Ok(())
    }

    pub fn control_path(&self) -> &Path {
        &self.control
    }

    pub fn sysfs_dir(&self) -> Option<&Path> {
        self.sysfs_dir.as_deref()
    }

    pub fn description(&self) -> &ControlDescription {
        &self.description
    }

    pub fn read(&self) -> Result<ControlBlock> {
        read_control(&self.control)
    }

    pub fn write(&self, ctrl: &ControlBlock) -> Result<()> {
        write_control(&self.control, ctrl)
    }

    /// Writes `ctrl` after checking the device would accept it, then
    /// reads back what the device now holds.
    pub fn apply(&self, ctrl: &ControlBlock) -> Result<ControlBlock> {
        let current = self.read()?;
        ctrl.check_against(&current)?;
        self.write(ctrl)?;
        self.read()
    }
}
