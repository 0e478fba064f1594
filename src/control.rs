use crate::attr::{
    CtrlAttr, ZIO_ATTR_NBITS, ZIO_ATTR_TRIG_POST_SAMP, ZIO_ATTR_TRIG_PRE_SAMP,
};
use crate::error::{Result, ZioError};
use log::warn;
use std::fmt;

/// Length of the devname and triggername fields.
pub const ZIO_OBJ_NAME_LEN: usize = 12;

pub const ZIO_CONTROL_LITTLE_ENDIAN: u32 = 0x0100_0001;
pub const ZIO_CONTROL_BIG_ENDIAN: u32 = 0x0200_0002;
pub const ZIO_CONTROL_MSB_ALIGN: u32 = 0x0000_0004;
pub const ZIO_CONTROL_LSB_ALIGN: u32 = 0x0000_0008;

pub const ZIO_ALARM_LOST_BLOCK: u8 = 0x01;
pub const ZIO_ALARM_LOST_TRIGGER: u8 = 0x02;
pub const ZIO_ALARM_LOST_SNIFF: u8 = 0x04;

/// Where a block comes from (`struct zio_addr`).
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct Address {
    pub sa_family: u16,
    pub host_type: u8,
    /// Reserved for remote hosts; read-only from an edit surface.
    pub hostid: [u8; 8],
    pub dev_id: u32,
    pub cset_i: u16,
    pub chan_i: u16,
    pub devname: String,
}

/// Hardware timestamp. No calendar meaning is implied.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Timestamp {
    pub secs: u64,
    pub ticks: u64,
    pub bins: u64,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Endianness {
    Little,
    Big,
    Unknown,
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::Little => write!(f, "little-endian"),
            Endianness::Big => write!(f, "big-endian"),
            Endianness::Unknown => write!(f, "unknown-endian"),
        }
    }
}

/// The ZIO control block in host form.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct ControlBlock {
    pub major_version: u8,
    pub minor_version: u8,
    pub alarms_zio: u8,
    pub alarms_dev: u8,
    pub seq_num: u32,
    pub nsamples: u32,
    pub ssize: u16,
    pub nbits: u16,
    pub addr: Address,
    pub tstamp: Timestamp,
    pub mem_offset: u32,
    pub reserved: u32,
    pub flags: u32,
    pub triggername: String,
    pub attr_channel: CtrlAttr,
    pub attr_trigger: CtrlAttr,
    /// Trailing TLV area, kept as read.
    pub tlv: [u8; 16],
}

impl ControlBlock {
    pub fn endianness(&self) -> Endianness {
        if self.flags & ZIO_CONTROL_LITTLE_ENDIAN == ZIO_CONTROL_LITTLE_ENDIAN {
            Endianness::Little
        } else if self.flags & ZIO_CONTROL_BIG_ENDIAN == ZIO_CONTROL_BIG_ENDIAN {
            Endianness::Big
        } else {
            Endianness::Unknown
        }
    }

    /// Trigger pre-samples plus post-samples, inactive slots counting as 0.
    pub fn trigger_samples(&self) -> u32 {
        let std = &self.attr_trigger.std;
        std.get(ZIO_ATTR_TRIG_PRE_SAMP)
            .unwrap_or(0)
            .wrapping_add(std.get(ZIO_ATTR_TRIG_POST_SAMP).unwrap_or(0))
    }

    /// Sets nsamples from the trigger pre/post sample attributes.
    pub fn sync_nsamples(&mut self) {
        self.nsamples = self.trigger_samples();
    }

    /// Sets nbits from the channel nbits attribute, when it is active.
    /// An attribute too wide for the 16-bit field leaves nbits at 0.
    pub fn sync_nbits(&mut self) {
        if let Some(nbits) = self.attr_channel.std.get(ZIO_ATTR_NBITS) {
            self.nbits = u16::try_from(nbits).unwrap_or_else(|_| {
                warn!("nbits attribute {nbits} does not fit the nbits field");
                0
            });
        }
    }

    /// Checks whether a device currently holding `current` would accept
    /// `self` as its new control.
    pub fn check_against(&self, current: &ControlBlock) -> Result<()> {
        if self.major_version != current.major_version {
            return Err(ZioError::Rejected(format!(
                "incompatible ZIO version {}, device has {}",
                self.major_version, current.major_version
            )));
        }
        if self.minor_version != current.minor_version {
            warn!(
                "different ZIO minor version ({} vs {})",
                self.minor_version, current.minor_version
            );
        }
        if self.ssize != current.ssize {
            return Err(ZioError::Rejected(format!(
                "sample size is fixed at {}, got {}",
                current.ssize, self.ssize
            )));
        }
        if self.addr != current.addr {
            return Err(ZioError::Rejected("the zio address cannot change".into()));
        }
        let samples = self.trigger_samples();
        if self.nsamples != samples {
            return Err(ZioError::Rejected(format!(
                "nsamples {} differs from pre + post samples {}",
                self.nsamples, samples
            )));
        }
        let nbit_attr = self.attr_channel.std.values()[ZIO_ATTR_NBITS];
        if u32::from(self.nbits) != nbit_attr {
            return Err(ZioError::Rejected(format!(
                "nbits {} differs from the nbits attribute {}",
                self.nbits, nbit_attr
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ControlBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Ctrl: version {}.{}, trigger {}, dev {}, cset {}, chan {}",
            self.major_version,
            self.minor_version,
            self.triggername,
            self.addr.devname,
            self.addr.cset_i,
            self.addr.chan_i
        )?;
        writeln!(
            f,
            "Ctrl: seq {}, n {}, size {}, bits {}, flags {:08x} ({})",
            self.seq_num,
            self.nsamples,
            self.ssize,
            self.nbits,
            self.flags,
            self.endianness()
        )?;
        writeln!(
            f,
            "Ctrl: alarms zio {:#x} dev {:#x}",
            self.alarms_zio, self.alarms_dev
        )?;
        writeln!(
            f,
            "Ctrl: stamp {}.{:09} ({})",
            self.tstamp.secs, self.tstamp.ticks, self.tstamp.bins
        )?;
        for (label, attrs) in [("dev", &self.attr_channel), ("trg", &self.attr_trigger)] {
            write!(
                f,
                "Ctrl: {label} std {:#x} ext {:#x}",
                attrs.std.mask(),
                attrs.ext.mask()
            )?;
            for (i, v) in attrs.std.iter_enabled() {
                write!(f, " s{i}={v}")?;
            }
            for (i, v) in attrs.ext.iter_enabled() {
                write!(f, " e{i}={v}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}
