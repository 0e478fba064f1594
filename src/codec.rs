//! Byte-exact conversion between [`ControlBlock`] and the 512-byte
//! `struct zio_control` exchanged with the kernel.
//!
//! ```text
//!   0 u8  major_version        48 u64 tstamp.secs
//!   1 u8  minor_version        56 u64 tstamp.ticks
//!   2 u8  alarms_zio           64 u64 tstamp.bins
//!   3 u8  alarms_dev           72 u32 mem_offset
//!   4 u32 seq_num              76 u32 reserved
//!   8 u32 nsamples             80 u32 flags
//!  12 u16 ssize                84 [12] triggername
//!  14 u16 nbits                96 zio_ctrl_attr attr_channel
//!  16 u16 addr.sa_family      296 zio_ctrl_attr attr_trigger
//!  18 u8  addr.host_type      496 [16] tlv
//!  20 [8] addr.hostid
//!  28 u32 addr.dev_id         zio_ctrl_attr (200 bytes):
//!  32 u16 addr.cset_i           0 u16 std_mask, 4 u32 ext_mask,
//!  34 u16 addr.chan_i           8 u32 std_val[16], 72 u32 ext_val[32]
//!  36 [12] addr.devname
//! ```
//!
//! The kernel writes the structure in native byte order.

use crate::attr::{CtrlAttr, ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR};
use crate::control::{Address, ControlBlock, Timestamp, ZIO_OBJ_NAME_LEN};
use crate::error::{Result, ZioError};
use byteorder::{ByteOrder, NativeEndian};

/// Size of every control transfer.
pub const ZIO_CONTROL_SIZE: usize = 512;

const MAJOR_VERSION: usize = 0;
const MINOR_VERSION: usize = 1;
const ALARMS_ZIO: usize = 2;
const ALARMS_DEV: usize = 3;
const SEQ_NUM: usize = 4;
const NSAMPLES: usize = 8;
const SSIZE: usize = 12;
const NBITS: usize = 14;
const ADDR_SA_FAMILY: usize = 16;
const ADDR_HOST_TYPE: usize = 18;
const ADDR_HOSTID: usize = 20;
const ADDR_DEV_ID: usize = 28;
const ADDR_CSET: usize = 32;
const ADDR_CHAN: usize = 34;
const ADDR_DEVNAME: usize = 36;
const TSTAMP_SECS: usize = 48;
const TSTAMP_TICKS: usize = 56;
const TSTAMP_BINS: usize = 64;
const MEM_OFFSET: usize = 72;
const RESERVED: usize = 76;
const FLAGS: usize = 80;
const TRIGGERNAME: usize = 84;
const ATTR_CHANNEL: usize = 96;
const ATTR_TRIGGER: usize = ATTR_CHANNEL + CTRL_ATTR_SIZE;
const TLV: usize = ATTR_TRIGGER + CTRL_ATTR_SIZE;
const TLV_SIZE: usize = 16;

const CTRL_ATTR_SIZE: usize = 4 * (2 + ZIO_MAX_STD_ATTR + ZIO_MAX_EXT_ATTR);
const ATTR_STD_MASK: usize = 0;
const ATTR_EXT_MASK: usize = 4;
const ATTR_STD_VAL: usize = 8;
const ATTR_EXT_VAL: usize = ATTR_STD_VAL + 4 * ZIO_MAX_STD_ATTR;

const _: () = assert!(TLV + TLV_SIZE == ZIO_CONTROL_SIZE);

/// Decodes a control read from the local kernel.
///
/// Only the first [`ZIO_CONTROL_SIZE`] bytes are looked at; a longer
/// buffer is fine, a shorter one is a format error.
pub fn decode(bytes: &[u8]) -> Result<ControlBlock> {
    decode_with::<NativeEndian>(bytes)
}

/// Encodes a control for the local kernel.
pub fn encode(ctrl: &ControlBlock) -> Result<[u8; ZIO_CONTROL_SIZE]> {
    encode_with::<NativeEndian>(ctrl)
}

/// Like [`decode`], for dumps taken on a host of byte order `B`.
pub fn decode_with<B: ByteOrder>(bytes: &[u8]) -> Result<ControlBlock> {
    if bytes.len() < ZIO_CONTROL_SIZE {
        return Err(ZioError::ShortBuffer {
            got: bytes.len(),
            need: ZIO_CONTROL_SIZE,
        });
    }
    let buf = &bytes[..ZIO_CONTROL_SIZE];

    let mut hostid = [0; 8];
    hostid.copy_from_slice(&buf[ADDR_HOSTID..ADDR_HOSTID + 8]);
    let mut tlv = [0; TLV_SIZE];
    tlv.copy_from_slice(&buf[TLV..TLV + TLV_SIZE]);

    Ok(ControlBlock {
        major_version: buf[MAJOR_VERSION],
        minor_version: buf[MINOR_VERSION],
        alarms_zio: buf[ALARMS_ZIO],
        alarms_dev: buf[ALARMS_DEV],
        seq_num: B::read_u32(&buf[SEQ_NUM..]),
        nsamples: B::read_u32(&buf[NSAMPLES..]),
        ssize: B::read_u16(&buf[SSIZE..]),
        nbits: B::read_u16(&buf[NBITS..]),
        addr: Address {
            sa_family: B::read_u16(&buf[ADDR_SA_FAMILY..]),
            host_type: buf[ADDR_HOST_TYPE],
            hostid,
            dev_id: B::read_u32(&buf[ADDR_DEV_ID..]),
            cset_i: B::read_u16(&buf[ADDR_CSET..]),
            chan_i: B::read_u16(&buf[ADDR_CHAN..]),
            devname: decode_name(&buf[ADDR_DEVNAME..ADDR_DEVNAME + ZIO_OBJ_NAME_LEN]),
        },
        tstamp: Timestamp {
            secs: B::read_u64(&buf[TSTAMP_SECS..]),
            ticks: B::read_u64(&buf[TSTAMP_TICKS..]),
            bins: B::read_u64(&buf[TSTAMP_BINS..]),
        },
        mem_offset: B::read_u32(&buf[MEM_OFFSET..]),
        reserved: B::read_u32(&buf[RESERVED..]),
        flags: B::read_u32(&buf[FLAGS..]),
        triggername: decode_name(&buf[TRIGGERNAME..TRIGGERNAME + ZIO_OBJ_NAME_LEN]),
        attr_channel: decode_attr::<B>(&buf[ATTR_CHANNEL..ATTR_CHANNEL + CTRL_ATTR_SIZE]),
        attr_trigger: decode_attr::<B>(&buf[ATTR_TRIGGER..ATTR_TRIGGER + CTRL_ATTR_SIZE]),
        tlv,
    })
}

/// Like [`encode`], producing byte order `B`.
pub fn encode_with<B: ByteOrder>(ctrl: &ControlBlock) -> Result<[u8; ZIO_CONTROL_SIZE]> {
    let mut buf = [0u8; ZIO_CONTROL_SIZE];

    encode_name(
        "devname",
        &ctrl.addr.devname,
        &mut buf[ADDR_DEVNAME..ADDR_DEVNAME + ZIO_OBJ_NAME_LEN],
    )?;
    encode_name(
        "triggername",
        &ctrl.triggername,
        &mut buf[TRIGGERNAME..TRIGGERNAME + ZIO_OBJ_NAME_LEN],
    )?;

    buf[MAJOR_VERSION] = ctrl.major_version;
    buf[MINOR_VERSION] = ctrl.minor_version;
    buf[ALARMS_ZIO] = ctrl.alarms_zio;
    buf[ALARMS_DEV] = ctrl.alarms_dev;
    B::write_u32(&mut buf[SEQ_NUM..], ctrl.seq_num);
    B::write_u32(&mut buf[NSAMPLES..], ctrl.nsamples);
    B::write_u16(&mut buf[SSIZE..], ctrl.ssize);
    B::write_u16(&mut buf[NBITS..], ctrl.nbits);

    B::write_u16(&mut buf[ADDR_SA_FAMILY..], ctrl.addr.sa_family);
    buf[ADDR_HOST_TYPE] = ctrl.addr.host_type;
    buf[ADDR_HOSTID..ADDR_HOSTID + 8].copy_from_slice(&ctrl.addr.hostid);
    B::write_u32(&mut buf[ADDR_DEV_ID..], ctrl.addr.dev_id);
    B::write_u16(&mut buf[ADDR_CSET..], ctrl.addr.cset_i);
    B::write_u16(&mut buf[ADDR_CHAN..], ctrl.addr.chan_i);

    B::write_u64(&mut buf[TSTAMP_SECS..], ctrl.tstamp.secs);
    B::write_u64(&mut buf[TSTAMP_TICKS..], ctrl.tstamp.ticks);
    B::write_u64(&mut buf[TSTAMP_BINS..], ctrl.tstamp.bins);

    B::write_u32(&mut buf[MEM_OFFSET..], ctrl.mem_offset);
    B::write_u32(&mut buf[RESERVED..], ctrl.reserved);
    B::write_u32(&mut buf[FLAGS..], ctrl.flags);

    encode_attr::<B>(
        &ctrl.attr_channel,
        &mut buf[ATTR_CHANNEL..ATTR_CHANNEL + CTRL_ATTR_SIZE],
    );
    encode_attr::<B>(
        &ctrl.attr_trigger,
        &mut buf[ATTR_TRIGGER..ATTR_TRIGGER + CTRL_ATTR_SIZE],
    );
    buf[TLV..TLV + TLV_SIZE].copy_from_slice(&ctrl.tlv);

    Ok(buf)
}

fn decode_attr<B: ByteOrder>(buf: &[u8]) -> CtrlAttr {
    let std_mask = u32::from(B::read_u16(&buf[ATTR_STD_MASK..]));
    let ext_mask = B::read_u32(&buf[ATTR_EXT_MASK..]);
    let mut std_val = [0u32; ZIO_MAX_STD_ATTR];
    let mut ext_val = [0u32; ZIO_MAX_EXT_ATTR];
    B::read_u32_into(&buf[ATTR_STD_VAL..ATTR_EXT_VAL], &mut std_val);
    B::read_u32_into(&buf[ATTR_EXT_VAL..CTRL_ATTR_SIZE], &mut ext_val);

    let mut attr = CtrlAttr::default();
    attr.std.set_values(std_mask, &std_val);
    attr.ext.set_values(ext_mask, &ext_val);
    attr
}

fn encode_attr<B: ByteOrder>(attr: &CtrlAttr, buf: &mut [u8]) {
    // std mask never has bits past slot 15, so it fits the u16 field
    B::write_u16(&mut buf[ATTR_STD_MASK..], attr.std.mask() as u16);
    B::write_u32(&mut buf[ATTR_EXT_MASK..], attr.ext.mask());
    B::write_u32_into(attr.std.values(), &mut buf[ATTR_STD_VAL..ATTR_EXT_VAL]);
    B::write_u32_into(attr.ext.values(), &mut buf[ATTR_EXT_VAL..CTRL_ATTR_SIZE]);
}

/// Reads a name up to its NUL, dropping trailing space padding. Bytes
/// that are not UTF-8 become `?` one for one, so the name still fits its
/// field when encoded again.
fn decode_name(raw: &[u8]) -> String {
    let end = raw.iter().position(|&b| b == 0).unwrap_or(raw.len());
    let mut name = String::with_capacity(end);
    for chunk in raw[..end].utf8_chunks() {
        name.push_str(chunk.valid());
        name.extend(chunk.invalid().iter().map(|_| '?'));
    }
    name.truncate(name.trim_end_matches(' ').len());
    name
}

fn encode_name(field: &'static str, name: &str, dst: &mut [u8]) -> Result<()> {
    let bytes = name.as_bytes();
    if bytes.len() > dst.len() {
        return Err(ZioError::FieldTooLong {
            field,
            len: bytes.len(),
            max: dst.len(),
        });
    }
    if bytes.contains(&0) {
        return Err(ZioError::EmbeddedNul { field });
    }
    if bytes.last() == Some(&b' ') {
        return Err(ZioError::TrailingSpace { field });
    }
    dst[..bytes.len()].copy_from_slice(bytes);
    dst[bytes.len()..].fill(0);
    Ok(())
}
