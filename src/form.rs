//! Text-field view of a [`ControlBlock`], for anything that lets a user
//! edit a control by hand (the CLI `set` command, a GUI, a test).
//!
//! Fields are addressed by dotted names such as `flags`, `addr.devname`,
//! `channel.std_mask` or `trigger.ext.3`. Alarms, flags, masks and the
//! version slot are hex text; everything else is decimal.

use crate::attr::{
    AttrOwner, AttributeSet, CtrlAttr, ZIO_ATTR_NBITS, ZIO_ATTR_TRIG_POST_SAMP,
    ZIO_ATTR_TRIG_PRE_SAMP, ZIO_ATTR_VERSION, ZIO_MAX_EXT_ATTR, ZIO_MAX_STD_ATTR,
};
use crate::control::ControlBlock;
use crate::error::{Result, ZioError};
use crate::text::{format_hex, is_digits, lenient_dec, lenient_hex, lenient_int};
use log::debug;
use std::collections::BTreeMap;

const HOSTID: &str = "addr.hostid";

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ControlForm {
    fields: BTreeMap<String, String>,
}

fn prefix(owner: AttrOwner) -> &'static str {
    match owner {
        AttrOwner::Channel => "channel",
        AttrOwner::Trigger => "trigger",
    }
}

fn slot_key(owner: AttrOwner, extended: bool, index: usize) -> String {
    let kind = if extended { "ext" } else { "std" };
    format!("{}.{kind}.{index}", prefix(owner))
}

fn mask_key(owner: AttrOwner, extended: bool) -> String {
    let kind = if extended { "ext_mask" } else { "std_mask" };
    format!("{}.{kind}", prefix(owner))
}

fn slot_text<const N: usize>(set: &AttributeSet<N>, extended: bool, index: usize) -> String {
    match set.get(index) {
        Some(v) if !extended && index == ZIO_ATTR_VERSION => format_hex(v),
        Some(v) => v.to_string(),
        None => String::new(),
    }
}

fn slot_value(text: &str, extended: bool, index: usize) -> u32 {
    if !extended && index == ZIO_ATTR_VERSION {
        lenient_hex(text)
    } else {
        lenient_int(text)
    }
}

impl ControlForm {
    pub fn from_block(ctrl: &ControlBlock) -> Self {
        let mut fields = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            fields.insert(key.to_string(), value);
        };

        put("major_version", ctrl.major_version.to_string());
        put("minor_version", ctrl.minor_version.to_string());
        put("seq_num", ctrl.seq_num.to_string());
        put("ssize", ctrl.ssize.to_string());
        put("nbits", ctrl.nbits.to_string());
        put("nsamples", ctrl.nsamples.to_string());
        put("alarms_zio", format_hex(ctrl.alarms_zio.into()));
        put("alarms_dev", format_hex(ctrl.alarms_dev.into()));
        put("flags", format_hex(ctrl.flags));

        put("addr.host_type", ctrl.addr.host_type.to_string());
        put(
            HOSTID,
            ctrl.addr.hostid.iter().map(|b| format!("{b:02x}")).collect(),
        );
        put("addr.dev_id", ctrl.addr.dev_id.to_string());
        put("addr.cset_i", ctrl.addr.cset_i.to_string());
        put("addr.chan_i", ctrl.addr.chan_i.to_string());
        put("addr.devname", ctrl.addr.devname.clone());

        put("tstamp.secs", ctrl.tstamp.secs.to_string());
        put("tstamp.ticks", ctrl.tstamp.ticks.to_string());
        put("tstamp.bins", ctrl.tstamp.bins.to_string());

        put("triggername", ctrl.triggername.clone());

        let mut form = Self { fields };
        form.put_attrs(AttrOwner::Channel, &ctrl.attr_channel);
        form.put_attrs(AttrOwner::Trigger, &ctrl.attr_trigger);
        form
    }

    fn put_attrs(&mut self, owner: AttrOwner, attrs: &CtrlAttr) {
        self.fields
            .insert(mask_key(owner, false), format_hex(attrs.std.mask()));
        self.fields
            .insert(mask_key(owner, true), format_hex(attrs.ext.mask()));
        for i in 0..ZIO_MAX_STD_ATTR {
            self.fields
                .insert(slot_key(owner, false, i), slot_text(&attrs.std, false, i));
        }
        for i in 0..ZIO_MAX_EXT_ATTR {
            self.fields
                .insert(slot_key(owner, true, i), slot_text(&attrs.ext, true, i));
        }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Edits one field and applies the cross-field rules: nsamples follows
    /// trigger pre/post samples, nbits follows the channel nbits slot, and
    /// a mask edit blanks the slots it disables.
    pub fn set(&mut self, name: &str, value: &str) -> Result<()> {
        if name == HOSTID {
            return Err(ZioError::ReadOnly(HOSTID));
        }
        let slot = self
            .fields
            .get_mut(name)
            .ok_or_else(|| ZioError::UnknownField(name.to_string()))?;
        *slot = value.to_string();
        debug!("form field {name} = {value:?}");

        for owner in [AttrOwner::Channel, AttrOwner::Trigger] {
            for extended in [false, true] {
                if name == mask_key(owner, extended) {
                    self.mask_edited(owner, extended);
                }
            }
        }
        if name == slot_key(AttrOwner::Trigger, false, ZIO_ATTR_TRIG_PRE_SAMP)
            || name == slot_key(AttrOwner::Trigger, false, ZIO_ATTR_TRIG_POST_SAMP)
        {
            self.update_nsamples();
        }
        if name == slot_key(AttrOwner::Channel, false, ZIO_ATTR_NBITS) {
            self.update_nbits();
        }
        Ok(())
    }

    fn text(&self, name: &str) -> &str {
        self.get(name).unwrap_or("")
    }

    fn mask_edited(&mut self, owner: AttrOwner, extended: bool) {
        let mask = lenient_hex(self.text(&mask_key(owner, extended)));
        let slots = if extended {
            ZIO_MAX_EXT_ATTR
        } else {
            ZIO_MAX_STD_ATTR
        };
        debug!(
            "{} {} mask now {:#x}",
            prefix(owner),
            if extended { "extended" } else { "standard" },
            mask
        );
        for i in (0..slots).filter(|&i| mask & (1 << i) == 0) {
            self.fields.insert(slot_key(owner, extended, i), String::new());
        }
    }

    /// nsamples = pre-samples + post-samples; non-numeric text counts as 0.
    pub fn update_nsamples(&mut self) {
        let pre: u32 = lenient_dec(self.text(&slot_key(
            AttrOwner::Trigger,
            false,
            ZIO_ATTR_TRIG_PRE_SAMP,
        )));
        let post: u32 = lenient_dec(self.text(&slot_key(
            AttrOwner::Trigger,
            false,
            ZIO_ATTR_TRIG_POST_SAMP,
        )));
        self.fields
            .insert("nsamples".into(), pre.wrapping_add(post).to_string());
    }

    /// nbits mirrors the channel nbits slot, or goes blank when the slot
    /// is not a number that fits the 16-bit nbits field.
    pub fn update_nbits(&mut self) {
        let nbit = self
            .text(&slot_key(AttrOwner::Channel, false, ZIO_ATTR_NBITS))
            .trim();
        let mirrored = if is_digits(nbit) {
            nbit.parse::<u16>().map(|n| n.to_string()).unwrap_or_default()
        } else {
            String::new()
        };
        self.fields.insert("nbits".into(), mirrored);
    }

    /// Builds the control described by the form on top of `base`.
    /// Non-numeric text becomes 0 and names lose trailing blanks. The host
    /// id always comes from `base`.
    pub fn apply(&self, base: &ControlBlock) -> ControlBlock {
        let mut ctrl = base.clone();

        ctrl.major_version = lenient_dec(self.text("major_version"));
        ctrl.minor_version = lenient_dec(self.text("minor_version"));
        ctrl.seq_num = lenient_dec(self.text("seq_num"));
        ctrl.ssize = lenient_dec(self.text("ssize"));
        ctrl.nbits = lenient_dec(self.text("nbits"));
        ctrl.nsamples = lenient_dec(self.text("nsamples"));
        ctrl.alarms_zio = u8::try_from(lenient_hex(self.text("alarms_zio"))).unwrap_or(0);
        ctrl.alarms_dev = u8::try_from(lenient_hex(self.text("alarms_dev"))).unwrap_or(0);
        ctrl.flags = lenient_hex(self.text("flags"));

        ctrl.addr.host_type = lenient_dec(self.text("addr.host_type"));
        ctrl.addr.dev_id = lenient_dec(self.text("addr.dev_id"));
        ctrl.addr.cset_i = lenient_dec(self.text("addr.cset_i"));
        ctrl.addr.chan_i = lenient_dec(self.text("addr.chan_i"));
        ctrl.addr.devname = self.text("addr.devname").trim_end().to_string();

        ctrl.tstamp.secs = lenient_dec(self.text("tstamp.secs"));
        ctrl.tstamp.ticks = lenient_dec(self.text("tstamp.ticks"));
        ctrl.tstamp.bins = lenient_dec(self.text("tstamp.bins"));

        ctrl.triggername = self.text("triggername").trim_end().to_string();

        ctrl.attr_channel = self.attrs(AttrOwner::Channel);
        ctrl.attr_trigger = self.attrs(AttrOwner::Trigger);
        ctrl
    }

    fn attrs(&self, owner: AttrOwner) -> CtrlAttr {
        let std_mask = lenient_hex(self.text(&mask_key(owner, false)));
        let ext_mask = lenient_hex(self.text(&mask_key(owner, true)));
        let std: Vec<u32> = (0..ZIO_MAX_STD_ATTR)
            .map(|i| slot_value(self.text(&slot_key(owner, false, i)), false, i))
            .collect();
        let ext: Vec<u32> = (0..ZIO_MAX_EXT_ATTR)
            .map(|i| slot_value(self.text(&slot_key(owner, true, i)), true, i))
            .collect();

        let mut attrs = CtrlAttr::default();
        attrs.std.set_values(std_mask, &std);
        attrs.ext.set_values(ext_mask, &ext);
        attrs
    }
}
