/// Number of standard attribute slots carried for a channel or a trigger.
pub const ZIO_MAX_STD_ATTR: usize = 16;
/// Number of extended attribute slots carried for a channel or a trigger.
pub const ZIO_MAX_EXT_ATTR: usize = 32;

/// Channel standard attribute slots.
pub const ZIO_ATTR_NBITS: usize = 0;
pub const ZIO_ATTR_GAIN: usize = 1;
pub const ZIO_ATTR_OFFSET: usize = 2;
pub const ZIO_ATTR_MAXRATE: usize = 3;
pub const ZIO_ATTR_VREFTYPE: usize = 4;

/// Trigger standard attribute slots.
pub const ZIO_ATTR_TRIG_N_SHOTS: usize = 0;
pub const ZIO_ATTR_TRIG_PRE_SAMP: usize = 1;
pub const ZIO_ATTR_TRIG_POST_SAMP: usize = 2;

/// Both channels and triggers keep their version in the last standard slot.
/// It is the one standard slot shown in hexadecimal.
pub const ZIO_ATTR_VERSION: usize = ZIO_MAX_STD_ATTR - 1;

/// Which half of the control block an attribute belongs to.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum AttrOwner {
    Channel,
    Trigger,
}

impl AttrOwner {
    /// sysfs name of a standard slot, if the slot is defined for this owner.
    pub fn std_name(self, index: usize) -> Option<&'static str> {
        match (self, index) {
            (Self::Channel, ZIO_ATTR_NBITS) => Some("resolution-bits"),
            (Self::Channel, ZIO_ATTR_GAIN) => Some("gain_factor"),
            (Self::Channel, ZIO_ATTR_OFFSET) => Some("offset"),
            (Self::Channel, ZIO_ATTR_MAXRATE) => Some("max-sample-rate"),
            (Self::Channel, ZIO_ATTR_VREFTYPE) => Some("vref-src"),
            (Self::Trigger, ZIO_ATTR_TRIG_N_SHOTS) => Some("nshots"),
            (Self::Trigger, ZIO_ATTR_TRIG_PRE_SAMP) => Some("pre-samples"),
            (Self::Trigger, ZIO_ATTR_TRIG_POST_SAMP) => Some("post-samples"),
            (_, ZIO_ATTR_VERSION) => Some("version"),
            _ => None,
        }
    }
}

/// A bitmask plus `N` 32-bit attribute values.
///
/// Bit `i` of the mask marks slot `i` as active. A slot whose bit is clear
/// always holds 0, so no stale value survives a mask change.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct AttributeSet<const N: usize> {
    mask: u32,
    values: [u32; N],
}

pub type StdAttrs = AttributeSet<ZIO_MAX_STD_ATTR>;
pub type ExtAttrs = AttributeSet<ZIO_MAX_EXT_ATTR>;

impl<const N: usize> Default for AttributeSet<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> AttributeSet<N> {
    const FITS_MASK: () = assert!(N <= u32::BITS as usize, "one mask bit per slot");

    pub const CAPACITY: usize = N;

    pub fn new() -> Self {
        #[allow(clippy::let_unit_value)]
        let () = Self::FITS_MASK;
        Self {
            mask: 0,
            values: [0; N],
        }
    }

    /// Mask covering every slot of this set.
    pub fn slot_mask() -> u32 {
        if N >= u32::BITS as usize {
            u32::MAX
        } else {
            (1u32 << N) - 1
        }
    }

    pub fn capacity(&self) -> usize {
        N
    }

    pub fn mask(&self) -> u32 {
        self.mask
    }

    pub fn values(&self) -> &[u32; N] {
        &self.values
    }

    pub fn is_enabled(&self, index: usize) -> bool {
        index < N && self.mask & (1 << index) != 0
    }

    /// Value of an active slot.
    pub fn get(&self, index: usize) -> Option<u32> {
        self.is_enabled(index).then(|| self.values[index])
    }

    /// Enables slot `index` and stores `value`. Returns false when the
    /// index is past the capacity.
    pub fn set(&mut self, index: usize, value: u32) -> bool {
        if index >= N {
            return false;
        }
        self.mask |= 1 << index;
        self.values[index] = value;
        true
    }

    /// Disables slot `index`, clearing its value.
    pub fn disable(&mut self, index: usize) {
        if index < N {
            self.mask &= !(1 << index);
            self.values[index] = 0;
        }
    }

    /// Replaces the whole set. Slot `i` is enabled and takes `values[i]`
    /// when bit `i` of `mask` is set and `values` reaches that far;
    /// every other slot is disabled and reset to 0.
    pub fn set_values(&mut self, mask: u32, values: &[u32]) {
        self.mask = 0;
        for i in 0..N {
            match values.get(i) {
                Some(&v) if mask & (1 << i) != 0 => {
                    self.mask |= 1 << i;
                    self.values[i] = v;
                }
                _ => self.values[i] = 0,
            }
        }
    }

    /// Stored value for every slot selected by `mask`, 0 elsewhere.
    /// Always `N` entries.
    pub fn get_values(&self, mask: u32) -> [u32; N] {
        let mut out = [0; N];
        for (i, v) in out.iter_mut().enumerate() {
            if mask & (1 << i) != 0 {
                *v = self.values[i];
            }
        }
        out
    }

    /// Changes only which slots are active. Values of slots that stay
    /// active are kept, values of slots being disabled are cleared.
    pub fn set_disabled_mask(&mut self, mask: u32) {
        self.mask = mask & Self::slot_mask();
        for i in 0..N {
            if self.mask & (1 << i) == 0 {
                self.values[i] = 0;
            }
        }
    }

    pub fn iter_enabled(&self) -> impl Iterator<Item = (usize, u32)> + '_ {
        (0..N).filter_map(move |i| self.get(i).map(|v| (i, v)))
    }
}

/// Standard and extended attributes of a channel or a trigger
/// (`struct zio_ctrl_attr`).
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct CtrlAttr {
    pub std: StdAttrs,
    pub ext: ExtAttrs,
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn set_values_respects_mask_and_length() {
        let mut set = StdAttrs::new();
        set.set_values(0b1011, &[7, 8, 9]);

        assert_eq!(set.mask(), 0b0011);
        assert_eq!(set.get(0), Some(7));
        assert_eq!(set.get(1), Some(8));
        assert_eq!(set.get(2), None);
        assert_eq!(set.get(3), None);
        assert_eq!(set.values()[2], 0);
    }

    #[test]
    fn disabling_clears_value() {
        let mut set = ExtAttrs::new();
        set.set_values(0xff, &[1, 2, 3, 4, 5, 6, 7, 8]);
        set.set_disabled_mask(0xf7);

        assert_eq!(set.get_values(0xf7)[3], 0);
        assert_eq!(set.values()[3], 0);
        assert_eq!(set.get(4), Some(5));

        // Re-enabling does not bring the old value back.
        set.set_disabled_mask(0xff);
        assert_eq!(set.get(3), Some(0));
    }

    #[test]
    fn mask_bits_past_capacity_are_dropped() {
        let mut set = StdAttrs::new();
        set.set_disabled_mask(0xffff_ffff);
        assert_eq!(set.mask(), 0xffff);
        assert!(!set.set(16, 1));
        assert!(!set.is_enabled(31));
    }

    #[test]
    fn full_width_set_uses_every_bit() {
        assert_eq!(ExtAttrs::slot_mask(), u32::MAX);
        let mut set = ExtAttrs::new();
        assert!(set.set(31, 0xdead_beef));
        assert_eq!(set.mask(), 1 << 31);
        assert_eq!(set.iter_enabled().collect::<Vec<_>>(), vec![(31, 0xdead_beef)]);
    }

    #[test]
    fn std_names() {
        assert_eq!(AttrOwner::Channel.std_name(ZIO_ATTR_NBITS), Some("resolution-bits"));
        assert_eq!(AttrOwner::Trigger.std_name(ZIO_ATTR_TRIG_PRE_SAMP), Some("pre-samples"));
        assert_eq!(AttrOwner::Trigger.std_name(15), Some("version"));
        assert_eq!(AttrOwner::Channel.std_name(7), None);
    }

    proptest! {
        #[test]
        fn get_values_matches_input(mask in any::<u32>(), values in prop::collection::vec(any::<u32>(), 0..40)) {
            let mut set = ExtAttrs::new();
            set.set_values(mask, &values);
            let got = set.get_values(mask);
            for (i, v) in got.iter().enumerate() {
                let expected = if mask & (1 << i) != 0 && i < values.len() { values[i] } else { 0 };
                prop_assert_eq!(*v, expected);
            }
        }

        #[test]
        fn disable_mask_clears(mask in any::<u32>(), cleared in 0usize..32) {
            let mut set = ExtAttrs::new();
            set.set_values(mask, &[0xa5; 32]);
            let m2 = mask & !(1 << cleared);
            set.set_disabled_mask(m2);
            prop_assert_eq!(set.get_values(m2)[cleared], 0);
            prop_assert_eq!(set.values()[cleared], 0);
        }
    }
}
