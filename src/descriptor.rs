use crate::attr::AttrOwner;
use crate::error::{Result, ZioError};
use std::str::FromStr;

const S_IWUGO: u32 = 0o222;
const S_IRUGO: u32 = 0o444;

/// One line of a device's `control-description` file:
/// `fullpath type_flag index mode_bits`.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AttributeDescriptor {
    pub fullpath: String,
    pub name: String,
    pub path: String,
    pub is_extended: bool,
    pub index: usize,
    pub is_writable: bool,
    pub is_readable: bool,
}

impl AttributeDescriptor {
    pub fn parse_line(line: &str) -> Result<Self> {
        let bad = |reason| ZioError::Descriptor {
            line: line.to_string(),
            reason,
        };
        let mut fields = line.split_whitespace();
        let (Some(fullpath), Some(kind), Some(index), Some(mode)) =
            (fields.next(), fields.next(), fields.next(), fields.next())
        else {
            return Err(bad("expected 4 fields"));
        };
        let index = index.parse().map_err(|_| bad("index is not a number"))?;
        // mode is written in decimal digits and masked as-is
        let mode: u32 = mode.parse().map_err(|_| bad("mode is not a number"))?;

        let (path, name) = match fullpath.rfind('/') {
            Some(pos) => fullpath.split_at(pos + 1),
            None => ("", fullpath),
        };

        Ok(Self {
            fullpath: fullpath.to_string(),
            name: name.to_string(),
            path: path.to_string(),
            is_extended: kind == "e",
            index,
            is_writable: mode & S_IWUGO != 0,
            is_readable: mode & S_IRUGO != 0,
        })
    }

    /// Trigger attributes live below a `trigger` directory.
    pub fn owner(&self) -> AttrOwner {
        if self.fullpath.contains("trigger") {
            AttrOwner::Trigger
        } else {
            AttrOwner::Channel
        }
    }
}

impl FromStr for AttributeDescriptor {
    type Err = ZioError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_line(s)
    }
}

/// All descriptors of the currently addressed device.
#[derive(Clone, Debug, Default)]
pub struct ControlDescription {
    attrs: Vec<AttributeDescriptor>,
}

impl ControlDescription {
    /// Parses a whole `control-description` file. The first line is a
    /// header and blank lines are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let attrs = text
            .lines()
            .skip(1)
            .filter(|l| !l.trim().is_empty())
            .map(AttributeDescriptor::parse_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { attrs })
    }

    pub fn attrs(&self) -> &[AttributeDescriptor] {
        &self.attrs
    }

    pub fn len(&self) -> usize {
        self.attrs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attrs.is_empty()
    }

    pub fn find(&self, owner: AttrOwner, is_extended: bool, index: usize) -> Option<&AttributeDescriptor> {
        self.attrs
            .iter()
            .find(|a| a.is_extended == is_extended && a.index == index && a.owner() == owner)
    }

    /// Name to show next to a slot: the device's description first, then
    /// the built-in standard names, then a generic label.
    pub fn label(&self, owner: AttrOwner, is_extended: bool, index: usize) -> String {
        if let Some(desc) = self.find(owner, is_extended, index) {
            return desc.name.clone();
        }
        match (is_extended, owner.std_name(index)) {
            (false, Some(name)) => name.to_string(),
            _ => format!("Attribute {index}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn parse_extended_trigger_attr() {
        let desc = AttributeDescriptor::parse_line("gpio/trigger/foo e 3 0644").unwrap();
        assert_eq!(desc.fullpath, "gpio/trigger/foo");
        assert_eq!(desc.name, "foo");
        assert_eq!(desc.path, "gpio/trigger/");
        assert!(desc.is_extended);
        assert_eq!(desc.index, 3);
        assert!(desc.is_writable);
        assert!(desc.is_readable);
        assert_eq!(desc.owner(), AttrOwner::Trigger);
    }

    #[test]
    fn permissions() {
        // 292 == 0o444, 146 == 0o222
        let ro = AttributeDescriptor::parse_line("adc/cset0/gain s 1 292").unwrap();
        assert!(ro.is_readable && !ro.is_writable);
        assert!(!ro.is_extended);
        let wo = AttributeDescriptor::parse_line("adc/cset0/gain s 1 146").unwrap();
        assert!(wo.is_writable && !wo.is_readable);
        let none: AttributeDescriptor = "adc/x s 0 0".parse().unwrap();
        assert!(!none.is_writable && !none.is_readable);
    }

    #[test]
    fn name_without_path() {
        let desc = AttributeDescriptor::parse_line("flat e 0 420").unwrap();
        assert_eq!(desc.name, "flat");
        assert_eq!(desc.path, "");
        assert_eq!(desc.owner(), AttrOwner::Channel);
    }

    #[test]
    fn bad_lines() {
        for line in ["a e 3", "a e x 644", "a e 3 rw", "a e -1 644", ""] {
            let err = AttributeDescriptor::parse_line(line).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Format, "{line:?}");
        }
    }

    #[test]
    fn header_is_skipped_and_labels_resolve() {
        let text = "3\n\
                    zzero/cset0/offset-ext e 0 420\n\
                    zzero/cset0/trigger/period e 0 420\n\
                    \n\
                    zzero/cset0/trigger/delay e 5 292\n";
        let cd = ControlDescription::parse(text).unwrap();
        assert_eq!(cd.len(), 3);
        assert_eq!(cd.label(AttrOwner::Channel, true, 0), "offset-ext");
        assert_eq!(cd.label(AttrOwner::Trigger, true, 0), "period");
        assert_eq!(cd.label(AttrOwner::Trigger, true, 5), "delay");
        assert_eq!(cd.label(AttrOwner::Trigger, true, 6), "Attribute 6");
        assert_eq!(cd.label(AttrOwner::Trigger, false, 2), "post-samples");
    }

    #[test]
    fn header_only() {
        assert!(ControlDescription::parse("0\n").unwrap().is_empty());
        assert!(ControlDescription::parse("").unwrap().is_empty());
    }

    #[test]
    fn one_bad_line_fails_the_file() {
        assert!(ControlDescription::parse("1\nbroken line\n").is_err());
    }
}
