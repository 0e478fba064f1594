use confique::Config;
use log::LevelFilter;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Config, Debug, Clone)]
pub struct Conf {
    #[config(nested)]
    pub device: DeviceSettings,
    #[config(nested)]
    pub log: LogSettings,
}

#[derive(Config, Debug, Clone)]
pub struct DeviceSettings {
    /// Control file used when none is given on the command line.
    #[config(env = "ZIO_CTL_CONTROL")]
    pub control: Option<PathBuf>,
    /// sysfs directory of the device; its control-description names the
    /// extended attributes.
    #[config(env = "ZIO_CTL_SYSFS_DIR")]
    pub sysfs_dir: Option<PathBuf>,
    #[config(default = "/sys/bus/zio/available_triggers")]
    pub available_triggers: PathBuf,
    /// Refuse to write a control the device would reject.
    #[config(default = true)]
    pub check_before_write: bool,
}

#[derive(Config, Debug, Clone)]
pub struct LogSettings {
    #[config(default = "info")]
    pub level: LogLevel,
    /// Also log to this file.
    pub file: Option<PathBuf>,
}

#[derive(Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl Conf {
    /// Environment first, then the file; a missing file leaves defaults.
    pub fn load(path: &Path) -> Result<Self, confique::Error> {
        Conf::builder().env().file(path).load()
    }

    pub fn template() -> String {
        confique::toml::template::<Conf>(confique::toml::FormatOptions::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_without_file() {
        let conf = Conf::builder().load().unwrap();
        assert_eq!(
            conf.device.available_triggers,
            PathBuf::from("/sys/bus/zio/available_triggers")
        );
        assert!(conf.device.check_before_write);
        assert_eq!(conf.log.level, LogLevel::Info);
        assert!(conf.device.control.is_none());
    }

    #[test]
    fn file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[device]\ncontrol = \"/dev/zio/zzero-0000-0-0-ctrl\"\ncheck_before_write = false\n\n[log]\nlevel = \"debug\""
        )
        .unwrap();
        file.flush().unwrap();

        let conf = Conf::builder().file(file.path()).load().unwrap();
        assert_eq!(
            conf.device.control.as_deref(),
            Some(Path::new("/dev/zio/zzero-0000-0-0-ctrl"))
        );
        assert!(!conf.device.check_before_write);
        assert_eq!(LevelFilter::from(conf.log.level), LevelFilter::Debug);
    }

    #[test]
    fn template_mentions_sections() {
        let text = Conf::template();
        assert!(text.contains("[device]"));
        assert!(text.contains("[log]"));
    }
}
