use std::fs;
use std::path::Path;
use zio_ctl::{
    available_triggers, read_control, write_control, AttrOwner, ControlBlock, ControlForm,
    ErrorKind, Session, ZioError, ZIO_ATTR_NBITS, ZIO_ATTR_TRIG_POST_SAMP,
    ZIO_ATTR_TRIG_PRE_SAMP, ZIO_CONTROL_SIZE,
};

const DESCRIPTION: &str = "\
zzero-0000 control description
zzero-0000/cset0/chan0/gain s 1 0644
zzero-0000/cset0/trigger/pre-samples s 1 0644
zzero-0000/cset0/trigger/post-samples s 2 0644
zzero-0000/cset0/chan0/resolution-bits s 0 0444

zzero-0000/cset0/trigger/repeat e 3 0200
";

fn device_block() -> ControlBlock {
    let mut ctrl = ControlBlock {
        major_version: 1,
        minor_version: 3,
        ssize: 2,
        nbits: 16,
        nsamples: 128,
        triggername: "user".into(),
        ..Default::default()
    };
    ctrl.addr.devname = "zzero".into();
    ctrl.addr.dev_id = 0x0100;
    ctrl.attr_channel.std.set(ZIO_ATTR_NBITS, 16);
    ctrl.attr_trigger.std.set(ZIO_ATTR_TRIG_PRE_SAMP, 100);
    ctrl.attr_trigger.std.set(ZIO_ATTR_TRIG_POST_SAMP, 28);
    ctrl.attr_trigger.ext.set(3, 7);
    ctrl
}

fn fake_device(dir: &Path) -> std::path::PathBuf {
    let control = dir.join("ctrl");
    fs::write(&control, []).unwrap();
    write_control(&control, &device_block()).unwrap();
    fs::write(dir.join("control-description"), DESCRIPTION).unwrap();
    control
}

#[test]
fn written_block_reads_back() {
    let dir = tempfile::tempdir().unwrap();
    let control = fake_device(dir.path());

    assert_eq!(fs::metadata(&control).unwrap().len(), ZIO_CONTROL_SIZE as u64);
    assert_eq!(read_control(&control).unwrap(), device_block());
}

#[test]
fn session_labels_slots_from_description() {
    let dir = tempfile::tempdir().unwrap();
    let control = fake_device(dir.path());
    let session = Session::open(&control, Some(dir.path().to_path_buf())).unwrap();

    let desc = session.description();
    assert_eq!(desc.len(), 5);
    assert_eq!(desc.label(AttrOwner::Trigger, true, 3), "repeat");
    assert_eq!(desc.label(AttrOwner::Channel, false, 0), "resolution-bits");
    assert_eq!(desc.label(AttrOwner::Trigger, false, 0), "nshots");
    assert_eq!(desc.label(AttrOwner::Channel, true, 9), "Attribute 9");

    let repeat = desc.find(AttrOwner::Trigger, true, 3).unwrap();
    assert!(repeat.is_writable);
    assert!(!repeat.is_readable);
}

#[test]
fn edited_form_is_applied_to_device() {
    let dir = tempfile::tempdir().unwrap();
    let control = fake_device(dir.path());
    let session = Session::open(&control, None).unwrap();

    let current = session.read().unwrap();
    let mut form = ControlForm::from_block(&current);
    form.set("trigger.std.1", "200").unwrap();
    form.set("triggername", "timer").unwrap();
    assert_eq!(form.get("nsamples"), Some("228"));

    let now = session.apply(&form.apply(&current)).unwrap();
    assert_eq!(now.nsamples, 228);
    assert_eq!(now.triggername, "timer");
    assert_eq!(now.attr_trigger.std.get(ZIO_ATTR_TRIG_PRE_SAMP), Some(200));
    assert_eq!(now.attr_trigger.ext.get(3), Some(7));
}

#[test]
fn rejected_control_is_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let control = fake_device(dir.path());
    let session = Session::open(&control, None).unwrap();

    let mut ctrl = session.read().unwrap();
    ctrl.ssize = 4;
    let err = session.apply(&ctrl).unwrap_err();
    assert!(matches!(err, ZioError::Rejected(_)));
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(session.read().unwrap(), device_block());
}

#[test]
fn retarget_drops_old_description() {
    let dir = tempfile::tempdir().unwrap();
    let control = fake_device(dir.path());
    let mut session = Session::open(&control, Some(dir.path().to_path_buf())).unwrap();
    assert!(!session.description().is_empty());

    session.retarget(control.clone(), None).unwrap();
    assert!(session.description().is_empty());
    assert!(session.sysfs_dir().is_none());
}

#[test]
fn missing_description_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let control = dir.path().join("ctrl");
    fs::write(&control, []).unwrap();

    let err = Session::open(&control, Some(dir.path().to_path_buf())).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
}

#[test]
fn trigger_list_skips_blank_lines() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("available_triggers");
    fs::write(&path, "user\ntimer\n\n  hrt  \n").unwrap();

    assert_eq!(available_triggers(&path).unwrap(), ["user", "timer", "hrt"]);
}
