use crate::control::ControlBlock;
use crate::device::read_block;
use crate::error::{Result, ZioError};
use crossbeam_channel::{never, select, tick, unbounded, Receiver};
use log::{debug, info, warn};
use std::{
    collections::VecDeque,
    fs::File,
    path::PathBuf,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

/// Block statistics, all-time and over a sliding 1 s window.
#[derive(Debug)]
pub struct BlockCounter {
    /// All-time number of blocks
    pub n_blocks: usize,
    /// Blocks missing according to sequence numbers
    pub lost: u64,
    /// Time when this counter was created
    pub t_begin: Instant,
    last_seq: Option<u32>,

    // --- sliding window fields ---
    window: Duration,
    events: VecDeque<Instant>,
}

impl Default for BlockCounter {
    fn default() -> Self {
        Self {
            n_blocks: 0,
            lost: 0,
            t_begin: Instant::now(),
            last_seq: None,
            window: Duration::from_secs(1),
            events: VecDeque::new(),
        }
    }
}

impl BlockCounter {
    pub fn new() -> Self {
        Default::default()
    }

    /// Counter whose rate is taken over `window` instead of 1 s.
    pub fn with_window(window: Duration) -> Self {
        Self {
            window,
            ..Default::default()
        }
    }

    /// Records a block; returns how many blocks went missing before it.
    pub fn increment(&mut self, seq_num: u32) -> u32 {
        let now = Instant::now();
        self.n_blocks += 1;

        let mut gap = 0;
        if let Some(last) = self.last_seq {
            let expected = last.wrapping_add(1);
            let ahead = seq_num.wrapping_sub(expected);
            if ahead < u32::MAX / 2 {
                gap = ahead;
                self.lost += u64::from(ahead);
            } else {
                warn!("sequence number went back from {last} to {seq_num}");
            }
        }
        self.last_seq = Some(seq_num);

        self.events.push_back(now);
        while let Some(&ts) = self.events.front() {
            if now.duration_since(ts) > self.window {
                self.events.pop_front();
            } else {
                break;
            }
        }
        gap
    }

    /// Blocks per second over the window ending now; drops to 0 once
    /// blocks stop arriving.
    pub fn rate(&self) -> f64 {
        let now = Instant::now();
        let recent = self
            .events
            .iter()
            .rev()
            .take_while(|&&ts| now.duration_since(ts) <= self.window)
            .count();
        recent as f64 / self.window.as_secs_f64().max(1e-6)
    }
}

/// Follows a control device, decoding every block it hands out.
#[derive(Clone, Debug)]
pub struct Monitor {
    pub path: PathBuf,
    pub max_blocks: Option<usize>,
    pub duration: Option<Duration>,
}

impl Monitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_blocks: None,
            duration: None,
        }
    }

    /// Runs until the block limit, the time limit, or the end of the
    /// source. `on_block` sees every block together with the updated
    /// counter.
    ///
    /// Stopping on a limit cannot interrupt a read already blocked on a
    /// character device. The reader thread then keeps its file open until
    /// the device hands out one more block, and exits without reporting it.
    pub fn run<F>(&self, mut on_block: F) -> Result<BlockCounter>
    where
        F: FnMut(&ControlBlock, &BlockCounter),
    {
        let shutdown = Arc::new(AtomicBool::new(false));
        let (rx, reader) = self.spawn_reader(Arc::clone(&shutdown))?;
        let ticker = tick(Duration::from_secs(1));
        let deadline = match self.duration {
            Some(d) => crossbeam_channel::after(d),
            None => never::<Instant>(),
        };

        let mut counter = BlockCounter::new();
        // set once the reader has stopped on its own
        let mut reader_done = false;
        let result = 'monitor: loop {
            select! {
                recv(rx) -> msg => match msg {
                    Ok(Ok(ctrl)) => {
                        let gap = counter.increment(ctrl.seq_num);
                        if gap > 0 {
                            warn!("{} block(s) lost before seq {}", gap, ctrl.seq_num);
                        }
                        on_block(&ctrl, &counter);
                        if self.max_blocks.is_some_and(|max| counter.n_blocks >= max) {
                            break 'monitor Ok(());
                        }
                    }
                    Ok(Err(e)) => {
                        reader_done = true;
                        break 'monitor Err(e);
                    }
                    // reader reached the end of the source
                    Err(_) => {
                        reader_done = true;
                        break 'monitor Ok(());
                    }
                },
                recv(ticker) -> _ => {
                    info!(
                        "Time (s): {}\tBlocks: {}\tLost: {}\tRate (blocks/s): {:.1}",
                        counter.t_begin.elapsed().as_secs(),
                        counter.n_blocks,
                        counter.lost,
                        counter.rate()
                    );
                }
                recv(deadline) -> _ => break 'monitor Ok(()),
            }
        };

        shutdown.store(true, Ordering::SeqCst);
        drop(rx);
        if reader_done || reader.is_finished() {
            if reader.join().is_err() {
                warn!("{}: reader thread panicked", self.path.display());
            }
        } else {
            debug!("{}: reader still waiting for a block", self.path.display());
        }
        result.map(|_| counter)
    }

    fn spawn_reader(
        &self,
        shutdown: Arc<AtomicBool>,
    ) -> Result<(Receiver<Result<ControlBlock>>, JoinHandle<()>)> {
        let path = self.path.clone();
        let mut file = File::open(&path).map_err(|e| ZioError::io(&path, e))?;
        let (tx, rx) = unbounded();

        let handle = thread::spawn(move || {
            while !shutdown.load(Ordering::SeqCst) {
                let msg = match read_block(&mut file, &path) {
                    Err(ZioError::ShortBuffer { got: 0, .. }) => break,
                    other => other,
                };
                let failed = msg.is_err();
                if tx.send(msg).is_err() || failed {
                    break;
                }
            }
        });
        Ok((rx, handle))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use std::io::Write;

    fn block(seq_num: u32) -> Vec<u8> {
        let ctrl = ControlBlock {
            seq_num,
            ..Default::default()
        };
        codec::encode(&ctrl).unwrap().to_vec()
    }

    #[test]
    fn counter_tracks_gaps() {
        let mut counter = BlockCounter::new();
        assert_eq!(counter.increment(10), 0);
        assert_eq!(counter.increment(11), 0);
        assert_eq!(counter.increment(14), 2);
        assert_eq!(counter.increment(3), 0);
        assert_eq!(counter.n_blocks, 4);
        assert_eq!(counter.lost, 2);
        assert!(counter.rate() > 0.0);
    }

    #[test]
    fn rate_decays_when_blocks_stop() {
        let mut counter = BlockCounter::with_window(Duration::from_millis(50));
        counter.increment(0);
        counter.increment(1);
        assert!(counter.rate() > 0.0);
        thread::sleep(Duration::from_millis(120));
        assert_eq!(counter.rate(), 0.0);
        assert_eq!(counter.n_blocks, 2);
    }

    #[test]
    fn reader_thread_ends_with_the_source() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&block(7)).unwrap();
        file.flush().unwrap();

        let monitor = Monitor::new(file.path());
        let shutdown = Arc::new(AtomicBool::new(false));
        let (rx, reader) = monitor.spawn_reader(shutdown).unwrap();
        let got: Vec<u32> = rx.iter().map(|m| m.unwrap().seq_num).collect();
        assert_eq!(got, vec![7]);
        reader.join().unwrap();
    }

    #[test]
    fn counter_handles_wraparound() {
        let mut counter = BlockCounter::new();
        counter.increment(u32::MAX);
        assert_eq!(counter.increment(0), 0);
        assert_eq!(counter.lost, 0);
    }

    #[test]
    fn monitor_reads_until_end_of_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for seq in [1, 2, 5] {
            file.write_all(&block(seq)).unwrap();
        }
        file.flush().unwrap();

        let mut seen = Vec::new();
        let counter = Monitor::new(file.path())
            .run(|ctrl, _| seen.push(ctrl.seq_num))
            .unwrap();
        assert_eq!(seen, vec![1, 2, 5]);
        assert_eq!(counter.lost, 2);
    }

    #[test]
    fn monitor_stops_at_block_limit() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        for seq in 0..10 {
            file.write_all(&block(seq)).unwrap();
        }
        file.flush().unwrap();

        let mut monitor = Monitor::new(file.path());
        monitor.max_blocks = Some(4);
        let counter = monitor.run(|_, _| {}).unwrap();
        assert_eq!(counter.n_blocks, 4);
    }

    #[test]
    fn trailing_partial_block_is_reported() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&block(1)).unwrap();
        file.write_all(&[0u8; 100]).unwrap();
        file.flush().unwrap();

        let err = Monitor::new(file.path()).run(|_, _| {}).unwrap_err();
        assert!(matches!(err, ZioError::ShortBuffer { got: 100, .. }));
    }
}
