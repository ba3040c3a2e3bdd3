use std::io;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};
use tokio::sync::watch;

// 每次从文件读取的块大小
const READ_CHUNK: usize = 64 * 1024;

/// 暂停/恢复开关，可以克隆到定时任务里去恢复读取
#[derive(Clone, Debug)]
pub struct PauseHandle {
    inner: Arc<PauseState>,
}

#[derive(Debug)]
struct PauseState {
    paused: watch::Sender<bool>,
    pauses: AtomicU64,
    resumes: AtomicU64,
}

impl PauseHandle {
    fn new() -> Self {
        let (paused, _) = watch::channel(false);
        PauseHandle {
            inner: Arc::new(PauseState {
                paused,
                pauses: AtomicU64::new(0),
                resumes: AtomicU64::new(0),
            }),
        }
    }

    /// 已经暂停时什么也不做
    pub fn pause(&self) {
        let changed = self.inner.paused.send_if_modified(|paused| {
            if *paused {
                false
            } else {
                *paused = true;
                true
            }
        });
        if changed {
            self.inner.pauses.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// 正在运行时什么也不做
    pub fn resume(&self) {
        let changed = self.inner.paused.send_if_modified(|paused| {
            if *paused {
                *paused = false;
                true
            } else {
                false
            }
        });
        if changed {
            self.inner.resumes.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn is_paused(&self) -> bool {
        *self.inner.paused.borrow()
    }

    /// 实际发生的暂停次数
    pub fn pause_count(&self) -> u64 {
        self.inner.pauses.load(Ordering::Relaxed)
    }

    /// 实际发生的恢复次数
    pub fn resume_count(&self) -> u64 {
        self.inner.resumes.load(Ordering::Relaxed)
    }

    pub async fn wait_resumed(&self) {
        let mut rx = self.inner.paused.subscribe();
        // sender 由自己持有，不会提前关闭
        let _ = rx.wait_for(|paused| !*paused).await;
    }
}

/// 逐行读取输入，不会把整个文件读进内存
pub struct LineSource<R> {
    lines: Lines<R>,
    gate: PauseHandle,
}

impl LineSource<BufReader<File>> {
    pub async fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(LineSource::new(BufReader::with_capacity(READ_CHUNK, file)))
    }
}

impl<R: AsyncBufRead + Unpin> LineSource<R> {
    pub fn new(reader: R) -> Self {
        LineSource {
            lines: reader.lines(),
            gate: PauseHandle::new(),
        }
    }

    pub fn pause(&self) {
        self.gate.pause();
    }

    pub fn resume(&self) {
        self.gate.resume();
    }

    pub fn is_paused(&self) -> bool {
        self.gate.is_paused()
    }

    pub fn handle(&self) -> PauseHandle {
        self.gate.clone()
    }

    /// 暂停期间一直等待；读到文件末尾返回 `Ok(None)`
    pub async fn next_line(&mut self) -> io::Result<Option<String>> {
        self.gate.wait_resumed().await;
        self.lines.next_line().await
    }
}
