//! Named shared-memory region backing the channel

use std::fs::OpenOptions;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::ptr::NonNull;
use std::sync::atomic::Ordering;

use memmap2::{MmapMut, MmapOptions};
use tracing::{debug, info, instrument};

use super::layout::{ChannelLayout, LAYOUT_SIZE};
use crate::common::errors::ChannelError;
use crate::common::traits::{OrderGateway, QuoteSink};
use crate::common::types::{AccountSnapshot, Command, CommandStatus, Quote};

/// POSIX shared-memory mount on Linux
pub const DEFAULT_SHM_DIR: &str = "/dev/shm";

/// A mapped region holding one [`ChannelLayout`]
///
/// Every accessor is lock-free. Each slot has exactly one writer: the feed
/// writes the quote, the balance sync agent the account, the strategy the
/// command and the simulator the status.
pub struct SharedChannel {
    /// Keeps the mapping alive; never accessed after construction
    _map: MmapMut,
    layout: NonNull<ChannelLayout>,
    path: PathBuf,
    size: usize,
}

// SAFETY: the layout pointer targets the mapping owned by `_map`, which lives
// as long as `self`. All access goes through atomics inside `ChannelLayout`.
unsafe impl Send for SharedChannel {}
unsafe impl Sync for SharedChannel {}

impl std::fmt::Debug for SharedChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedChannel")
            .field("path", &self.path)
            .field("size", &self.size)
            .finish()
    }
}

impl SharedChannel {
    /// Map `name` under `/dev/shm`, creating a zeroed region if absent
    pub fn open_or_create(name: &str, size: usize) -> Result<Self, ChannelError> {
        Self::open_or_create_in(DEFAULT_SHM_DIR, name, size)
    }

    /// Remove any prior `name` under `/dev/shm`, then create it fresh
    pub fn recreate(name: &str, size: usize) -> Result<Self, ChannelError> {
        Self::recreate_in(DEFAULT_SHM_DIR, name, size)
    }

    /// Map `name` under `dir`, creating a zeroed region of `size` bytes if absent
    #[instrument(skip(dir), fields(dir = %dir.as_ref().display()))]
    pub fn open_or_create_in(
        dir: impl AsRef<Path>,
        name: &str,
        size: usize,
    ) -> Result<Self, ChannelError> {
        let path = region_path(dir.as_ref(), name)?;
        if size < LAYOUT_SIZE {
            return Err(ChannelError::RegionTooSmall {
                required: LAYOUT_SIZE,
                actual: size,
            });
        }

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;

        let len = file.metadata()?.len();
        if len == 0 {
            // Extending a fresh file zero-fills it
            file.set_len(size as u64)?;
            debug!("Created shared region {} ({} bytes)", path.display(), size);
        } else if len != size as u64 {
            return Err(ChannelError::SizeMismatch {
                expected: size,
                actual: len,
            });
        }

        // SAFETY: the file stays mapped for the lifetime of the returned
        // value. Concurrent modification by the peer process is confined to
        // the atomic words of `ChannelLayout`.
        let mut map = unsafe { MmapOptions::new().len(size).map_mut(&file)? };
        let layout = NonNull::new(map.as_mut_ptr().cast::<ChannelLayout>())
            .ok_or_else(|| ChannelError::Io(std::io::Error::other("null mapping")))?;

        info!("Mapped shared region {} ({} bytes)", path.display(), size);

        Ok(Self {
            _map: map,
            layout,
            path,
            size,
        })
    }

    /// Remove any prior `name` under `dir`, then create it fresh
    pub fn recreate_in(dir: impl AsRef<Path>, name: &str, size: usize) -> Result<Self, ChannelError> {
        let path = region_path(dir.as_ref(), name)?;
        match std::fs::remove_file(&path) {
            Ok(()) => info!("Removed stale shared region {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Self::open_or_create_in(dir, name, size)
    }

    /// Filesystem path of the region
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Mapped size in bytes
    pub fn size(&self) -> usize {
        self.size
    }

    /// Typed view of the mapping
    pub fn layout(&self) -> &ChannelLayout {
        // SAFETY: the pointer is valid, aligned (page-aligned mapping) and the
        // mapping is at least LAYOUT_SIZE bytes; all-zero bytes are a valid
        // ChannelLayout.
        unsafe { self.layout.as_ref() }
    }

    pub fn read_quote(&self) -> Option<Quote> {
        self.layout().quote.load()
    }

    pub fn write_quote(&self, quote: &Quote) {
        self.layout().quote.store(quote);
    }

    pub fn set_feed_connected(&self, connected: bool) {
        self.layout()
            .quote
            .feed_connected
            .store(u64::from(connected), Ordering::Release);
    }

    pub fn is_feed_connected(&self) -> bool {
        self.layout().quote.feed_connected.load(Ordering::Acquire) != 0
    }

    pub fn read_account(&self) -> Option<AccountSnapshot> {
        self.layout().account.load()
    }

    pub fn write_account(&self, account: &AccountSnapshot) {
        self.layout().account.store(account);
    }

    pub fn read_command(&self) -> Option<Command> {
        self.layout().command.load()
    }

    /// Write a command the way the strategy process does
    pub fn write_command(&self, command: &Command) {
        self.layout().command.store(command);
    }

    pub fn read_status(&self) -> Option<CommandStatus> {
        self.layout().status.load()
    }

    pub fn write_status(&self, status: &CommandStatus) {
        self.layout().status.store(status);
    }
}

impl QuoteSink for SharedChannel {
    fn publish_quote(&self, quote: &Quote) {
        self.write_quote(quote);
    }

    fn set_feed_connected(&self, connected: bool) {
        SharedChannel::set_feed_connected(self, connected);
    }
}

impl OrderGateway for SharedChannel {
    fn latest_quote(&self) -> Option<Quote> {
        self.read_quote()
    }

    fn latest_command(&self) -> Option<Command> {
        self.read_command()
    }

    fn report_status(&self, status: &CommandStatus) {
        self.write_status(status);
    }
}

/// Accepts POSIX-style names with or without the leading slash
fn region_path(dir: &Path, name: &str) -> Result<PathBuf, ChannelError> {
    let trimmed = name.trim_start_matches('/');
    if trimmed.is_empty() || trimmed.contains('/') || trimmed == "." || trimmed == ".." {
        return Err(ChannelError::InvalidName(name.to_string()));
    }
    Ok(dir.join(trimmed))
}
