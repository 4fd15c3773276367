//! Shared-memory pixel buffers.
//!
//! Every surface owns two buffers; the allocator hands out whichever one the
//! compositor is not currently holding and only reallocates when the size
//! changed. Backing storage is an unlinked POSIX shm object with a
//! per-process unique name.

use crate::Context;
use lava_core::{LavaError, Result};
use memmap2::MmapMut;
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;
use std::os::fd::AsFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use wayland_client::protocol::{wl_buffer, wl_buffer::WlBuffer, wl_shm, wl_shm::WlShm};
use wayland_client::{Connection, Dispatch, QueueHandle};

/// User data attached to every `wl_buffer`; the release event clears the
/// busy flag without any state lookup.
pub struct BufferData {
    pub busy: Arc<AtomicBool>,
}

/// One mapped wl_buffer.
pub struct Buffer {
    wl: WlBuffer,
    mmap: MmapMut,
    busy: Arc<AtomicBool>,
    width: u32,
    height: u32,
    stride: i32,
    // Keeps the mapping's fd alive for the pool's lifetime.
    _file: File,
}

impl Buffer {
    fn allocate(shm: &WlShm, qh: &QueueHandle<Context>, width: u32, height: u32) -> Result<Self> {
        let stride = width as i32 * 4;
        let size = stride as u64 * u64::from(height);

        let file = create_shm_file(size)?;
        let mmap = unsafe { MmapMut::map_mut(&file) }
            .map_err(|e| LavaError::Wayland(format!("mmap failed: {e}")))?;

        let busy = Arc::new(AtomicBool::new(false));
        let pool = shm.create_pool(file.as_fd(), size as i32, qh, ());
        let wl = pool.create_buffer(
            0,
            width as i32,
            height as i32,
            stride,
            wl_shm::Format::Argb8888,
            qh,
            BufferData { busy: busy.clone() },
        );
        pool.destroy();

        Ok(Self {
            wl,
            mmap,
            busy,
            width,
            height,
            stride,
            _file: file,
        })
    }

    pub fn wl(&self) -> &WlBuffer {
        &self.wl
    }

    /// Start drawing into the buffer. The returned context targets the
    /// mapped pixels directly.
    pub fn begin(&mut self) -> Result<cairo::Context> {
        let surface = unsafe {
            cairo::ImageSurface::create_for_data_unsafe(
                self.mmap.as_mut_ptr(),
                cairo::Format::ARgb32,
                self.width as i32,
                self.height as i32,
                self.stride,
            )
        }
        .map_err(|e| LavaError::Wayland(format!("cairo surface: {e}")))?;
        cairo::Context::new(&surface)
            .map_err(|e| LavaError::Wayland(format!("cairo context: {e}")))
    }

    /// Mark the buffer as held by the compositor; cleared again by the
    /// buffer release event.
    pub fn mark_busy(&self) {
        self.busy.store(true, Ordering::Relaxed);
    }

    fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Relaxed)
    }

    fn destroy(&self) {
        self.wl.destroy();
    }
}

/// Double buffer belonging to one surface.
#[derive(Default)]
pub struct BufferPool {
    buffers: [Option<Buffer>; 2],
}

impl BufferPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hand out a non-busy buffer of the requested size, reallocating the
    /// slot only if its size changed.
    pub fn acquire(
        &mut self,
        shm: &WlShm,
        qh: &QueueHandle<Context>,
        width: u32,
        height: u32,
    ) -> Result<&mut Buffer> {
        let width = width.max(1);
        let height = height.max(1);

        // Both busy can happen when two redraws land in one dispatch burst;
        // replacing slot 0 keeps us going at the cost of one reallocation.
        let slot = self
            .buffers
            .iter()
            .position(|b| b.as_ref().is_none_or(|b| !b.is_busy()))
            .unwrap_or_else(|| {
                if let Some(old) = self.buffers[0].take() {
                    old.destroy();
                }
                0
            });

        let needs_alloc = self.buffers[slot]
            .as_ref()
            .is_none_or(|b| b.width != width || b.height != height);
        if needs_alloc {
            if let Some(old) = self.buffers[slot].take() {
                old.destroy();
            }
            self.buffers[slot] = Some(Buffer::allocate(shm, qh, width, height)?);
        }
        Ok(self.buffers[slot].as_mut().unwrap())
    }

    pub fn destroy(&mut self) {
        for buffer in self.buffers.iter_mut().flat_map(Option::take) {
            buffer.destroy();
        }
    }
}

/// Create an anonymous shm file: unique name, retried on collision, then
/// immediately unlinked.
fn create_shm_file(size: u64) -> Result<File> {
    for attempt in 0..16u32 {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let name = format!(
            "/lavalauncher-{}-{:08x}",
            std::process::id(),
            nanos.wrapping_add(attempt)
        );
        match shm_open(
            name.as_str(),
            OFlag::O_RDWR | OFlag::O_CREAT | OFlag::O_EXCL,
            Mode::from_bits_truncate(0o600),
        ) {
            Ok(fd) => {
                let _ = shm_unlink(name.as_str());
                nix::unistd::ftruncate(&fd, size as i64)
                    .map_err(|e| LavaError::Wayland(format!("ftruncate: {e}")))?;
                return Ok(File::from(fd));
            }
            Err(nix::errno::Errno::EEXIST) => continue,
            Err(e) => return Err(LavaError::Wayland(format!("shm_open: {e}"))),
        }
    }
    Err(LavaError::Wayland("cannot find unique shm name".into()))
}

impl Dispatch<WlBuffer, BufferData> for Context {
    fn event(
        _: &mut Self,
        _: &WlBuffer,
        event: wl_buffer::Event,
        data: &BufferData,
        _: &Connection,
        _: &QueueHandle<Self>,
    ) {
        if let wl_buffer::Event::Release = event {
            data.busy.store(false, Ordering::Relaxed);
        }
    }
}
