//! Device buffers with their transfer state tracked in the type.
//!
//! `Queued` buffers are allocated but hold nothing meaningful, `InFlight`
//! buffers have a command pending, `Ready` buffers hold data the device
//! wrote or received. Reading back is only possible from `Ready`.

use std::marker::PhantomData;
use std::ptr;

use opencl3::{
    command_queue::CommandQueue,
    context::Context,
    event::Event,
    memory::{Buffer, CL_MEM_READ_WRITE},
    types::CL_NON_BLOCKING,
};
use tracing::debug;

use crate::error::{ClError, Result};
use crate::platform::DeviceInfo;
use crate::timing::event_duration_ns;

// ─── Typestate markers ───────────────────────────────────────────────
mod sealed {
    pub trait Sealed {}
}

pub trait State: sealed::Sealed {}

pub struct Queued;
impl sealed::Sealed for Queued {}
impl State for Queued {}

pub struct InFlight;
impl sealed::Sealed for InFlight {}
impl State for InFlight {}

pub struct Ready;
impl sealed::Sealed for Ready {}
impl State for Ready {}

// ─── Buffer ──────────────────────────────────────────────────────────
pub struct GpuBuffer<S: State> {
    buf: Buffer<u8>,
    len: usize,
    _state: PhantomData<S>,
}

impl<S: State> std::fmt::Debug for GpuBuffer<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GpuBuffer")
            .field("len", &self.len)
            .field("state", &std::any::type_name::<S>())
            .finish()
    }
}

/// Rejects empty buffers and buffers the device cannot allocate in one piece.
pub fn check_size(len: usize, max_alloc: u64) -> Result<()> {
    if len == 0 {
        return Err(ClError::InvalidSize(len));
    }
    if len as u64 > max_alloc {
        return Err(ClError::BufferTooLarge {
            requested: len as u64,
            max: max_alloc,
        });
    }
    Ok(())
}

impl<S: State> GpuBuffer<S> {
    fn into_state<T: State>(self) -> GpuBuffer<T> {
        GpuBuffer {
            buf: self.buf,
            len: self.len,
            _state: PhantomData,
        }
    }

    pub fn raw(&self) -> &Buffer<u8> {
        &self.buf
    }

    /// Length in bytes; never zero.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.len
    }
}

// ── Queued ───────────────────────────────────────────────────────────
impl GpuBuffer<Queued> {
    pub fn new(ctx: &Context, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(ClError::InvalidSize(len));
        }

        #[allow(unused_unsafe)]
        let buf = unsafe { Buffer::<u8>::create(ctx, CL_MEM_READ_WRITE, len, ptr::null_mut())? };
        debug!(bytes = len, "device buffer allocated");

        Ok(Self {
            buf,
            len,
            _state: PhantomData,
        })
    }

    /// Like [`GpuBuffer::new`], but first checks `CL_DEVICE_MAX_MEM_ALLOC_SIZE`.
    pub fn new_checked(ctx: &Context, device: &DeviceInfo, len: usize) -> Result<Self> {
        check_size(len, device.max_mem_alloc_bytes)?;
        Self::new(ctx, len)
    }

    /// Host → device. `host` stays borrowed until the returned guard completes.
    pub fn enqueue_write<'h>(
        mut self,
        queue: &CommandQueue,
        host: &'h [u8],
    ) -> Result<(GpuBuffer<InFlight>, GpuEventGuard<'h>)> {
        debug_assert_eq!(host.len(), self.len, "host data length mismatch");

        #[allow(unused_unsafe)]
        let evt = unsafe {
            queue.enqueue_write_buffer(&mut self.buf, CL_NON_BLOCKING, 0, host, &[])?
        };

        Ok((self.into_state(), GpuEventGuard::new(evt)))
    }

    /// A kernel is about to write this buffer.
    pub fn launch(self) -> GpuBuffer<InFlight> {
        self.into_state()
    }
}

// ── Ready → Host (D2H) ───────────────────────────────────────────────
impl GpuBuffer<Ready> {
    /// Device → host. `host_out` stays borrowed until the returned guard completes.
    pub fn enqueue_read<'h>(
        mut self,
        queue: &CommandQueue,
        host_out: &'h mut [u8],
    ) -> Result<(GpuBuffer<InFlight>, GpuEventGuard<'h>)> {
        debug_assert_eq!(host_out.len(), self.len, "host output length mismatch");

        #[allow(unused_unsafe)]
        let evt = unsafe {
            queue.enqueue_read_buffer(&mut self.buf, CL_NON_BLOCKING, 0, host_out, &[])?
        };

        Ok((self.into_state(), GpuEventGuard::new(evt)))
    }

    /// A kernel is about to overwrite the data in place.
    pub fn launch(self) -> GpuBuffer<InFlight> {
        self.into_state()
    }
}

// ── InFlight ─────────────────────────────────────────────────────────
impl GpuBuffer<InFlight> {
    pub fn into_ready(self, guard: GpuEventGuard<'_>) -> Result<GpuBuffer<Ready>> {
        guard.wait()?;
        Ok(self.into_state())
    }

    /// Waits and also returns the command's device time in nanoseconds.
    pub fn into_ready_profiled(self, guard: GpuEventGuard<'_>) -> Result<(GpuBuffer<Ready>, u64)> {
        let ns = guard.wait_profiled()?;
        Ok((self.into_state(), ns))
    }
}

// ── Guard (waits on drop) ────────────────────────────────────────────
/// Pending command. Keeps the host memory it reads or writes borrowed.
pub struct GpuEventGuard<'h> {
    evt: Option<Event>,
    _host: PhantomData<&'h mut [u8]>,
}

impl GpuEventGuard<'_> {
    pub fn new(evt: Event) -> Self {
        Self {
            evt: Some(evt),
            _host: PhantomData,
        }
    }

    pub fn wait(mut self) -> Result<()> {
        match self.evt.take() {
            Some(evt) => Ok(evt.wait()?),
            None => Ok(()),
        }
    }

    /// Needs a queue created with `CL_QUEUE_PROFILING_ENABLE`.
    pub fn wait_profiled(mut self) -> Result<u64> {
        match self.evt.take() {
            Some(evt) => {
                evt.wait()?;
                event_duration_ns(&evt)
            }
            None => Ok(0),
        }
    }
}

impl Drop for GpuEventGuard<'_> {
    fn drop(&mut self) {
        if let Some(evt) = self.evt.take() {
            let _ = evt.wait();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn size_zero_is_rejected() {
        assert!(matches!(check_size(0, 1024), Err(ClError::InvalidSize(0))));
    }

    #[test]
    fn size_over_alloc_limit_is_rejected() {
        let err = check_size(2048, 1024).unwrap_err();
        assert!(matches!(err, ClError::BufferTooLarge { requested: 2048, max: 1024 }));
    }

    #[test]
    fn size_at_alloc_limit_is_accepted() {
        assert!(check_size(1024, 1024).is_ok());
        assert!(check_size(1, 1024).is_ok());
    }
}
