/*
 * SPDX-License-Identifier: MIT OR BlueOak-1.0.0
 * Copyright (c) 2018-2019 Andre Richter <andre.o.richter@gmail.com>
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 * Original code distributed under MIT, additional changes are under BlueOak-1.0.0
 */

//! Mapped window onto the GPIO register block.
//!
//! [`GpioWindow::open`] maps the block from the kernel's gpiomem device and
//! owns the mapping until [`GpioWindow::close`] (or drop) releases it. All
//! register traffic goes through the typed [`RegisterBlock`] view as volatile
//! 32-bit loads and stores; there are no barriers beyond the synchronized
//! mapping itself, so ordering across registers is the program order of the
//! accesses.
//!
//! Map and unmap are the only operations that take a lock. They are serialized
//! process-wide, and at most one device-backed window exists at a time: a
//! second [`GpioWindow::open`] without an intervening close fails with
//! [`WindowError::AlreadyMapped`].

use {
    crate::platform::BcmHost,
    snafu::Snafu,
    std::{
        fs::OpenOptions,
        io,
        os::unix::{fs::OpenOptionsExt, io::AsRawFd},
        path::Path,
        ptr,
        sync::{Mutex, MutexGuard, PoisonError},
    },
    tock_registers::{
        register_structs,
        registers::{ReadOnly, ReadWrite, WriteOnly},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

// Descriptions taken from
// https://github.com/raspberrypi/documentation/files/1888662/BCM2837-ARM-Peripherals.-.Revised.-.V2-1.pdf

register_structs! {
    /// The offsets for each register.
    #[allow(non_snake_case)]
    pub(crate) RegisterBlock {
        (0x00 => pub FunctionSelect: [ReadWrite<u32>; 6]), // function select
        (0x18 => __reserved_1),
        (0x1c => pub SetPin: [WriteOnly<u32>; 2]), // set output pin
        (0x24 => __reserved_2),
        (0x28 => pub ClearPin: [WriteOnly<u32>; 2]), // clear output pin
        (0x30 => __reserved_3),
        (0x34 => pub PinLevel: [ReadOnly<u32>; 2]), // get input pin level
        (0x3c => @END),
    }
}

#[derive(Debug, Snafu)]
pub enum WindowError {
    /// The gpiomem device could not be opened. Typically the device node is
    /// absent or the process lacks permission.
    #[snafu(display("Unable to open GPIO memory device: {}", source))]
    DeviceOpen { source: io::Error },
    /// The register block could not be mapped.
    #[snafu(display("Unable to map GPIO register block: {}", source))]
    Map { source: io::Error },
    /// A device-backed window already exists in this process.
    #[snafu(display("GPIO register window is already mapped in this process"))]
    AlreadyMapped,
    /// The munmap call failed while closing the window.
    #[snafu(display("Unable to unmap GPIO register block: {}", source))]
    Unmap { source: io::Error },
}

pub type Result<T> = std::result::Result<T, WindowError>;

/// Live mapping of the GPIO register block.
///
/// A window is either device-backed (created by [`GpioWindow::open`]) or a
/// view over caller-provided memory (created by [`GpioWindow::with_base`],
/// used by the tests). Closing consumes the window, so registers are
/// unreachable once the mapping is gone.
#[derive(Debug)]
pub struct GpioWindow {
    base: usize,
    mapping: Option<Mapping>,
}

//--------------------------------------------------------------------------------------------------
// Private Definitions
//--------------------------------------------------------------------------------------------------

/// Device-backed region owned by a window.
#[derive(Debug)]
struct Mapping {
    addr: *mut libc::c_void,
    len: usize,
}

/// True while a device-backed window exists. Also the lock under which all
/// map and unmap syscalls run, so an unmap cannot overlap a map in progress.
static WINDOW_MAPPED: Mutex<bool> = Mutex::new(false);

fn window_slot() -> MutexGuard<'static, bool> {
    // The flag stays valid across a panic: it is only flipped after the
    // corresponding syscall has succeeded.
    WINDOW_MAPPED.lock().unwrap_or_else(PoisonError::into_inner)
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl GpioWindow {
    /// Maps the GPIO register block from the gpiomem device.
    ///
    /// The device is opened read/write and synchronized (`O_SYNC`), and the
    /// block is mapped shared at the physical address from
    /// [`BcmHost::get_gpio_address`]. Fails with [`WindowError::DeviceOpen`]
    /// or [`WindowError::Map`]; without the window the rest of the driver is
    /// unusable, and no retry is attempted. Fails with
    /// [`WindowError::AlreadyMapped`] if this process already holds an open
    /// window.
    pub fn open() -> Result<GpioWindow> {
        Self::open_device(BcmHost::get_gpio_mem_device())
    }

    /// Window over caller-provided memory instead of a device mapping.
    ///
    /// Closing or dropping such a window is a no-op. This is how the tests
    /// run the driver against a plain array.
    ///
    /// # Safety
    ///
    /// `base` must point to writable memory, aligned for `u32` and at least
    /// [`RegisterBlock`]-sized, that outlives the window.
    pub const unsafe fn with_base(base: usize) -> GpioWindow {
        GpioWindow {
            base,
            mapping: None,
        }
    }

    /// Releases the mapping.
    ///
    /// A failing munmap is reported as [`WindowError::Unmap`]; the window is
    /// gone either way. Dropping a window unmaps as well but discards the
    /// error, so this is the path that reports it.
    pub fn close(mut self) -> Result<()> {
        self.unmap()
    }

    /// Typed view of the register block.
    ///
    /// Allows writing `self.regs().SetPin[bank].set(...)` instead of raw
    /// pointer arithmetic; every access is a volatile load or store of one
    /// whole register, bounds-checked against the fixed register table.
    pub(crate) fn regs(&self) -> &RegisterBlock {
        unsafe { &*(self.base as *const RegisterBlock) }
    }
}

/// The window is a base address plus mapping bookkeeping. All accesses
/// through it are volatile whole-word loads and stores: races on reads and on
/// the write-1-to-act set/clear registers are harmless at the hardware level,
/// and function-select read-modify-write hazards are the caller's contract
/// (see the crate docs). Map/unmap, the only mutation of the bookkeeping, is
/// serialized by the window lock.
unsafe impl Send for GpioWindow {}
unsafe impl Sync for GpioWindow {}

impl Drop for GpioWindow {
    fn drop(&mut self) {
        // Unmap errors cannot be reported from here.
        let _ = self.unmap();
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl GpioWindow {
    fn open_device(path: impl AsRef<Path>) -> Result<GpioWindow> {
        let mut mapped = window_slot();
        if *mapped {
            return Err(WindowError::AlreadyMapped);
        }

        let device = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_SYNC)
            .open(path)
            .map_err(|source| WindowError::DeviceOpen { source })?;

        let len = BcmHost::get_gpio_block_size();
        let addr = unsafe {
            libc::mmap(
                ptr::null_mut(),
                len,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                device.as_raw_fd(),
                BcmHost::get_gpio_address() as libc::off_t,
            )
        };
        if addr == libc::MAP_FAILED {
            return Err(WindowError::Map {
                source: io::Error::last_os_error(),
            });
        }

        *mapped = true;

        // The descriptor drops here; the mapping keeps the block reachable.
        Ok(GpioWindow {
            base: addr as usize,
            mapping: Some(Mapping { addr, len }),
        })
    }

    fn unmap(&mut self) -> Result<()> {
        let region = match self.mapping.take() {
            Some(region) => region,
            None => return Ok(()),
        };

        let mut mapped = window_slot();
        let rc = unsafe { libc::munmap(region.addr, region.len) };
        // The slot frees even on failure: this window no longer exists, and a
        // fresh open is the only recovery available to the process.
        *mapped = false;
        if rc != 0 {
            return Err(WindowError::Unmap {
                source: io::Error::last_os_error(),
            });
        }
        Ok(())
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // One test covers the whole lifecycle: the mapped-window slot is process
    // global, so the steps must not run in parallel test threads.
    #[test]
    fn window_lifecycle() {
        // Missing device surfaces the open failure.
        let err = GpioWindow::open_device("/definitely/not/here/gpiomem").unwrap_err();
        assert!(matches!(err, WindowError::DeviceOpen { .. }));
        // A failed open leaves the slot free.
        assert!(!*window_slot());

        // A scratch file stands in for the gpiomem device; mapping past its
        // end is fine as long as the pages are never touched.
        let scratch = std::env::temp_dir().join(format!("gpiomem-window-{}", std::process::id()));
        std::fs::File::create(&scratch).unwrap();

        let window = GpioWindow::open_device(&scratch).unwrap();
        assert!(*window_slot());

        // Second open without an intervening close is refused.
        let err = GpioWindow::open_device(&scratch).unwrap_err();
        assert!(matches!(err, WindowError::AlreadyMapped));

        window.close().unwrap();
        assert!(!*window_slot());

        // After a close the process may map again; drop unmaps as well.
        let window = GpioWindow::open_device(&scratch).unwrap();
        drop(window);
        assert!(!*window_slot());

        std::fs::remove_file(&scratch).unwrap();
    }

    #[test]
    fn borrowed_window_close_is_a_no_op() {
        let mut reg = [0u32; 16];
        let window = unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) };
        window.close().unwrap();
    }
}
