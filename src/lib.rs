/*
 * SPDX-License-Identifier: MIT OR BlueOak-1.0.0
 * Copyright (c) 2018-2019 Andre Richter <andre.o.richter@gmail.com>
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 * Original code distributed under MIT, additional changes are under BlueOak-1.0.0
 */

//! Userspace driver for the BCM2835 GPIO register block.
//!
//! The hardware registers are reached through a [`GpioWindow`]: a read/write,
//! synchronized mapping of the GPIO block obtained from the kernel's gpiomem
//! device. A [`GPIO`] controller owns the window and hands out [`Pin`] handles
//! which translate pin numbers into register/bit pairs. Every operation is a
//! direct volatile load or store through the mapped block; nothing is cached
//! or buffered.
//!
//! # Concurrency
//!
//! Mapping and unmapping the window are serialized process-wide, and at most
//! one device-backed window exists at a time. Ordinary register accesses are
//! not serialized: set/clear writes are write-1-to-act and safe to race, but
//! two threads reprogramming pin modes that share a function-select register
//! can corrupt each other's field. Callers sharing pins across threads supply
//! their own synchronization if they need that safety.
//!
//! # Example
//!
//! ```no_run
//! use gpiomem::{Level, Mode, GPIO};
//!
//! # fn main() -> gpiomem::Result<()> {
//! let gpio = GPIO::open()?;
//! let pin = gpio.setup(17, Mode::Output);
//! pin.set_high();
//! assert_eq!(pin.read(), Level::High);
//! drop(pin);
//! gpio.cleanup()?;
//! # Ok(())
//! # }
//! ```

#![allow(clippy::upper_case_acronyms)]

pub mod gpio;
pub mod mmio;
pub mod platform;

pub use {
    gpio::{Level, Mode, Pin, GPIO},
    mmio::{GpioWindow, Result, WindowError},
};
