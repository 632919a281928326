/*
 * SPDX-License-Identifier: BlueOak-1.0.0
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 */

//! BCM2835 address map.

use static_assertions::const_assert_eq;

/// See BCM2835-ARM-Peripherals.pdf
/// See <https://www.raspberrypi.org/forums/viewtopic.php?t=186090> for more details.
pub struct BcmHost;

/// Offset of the GPIO block within the peripheral range.
pub const GPIO_START: usize = 0x20_0000;

// Per <https://www.raspberrypi.com/documentation/computers/raspberry-pi.html#peripheral-addresses>:
//
// SoC     Peripheral Address  Peripheral Size
// BCM2835 0x20000000          0x01000000
//
// The BCM2835 is the Broadcom chip used in the Raspberry Pi Model A, B, B+,
// the Compute Module, and the Raspberry Pi Zero.

impl BcmHost {
    /// This returns the ARM-side physical address where peripherals are mapped.
    pub const fn get_peripheral_address() -> usize {
        0x2000_0000
    }

    /// This returns the ARM-side physical address of the GPIO register block.
    pub const fn get_gpio_address() -> usize {
        Self::get_peripheral_address() + GPIO_START
    }

    /// This returns the size of the GPIO register block.
    pub const fn get_gpio_block_size() -> usize {
        4 * 1024
    }

    /// Path of the kernel device exposing the GPIO register block.
    ///
    /// The bcm2835-gpiomem driver hands out the GPIO page to members of the
    /// `gpio` group without requiring root.
    pub const fn get_gpio_mem_device() -> &'static str {
        "/dev/gpiomem"
    }
}

// The mmap offset must fall on a page boundary.
const_assert_eq!(BcmHost::get_gpio_address() % 4096, 0);
