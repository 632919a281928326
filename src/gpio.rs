/*
 * SPDX-License-Identifier: MIT OR BlueOak-1.0.0
 * Copyright (c) 2018-2019 Andre Richter <andre.o.richter@gmail.com>
 * Copyright (c) Berkus Decker <berkus+vesper@metta.systems>
 * Original code distributed under MIT, additional changes are under BlueOak-1.0.0
 */

//! GPIO pin control.
//!
//! Pin numbers translate into register/bit pairs by fixed arithmetic: the
//! function-select field of pin `p` lives in `FunctionSelect[p / 10]` at bit
//! `(p % 10) * 3`, its level bit in the `[p / 32]` bank at bit `p % 32`. Set
//! and clear registers are write-1-to-act, so driving a level is a single
//! store; changing a mode is a read-modify-write of one 3-bit field that
//! leaves the neighbouring fields untouched.

use {
    crate::mmio::{GpioWindow, Result},
    std::fmt,
    tock_registers::{
        fields::FieldValue,
        interfaces::{ReadWriteable, Readable, Writeable},
    },
};

//--------------------------------------------------------------------------------------------------
// Public Definitions
//--------------------------------------------------------------------------------------------------

/// Pin direction.
///
/// The discriminants are the BCM2835 function-select encodings for the two
/// plain I/O functions.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Input = 0b000,
    Output = 0b001,
}

/// Electrical level of a pin.
#[repr(u8)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    Low = 0,
    High = 1,
}

/// Public interface to the GPIO register window.
pub struct GPIO {
    window: GpioWindow,
}

/// Handle for one GPIO pin.
///
/// The pin's state lives entirely in the shared register block, so handles
/// need no teardown: multiple handles for the same number are independent
/// views of the same hardware state and observe (or race) each other's
/// effects.
pub struct Pin<'gpio> {
    number: usize,
    mode: Mode,
    window: &'gpio GpioWindow,
}

//--------------------------------------------------------------------------------------------------
// Public Code
//--------------------------------------------------------------------------------------------------

impl ::core::convert::From<Mode> for u32 {
    fn from(m: Mode) -> Self {
        m as u32
    }
}

impl ::core::convert::From<bool> for Level {
    fn from(level: bool) -> Self {
        if level {
            Level::High
        } else {
            Level::Low
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Level::Low => write!(f, "low"),
            Level::High => write!(f, "high"),
        }
    }
}

impl GPIO {
    /// Maps the register window and wraps it in a controller.
    pub fn open() -> Result<GPIO> {
        Ok(GPIO::new(GpioWindow::open()?))
    }

    /// Wraps an already mapped window.
    pub const fn new(window: GpioWindow) -> GPIO {
        GPIO { window }
    }

    /// Returns a handle for `pin` and immediately programs its
    /// function-select field to `mode`.
    ///
    /// This mutates shared hardware state: every other handle for the same
    /// pin sees the new mode.
    ///
    /// # Panics
    ///
    /// Panics if `pin` > `53`.
    pub fn setup(&self, pin: usize, mode: Mode) -> Pin<'_> {
        Pin::new(pin, mode, &self.window)
    }

    /// Drives `pin` to `level` without constructing a handle.
    ///
    /// Writes the set or clear register only; the pin's function-select field
    /// is not touched.
    ///
    /// # Panics
    ///
    /// Panics if `pin` > `53`.
    pub fn output(&self, pin: usize, level: Level) {
        if pin > 53 {
            panic!("gpio::GPIO::output(): pin {pin} exceeds maximum of 53");
        }

        let bank = pin / 32;
        let shift = pin % 32;
        match level {
            Level::High => self.window.regs().SetPin[bank].set(1 << shift),
            Level::Low => self.window.regs().ClearPin[bank].set(1 << shift),
        }
    }

    /// Unmaps the register window.
    ///
    /// Pins keep whatever mode and level they were last set to; nothing is
    /// reset on the way out. Consumes the controller, so no handle can reach
    /// the registers afterwards.
    pub fn cleanup(self) -> Result<()> {
        self.window.close()
    }
}

impl<'gpio> Pin<'gpio> {
    /// The pin number this handle is bound to.
    pub fn number(&self) -> usize {
        self.number
    }

    /// The mode this handle last programmed.
    pub fn mode(&self) -> Mode {
        self.mode
    }

    /// Rewrites the pin's 3-bit function-select field to `mode`.
    ///
    /// Read-modify-write: the fields of other pins sharing the register keep
    /// their values. Concurrent `set_mode` calls on pins in the same register
    /// can race, see the crate docs.
    pub fn set_mode(&mut self, mode: Mode) {
        self.mode = mode;
        self.program_mode();
    }

    /// Drives the pin high.
    pub fn set_high(&self) {
        // Guarantees: pin number is between [0; 53] by construction.
        let bank = self.number / 32;
        let shift = self.number % 32;
        self.window.regs().SetPin[bank].set(1 << shift);
    }

    /// Drives the pin low.
    pub fn set_low(&self) {
        // Guarantees: pin number is between [0; 53] by construction.
        let bank = self.number / 32;
        let shift = self.number % 32;
        self.window.regs().ClearPin[bank].set(1 << shift);
    }

    /// Reads the pin's current level.
    pub fn read(&self) -> Level {
        // Guarantees: pin number is between [0; 53] by construction.
        let bank = self.number / 32;
        let off = self.number % 32;
        self.window.regs().PinLevel[bank]
            .matches_all(FieldValue::<u32, ()>::new(1, off, 1))
            .into()
    }
}

//--------------------------------------------------------------------------------------------------
// Private Code
//--------------------------------------------------------------------------------------------------

impl<'gpio> Pin<'gpio> {
    /// Returns a new `Pin` bound to pin number `number`, with its
    /// function-select field programmed to `mode`.
    ///
    /// # Panics
    ///
    /// Panics if `number` > `53`.
    fn new(number: usize, mode: Mode, window: &'gpio GpioWindow) -> Pin<'gpio> {
        if number > 53 {
            panic!("gpio::Pin::new(): pin {number} exceeds maximum of 53");
        }

        let pin = Pin {
            number,
            mode,
            window,
        };
        pin.program_mode();
        pin
    }

    fn program_mode(&self) {
        let bank = self.number / 10;
        let off = self.number % 10;
        self.window.regs().FunctionSelect[bank].modify(FieldValue::<u32, ()>::new(
            0b111,
            off * 3,
            self.mode.into(),
        ));
    }
}

//--------------------------------------------------------------------------------------------------
// Testing
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // Word indices of the registers inside a fake block:
    // FunctionSelect = 0..6, SetPin = 7..9, ClearPin = 10..12, PinLevel = 13..15.

    #[test]
    fn test_pin_modes() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        for pin in 0..10 {
            reg[0] = 0;
            let _out = gpio.setup(pin, Mode::Output);
            assert_eq!(reg[0], 0b001 << (pin * 3));

            reg[0] = 0b111 << (pin * 3);
            let _inp = gpio.setup(pin, Mode::Input);
            assert_eq!(reg[0], 0);
        }
    }

    #[test]
    fn mode_preserves_neighbouring_fields() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        // A field written before us survives our write...
        let _one = gpio.setup(1, Mode::Output);
        assert_eq!(reg[0], 0b001_000);
        let _two = gpio.setup(2, Mode::Output);
        assert_eq!(reg[0], 0b001_001_000);

        // ...and survives a later rewrite of our own field.
        let mut two = gpio.setup(2, Mode::Output);
        two.set_mode(Mode::Input);
        assert_eq!(reg[0], 0b000_001_000);

        // Fields the hardware set up before this process came along survive
        // too, including in other banks.
        reg[1] = 0b100; // pin 10 in an alternate function
        let _eleven = gpio.setup(11, Mode::Output);
        assert_eq!(reg[1], 0b001_100);
    }

    #[test]
    fn mode_programming_is_idempotent() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        let mut pin = gpio.setup(17, Mode::Output);
        let once = reg[1];
        assert_eq!(once, 0b001 << 21);
        pin.set_mode(Mode::Output);
        assert_eq!(reg[1], once);
    }

    #[test]
    fn test_pin_outputs() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        for pin in 0..32 {
            let p = gpio.setup(pin, Mode::Output);
            p.set_high();
            assert_eq!(reg[7], 1 << pin);
            p.set_low();
            assert_eq!(reg[10], 1 << pin);
        }

        // Pins straddling the bank boundary.
        let p31 = gpio.setup(31, Mode::Output);
        let p32 = gpio.setup(32, Mode::Output);
        p31.set_high();
        p32.set_high();
        assert_eq!(reg[7], 1 << 31);
        assert_eq!(reg[8], 1);
        p31.set_low();
        p32.set_low();
        assert_eq!(reg[10], 1 << 31);
        assert_eq!(reg[11], 1);
    }

    #[test]
    fn test_pin_inputs() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        // An externally driven input reads High without this layer ever
        // writing a set or clear register.
        let pin = gpio.setup(2, Mode::Input);
        assert_eq!(pin.read(), Level::Low);
        reg[13] = 1 << 2;
        assert_eq!(pin.read(), Level::High);
        assert_eq!(reg[7], 0);
        assert_eq!(reg[8], 0);
        assert_eq!(reg[10], 0);
        assert_eq!(reg[11], 0);

        // Bank boundary.
        let p31 = gpio.setup(31, Mode::Input);
        let p32 = gpio.setup(32, Mode::Input);
        reg[13] = 1 << 31;
        reg[14] = 0;
        assert_eq!(p31.read(), Level::High);
        assert_eq!(p32.read(), Level::Low);
        reg[13] = 0;
        reg[14] = 1;
        assert_eq!(p31.read(), Level::Low);
        assert_eq!(p32.read(), Level::High);
    }

    #[test]
    fn output_pin_round_trip() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        let pin = gpio.setup(17, Mode::Output);
        pin.set_high();
        assert_eq!(reg[7], 1 << 17);

        // The hardware loops a driven level back into the level register.
        reg[13] = 1 << 17;
        assert_eq!(pin.read(), Level::High);
    }

    #[test]
    fn output_without_a_handle() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        gpio.output(3, Level::High);
        assert_eq!(reg[7], 1 << 3);
        gpio.output(35, Level::Low);
        assert_eq!(reg[11], 1 << 3);

        // No function select was touched on the way.
        assert_eq!(reg[0], 0);
        assert_eq!(reg[3], 0);
    }

    #[test]
    fn handles_share_hardware_state() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        let first = gpio.setup(5, Mode::Output);
        let second = gpio.setup(5, Mode::Output);
        first.set_high();
        assert_eq!(reg[7], 1 << 5);
        reg[13] = 1 << 5;
        assert_eq!(second.read(), Level::High);
    }

    #[test]
    fn handle_tracks_programmed_mode() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        let mut pin = gpio.setup(9, Mode::Input);
        assert_eq!(pin.number(), 9);
        assert_eq!(pin.mode(), Mode::Input);
        assert_eq!(reg[0], 0);

        pin.set_mode(Mode::Output);
        assert_eq!(pin.mode(), Mode::Output);
        assert_eq!(reg[0], 0b001 << 27);
    }

    #[test]
    fn cleanup_releases_the_window() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });

        let pin = gpio.setup(4, Mode::Output);
        pin.set_high();
        drop(pin);
        gpio.cleanup().unwrap();

        // Teardown resets nothing: mode and level writes survive.
        assert_eq!(reg[0], 0b001 << 12);
        assert_eq!(reg[7], 1 << 4);
    }

    #[test]
    #[should_panic(expected = "exceeds maximum of 53")]
    fn setup_rejects_out_of_range_pins() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });
        let _ = gpio.setup(54, Mode::Input);
    }

    #[test]
    #[should_panic(expected = "exceeds maximum of 53")]
    fn output_rejects_out_of_range_pins() {
        let mut reg = [0u32; 16];
        let gpio = GPIO::new(unsafe { GpioWindow::with_base(&mut reg as *mut _ as usize) });
        gpio.output(54, Level::High);
    }

    #[test]
    fn hardware_encodings() {
        assert_eq!(u32::from(Mode::Input), 0b000);
        assert_eq!(u32::from(Mode::Output), 0b001);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::High.to_string(), "high");
        assert_eq!(Level::Low.to_string(), "low");
    }
}
