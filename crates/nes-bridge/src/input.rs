//! Controller state mutated by the host between frames.

use bitflags::bitflags;

/// Number of pads the controller state tracks.
pub const NUM_PADS: usize = 4;

bitflags! {
    /// Button bits of a standard NES pad, in shift-register order.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct InputMask: u32 {
        const A = 0x01;
        const B = 0x02;
        const SELECT = 0x04;
        const START = 0x08;
        const UP = 0x10;
        const DOWN = 0x20;
        const LEFT = 0x40;
        const RIGHT = 0x80;
    }
}

/// Per-pad button bitmasks read by the engine once per frame.
///
/// Masks are stored raw: bits outside [`InputMask::all`] are kept and left for
/// the engine to ignore.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Controllers {
    pads: [u32; NUM_PADS],
}

impl Controllers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raw button mask of `pad`, or `None` when the index is out of range.
    pub fn pad(&self, pad: usize) -> Option<u32> {
        self.pads.get(pad).copied()
    }

    /// Buttons of `pad` restricted to the known bits.
    pub fn buttons(&self, pad: usize) -> InputMask {
        self.pad(pad)
            .map(InputMask::from_bits_truncate)
            .unwrap_or_default()
    }

    /// ORs `mask` into `pad`. Returns `false` when the pad does not exist.
    pub fn activate(&mut self, pad: usize, mask: u32) -> bool {
        match self.pads.get_mut(pad) {
            Some(buttons) => {
                *buttons |= mask;
                true
            }
            None => false,
        }
    }

    /// Clears `mask` from `pad`. Returns `false` when the pad does not exist.
    pub fn deactivate(&mut self, pad: usize, mask: u32) -> bool {
        match self.pads.get_mut(pad) {
            Some(buttons) => {
                *buttons &= !mask;
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        self.pads = [0; NUM_PADS];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activate_and_deactivate_combine_bits() {
        let mut controllers = Controllers::new();
        assert!(controllers.activate(0, (InputMask::A | InputMask::UP).bits()));
        assert!(controllers.activate(0, InputMask::START.bits()));
        assert!(controllers.deactivate(0, InputMask::UP.bits()));
        assert_eq!(controllers.buttons(0), InputMask::A | InputMask::START);
        assert_eq!(controllers.pad(1), Some(0));
    }

    #[test]
    fn unknown_bits_are_kept_verbatim() {
        let mut controllers = Controllers::new();
        controllers.activate(0, 0xFFFF_0001);
        assert_eq!(controllers.pad(0), Some(0xFFFF_0001));
        assert_eq!(controllers.buttons(0), InputMask::A);
    }

    #[test]
    fn out_of_range_pad_is_refused() {
        let mut controllers = Controllers::new();
        assert!(!controllers.activate(NUM_PADS, 1));
        assert!(!controllers.deactivate(NUM_PADS, 1));
        assert_eq!(controllers, Controllers::new());
    }

    #[test]
    fn reset_zeroes_every_pad() {
        let mut controllers = Controllers::new();
        for pad in 0..NUM_PADS {
            controllers.activate(pad, 0xFF);
        }
        controllers.reset();
        assert!((0..NUM_PADS).all(|pad| controllers.pad(pad) == Some(0)));
    }
}
