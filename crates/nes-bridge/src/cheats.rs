//! Game Genie decoding and the cheat registry operations.

use std::str::FromStr;

use crate::{Bridge, engine::Engine, error::CheatError};

const GENIE_LETTERS: &[u8; 16] = b"APZLGITYEOXUKSVN";

/// Decoded memory patch: reads of `address` return `value`, optionally only
/// while the original byte equals `compare`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CheatCode {
    pub address: u16,
    pub value: u8,
    pub compare: Option<u8>,
}

impl CheatCode {
    /// Decodes a 6- or 8-letter Game Genie code. Case and surrounding
    /// whitespace are ignored.
    pub fn decode_game_genie(text: &str) -> Result<Self, CheatError> {
        let text = text.trim();
        let fail = || CheatError::DecodeFailed(text.to_string());

        if text.len() != 6 && text.len() != 8 {
            return Err(fail());
        }

        let mut n = [0u16; 8];
        for (slot, letter) in n.iter_mut().zip(text.bytes()) {
            let upper = letter.to_ascii_uppercase();
            *slot = GENIE_LETTERS
                .iter()
                .position(|&l| l == upper)
                .ok_or_else(fail)? as u16;
        }

        let address = 0x8000
            | ((n[3] & 7) << 12)
            | ((n[5] & 7) << 8)
            | ((n[4] & 8) << 8)
            | ((n[2] & 7) << 4)
            | ((n[1] & 8) << 4)
            | (n[4] & 7)
            | (n[3] & 8);

        // The high bit of the value comes from the last letter of the code.
        let last = if text.len() == 6 { n[5] } else { n[7] };
        let value = ((n[1] & 7) << 4) | ((n[0] & 8) << 4) | (n[0] & 7) | (last & 8);

        let compare = (text.len() == 8)
            .then(|| ((n[7] & 7) << 4) | ((n[6] & 8) << 4) | (n[6] & 7) | (n[5] & 8));

        Ok(Self {
            address,
            value: value as u8,
            compare: compare.map(|c| c as u8),
        })
    }
}

impl FromStr for CheatCode {
    type Err = CheatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::decode_game_genie(s)
    }
}

impl<E: Engine> Bridge<E> {
    /// Decodes `text` and registers the patch with the engine.
    ///
    /// Codes accumulate until [`reset_cheats`](Self::reset_cheats). On error
    /// the registered set is left as it was.
    pub fn add_cheat_code(&mut self, text: &str) -> Result<CheatCode, CheatError> {
        let code = CheatCode::decode_game_genie(text)?;
        self.engine
            .set_cheat(code)
            .map_err(CheatError::Rejected)?;
        tracing::debug!(
            code = text.trim(),
            address = format_args!("{:#06X}", code.address),
            value = code.value,
            "registered cheat"
        );
        Ok(code)
    }

    /// Removes every registered cheat.
    pub fn reset_cheats(&mut self) {
        self.engine.clear_cheats();
        tracing::debug!("cleared cheats");
    }

    pub fn cheat_count(&self) -> usize {
        self.engine.cheat_count()
    }
}
