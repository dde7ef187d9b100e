use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Datelike, Utc};
use rand::Rng;

/// Unambiguous alphabet: no `0/O`, `1/I`.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const CODE_SUFFIX_LEN: usize = 8;

/// Retries before a booking fails with a persistence error.
pub const MAX_CONFIRMATION_ATTEMPTS: usize = 5;

/// Produces candidate confirmation numbers. Uniqueness is checked by the caller.
pub trait ConfirmationCodeGenerator: Send + Sync {
    fn next_code(&self, now: DateTime<Utc>) -> String;
}

/// `<prefix>-<YEAR>-<8 random characters>`, e.g. `VG-2027-K7QF2MZA`.
#[derive(Clone, Debug)]
pub struct RandomConfirmationCodes {
    prefix: String,
}

impl RandomConfirmationCodes {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}

impl Default for RandomConfirmationCodes {
    fn default() -> Self {
        Self::new("VG")
    }
}

impl ConfirmationCodeGenerator for RandomConfirmationCodes {
    fn next_code(&self, now: DateTime<Utc>) -> String {
        let mut rng = rand::thread_rng();
        let suffix: String = (0..CODE_SUFFIX_LEN)
            .map(|_| char::from(CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())]))
            .collect();
        format!("{}-{}-{suffix}", self.prefix, now.year())
    }
}

/// Replays a fixed list of codes, repeating the last one once exhausted.
#[derive(Debug, Default)]
pub struct ScriptedConfirmationCodes {
    codes: Mutex<VecDeque<String>>,
    last: Mutex<Option<String>>,
}

impl ScriptedConfirmationCodes {
    pub fn new<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            codes: Mutex::new(codes.into_iter().map(Into::into).collect()),
            last: Mutex::new(None),
        }
    }
}

impl ConfirmationCodeGenerator for ScriptedConfirmationCodes {
    fn next_code(&self, _now: DateTime<Utc>) -> String {
        let next = match self.codes.lock() {
            Ok(mut codes) => codes.pop_front(),
            Err(poisoned) => poisoned.into_inner().pop_front(),
        };
        let mut last = match self.last.lock() {
            Ok(last) => last,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(code) = next {
            *last = Some(code);
        }
        last.clone().unwrap_or_default()
    }
}
