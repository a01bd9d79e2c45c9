//! Shared UI icons and emojis.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("\u{2705} ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("\u{274C} ", "[ERR]");
pub static WARN: Emoji<'_, '_> = Emoji("\u{26A0}\u{FE0F}  ", "[WARN]");
pub static SKIP: Emoji<'_, '_> = Emoji("\u{23ED}\u{FE0F}  ", "[SKIP]");

// Phase indicators
pub static DEV: Emoji<'_, '_> = Emoji("\u{1F6E0}\u{FE0F}  ", "[DEV]");
pub static REVIEW: Emoji<'_, '_> = Emoji("\u{1F50D} ", "[R]");
pub static REPORT: Emoji<'_, '_> = Emoji("\u{1F4DD} ", "[REP]");
pub static COMMIT: Emoji<'_, '_> = Emoji("\u{1F4E6} ", "[C]");
pub static BREAKER: Emoji<'_, '_> = Emoji("\u{26A1} ", "[HALT]");
