//! Shared UI icons with plain-text fallbacks for terminals without emoji.

use console::Emoji;

// Status indicators
pub static CHECK: Emoji<'_, '_> = Emoji("\u{2705} ", "[OK]");
pub static CROSS: Emoji<'_, '_> = Emoji("\u{274C} ", "[ERR]");
pub static SPARKLE: Emoji<'_, '_> = Emoji("\u{2728} ", "*");
pub static WARN: Emoji<'_, '_> = Emoji("\u{26A0}\u{FE0F}  ", "[WARN]");

// Phase indicators
pub static PLAN: Emoji<'_, '_> = Emoji("\u{1F4CB} ", "[P]");
pub static BUILD: Emoji<'_, '_> = Emoji("\u{1F528} ", "[B]");
pub static REVIEW: Emoji<'_, '_> = Emoji("\u{1F50D} ", "[R]");
pub static ARROW: Emoji<'_, '_> = Emoji("\u{27A1}\u{FE0F}  ", "->");

// Artifact indicators
pub static STEP: Emoji<'_, '_> = Emoji("\u{2714}\u{FE0F}  ", "+");
pub static BLOCKER: Emoji<'_, '_> = Emoji("\u{1F6A7} ", "[BLOCK]");
pub static ISSUE: Emoji<'_, '_> = Emoji("\u{1F41B} ", "[ISSUE]");
