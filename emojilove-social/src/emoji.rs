//! Emoji detection over decoded code points.
use std::ops::RangeInclusive;

/// Inclusive code-point ranges treated as emoji: arrows, miscellaneous
/// symbols, dingbats, CJK symbols and punctuation, miscellaneous symbols and
/// pictographs plus emoticons, and transport and map symbols.
pub const EMOJI_RANGES: [RangeInclusive<u32>; 6] = [
    0x2190..=0x21FF,
    0x2600..=0x26FF,
    0x2700..=0x27BF,
    0x3000..=0x303F,
    0x1F300..=0x1F64F,
    0x1F680..=0x1F6FF,
];

pub fn is_emoji(c: char) -> bool {
    let cp = u32::from(c);
    EMOJI_RANGES.iter().any(|r| r.contains(&cp))
}

/// True if any code point of `text` falls in [`EMOJI_RANGES`].
///
/// ```
/// use emojilove_social::emoji::contains_emoji;
///
/// assert!(contains_emoji("Great day! 🌞"));
/// assert!(!contains_emoji("Great day!"));
/// ```
pub fn contains_emoji(text: &str) -> bool {
    text.chars().any(is_emoji)
}
