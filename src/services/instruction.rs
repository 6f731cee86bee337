// Instruction Parser: free-text instruction -> structured generation options
//
// Matching is keyword-based and total: an instruction with no recognized
// keywords yields the default options record. The four keyword families
// (size, background, style, lighting) touch disjoint fields and are evaluated
// independently. Within one family, conflicts are settled by a single
// left-to-right scan: the keyword with the lowest byte offset in the
// instruction wins, so "白色背景改成蓝色" keeps the white background.

use crate::core::types::{GenerationOptions, Lighting, PhotoSize, PhotoStyle};

const SIZE_KEYWORDS: &[(&str, PhotoSize)] = &[
    ("2寸", PhotoSize::TwoInch),
    ("二寸", PhotoSize::TwoInch),
    ("护照", PhotoSize::Passport),
    ("passport", PhotoSize::Passport),
];

const BACKGROUND_KEYWORDS: &[(&str, &str)] = &[
    ("蓝色", "#1e40af"),
    ("blue", "#1e40af"),
    ("红色", "#dc2626"),
    ("red", "#dc2626"),
    ("白色", "#ffffff"),
    ("white", "#ffffff"),
    ("黑色", "#000000"),
    ("black", "#000000"),
];

const STYLE_KEYWORDS: &[(&str, PhotoStyle)] = &[
    ("休闲", PhotoStyle::Casual),
    ("casual", PhotoStyle::Casual),
    ("传统", PhotoStyle::Traditional),
    ("traditional", PhotoStyle::Traditional),
];

const LIGHTING_KEYWORDS: &[(&str, Lighting)] = &[
    ("自然", Lighting::Natural),
    ("natural", Lighting::Natural),
    ("明亮", Lighting::Bright),
    ("bright", Lighting::Bright),
];

/// Earliest match of any keyword in the family, by byte offset. Returns the
/// mapped value of the leftmost occurrence, or None when nothing matches.
fn first_match<T: Copy>(instruction: &str, keywords: &[(&str, T)]) -> Option<T> {
    keywords
        .iter()
        .filter_map(|(keyword, value)| instruction.find(keyword).map(|pos| (pos, *value)))
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, value)| value)
}

/// Parse a free-text instruction into generation options.
///
/// Never fails: unmatched text yields the defaults (1寸, white background,
/// PNG, quality 95, padding 0.1, studio lighting, professional style).
pub fn parse_instruction(instruction: &str) -> GenerationOptions {
    let mut options = GenerationOptions::default();

    if let Some(size) = first_match(instruction, SIZE_KEYWORDS) {
        options.size = size;
    }

    if let Some(color) = first_match(instruction, BACKGROUND_KEYWORDS) {
        options.background_color = color.to_string();
    }

    if let Some(style) = first_match(instruction, STYLE_KEYWORDS) {
        options.style = style;
    }

    if let Some(lighting) = first_match(instruction, LIGHTING_KEYWORDS) {
        options.lighting = lighting;
    }

    options
}

/// Deterministic generation prompt synthesized from the options; used whenever
/// the caller supplies no free-text prompt.
pub fn default_prompt(options: &GenerationOptions) -> String {
    format!(
        "生成{}证件照，{}，{}，背景色为{}，高质量，清晰度高，适合官方使用",
        options.size.label(),
        options.style.label(),
        options.lighting.label(),
        options.background_color,
    )
}
