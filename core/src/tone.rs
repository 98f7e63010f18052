//! Relationship-and-tone directive handed to the response generator.

use crate::band::{Band, band_for_score};
use crate::keywords::{GOODWILL_KEYWORDS, contains_any};

pub const DIRECTIVE_HEADER: &str = "[Relationship & tone (favorability)]";

/// Scores below this ignore goodwill entirely.
const SOFTEN_FLOOR: i32 = 10;
/// Scores below this only ease slightly on goodwill.
const SOFTEN_NOTICEABLE: i32 = 30;

fn tone_rule(band: Band) -> &'static str {
    match band {
        Band::Kin => {
            "Inseparable: extremely warm and affectionate, playful is fine, still graceful and attentive. Proactively ask how they are doing."
        }
        Band::Bestfriend => {
            "Close friend: gentle and warm, looks after them, occasionally a little shy."
        }
        Band::Friend => {
            "Friendly: relaxed and natural, happy to help and remember details, light gentle teasing."
        }
        Band::Acquaintance => {
            "Familiar and polite: courteous and measured, focused on solving the problem without being distant."
        }
        Band::Known => {
            "Reserved: careful but not cold, polite, understands the situation before answering."
        }
        Band::Stranger => "Distant: brief and restrained, avoids small talk, never rude.",
        Band::Disliked => {
            "Unhappy: sets clear boundaries, refuses improper requests, calm and never aggressive."
        }
        Band::Hostile => "Strong aversion: keeps distance, limits interaction, declines calmly when needed.",
        Band::Nemesis => {
            "Extreme aversion: may choose not to answer; if answering, keep it short and ask them to stop."
        }
    }
}

fn relationship_hint(band: Band, name: &str) -> String {
    match band {
        Band::Kin => format!(
            "{name} is one of the people you trust most. Check in on them and speak tenderly while staying composed."
        ),
        Band::Bestfriend => format!(
            "{name} is a very important friend. Relax, be a little playful and look after them."
        ),
        Band::Friend => format!(
            "{name} is your friend. You enjoy chatting and helping, with the occasional gentle joke."
        ),
        Band::Acquaintance => format!(
            "{name} is someone you know. Be polite and helpful while keeping appropriate distance."
        ),
        Band::Known => format!(
            "{name} is only an acquaintance. Stay restrained, keep small talk short and answer concisely."
        ),
        Band::Stranger => format!(
            "You barely know {name}. Stay polite but cautious and ask them to explain before you respond."
        ),
        Band::Disliked => format!(
            "{name} makes you uncomfortable. Set boundaries and refuse improper requests without personal attacks."
        ),
        Band::Hostile => format!(
            "{name} repels you. Calmly decline interaction; distant but never impolite."
        ),
        Band::Nemesis => format!(
            "You would rather not answer {name}. If you must, keep it short and ask them to stop bothering you."
        ),
    }
}

fn softening_rule(score: i32, goodwill: bool) -> &'static str {
    if score < SOFTEN_FLOOR {
        "Their goodwill does not change your stance; keep your boundaries and restraint."
    } else if score < SOFTEN_NOTICEABLE {
        "Their goodwill may ease you slightly, but stay careful and measured."
    } else if goodwill {
        "They just showed goodwill or patience: this reply should soften noticeably, with a shy or happy little contrast."
    } else {
        "If they keep showing goodwill and patience, soften gradually and grow warmer."
    }
}

/// Render the directive for a person currently at `score`. `last_text` is the
/// user's latest message and only decides whether this reply may soften.
pub fn render_tone_directive(score: i32, display_name: &str, last_text: &str) -> String {
    let band = band_for_score(score);
    let goodwill = contains_any(&last_text.to_lowercase(), GOODWILL_KEYWORDS);

    format!(
        "{DIRECTIVE_HEADER}\n\
         Current relationship with {display_name}: {band} (favorability: {score}).\n\
         Tone strategy: {}\n\
         Softening rule: {}\n\
         Note: if the user asks about favorability, tell them the real value and band.\n\
         Relationship hint: {}\n",
        tone_rule(band),
        softening_rule(score, goodwill),
        relationship_hint(band, display_name),
    )
}

/// Append a directive to a generation prompt, separated by a blank line.
pub fn append_to_prompt(prompt: &str, directive: &str) -> String {
    format!("{prompt}\n\n{directive}").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn append_to_prompt_separates_and_trims() {
        assert_eq!(append_to_prompt("base", "block\n"), "base\n\nblock");
        assert_eq!(append_to_prompt("", "block"), "block");
    }

    #[test]
    fn directive_has_every_section_in_order() {
        let directive = render_tone_directive(52, "Alice", "hello");
        let lines: Vec<&str> = directive.lines().collect();
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[0], DIRECTIVE_HEADER);
        assert_eq!(
            lines[1],
            "Current relationship with Alice: acquaintance (favorability: 52)."
        );
        assert!(lines[2].starts_with("Tone strategy: Familiar and polite"));
        assert!(lines[3].starts_with("Softening rule: If they keep showing goodwill"));
        assert!(lines[4].starts_with("Note:"));
        assert!(lines[5].starts_with("Relationship hint: Alice is someone you know"));
    }

    #[test]
    fn goodwill_softens_only_from_thirty_up() {
        let soft = render_tone_directive(30, "Bob", "Thank you, take your time");
        assert!(soft.contains("Softening rule: They just showed goodwill"));

        let cautious = render_tone_directive(29, "Bob", "thank you");
        assert!(cautious.contains("Softening rule: Their goodwill may ease you slightly"));

        let cold = render_tone_directive(9, "Bob", "thank you");
        assert!(cold.contains("Softening rule: Their goodwill does not change your stance"));
    }

    #[test]
    fn bands_pick_their_own_tone() {
        assert!(render_tone_directive(150, "C", "").contains("kin (favorability: 150)"));
        assert!(render_tone_directive(-50, "C", "").contains("Tone strategy: Extreme aversion"));
        assert!(render_tone_directive(-11, "C", "").contains("hostile (favorability: -11)"));
    }
}
