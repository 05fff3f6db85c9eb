//! System instruction assembly.

use crate::chat::core::config::{Complexity, Length, ResponseConfig, Tone};

/// Persona preamble every conversational request starts with.
pub const PERSONA_PREAMBLE: &str = "You are Lumina, a helpful, advanced, and intelligent AI assistant. Your interface is dark, sleek, and premium. Respond with clarity, using Markdown for formatting where appropriate.";

/// Style sentence for a tone.
#[must_use]
pub const fn tone_instruction(tone: Tone) -> &'static str {
    match tone {
        Tone::Professional => "Maintain a professional, objective, and polite tone.",
        Tone::Casual => {
            "Use a casual, friendly, and conversational tone. You can use idioms and contractions."
        }
        Tone::Witty => "Be witty, clever, and slightly humorous in your responses.",
        Tone::Formal => "Use strict formal language, avoiding contractions and slang.",
        Tone::Empathetic => "Be supportive, understanding, and empathetic.",
    }
}

/// Style sentence for a length.
#[must_use]
pub const fn length_instruction(length: Length) -> &'static str {
    match length {
        Length::Concise => "Keep responses brief, to the point, and avoid unnecessary fluff.",
        Length::Standard => "Provide standard length responses, balancing detail with brevity.",
        Length::Detailed => "Provide comprehensive, in-depth, and detailed responses.",
    }
}

/// Style sentence for a complexity.
#[must_use]
pub const fn complexity_instruction(complexity: Complexity) -> &'static str {
    match complexity {
        Complexity::Simple => {
            "Explain concepts simply, suitable for a general audience or beginners. Avoid jargon."
        }
        Complexity::Standard => "Use standard complexity, suitable for an educated audience.",
        Complexity::Technical => {
            "Use technical language and deep domain expertise. Assume the user is an expert."
        }
    }
}

/// Full system instruction for a conversational request.
#[must_use]
pub fn build_system_instruction(config: &ResponseConfig) -> String {
    let mut instruction = String::from(PERSONA_PREAMBLE);

    if let Some(custom) = config
        .custom_system_instruction
        .as_deref()
        .filter(|custom| !custom.trim().is_empty())
    {
        instruction.push_str("\n\nIMPORTANT USER INSTRUCTIONS:\n");
        instruction.push_str(custom);
    }

    instruction.push_str("\n\nStyle Guide:\n- Tone: ");
    instruction.push_str(tone_instruction(config.tone));
    instruction.push_str("\n- Length: ");
    instruction.push_str(length_instruction(config.length));
    instruction.push_str("\n- Complexity: ");
    instruction.push_str(complexity_instruction(config.complexity));
    instruction
}
