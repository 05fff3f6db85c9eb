//! Speech collaborators: synthesis for reading answers aloud, recognition
//! for dictating prompts.

pub mod recognition;
pub mod synthesis;

pub use recognition::{
    Dictation, SpeechRecognizer, TranscriptStream, UnavailableRecognizer, dictate,
};
pub use synthesis::{CommandSpeech, SpeechFuture, SpeechSynthesizer, Voice};
