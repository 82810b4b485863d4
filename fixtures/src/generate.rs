//! Random AMPL program generator.
//!
//! Produces token soup rather than valid programs: the output is meant for
//! scanner fixtures, where every lexeme class (strings, numbers, operators,
//! reserved words, identifiers, stray characters, whitespace and nested
//! comments) should show up in unusual combinations.

use crate::layout::ProjectLayout;
use crate::{FixtureError, FixtureResult};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// AMPL reserved words
pub const RESERVED_WORDS: &[&str] = &[
    "and", "array", "bool", "chillax", "elif", "else", "end", "false", "if", "input", "int", "let",
    "main", "not", "or", "output", "program", "rem", "return", "true", "while",
];

/// AMPL operators and delimiters
pub const OPERATORS: &[&str] = &[
    "{", "}", "(", ")", "*", ",", "-", "..", "/", "/=", ":", ";", "<", "<=", "=", ">", ">=", "[",
    "]", "+",
];

const ALPHANUMERIC: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";
const STRING_CHARS: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789 ";
const WHITESPACE: &[u8] = b"\n\t\x0b\r\x0c ";
const IDENT_STARTS: &[u8] = b"_abcd";
const STRAY_CHARS: &[&str] = &["!", ".", "%", "#"];

/// Chance of stopping after each element, giving programs of ~140 elements
pub const DEFAULT_STOP_PROBABILITY: f64 = 0.007;

/// Lexeme classes, drawn uniformly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Element {
    Str,
    Number,
    Operator,
    ReservedWord,
    Whitespace,
    Other,
    Comment,
}

const ELEMENTS: &[Element] = &[
    Element::Str,
    Element::Number,
    Element::Operator,
    Element::ReservedWord,
    Element::Whitespace,
    Element::Other,
    Element::Comment,
];

/// Generator of random AMPL source text
pub struct ProgramGenerator<R: Rng = StdRng> {
    rng: R,
    stop_probability: f64,
}

impl ProgramGenerator<StdRng> {
    /// Generator with a fixed seed, for reproducible fixture sets
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }

    pub fn from_entropy() -> Self {
        Self::new(StdRng::from_entropy())
    }
}

impl<R: Rng> ProgramGenerator<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            stop_probability: DEFAULT_STOP_PROBABILITY,
        }
    }

    pub fn with_stop_probability(mut self, probability: f64) -> Self {
        self.stop_probability = probability.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    /// Generate one program
    pub fn generate(&mut self) -> String {
        let mut code = String::new();
        while self.rng.gen::<f64>() > self.stop_probability {
            let element = ELEMENTS[self.rng.gen_range(0..ELEMENTS.len())];
            self.push_element(element, &mut code);
        }
        code
    }

    fn push_element(&mut self, element: Element, code: &mut String) {
        match element {
            Element::Str => {
                let len = self.rng.gen_range(1..=20);
                code.push('"');
                code.push_str(&self.random_chars(STRING_CHARS, len));
                code.push_str("\"\n");
            }
            Element::Number => {
                code.push_str(&self.rng.gen_range(1..=100).to_string());
                code.push('\n');
            }
            Element::Operator => {
                code.push_str(self.pick(OPERATORS));
                code.push('\n');
            }
            Element::ReservedWord => {
                // One extra slot for a user-defined identifier
                let slot = self.rng.gen_range(0..=RESERVED_WORDS.len());
                if slot == RESERVED_WORDS.len() {
                    let len = self.rng.gen_range(1..=10);
                    code.push('_');
                    code.push_str(&self.random_chars(ALPHANUMERIC, len));
                } else {
                    code.push_str(RESERVED_WORDS[slot]);
                }
                code.push('\n');
            }
            Element::Whitespace => {
                for _ in 0..5 {
                    code.push(self.pick_byte(WHITESPACE) as char);
                }
            }
            Element::Other => {
                if self.rng.gen::<f64>() > 0.01 {
                    let len = self.rng.gen_range(1..=10);
                    code.push(self.pick_byte(IDENT_STARTS) as char);
                    code.push_str(&self.random_chars(ALPHANUMERIC, len));
                    code.push('\n');
                } else {
                    code.push_str(self.pick(STRAY_CHARS));
                }
            }
            Element::Comment => {
                code.push('{');
                if self.rng.gen::<f64>() < 0.3 {
                    code.push_str("      {   }");
                } else if self.rng.gen::<f64>() < 0.3 {
                    code.push_str("    \n     { \n \t \t \n }");
                } else if self.rng.gen::<f64>() < 0.05 {
                    // Unbalanced nesting: leaves the comment open
                    code.push_str(" { \n");
                }
                code.push('}');
            }
        }
    }

    fn pick<'a>(&mut self, items: &[&'a str]) -> &'a str {
        items[self.rng.gen_range(0..items.len())]
    }

    fn pick_byte(&mut self, bytes: &[u8]) -> u8 {
        bytes[self.rng.gen_range(0..bytes.len())]
    }

    fn random_chars(&mut self, alphabet: &[u8], len: usize) -> String {
        (0..len).map(|_| self.pick_byte(alphabet) as char).collect()
    }
}

/// Write generated programs to `tests/{n}.ampl` for every `n` in `start..end`.
///
/// Existing fixtures are never overwritten; hitting one stops the run with
/// [`FixtureError::AlreadyExists`].
pub fn write_fixtures<R: Rng>(
    layout: &ProjectLayout,
    start: u32,
    end: u32,
    generator: &mut ProgramGenerator<R>,
) -> FixtureResult<Vec<PathBuf>> {
    if start > end {
        return Err(FixtureError::InvalidRange { start, end });
    }

    fs::create_dir_all(layout.inputs_dir())?;
    let mut written = Vec::new();

    for number in start..end {
        let path = layout.input(number);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                return Err(FixtureError::AlreadyExists { path });
            }
            Err(e) => return Err(e.into()),
        };
        let program = generator.generate();
        file.write_all(program.as_bytes())?;
        debug!("Wrote {} ({} bytes)", path.display(), program.len());
        written.push(path);
    }

    info!("Generated {} fixtures in {}", written.len(), layout.inputs_dir().display());
    Ok(written)
}
