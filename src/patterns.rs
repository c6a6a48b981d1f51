use std::fmt;

use anyhow::{Result, anyhow};
use regex::{Captures, Regex};

/// `layer` followed by a colon. The left edge is either a word boundary or an
/// escaped `\n`/`\r`/`\t` pair, which is how line breaks look inside a JSON
/// string. Whitespace around the colon may also be written as escaped `\n`/`\r`.
const PROPERTY_PREFIX: &str = r"(?:(?P<lead>\\[nrt])|\b)(?P<prop>layer(?:\s|\\[rn])*:(?:\s|\\[rn])*)";

/// A quoted string on one line. The closing quote must be escaped the same way
/// as the opening one, so a `\"`-quoted value never runs past the end of the
/// JSON string it sits in.
const ANY_QUOTED_VALUE: &str =
    r#"(?P<value>\\"(?:[^"\\\n]|\\[^"\n])*?\\"|"(?:[^"\\\n]|\\.)*")"#;

pub const ENUM_NAME: &str = "VfxLayer";

pub const CANONICAL_LAYERS: [&str; 11] = [
    "BACKGROUND_BEHIND",
    "BACKGROUND_STRUCTURES",
    "BACKGROUND_SHADOWS",
    "BACKGROUND_EFFECTS",
    "CHARACTERS_BACK",
    "CHARACTERS",
    "CHARACTERS_FRONT",
    "FOREGROUND_STRUCTURES",
    "FOREGROUND_SHADOWS",
    "FOREGROUND_EFFECTS",
    "FOREGROUND_FRONT",
];

/// String values that older projects used in place of a `VfxLayer` constant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LegacyValue {
    Front,
    Behind,
    Back,
}

impl LegacyValue {
    /// Rewrite order. Each pass runs on the output of the previous one.
    pub const REWRITE_ORDER: [LegacyValue; 3] =
        [LegacyValue::Front, LegacyValue::Behind, LegacyValue::Back];

    pub fn literal(self) -> &'static str {
        match self {
            LegacyValue::Front => "front",
            LegacyValue::Behind => "behind",
            LegacyValue::Back => "back",
        }
    }

    pub fn canonical(self) -> &'static str {
        match self {
            LegacyValue::Front => "CHARACTERS_FRONT",
            LegacyValue::Behind | LegacyValue::Back => "CHARACTERS_BACK",
        }
    }

    pub fn replacement(self) -> String {
        format!("{ENUM_NAME}.{}", self.canonical())
    }
}

impl fmt::Display for LegacyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layer: \"{}\"", self.literal())
    }
}

#[derive(Debug, Clone)]
pub struct LayerPatterns {
    bare: Regex,
    front: Regex,
    behind: Regex,
    back: Regex,
    unrecognized: Regex,
    canonical: Regex,
}

impl LayerPatterns {
    pub fn new() -> Result<Self> {
        let canonical_names = CANONICAL_LAYERS.join("|");
        Ok(Self {
            bare: compile(PROPERTY_PREFIX)?,
            front: compile(&legacy_pattern(LegacyValue::Front))?,
            behind: compile(&legacy_pattern(LegacyValue::Behind))?,
            back: compile(&legacy_pattern(LegacyValue::Back))?,
            unrecognized: compile(&format!(
                r"(?P<open>/\*)?{PROPERTY_PREFIX}{ANY_QUOTED_VALUE}"
            ))?,
            canonical: compile(&format!(
                r"{PROPERTY_PREFIX}(?P<value>{ENUM_NAME}\.(?:{canonical_names})\b)"
            ))?,
        })
    }

    /// Any `layer:` assignment, regardless of its value.
    pub fn bare(&self) -> &Regex {
        &self.bare
    }

    pub fn legacy(&self, value: LegacyValue) -> &Regex {
        match value {
            LegacyValue::Front => &self.front,
            LegacyValue::Behind => &self.behind,
            LegacyValue::Back => &self.back,
        }
    }

    /// Quoted values that are not one of the legacy strings. Only meaningful
    /// after the legacy passes have run.
    pub fn unrecognized(&self) -> &Regex {
        &self.unrecognized
    }

    pub fn canonical(&self) -> &Regex {
        &self.canonical
    }

    /// Whether the assignment starting at `start` is one the rewriter handles
    /// or one that is already correct.
    pub fn covers_at(&self, line: &str, start: usize) -> bool {
        [
            &self.front,
            &self.back,
            &self.behind,
            &self.unrecognized,
            &self.canonical,
        ]
        .into_iter()
        .any(|regex| {
            regex
                .find_at(line, start)
                .is_some_and(|found| found.start() == start)
        })
    }
}

/// Rebuilds a legacy match with the value swapped for its `VfxLayer` constant.
pub fn legacy_replacement(caps: &Captures<'_>, value: LegacyValue) -> String {
    format!(
        "{}{}{}",
        group(caps, "lead"),
        group(caps, "prop"),
        value.replacement()
    )
}

/// Wraps an unrecognized assignment in a block comment. Returns `None` when
/// the match already sits right after a `/*`.
pub fn commented_out(caps: &Captures<'_>) -> Option<String> {
    if caps.name("open").is_some() {
        return None;
    }
    Some(format!(
        "{}/*{}{}*/",
        group(caps, "lead"),
        group(caps, "prop"),
        group(caps, "value")
    ))
}

fn group<'h>(caps: &Captures<'h>, name: &str) -> &'h str {
    caps.name(name).map(|m| m.as_str()).unwrap_or("")
}

fn legacy_pattern(value: LegacyValue) -> String {
    format!(r#"{PROPERTY_PREFIX}(?P<value>\\?"{}\\?")"#, value.literal())
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|err| anyhow!("invalid pattern: {err}"))
}
