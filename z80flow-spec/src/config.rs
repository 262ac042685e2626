//! # Configuration for disassembly and label synthesis
//!
//! All naming and number formatting choices are carried by an explicit
//! [`DisassemblerConfig`] value that is handed to the decoder, the formatter
//! and the label assigner. Nothing here is global state.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between a block label and a local label (`SUB_8000.L1`).
pub const LOCAL_SEPARATOR: char = '.';

/// Prefixes used when label names are synthesized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelPrefixes {
    /// Subroutine entry (`SUB_8000`)
    pub sub: String,
    /// Jump target that is not a subroutine (`LBL_8000`)
    pub lbl: String,
    /// Subroutine entry at an RST vector (`RST_38`)
    pub rst: String,
    /// Referenced data (`DATA_9000`)
    pub data: String,
    /// Referenced code that is not an instruction target (`CODE_8005`)
    pub code: String,
    /// Local label inside a block (`.L1`)
    pub local: String,
    /// Local loop root inside a block (`.LOOP`)
    pub local_loop: String,
}

impl Default for LabelPrefixes {
    fn default() -> Self {
        Self {
            sub: "SUB_".to_string(),
            lbl: "LBL_".to_string(),
            rst: "RST_".to_string(),
            data: "DATA_".to_string(),
            code: "CODE_".to_string(),
            local: "L".to_string(),
            local_loop: "LOOP".to_string(),
        }
    }
}

impl LabelPrefixes {
    fn entries(&self) -> [(&'static str, &str); 7] {
        [
            ("sub", &self.sub),
            ("lbl", &self.lbl),
            ("rst", &self.rst),
            ("data", &self.data),
            ("code", &self.code),
            ("local", &self.local),
            ("local_loop", &self.local_loop),
        ]
    }

    /// Validate prefixes
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, prefix) in self.entries() {
            if prefix.is_empty() {
                return Err(ConfigError::EmptyPrefix(name));
            }
            if prefix.contains(LOCAL_SEPARATOR) || prefix.chars().any(char::is_whitespace) {
                return Err(ConfigError::InvalidPrefixChar {
                    name,
                    prefix: prefix.to_string(),
                });
            }
        }

        // Global prefixes must stay distinguishable
        let entries = self.entries();
        let globals = &entries[..5];
        for (i, &(name_a, a)) in globals.iter().enumerate() {
            for &(name_b, b) in &globals[i + 1..] {
                if a == b {
                    return Err(ConfigError::DuplicatePrefix {
                        first: name_a,
                        second: name_b,
                    });
                }
            }
        }

        Ok(())
    }
}

/// How numbers are rendered in disassembly text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberFormat {
    pub hex_prefix: String,
    pub hex_suffix: String,
    /// Lowercase hex digits
    pub lowercase: bool,
}

impl Default for NumberFormat {
    fn default() -> Self {
        Self {
            hex_prefix: String::new(),
            hex_suffix: "h".to_string(),
            lowercase: false,
        }
    }
}

impl NumberFormat {
    /// Format a byte as two hex digits
    pub fn byte(&self, value: u8) -> String {
        self.hex(value as u16, 2)
    }

    /// Format a word as four hex digits
    pub fn word(&self, value: u16) -> String {
        self.hex(value, 4)
    }

    fn hex(&self, value: u16, width: usize) -> String {
        let digits = if self.lowercase {
            format!("{:0width$x}", value, width = width)
        } else {
            format!("{:0width$X}", value, width = width)
        };
        // Suffixed hex must start with a digit or assemblers read a symbol
        let zero = if !self.hex_suffix.is_empty()
            && digits.starts_with(|c: char| c.is_ascii_alphabetic())
        {
            "0"
        } else {
            ""
        };
        format!("{}{}{}{}", self.hex_prefix, zero, digits, self.hex_suffix)
    }
}

/// Complete configuration of one analysis run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DisassemblerConfig {
    pub labels: LabelPrefixes,
    pub numbers: NumberFormat,
    /// Decode the ZX Spectrum Next extended ED opcodes
    pub z80n: bool,
    /// Render mnemonics in lowercase (labels keep their case)
    pub lowercase_mnemonics: bool,
}

impl DisassemblerConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.labels.validate()
    }
}

impl fmt::Display for DisassemblerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Config {{ sub: {}, lbl: {}, rst: {}, data: {}, code: {}, local: .{}/.{}, hex: {}XX{}, z80n: {} }}",
            self.labels.sub,
            self.labels.lbl,
            self.labels.rst,
            self.labels.data,
            self.labels.code,
            self.labels.local,
            self.labels.local_loop,
            self.numbers.hex_prefix,
            self.numbers.hex_suffix,
            self.z80n,
        )
    }
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("label prefix '{0}' must not be empty")]
    EmptyPrefix(&'static str),

    #[error("label prefix '{name}' ({prefix:?}) must not contain whitespace or '.'")]
    InvalidPrefixChar { name: &'static str, prefix: String },

    #[error("label prefixes '{first}' and '{second}' are identical")]
    DuplicatePrefix {
        first: &'static str,
        second: &'static str,
    },
}
