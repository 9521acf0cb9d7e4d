//! Supported interpreters and package ecosystems

use crate::CodebenchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Scripting languages the runner knows how to launch
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Python,
    JavaScript,
    Ruby,
    Php,
    Shell,
}

impl Language {
    pub const ALL: [Self; 5] = [
        Self::Python,
        Self::JavaScript,
        Self::Ruby,
        Self::Php,
        Self::Shell,
    ];

    /// Default interpreter binary, looked up on `PATH`
    #[must_use]
    pub const fn program(self) -> &'static str {
        match self {
            Self::Python => "python3",
            Self::JavaScript => "node",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Shell => "bash",
        }
    }

    /// Source file extension, without the dot
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::Python => "py",
            Self::JavaScript => "js",
            Self::Ruby => "rb",
            Self::Php => "php",
            Self::Shell => "sh",
        }
    }

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::Ruby => "ruby",
            Self::Php => "php",
            Self::Shell => "shell",
        }
    }

    /// Informational text returned for languages we cannot run
    #[must_use]
    pub fn unsupported_message(requested: &str) -> String {
        let supported: Vec<&str> = Self::ALL.iter().map(|l| l.name()).collect();
        format!(
            "Language {requested} not directly supported. Supported languages: {}\n\n\
             Note: For compiled languages (C, C++, Java, Go, Rust), please install the \
             required compilers/runtimes on the server first.",
            supported.join(", ")
        )
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Language {
    type Err = CodebenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "py" => Ok(Self::Python),
            "javascript" | "js" | "node" => Ok(Self::JavaScript),
            "ruby" | "rb" => Ok(Self::Ruby),
            "php" => Ok(Self::Php),
            "shell" | "sh" | "bash" => Ok(Self::Shell),
            _ => Err(CodebenchError::UnsupportedLanguage(s.to_string())),
        }
    }
}

/// Package managers the installer can drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    /// Python packages via pip
    Pip,
}

impl FromStr for Ecosystem {
    type Err = CodebenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "python" | "pip" => Ok(Self::Pip),
            _ => Err(CodebenchError::UnsupportedEcosystem(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_languages() {
        assert_eq!("python".parse::<Language>().unwrap(), Language::Python);
        assert_eq!("JavaScript".parse::<Language>().unwrap(), Language::JavaScript);
        assert_eq!("sh".parse::<Language>().unwrap(), Language::Shell);
        assert_eq!(Language::Ruby.extension(), "rb");
        assert_eq!(Language::Shell.program(), "bash");
    }

    #[test]
    fn test_unsupported_language() {
        let err = "cobol".parse::<Language>().unwrap_err();
        assert!(matches!(err, CodebenchError::UnsupportedLanguage(ref l) if l == "cobol"));

        let msg = Language::unsupported_message("cobol");
        assert!(msg.starts_with("Language cobol not directly supported"));
        assert!(msg.contains("python, javascript, ruby, php, shell"));
    }

    #[test]
    fn test_parse_ecosystem() {
        assert_eq!("python".parse::<Ecosystem>().unwrap(), Ecosystem::Pip);
        assert!(matches!(
            "npm".parse::<Ecosystem>(),
            Err(CodebenchError::UnsupportedEcosystem(_))
        ));
    }
}
