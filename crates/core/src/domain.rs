//! Enumerations and format rules shared by the attendance entities.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Level {
    #[serde(rename = "L_100")]
    L100,
    #[serde(rename = "L_200")]
    L200,
    #[serde(rename = "L_300")]
    L300,
    #[serde(rename = "L_400")]
    L400,
    #[serde(rename = "L_500")]
    L500,
    #[serde(rename = "L_600")]
    L600,
    #[serde(rename = "L_700")]
    L700,
    #[serde(rename = "L_800")]
    L800,
    #[serde(rename = "L_900")]
    L900,
    #[serde(rename = "L_1000")]
    L1000,
}

impl Level {
    pub const ALL: [Level; 10] = [
        Self::L100,
        Self::L200,
        Self::L300,
        Self::L400,
        Self::L500,
        Self::L600,
        Self::L700,
        Self::L800,
        Self::L900,
        Self::L1000,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L100 => "L_100",
            Self::L200 => "L_200",
            Self::L300 => "L_300",
            Self::L400 => "L_400",
            Self::L500 => "L_500",
            Self::L600 => "L_600",
            Self::L700 => "L_700",
            Self::L800 => "L_800",
            Self::L900 => "L_900",
            Self::L1000 => "L_1000",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|level| level.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Semester {
    First,
    Second,
}

impl Semester {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::First => "FIRST",
            Self::Second => "SECOND",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "FIRST" => Some(Self::First),
            "SECOND" => Some(Self::Second),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "MALE",
            Self::Female => "FEMALE",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "MALE" => Some(Self::Male),
            "FEMALE" => Some(Self::Female),
            _ => None,
        }
    }
}

/// Upper-case `name`, drop the first occurrence of each prefix in order, and trim.
///
/// `strip_title("Faculty of Science", &["FACULTY OF", "FACULTY"])` is `"SCIENCE"`.
pub fn strip_title(name: &str, prefixes: &[&str]) -> String {
    let mut upper = name.to_uppercase();
    for prefix in prefixes {
        upper = upper.replacen(prefix, "", 1);
    }
    upper.trim().to_string()
}

/// Upper-case a course code and drop everything that is not a letter or digit.
pub fn normalize_course_code(code: &str) -> String {
    code.chars()
        .filter(char::is_ascii_alphanumeric)
        .collect::<String>()
        .to_uppercase()
}

/// One or more letters followed by one or more digits, e.g. `CSC101`.
pub fn is_course_code(code: &str) -> bool {
    let digits_at = match code.find(|c: char| c.is_ascii_digit()) {
        Some(i) => i,
        None => return false,
    };
    let (letters, digits) = code.split_at(digits_at);
    !letters.is_empty()
        && letters.chars().all(|c| c.is_ascii_alphabetic())
        && digits.chars().all(|c| c.is_ascii_digit())
}

/// Academic session such as `2023/2024`.
pub fn is_session(session: &str) -> bool {
    let bytes = session.as_bytes();
    bytes.len() == 9
        && bytes[4] == b'/'
        && bytes[..4].iter().all(u8::is_ascii_digit)
        && bytes[5..].iter().all(u8::is_ascii_digit)
}

/// De-duplicate (keeping first occurrence), drop invalid levels, and fall back
/// to `L_100` when nothing valid remains.
pub fn normalize_levels(levels: &[String]) -> Vec<Level> {
    let mut out: Vec<Level> = Vec::new();
    for level in levels.iter().filter_map(|l| Level::parse(l)) {
        if !out.contains(&level) {
            out.push(level);
        }
    }
    if out.is_empty() {
        out.push(Level::L100);
    }
    out
}
