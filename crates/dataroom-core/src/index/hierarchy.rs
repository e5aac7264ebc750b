//! Fund / portfolio / company level tagging
//!
//! Dataroom documents mix statements about the fund itself, its portfolio as a
//! whole, and individual companies. Tags are a keyword heuristic and only
//! steer ranking; they are never used to drop content.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

lazy_static! {
    static ref PORTFOLIO_COMPANY_RE: Regex =
        Regex::new(r"(?i)\bportfolio\s+company\b").unwrap();
    static ref FUND_RE: Regex = Regex::new(
        r"(?i)\b(limited\s+partners?|management\s+fees?|fund\s+size|capital\s+calls?|funds?|LPs?|GPs?|carry|vintage|commitments?)\b"
    )
    .unwrap();
    static ref PORTFOLIO_RE: Regex = Regex::new(
        r"(?i)\b(portfolio\s+companies|investments\s+to\s+date|portfolios?|holdings)\b"
    )
    .unwrap();
    static ref COMPANY_RE: Regex = Regex::new(
        r"(?i)\b(company|startups?|founders?|revenue|ARR|series|rounds?|valuations?|customers?|products?)\b"
    )
    .unwrap();
}

/// Organizational level a chunk or query refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HierarchyLevel {
    Fund,
    Portfolio,
    Company,
    #[default]
    General,
}

impl HierarchyLevel {
    pub const ALL: [HierarchyLevel; 4] = [
        HierarchyLevel::Fund,
        HierarchyLevel::Portfolio,
        HierarchyLevel::Company,
        HierarchyLevel::General,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HierarchyLevel::Fund => "fund",
            HierarchyLevel::Portfolio => "portfolio",
            HierarchyLevel::Company => "company",
            HierarchyLevel::General => "general",
        }
    }

    /// Lenient parse of a level word, ignoring case and surrounding punctuation
    pub fn parse(s: &str) -> Option<Self> {
        let word = s
            .trim()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();
        match word.as_str() {
            "fund" => Some(HierarchyLevel::Fund),
            "portfolio" => Some(HierarchyLevel::Portfolio),
            "company" => Some(HierarchyLevel::Company),
            "general" => Some(HierarchyLevel::General),
            _ => None,
        }
    }

    pub fn is_general(&self) -> bool {
        matches!(self, HierarchyLevel::General)
    }
}

impl fmt::Display for HierarchyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a piece of text by keyword counts.
///
/// Highest count wins; ties go to company, then portfolio, then fund.
/// "portfolio company" counts toward company only.
pub fn classify_text(text: &str) -> HierarchyLevel {
    let normalized = PORTFOLIO_COMPANY_RE.replace_all(text, "company");

    let fund = FUND_RE.find_iter(&normalized).count();
    let portfolio = PORTFOLIO_RE.find_iter(&normalized).count();
    let company = COMPANY_RE.find_iter(&normalized).count();

    let best = fund.max(portfolio).max(company);
    if best == 0 {
        HierarchyLevel::General
    } else if company == best {
        HierarchyLevel::Company
    } else if portfolio == best {
        HierarchyLevel::Portfolio
    } else {
        HierarchyLevel::Fund
    }
}

/// Tag a chunk from its section label, then document name, then text.
///
/// The first source that yields a non-general level decides.
pub fn tag_chunk(section_label: Option<&str>, document_name: &str, text: &str) -> HierarchyLevel {
    section_label
        .into_iter()
        .chain([document_name, text])
        .map(classify_text)
        .find(|level| !level.is_general())
        .unwrap_or(HierarchyLevel::General)
}
