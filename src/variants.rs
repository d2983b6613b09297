//! Vehicle variant listings to HTML.
//!
//! Input is pasted text with one trim per line, for example
//! `Mahindra XEV 9e Pack One (Electric)Rs.21.90 Lakh*, 59 kWh, 542 km, 228 bhp`.

use crate::error::{EngineError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListingFormat {
    /// Name is the text before `Rs.` (or before `<price> Lakh`), else the whole line.
    #[default]
    Lenient,
    /// Name is the text before `(Electric)`.
    Electric,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct VariantListing {
    pub name: String,
    /// Price in lakh, without unit (e.g. `21.90`)
    pub price: String,
    /// e.g. `59 kWh`
    pub battery: String,
    /// e.g. `542 km`
    pub range: String,
}

/// Compiled patterns for one [`ListingFormat`].
pub struct ListingParser {
    format: ListingFormat,
    lakh_split: Regex,
    electric_name: Regex,
    kw_spaced: Regex,
    kw_bare: Regex,
    price_rs: Regex,
    price_lakh: Regex,
    battery: Regex,
    range: Regex,
}

impl ListingParser {
    pub fn new(format: ListingFormat) -> Result<Self> {
        let case_sensitive = format == ListingFormat::Electric;
        let flags = if case_sensitive { "" } else { "(?i)" };
        Ok(Self {
            format,
            lakh_split: Regex::new(r"(?i)\d+\.?\d*\s*Lakh")?,
            electric_name: Regex::new(r"^(.*?)\s*\(Electric\)")?,
            kw_spaced: Regex::new(r"(?i)(\d+\.?\d*)\s*kw\s+")?,
            kw_bare: Regex::new(if case_sensitive {
                r"(?i)(\d+\.?\d*)kw"
            } else {
                r"(?i)(\d+\.?\d*)\s*kw\b"
            })?,
            price_rs: Regex::new(if case_sensitive {
                r"Rs\.([\d.]+)"
            } else {
                r"(?i)Rs\.?\s*([\d.]+)\s*Lakh"
            })?,
            price_lakh: Regex::new(r"(?i)([\d.]+)\s*Lakh")?,
            battery: Regex::new(&format!(r"{}(\d+\.?\d*)\s*kWh", flags))?,
            range: Regex::new(&format!(r"{}(\d+)\s*km", flags))?,
        })
    }

    fn extract_name(&self, line: &str) -> String {
        match self.format {
            ListingFormat::Electric => {
                let name = self
                    .electric_name
                    .captures(line)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().trim().to_string())
                    .unwrap_or_default();
                self.kw_bare.replace_all(&name, "${1}kW").into_owned()
            }
            ListingFormat::Lenient => {
                let raw = if let Some((before, _)) = line.split_once("Rs.") {
                    before
                } else if line.contains("Lakh") {
                    self.lakh_split.split(line).next().unwrap_or(line)
                } else {
                    line
                };
                let name = raw.trim().trim_end_matches([',', '*']).trim();
                let name = self.kw_spaced.replace_all(name, "${1}kW ");
                self.kw_bare.replace_all(&name, "${1}kW").into_owned()
            }
        }
    }

    fn extract_price(&self, line: &str) -> String {
        let caps = self.price_rs.captures(line).or_else(|| match self.format {
            ListingFormat::Lenient => self.price_lakh.captures(line),
            ListingFormat::Electric => None,
        });
        caps.and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    }

    fn extract_with_unit(re: &Regex, line: &str, unit: &str) -> String {
        re.captures(line)
            .and_then(|c| c.get(1))
            .map(|m| format!("{} {}", m.as_str(), unit))
            .unwrap_or_default()
    }

    /// Extract one listing. Fields that are not found are left empty.
    pub fn parse_line(&self, line: &str) -> VariantListing {
        VariantListing {
            name: self.extract_name(line),
            price: self.extract_price(line),
            battery: Self::extract_with_unit(&self.battery, line, "kWh"),
            range: Self::extract_with_unit(&self.range, line, "km"),
        }
    }

    /// Parse every non-blank line.
    ///
    /// Fails with `EmptyInput` when there are no lines and with
    /// `NoVariantsExtracted` when no line yields a name.
    pub fn parse(&self, text: &str) -> Result<Vec<VariantListing>> {
        let lines: Vec<&str> = text
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        if lines.is_empty() {
            return Err(EngineError::EmptyInput(
                "paste at least one variant line".to_string(),
            ));
        }
        let listings: Vec<VariantListing> = lines.iter().map(|l| self.parse_line(l)).collect();
        for (i, (line, listing)) in lines.iter().zip(&listings).enumerate() {
            if listing.name.is_empty() {
                log::warn!("line {}: could not extract variant name: {}", i + 1, line);
            } else {
                log::debug!("line {}: {:?}", i + 1, listing);
            }
        }
        if listings.iter().all(|l| l.name.is_empty()) {
            return Err(EngineError::NoVariantsExtracted {
                lines: lines.len(),
            });
        }
        Ok(listings)
    }
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render the collapsible variant block.
pub fn render_html(listings: &[VariantListing]) -> String {
    let mut html = format!(
        "<div class=\"variant-toggle\">\n  <span class=\"variant-count-text\">{} Variants Available</span>\n  <span class=\"arrow\">▼</span>\n</div>\n\n<div class=\"variant-content\">\n",
        listings.len()
    );
    for listing in listings {
        html.push_str(&format!(
            "  <div class=\"variant-item\">\n    <span>{}</span>\n    <span>₹{} Lakh | {} | {}</span>\n  </div>\n\n",
            escape_html(&listing.name),
            escape_html(&listing.price),
            escape_html(&listing.battery),
            escape_html(&listing.range)
        ));
    }
    html.push_str("</div>");
    html
}
