//! CPF, CNPJ, and CEP extraction, validation, and formatting.

use super::patterns::{CEP, CNPJ, CPF};
use super::FieldExtractor;

/// CPF field extractor.
pub struct CpfExtractor {
    validate: bool,
}

impl CpfExtractor {
    /// Create a new CPF extractor.
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Set whether to validate CPF check digits.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for CpfExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CpfExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<String> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<String> {
        CPF.find_iter(text)
            .map(|m| m.as_str())
            .filter(|raw| !self.validate || validate_cpf(raw))
            .map(format_cpf)
            .collect()
    }
}

/// CNPJ field extractor.
pub struct CnpjExtractor {
    validate: bool,
}

impl CnpjExtractor {
    /// Create a new CNPJ extractor.
    pub fn new() -> Self {
        Self { validate: true }
    }

    /// Set whether to validate CNPJ check digits.
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }
}

impl Default for CnpjExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldExtractor for CnpjExtractor {
    type Output = String;

    fn extract(&self, text: &str) -> Option<String> {
        self.extract_all(text).into_iter().next()
    }

    fn extract_all(&self, text: &str) -> Vec<String> {
        CNPJ.find_iter(text)
            .map(|m| m.as_str())
            .filter(|raw| !self.validate || validate_cnpj(raw))
            .map(format_cnpj)
            .collect()
    }
}

fn digits_of(value: &str) -> Vec<u32> {
    value.chars().filter_map(|c| c.to_digit(10)).collect()
}

/// Check digit for CPF: weighted sum with weights descending to 2,
/// `(sum * 10) mod 11`, where 10 maps to 0.
fn cpf_check_digit(digits: &[u32]) -> u32 {
    let top = digits.len() as u32 + 1;
    let sum: u32 = digits
        .iter()
        .zip((2..=top).rev())
        .map(|(d, w)| d * w)
        .sum();
    match (sum * 10) % 11 {
        10 => 0,
        d => d,
    }
}

/// Validate a CPF using both check digits.
///
/// Repdigit sequences (111.111.111-11 and friends) pass the arithmetic but
/// are not valid CPFs and are rejected.
pub fn validate_cpf(cpf: &str) -> bool {
    let digits = digits_of(cpf);
    if digits.len() != 11 {
        return false;
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    cpf_check_digit(&digits[..9]) == digits[9] && cpf_check_digit(&digits[..10]) == digits[10]
}

/// Check digit for CNPJ: weights cycle 2..=9 from the rightmost position,
/// `11 - (sum mod 11)`, where results of 10 or 11 map to 0.
fn cnpj_check_digit(digits: &[u32]) -> u32 {
    let weights = (0..digits.len()).rev().map(|i| (i as u32 % 8) + 2);
    let sum: u32 = digits.iter().zip(weights).map(|(d, w)| d * w).sum();
    match 11 - (sum % 11) {
        d if d >= 10 => 0,
        d => d,
    }
}

/// Validate a CNPJ using both check digits.
pub fn validate_cnpj(cnpj: &str) -> bool {
    let digits = digits_of(cnpj);
    if digits.len() != 14 {
        return false;
    }
    if digits.iter().all(|&d| d == digits[0]) {
        return false;
    }

    cnpj_check_digit(&digits[..12]) == digits[12] && cnpj_check_digit(&digits[..13]) == digits[13]
}

/// Extract the first (valid) CPF from text.
pub fn extract_cpf(text: &str) -> Option<String> {
    CpfExtractor::new().extract(text)
}

/// Extract the first (valid) CNPJ from text.
pub fn extract_cnpj(text: &str) -> Option<String> {
    CnpjExtractor::new().extract(text)
}

/// Extract the first CEP from text, canonically formatted.
pub fn extract_cep(text: &str) -> Option<String> {
    CEP.find(text).map(|m| format_cep(m.as_str()))
}

/// Format a CPF as XXX.XXX.XXX-XX.
pub fn format_cpf(cpf: &str) -> String {
    let digits: String = cpf.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 11 {
        return cpf.to_string();
    }
    format!(
        "{}.{}.{}-{}",
        &digits[0..3],
        &digits[3..6],
        &digits[6..9],
        &digits[9..11]
    )
}

/// Format a CNPJ as XX.XXX.XXX/XXXX-XX.
pub fn format_cnpj(cnpj: &str) -> String {
    let digits: String = cnpj.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 14 {
        return cnpj.to_string();
    }
    format!(
        "{}.{}.{}/{}-{}",
        &digits[0..2],
        &digits[2..5],
        &digits[5..8],
        &digits[8..12],
        &digits[12..14]
    )
}

/// Format a CEP as XXXXX-XXX.
pub fn format_cep(cep: &str) -> String {
    let digits: String = cep.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        return cep.to_string();
    }
    format!("{}-{}", &digits[0..5], &digits[5..8])
}
