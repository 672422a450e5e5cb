//! Local regex extraction of structured fields.
//!
//! Extracts the obvious, rigidly-formatted fields (document numbers, postal
//! codes, dates, amounts) before the LLM is ever called, keyed off schema
//! field names and descriptions.

pub mod dates;
pub mod documents;
pub mod patterns;

pub use dates::{extract_all_dates, extract_first_date};
pub use documents::{
    extract_cep, extract_cnpj, extract_cpf, format_cep, format_cnpj, format_cpf, validate_cnpj,
    validate_cpf, CnpjExtractor, CpfExtractor,
};

use tracing::debug;

use crate::models::extraction::{ExtractedFields, ExtractionSchema};
use patterns::{CEP, DATE_BR, EMAIL, ENROLLMENT, MONETARY, PHONE, SMALL_NUMBER};

/// Trait for field extractors.
pub trait FieldExtractor {
    /// The type of value this extractor produces.
    type Output;

    /// Extract the field from text.
    fn extract(&self, text: &str) -> Option<Self::Output>;

    /// Extract all occurrences of the field.
    fn extract_all(&self, text: &str) -> Vec<Self::Output>;
}

/// Maps schema fields onto regex extractions.
pub struct PatternMatcher {
    validate_documents: bool,
}

impl PatternMatcher {
    /// Create a matcher with document-number validation enabled.
    pub fn new() -> Self {
        Self {
            validate_documents: true,
        }
    }

    /// Set whether CPF/CNPJ check digits are validated.
    pub fn with_document_validation(mut self, validate: bool) -> Self {
        self.validate_documents = validate;
        self
    }

    /// Extract every schema field a pattern can answer locally.
    ///
    /// Fields with no local match are simply absent from the output; the
    /// LLM remains responsible for them.
    pub fn extract_structured_fields(
        &self,
        text: &str,
        schema: &ExtractionSchema,
    ) -> ExtractedFields {
        let mut extracted = ExtractedFields::new();

        for (field_name, description) in schema {
            if let Some(value) = self.match_field(field_name, description, text) {
                extracted.insert(field_name.clone(), serde_json::Value::String(value));
            }
        }

        if !extracted.is_empty() {
            debug!(fields = extracted.len(), "extracted fields locally");
        }
        extracted
    }

    /// Share of schema fields answered locally, 0.0 to 1.0.
    pub fn extraction_confidence(extracted: &ExtractedFields, schema: &ExtractionSchema) -> f32 {
        if schema.is_empty() {
            return 0.0;
        }
        let found = extracted.values().filter(|v| !v.is_null()).count();
        found as f32 / schema.len() as f32
    }

    /// A branch that finds nothing falls through to the next candidate
    /// pattern, so a field like "cpf_ou_cnpj" tries both.
    fn match_field(&self, field_name: &str, description: &str, text: &str) -> Option<String> {
        let field = field_name.to_lowercase();
        let desc = description.to_lowercase();
        let mentions = |needle: &str| field.contains(needle) || desc.contains(needle);

        if mentions("cpf") {
            if let Some(cpf) = CpfExtractor::new()
                .with_validation(self.validate_documents)
                .extract(text)
            {
                return Some(cpf);
            }
        }

        if mentions("cnpj") {
            if let Some(cnpj) = CnpjExtractor::new()
                .with_validation(self.validate_documents)
                .extract(text)
            {
                return Some(cnpj);
            }
        }

        if mentions("cep") {
            if let Some(cep) = extract_cep(text) {
                return Some(cep);
            }
        }

        if mentions("telefone") || field.contains("fone") {
            if let Some(m) = PHONE.find(text) {
                let value = m.as_str().trim().to_string();
                // An 8-digit hit is a CEP, not a phone: real phones have 10 or more.
                let digit_count = value.chars().filter(char::is_ascii_digit).count();
                return (digit_count >= 10).then_some(value);
            }
        }

        if mentions("email") || field.contains("e-mail") {
            if let Some(m) = EMAIL.find(text) {
                return Some(m.as_str().to_lowercase());
            }
        }

        // First date only; when several exist the LLM picks per field.
        if field.contains("data") || desc.contains("vencimento") || desc.contains("referencia") {
            if let Some(date) = extract_first_date(text) {
                return Some(date);
            }
        }

        if field.contains("parcela") || field.contains("quantidade") || field.contains("total_de") {
            if let Some(count) =
                number_in_context(text, &["parcela", "total", "quantidade", "saldo"])
            {
                return Some(count);
            }
        }

        if field.contains("inscricao") || field.contains("inscrição") {
            return self.enrollment_number(text);
        }

        if field.contains("valor")
            || field.contains("parcela")
            || field.contains("preco")
            || field.contains("preço")
        {
            if let Some(m) = MONETARY.find(text) {
                return Some(m.as_str().trim().to_string());
            }
        }

        None
    }

    /// 5-6 digit number that is not sitting in address context.
    fn enrollment_number(&self, text: &str) -> Option<String> {
        for m in ENROLLMENT.find_iter(text) {
            let context = context_window(text, m.start(), m.end(), 50).to_lowercase();
            if !context.contains("cep")
                && !context.contains("endereco")
                && !context.contains("endereço")
            {
                return Some(m.as_str().to_string());
            }
        }
        None
    }
}

impl Default for PatternMatcher {
    fn default() -> Self {
        Self::new()
    }
}

/// Small number (1-3 digits) appearing near one of `keywords`.
///
/// Captures "96 parcelas", "total: 96" and the like, while rejecting digits
/// that belong to postal codes or dates in the same window.
pub fn number_in_context(text: &str, keywords: &[&str]) -> Option<String> {
    for m in SMALL_NUMBER.find_iter(text) {
        let context = context_window(text, m.start(), m.end(), 50);

        if CEP.is_match(context) || DATE_BR.is_match(context) {
            continue;
        }

        let lowered = context.to_lowercase();
        if keywords.iter().any(|k| lowered.contains(&k.to_lowercase())) {
            return Some(m.as_str().to_string());
        }
    }
    None
}

/// Slice of `text` around `[start, end)` padded by `pad` bytes, clamped to
/// char boundaries.
fn context_window(text: &str, start: usize, end: usize, pad: usize) -> &str {
    let mut from = start.saturating_sub(pad);
    while from > 0 && !text.is_char_boundary(from) {
        from -= 1;
    }
    let mut to = (end + pad).min(text.len());
    while to < text.len() && !text.is_char_boundary(to) {
        to += 1;
    }
    &text[from..to]
}
