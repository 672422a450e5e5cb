//! Common regex patterns for Brazilian document extraction.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // CPF (individual taxpayer ID): 000.000.000-00, punctuation optional
    pub static ref CPF: Regex = Regex::new(
        r"\b\d{3}\.?\d{3}\.?\d{3}-?\d{2}\b"
    ).unwrap();

    // CNPJ (company taxpayer ID): 00.000.000/0000-00, punctuation optional
    pub static ref CNPJ: Regex = Regex::new(
        r"\b\d{2}\.?\d{3}\.?\d{3}/?\d{4}-?\d{2}\b"
    ).unwrap();

    // CEP (postal code): 00000-000
    pub static ref CEP: Regex = Regex::new(
        r"\b\d{5}-?\d{3}\b"
    ).unwrap();

    // Phone, optionally with +55 country code and (DD) area code
    pub static ref PHONE: Regex = Regex::new(
        r"(?:\+55\s?)?(?:\(\d{2}\)\s?|\b\d{2}\s?)?\d{4,5}-?\d{4}\b"
    ).unwrap();

    // Email
    pub static ref EMAIL: Regex = Regex::new(
        r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"
    ).unwrap();

    // Brazilian date: dd/mm/yyyy
    pub static ref DATE_BR: Regex = Regex::new(
        r"\b\d{2}/\d{2}/\d{4}\b"
    ).unwrap();

    // Professional enrollment numbers: 5-6 digits
    pub static ref ENROLLMENT: Regex = Regex::new(
        r"\b\d{5,6}\b"
    ).unwrap();

    // Monetary values: R$ 1.234,56
    pub static ref MONETARY: Regex = Regex::new(
        r"R?\$?\s?\d{1,3}(?:\.\d{3})*(?:,\d{2})?"
    ).unwrap();

    // Small standalone numbers (installment counts and the like)
    pub static ref SMALL_NUMBER: Regex = Regex::new(
        r"\b\d{1,3}\b"
    ).unwrap();
}
