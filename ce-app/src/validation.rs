//! Input validators for dialog answers. Each returns the cleaned value or a
//! user-facing reason in Spanish.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use thiserror::Error;

pub const MIN_DOC_LENGTH: usize = 6;
pub const MAX_NIT_LENGTH: usize = 15;
pub const MAX_CC_LENGTH: usize = 10;
pub const MIN_CEDULA_LENGTH: usize = 6;
pub const MAX_CEDULA_LENGTH: usize = 12;
pub const MIN_NAME_LENGTH: usize = 3;
pub const MAX_NAME_LENGTH: usize = 100;
pub const MIN_PHONE_DIGITS: usize = 7;
pub const MAX_PHONE_DIGITS: usize = 15;
pub const ORDER_PREFIX: &str = "MP-";
pub const MAX_ORDER_SUFFIX_LENGTH: usize = 20;

const EMAIL_EXTENSIONS: [&str; 7] = [".com", ".co", ".net", ".org", ".edu", ".gov", ".mil"];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(String);

impl ValidationError {
    fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

pub type Validated = Result<String, ValidationError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DocumentType {
    #[serde(rename = "NIT")]
    Nit,
    #[serde(rename = "CC")]
    Cc,
}

impl DocumentType {
    pub fn parse(raw: &str) -> Option<Self> {
        let trimmed = raw.trim();
        if trimmed.eq_ignore_ascii_case("nit") {
            Some(Self::Nit)
        } else if trimmed.eq_ignore_ascii_case("cc") {
            Some(Self::Cc)
        } else {
            None
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Nit => "NIT",
            Self::Cc => "CC",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Self::Nit => "NIT",
            Self::Cc => "Cédula de Ciudadanía",
        }
    }

    pub fn max_len(self) -> usize {
        match self {
            Self::Nit => MAX_NIT_LENGTH,
            Self::Cc => MAX_CC_LENGTH,
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strip hyphens, periods and spaces so `"901-234.567"` equals `"901234567"`.
/// Used both for validating input and for matching directory cells.
pub fn clean_document(raw: &str) -> String {
    raw.trim()
        .chars()
        .filter(|c| !matches!(c, '-' | '.' | ' '))
        .collect()
}

fn is_all_digits(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit())
}

pub fn validate_document(doc_type: DocumentType, raw: &str) -> Validated {
    let clean = clean_document(raw);
    if !is_all_digits(&clean) {
        return Err(ValidationError::new("El documento debe contener solo números"));
    }
    let len = clean.len();
    if !(MIN_DOC_LENGTH..=doc_type.max_len()).contains(&len) {
        let label = match doc_type {
            DocumentType::Nit => "NIT",
            DocumentType::Cc => "Cédula",
        };
        return Err(ValidationError::new(format!(
            "{label} debe tener entre {MIN_DOC_LENGTH} y {} dígitos",
            doc_type.max_len()
        )));
    }
    Ok(clean)
}

pub fn validate_cedula(raw: &str) -> Validated {
    if raw.trim().is_empty() {
        return Err(ValidationError::new("Cédula requerida"));
    }
    let clean = clean_document(raw);
    if !is_all_digits(&clean) {
        return Err(ValidationError::new("La cédula debe contener solo números"));
    }
    if !(MIN_CEDULA_LENGTH..=MAX_CEDULA_LENGTH).contains(&clean.len()) {
        return Err(ValidationError::new(format!(
            "La cédula debe tener entre {MIN_CEDULA_LENGTH} y {MAX_CEDULA_LENGTH} dígitos"
        )));
    }
    Ok(clean)
}

/// Normalize an order number to `MP-<suffix>`.
///
/// `"mp-0003"`, `"MP0003"` and `"0003"` all become `"MP-0003"`; the suffix
/// must be 1 to 20 characters of digits and hyphens.
pub fn normalize_order_number(raw: &str) -> Validated {
    let upper = raw.trim().to_uppercase();
    let normalized = if upper.starts_with(ORDER_PREFIX) {
        upper
    } else {
        let rest = upper.strip_prefix("MP").unwrap_or(&upper);
        let rest = rest.strip_prefix('-').unwrap_or(rest);
        format!("{ORDER_PREFIX}{rest}")
    };

    let suffix = &normalized[ORDER_PREFIX.len()..];
    let suffix_len = suffix.chars().count();
    if suffix_len == 0 || suffix_len > MAX_ORDER_SUFFIX_LENGTH {
        return Err(ValidationError::new(format!(
            "El número de orden debe tener entre 1 y {MAX_ORDER_SUFFIX_LENGTH} caracteres después de {ORDER_PREFIX}"
        )));
    }
    if !suffix.chars().all(|c| c.is_ascii_digit() || c == '-') {
        return Err(ValidationError::new(
            "El número de orden solo puede contener números y guiones (ej: MP-0003)",
        ));
    }
    Ok(normalized)
}

/// Validators backed by compiled regexes.
#[derive(Debug, Clone)]
pub struct Validators {
    email: Regex,
    name: Regex,
}

impl Validators {
    pub fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            email: Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$")?,
            name: Regex::new(r"^[a-zA-ZáéíóúÁÉÍÓÚñÑ\s.\-']+$")?,
        })
    }

    pub fn email(&self, raw: &str) -> Validated {
        let email = raw.trim().to_lowercase();
        if email.is_empty() {
            return Err(ValidationError::new("Email requerido"));
        }
        if !self.email.is_match(&email) {
            return Err(ValidationError::new("Formato de email inválido"));
        }
        if !EMAIL_EXTENSIONS.iter().any(|ext| email.ends_with(ext)) {
            return Err(ValidationError::new(
                "Extensión de email no válida (debe terminar en .com, .co, .net, etc.)",
            ));
        }
        Ok(email)
    }

    /// Accepts letters (including Spanish accents), spaces, `.`, `-` and `'`,
    /// and returns the name title-cased.
    pub fn name(&self, raw: &str) -> Validated {
        let name = raw.trim();
        if name.is_empty() {
            return Err(ValidationError::new("Nombre requerido"));
        }
        let len = name.chars().count();
        if len < MIN_NAME_LENGTH {
            return Err(ValidationError::new(format!(
                "El nombre debe tener al menos {MIN_NAME_LENGTH} caracteres"
            )));
        }
        if len > MAX_NAME_LENGTH {
            return Err(ValidationError::new(format!(
                "El nombre no puede tener más de {MAX_NAME_LENGTH} caracteres"
            )));
        }
        if !self.name.is_match(name) {
            return Err(ValidationError::new(
                "El nombre solo puede contener letras, espacios, puntos, guiones y apóstrofes",
            ));
        }
        Ok(title_case(name))
    }

    pub fn phone(&self, raw: &str) -> Validated {
        let phone = raw.trim();
        if phone.is_empty() {
            return Err(ValidationError::new("Teléfono requerido"));
        }
        let clean: String = phone
            .chars()
            .filter(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')') || c.is_whitespace())
            .collect();
        let digits = clean.chars().filter(char::is_ascii_digit).count();
        if digits < MIN_PHONE_DIGITS {
            return Err(ValidationError::new(format!(
                "El teléfono debe tener al menos {MIN_PHONE_DIGITS} dígitos"
            )));
        }
        if digits > MAX_PHONE_DIGITS {
            return Err(ValidationError::new(format!(
                "El teléfono no puede tener más de {MAX_PHONE_DIGITS} dígitos"
            )));
        }
        Ok(clean.trim().to_string())
    }
}

/// Upper-case the first letter of every alphabetic run, lower-case the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_word = false;
    for c in s.chars() {
        if c.is_alphabetic() {
            if in_word {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            in_word = true;
        } else {
            out.push(c);
            in_word = false;
        }
    }
    out
}
