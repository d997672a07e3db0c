//! Field rules applied to incoming records before they reach the store.
//!
//! Every [`Validate`] implementation consumes a candidate record and hands
//! back the normalized record, or every field that broke a rule.

use std::fmt;

use lazy_static::lazy_static;
use phonenumber::{country, Mode};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use url::Url;

use crate::structs::{
    HardwareInRequest, HardwareInsert, LocationInsert, RackInsert, RequestInsert, StockInsert,
    TerminalInsert, UserInsert,
};

lazy_static! {
    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$"
    )
    .expect("email pattern compiles");
}

pub const MIN_RACK_POSITION: i64 = 1;
pub const MAX_RACK_POSITION: i64 = 9;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Dotted path to the offending field, e.g. `hardware.0.count`.
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        FieldError {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Error)]
pub struct ValidationErrors(Vec<FieldError>);

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self
            .0
            .iter()
            .map(|e| format!("{}: {}", e.field, e.message))
            .collect::<Vec<_>>();
        write!(f, "Validation failed: {}", fields.join("; "))
    }
}

impl From<Vec<FieldError>> for ValidationErrors {
    fn from(errors: Vec<FieldError>) -> Self {
        ValidationErrors(errors)
    }
}

impl ValidationErrors {
    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[cfg(test)]
    pub fn fields(&self) -> Vec<&str> {
        self.0.iter().map(|e| e.field.as_str()).collect()
    }

    fn push(&mut self, field: &str, message: impl Into<String>) {
        self.0.push(FieldError::new(field, message));
    }

    fn at_least(&mut self, field: &str, value: i64, min: i64) {
        if value < min {
            self.push(field, format!("ensure this value is greater than or equal to {min}"));
        }
    }

    fn at_most(&mut self, field: &str, value: i64, max: i64) {
        if value > max {
            self.push(field, format!("ensure this value is less than or equal to {max}"));
        }
    }

    fn min_length(&mut self, field: &str, value: &str, min: usize) {
        if value.chars().count() < min {
            self.push(field, format!("ensure this value has at least {min} characters"));
        }
    }

    fn http_url(&mut self, field: &str, value: Option<&str>) {
        let Some(value) = value else { return };
        match Url::parse(value) {
            Ok(url) if matches!(url.scheme(), "http" | "https") && url.has_host() => {}
            _ => self.push(field, "invalid or missing URL scheme"),
        }
    }

    /// Re-roots nested errors under `prefix`.
    fn nest(&mut self, prefix: &str, nested: ValidationErrors) {
        self.0.extend(
            nested
                .0
                .into_iter()
                .map(|e| FieldError::new(format!("{prefix}.{}", e.field), e.message)),
        );
    }

    fn finish<T>(self, value: T) -> Result<T, ValidationErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}

/// Settings the rules depend on.
#[derive(Debug, Clone, Copy)]
pub struct Rules {
    /// Region assumed for phone numbers written without a country code.
    pub phone_region: country::Id,
}

impl Default for Rules {
    fn default() -> Self {
        Rules {
            phone_region: country::Id::RU,
        }
    }
}

pub trait Validate: Sized {
    fn validate(self, rules: &Rules) -> Result<Self, ValidationErrors>;
}

impl<T: Validate> Validate for Vec<T> {
    fn validate(self, rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        let mut valid = Vec::with_capacity(self.len());
        for (index, item) in self.into_iter().enumerate() {
            match item.validate(rules) {
                Ok(item) => valid.push(item),
                Err(nested) => errors.nest(&index.to_string(), nested),
            }
        }
        errors.finish(valid)
    }
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL.is_match(email)
}

/// Parses `raw` (assuming `region` when it carries no country code) and
/// formats it as E.164.
pub fn normalize_phone(raw: &str, region: country::Id) -> Result<String, String> {
    let number =
        phonenumber::parse(Some(region), raw).map_err(|_| "Phone number is not valid".to_owned())?;
    if !number.is_valid() {
        return Err("Phone number is not valid".to_owned());
    }
    Ok(number.format().mode(Mode::E164).to_string())
}

impl Validate for UserInsert {
    fn validate(mut self, rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        if !is_valid_email(&self.email) {
            errors.push("email", "value is not a valid email address");
        }
        self.phone = match self.phone.take().filter(|p| !p.trim().is_empty()) {
            None => None,
            Some(raw) => match normalize_phone(&raw, rules.phone_region) {
                Ok(normalized) => Some(normalized),
                Err(message) => {
                    errors.push("phone", message);
                    None
                }
            },
        };
        errors.http_url("image_link", self.image_link.as_deref());
        errors.finish(self)
    }
}

impl Validate for LocationInsert {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_length("name", &self.name, 1);
        errors.at_least("width", self.width, 1);
        errors.at_least("height", self.height, 1);
        errors.finish(self)
    }
}

impl Validate for TerminalInsert {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.at_least("x", self.x, 0);
        errors.at_least("y", self.y, 0);
        errors.finish(self)
    }
}

impl Validate for HardwareInsert {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.min_length("name", &self.name, 1);
        errors.http_url("image_link", self.image_link.as_deref());
        errors.finish(self)
    }
}

impl Validate for RackInsert {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.at_least("width", self.width, 0);
        errors.at_least("height", self.height, 0);
        errors.at_least("x", self.x, 0);
        errors.at_least("y", self.y, 0);
        errors.finish(self)
    }
}

impl Validate for StockInsert {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.at_least("rack_position", self.rack_position, MIN_RACK_POSITION);
        errors.at_most("rack_position", self.rack_position, MAX_RACK_POSITION);
        errors.at_least("count", self.count, 0);
        errors.finish(self)
    }
}

impl Validate for HardwareInRequest {
    fn validate(self, _rules: &Rules) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::default();
        errors.at_least("count", self.count, 1);
        errors.finish(self)
    }
}

impl Validate for RequestInsert {
    fn validate(self, rules: &Rules) -> Result<Self, ValidationErrors> {
        let RequestInsert { request, hardware } = self;
        match hardware.validate(rules) {
            Ok(hardware) => Ok(RequestInsert { request, hardware }),
            Err(nested) => {
                let mut errors = ValidationErrors::default();
                errors.nest("hardware", nested);
                Err(errors)
            }
        }
    }
}
