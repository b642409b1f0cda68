use std::collections::BTreeMap;

use serde::Serialize;
use validator::ValidateEmail;

use crate::limits::{MAX_EMAIL_LEN, MAX_NAME_LEN, MAX_PHONE_LEN};

use super::draft::DraftReservation;

pub const MIN_FIRST_NAME_LEN: usize = 3;

/// Field name to messages, in field order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationErrors(BTreeMap<&'static str, Vec<String>>);

impl ValidationErrors {
    pub fn add(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.entry(field).or_default().push(message.into());
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn has(&self, field: &str) -> bool {
        self.0.contains_key(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.0.keys().copied()
    }
}

fn required(errors: &mut ValidationErrors, field: &'static str, value: &str) -> bool {
    if value.trim().is_empty() {
        errors.add(field, "This field cannot be blank");
        return false;
    }
    true
}

fn max_len(errors: &mut ValidationErrors, field: &'static str, value: &str, max: usize) {
    if value.chars().count() > max {
        errors.add(field, format!("This field must be at most {max} characters long"));
    }
}

/// Check a candidate reservation. Never mutates it; an empty result means the
/// candidate may be committed.
pub fn validate(draft: &DraftReservation) -> ValidationErrors {
    let mut errors = ValidationErrors::default();
    let guest = &draft.guest;

    if required(&mut errors, "first_name", &guest.first_name) {
        if guest.first_name.trim().chars().count() < MIN_FIRST_NAME_LEN {
            errors.add(
                "first_name",
                format!("This field must be at least {MIN_FIRST_NAME_LEN} characters long"),
            );
        }
        max_len(&mut errors, "first_name", &guest.first_name, MAX_NAME_LEN);
    }

    if required(&mut errors, "last_name", &guest.last_name) {
        max_len(&mut errors, "last_name", &guest.last_name, MAX_NAME_LEN);
    }

    if required(&mut errors, "email", &guest.email) {
        if guest.email.len() > MAX_EMAIL_LEN {
            errors.add("email", format!("This field must be at most {MAX_EMAIL_LEN} characters long"));
        } else if !guest.email.validate_email() {
            errors.add("email", "Invalid email address");
        }
    }

    if required(&mut errors, "phone", &guest.phone) {
        max_len(&mut errors, "phone", &guest.phone, MAX_PHONE_LEN);
    }

    if !draft.stay.is_well_formed() {
        errors.add("end_date", "End date must be after start date");
    }

    if !errors.is_empty() {
        metrics::counter!(crate::observability::VALIDATION_FAILURES_TOTAL).increment(1);
    }
    errors
}
