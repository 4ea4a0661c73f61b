//! Multipart layout expected by the claim endpoint.
//!
//! The in-memory names and the wire names differ for a few fields (`propertyCode` goes out as
//! `access_code`, `agentPin` as `pin_code`); the backend depends on those keys.

use chrono::NaiveDate;
use mime::Mime;
use rust_decimal::Decimal;

use super::domain::VerificationDraft;
use super::validators::non_blank;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormValue {
    Text(String),
    File {
        file_name: String,
        content_type: Mime,
        bytes: Vec<u8>,
    },
}

impl FormValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FormValue::Text(value) => Some(value),
            FormValue::File { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormField {
    pub name: &'static str,
    pub value: FormValue,
}

pub fn multipart_fields(draft: &VerificationDraft) -> Vec<FormField> {
    let mut fields = Vec::with_capacity(16);

    push_text(
        &mut fields,
        "verificationMethod",
        draft.verification_method.label(),
    );
    push_text(&mut fields, "tenantFullName", &draft.tenant_full_name);

    push_optional(&mut fields, "tenantEmail", draft.tenant_email.as_deref());
    push_optional(&mut fields, "tenantPhone", draft.tenant_phone.as_deref());
    push_optional(&mut fields, "pin_code", draft.agent_pin.as_deref());
    push_optional(
        &mut fields,
        "propertyAddress",
        draft.property_address.as_deref(),
    );
    push_optional(&mut fields, "access_code", draft.property_code.as_deref());
    push_optional(
        &mut fields,
        "agentLandlordName",
        draft.agent_landlord_name.as_deref(),
    );
    push_optional(
        &mut fields,
        "agentLandlordEmail",
        draft.agent_landlord_email.as_deref(),
    );
    push_optional(
        &mut fields,
        "agentLandlordPhone",
        draft.agent_landlord_phone.as_deref(),
    );

    if let Some(date) = draft.move_in_date {
        push_text(&mut fields, "moveInDate", &iso_timestamp(date));
    }
    if let Some(months) = draft.tenancy_length_months {
        push_text(&mut fields, "tenancyLengthMonths", &months.to_string());
    }
    if let Some(rent) = draft.monthly_rent {
        push_text(&mut fields, "monthlyRent", &numeric(rent));
    }
    if let Some(deposit) = draft.security_deposit {
        push_text(&mut fields, "securityDeposit", &numeric(deposit));
    }

    if let Some(proof) = &draft.tenancy_proof {
        fields.push(FormField {
            name: "tenancyProof",
            value: FormValue::File {
                file_name: proof.file_name().to_string(),
                content_type: proof.content_type().clone(),
                bytes: proof.bytes().to_vec(),
            },
        });
    }

    fields
}

/// Midnight UTC on `date`, millisecond precision: `2025-01-01T00:00:00.000Z`.
pub fn iso_timestamp(date: NaiveDate) -> String {
    date.format("%Y-%m-%dT00:00:00.000Z").to_string()
}

fn numeric(value: Decimal) -> String {
    value.normalize().to_string()
}

fn push_text(fields: &mut Vec<FormField>, name: &'static str, value: &str) {
    fields.push(FormField {
        name,
        value: FormValue::Text(value.to_string()),
    });
}

fn push_optional(fields: &mut Vec<FormField>, name: &'static str, value: Option<&str>) {
    if non_blank(value) {
        push_text(fields, name, value.unwrap_or_default());
    }
}
