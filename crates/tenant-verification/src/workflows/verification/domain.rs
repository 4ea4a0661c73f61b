use std::fmt;
use std::path::Path;

use chrono::NaiveDate;
use mime::Mime;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Largest tenancy proof accepted by the upload step (10 MiB).
pub const MAX_PROOF_BYTES: usize = 10 * 1024 * 1024;

const MAX_SESSION_ID_LEN: usize = 64;

/// Opaque identifier for one wizard instance; also the key drafts are persisted under.
///
/// Only built through [`WizardSessionId::parse`] or [`WizardSessionId::generate`], so every id
/// is safe to use as a file name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WizardSessionId(String);

impl WizardSessionId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts client supplied ids made of ASCII letters, digits, `-` and `_`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let well_formed = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        well_formed.then(|| Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn unchecked(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }
}

impl TryFrom<String> for WizardSessionId {
    type Error = String;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw).ok_or_else(|| format!("'{raw}' is not a valid session id"))
    }
}

impl From<WizardSessionId> for String {
    fn from(id: WizardSessionId) -> Self {
        id.0
    }
}

impl fmt::Display for WizardSessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// How the tenant proves the tenancy: an agent issued PIN or manually entered details.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMethod {
    Pin,
    #[default]
    Manual,
}

impl VerificationMethod {
    pub const fn label(self) -> &'static str {
        match self {
            VerificationMethod::Pin => "pin",
            VerificationMethod::Manual => "manual",
        }
    }
}

/// Uploaded tenancy agreement or other proof. Contents are carried, never inspected.
#[derive(Clone, PartialEq, Eq)]
pub struct TenancyProof {
    file_name: String,
    content_type: Mime,
    bytes: Vec<u8>,
}

impl TenancyProof {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Result<Self, ProofError> {
        let file_name = file_name.into().trim().to_string();
        if file_name.is_empty() {
            return Err(ProofError::MissingName);
        }

        let extension = Path::new(&file_name)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let content_type = match extension.as_deref() {
            Some("pdf") => mime::APPLICATION_PDF,
            Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
            Some("png") => mime::IMAGE_PNG,
            _ => return Err(ProofError::UnsupportedType { file_name }),
        };

        if bytes.is_empty() {
            return Err(ProofError::Empty);
        }
        if bytes.len() > MAX_PROOF_BYTES {
            return Err(ProofError::TooLarge {
                size: bytes.len(),
                limit: MAX_PROOF_BYTES,
            });
        }

        Ok(Self {
            file_name,
            content_type,
            bytes,
        })
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn content_type(&self) -> &Mime {
        &self.content_type
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn summary(&self) -> ProofSummary {
        ProofSummary {
            file_name: self.file_name.clone(),
            content_type: self.content_type.to_string(),
            size: self.bytes.len(),
        }
    }
}

impl fmt::Debug for TenancyProof {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TenancyProof")
            .field("file_name", &self.file_name)
            .field("content_type", &self.content_type.essence_str())
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// What a client gets to see about an attached proof.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProofSummary {
    pub file_name: String,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProofError {
    #[error("tenancy proof needs a file name")]
    MissingName,
    #[error("'{file_name}' is not a PDF, JPG or PNG file")]
    UnsupportedType { file_name: String },
    #[error("tenancy proof is empty")]
    Empty,
    #[error("tenancy proof is {size} bytes; the limit is {limit} bytes")]
    TooLarge { size: usize, limit: usize },
}

/// Accumulated answers for one verification session.
///
/// The proof attachment is skipped by serde; persisted drafts never hold document bytes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VerificationDraft {
    pub verification_method: VerificationMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_pin: Option<String>,
    pub tenant_full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenant_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub property_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_landlord_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_landlord_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_landlord_phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub move_in_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tenancy_length_months: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_rent: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_deposit: Option<Decimal>,
    #[serde(skip)]
    pub tenancy_proof: Option<TenancyProof>,
}

impl VerificationDraft {
    /// Shallow merge: every field named by `update` overwrites, everything else is kept.
    pub fn apply(&mut self, update: DraftUpdate) {
        let DraftUpdate {
            verification_method,
            agent_pin,
            tenant_full_name,
            tenant_email,
            tenant_phone,
            property_address,
            property_code,
            agent_landlord_name,
            agent_landlord_email,
            agent_landlord_phone,
            move_in_date,
            tenancy_length_months,
            monthly_rent,
            security_deposit,
            tenancy_proof,
        } = update;

        if let Some(method) = verification_method {
            self.verification_method = method;
        }
        if let Some(name) = tenant_full_name {
            self.tenant_full_name = name;
        }
        overwrite(&mut self.agent_pin, agent_pin);
        overwrite(&mut self.tenant_email, tenant_email);
        overwrite(&mut self.tenant_phone, tenant_phone);
        overwrite(&mut self.property_address, property_address);
        overwrite(&mut self.property_code, property_code);
        overwrite(&mut self.agent_landlord_name, agent_landlord_name);
        overwrite(&mut self.agent_landlord_email, agent_landlord_email);
        overwrite(&mut self.agent_landlord_phone, agent_landlord_phone);
        overwrite(&mut self.move_in_date, move_in_date);
        overwrite(&mut self.tenancy_length_months, tenancy_length_months);
        overwrite(&mut self.monthly_rent, monthly_rent);
        overwrite(&mut self.security_deposit, security_deposit);
        overwrite(&mut self.tenancy_proof, tenancy_proof);
    }

    pub fn merged(mut self, update: DraftUpdate) -> Self {
        self.apply(update);
        self
    }
}

fn overwrite<T>(slot: &mut Option<T>, patch: Option<Option<T>>) {
    if let Some(value) = patch {
        *slot = value;
    }
}

/// Partial draft sent by a step. Outer `None` leaves a field alone; for optional fields
/// `Some(None)` (JSON `null`) clears it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DraftUpdate {
    #[serde(default)]
    pub verification_method: Option<VerificationMethod>,
    #[serde(default, deserialize_with = "present")]
    pub agent_pin: Option<Option<String>>,
    #[serde(default)]
    pub tenant_full_name: Option<String>,
    #[serde(default, deserialize_with = "present")]
    pub tenant_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub tenant_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub property_address: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub property_code: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub agent_landlord_name: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub agent_landlord_email: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub agent_landlord_phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    pub move_in_date: Option<Option<NaiveDate>>,
    #[serde(default, deserialize_with = "present")]
    pub tenancy_length_months: Option<Option<u32>>,
    #[serde(default, deserialize_with = "present")]
    pub monthly_rent: Option<Option<Decimal>>,
    #[serde(default, deserialize_with = "present")]
    pub security_deposit: Option<Option<Decimal>>,
    #[serde(skip)]
    pub tenancy_proof: Option<Option<TenancyProof>>,
}

fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl DraftUpdate {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn verification_method(mut self, method: VerificationMethod) -> Self {
        self.verification_method = Some(method);
        self
    }

    pub fn agent_pin(mut self, pin: impl Into<String>) -> Self {
        self.agent_pin = Some(Some(pin.into()));
        self
    }

    pub fn tenant_full_name(mut self, name: impl Into<String>) -> Self {
        self.tenant_full_name = Some(name.into());
        self
    }

    pub fn tenant_email(mut self, email: impl Into<String>) -> Self {
        self.tenant_email = Some(Some(email.into()));
        self
    }

    pub fn tenant_phone(mut self, phone: impl Into<String>) -> Self {
        self.tenant_phone = Some(Some(phone.into()));
        self
    }

    pub fn property_address(mut self, address: impl Into<String>) -> Self {
        self.property_address = Some(Some(address.into()));
        self
    }

    pub fn property_code(mut self, code: impl Into<String>) -> Self {
        self.property_code = Some(Some(code.into()));
        self
    }

    pub fn agent_landlord_name(mut self, name: impl Into<String>) -> Self {
        self.agent_landlord_name = Some(Some(name.into()));
        self
    }

    pub fn agent_landlord_email(mut self, email: impl Into<String>) -> Self {
        self.agent_landlord_email = Some(Some(email.into()));
        self
    }

    pub fn agent_landlord_phone(mut self, phone: impl Into<String>) -> Self {
        self.agent_landlord_phone = Some(Some(phone.into()));
        self
    }

    pub fn move_in_date(mut self, date: NaiveDate) -> Self {
        self.move_in_date = Some(Some(date));
        self
    }

    pub fn clear_move_in_date(mut self) -> Self {
        self.move_in_date = Some(None);
        self
    }

    pub fn tenancy_length_months(mut self, months: u32) -> Self {
        self.tenancy_length_months = Some(Some(months));
        self
    }

    pub fn monthly_rent(mut self, rent: Decimal) -> Self {
        self.monthly_rent = Some(Some(rent));
        self
    }

    pub fn security_deposit(mut self, deposit: Decimal) -> Self {
        self.security_deposit = Some(Some(deposit));
        self
    }

    pub fn tenancy_proof(mut self, proof: TenancyProof) -> Self {
        self.tenancy_proof = Some(Some(proof));
        self
    }

    pub fn clear_tenancy_proof(mut self) -> Self {
        self.tenancy_proof = Some(None);
        self
    }
}
