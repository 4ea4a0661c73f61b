use std::fmt;

use serde::Serialize;

use super::domain::VerificationDraft;

/// Screens of the verification wizard, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    PropertyDetails,
    LandlordDetails,
    TenancyDetails,
}

impl WizardStep {
    pub const ALL: [WizardStep; 3] = [
        WizardStep::PropertyDetails,
        WizardStep::LandlordDetails,
        WizardStep::TenancyDetails,
    ];
    pub const FIRST: WizardStep = WizardStep::PropertyDetails;
    pub const TERMINAL: WizardStep = WizardStep::TenancyDetails;
    pub const COUNT: u8 = Self::ALL.len() as u8;

    /// One-based position, as shown to the tenant.
    pub const fn number(self) -> u8 {
        match self {
            WizardStep::PropertyDetails => 1,
            WizardStep::LandlordDetails => 2,
            WizardStep::TenancyDetails => 3,
        }
    }

    pub fn from_number(number: u8) -> Option<Self> {
        Self::ALL.get(usize::from(number).checked_sub(1)?).copied()
    }

    pub fn next(self) -> Option<Self> {
        Self::from_number(self.number() + 1)
    }

    pub fn previous(self) -> Option<Self> {
        Self::from_number(self.number() - 1)
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, WizardStep::TenancyDetails)
    }

    pub const fn label(self) -> &'static str {
        match self {
            WizardStep::PropertyDetails => "property details",
            WizardStep::LandlordDetails => "agent/landlord details",
            WizardStep::TenancyDetails => "tenancy details",
        }
    }
}

impl fmt::Display for WizardStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

pub type StepValidator = fn(&VerificationDraft) -> bool;

/// Single source of truth for "may this step be left going forward".
#[derive(Clone, Copy)]
pub struct StepValidators {
    table: [StepValidator; WizardStep::COUNT as usize],
}

impl StepValidators {
    pub const fn standard() -> Self {
        Self {
            table: [
                property_details_complete,
                landlord_details_complete,
                tenancy_details_complete,
            ],
        }
    }

    /// Replace the predicate for one step, keeping the others.
    pub fn with(mut self, step: WizardStep, validator: StepValidator) -> Self {
        self.table[Self::slot(step)] = validator;
        self
    }

    pub fn validator(&self, step: WizardStep) -> StepValidator {
        self.table[Self::slot(step)]
    }

    pub fn allows(&self, step: WizardStep, draft: &VerificationDraft) -> bool {
        (self.validator(step))(draft)
    }

    fn slot(step: WizardStep) -> usize {
        usize::from(step.number() - 1)
    }
}

impl Default for StepValidators {
    fn default() -> Self {
        Self::standard()
    }
}

impl fmt::Debug for StepValidators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepValidators")
            .field("steps", &WizardStep::COUNT)
            .finish_non_exhaustive()
    }
}

pub fn property_details_complete(draft: &VerificationDraft) -> bool {
    non_blank(Some(draft.tenant_full_name.as_str())) && non_blank(draft.property_address.as_deref())
}

pub fn landlord_details_complete(draft: &VerificationDraft) -> bool {
    non_blank(draft.agent_landlord_name.as_deref())
}

pub fn tenancy_details_complete(draft: &VerificationDraft) -> bool {
    draft.move_in_date.is_some()
}

pub(crate) fn non_blank(value: Option<&str>) -> bool {
    value.is_some_and(|value| !value.trim().is_empty())
}
