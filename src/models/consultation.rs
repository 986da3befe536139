use std::{collections::HashMap, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use super::{Program, StudyLevel, ValidationError, checked, filled, timestamp};

/// Preferences collected by the consultation wizard, sent as-is to the matching procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationParams {
    pub budget_min: f64,
    pub budget_max: f64,
    pub language: String,
    pub level: StudyLevel,
    pub country: String,
    #[serde(default)]
    pub duration_months: Option<u32>,
    pub field: String,
    #[serde(default)]
    pub needs_scholarship: bool,
    #[serde(default)]
    pub halal_food: bool,
    #[serde(default)]
    pub prayer_facilities: bool,
    #[serde(default)]
    pub international_community: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewConsultation<'a> {
    pub user_id: Uuid,
    #[serde(flatten)]
    pub params: &'a ConsultationParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsultationRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(flatten)]
    pub params: ConsultationParams,
    /// Ranking stored once the backend has scored the answers.
    #[serde(default)]
    pub matches: Option<Vec<ProgramMatch>>,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<OffsetDateTime>,
}

/// One row returned by `match_programs`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgramMatch {
    pub program_id: Uuid,
    pub total_score: f64,
    #[serde(default)]
    pub budget_score: f64,
    #[serde(default)]
    pub level_score: f64,
    #[serde(default)]
    pub location_score: f64,
    #[serde(default)]
    pub language_score: f64,
    #[serde(default)]
    pub duration_score: f64,
    #[serde(default)]
    pub field_score: f64,
    #[serde(default)]
    pub cultural_score: f64,
}

impl ProgramMatch {
    pub fn breakdown(&self) -> [(&'static str, f64); 7] {
        [
            ("Budget", self.budget_score),
            ("Level", self.level_score),
            ("Location", self.location_score),
            ("Language", self.language_score),
            ("Duration", self.duration_score),
            ("Field", self.field_score),
            ("Culture", self.cultural_score),
        ]
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MatchedProgram {
    pub program: Program,
    pub scores: ProgramMatch,
}

/// A saved consultation with its ranked matches, in the order the backend ranked them.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsultationResult {
    pub record: ConsultationRecord,
    pub matches: Vec<MatchedProgram>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WizardStep {
    Budget,
    Study,
    Destination,
    Extras,
}

impl WizardStep {
    pub const ALL: [WizardStep; 4] = [
        WizardStep::Budget,
        WizardStep::Study,
        WizardStep::Destination,
        WizardStep::Extras,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            WizardStep::Budget => "budget",
            WizardStep::Study => "study",
            WizardStep::Destination => "destination",
            WizardStep::Extras => "extras",
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            WizardStep::Budget => "Your budget",
            WizardStep::Study => "What you want to study",
            WizardStep::Destination => "Where you want to go",
            WizardStep::Extras => "Anything else",
        }
    }

    pub fn number(self) -> usize {
        WizardStep::ALL
            .iter()
            .position(|step| *step == self)
            .map_or(1, |i| i + 1)
    }

    pub fn next(self) -> Option<WizardStep> {
        WizardStep::ALL.get(self.number()).copied()
    }

    pub fn previous(self) -> Option<WizardStep> {
        self.number().checked_sub(2).and_then(|i| WizardStep::ALL.get(i).copied())
    }
}

impl FromStr for WizardStep {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        WizardStep::ALL
            .into_iter()
            .find(|step| step.as_str() == s)
            .ok_or_else(|| ValidationError::new("step", "Unknown consultation step"))
    }
}

/// Wizard answers gathered so far, kept in the session between steps.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConsultationDraft {
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub level: Option<StudyLevel>,
    pub field: Option<String>,
    pub language: Option<String>,
    pub duration_months: Option<u32>,
    pub country: Option<String>,
    pub needs_scholarship: bool,
    pub halal_food: bool,
    pub prayer_facilities: bool,
    pub international_community: bool,
}

fn amount(form: &HashMap<String, String>, field: &'static str, label: &str) -> Result<f64, ValidationError> {
    let raw = filled(form.get(field).map(String::as_str))
        .ok_or_else(|| ValidationError::new(field, format!("{label} is required")))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| ValidationError::new(field, format!("{label} must be a number")))?;
    if value < 0.0 {
        return Err(ValidationError::new(field, format!("{label} cannot be negative")));
    }
    Ok(value)
}

impl ConsultationDraft {
    /// Records one step's answers. Earlier answers are kept when a later step fails.
    pub fn apply(&mut self, step: WizardStep, form: &HashMap<String, String>) -> Result<(), ValidationError> {
        let text = |field: &str| filled(form.get(field).map(String::as_str));

        match step {
            WizardStep::Budget => {
                let min = amount(form, "budget_min", "Minimum budget")?;
                let max = amount(form, "budget_max", "Maximum budget")?;
                if min > max {
                    return Err(ValidationError::new(
                        "budget_max",
                        "Maximum budget must not be below the minimum",
                    ));
                }
                self.budget_min = Some(min);
                self.budget_max = Some(max);
            }
            WizardStep::Study => {
                let level: StudyLevel = text("level").unwrap_or_default().parse()?;
                let field = text("field")
                    .ok_or_else(|| ValidationError::new("field", "Please tell us your field of study"))?;
                let duration_months = text("duration_months")
                    .map(|d| {
                        d.parse::<u32>().map_err(|_| {
                            ValidationError::new("duration_months", "Duration must be a whole number of months")
                        })
                    })
                    .transpose()?;
                self.level = Some(level);
                self.field = Some(field);
                self.duration_months = duration_months;
            }
            WizardStep::Destination => {
                let country = text("country")
                    .ok_or_else(|| ValidationError::new("country", "Please choose a country"))?;
                let language = text("language")
                    .ok_or_else(|| ValidationError::new("language", "Please choose a language of instruction"))?;
                self.country = Some(country);
                self.language = Some(language);
            }
            WizardStep::Extras => {
                let flag = |field: &str| checked(form.get(field).map(String::as_str));
                self.needs_scholarship = flag("needs_scholarship");
                self.halal_food = flag("halal_food");
                self.prayer_facilities = flag("prayer_facilities");
                self.international_community = flag("international_community");
            }
        }
        Ok(())
    }

    /// First step that still lacks a required answer.
    pub fn missing_step(&self) -> Option<WizardStep> {
        if self.budget_min.is_none() || self.budget_max.is_none() {
            Some(WizardStep::Budget)
        } else if self.level.is_none() || self.field.is_none() {
            Some(WizardStep::Study)
        } else if self.country.is_none() || self.language.is_none() {
            Some(WizardStep::Destination)
        } else {
            None
        }
    }

    pub fn params(&self) -> Result<ConsultationParams, ValidationError> {
        let missing = |field: &'static str| ValidationError::new(field, "Please complete every step first");

        Ok(ConsultationParams {
            budget_min: self.budget_min.ok_or_else(|| missing("budget_min"))?,
            budget_max: self.budget_max.ok_or_else(|| missing("budget_max"))?,
            language: self.language.clone().ok_or_else(|| missing("language"))?,
            level: self.level.ok_or_else(|| missing("level"))?,
            country: self.country.clone().ok_or_else(|| missing("country"))?,
            duration_months: self.duration_months,
            field: self.field.clone().ok_or_else(|| missing("field"))?,
            needs_scholarship: self.needs_scholarship,
            halal_food: self.halal_food,
            prayer_facilities: self.prayer_facilities,
            international_community: self.international_community,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn steps_are_ordered() {
        assert_eq!(WizardStep::Budget.next(), Some(WizardStep::Study));
        assert_eq!(WizardStep::Extras.next(), None);
        assert_eq!(WizardStep::Budget.previous(), None);
        assert_eq!(WizardStep::Destination.previous(), Some(WizardStep::Study));
        assert_eq!("extras".parse::<WizardStep>().unwrap(), WizardStep::Extras);
    }

    #[test]
    fn budget_step_validates_range() {
        let mut draft = ConsultationDraft::default();
        let err = draft
            .apply(WizardStep::Budget, &form(&[("budget_min", "20000"), ("budget_max", "10000")]))
            .unwrap_err();
        assert_eq!(err.field, "budget_max");
        assert_eq!(draft.budget_min, None);

        draft
            .apply(WizardStep::Budget, &form(&[("budget_min", "10000"), ("budget_max", "25000")]))
            .unwrap();
        assert_eq!(draft.budget_max, Some(25000.0));
        assert_eq!(draft.missing_step(), Some(WizardStep::Study));
    }

    #[test]
    fn full_walkthrough_produces_params() {
        let mut draft = ConsultationDraft::default();
        draft
            .apply(WizardStep::Budget, &form(&[("budget_min", "0"), ("budget_max", "30000")]))
            .unwrap();
        draft
            .apply(
                WizardStep::Study,
                &form(&[("level", "master"), ("field", "Computer Science"), ("duration_months", "")]),
            )
            .unwrap();
        draft
            .apply(WizardStep::Destination, &form(&[("country", "de"), ("language", "English")]))
            .unwrap();
        draft
            .apply(WizardStep::Extras, &form(&[("halal_food", "on")]))
            .unwrap();

        assert_eq!(draft.missing_step(), None);
        let params = draft.params().unwrap();
        assert_eq!(params.level, StudyLevel::Master);
        assert_eq!(params.duration_months, None);
        assert!(params.halal_food);
        assert!(!params.needs_scholarship);
    }

    #[test]
    fn incomplete_draft_has_no_params() {
        assert!(ConsultationDraft::default().params().is_err());
    }
}
