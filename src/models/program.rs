use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use super::{Money, ValidationError, checked, date, filled, number};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StudyLevel {
    Foundation,
    Diploma,
    Bachelor,
    Master,
    Phd,
    Language,
}

impl StudyLevel {
    pub const ALL: [StudyLevel; 6] = [
        StudyLevel::Foundation,
        StudyLevel::Diploma,
        StudyLevel::Bachelor,
        StudyLevel::Master,
        StudyLevel::Phd,
        StudyLevel::Language,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StudyLevel::Foundation => "foundation",
            StudyLevel::Diploma => "diploma",
            StudyLevel::Bachelor => "bachelor",
            StudyLevel::Master => "master",
            StudyLevel::Phd => "phd",
            StudyLevel::Language => "language",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            StudyLevel::Foundation => "Foundation",
            StudyLevel::Diploma => "Diploma",
            StudyLevel::Bachelor => "Bachelor's",
            StudyLevel::Master => "Master's",
            StudyLevel::Phd => "PhD",
            StudyLevel::Language => "Language course",
        }
    }
}

impl fmt::Display for StudyLevel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StudyLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        StudyLevel::ALL
            .into_iter()
            .find(|level| level.as_str() == s.trim())
            .ok_or_else(|| ValidationError::new("level", "Please choose a study level"))
    }
}

fn default_currency() -> String {
    "USD".to_owned()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Program {
    pub id: Uuid,
    pub name: String,
    pub university: String,
    pub country: String,
    #[serde(default)]
    pub location: String,
    pub level: StudyLevel,
    #[serde(default)]
    pub field: String,
    #[serde(default)]
    pub duration_months: Option<u32>,
    #[serde(default)]
    pub tuition_min: Option<f64>,
    #[serde(default)]
    pub tuition_max: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub language: String,
    #[serde(default, with = "date::option")]
    pub deadline: Option<Date>,
    #[serde(default)]
    pub featured: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl Program {
    pub fn tuition_label(&self) -> String {
        match (self.tuition_min, self.tuition_max) {
            (Some(min), Some(max)) if min < max => format!(
                "{} to {:.2}",
                Money(min, &self.currency),
                max
            ),
            (Some(fee), _) | (None, Some(fee)) => Money(fee, &self.currency).to_string(),
            (None, None) => "Contact us".to_owned(),
        }
    }

    pub fn duration_label(&self) -> String {
        match self.duration_months {
            Some(months) if months % 12 == 0 && months > 0 => {
                let years = months / 12;
                if years == 1 { "1 year".to_owned() } else { format!("{years} years") }
            }
            Some(1) => "1 month".to_owned(),
            Some(months) => format!("{months} months"),
            None => "-".to_owned(),
        }
    }

    /// Lower bound used when sorting by price; unknown fees sort last.
    pub fn tuition_floor(&self) -> f64 {
        self.tuition_min.or(self.tuition_max).unwrap_or(f64::INFINITY)
    }
}

/// Admin form for creating or editing a program.
#[derive(Debug, Default, Deserialize)]
pub struct ProgramForm {
    pub name: Option<String>,
    pub university: Option<String>,
    pub country: Option<String>,
    pub location: Option<String>,
    pub level: Option<String>,
    pub field: Option<String>,
    pub duration_months: Option<String>,
    pub tuition_min: Option<String>,
    pub tuition_max: Option<String>,
    pub currency: Option<String>,
    pub language: Option<String>,
    pub deadline: Option<String>,
    pub featured: Option<String>,
    pub description: Option<String>,
}

/// Validated program fields, without an id.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgramFields {
    pub name: String,
    pub university: String,
    pub country: String,
    pub location: String,
    pub level: StudyLevel,
    pub field: String,
    pub duration_months: Option<u32>,
    pub tuition_min: Option<f64>,
    pub tuition_max: Option<f64>,
    pub currency: String,
    pub language: String,
    #[serde(with = "date::option")]
    pub deadline: Option<Date>,
    pub featured: bool,
    pub description: Option<String>,
}

impl ProgramForm {
    pub fn validate(&self) -> Result<ProgramFields, ValidationError> {
        let name = filled(self.name.as_deref())
            .ok_or_else(|| ValidationError::new("name", "Program name is required"))?;
        let university = filled(self.university.as_deref())
            .ok_or_else(|| ValidationError::new("university", "University is required"))?;
        let country = filled(self.country.as_deref())
            .ok_or_else(|| ValidationError::new("country", "Country is required"))?;
        let level: StudyLevel = self.level.as_deref().unwrap_or_default().parse()?;

        let tuition_min: Option<f64> = number("tuition_min", self.tuition_min.as_deref())?;
        let tuition_max: Option<f64> = number("tuition_max", self.tuition_max.as_deref())?;
        if let (Some(min), Some(max)) = (tuition_min, tuition_max) {
            if min > max {
                return Err(ValidationError::new(
                    "tuition_max",
                    "Maximum tuition must not be below the minimum",
                ));
            }
        }

        let deadline = filled(self.deadline.as_deref())
            .map(|d| {
                date::parse(&d).map_err(|_| ValidationError::new("deadline", "Deadline must be a date"))
            })
            .transpose()?;

        Ok(ProgramFields {
            name,
            university,
            country,
            location: filled(self.location.as_deref()).unwrap_or_default(),
            level,
            field: filled(self.field.as_deref()).unwrap_or_default(),
            duration_months: number("duration_months", self.duration_months.as_deref())?,
            tuition_min,
            tuition_max,
            currency: filled(self.currency.as_deref()).unwrap_or_else(default_currency),
            language: filled(self.language.as_deref()).unwrap_or_default(),
            deadline,
            featured: checked(self.featured.as_deref()),
            description: filled(self.description.as_deref()),
        })
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::date;

    use super::*;

    #[test]
    fn deserializes_backend_row() {
        let program: Program = serde_json::from_value(json!({
            "id": "6c3f3a7e-8a0e-4c1a-9a53-0d1a4b2f9e11",
            "name": "MSc Data Science",
            "university": "University of Leeds",
            "country": "uk",
            "level": "master",
            "tuition_min": 24000,
            "deadline": "2027-01-15",
            "featured": true,
            "created_at": "2026-01-01T00:00:00+00:00"
        }))
        .unwrap();

        assert_eq!(program.level, StudyLevel::Master);
        assert_eq!(program.deadline, Some(date!(2027 - 01 - 15)));
        assert_eq!(program.currency, "USD");
        assert_eq!(program.tuition_label(), "USD 24000.00");
    }

    #[test]
    fn duration_labels() {
        let mut program: Program = serde_json::from_value(json!({
            "id": "6c3f3a7e-8a0e-4c1a-9a53-0d1a4b2f9e11",
            "name": "x", "university": "y", "country": "de", "level": "bachelor"
        }))
        .unwrap();

        program.duration_months = Some(24);
        assert_eq!(program.duration_label(), "2 years");
        program.duration_months = Some(18);
        assert_eq!(program.duration_label(), "18 months");
        program.duration_months = Some(12);
        assert_eq!(program.duration_label(), "1 year");
    }

    #[test]
    fn form_requires_name() {
        let form = ProgramForm {
            name: Some("  ".to_owned()),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err().field, "name");
    }

    #[test]
    fn form_rejects_inverted_tuition() {
        let form = ProgramForm {
            name: Some("BSc Nursing".to_owned()),
            university: Some("Monash".to_owned()),
            country: Some("au".to_owned()),
            level: Some("bachelor".to_owned()),
            tuition_min: Some("30000".to_owned()),
            tuition_max: Some("20000".to_owned()),
            ..Default::default()
        };
        assert_eq!(form.validate().unwrap_err().field, "tuition_max");
    }

    #[test]
    fn form_parses_optional_fields() {
        let form = ProgramForm {
            name: Some("BSc Nursing".to_owned()),
            university: Some("Monash".to_owned()),
            country: Some("au".to_owned()),
            level: Some("bachelor".to_owned()),
            duration_months: Some("36".to_owned()),
            deadline: Some("2027-02-01".to_owned()),
            featured: Some("on".to_owned()),
            ..Default::default()
        };
        let fields = form.validate().unwrap();
        assert_eq!(fields.duration_months, Some(36));
        assert_eq!(fields.deadline, Some(date!(2027 - 02 - 01)));
        assert!(fields.featured);
        assert_eq!(fields.currency, "USD");
    }
}
