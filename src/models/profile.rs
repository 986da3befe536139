use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ValidationError, filled};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Client,
    Admin,
}

/// Personal fields counted towards profile completion.
pub const TRACKED_FIELDS: [&str; 8] = [
    "full_name",
    "email",
    "phone",
    "date_of_birth",
    "nationality",
    "passport_number",
    "passport_expiry",
    "address",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: Uuid,
    #[serde(default)]
    pub role: Role,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<String>,
    pub address: Option<String>,
    pub education_level: Option<String>,
    pub english_test: Option<String>,
    pub english_score: Option<f32>,
    pub work_experience_years: Option<u32>,
    pub avatar_url: Option<String>,
}

/// `round(100 * filled / total)`, halves rounded up.
pub fn completion_percentage(filled: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let filled = filled.min(total);
    ((200 * filled + total) / (2 * total)) as u8
}

impl UserProfile {
    pub fn tracked_values(&self) -> [Option<&str>; 8] {
        [
            self.full_name.as_deref(),
            self.email.as_deref(),
            self.phone.as_deref(),
            self.date_of_birth.as_deref(),
            self.nationality.as_deref(),
            self.passport_number.as_deref(),
            self.passport_expiry.as_deref(),
            self.address.as_deref(),
        ]
    }

    pub fn completion(&self) -> u8 {
        let values = self.tracked_values();
        let filled = values
            .iter()
            .filter(|value| value.is_some_and(|v| !v.trim().is_empty()))
            .count();
        completion_percentage(filled, values.len())
    }

    pub fn display_name(&self) -> &str {
        self.full_name
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .or(self.email.as_deref())
            .unwrap_or("Student")
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ProfileForm {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<String>,
    pub address: Option<String>,
    pub education_level: Option<String>,
    pub english_test: Option<String>,
    pub english_score: Option<String>,
    pub work_experience_years: Option<String>,
}

/// Every editable column; blanks clear the stored value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfilePatch {
    pub full_name: String,
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub nationality: Option<String>,
    pub passport_number: Option<String>,
    pub passport_expiry: Option<String>,
    pub address: Option<String>,
    pub education_level: Option<String>,
    pub english_test: Option<String>,
    pub english_score: Option<f32>,
    pub work_experience_years: Option<u32>,
}

impl ProfileForm {
    pub fn validate(&self) -> Result<ProfilePatch, ValidationError> {
        let full_name = filled(self.full_name.as_deref())
            .ok_or_else(|| ValidationError::new("full_name", "Full name is required"))?;

        let english_score = filled(self.english_score.as_deref())
            .map(|s| {
                s.parse::<f32>()
                    .map_err(|_| ValidationError::new("english_score", "English score must be a number"))
            })
            .transpose()?;
        let work_experience_years = filled(self.work_experience_years.as_deref())
            .map(|s| {
                s.parse::<u32>().map_err(|_| {
                    ValidationError::new("work_experience_years", "Work experience must be a whole number of years")
                })
            })
            .transpose()?;

        Ok(ProfilePatch {
            full_name,
            phone: filled(self.phone.as_deref()),
            date_of_birth: filled(self.date_of_birth.as_deref()),
            nationality: filled(self.nationality.as_deref()),
            passport_number: filled(self.passport_number.as_deref()),
            passport_expiry: filled(self.passport_expiry.as_deref()),
            address: filled(self.address.as_deref()),
            education_level: filled(self.education_level.as_deref()),
            english_test: filled(self.english_test.as_deref()),
            english_score,
            work_experience_years,
        })
    }
}
