use serde::{Deserialize, Serialize};

/// A study destination shown on the marketing pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Destination {
    pub code: &'static str,
    pub name: &'static str,
    pub summary: &'static str,
}

pub const DESTINATIONS: [Destination; 6] = [
    Destination {
        code: "uk",
        name: "United Kingdom",
        summary: "One-year master's degrees and a two-year graduate route after you finish.",
    },
    Destination {
        code: "us",
        name: "United States",
        summary: "Flexible majors, research universities and optional practical training.",
    },
    Destination {
        code: "ca",
        name: "Canada",
        summary: "Affordable colleges and a clear path from study permit to work permit.",
    },
    Destination {
        code: "au",
        name: "Australia",
        summary: "Strong vocational and university sectors with post-study work rights.",
    },
    Destination {
        code: "de",
        name: "Germany",
        summary: "Low or no tuition at public universities and many English-taught programs.",
    },
    Destination {
        code: "my",
        name: "Malaysia",
        summary: "Branch campuses of international universities at a fraction of the cost.",
    },
];

impl Destination {
    pub fn find(code: &str) -> Option<&'static Destination> {
        DESTINATIONS
            .iter()
            .find(|d| d.code.eq_ignore_ascii_case(code))
    }

    /// Display name for a country code, falling back to the code itself.
    pub fn name_of(code: &str) -> &str {
        Self::find(code).map_or(code, |d| d.name)
    }
}

/// Aggregates returned by the `destination_stats` procedure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationStats {
    pub country: String,
    #[serde(default)]
    pub program_count: u32,
    #[serde(default)]
    pub university_count: u32,
    #[serde(default)]
    pub avg_tuition: Option<f64>,
}
