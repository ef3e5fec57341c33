//! The typed inference input: one student's fifteen attributes.

use crate::IoError;
use crate::domain::CAREER_FEATURES;

/// Inclusive `(min, max)` range of each feature, in canonical order.
pub const FEATURE_RANGES: [(f64, f64); 15] = [
    (0.0, 10.0), // GPA
    (0.0, 10.0), // Extracurricular_Activities
    (0.0, 5.0),  // Internships
    (0.0, 10.0), // Projects
    (0.0, 5.0),  // Leadership_Positions
    (0.0, 15.0), // Field_Specific_Courses
    (0.0, 5.0),  // Research_Experience
    (0.0, 5.0),  // Coding_Skills
    (0.0, 5.0),  // Communication_Skills
    (0.0, 5.0),  // Problem_Solving_Skills
    (0.0, 5.0),  // Teamwork_Skills
    (0.0, 5.0),  // Analytical_Skills
    (0.0, 5.0),  // Presentation_Skills
    (0.0, 5.0),  // Networking_Skills
    (0.0, 5.0),  // Industry_Certifications
];

/// A student's attributes as collected by a front end.
///
/// The seven `*_skills` fields are self-ratings on a 0 to 5 scale. Serde
/// names match the dataset column names.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CareerProfile {
    /// Grade point average, 0 to 10.
    #[serde(rename = "GPA")]
    pub gpa: f64,
    /// Count of activities, 0 to 10.
    #[serde(rename = "Extracurricular_Activities")]
    pub extracurricular_activities: f64,
    /// Count of internships, 0 to 5.
    #[serde(rename = "Internships")]
    pub internships: f64,
    /// Count of projects, 0 to 10.
    #[serde(rename = "Projects")]
    pub projects: f64,
    /// Count of leadership roles, 0 to 5.
    #[serde(rename = "Leadership_Positions")]
    pub leadership_positions: f64,
    /// Count of courses in the field, 0 to 15.
    #[serde(rename = "Field_Specific_Courses")]
    pub field_specific_courses: f64,
    /// Research experience, 0 to 5.
    #[serde(rename = "Research_Experience")]
    pub research_experience: f64,
    #[serde(rename = "Coding_Skills")]
    pub coding_skills: f64,
    #[serde(rename = "Communication_Skills")]
    pub communication_skills: f64,
    #[serde(rename = "Problem_Solving_Skills")]
    pub problem_solving_skills: f64,
    #[serde(rename = "Teamwork_Skills")]
    pub teamwork_skills: f64,
    #[serde(rename = "Analytical_Skills")]
    pub analytical_skills: f64,
    #[serde(rename = "Presentation_Skills")]
    pub presentation_skills: f64,
    #[serde(rename = "Networking_Skills")]
    pub networking_skills: f64,
    /// Count of certifications, 0 to 5.
    #[serde(rename = "Industry_Certifications")]
    pub industry_certifications: f64,
}

impl CareerProfile {
    /// Values in canonical feature order.
    #[must_use]
    pub fn to_feature_vector(&self) -> Vec<f64> {
        vec![
            self.gpa,
            self.extracurricular_activities,
            self.internships,
            self.projects,
            self.leadership_positions,
            self.field_specific_courses,
            self.research_experience,
            self.coding_skills,
            self.communication_skills,
            self.problem_solving_skills,
            self.teamwork_skills,
            self.analytical_skills,
            self.presentation_skills,
            self.networking_skills,
            self.industry_certifications,
        ]
    }

    /// Check every value is finite and within its documented range.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`IoError::NonFiniteFeature`] | A value is NaN or infinite |
    /// | [`IoError::ValueOutOfRange`] | A value lies outside its range |
    pub fn validate(&self) -> Result<(), IoError> {
        let values = self.to_feature_vector();
        for ((&field, &(min, max)), value) in CAREER_FEATURES.iter().zip(&FEATURE_RANGES).zip(values) {
            if !value.is_finite() {
                return Err(IoError::NonFiniteFeature {
                    field: field.to_string(),
                });
            }
            if value < min || value > max {
                return Err(IoError::ValueOutOfRange {
                    field,
                    value,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }
}
