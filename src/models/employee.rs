//! Employee record and form draft models.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

lazy_static! {
    /// Loose email shape check; the store performs the authoritative validation
    static ref EMAIL_REGEX: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
}

/// Lifecycle status of an employee record.
///
/// Only soft-delete (active -> inactive) and restore (inactive -> active)
/// change it; no draft carries a status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmployeeStatus {
    #[default]
    Active,
    Inactive,
}

impl EmployeeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EmployeeStatus::Active => "active",
            EmployeeStatus::Inactive => "inactive",
        }
    }
}

impl std::fmt::Display for EmployeeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmployeeStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(EmployeeStatus::Active),
            "inactive" => Ok(EmployeeStatus::Inactive),
            other => Err(format!("Unknown status '{}' (expected active or inactive)", other)),
        }
    }
}

/// A personnel record as held by the record store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmployeeRecord {
    pub id: String,
    pub emp_code: String,
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub salary: f64,
    pub join_date: NaiveDate,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub status: EmployeeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// Mutable staging copy of a record's editable fields.
///
/// Lives only while an add or edit form is open.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FormDraft {
    pub name: String,
    pub email: String,
    pub department: String,
    pub role: String,
    pub salary: Option<f64>,
    pub join_date: Option<NaiveDate>,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub photo: Option<String>,
}

impl FormDraft {
    /// Seed a draft from an existing record for the edit form.
    pub fn from_record(record: &EmployeeRecord) -> Self {
        Self {
            name: record.name.clone(),
            email: record.email.clone(),
            department: record.department.clone(),
            role: record.role.clone(),
            salary: Some(record.salary),
            join_date: Some(record.join_date),
            phone: record.phone.clone(),
            address: record.address.clone().unwrap_or_default(),
            photo: record.photo.clone(),
        }
    }

    /// Names of required fields that are absent or blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.name.trim().is_empty() {
            missing.push("name");
        }
        if self.email.trim().is_empty() {
            missing.push("email");
        }
        if self.department.trim().is_empty() {
            missing.push("department");
        }
        if self.role.trim().is_empty() {
            missing.push("role");
        }
        if self.salary.is_none() {
            missing.push("salary");
        }
        if self.join_date.is_none() {
            missing.push("join_date");
        }
        missing
    }

    /// Check the draft before it is submitted.
    ///
    /// Returns a message describing the first problem found.
    pub fn check(&self) -> Result<(), String> {
        let missing = self.missing_fields();
        if !missing.is_empty() {
            return Err(format!("Missing required fields: {}", missing.join(", ")));
        }
        if !EMAIL_REGEX.is_match(self.email.trim()) {
            return Err(format!("Invalid email address: {}", self.email));
        }
        match self.salary {
            Some(salary) if !salary.is_finite() || salary < 0.0 => {
                Err("Salary must be a non-negative number".to_string())
            }
            _ => Ok(()),
        }
    }
}

/// Request body sent to the add and update endpoints.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeePayload<'a> {
    pub name: &'a str,
    pub email: &'a str,
    pub department: &'a str,
    pub role: &'a str,
    pub salary: f64,
    pub join_date: NaiveDate,
    pub phone: &'a str,
    pub address: &'a str,
    pub photo: Option<&'a str>,
}

impl<'a> EmployeePayload<'a> {
    /// Build the wire body; `None` if a required field is still absent.
    pub fn from_draft(draft: &'a FormDraft) -> Option<Self> {
        Some(Self {
            name: draft.name.trim(),
            email: draft.email.trim(),
            department: draft.department.trim(),
            role: draft.role.trim(),
            salary: draft.salary?,
            join_date: draft.join_date?,
            phone: draft.phone.trim(),
            address: draft.address.trim(),
            photo: draft.photo.as_deref().filter(|p| !p.is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn complete_draft() -> FormDraft {
        FormDraft {
            name: "Asha Rao".to_string(),
            email: "asha@example.com".to_string(),
            department: "Engineering".to_string(),
            role: "Developer".to_string(),
            salary: Some(72000.0),
            join_date: NaiveDate::from_ymd_opt(2023, 4, 1),
            ..Default::default()
        }
    }

    #[test]
    fn test_status_wire_format() {
        assert_eq!(serde_json::to_string(&EmployeeStatus::Inactive).unwrap(), "\"inactive\"");
        assert_eq!("Active".parse::<EmployeeStatus>().unwrap(), EmployeeStatus::Active);
        assert!("gone".parse::<EmployeeStatus>().is_err());
    }

    #[test]
    fn test_record_deserializes_store_shape() {
        let json = r#"{
            "id": "6f1c", "emp_code": "EMP0001", "name": "Asha", "email": "a@x.com",
            "department": "Eng", "role": "Dev", "salary": 50000, "join_date": "2024-01-15",
            "phone": "555", "address": "Main St", "photo": null, "status": "inactive",
            "created_at": "2024-01-15T10:00:00+00:00"
        }"#;
        let record: EmployeeRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.salary, 50000.0);
        assert_eq!(record.status, EmployeeStatus::Inactive);
        assert_eq!(record.join_date, NaiveDate::from_ymd_opt(2024, 1, 15).unwrap());
        assert!(record.photo.is_none());
    }

    #[test]
    fn test_missing_fields_lists_every_required_field() {
        let draft = FormDraft::default();
        assert_eq!(
            draft.missing_fields(),
            vec!["name", "email", "department", "role", "salary", "join_date"]
        );
        assert!(complete_draft().missing_fields().is_empty());
    }

    #[test]
    fn test_check_rejects_negative_salary_and_bad_email() {
        let mut draft = complete_draft();
        draft.salary = Some(-1.0);
        assert!(draft.check().unwrap_err().contains("non-negative"));

        let mut draft = complete_draft();
        draft.email = "not-an-email".to_string();
        assert!(draft.check().unwrap_err().contains("Invalid email"));

        assert!(complete_draft().check().is_ok());
    }

    #[test]
    fn test_payload_sends_empty_optional_text() {
        let draft = complete_draft();
        let payload = EmployeePayload::from_draft(&draft).unwrap();
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["join_date"], "2023-04-01");
        assert_eq!(json["phone"], "");
        assert_eq!(json["address"], "");
        assert!(json["photo"].is_null());
    }
}
