use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

pub const DEFAULT_LOCATION: &str = "Bogotá";

fn default_location() -> String {
    DEFAULT_LOCATION.to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdentityKind {
    Professional,
    Company,
    Supplier,
}

impl fmt::Display for IdentityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            IdentityKind::Professional => "professional",
            IdentityKind::Company => "company",
            IdentityKind::Supplier => "supplier",
        };
        f.write_str(label)
    }
}

/// 已驗證的帳號；`kind` 建立後不可變更，決定可執行的流程動作
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub id: String,
    #[serde(rename = "user_type")]
    pub kind: IdentityKind,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<Profile>,
}

impl Identity {
    pub fn is(&self, kind: IdentityKind) -> bool {
        self.kind == kind
    }

    /// 公司與供應商顯示公司名稱，專業人員顯示全名
    pub fn display_name(&self) -> &str {
        match &self.profile {
            Some(Profile::Company(company)) => &company.company_name,
            Some(Profile::Supplier(supplier)) => &supplier.company_name,
            _ => &self.full_name,
        }
    }

    pub fn contact(&self) -> ContactInfo {
        ContactInfo {
            email: self.email.clone(),
            phone: self.phone.clone(),
        }
    }

    pub fn professional_profile(&self) -> Option<&ProfessionalProfile> {
        match &self.profile {
            Some(Profile::Professional(profile)) => Some(profile),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
}

pub const REDACTED_CONTACT: &str =
    "Send a service request to this professional to see their contact details";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactVisibility {
    Visible(ContactInfo),
    Redacted,
}

impl ContactVisibility {
    pub fn is_redacted(&self) -> bool {
        matches!(self, ContactVisibility::Redacted)
    }
}

impl fmt::Display for ContactVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContactVisibility::Visible(contact) => {
                write!(f, "{} / {}", contact.email, contact.phone)
            }
            ContactVisibility::Redacted => f.write_str(REDACTED_CONTACT),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AvailabilityStatus {
    #[default]
    Available,
    Busy,
    Unavailable,
}

impl std::str::FromStr for AvailabilityStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "available" => Ok(AvailabilityStatus::Available),
            "busy" => Ok(AvailabilityStatus::Busy),
            "unavailable" => Ok(AvailabilityStatus::Unavailable),
            other => Err(format!("unknown availability status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    pub id: String,
    pub user_id: String,
    #[serde(default)]
    pub specialties: BTreeSet<String>,
    #[serde(default)]
    pub experience_years: u32,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub education: String,
    #[serde(default)]
    pub certifications: Vec<String>,
    #[serde(default)]
    pub hourly_rate: Option<f64>,
    #[serde(default)]
    pub availability_status: AvailabilityStatus,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub areas_of_expertise: Vec<String>,
    #[serde(default)]
    pub average_rating: f64,
    #[serde(default)]
    pub total_reviews: u32,
}

impl ProfessionalProfile {
    pub fn apply_rating(&mut self, summary: RatingSummary) {
        self.average_rating = summary.average;
        self.total_reviews = summary.count;
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
    pub company_type: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub size: String,
    #[serde(default)]
    pub services_offered: Vec<String>,
    #[serde(default)]
    pub requirements: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplierProfile {
    pub id: String,
    pub user_id: String,
    pub company_name: String,
    #[serde(default)]
    pub products_services: Vec<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub certifications: Vec<String>,
}

/// 依帳號類型而異的個人檔案欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Profile {
    Professional(ProfessionalProfile),
    Company(CompanyProfile),
    Supplier(SupplierProfile),
}

impl Profile {
    /// 以帳號類型決定解析方式，避免 untagged 的歧義
    pub fn from_value(kind: IdentityKind, value: serde_json::Value) -> serde_json::Result<Self> {
        Ok(match kind {
            IdentityKind::Professional => Profile::Professional(serde_json::from_value(value)?),
            IdentityKind::Company => Profile::Company(serde_json::from_value(value)?),
            IdentityKind::Supplier => Profile::Supplier(serde_json::from_value(value)?),
        })
    }
}

/// 專業人員名錄中的一筆：帳號 + 專業檔案。
/// 後端回傳合併後的扁平紀錄 `{...user, ...profile}`，也接受 `{user, profile}`。
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfessionalListing {
    pub user: Identity,
    pub profile: ProfessionalProfile,
}

impl<'de> Deserialize<'de> for ProfessionalListing {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;

        if value.get("user").is_some_and(Value::is_object) {
            let user = value.get_mut("user").map(Value::take).unwrap_or_default();
            let profile = value
                .get_mut("profile")
                .map(Value::take)
                .unwrap_or_default();
            return Ok(Self {
                user: serde_json::from_value(user).map_err(D::Error::custom)?,
                profile: serde_json::from_value(profile).map_err(D::Error::custom)?,
            });
        }

        let profile = serde_json::from_value(value.clone()).map_err(D::Error::custom)?;
        let (user, _) = split_merged_record(value).map_err(D::Error::custom)?;
        Ok(Self { user, profile })
    }
}

/// 拆開 `{...user, ...profile}`：profile 的 `id` 蓋掉了帳號的 `id`，帳號 id 改取 `user_id`。
/// 沒有 `user_id` 時視為單純的帳號紀錄。
fn split_merged_record(mut value: Value) -> serde_json::Result<(Identity, Option<Value>)> {
    let user_id = value
        .get("user_id")
        .and_then(Value::as_str)
        .map(str::to_string);

    let Some(user_id) = user_id else {
        return Ok((serde_json::from_value(value)?, None));
    };

    let profile = value.clone();
    if let Some(record) = value.as_object_mut() {
        record.insert("id".to_string(), Value::String(user_id));
        record.remove("profile");
    }
    Ok((serde_json::from_value(value)?, Some(profile)))
}

/// 專業人員可自行修改的檔案欄位；None 表示不變
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialties: Option<BTreeSet<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub experience_years: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub education: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certifications: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hourly_rate: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skills: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub areas_of_expertise: Option<Vec<String>>,
}

impl ProfileUpdate {
    pub fn apply_to(&self, profile: &mut ProfessionalProfile) {
        if let Some(specialties) = &self.specialties {
            profile.specialties = specialties.clone();
        }
        if let Some(years) = self.experience_years {
            profile.experience_years = years;
        }
        if let Some(bio) = &self.bio {
            profile.bio = bio.clone();
        }
        if let Some(education) = &self.education {
            profile.education = education.clone();
        }
        if let Some(certifications) = &self.certifications {
            profile.certifications = certifications.clone();
        }
        if let Some(rate) = self.hourly_rate {
            profile.hourly_rate = Some(rate);
        }
        if let Some(skills) = &self.skills {
            profile.skills = skills.clone();
        }
        if let Some(areas) = &self.areas_of_expertise {
            profile.areas_of_expertise = areas.clone();
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub reviewed_user_id: String,
    pub reviewer_user_id: String,
    pub reviewer_name: String,
    #[serde(rename = "reviewer_type")]
    pub reviewer_kind: IdentityKind,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub collaboration_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewReview {
    pub reviewed_user_id: String,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub collaboration_type: Option<String>,
}

/// `POST /reviews` 的內容，評論者欄位由 session 帳號填入
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub reviewed_user_id: String,
    pub reviewer_user_id: String,
    pub reviewer_name: String,
    #[serde(rename = "reviewer_type")]
    pub reviewer_kind: IdentityKind,
    pub rating: u8,
    pub comment: String,
    #[serde(default)]
    pub collaboration_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RatingSummary {
    pub average: f64,
    pub count: u32,
}

/// 持久化的 bearer token；Debug 輸出不含內容
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub full_name: String,
    pub phone: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(flatten)]
    pub details: RegistrationDetails,
}

impl RegistrationForm {
    pub fn kind(&self) -> IdentityKind {
        match self.details {
            RegistrationDetails::Professional { .. } => IdentityKind::Professional,
            RegistrationDetails::Company { .. } => IdentityKind::Company,
            RegistrationDetails::Supplier { .. } => IdentityKind::Supplier,
        }
    }
}

/// 依 `user_type` 區分、互斥的註冊欄位
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "user_type", rename_all = "lowercase")]
pub enum RegistrationDetails {
    Professional {
        #[serde(default)]
        specialties: Vec<String>,
        #[serde(default)]
        experience_years: u32,
        #[serde(default)]
        hourly_rate: Option<f64>,
        #[serde(default)]
        bio: String,
        #[serde(default)]
        education: String,
        #[serde(default)]
        certifications: Vec<String>,
        #[serde(default)]
        skills: Vec<String>,
        #[serde(default)]
        areas_of_expertise: Vec<String>,
    },
    Company {
        company_name: String,
        company_type: String,
        #[serde(default)]
        description: String,
        #[serde(default)]
        size: String,
        #[serde(default)]
        services_offered: Vec<String>,
        #[serde(default)]
        requirements: Vec<String>,
    },
    Supplier {
        company_name: String,
        #[serde(default)]
        products_services: Vec<String>,
        #[serde(default)]
        description: String,
        #[serde(default)]
        certifications: Vec<String>,
    },
}

/// `/auth/login`、`/auth/register` 的回應
#[derive(Debug, Clone, Deserialize)]
pub struct AuthResponse {
    pub access_token: String,
    #[serde(default)]
    pub token_type: Option<String>,
    pub user: Identity,
    #[serde(default)]
    pub profile: Option<serde_json::Value>,
}

/// `/users/me` 的回應：扁平的帳號（可能已合併檔案欄位），或 `{user, profile}`
#[derive(Debug, Clone)]
pub struct IdentityEnvelope {
    pub user: Identity,
    pub profile: Option<Value>,
}

impl<'de> Deserialize<'de> for IdentityEnvelope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut value = Value::deserialize(deserializer)?;

        if value.get("user").is_some_and(Value::is_object) {
            let user = value.get_mut("user").map(Value::take).unwrap_or_default();
            let profile = value
                .get_mut("profile")
                .map(Value::take)
                .filter(|v| !v.is_null());
            return Ok(Self {
                user: serde_json::from_value(user).map_err(D::Error::custom)?,
                profile,
            });
        }

        let (user, profile) = split_merged_record(value).map_err(D::Error::custom)?;
        Ok(Self { user, profile })
    }
}

/// 把類型專屬的檔案欄位合併進帳號
pub fn merge_profile(
    mut user: Identity,
    profile: Option<serde_json::Value>,
) -> serde_json::Result<Identity> {
    if let Some(value) = profile.filter(|v| !v.is_null()) {
        user.profile = Some(Profile::from_value(user.kind, value)?);
    }
    Ok(user)
}

impl AuthResponse {
    pub fn into_parts(self) -> serde_json::Result<(Identity, Credential)> {
        let identity = merge_profile(self.user, self.profile)?;
        Ok((identity, Credential::new(self.access_token)))
    }
}
