use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod update;

pub use update::{FieldValue, Patch, UpdateRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationScope {
    Any,
    AuthoredBy(String),
}

pub const USERNAME_MAX_LEN: usize = 25;
pub const PASSWORD_MIN_LEN: usize = 5;
pub const PASSWORD_MAX_LEN: usize = 64;
pub const EMAIL_MIN_LEN: usize = 6;
pub const EMAIL_MAX_LEN: usize = 60;
pub const CAR_TEXT_MAX_LEN: usize = 50;
pub const MODEL_YEAR_MIN: i32 = 1886;
pub const MODEL_YEAR_MAX: i32 = 2100;
pub const TITLE_MAX_LEN: usize = 100;
pub const DESCRIPTION_MAX_LEN: usize = 1000;
pub const ROUTE_LINK_MAX_LEN: usize = 500;
pub const POST_BODY_MAX_LEN: usize = 5000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub email: Option<String>,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetail {
    #[serde(flatten)]
    pub user: User,
    pub cars: Vec<i32>,
    pub drives: Vec<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Car {
    pub id: i32,
    pub owner_id: i32,
    pub make: String,
    pub model: String,
    pub model_year: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    pub id: i32,
    pub title: String,
    pub description: Option<String>,
    pub route_link: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub body: String,
    pub user_id: Option<i32>,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCars {
    pub username: String,
    pub cars: Vec<Car>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDrives {
    pub username: String,
    pub drives: Vec<Drive>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPosts {
    pub username: String,
    pub posts: Vec<Post>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

impl LoginRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_username(&self.username)?;
        if self.password.is_empty() || self.password.len() > PASSWORD_MAX_LEN {
            return Err("password out of range");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        if let Some(email) = self.email.as_deref() {
            validate_email(email)?;
        }
        Ok(())
    }

    pub fn into_new_user(self) -> NewUser {
        NewUser {
            username: self.username,
            password: self.password,
            email: self.email,
            is_admin: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
}

impl NewUser {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_username(&self.username)?;
        validate_password(&self.password)?;
        if let Some(email) = self.email.as_deref() {
            validate_email(email)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserUpdate {
    #[serde(default)]
    pub username: Patch<String>,
    #[serde(default)]
    pub email: Patch<String>,
    #[serde(default)]
    pub password: Patch<String>,
    #[serde(default)]
    pub is_admin: Patch<bool>,
}

impl UserUpdate {
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.username {
            Patch::Null => return Err("username cannot be null"),
            Patch::Value(username) => validate_username(username)?,
            Patch::Absent => {}
        }
        match &self.password {
            Patch::Null => return Err("password cannot be null"),
            Patch::Value(password) => validate_password(password)?,
            Patch::Absent => {}
        }
        if let Patch::Value(email) = &self.email {
            validate_email(email)?;
        }
        if matches!(self.is_admin, Patch::Null) {
            return Err("is_admin cannot be null");
        }
        Ok(())
    }

    pub fn to_update_request(&self) -> UpdateRequest {
        let mut req = UpdateRequest::new();
        req.patch("username", &self.username);
        req.patch("email", &self.email);
        req.patch("password", &self.password);
        req.patch("is_admin", &self.is_admin);
        req
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewCar {
    pub make: String,
    pub model: String,
    #[serde(default)]
    pub model_year: Option<i32>,
}

impl NewCar {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_bounded(&self.make, CAR_TEXT_MAX_LEN, "make out of range")?;
        validate_bounded(&self.model, CAR_TEXT_MAX_LEN, "model out of range")?;
        if let Some(year) = self.model_year {
            validate_model_year(year)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CarUpdate {
    #[serde(default)]
    pub make: Patch<String>,
    #[serde(default)]
    pub model: Patch<String>,
    #[serde(default)]
    pub model_year: Patch<i32>,
}

impl CarUpdate {
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.make {
            Patch::Null => return Err("make cannot be null"),
            Patch::Value(make) => validate_bounded(make, CAR_TEXT_MAX_LEN, "make out of range")?,
            Patch::Absent => {}
        }
        match &self.model {
            Patch::Null => return Err("model cannot be null"),
            Patch::Value(model) => {
                validate_bounded(model, CAR_TEXT_MAX_LEN, "model out of range")?
            }
            Patch::Absent => {}
        }
        if let Patch::Value(year) = self.model_year {
            validate_model_year(year)?;
        }
        Ok(())
    }

    pub fn to_update_request(&self) -> UpdateRequest {
        let mut req = UpdateRequest::new();
        req.patch("make", &self.make);
        req.patch("model", &self.model);
        req.patch("model_year", &self.model_year);
        req
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewDrive {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub route_link: String,
}

impl NewDrive {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_bounded(&self.title, TITLE_MAX_LEN, "title out of range")?;
        validate_bounded(&self.route_link, ROUTE_LINK_MAX_LEN, "route_link out of range")?;
        if let Some(description) = self.description.as_deref()
            && description.chars().count() > DESCRIPTION_MAX_LEN
        {
            return Err("description too long");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveUpdate {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub description: Patch<String>,
    #[serde(default)]
    pub route_link: Patch<String>,
}

impl DriveUpdate {
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.title {
            Patch::Null => return Err("title cannot be null"),
            Patch::Value(title) => validate_bounded(title, TITLE_MAX_LEN, "title out of range")?,
            Patch::Absent => {}
        }
        match &self.route_link {
            Patch::Null => return Err("route_link cannot be null"),
            Patch::Value(link) => {
                validate_bounded(link, ROUTE_LINK_MAX_LEN, "route_link out of range")?
            }
            Patch::Absent => {}
        }
        if let Patch::Value(description) = &self.description
            && description.chars().count() > DESCRIPTION_MAX_LEN
        {
            return Err("description too long");
        }
        Ok(())
    }

    pub fn to_update_request(&self) -> UpdateRequest {
        let mut req = UpdateRequest::new();
        req.patch("title", &self.title);
        req.patch("description", &self.description);
        req.patch("route_link", &self.route_link);
        req
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DriveSearch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub created_on: Option<chrono::NaiveDate>,
}

impl DriveSearch {
    pub fn title_filter(&self) -> Option<&str> {
        self.title.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NewPost {
    pub title: String,
    pub body: String,
}

impl NewPost {
    pub fn validate(&self) -> Result<(), &'static str> {
        validate_bounded(&self.title, TITLE_MAX_LEN, "title out of range")?;
        validate_bounded(&self.body, POST_BODY_MAX_LEN, "body out of range")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostUpdate {
    #[serde(default)]
    pub title: Patch<String>,
    #[serde(default)]
    pub body: Patch<String>,
}

impl PostUpdate {
    pub fn validate(&self) -> Result<(), &'static str> {
        match &self.title {
            Patch::Null => return Err("title cannot be null"),
            Patch::Value(title) => validate_bounded(title, TITLE_MAX_LEN, "title out of range")?,
            Patch::Absent => {}
        }
        match &self.body {
            Patch::Null => return Err("body cannot be null"),
            Patch::Value(body) => validate_bounded(body, POST_BODY_MAX_LEN, "body out of range")?,
            Patch::Absent => {}
        }
        Ok(())
    }

    pub fn to_update_request(&self) -> UpdateRequest {
        let mut req = UpdateRequest::new();
        req.patch("title", &self.title);
        req.patch("body", &self.body);
        req
    }
}

fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if len == 0 || len > USERNAME_MAX_LEN {
        return Err("username out of range");
    }
    if username.trim() != username {
        return Err("username must not have surrounding whitespace");
    }
    Ok(())
}

fn validate_password(password: &str) -> Result<(), &'static str> {
    let len = password.chars().count();
    if !(PASSWORD_MIN_LEN..=PASSWORD_MAX_LEN).contains(&len) {
        return Err("password out of range");
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), &'static str> {
    let len = email.chars().count();
    if !(EMAIL_MIN_LEN..=EMAIL_MAX_LEN).contains(&len) {
        return Err("email out of range");
    }
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err("email must look like name@domain.tld"),
    }
}

fn validate_model_year(year: i32) -> Result<(), &'static str> {
    if !(MODEL_YEAR_MIN..=MODEL_YEAR_MAX).contains(&year) {
        return Err("model_year out of range");
    }
    Ok(())
}

fn validate_bounded(value: &str, max: usize, err: &'static str) -> Result<(), &'static str> {
    let len = value.trim().chars().count();
    if len == 0 || value.chars().count() > max {
        return Err(err);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_rejects_short_password_and_bad_email() {
        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "u1",
            "password": "abc",
        }))
        .unwrap();
        assert_eq!(req.validate(), Err("password out of range"));

        let req: RegisterRequest = serde_json::from_value(serde_json::json!({
            "username": "u1",
            "password": "password1",
            "email": "not-an-email",
        }))
        .unwrap();
        assert_eq!(req.validate(), Err("email must look like name@domain.tld"));
    }

    #[test]
    fn register_refuses_admin_flag() {
        let err = serde_json::from_value::<RegisterRequest>(serde_json::json!({
            "username": "u1",
            "password": "password1",
            "is_admin": true,
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown field"));
    }

    #[test]
    fn user_update_keeps_null_email_and_rejects_null_username() {
        let update: UserUpdate =
            serde_json::from_value(serde_json::json!({"email": null})).unwrap();
        assert!(update.validate().is_ok());
        let req = update.to_update_request();
        assert_eq!(
            req.iter().collect::<Vec<_>>(),
            vec![("email", &FieldValue::Null)]
        );

        let update: UserUpdate =
            serde_json::from_value(serde_json::json!({"username": null})).unwrap();
        assert_eq!(update.validate(), Err("username cannot be null"));
    }

    #[test]
    fn empty_update_body_produces_empty_request() {
        let update: CarUpdate = serde_json::from_value(serde_json::json!({})).unwrap();
        assert!(update.validate().is_ok());
        assert!(update.to_update_request().is_empty());
    }

    #[test]
    fn car_validation_bounds_model_year() {
        let car: NewCar = serde_json::from_value(serde_json::json!({
            "make": "Subaru",
            "model": "Outback",
            "model_year": 1700,
        }))
        .unwrap();
        assert_eq!(car.validate(), Err("model_year out of range"));
    }

    #[test]
    fn drive_search_ignores_blank_title() {
        let search = DriveSearch {
            title: Some("   ".to_string()),
            created_on: None,
        };
        assert_eq!(search.title_filter(), None);
    }

    #[test]
    fn user_detail_flattens_user_fields() {
        let detail = UserDetail {
            user: User {
                username: "u1".to_string(),
                email: None,
                is_admin: false,
                created_at: DateTime::from_timestamp(0, 0).unwrap(),
            },
            cars: vec![1],
            drives: vec![],
        };
        let value = serde_json::to_value(&detail).unwrap();
        assert_eq!(value.get("username").and_then(|v| v.as_str()), Some("u1"));
        assert_eq!(value.get("cars"), Some(&serde_json::json!([1])));
    }
}
