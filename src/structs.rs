use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum UserType {
    #[default]
    User,
    Admin,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
pub enum HardwareType {
    #[serde(rename = "PLD")]
    #[sqlx(rename = "PLD")]
    Pld,
    #[default]
    #[serde(rename = "other")]
    #[sqlx(rename = "other")]
    Other,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Default, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    New,
    Taken,
    Completed,
    Canceled,
}

/// A single value of a hardware specification. Nested structures are not accepted.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum SpecValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

pub type Specifications = BTreeMap<String, SpecValue>;

fn default_true() -> bool {
    true
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct UserInsert {
    #[serde(default = "default_true")]
    pub active: bool,
    #[serde(rename = "type", default)]
    #[sqlx(rename = "type")]
    pub user_type: UserType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub patronymic: Option<String>,
    #[serde(default)]
    pub image_link: Option<String>,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub card_id: Option<String>,
    #[serde(default)]
    pub card_key: Option<String>,
    #[serde(default)]
    pub comment: String,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct User {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: UserInsert,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct LocationInsert {
    pub name: String,
    pub width: i64,
    pub height: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Location {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: LocationInsert,
    pub created: DateTime<Utc>,
}

/// Terminals are identified by their name.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct TerminalInsert {
    pub name: String,
    pub location: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Terminal {
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: TerminalInsert,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct HardwareInsert {
    pub name: String,
    #[serde(rename = "type", default)]
    #[sqlx(rename = "type")]
    pub hardware_type: HardwareType,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_link: Option<String>,
    #[serde(default)]
    pub specifications: Json<Specifications>,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Hardware {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: HardwareInsert,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct RackInsert {
    pub location: i64,
    pub width: i64,
    pub height: i64,
    pub x: i64,
    pub y: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Rack {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: RackInsert,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct StockInsert {
    pub hardware: i64,
    pub rack: i64,
    pub rack_position: i64,
    pub count: i64,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Stock {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: StockInsert,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, FromRow)]
pub struct RequestBase {
    pub user: i64,
    pub location: i64,
    #[serde(default)]
    pub status: RequestStatus,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub taken_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub return_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub issued_by: Option<i64>,
}

/// One requested hardware type. `stock` pins a specific stock slot; when it
/// is absent the slot is looked up while the request is being stored.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct HardwareInRequest {
    pub hardware: i64,
    pub count: i64,
    #[serde(default)]
    pub stock: Option<i64>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
pub struct RequestInsert {
    #[serde(flatten)]
    pub request: RequestBase,
    pub hardware: Vec<HardwareInRequest>,
}

#[derive(Serialize, Debug, Clone, FromRow)]
pub struct Request {
    pub id: i64,
    #[serde(flatten)]
    #[sqlx(flatten)]
    pub fields: RequestBase,
    pub created: DateTime<Utc>,
}

#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, FromRow)]
pub struct RequestHardware {
    pub request: i64,
    pub hardware: i64,
    pub stock: i64,
    pub count: i64,
}
