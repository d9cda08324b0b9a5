use chrono::{NaiveDate, NaiveDateTime};
use diesel::prelude::*;
use uuid::Uuid;

use crate::schema::*;

pub const STATUS_PENDING: &str = "pending";

pub const DOCUMENT_STATUSES: &[&str] = &[
    "pending",
    "scanned",
    "digitized",
    "categorized",
    "approved",
    "archived",
];

pub const PAYMENT_STATUSES: &[&str] = &["paid", "pending", "overdue", "not_applicable"];

pub fn is_valid_status(value: &str) -> bool {
    DOCUMENT_STATUSES.iter().any(|allowed| *allowed == value)
}

pub fn is_valid_payment_status(value: &str) -> bool {
    PAYMENT_STATUSES.iter().any(|allowed| *allowed == value)
}

pub fn status_label(value: &str) -> &str {
    match value {
        "pending" => "Pending",
        "scanned" => "Scanned",
        "digitized" => "Digitized",
        "categorized" => "Categorized",
        "approved" => "Approved",
        "archived" => "Archived",
        other => other,
    }
}

pub fn payment_status_label(value: &str) -> &str {
    match value {
        "paid" => "Paid",
        "pending" => "Pending",
        "overdue" => "Overdue",
        "not_applicable" => "Not applicable",
        other => other,
    }
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = users)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub role: String,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl User {
    /// Admins and managers see every document; everyone else only sees
    /// documents they created or were assigned to.
    pub fn can_view_all_documents(&self) -> bool {
        matches!(self.role.as_str(), "admin" | "manager")
    }
}

#[derive(Debug, Insertable)]
#[diesel(table_name = users)]
pub struct NewUser {
    pub id: Uuid,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = entities)]
pub struct Entity {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_company: bool,
    pub is_department: bool,
    pub folder_path: Option<String>,
    pub auto_create_folder: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = entities)]
pub struct NewEntity {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_company: bool,
    pub is_department: bool,
    pub auto_create_folder: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = categories)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub applies_to_all: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = categories)]
pub struct NewCategory {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub applies_to_all: bool,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = category_entities)]
#[diesel(belongs_to(Category))]
#[diesel(belongs_to(Entity))]
#[diesel(primary_key(category_id, entity_id))]
pub struct CategoryEntity {
    pub category_id: Uuid,
    pub entity_id: Uuid,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = category_entities)]
pub struct NewCategoryEntity {
    pub category_id: Uuid,
    pub entity_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_types)]
#[diesel(belongs_to(Category))]
pub struct DocumentType {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_types)]
pub struct NewDocumentType {
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub category_id: Uuid,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Queryable, Identifiable)]
#[diesel(table_name = documents)]
pub struct Document {
    pub id: Uuid,
    pub title: String,
    pub file_path: Option<String>,
    pub checksum: Option<String>,
    pub category_id: Option<Uuid>,
    pub document_type_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub document_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub payment_status: String,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub original_filename: Option<String>,
    pub imported_from_folder: bool,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = documents)]
pub struct NewDocument {
    pub id: Uuid,
    pub title: String,
    pub file_path: Option<String>,
    pub checksum: Option<String>,
    pub category_id: Option<Uuid>,
    pub document_type_id: Option<Uuid>,
    pub entity_id: Option<Uuid>,
    pub document_date: Option<NaiveDate>,
    pub due_date: Option<NaiveDate>,
    pub status: String,
    pub payment_status: String,
    pub created_by: Option<Uuid>,
    pub notes: Option<String>,
    pub tags: Option<String>,
    pub original_filename: Option<String>,
    pub imported_from_folder: bool,
}

#[derive(Debug, Clone, Queryable, Associations)]
#[diesel(table_name = document_assignments)]
#[diesel(belongs_to(Document))]
#[diesel(belongs_to(User))]
#[diesel(primary_key(document_id, user_id))]
pub struct DocumentAssignment {
    pub document_id: Uuid,
    pub user_id: Uuid,
    pub assigned_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_assignments)]
pub struct NewDocumentAssignment {
    pub document_id: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Queryable, Identifiable, Associations)]
#[diesel(table_name = document_history)]
#[diesel(belongs_to(Document))]
pub struct DocumentHistory {
    pub id: Uuid,
    pub document_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub change_reason: Option<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = document_history)]
pub struct NewDocumentHistory {
    pub id: Uuid,
    pub document_id: Uuid,
    pub previous_status: Option<String>,
    pub new_status: String,
    pub changed_by: Option<Uuid>,
    pub change_reason: Option<String>,
}
