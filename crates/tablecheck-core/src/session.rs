//! Table-session document model
//!
//! A session is created active, read while active, and ended through a
//! masked partial update that flips `active` to `false`.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};
use crate::value::{Document, FieldValue, Fields};

/// Wire names of the session fields
pub mod field {
    pub const CODE: &str = "code";
    pub const TABLE_NUMBER: &str = "tableNumber";
    pub const WAITER_ID: &str = "waiterId";
    pub const CREATED_AT: &str = "createdAt";
    pub const EXPIRES_AT: &str = "expiresAt";
    pub const ACTIVE: &str = "active";
}

/// Collection holding table sessions
pub const SESSIONS_COLLECTION: &str = "sessions";

/// Code of the session written by a verification run
pub const PROBE_CODE: &str = "S-AUTH-TEST";

/// Table number of the session written by a verification run
pub const PROBE_TABLE_NUMBER: i64 = 11;

/// Waiter id of the session written by a verification run
pub const PROBE_WAITER_ID: &str = "node-staff";

/// A table session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub code: String,
    pub table_number: i64,
    pub waiter_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Session {
    /// Start building a session
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// The session a verification run creates, timestamped now
    pub fn probe() -> Result<Self> {
        SessionBuilder::new()
            .code(PROBE_CODE)
            .table_number(PROBE_TABLE_NUMBER)
            .waiter_id(PROBE_WAITER_ID)
            .build()
    }

    /// Encode as a typed field map for a create request
    pub fn to_fields(&self) -> Fields {
        let mut fields = Fields::new();
        fields.insert(field::CODE.into(), FieldValue::from(self.code.as_str()));
        fields.insert(field::TABLE_NUMBER.into(), FieldValue::from(self.table_number));
        fields.insert(field::WAITER_ID.into(), FieldValue::from(self.waiter_id.as_str()));
        fields.insert(field::CREATED_AT.into(), FieldValue::from(self.created_at));
        fields.insert(field::EXPIRES_AT.into(), FieldValue::from(self.expires_at));
        fields.insert(field::ACTIVE.into(), FieldValue::from(self.active));
        fields
    }

    /// Decode a session from a stored document
    pub fn from_document(doc: &Document) -> Result<Self> {
        fn typed<T>(
            doc: &Document,
            name: &str,
            expected: &'static str,
            get: impl Fn(&FieldValue) -> Option<T>,
        ) -> Result<T> {
            let value = doc.field(name)?;
            get(value).ok_or_else(|| CoreError::FieldKind {
                field: name.to_string(),
                expected,
                actual: value.kind(),
            })
        }

        Ok(Self {
            code: typed(doc, field::CODE, "stringValue", |v| v.as_str().map(String::from))?,
            table_number: typed(doc, field::TABLE_NUMBER, "integerValue", FieldValue::as_integer)?,
            waiter_id: typed(doc, field::WAITER_ID, "stringValue", |v| {
                v.as_str().map(String::from)
            })?,
            created_at: typed(doc, field::CREATED_AT, "timestampValue", FieldValue::as_timestamp)?,
            expires_at: typed(doc, field::EXPIRES_AT, "timestampValue", FieldValue::as_timestamp)?,
            active: typed(doc, field::ACTIVE, "booleanValue", FieldValue::as_bool)?,
        })
    }

    /// Names of the written fields that the document does not reflect
    ///
    /// Extra fields on the document are ignored.
    pub fn mismatches(&self, doc: &Document) -> Vec<String> {
        self.to_fields()
            .into_iter()
            .filter(|(name, value)| doc.fields.get(name) != Some(value))
            .map(|(name, _)| name)
            .collect()
    }
}

/// Builder for [`Session`]
#[derive(Debug, Clone)]
pub struct SessionBuilder {
    code: Option<String>,
    table_number: Option<i64>,
    waiter_id: Option<String>,
    created_at: Option<DateTime<Utc>>,
    ttl: Duration,
    active: bool,
}

impl SessionBuilder {
    pub fn new() -> Self {
        Self {
            code: None,
            table_number: None,
            waiter_id: None,
            created_at: None,
            ttl: Duration::hours(1),
            active: true,
        }
    }

    pub fn code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn table_number(mut self, table_number: i64) -> Self {
        self.table_number = Some(table_number);
        self
    }

    pub fn waiter_id(mut self, waiter_id: impl Into<String>) -> Self {
        self.waiter_id = Some(waiter_id.into());
        self
    }

    /// Creation time (defaults to now, truncated to milliseconds)
    pub fn created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = Some(created_at);
        self
    }

    /// Lifetime added to the creation time to get `expiresAt`
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    pub fn build(self) -> Result<Session> {
        let code = self
            .code
            .filter(|c| !c.is_empty())
            .ok_or_else(|| CoreError::InvalidSession("code is required".into()))?;
        let table_number = self
            .table_number
            .ok_or_else(|| CoreError::InvalidSession("table number is required".into()))?;
        let waiter_id = self
            .waiter_id
            .filter(|w| !w.is_empty())
            .ok_or_else(|| CoreError::InvalidSession("waiter id is required".into()))?;

        if self.ttl <= Duration::zero() {
            return Err(CoreError::InvalidSession("ttl must be positive".into()));
        }

        let created_at = self.created_at.unwrap_or_else(|| Utc::now().trunc_subsecs(3));

        Ok(Session {
            code,
            table_number,
            waiter_id,
            created_at,
            expires_at: created_at + self.ttl,
            active: self.active,
        })
    }
}

impl Default for SessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A masked partial update
#[derive(Debug, Clone, PartialEq)]
pub struct SessionPatch {
    /// Only the masked fields
    pub fields: Fields,
    /// Field paths the update is restricted to
    pub mask: Vec<String>,
}

impl SessionPatch {
    /// End a session at the given instant: `active = false`, `expiresAt = at`
    pub fn end(at: DateTime<Utc>) -> Self {
        let mut fields = Fields::new();
        fields.insert(field::ACTIVE.into(), FieldValue::from(false));
        fields.insert(field::EXPIRES_AT.into(), FieldValue::from(at.trunc_subsecs(3)));

        Self {
            fields,
            mask: vec![field::ACTIVE.to_string(), field::EXPIRES_AT.to_string()],
        }
    }

    /// Apply the masked fields onto an existing field map
    pub fn apply(&self, target: &mut Fields) {
        for path in &self.mask {
            match self.fields.get(path) {
                Some(value) => {
                    target.insert(path.clone(), value.clone());
                }
                None => {
                    target.remove(path);
                }
            }
        }
    }
}

/// Address of a document: `<collection>/<id>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentPath {
    pub collection: String,
    pub id: String,
}

impl DocumentPath {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Parse the trailing `<collection>/<id>` of a full resource name
    pub fn from_name(name: &str) -> Result<Self> {
        let mut segments = name.rsplit('/');
        match (segments.next(), segments.next()) {
            (Some(id), Some(collection)) if !id.is_empty() && !collection.is_empty() => {
                Ok(Self::new(collection, id))
            }
            _ => Err(CoreError::InvalidDocumentName(name.to_string())),
        }
    }
}

impl fmt::Display for DocumentPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.collection, self.id)
    }
}
