//! CRM abstraction.
//!
//! The [`CrmApi`] trait decouples the workflow from the concrete CRM so
//! handlers can be exercised against an in-memory double. [`PipedriveClient`]
//! is the production implementation.

pub mod pipedrive;

use std::future::Future;
use std::pin::Pin;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::deal::DealRecord;
use crate::Result;

pub use pipedrive::PipedriveClient;

/// Activity (task) to create against a deal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewActivity {
    /// Activity subject line.
    pub subject: String,
    /// Pipedrive activity type key (e.g. `task`).
    #[serde(rename = "type")]
    pub activity_type: String,
    /// Due date, serialized as `YYYY-MM-DD`.
    #[serde(serialize_with = "serialize_due_date")]
    pub due_date: NaiveDate,
    /// Deal the activity belongs to.
    pub deal_id: u64,
}

fn serialize_due_date<S>(date: &NaiveDate, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&date.format("%Y-%m-%d").to_string())
}

/// Read and append operations the bot performs against the CRM.
pub trait CrmApi: Send + Sync {
    /// Fetch a deal by ID.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Crm`](crate::AppError::Crm) on transport, status
    /// or envelope failure.
    fn fetch_deal(&self, deal_id: &str) -> Pin<Box<dyn Future<Output = Result<DealRecord>> + Send + '_>>;

    /// Append a note to a deal.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Crm`](crate::AppError::Crm) when the note is not stored.
    fn create_note(
        &self,
        deal_id: &str,
        content: &str,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

    /// Create an activity and return its ID.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Crm`](crate::AppError::Crm) when the activity is not created.
    fn create_activity(
        &self,
        activity: NewActivity,
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + '_>>;
}
