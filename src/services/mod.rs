pub mod dashboard;
pub mod directory;
pub mod draft;
pub mod identity;
pub mod notify;
pub mod payment;
pub mod receipt;
pub mod reconciliation;
