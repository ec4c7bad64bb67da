pub mod booking;
pub mod draft;
pub mod event;
pub mod student;
pub mod teacher;
pub mod user;

pub use booking::{Booking, BookingStatus, BookingSummary, PaymentStatus, SessionType};
pub use draft::{BookingDraft, DraftInput, StoredDraft};
pub use event::{BookingEvent, BookingEventKind};
pub use student::{Student, StudentStatus};
pub use teacher::{Teacher, TeacherStatus};
pub use user::{AuthSession, Capabilities, Capability, User};
