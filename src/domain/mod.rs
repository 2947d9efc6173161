//! Billing entities: bookings read from the scheduling side and the payment records
//! owned by the ledger.

pub mod booking;
pub mod common;
pub mod payment;
pub mod slot_record;

pub use booking::{BookingStatus, Customer, OneOffCharge, RecurringCommitment};
pub use common::{find_by_id, find_by_id_mut, Identifiable};
pub use payment::{PaymentMethod, PaymentStatus, PaymentTransaction, PeriodKey, PeriodSummary};
pub use slot_record::{DisplayStatus, SlotPaymentRecord, SlotRecordStatus};
